use crate::domain::payment::PaymentStatus;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum PaymentError {
    #[error("invalid card data: {0}")]
    #[diagnostic(code(cardpay::invalid_card_data))]
    InvalidCardData(String),
    #[error("validation error: {0}")]
    #[diagnostic(code(cardpay::validation))]
    ValidationError(String),
    #[error("account not found or invalid")]
    #[diagnostic(code(cardpay::account_not_found))]
    AccountNotFound,
    #[error("insufficient balance")]
    #[diagnostic(code(cardpay::insufficient_balance))]
    InsufficientBalance,
    #[error("not found: {0}")]
    #[diagnostic(code(cardpay::not_found))]
    NotFound(String),
    #[error("duplicate payment: {0}")]
    #[diagnostic(code(cardpay::duplicate))]
    Duplicate(String),
    #[error("cannot move payment from {from} to {to}")]
    #[diagnostic(code(cardpay::invalid_transition))]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    #[error("persistence error: {0}")]
    #[diagnostic(code(cardpay::persistence))]
    PersistenceError(String),
    #[error("transient error: {0}")]
    #[diagnostic(code(cardpay::transient))]
    TransientError(String),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    #[diagnostic(code(cardpay::config))]
    Config(String),
}

impl PaymentError {
    /// Rejections caused by the request itself rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCardData(_)
                | Self::ValidationError(_)
                | Self::AccountNotFound
                | Self::InsufficientBalance
                | Self::NotFound(_)
                | Self::InvalidTransition { .. }
        )
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        Self::PersistenceError(err.into_string())
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
