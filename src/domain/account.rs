use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// Funds held on a card-linked account. May be computed negative, but a
/// negative value is never written back to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(funds: Decimal) -> Self {
        Self(funds)
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl Sub for Balance {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// The charged sum of a payment, strictly greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value <= Decimal::ZERO {
            return Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

/// A card-linked account holding the funds payments are debited from.
///
/// Accounts are provisioned externally; the lifecycle engine only reads them
/// and writes back new balances.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    /// The card number this account is keyed by.
    pub card_number: String,
    /// Funds available for debit. Never negative after a successful debit.
    pub balance: Balance,
    /// Inactive accounts reject every payment regardless of balance.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(card_number: impl Into<String>, balance: Balance, is_active: bool) -> Self {
        let now = Utc::now();
        Self {
            card_number: card_number.into(),
            balance,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account may fund a payment of `amount`.
    pub fn has_sufficient_balance(&self, amount: Amount) -> bool {
        self.is_active && self.balance >= Balance::from(amount)
    }

    /// Computes the balance left after debiting `amount`, without mutating the account.
    pub fn debited(&self, amount: Amount) -> Result<Balance, PaymentError> {
        let remaining = self.balance - Balance::from(amount);
        if remaining.is_negative() {
            Err(PaymentError::InsufficientBalance)
        } else {
            Ok(remaining)
        }
    }
}
