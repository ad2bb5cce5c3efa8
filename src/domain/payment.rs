use super::account::Amount;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const CARD_NUMBER_LEN: usize = 16;
const CVV_LEN: usize = 3;

/// Globally unique payment identifier, assigned once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PaymentId {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| PaymentError::ValidationError(format!("invalid payment ID: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card data carried by a payment request.
#[derive(Debug, Clone, PartialEq)]
pub struct CardDetails {
    pub number: String,
    pub holder: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
}

impl CardDetails {
    /// Structural and temporal checks against the given current year and month.
    ///
    /// A card expiring in the current month is still valid.
    pub fn validate(&self, current_year: i32, current_month: u32) -> Result<()> {
        if self.number.chars().count() != CARD_NUMBER_LEN {
            return Err(PaymentError::InvalidCardData(format!(
                "card number must be {} characters",
                CARD_NUMBER_LEN
            )));
        }
        if self.cvv.chars().count() != CVV_LEN {
            return Err(PaymentError::InvalidCardData(format!(
                "CVV must be {} characters",
                CVV_LEN
            )));
        }
        if !(1..=12).contains(&self.expiry_month) {
            return Err(PaymentError::InvalidCardData(
                "expiry month must be between 1 and 12".to_string(),
            ));
        }
        if (self.expiry_year, self.expiry_month) < (current_year, current_month) {
            return Err(PaymentError::InvalidCardData("card has expired".to_string()));
        }
        Ok(())
    }
}

/// Keeps the last four characters of a card number visible.
pub fn mask_card_number(number: &str) -> String {
    let len = number.chars().count();
    number
        .chars()
        .enumerate()
        .map(|(i, c)| if i + 4 < len { '*' } else { c })
        .collect()
}

/// Input of the create path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentRequest {
    pub card_number: String,
    pub card_holder: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
    /// Parsed from its textual form so the scale is kept exactly.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    pub merchant_id: String,
}

impl PaymentRequest {
    pub fn card(&self) -> CardDetails {
        CardDetails {
            number: self.card_number.clone(),
            holder: self.card_holder.clone(),
            expiry_month: self.expiry_month,
            expiry_year: self.expiry_year,
            cvv: self.cvv.clone(),
        }
    }

    /// Checks the non-card fields and returns the validated amount.
    pub fn validated_amount(&self) -> Result<Amount> {
        let amount = Amount::new(self.amount)?;
        if self.currency.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "currency is required".to_string(),
            ));
        }
        if self.merchant_id.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "merchant id is required".to_string(),
            ));
        }
        Ok(amount)
    }
}

/// Durable record of a payment and its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub card_number: String,
    pub card_holder: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
    pub amount: Amount,
    pub currency: String,
    pub merchant_id: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl Payment {
    /// Builds a fresh `Pending` payment from a validated request.
    pub fn new(request: PaymentRequest, amount: Amount, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            card_number: request.card_number,
            card_holder: request.card_holder,
            expiry_month: request.expiry_month,
            expiry_year: request.expiry_year,
            cvv: request.cvv,
            amount,
            currency: request.currency,
            merchant_id: request.merchant_id,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            processed_at: None,
            error_msg: None,
        }
    }

    pub fn masked_card_number(&self) -> String {
        mask_card_number(&self.card_number)
    }

    /// Conditionally moves the payment from `from` to `to`.
    ///
    /// Returns `Ok(false)` without touching the payment when it is no longer in
    /// `from`, which is how concurrent or repeated processing becomes a no-op.
    pub fn transition(
        &mut self,
        from: PaymentStatus,
        to: PaymentStatus,
        error_msg: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if self.status != from {
            return Ok(false);
        }
        if !from.can_transition_to(to) {
            return Err(PaymentError::InvalidTransition { from, to });
        }
        self.status = to;
        self.updated_at = now;
        self.processed_at = Some(now);
        self.error_msg = error_msg;
        Ok(true)
    }
}

/// Summary returned to the caller of the create path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub status: PaymentStatus,
    pub amount: Amount,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            status: payment.status,
            amount: payment.amount,
            currency: payment.currency.clone(),
            created_at: payment.created_at,
            message: "Payment created and queued for processing".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn card(number: &str, cvv: &str, month: u32, year: i32) -> CardDetails {
        CardDetails {
            number: number.to_string(),
            holder: "John Doe".to_string(),
            expiry_month: month,
            expiry_year: year,
            cvv: cvv.to_string(),
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            card_number: "1234567890123456".to_string(),
            card_holder: "John Doe".to_string(),
            expiry_month: 12,
            expiry_year: 2099,
            cvv: "123".to_string(),
            amount: dec!(100.50),
            currency: "BRL".to_string(),
            merchant_id: "merchant123".to_string(),
        }
    }

    #[test]
    fn test_card_validation_accepts_valid_card() {
        assert!(card("1234567890123456", "123", 12, 2030).validate(2026, 10).is_ok());
    }

    #[test]
    fn test_card_valid_through_current_month() {
        assert!(card("1234567890123456", "123", 10, 2026).validate(2026, 10).is_ok());
        assert!(matches!(
            card("1234567890123456", "123", 9, 2026).validate(2026, 10),
            Err(PaymentError::InvalidCardData(_))
        ));
        assert!(matches!(
            card("1234567890123456", "123", 12, 2025).validate(2026, 10),
            Err(PaymentError::InvalidCardData(_))
        ));
    }

    #[test]
    fn test_card_structural_checks() {
        for bad in [
            card("123", "123", 12, 2030),
            card("12345678901234567", "123", 12, 2030),
            card("1234567890123456", "12", 12, 2030),
            card("1234567890123456", "1234", 12, 2030),
            card("1234567890123456", "123", 0, 2030),
            card("1234567890123456", "123", 13, 2030),
        ] {
            assert!(
                matches!(bad.validate(2026, 10), Err(PaymentError::InvalidCardData(_))),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_mask_card_number() {
        assert_eq!(mask_card_number("1234567890123456"), "************3456");
        assert_eq!(mask_card_number("12"), "12");
    }

    #[test]
    fn test_request_field_validation() {
        assert_eq!(request().validated_amount().unwrap().value(), dec!(100.50));

        let mut zero = request();
        zero.amount = dec!(0);
        assert!(matches!(
            zero.validated_amount(),
            Err(PaymentError::ValidationError(_))
        ));

        let mut no_currency = request();
        no_currency.currency = " ".to_string();
        assert!(no_currency.validated_amount().is_err());

        let mut no_merchant = request();
        no_merchant.merchant_id = String::new();
        assert!(no_merchant.validated_amount().is_err());
    }

    #[test]
    fn test_new_payment_is_pending() {
        let now = Utc::now();
        let req = request();
        let amount = req.validated_amount().unwrap();
        let payment = Payment::new(req, amount, now);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.created_at, now);
        assert_eq!(payment.updated_at, now);
        assert!(payment.processed_at.is_none());
        assert!(payment.error_msg.is_none());
    }

    #[test]
    fn test_status_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        for terminal in [Completed, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, Processing, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_transition_is_conditional() {
        let req = request();
        let amount = req.validated_amount().unwrap();
        let mut payment = Payment::new(req, amount, Utc::now());

        let later = Utc::now();
        assert!(payment
            .transition(PaymentStatus::Pending, PaymentStatus::Processing, None, later)
            .unwrap());
        assert_eq!(payment.processed_at, Some(later));

        // Second claim loses: status is no longer Pending.
        assert!(!payment
            .transition(PaymentStatus::Pending, PaymentStatus::Processing, None, later)
            .unwrap());

        assert!(payment
            .transition(
                PaymentStatus::Processing,
                PaymentStatus::Failed,
                Some("declined".to_string()),
                later,
            )
            .unwrap());
        assert_eq!(payment.error_msg.as_deref(), Some("declined"));

        assert!(matches!(
            payment.transition(PaymentStatus::Failed, PaymentStatus::Completed, None, later),
            Err(PaymentError::InvalidTransition { .. })
        ));
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[test]
    fn test_payment_id_parse() {
        let id = PaymentId::new();
        assert_eq!(id.to_string().parse::<PaymentId>().unwrap(), id);
        assert!("not-a-uuid".parse::<PaymentId>().is_err());
    }
}
