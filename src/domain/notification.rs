use super::payment::{Payment, PaymentId};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// "Payment created" message carried from the request path to the worker path.
///
/// Delivery is at-least-once and the payload is informational only: the
/// payment store stays authoritative, so only `payment_id` drives processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub currency: String,
    /// Payment creation time, seconds since the unix epoch.
    pub timestamp: i64,
}

impl PaymentNotification {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<&Payment> for PaymentNotification {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            amount: payment.amount.value(),
            currency: payment.currency.clone(),
            timestamp: payment.created_at.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaymentError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wire_format_field_names() {
        let notification = PaymentNotification {
            payment_id: PaymentId::new(),
            amount: dec!(100.50),
            currency: "BRL".to_string(),
            timestamp: 1_700_000_000,
        };
        let json: serde_json::Value =
            serde_json::from_slice(&notification.to_bytes().unwrap()).unwrap();

        assert_eq!(json["payment_id"], notification.payment_id.to_string());
        assert_eq!(json["currency"], "BRL");
        assert_eq!(json["timestamp"], 1_700_000_000);
        assert_eq!(
            PaymentNotification::from_slice(&notification.to_bytes().unwrap()).unwrap(),
            notification
        );
    }

    #[test]
    fn test_malformed_message_is_codec_error() {
        assert!(matches!(
            PaymentNotification::from_slice(b"{\"payment_id\": 42}"),
            Err(PaymentError::Codec(_))
        ));
        assert!(PaymentNotification::from_slice(b"not json").is_err());
    }
}
