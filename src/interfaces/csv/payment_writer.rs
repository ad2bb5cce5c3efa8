use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct PaymentRow<'a> {
    id: String,
    merchant_id: &'a str,
    card_number: String,
    amount: Decimal,
    currency: &'a str,
    status: PaymentStatus,
    error_msg: &'a str,
}

impl<'a> From<&'a Payment> for PaymentRow<'a> {
    fn from(payment: &'a Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            merchant_id: &payment.merchant_id,
            card_number: payment.masked_card_number(),
            amount: payment.amount.value(),
            currency: &payment.currency,
            status: payment.status,
            error_msg: payment.error_msg.as_deref().unwrap_or_default(),
        }
    }
}

/// Writes the payment report. Card numbers are always masked.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_payments<'a, I>(&mut self, payments: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Payment>,
    {
        let mut wrote_any = false;
        for payment in payments {
            self.writer.serialize(PaymentRow::from(payment))?;
            wrote_any = true;
        }
        if !wrote_any {
            // Serialize only emits the header alongside the first row.
            self.writer.write_record([
                "id",
                "merchant_id",
                "card_number",
                "amount",
                "currency",
                "status",
                "error_msg",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
