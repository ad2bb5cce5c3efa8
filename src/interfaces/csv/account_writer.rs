use crate::domain::account::Account;
use crate::domain::payment::mask_card_number;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct AccountRow {
    card_number: String,
    balance: Decimal,
    is_active: bool,
}

/// Writes account balances with masked card numbers.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: Vec<Account>) -> Result<()> {
        if accounts.is_empty() {
            self.writer
                .write_record(["card_number", "balance", "is_active"])?;
        }
        for account in accounts {
            self.writer.serialize(AccountRow {
                card_number: mask_card_number(&account.card_number),
                balance: account.balance.0,
                is_active: account.is_active,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
