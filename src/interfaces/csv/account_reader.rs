use crate::domain::account::{Account, Balance};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct AccountRow {
    card_number: String,
    #[serde(with = "rust_decimal::serde::str")]
    balance: Decimal,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TryFrom<AccountRow> for Account {
    type Error = PaymentError;

    fn try_from(row: AccountRow) -> Result<Self> {
        let balance = Balance::new(row.balance);
        if balance.is_negative() {
            return Err(PaymentError::ValidationError(format!(
                "negative opening balance for account {}",
                crate::domain::payment::mask_card_number(&row.card_number)
            )));
        }
        Ok(Account::new(row.card_number, balance, row.is_active))
    }
}

/// Reads seed accounts (`card_number,balance,is_active`) from a CSV source.
///
/// `is_active` may be omitted and defaults to `true`.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn accounts(self) -> impl Iterator<Item = Result<Account>> {
        self.reader
            .into_deserialize::<AccountRow>()
            .map(|row| row.map_err(PaymentError::from).and_then(Account::try_from))
    }
}
