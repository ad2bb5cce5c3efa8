use crate::domain::account::{Account, Balance};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{AccountLedger, PaymentStore};
use crate::error::{PaymentError, Result};
use crate::infrastructure::in_memory::sort_most_recent_first;
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing payments, keyed by the id's UUID bytes.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for storing accounts, keyed by card number.
pub const CF_ACCOUNTS: &str = "accounts";

/// A persistent store implementation using RocksDB.
///
/// Serves as both the Payment Store and the Account Ledger, each in its own
/// Column Family. Values are JSON documents.
///
/// Read-modify-write operations (status transitions, balance updates) go
/// through a single writer lock, which is what makes the conditional status
/// write atomic for every clone sharing this `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("payments" and "accounts") exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let cf_accounts = ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments, cf_accounts])?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::PersistenceError(format!("{} column family not found", name)))
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf(cf)?;
        match self.db.get_pinned_cf(handle, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let handle = self.cf(cf)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(handle, key, bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let handle = self.cf(cf)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn create(&self, payment: Payment) -> Result<()> {
        let _writer = self.writer.lock().await;
        let key = payment.id.as_bytes();
        let handle = self.cf(CF_PAYMENTS)?;
        if self.db.get_pinned_cf(handle, key)?.is_some() {
            return Err(PaymentError::Duplicate(payment.id.to_string()));
        }
        self.write(CF_PAYMENTS, key, &payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, id.as_bytes())
    }

    async fn update_status(
        &self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        error_msg: Option<String>,
    ) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let mut payment: Payment = self
            .read(CF_PAYMENTS, id.as_bytes())?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {}", id)))?;
        if !payment.transition(from, to, error_msg, Utc::now())? {
            return Ok(false);
        }
        self.write(CF_PAYMENTS, id.as_bytes(), &payment)?;
        Ok(true)
    }

    async fn list_by_merchant(
        &self,
        merchant_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Payment>> {
        // No secondary index: a full scan of the column family.
        let mut matching: Vec<Payment> = self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| p.merchant_id == merchant_id)
            .collect();
        sort_most_recent_first(&mut matching);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl AccountLedger for RocksDBStore {
    async fn provision(&self, account: Account) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.write(CF_ACCOUNTS, account.card_number.as_bytes(), &account)
    }

    async fn get(&self, card_number: &str) -> Result<Option<Account>> {
        self.read(CF_ACCOUNTS, card_number.as_bytes())
    }

    async fn update_balance(&self, card_number: &str, new_balance: Balance) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut account: Account = self
            .read(CF_ACCOUNTS, card_number.as_bytes())?
            .ok_or(PaymentError::AccountNotFound)?;
        account.balance = new_balance;
        account.updated_at = Utc::now();
        self.write(CF_ACCOUNTS, card_number.as_bytes(), &account)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        // Keys are card numbers, so the iteration order is already sorted.
        self.scan(CF_ACCOUNTS)
    }
}
