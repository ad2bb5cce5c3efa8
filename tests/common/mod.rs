#![allow(dead_code)]

use async_trait::async_trait;
use cardpay::domain::account::{Account, Balance};
use cardpay::domain::notification::PaymentNotification;
use cardpay::domain::payment::{Payment, PaymentId, PaymentRequest, PaymentStatus};
use cardpay::domain::ports::{AccountLedger, NotificationPublisher, PaymentStore};
use cardpay::error::{PaymentError, Result};
use cardpay::infrastructure::in_memory::{InMemoryAccountLedger, InMemoryPaymentStore};
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

pub const CARD: &str = "1234567890123456";
pub const OTHER_CARD: &str = "6543210987654321";

pub fn request(card_number: &str, amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        card_number: card_number.to_string(),
        card_holder: "John Doe".to_string(),
        expiry_month: 12,
        expiry_year: Utc::now().year() + 1,
        cvv: "123".to_string(),
        amount,
        currency: "BRL".to_string(),
        merchant_id: "merchant123".to_string(),
    }
}

pub async fn seeded_ledger(accounts: &[(&str, Decimal, bool)]) -> InMemoryAccountLedger {
    let ledger = InMemoryAccountLedger::new();
    for (card, balance, active) in accounts {
        ledger
            .provision(Account::new(*card, Balance::new(*balance), *active))
            .await
            .unwrap();
    }
    ledger
}

fn injected(what: &str) -> PaymentError {
    PaymentError::PersistenceError(format!("injected {} failure", what))
}

/// Payment store that fails on demand.
#[derive(Clone, Default)]
pub struct FlakyPaymentStore {
    pub inner: InMemoryPaymentStore,
    pub fail_create: Arc<AtomicBool>,
    /// Fails every status write whose target is one of these.
    pub fail_updates_to: Arc<std::sync::Mutex<Vec<PaymentStatus>>>,
    pub update_calls: Arc<AtomicUsize>,
}

impl FlakyPaymentStore {
    pub fn fail_updates_to(&self, status: PaymentStatus) {
        self.fail_updates_to.lock().unwrap().push(status);
    }
}

#[async_trait]
impl PaymentStore for FlakyPaymentStore {
    async fn create(&self, payment: Payment) -> Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected("create"));
        }
        self.inner.create(payment).await
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.inner.get(id).await
    }

    async fn update_status(
        &self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        error_msg: Option<String>,
    ) -> Result<bool> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates_to.lock().unwrap().contains(&to) {
            return Err(injected("status update"));
        }
        self.inner.update_status(id, from, to, error_msg).await
    }

    async fn list_by_merchant(
        &self,
        merchant_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Payment>> {
        self.inner.list_by_merchant(merchant_id, limit, offset).await
    }
}

/// Account ledger that fails reads or balance writes on demand.
#[derive(Clone, Default)]
pub struct FlakyLedger {
    pub inner: InMemoryAccountLedger,
    pub fail_get: Arc<AtomicBool>,
    pub fail_update: Arc<AtomicBool>,
}

#[async_trait]
impl AccountLedger for FlakyLedger {
    async fn provision(&self, account: Account) -> Result<()> {
        self.inner.provision(account).await
    }

    async fn get(&self, card_number: &str) -> Result<Option<Account>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(injected("account read"));
        }
        self.inner.get(card_number).await
    }

    async fn update_balance(&self, card_number: &str, new_balance: Balance) -> Result<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(injected("balance write"));
        }
        self.inner.update_balance(card_number, new_balance).await
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.inner.all_accounts().await
    }
}

/// Ledger that counts account reads.
#[derive(Clone, Default)]
pub struct CountingLedger {
    pub inner: InMemoryAccountLedger,
    pub gets: Arc<AtomicUsize>,
}

#[async_trait]
impl AccountLedger for CountingLedger {
    async fn provision(&self, account: Account) -> Result<()> {
        self.inner.provision(account).await
    }

    async fn get(&self, card_number: &str) -> Result<Option<Account>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(card_number).await
    }

    async fn update_balance(&self, card_number: &str, new_balance: Balance) -> Result<()> {
        self.inner.update_balance(card_number, new_balance).await
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.inner.all_accounts().await
    }
}

/// Ledger whose balance writes for one card wait until the gate opens.
#[derive(Clone)]
pub struct GatedLedger {
    pub inner: InMemoryAccountLedger,
    pub gated_card: String,
    pub gate: Arc<Notify>,
}

#[async_trait]
impl AccountLedger for GatedLedger {
    async fn provision(&self, account: Account) -> Result<()> {
        self.inner.provision(account).await
    }

    async fn get(&self, card_number: &str) -> Result<Option<Account>> {
        self.inner.get(card_number).await
    }

    async fn update_balance(&self, card_number: &str, new_balance: Balance) -> Result<()> {
        if card_number == self.gated_card {
            self.gate.notified().await;
        }
        self.inner.update_balance(card_number, new_balance).await
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.inner.all_accounts().await
    }
}

/// Publisher whose broker is always down.
#[derive(Clone, Default)]
pub struct FailingPublisher {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl NotificationPublisher for FailingPublisher {
    async fn publish(&self, _notification: &PaymentNotification) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PaymentError::TransientError("broker unavailable".to_string()))
    }
}

/// Publisher that never answers.
#[derive(Clone, Default)]
pub struct HangingPublisher;

#[async_trait]
impl NotificationPublisher for HangingPublisher {
    async fn publish(&self, _notification: &PaymentNotification) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Records what was published without delivering it anywhere.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub published: Arc<std::sync::Mutex<Vec<PaymentNotification>>>,
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(&self, notification: &PaymentNotification) -> Result<()> {
        self.published.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
