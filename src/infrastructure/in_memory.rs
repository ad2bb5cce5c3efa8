use crate::domain::account::{Account, Balance};
use crate::domain::notification::PaymentNotification;
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{AccountLedger, NotificationPublisher, NotificationSource, PaymentStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

/// A thread-safe in-memory payment store.
///
/// Uses `Arc<RwLock<HashMap<PaymentId, Payment>>>` to allow shared concurrent access.
/// Status updates run under the write lock, which makes the conditional
/// transition atomic.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.id) {
            return Err(PaymentError::Duplicate(payment.id.to_string()));
        }
        payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        error_msg: Option<String>,
    ) -> Result<bool> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("payment {}", id)))?;
        payment.transition(from, to, error_msg, Utc::now())
    }

    async fn list_by_merchant(
        &self,
        merchant_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut matching: Vec<Payment> = payments
            .values()
            .filter(|p| p.merchant_id == merchant_id)
            .cloned()
            .collect();
        sort_most_recent_first(&mut matching);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

/// Orders payments by creation time, newest first, with the id as tie-breaker.
pub(crate) fn sort_most_recent_first(payments: &mut [Payment]) {
    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// A thread-safe in-memory account ledger keyed by card number.
#[derive(Default, Clone)]
pub struct InMemoryAccountLedger {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl InMemoryAccountLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountLedger for InMemoryAccountLedger {
    async fn provision(&self, account: Account) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.card_number.clone(), account);
        Ok(())
    }

    async fn get(&self, card_number: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(card_number).cloned())
    }

    async fn update_balance(&self, card_number: &str, new_balance: Balance) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(card_number)
            .ok_or(PaymentError::AccountNotFound)?;
        account.balance = new_balance;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;
        let mut all: Vec<Account> = accounts.values().cloned().collect();
        all.sort_by(|a, b| a.card_number.cmp(&b.card_number));
        Ok(all)
    }
}

/// An unbounded in-process notification channel.
///
/// Messages travel as encoded bytes, the same way they would over a broker.
pub struct InMemoryChannel;

impl InMemoryChannel {
    pub fn unbounded() -> (InMemoryPublisher, InMemorySource) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            InMemoryPublisher {
                sender: Arc::new(RwLock::new(Some(tx))),
            },
            InMemorySource { receiver: rx },
        )
    }
}

/// Publishing half of [`InMemoryChannel`]. Clones share the same channel.
#[derive(Clone)]
pub struct InMemoryPublisher {
    sender: Arc<RwLock<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl InMemoryPublisher {
    /// Closes the channel for every clone. Buffered messages stay deliverable.
    pub async fn close(&self) {
        self.sender.write().await.take();
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryPublisher {
    async fn publish(&self, notification: &PaymentNotification) -> Result<()> {
        let bytes = notification.to_bytes()?;
        let sender = self.sender.read().await;
        let sender = sender
            .as_ref()
            .ok_or_else(|| PaymentError::TransientError("channel closed".to_string()))?;
        sender
            .send(bytes)
            .map_err(|_| PaymentError::TransientError("no consumer attached".to_string()))
    }
}

/// Consuming half of [`InMemoryChannel`].
pub struct InMemorySource {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl NotificationSource for InMemorySource {
    async fn next_message(&mut self) -> Option<Result<Vec<u8>>> {
        self.receiver.recv().await.map(Ok)
    }
}
