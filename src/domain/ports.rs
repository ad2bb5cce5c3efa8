use super::account::{Account, Balance};
use super::notification::PaymentNotification;
use super::payment::{Payment, PaymentId, PaymentStatus};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Durable record of payments. The source of truth for payment status.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a new payment. Fails with `Duplicate` if the id already exists.
    async fn create(&self, payment: Payment) -> Result<()>;
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    /// Atomically moves a payment from `from` to `to`, stamping its timestamps.
    ///
    /// Returns `Ok(false)` when the payment is no longer in `from`.
    async fn update_status(
        &self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        error_msg: Option<String>,
    ) -> Result<bool>;
    /// Payments of a merchant, most recent first.
    async fn list_by_merchant(
        &self,
        merchant_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Payment>>;
}

/// Card-linked balances. Callers compute the new balance; the ledger stores it.
#[async_trait]
pub trait AccountLedger: Send + Sync {
    async fn provision(&self, account: Account) -> Result<()>;
    async fn get(&self, card_number: &str) -> Result<Option<Account>>;
    async fn update_balance(&self, card_number: &str, new_balance: Balance) -> Result<()>;
    async fn all_accounts(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: &PaymentNotification) -> Result<()>;
}

/// Consumption side of the notification channel.
#[async_trait]
pub trait NotificationSource: Send {
    /// Next raw message, or `None` once the channel is closed.
    async fn next_message(&mut self) -> Option<Result<Vec<u8>>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approve,
    Decline(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingDecision {
    pub verdict: Verdict,
    /// Simulated processor round trip, awaited after the payment is claimed.
    pub latency: Duration,
}

/// Stand-in for the external payment processor call.
pub trait OutcomePolicy: Send + Sync {
    fn decide(&self, payment: &Payment) -> ProcessingDecision;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type AccountLedgerBox = Box<dyn AccountLedger>;
pub type PublisherBox = Box<dyn NotificationPublisher>;
pub type OutcomePolicyBox = Box<dyn OutcomePolicy>;
