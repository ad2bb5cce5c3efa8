use crate::application::metrics::{ChannelOp, NoopMetrics, PaymentMetrics};
use crate::config::EngineConfig;
use crate::domain::account::Account;
use crate::domain::notification::PaymentNotification;
use crate::domain::payment::{
    Payment, PaymentId, PaymentRequest, PaymentResponse, PaymentStatus, mask_card_number,
};
use crate::domain::ports::{
    AccountLedgerBox, OutcomePolicyBox, PaymentStoreBox, PublisherBox, Verdict,
};
use crate::error::{PaymentError, Result};
use crate::infrastructure::simulated_processor::RandomOutcome;
use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

/// Re-check interval while waiting on a payment another invocation is
/// processing. Covers winners that do not share this engine.
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of one invocation of the processing path.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Completed,
    Failed { reason: String },
    /// Another invocation owns or already finished the payment. Nothing was
    /// changed. `status` is never `Processing`: a payment still being worked
    /// on is waited for until it settles.
    Skipped { status: PaymentStatus },
}

/// The payment lifecycle engine.
///
/// `PaymentEngine` owns the payment store, the account ledger, and the
/// notification publisher. The create path validates and persists payments in
/// `Pending` and announces them; the process path moves them to a terminal
/// status and applies the debit at most once per payment.
pub struct PaymentEngine {
    payment_store: PaymentStoreBox,
    ledger: AccountLedgerBox,
    publisher: PublisherBox,
    outcome: OutcomePolicyBox,
    metrics: Arc<dyn PaymentMetrics>,
    config: EngineConfig,
    /// One lock per card number around the balance read-modify-write.
    debit_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Woken whenever this engine records a terminal status.
    settled: Notify,
}

impl PaymentEngine {
    /// Creates a new `PaymentEngine` with the default simulated processor.
    ///
    /// # Arguments
    ///
    /// * `payment_store` - Durable record of payments.
    /// * `ledger` - The card-linked account balances.
    /// * `publisher` - Channel announcing newly created payments to workers.
    pub fn new(payment_store: PaymentStoreBox, ledger: AccountLedgerBox, publisher: PublisherBox) -> Self {
        Self {
            payment_store,
            ledger,
            publisher,
            outcome: Box::new(RandomOutcome::default()),
            metrics: Arc::new(NoopMetrics),
            config: EngineConfig::default(),
            debit_locks: Mutex::new(HashMap::new()),
            settled: Notify::new(),
        }
    }

    pub fn with_outcome_policy(mut self, outcome: OutcomePolicyBox) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn PaymentMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metrics(&self) -> &dyn PaymentMetrics {
        self.metrics.as_ref()
    }

    /// Validates a request, persists a `Pending` payment, and announces it.
    ///
    /// Validation and business rules short-circuit before any write. A failed
    /// publish is logged but does not fail the call: the payment exists and
    /// stays `Pending` until something reconciles it.
    pub async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentResponse> {
        let amount = request.validated_amount()?;
        let now = Utc::now();
        request.card().validate(now.year(), now.month())?;

        let masked = mask_card_number(&request.card_number);
        let account = match self.persistence("get account", self.ledger.get(&request.card_number)).await {
            Ok(Some(account)) => account,
            Ok(None) => return Err(PaymentError::AccountNotFound),
            Err(e) => {
                error!(card_number = %masked, error = %e, "Failed to get account");
                return Err(PaymentError::AccountNotFound);
            }
        };

        if !account.has_sufficient_balance(amount) {
            return Err(PaymentError::InsufficientBalance);
        }

        let payment = Payment::new(request, amount, now);
        let response = PaymentResponse::from(&payment);
        let notification = PaymentNotification::from(&payment);
        let (merchant_id, currency) = (payment.merchant_id.clone(), payment.currency.clone());

        if let Err(e) = self
            .persistence("create payment", self.payment_store.create(payment))
            .await
        {
            error!(payment_id = %response.id, error = %e, "Failed to create payment");
            return Err(e);
        }
        self.metrics
            .payment_created(&merchant_id, &currency, amount.value());

        match self
            .bounded("publish notification", self.publisher.publish(&notification), PaymentError::TransientError)
            .await
        {
            Ok(()) => self.metrics.notification(ChannelOp::Publish, true),
            Err(e) => {
                self.metrics.notification(ChannelOp::Publish, false);
                error!(payment_id = %response.id, error = %e, "Failed to send payment to queue");
            }
        }

        info!(
            payment_id = %response.id,
            merchant_id = %merchant_id,
            card_number = %masked,
            "Payment created successfully"
        );
        Ok(response)
    }

    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment> {
        self.persistence("get payment", self.payment_store.get(id))
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {}", id)))
    }

    /// Payments of a merchant, most recent first. A zero `limit` means the
    /// configured default page size.
    pub async fn get_payments_by_merchant(
        &self,
        merchant_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Payment>> {
        let limit = if limit == 0 {
            self.config.default_page_size
        } else {
            limit
        };
        self.persistence(
            "list payments",
            self.payment_store.list_by_merchant(merchant_id, limit, offset),
        )
        .await
        .inspect_err(|e| error!(merchant_id, error = %e, "Failed to get payments by merchant"))
    }

    /// Every account in the ledger, for reporting.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        self.persistence("list accounts", self.ledger.all_accounts())
            .await
    }

    /// Cancels a payment that has not been picked up for processing yet.
    pub async fn cancel_payment(&self, id: PaymentId) -> Result<Payment> {
        let cancelled = self
            .persistence(
                "cancel payment",
                self.payment_store.update_status(
                    id,
                    PaymentStatus::Pending,
                    PaymentStatus::Cancelled,
                    None,
                ),
            )
            .await?;
        let payment = self.get_payment(id).await?;
        if !cancelled {
            return Err(PaymentError::InvalidTransition {
                from: payment.status,
                to: PaymentStatus::Cancelled,
            });
        }
        info!(payment_id = %id, "Payment cancelled");
        Ok(payment)
    }

    /// Drives a payment from `Pending` to a terminal status.
    ///
    /// Safe to call any number of times, concurrently or not, for the same id:
    /// only the invocation that wins the `Pending -> Processing` write goes on,
    /// every other one returns [`ProcessOutcome::Skipped`]. A caller that finds
    /// the payment `Processing` waits, up to the call timeout, for the winner to
    /// finish, so every caller reports the same terminal status.
    pub async fn process_payment(&self, id: PaymentId) -> Result<ProcessOutcome> {
        let started = Instant::now();
        let payment = self.get_payment(id).await?;
        if payment.status != PaymentStatus::Pending {
            let status = self.settled_status(id, payment.status).await?;
            debug!(payment_id = %id, %status, "Payment already claimed, skipping");
            return Ok(ProcessOutcome::Skipped { status });
        }

        let decision = self.outcome.decide(&payment);

        let claimed = self
            .persistence(
                "mark processing",
                self.payment_store.update_status(
                    id,
                    PaymentStatus::Pending,
                    PaymentStatus::Processing,
                    None,
                ),
            )
            .await
            .inspect_err(|e| {
                error!(payment_id = %id, error = %e, "Failed to update payment status to processing")
            })?;
        if !claimed {
            let observed = self.get_payment(id).await?.status;
            let status = self.settled_status(id, observed).await?;
            debug!(payment_id = %id, %status, "Lost processing claim, skipping");
            return Ok(ProcessOutcome::Skipped { status });
        }

        tokio::time::sleep(decision.latency).await;

        let outcome = match decision.verdict {
            Verdict::Approve => self.settle(id).await?,
            Verdict::Decline(reason) => {
                warn!(payment_id = %id, %reason, "Payment processing failed");
                self.fail(id, reason).await?
            }
        };

        let status = match &outcome {
            ProcessOutcome::Completed => PaymentStatus::Completed,
            ProcessOutcome::Failed { .. } => PaymentStatus::Failed,
            ProcessOutcome::Skipped { status } => *status,
        };
        self.settled.notify_waiters();
        self.metrics
            .payment_processed(status, &payment.merchant_id, started.elapsed());
        Ok(outcome)
    }

    /// Debits the account and completes the payment, or fails it with the reason.
    async fn settle(&self, id: PaymentId) -> Result<ProcessOutcome> {
        if let Err(e) = self.debit(id).await {
            error!(payment_id = %id, error = %e, "Debit failed");
            return self.fail(id, e.to_string()).await;
        }

        match self
            .persistence(
                "mark completed",
                self.payment_store.update_status(
                    id,
                    PaymentStatus::Processing,
                    PaymentStatus::Completed,
                    None,
                ),
            )
            .await
        {
            Ok(true) => {
                info!(payment_id = %id, "Payment processed successfully");
                Ok(ProcessOutcome::Completed)
            }
            Ok(false) => Err(PaymentError::PersistenceError(format!(
                "payment {} left processing while being settled",
                id
            ))),
            Err(e) => {
                error!(payment_id = %id, error = %e, "Balance debited but completion write failed");
                self.fail(
                    id,
                    format!("Balance debited but completion could not be recorded: {}", e),
                )
                .await
            }
        }
    }

    /// Re-reads the payment and the account, then writes the reduced balance.
    async fn debit(&self, id: PaymentId) -> Result<()> {
        let payment = self
            .get_payment(id)
            .await
            .map_err(|e| PaymentError::PersistenceError(format!("Failed to reload payment: {}", e)))?;

        let card_lock = self.debit_lock(&payment.card_number).await;
        let _debit = card_lock.lock().await;
        let account = self
            .persistence("get account", self.ledger.get(&payment.card_number))
            .await
            .and_then(|account| account.ok_or(PaymentError::AccountNotFound))
            .map_err(|e| {
                PaymentError::PersistenceError(format!("Failed to get account for debit: {}", e))
            })?;

        let new_balance = account.debited(payment.amount).map_err(|_| {
            PaymentError::PersistenceError(
                "Insufficient balance at debit time".to_string(),
            )
        })?;

        self.persistence(
            "update balance",
            self.ledger.update_balance(&payment.card_number, new_balance),
        )
        .await
        .map_err(|e| PaymentError::PersistenceError(format!("Failed to update account balance: {}", e)))
    }

    async fn debit_lock(&self, card_number: &str) -> Arc<Mutex<()>> {
        let mut locks = self.debit_locks.lock().await;
        Arc::clone(locks.entry(card_number.to_string()).or_default())
    }

    /// Status to report for a payment this invocation does not own.
    ///
    /// `Processing` means another invocation is still working on it, so this
    /// waits for the terminal status. Fails with `PersistenceError` once the
    /// call timeout elapses.
    async fn settled_status(&self, id: PaymentId, observed: PaymentStatus) -> Result<PaymentStatus> {
        if observed != PaymentStatus::Processing {
            return Ok(observed);
        }
        let deadline = self.config.call_timeout();
        match tokio::time::timeout(deadline, self.wait_until_settled(id)).await {
            Ok(status) => status,
            Err(_) => {
                warn!(payment_id = %id, "Payment still processing, giving up waiting");
                Err(PaymentError::PersistenceError(format!(
                    "payment {} still processing after {:?}",
                    id, deadline
                )))
            }
        }
    }

    async fn wait_until_settled(&self, id: PaymentId) -> Result<PaymentStatus> {
        loop {
            let notified = self.settled.notified();
            let status = self.get_payment(id).await?.status;
            if status.is_terminal() {
                return Ok(status);
            }
            let _ = tokio::time::timeout(SETTLE_POLL_INTERVAL, notified).await;
        }
    }

    async fn fail(&self, id: PaymentId, reason: String) -> Result<ProcessOutcome> {
        let failed = self
            .persistence(
                "mark failed",
                self.payment_store.update_status(
                    id,
                    PaymentStatus::Processing,
                    PaymentStatus::Failed,
                    Some(reason.clone()),
                ),
            )
            .await
            .inspect_err(|e| {
                error!(payment_id = %id, error = %e, "Failed to record payment failure; payment left processing")
            })?;
        if failed {
            Ok(ProcessOutcome::Failed { reason })
        } else {
            let status = self.get_payment(id).await?.status;
            Ok(ProcessOutcome::Skipped { status })
        }
    }

    async fn persistence<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.bounded(op, fut, PaymentError::PersistenceError).await
    }

    /// Runs a backend call under the configured deadline.
    async fn bounded<T, F>(
        &self,
        op: &'static str,
        fut: F,
        on_timeout: fn(String) -> PaymentError,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = self.config.call_timeout();
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(format!("{} timed out after {:?}", op, deadline))),
        }
    }
}
