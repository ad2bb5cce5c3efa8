use crate::domain::payment::PaymentStatus;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOp {
    Publish,
    Consume,
}

/// Observability hooks the engine and worker report into.
///
/// Every method defaults to a no-op so sinks only implement what they record.
pub trait PaymentMetrics: Send + Sync {
    fn payment_created(&self, _merchant_id: &str, _currency: &str, _amount: Decimal) {}
    fn payment_processed(&self, _status: PaymentStatus, _merchant_id: &str, _elapsed: Duration) {}
    fn notification(&self, _op: ChannelOp, _succeeded: bool) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl PaymentMetrics for NoopMetrics {}

/// Point-in-time copy of the counters held by [`InMemoryMetrics`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub created: u64,
    pub amount_by_currency: HashMap<String, Decimal>,
    pub processed_by_status: HashMap<PaymentStatus, u64>,
    pub processing_time: Duration,
    pub published: u64,
    pub publish_failures: u64,
    pub consumed: u64,
    pub consume_failures: u64,
}

impl MetricsSnapshot {
    pub fn processed(&self, status: PaymentStatus) -> u64 {
        self.processed_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Counter-based sink kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsSnapshot> {
        // Counters stay usable even if a recording thread panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PaymentMetrics for InMemoryMetrics {
    fn payment_created(&self, _merchant_id: &str, currency: &str, amount: Decimal) {
        let mut inner = self.lock();
        inner.created += 1;
        *inner
            .amount_by_currency
            .entry(currency.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    fn payment_processed(&self, status: PaymentStatus, _merchant_id: &str, elapsed: Duration) {
        let mut inner = self.lock();
        *inner.processed_by_status.entry(status).or_insert(0) += 1;
        inner.processing_time += elapsed;
    }

    fn notification(&self, op: ChannelOp, succeeded: bool) {
        let mut inner = self.lock();
        match (op, succeeded) {
            (ChannelOp::Publish, true) => inner.published += 1,
            (ChannelOp::Publish, false) => inner.publish_failures += 1,
            (ChannelOp::Consume, true) => inner.consumed += 1,
            (ChannelOp::Consume, false) => inner.consume_failures += 1,
        }
    }
}
