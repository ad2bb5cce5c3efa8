use crate::application::engine::{PaymentEngine, ProcessOutcome};
use crate::application::metrics::ChannelOp;
use crate::domain::notification::PaymentNotification;
use crate::domain::ports::NotificationSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Counters for one run of the consumption loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    pub dispatched: u64,
    pub malformed: u64,
    pub read_errors: u64,
}

/// Tracks detached processing tasks so callers can wait for them.
#[derive(Clone, Default)]
pub struct InFlight {
    inner: Arc<InFlightInner>,
}

#[derive(Default)]
struct InFlightInner {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard {
    inner: Arc<InFlightInner>,
}

impl InFlight {
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::Acquire)
    }

    /// Resolves once no processing task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn enter(&self) -> InFlightGuard {
        self.inner.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Consumes payment notifications and hands each one to the engine.
///
/// The loop itself is sequential; every notification is processed on its own
/// task so a slow payment never blocks the next dequeue.
pub struct Worker {
    engine: Arc<PaymentEngine>,
    in_flight: InFlight,
}

impl Worker {
    pub fn new(engine: Arc<PaymentEngine>) -> Self {
        Self {
            engine,
            in_flight: InFlight::default(),
        }
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    /// Runs the loop on a background task.
    pub fn spawn<S>(self, source: S) -> WorkerHandle
    where
        S: NotificationSource + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let in_flight = self.in_flight();
        let join = tokio::spawn(async move { self.run(source, shutdown_rx).await });
        WorkerHandle {
            shutdown: shutdown_tx,
            join,
            in_flight,
        }
    }

    /// Pulls from `source` until it closes or `shutdown` flips.
    pub async fn run<S>(&self, mut source: S, mut shutdown: watch::Receiver<bool>) -> WorkerStats
    where
        S: NotificationSource,
    {
        info!("Starting payment worker");
        let mut stats = WorkerStats::default();
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Payment worker stopped");
                        break;
                    }
                }
                message = source.next_message() => match message {
                    None => {
                        info!("Notification channel closed, payment worker stopping");
                        break;
                    }
                    Some(Err(e)) => {
                        stats.read_errors += 1;
                        self.engine.metrics().notification(ChannelOp::Consume, false);
                        error!(error = %e, "Failed to read notification");
                    }
                    Some(Ok(bytes)) => {
                        stats.received += 1;
                        self.dispatch(&bytes, &mut stats);
                    }
                },
            }
        }
        stats
    }

    fn dispatch(&self, bytes: &[u8], stats: &mut WorkerStats) {
        let notification = match PaymentNotification::from_slice(bytes) {
            Ok(notification) => notification,
            Err(e) => {
                stats.malformed += 1;
                self.engine.metrics().notification(ChannelOp::Consume, false);
                warn!(error = %e, "Failed to decode payment notification");
                return;
            }
        };
        self.engine.metrics().notification(ChannelOp::Consume, true);
        stats.dispatched += 1;

        let payment_id = notification.payment_id;
        info!(%payment_id, "Processing payment notification");
        let engine = Arc::clone(&self.engine);
        let guard = self.in_flight.enter();
        tokio::spawn(async move {
            let _guard = guard;
            match engine.process_payment(payment_id).await {
                Ok(ProcessOutcome::Skipped { status }) => {
                    info!(%payment_id, %status, "Duplicate notification ignored")
                }
                Ok(_) => info!(%payment_id, "Payment processing finished"),
                Err(e) => error!(%payment_id, error = %e, "Failed to process payment"),
            }
        });
    }
}

/// Control handle for a spawned [`Worker`].
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<WorkerStats>,
    in_flight: InFlight,
}

impl WorkerHandle {
    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    /// Stops dequeuing. Tasks already dispatched keep running on their own.
    pub async fn shutdown(self) -> WorkerStats {
        let _ = self.shutdown.send(true);
        self.join.await.unwrap_or_else(|e| {
            error!(error = %e, "Payment worker task failed");
            WorkerStats::default()
        })
    }

    /// Waits for the loop to end on its own, i.e. for the source to close.
    pub async fn join(self) -> WorkerStats {
        let Self { shutdown, join, .. } = self;
        let stats = join.await.unwrap_or_else(|e| {
            error!(error = %e, "Payment worker task failed");
            WorkerStats::default()
        });
        drop(shutdown);
        stats
    }
}
