use crate::config::ProcessorConfig;
use crate::domain::payment::Payment;
use crate::domain::ports::{OutcomePolicy, ProcessingDecision, Verdict};
use rand::Rng;
use std::time::Duration;

pub const DECLINE_REASON: &str = "Payment processing failed due to external service error";

/// Simulated processor: approves with probability `success_rate` after a
/// uniformly drawn latency.
#[derive(Debug, Clone)]
pub struct RandomOutcome {
    success_rate: f64,
    min_latency: Duration,
    max_latency: Duration,
}

impl RandomOutcome {
    pub fn new(success_rate: f64, min_latency: Duration, max_latency: Duration) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            min_latency,
            max_latency: max_latency.max(min_latency),
        }
    }
}

impl From<&ProcessorConfig> for RandomOutcome {
    fn from(config: &ProcessorConfig) -> Self {
        Self::new(
            config.success_rate,
            Duration::from_millis(config.min_latency_ms),
            Duration::from_millis(config.max_latency_ms),
        )
    }
}

impl Default for RandomOutcome {
    fn default() -> Self {
        Self::from(&ProcessorConfig::default())
    }
}

impl OutcomePolicy for RandomOutcome {
    fn decide(&self, _payment: &Payment) -> ProcessingDecision {
        let mut rng = rand::thread_rng();
        let latency = if self.max_latency > self.min_latency {
            rng.gen_range(self.min_latency..=self.max_latency)
        } else {
            self.min_latency
        };
        let verdict = if rng.gen_bool(self.success_rate) {
            Verdict::Approve
        } else {
            Verdict::Decline(DECLINE_REASON.to_string())
        };
        ProcessingDecision { verdict, latency }
    }
}

/// Deterministic policy, mostly for tests and dry runs.
#[derive(Debug, Clone)]
pub struct FixedOutcome {
    decision: ProcessingDecision,
}

impl FixedOutcome {
    pub fn approve() -> Self {
        Self {
            decision: ProcessingDecision {
                verdict: Verdict::Approve,
                latency: Duration::ZERO,
            },
        }
    }

    pub fn decline(reason: impl Into<String>) -> Self {
        Self {
            decision: ProcessingDecision {
                verdict: Verdict::Decline(reason.into()),
                latency: Duration::ZERO,
            },
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.decision.latency = latency;
        self
    }
}

impl OutcomePolicy for FixedOutcome {
    fn decide(&self, _payment: &Payment) -> ProcessingDecision {
        self.decision.clone()
    }
}
