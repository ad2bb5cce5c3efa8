//! Application layer orchestrating the payment lifecycle.
//!
//! `PaymentEngine` owns the create and process paths. `Worker` consumes the
//! notification channel and hands every payment to the engine on its own task.

pub mod engine;
pub mod metrics;
pub mod worker;
