//! Domain layer: payments, accounts, lifecycle notifications, and the
//! capability traits (ports) the application layer is polymorphic over.

pub mod account;
pub mod notification;
pub mod payment;
pub mod ports;
