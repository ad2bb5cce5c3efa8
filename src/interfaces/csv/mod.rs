//! CSV batch gateway: seed accounts in, payment requests in, reports out.

pub mod account_reader;
pub mod account_writer;
pub mod payment_writer;
pub mod request_reader;
