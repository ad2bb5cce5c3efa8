use cardpay::application::engine::PaymentEngine;
use cardpay::application::metrics::InMemoryMetrics;
use cardpay::application::worker::Worker;
use cardpay::config::Config;
use cardpay::domain::payment::{Payment, PaymentStatus};
use cardpay::domain::ports::{AccountLedgerBox, PaymentStoreBox};
use cardpay::infrastructure::in_memory::{
    InMemoryAccountLedger, InMemoryChannel, InMemoryPaymentStore,
};
use cardpay::infrastructure::simulated_processor::RandomOutcome;
use cardpay::interfaces::csv::account_reader::AccountReader;
use cardpay::interfaces::csv::account_writer::AccountWriter;
use cardpay::interfaces::csv::payment_writer::PaymentWriter;
use cardpay::interfaces::csv::request_reader::RequestReader;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input payment requests CSV file
    input: PathBuf,

    /// Seed accounts CSV file (card_number,balance,is_active)
    #[arg(long, env = "CARDPAY_ACCOUNTS")]
    accounts: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "CARDPAY_DB_PATH")]
    db_path: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "CARDPAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured level
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Probability that the simulated processor approves a payment
    #[arg(long)]
    success_rate: Option<f64>,

    /// Lower bound of the simulated processing latency
    #[arg(long)]
    min_latency_ms: Option<u64>,

    /// Upper bound of the simulated processing latency
    #[arg(long)]
    max_latency_ms: Option<u64>,

    /// Write final account balances to this CSV file
    #[arg(long)]
    accounts_out: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(rate) = self.success_rate {
            config.processor.success_rate = rate;
        }
        if let Some(min) = self.min_latency_ms {
            config.processor.min_latency_ms = min;
        }
        if let Some(max) = self.max_latency_ms {
            config.processor.max_latency_ms = max;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn in_memory_storage() -> (PaymentStoreBox, AccountLedgerBox) {
    let payment_store: PaymentStoreBox = Box::new(InMemoryPaymentStore::new());
    let ledger: AccountLedgerBox = Box::new(InMemoryAccountLedger::new());
    (payment_store, ledger)
}

#[cfg(feature = "storage-rocksdb")]
fn open_storage(db_path: Option<&Path>) -> Result<(PaymentStoreBox, AccountLedgerBox)> {
    use cardpay::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            info!(path = %path.display(), "Using RocksDB storage");
            let store = RocksDBStore::open(path)?;
            let payment_store: PaymentStoreBox = Box::new(store.clone());
            let ledger: AccountLedgerBox = Box::new(store);
            Ok((payment_store, ledger))
        }
        None => Ok(in_memory_storage()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_storage(db_path: Option<&Path>) -> Result<(PaymentStoreBox, AccountLedgerBox)> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(in_memory_storage())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_tracing(&config.log_level);

    let (payment_store, ledger) = open_storage(cli.db_path.as_deref())?;

    if let Some(path) = &cli.accounts {
        let file = File::open(path).into_diagnostic()?;
        let mut seeded = 0usize;
        for account in AccountReader::new(file).accounts() {
            match account {
                Ok(account) => {
                    ledger.provision(account).await?;
                    seeded += 1;
                }
                Err(e) => error!(error = %e, "Error reading account"),
            }
        }
        info!(seeded, "Accounts loaded");
    }

    let metrics = Arc::new(InMemoryMetrics::new());
    let (publisher, source) = InMemoryChannel::unbounded();
    let engine = Arc::new(
        PaymentEngine::new(payment_store, ledger, Box::new(publisher.clone()))
            .with_outcome_policy(Box::new(RandomOutcome::from(&config.processor)))
            .with_metrics(metrics.clone())
            .with_config(config.engine.clone()),
    );
    let handle = Worker::new(Arc::clone(&engine)).spawn(source);
    let in_flight = handle.in_flight();

    let file = File::open(&cli.input).into_diagnostic()?;
    let mut created = Vec::new();
    for (row, request) in RequestReader::new(file).requests().enumerate() {
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                error!(row = row + 1, error = %e, "Error reading payment request");
                continue;
            }
        };
        match engine.create_payment(request).await {
            Ok(response) => created.push(response.id),
            Err(e) if e.is_client_error() => {
                warn!(row = row + 1, reason = %e, "Payment rejected")
            }
            Err(e) => error!(row = row + 1, error = %e, "Failed to create payment"),
        }
    }

    publisher.close().await;
    let stats = handle.join().await;
    in_flight.wait_idle().await;

    let mut payments: Vec<Payment> = Vec::with_capacity(created.len());
    for id in created {
        payments.push(engine.get_payment(id).await?);
    }
    let mut writer = PaymentWriter::new(io::stdout().lock());
    writer.write_payments(&payments)?;

    if let Some(path) = &cli.accounts_out {
        let accounts = engine.accounts().await?;
        let file = File::create(path).into_diagnostic()?;
        AccountWriter::new(file).write_accounts(accounts)?;
    }

    let snapshot = metrics.snapshot();
    info!(
        created = snapshot.created,
        published = snapshot.published,
        publish_failures = snapshot.publish_failures,
        consumed = stats.dispatched,
        malformed = stats.malformed,
        completed = snapshot.processed(PaymentStatus::Completed),
        failed = snapshot.processed(PaymentStatus::Failed),
        "Batch finished"
    );

    Ok(())
}
