#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

fn request_csv(amount: &str) -> tempfile::NamedTempFile {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        csv,
        "card_number,card_holder,expiry_month,expiry_year,cvv,amount,currency,merchant_id"
    )
    .unwrap();
    writeln!(csv, "1234567890123456,John Doe,12,2099,123,{},BRL,m1", amount).unwrap();
    csv
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let accounts_out = dir.path().join("balances.csv");

    let mut accounts = tempfile::NamedTempFile::new().unwrap();
    writeln!(accounts, "card_number,balance,is_active").unwrap();
    writeln!(accounts, "1234567890123456,1000.00,true").unwrap();

    // 1. First run: seed the ledger and debit 100.
    let csv1 = request_csv("100.00");
    let mut cmd1 = Command::new(cargo_bin!("cardpay"));
    cmd1.arg(csv1.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--accounts")
        .arg(accounts.path())
        .args(["--success-rate", "1", "--min-latency-ms", "0", "--max-latency-ms", "0"]);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    assert!(String::from_utf8_lossy(&output1.stdout).contains("completed"));

    // 2. Second run: no seed file, the ledger comes from the database.
    let csv2 = request_csv("50.00");
    let mut cmd2 = Command::new(cargo_bin!("cardpay"));
    cmd2.arg(csv2.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--accounts-out")
        .arg(&accounts_out)
        .args(["--success-rate", "1", "--min-latency-ms", "0", "--max-latency-ms", "0"]);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());

    // Should have recovered 900.00 and debited 50.00 = 850.00
    let balances = std::fs::read_to_string(&accounts_out).unwrap();
    assert!(balances.contains("************3456,850.00,true"));
}
