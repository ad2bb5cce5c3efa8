use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let mut cmd = Command::new(cargo_bin!("cardpay"));
    cmd.env_remove("RUST_LOG")
        .arg("tests/fixtures/requests.csv")
        .arg("--db-path")
        .arg("some_db");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("cardpay"));
    cmd.env_remove("RUST_LOG")
        .arg("tests/fixtures/requests.csv")
        .arg("--db-path")
        .arg(&db_path)
        .args(["--min-latency-ms", "0", "--max-latency-ms", "0"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Falling back").not());
}
