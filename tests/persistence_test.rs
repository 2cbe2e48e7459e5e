#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::tempdir;

const PAID_ORDER: &str = "a3d5f7b9-1c2e-4a6b-8d0f-123456789abc";

#[test]
fn test_rocksdb_delivery_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: seed the store and deliver the paid order
    let mut cmd1 = Command::new(cargo_bin!("storefront-pipeline"));
    cmd1.arg("--db-path")
        .arg(&db_path)
        .args(["--fixture", "tests/fixtures/store.json", "deliver", "--order", PAID_ORDER]);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("\"outcome\": \"delivered\""));

    // 2. Second run on the same DB: the delivery row is found, retrigger is a no-op
    let mut cmd2 = Command::new(cargo_bin!("storefront-pipeline"));
    cmd2.arg("--db-path")
        .arg(&db_path)
        .args(["retrigger", "--order", PAID_ORDER]);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("Order already has deliveries"));
}
