use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

const CATALOG: &str = "../../tests/fixtures/catalog";

fn workdir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lieferlern_cli_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap_or_else(|e| panic!("create {dir:?}: {e}"));
    dir
}

fn lieferlern(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lieferlern").unwrap_or_else(|e| panic!("binary: {e}"));
    cmd.env_remove("RUST_LOG")
        .env_remove("LIEFERLERN_LEARNING_RATE")
        .env_remove("LIEFERLERN_DISCOUNT_FACTOR")
        .env_remove("LIEFERLERN_EXPLORATION_RATE")
        .args(["--catalog", CATALOG, "--seed", "42"])
        .arg("--qtable")
        .arg(dir.join("qtable.json"))
        .arg("--rankings")
        .arg(dir.join("rankings.json"));
    cmd
}

#[test]
fn feedback_persists_the_table() {
    let dir = workdir("feedback");
    lieferlern(&dir)
        .args(["feedback", "--input", "../../tests/fixtures/feedback/sample.ok.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\":\"Q3_D3_P3_S5\""))
        .stdout(predicate::str::contains("\"supplier_name\":\"Spreewerk\""));

    assert!(dir.join("qtable.json").exists());
    lieferlern(&dir)
        .args(["export"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_entries\": 1"));
}

#[test]
fn invalid_feedback_fails() {
    let dir = workdir("bad_feedback");
    lieferlern(&dir)
        .args(["feedback", "--input", "../../tests/fixtures/feedback/sample.bad.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 feedback events rejected"));
}

#[test]
fn rank_filters_by_city_and_stores_snapshot() {
    let dir = workdir("rank");
    let output = lieferlern(&dir)
        .args(["rank", "--product", "456", "--city", "berlin", "--store"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 3"))
        .stdout(predicate::str::contains("Südwind").not())
        .get_output()
        .stdout
        .clone();
    let ranking: serde_json::Value =
        serde_json::from_slice(&output).unwrap_or_else(|e| panic!("ranking json: {e}"));
    assert_eq!(ranking["suppliers"][0]["supplier_id"], 1);
    assert_eq!(ranking["suppliers"][0]["rank"], 1);

    let as_of = ranking["as_of"].as_str().unwrap_or_default();
    let date = &as_of[..10];
    lieferlern(&dir)
        .args(["snapshot", "--product", "456", "--city", "BERLIN", "--date", date])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"product_id\": 456"));
}

#[test]
fn train_reports_summary() {
    let dir = workdir("train");
    lieferlern(&dir)
        .args(["train", "--iterations", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"suppliers_processed\": 4"))
        .stdout(predicate::str::contains("\"updates_applied\": 35"));

    lieferlern(&dir)
        .args(["qvalues", "--supplier", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"Q5_D5_P3_S4\""));
}

#[test]
fn unknown_supplier_fails() {
    let dir = workdir("unknown");
    lieferlern(&dir)
        .args(["qvalues", "--supplier", "999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("supplier 999 not found"));
}

#[test]
fn missing_snapshot_fails() {
    let dir = workdir("snapshot");
    lieferlern(&dir)
        .args(["snapshot", "--product", "456", "--date", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
