//! Binary-level tests: configuration startup, the export run and the
//! `format` utility.

mod common;

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::cargo_bin_cmd;
use common::fixtures::{empty_page, listing_page, only_csv_in, read_csv_rows};
use common::wiremock_helpers::{mock_listing_server, mount_status};
use predicates::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn aidb_export() -> assert_cmd::Command {
    cargo_bin_cmd!("aidb-export")
}

/// Runs the binary off the async test thread so the mock server keeps serving.
async fn run_blocking(mut cmd: assert_cmd::Command) -> assert_cmd::assert::Assert {
    let output = tokio::task::spawn_blocking(move || {
        cmd.timeout(Duration::from_secs(30))
            .output()
            .expect("binary should run")
    })
    .await
    .expect("binary task panicked");
    output.assert()
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration startup
// ─────────────────────────────────────────────────────────────────────────────

/// With no config file and piped stdin the binary must fail fast instead of
/// waiting on the create-config prompt.
#[test]
fn test_missing_config_suggests_init_flag() {
    let tmp = TempDir::new().expect("create temp dir");

    aidb_export()
        .current_dir(tmp.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"))
        .stderr(predicate::str::contains("--init"));

    assert!(fs::read_dir(tmp.path()).unwrap().next().is_none(), "nothing should be written");
}

#[test]
fn test_init_creates_config_file() {
    let tmp = TempDir::new().expect("create temp dir");
    let config_path = tmp.path().join("config").join("aidb-export.toml");

    aidb_export()
        .current_dir(tmp.path())
        .arg("--init")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("Created default configuration file"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[http]"));
    assert!(content.contains("[export]"));
    assert!(content.contains("[pagination]"));
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().expect("create temp dir");
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("aidb-export.toml"), "[http]\nbase_url = 3\n").unwrap();

    aidb_export()
        .current_dir(tmp.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_help_works_without_config() {
    let tmp = TempDir::new().expect("create temp dir");

    aidb_export()
        .current_dir(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("aidb-export"))
        .stdout(predicate::str::contains("format"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Export runs
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scrape_writes_timestamped_export() {
    let server = mock_listing_server(vec![listing_page(), empty_page()]).await;
    let tmp = TempDir::new().unwrap();
    let out_dir = tmp.path().join("exports");

    let mut cmd = aidb_export();
    cmd.current_dir(tmp.path())
        .env("RUST_LOG", "info")
        .args(["scrape", "--no-config", "--base-url", server.uri().as_str()])
        .arg("--output-dir")
        .arg(&out_dir);

    let assert = run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Records Exported: 3"));

    // Each saved page is announced once, even with tracing enabled.
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert_eq!(stderr.matches("Saved 3 entries from page 1").count(), 1, "{}", stderr);

    let csv = only_csv_in(&out_dir);
    let name = csv.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("ai_database_export_"), "unexpected name {}", name);
    assert_eq!(read_csv_rows(&csv).len(), 4);
}

#[tokio::test]
async fn test_fatal_stop_exits_non_zero_and_keeps_file() {
    let server = mock_listing_server(vec![listing_page()]).await;
    mount_status(&server, 2, 503).await;
    let tmp = TempDir::new().unwrap();
    let out_dir = tmp.path().join("exports");
    let log_file = tmp.path().join("run.log");

    let mut cmd = aidb_export();
    cmd.current_dir(tmp.path())
        .args(["--no-config", "--base-url", server.uri().as_str()])
        .arg("--output-dir")
        .arg(&out_dir)
        .arg("--log-file")
        .arg(&log_file);

    run_blocking(cmd)
        .await
        .failure()
        .stderr(predicate::str::contains("Export stopped"));

    assert_eq!(read_csv_rows(&only_csv_in(&out_dir)).len(), 4);
    let log = fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("Saved 3 entries from page 1"));
    assert!(log.contains("ERROR"));
}

#[tokio::test]
async fn test_stats_prints_breakdowns() {
    let server = mock_listing_server(vec![listing_page(), empty_page()]).await;
    let tmp = TempDir::new().unwrap();

    let mut cmd = aidb_export();
    cmd.current_dir(tmp.path())
        .args(["stats", "--no-config", "--base-url", server.uri().as_str()])
        .arg("--output-dir")
        .arg(tmp.path().join("out"));

    run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Total Companies in Database: 3"))
        .stdout(predicate::str::contains("- Berlin: 2"))
        .stdout(predicate::str::contains("- de: 1"));
}

#[tokio::test]
async fn test_search_lists_matching_records() {
    let server = mock_listing_server(vec![listing_page(), empty_page()]).await;
    let tmp = TempDir::new().unwrap();

    let mut cmd = aidb_export();
    cmd.current_dir(tmp.path())
        .args(["search", "munich", "--no-config", "--base-url", server.uri().as_str()])
        .arg("--output-dir")
        .arg(tmp.path().join("out"));

    run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Found 1 matches for term 'munich'"))
        .stdout(predicate::str::contains("bolt-ai.io"));
}

// ─────────────────────────────────────────────────────────────────────────────
// format utility
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_format_runs_without_config() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.csv");
    let output = tmp.path().join("out.csv");
    fs::write(&input, "domain;tags\na.test;\"['x', 'y']\"\n").unwrap();

    aidb_export()
        .current_dir(tmp.path())
        .arg("format")
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 cells converted"));

    let rows = read_csv_rows(&output);
    assert_eq!(rows[1], vec!["a.test", r#"["x","y"]"#]);
}

#[test]
fn test_format_refuses_to_overwrite_without_force() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.csv");
    let output = tmp.path().join("out.csv");
    fs::write(&input, "a,b\n1,2\n").unwrap();
    fs::write(&output, "keep me").unwrap();

    aidb_export()
        .current_dir(tmp.path())
        .arg("format")
        .arg(&input)
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");

    aidb_export()
        .current_dir(tmp.path())
        .arg("format")
        .arg(&input)
        .arg(&output)
        .arg("--force")
        .assert()
        .success();
    assert_eq!(read_csv_rows(&output)[1], vec!["1", "2"]);
}

#[test]
fn test_format_rejects_non_csv_paths() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.txt");
    fs::write(&input, "a,b\n1,2\n").unwrap();

    aidb_export()
        .current_dir(tmp.path())
        .arg("format")
        .arg(&input)
        .arg(tmp.path().join("out.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("File must be a CSV file"));
}
