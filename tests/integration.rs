use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn catsum_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_catsum"))
}

fn write_catalog(root: &Path, samples: &[&str]) {
    let samples: Vec<serde_json::Value> = samples
        .iter()
        .enumerate()
        .map(|(i, name)| {
            serde_json::json!({
                "name": name,
                "files": [{
                    "path": format!("/genomes/RAREP12345/{}/1/{}.bam", name, name),
                    "uri": format!("file:///genomes/RAREP12345/{}/1/{}.bam", name, name),
                    "size": 1000 + i,
                    "format": "BAM"
                }]
            })
        })
        .collect();
    fs::write(
        root.join("data/catalog.json"),
        serde_json::json!({ "samples": samples }).to_string(),
    )
    .unwrap();
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    write_catalog(&root, &["LP1234567-DNA_A01", "LP7654321-DNA_B02"]);

    let config_content = format!(
        r#"[db]
path = "{root}/data/catsum.sqlite"

[crawl]
summary_dir = "{root}/data/summary"
samples_file = "{root}/data/samples.txt"

[aggregate]
intervals = 10

[catalog]
kind = "json"

[catalog.json]
path = "{root}/data/catalog.json"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("catsum.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_catsum(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = catsum_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run catsum binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catsum(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_catsum(&config_path, &["init"]);
    assert!(success, "Second init failed (not idempotent)");
}

#[test]
fn test_crawl_creates_streams() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catsum(&config_path, &["crawl"]);
    assert!(success, "crawl failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("samples crawled: 2"));
    assert!(stdout.contains("streams created: 2"));
    assert!(stdout.contains("ok"));

    let ledger = fs::read_to_string(tmp.path().join("data/samples.txt")).unwrap();
    assert_eq!(ledger.lines().count(), 2);
}

#[test]
fn test_crawl_resumes_from_ledger() {
    let (tmp, config_path) = setup_test_env();

    run_catsum(&config_path, &["crawl"]);
    let (stdout, _, success) = run_catsum(&config_path, &["crawl"]);
    assert!(success);
    assert!(stdout.contains("samples skipped: 2"), "got: {}", stdout);
    assert!(stdout.contains("samples crawled: 0"), "got: {}", stdout);

    write_catalog(
        tmp.path(),
        &["LP1234567-DNA_A01", "LP7654321-DNA_B02", "LP1111111-DNA_C03"],
    );
    let (stdout, _, _) = run_catsum(&config_path, &["crawl"]);
    assert!(stdout.contains("samples crawled: 1"), "got: {}", stdout);
    assert!(stdout.contains("streams created: 0"), "got: {}", stdout);
}

#[test]
fn test_crawl_limit() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_catsum(&config_path, &["crawl", "--limit", "1"]);
    assert!(success);
    assert!(stdout.contains("samples listed: 1"), "got: {}", stdout);
}

#[test]
fn test_run_then_stats() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catsum(&config_path, &["run"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("numeric: 1"), "got: {}", stdout);
    assert!(stdout.contains("categorical: 1"), "got: {}", stdout);

    let (stdout, _, success) = run_catsum(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Samples done: 2"), "got: {}", stdout);
    assert!(stdout.contains("Attributes:   2"), "got: {}", stdout);
    assert!(stdout.contains("File paths:   1"), "got: {}", stdout);
}

#[test]
fn test_stats_leaves_crawl_state_untouched() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catsum(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Samples done: 0"), "got: {}", stdout);
    assert!(!tmp.path().join("data/samples.txt").exists());
    assert!(!tmp.path().join("data/summary").exists());
}

#[test]
fn test_normalize_needs_no_config() {
    let output = Command::new(catsum_binary())
        .arg("--config")
        .arg("/nonexistent/catsum.toml")
        .args(["normalize", "/genomes/RAREP12345/LP1234567-DNA_A01/7/x.bam"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), ";genomes;DELIVERY_ID;SAMPLE_ID;EXECUTION;x.bam");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_catsum(&tmp.path().join("missing.toml"), &["crawl"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "got: {}", stderr);
}
