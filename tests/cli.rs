use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn tinypilot_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tinypilot");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/tinypilot.sqlite"

[sources]
repo_path = "{root}/repo"
bounties_path = "{root}/bounties.csv"
tutorials_dir = "{root}/tutorials"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("tinypilot.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_tinypilot(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(tinypilot_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run tinypilot");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, success) = run_tinypilot(&config, &["init"]);
    assert!(success);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data/tinypilot.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    assert!(run_tinypilot(&config, &["init"]).2);
    assert!(run_tinypilot(&config, &["init"]).2);
}

#[test]
fn test_ask_without_api_key_fails_with_instructions() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_tinypilot(&config, &["ask", "what is a Tensor?"]);
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY environment variable is not set"));
    assert!(stderr.contains("export OPENAI_API_KEY="));
}

#[test]
fn test_chat_without_api_key_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_tinypilot(&config, &["chat"]);
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"));
}

#[test]
fn test_history_empty() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_tinypilot(&config, &["history"]);
    assert!(success);
    assert!(stdout.contains("No history."));
}

#[test]
fn test_get_missing_record() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_tinypilot(&config, &["get", "bounty_42"]);
    assert!(!success);
    assert!(stderr.contains("record not found"));
}

#[test]
fn test_stats_on_empty_database() {
    let (_tmp, config) = setup_test_env();
    run_tinypilot(&config, &["init"]);
    let (stdout, _, success) = run_tinypilot(&config, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Collection:  tinygrad_data"));
    assert!(stdout.contains("Records:     0"));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, success) = run_tinypilot(&missing, &["ask", "hi"]);
    // Defaults load fine; the missing key is what stops it.
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[embedding]\nprovider = \"cohere\"\n").unwrap();
    let (_, stderr, success) = run_tinypilot(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"));
}
