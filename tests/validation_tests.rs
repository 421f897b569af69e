use std::process::Command;
use tempfile::TempDir;

fn run_tl(dir: &TempDir, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_tl"))
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .args(args)
        .output()
        .expect("Failed to run tl")
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_empty_description_rejected() {
    let dir = TempDir::new().unwrap();

    let output = run_tl(&dir, &["task", ""]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No description was given"));

    let output = run_tl(&dir, &["note", "   "]);
    assert!(!output.status.success());
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_tl(&dir, &["frobnicate"]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_ids_rejected() {
    let dir = TempDir::new().unwrap();
    run_tl(&dir, &["task", "one"]);

    for ids in ["abc", "0", "4-2", "1-b"] {
        let output = run_tl(&dir, &["check", ids]);
        assert!(!output.status.success(), "{} accepted", ids);
        assert!(stderr(&output).contains("Invalid id"), "{}: {}", ids, stderr(&output));
    }
}

#[test]
fn test_invalid_priority_on_create() {
    let dir = TempDir::new().unwrap();

    let output = run_tl(&dir, &["task", "x", "-p", "high"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid priority: high"));

    let storage = dir.path().join("data/taskline/storage/storage.json");
    let content = std::fs::read_to_string(storage).unwrap_or_default();
    assert!(!content.contains("\"x\""));
}

#[test]
fn test_invalid_due_date_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run_tl(&dir, &["task", "x", "--due", "whenever"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid date format: whenever"));
}

#[test]
fn test_move_without_boards_rejected() {
    let dir = TempDir::new().unwrap();
    run_tl(&dir, &["task", "x"]);
    let output = run_tl(&dir, &["move", "1", "@"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No boards were given"));
}

#[test]
fn test_unsupported_language_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("config/taskline");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.json"), r#"{"language": "tlh"}"#).unwrap();

    let output = run_tl(&dir, &[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unsupported language"));
}
