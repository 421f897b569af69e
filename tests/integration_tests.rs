//! Integration tests for the tl CLI application
//!
//! These tests run the actual binary against temporary XDG data and config
//! directories and inspect both its output and the files it writes.

use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Test fixture that provides isolated temporary directories for each test
struct TestEnv {
    _temp_dir: TempDir,
    data_dir: PathBuf,
    config_dir: PathBuf,
}

/// Result of running a tl command
struct CommandResult {
    status: i32,
    stdout: String,
    stderr: String,
}

impl CommandResult {
    fn success(&self) -> bool {
        self.status == 0
    }
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data_dir = temp_dir.path().join("data");
        let config_dir = temp_dir.path().join("config");
        fs::create_dir_all(&data_dir).expect("Failed to create data directory");
        fs::create_dir_all(&config_dir).expect("Failed to create config directory");

        Self {
            _temp_dir: temp_dir,
            data_dir,
            config_dir,
        }
    }

    /// Run tl with arguments in the isolated environment
    fn run_tl(&self, args: &[&str]) -> CommandResult {
        let output = Command::new(env!("CARGO_BIN_EXE_tl"))
            .args(args)
            .env("XDG_DATA_HOME", &self.data_dir)
            .env("XDG_CONFIG_HOME", &self.config_dir)
            .env("EDITOR", "true")
            .env_remove("TASKLINE_LOG")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .expect("Failed to execute tl command");

        CommandResult {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    fn root(&self) -> PathBuf {
        self.data_dir.join("taskline")
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.join("taskline/config.json")
    }

    fn read_json(path: PathBuf) -> Value {
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).expect("Stored JSON is valid"),
            Err(_) => Value::Object(Default::default()),
        }
    }

    fn storage(&self) -> Value {
        Self::read_json(self.root().join("storage/storage.json"))
    }

    fn archive(&self) -> Value {
        Self::read_json(self.root().join("archive/archive.json"))
    }
}

// Creation

#[test]
fn test_first_run_creates_config_and_layout() {
    let env = TestEnv::new();
    let result = env.run_tl(&[]);
    assert!(result.success(), "stderr: {}", result.stderr);

    assert!(env.config_path().exists());
    assert!(env.root().join("storage").is_dir());
    assert!(env.root().join("archive").is_dir());
    assert!(env.root().join(".temp").is_dir());
    assert!(result.stdout.contains("tl --help"));
}

#[test]
fn test_create_task() {
    let env = TestEnv::new();
    let result = env.run_tl(&["task", "Test", "Task"]);
    assert!(result.success(), "stderr: {}", result.stderr);
    assert!(result.stdout.contains("Created task: 1"));

    let storage = env.storage();
    let task = &storage["1"];
    assert_eq!(task["description"], "Test Task");
    assert_eq!(task["isTask"], true);
    assert_eq!(task["boards"][0], "My Board");
    assert_eq!(task["priority"], 1);
    assert_eq!(task["isComplete"], false);
    assert_eq!(task["inProgress"], false);
    assert!(task.get("dueDate").is_none());
}

#[test]
fn test_create_task_with_flags() {
    let env = TestEnv::new();
    let result = env.run_tl(&["t", "Deploy", "-b", "ops,@release", "-p", "2", "-d", "tomorrow"]);
    assert!(result.success(), "stderr: {}", result.stderr);

    let task = &env.storage()["1"];
    assert_eq!(task["boards"], serde_json::json!(["ops", "release"]));
    assert_eq!(task["priority"], 2);
    assert!(task["dueDate"].as_i64().is_some());
}

#[test]
fn test_create_note() {
    let env = TestEnv::new();
    let result = env.run_tl(&["n", "Test Note"]);
    assert!(result.success(), "stderr: {}", result.stderr);
    assert!(result.stdout.contains("Created note: 1"));

    let note = env.storage()["1"].clone();
    assert_eq!(note["isTask"], false);
    assert!(note.get("priority").is_none());
    assert!(note.get("isComplete").is_none());
}

// State changes

#[test]
fn test_check_begin_cancel_star() {
    let env = TestEnv::new();
    env.run_tl(&["task", "one"]);
    env.run_tl(&["task", "two"]);

    let result = env.run_tl(&["check", "1"]);
    assert!(result.stdout.contains("Checked task: 1"));
    assert_eq!(env.storage()["1"]["isComplete"], true);

    let result = env.run_tl(&["b", "1"]);
    assert!(result.stdout.contains("Started task: 1"));
    let storage = env.storage();
    assert_eq!(storage["1"]["inProgress"], true);
    assert_eq!(storage["1"]["isComplete"], false);

    env.run_tl(&["cancel", "1,2"]);
    let storage = env.storage();
    assert_eq!(storage["1"]["isCanceled"], true);
    assert_eq!(storage["1"]["inProgress"], false);
    assert_eq!(storage["2"]["isCanceled"], true);

    env.run_tl(&["s", "2"]);
    assert_eq!(env.storage()["2"]["isStarred"], true);
    let result = env.run_tl(&["s", "2"]);
    assert!(result.stdout.contains("Unstarred item: 2"));
    assert_eq!(env.storage()["2"]["isStarred"], false);
}

#[test]
fn test_check_unknown_id_changes_nothing() {
    let env = TestEnv::new();
    env.run_tl(&["task", "one"]);
    let before = env.storage();

    let result = env.run_tl(&["check", "99"]);
    assert!(!result.success());
    assert!(result.stderr.contains("Invalid id: 99"));
    assert_eq!(env.storage(), before);
}

#[test]
fn test_check_range() {
    let env = TestEnv::new();
    for name in ["a", "b", "c", "d"] {
        env.run_tl(&["task", name]);
    }
    let result = env.run_tl(&["check", "2-4"]);
    assert!(result.success(), "stderr: {}", result.stderr);

    let storage = env.storage();
    assert_eq!(storage["1"]["isComplete"], false);
    for id in ["2", "3", "4"] {
        assert_eq!(storage[id]["isComplete"], true);
    }

    let result = env.run_tl(&["check", "1-b"]);
    assert!(!result.success());
    assert!(result.stderr.contains("Invalid id range: 1-b"));
}

// Archive

#[test]
fn test_delete_and_restore() {
    let env = TestEnv::new();
    env.run_tl(&["task", "one"]);
    env.run_tl(&["task", "two"]);

    let result = env.run_tl(&["delete", "2"]);
    assert!(result.success(), "stderr: {}", result.stderr);
    assert!(env.storage().get("2").is_none());
    assert_eq!(env.archive()["1"]["description"], "two");

    let result = env.run_tl(&["archive"]);
    assert!(result.stdout.contains("two"));

    let result = env.run_tl(&["r", "1"]);
    assert!(result.success(), "stderr: {}", result.stderr);
    assert_eq!(env.storage()["2"]["description"], "two");
    assert!(env.archive().as_object().unwrap().is_empty());
}

#[test]
fn test_clear_archives_checked_tasks() {
    let env = TestEnv::new();
    env.run_tl(&["task", "done"]);
    env.run_tl(&["task", "open"]);

    let result = env.run_tl(&["clear"]);
    assert!(result.stdout.contains("No completed tasks"));

    env.run_tl(&["check", "1"]);
    env.run_tl(&["clear"]);
    assert!(env.storage().get("1").is_none());
    assert_eq!(env.archive()["1"]["description"], "done");
}

// Updates

#[test]
fn test_priority_due_edit_move() {
    let env = TestEnv::new();
    env.run_tl(&["task", "one"]);

    let result = env.run_tl(&["priority", "1", "4"]);
    assert!(!result.success());
    assert!(result.stderr.contains("Invalid priority: 4"));
    assert_eq!(env.storage()["1"]["priority"], 1);

    env.run_tl(&["p", "1", "3"]);
    assert_eq!(env.storage()["1"]["priority"], 3);

    let result = env.run_tl(&["due", "1", "next", "week"]);
    assert!(result.success(), "stderr: {}", result.stderr);
    assert!(env.storage()["1"]["dueDate"].as_i64().is_some());

    let result = env.run_tl(&["due", "1", "eventually"]);
    assert!(!result.success());

    env.run_tl(&["edit", "1", "renamed", "task"]);
    assert_eq!(env.storage()["1"]["description"], "renamed task");

    env.run_tl(&["m", "1", "work", "@home"]);
    assert_eq!(env.storage()["1"]["boards"], serde_json::json!(["work", "home"]));
}

// Views

#[test]
fn test_board_view_and_stats() {
    let env = TestEnv::new();
    env.run_tl(&["task", "write report", "-b", "work"]);
    env.run_tl(&["task", "buy milk"]);
    env.run_tl(&["note", "ideas"]);
    env.run_tl(&["check", "2"]);

    let result = env.run_tl(&[]);
    assert!(result.success(), "stderr: {}", result.stderr);
    assert!(result.stdout.contains("@work"));
    assert!(result.stdout.contains("@My Board"));
    assert!(result.stdout.contains("write report"));
    assert!(result.stdout.contains("50% of all tasks complete."));
}

#[test]
fn test_timeline_find_and_list() {
    let env = TestEnv::new();
    env.run_tl(&["task", "Buy Milk", "-p", "3"]);
    env.run_tl(&["task", "call mom"]);

    let result = env.run_tl(&["timeline"]);
    assert!(result.stdout.contains("Buy Milk"));
    assert!(result.stdout.contains("call mom"));

    let result = env.run_tl(&["find", "milk"]);
    assert!(result.stdout.contains("Buy Milk"));
    assert!(!result.stdout.contains("call mom"));

    let result = env.run_tl(&["list", "high"]);
    assert!(result.stdout.contains("Buy Milk"));
    assert!(!result.stdout.contains("call mom"));

    let result = env.run_tl(&["list", "starred"]);
    assert!(result.stdout.contains("No items match"));
}

// Config and storage modules

#[test]
fn test_config_command_validates_file() {
    let env = TestEnv::new();
    assert!(env.run_tl(&["config"]).success());

    fs::write(env.config_path(), "{ broken").unwrap();
    let result = env.run_tl(&[]);
    assert!(!result.success());
    assert!(result.stderr.contains("Configuration error"));
}

#[test]
fn test_storage_modules() {
    let env = TestEnv::new();
    let other_dir = TempDir::new().unwrap();
    let other = other_dir.path().join("other");
    fs::create_dir_all(&other).unwrap();
    let other_arg = other.to_string_lossy().to_string();

    let result = env.run_tl(&["storage"]);
    assert!(result.stdout.contains("local"));
    assert!(result.stdout.contains("Online"));

    let result = env.run_tl(&["storage", "side", "--add", "local", "--dir", &other_arg]);
    assert!(result.success(), "stderr: {}", result.stderr);
    let result = env.run_tl(&["storage", "side"]);
    assert!(result.stdout.contains("Switched to storage module: side"));

    env.run_tl(&["task", "elsewhere"]);
    assert!(other.join("storage/storage.json").exists());
    assert!(env.storage().as_object().unwrap().is_empty());

    let result = env.run_tl(&["storage", "side", "--remove"]);
    assert!(!result.success());

    env.run_tl(&["storage", "local"]);
    let result = env.run_tl(&["storage", "side", "--remove"]);
    assert!(result.success(), "stderr: {}", result.stderr);

    let result = env.run_tl(&["storage", "nowhere"]);
    assert!(!result.success());
}

#[test]
fn test_unknown_active_storage_is_fatal() {
    let env = TestEnv::new();
    env.run_tl(&[]);
    let mut config = TestEnv::read_json(env.config_path());
    config["storageModule"] = Value::String("missing".into());
    fs::write(env.config_path(), config.to_string()).unwrap();

    let result = env.run_tl(&["task", "x"]);
    assert!(!result.success());
    assert!(result.stderr.contains("missing"));
}
