//! Git synchronized backend.
//!
//! Uses the same file layout as the local backend inside a git work tree.
//! Every write commits the collection file and pushes it to `origin` when a
//! remote is configured. Remote failures are warnings: the local commit has
//! already succeeded at that point.

use super::local::{expand_home, FileLayout};
use super::{filter_ids, Storage, StorageError, StorageResult, StorageStatus};
use crate::item::Item;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

const REMOTE: &str = "origin";
const REMOTE_BRANCHES: [&str; 2] = ["main", "master"];

/// Backend specific settings of a `git` storage module
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfig {
    /// Repository directory; created and initialized when missing
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl GitOutput {
    fn message(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        text.trim().to_string()
    }
}

/// Storage kept in a git repository and pushed to its `origin`
pub struct GitStorage {
    layout: FileLayout,
    synced: bool,
    /// Why the sync with `origin` failed, if it did
    sync_failure: Option<String>,
}

impl GitStorage {
    pub fn new(config: &GitConfig, default_root: &Path) -> StorageResult<Self> {
        let root = config
            .directory
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| default_root.to_path_buf());
        fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;

        let storage = GitStorage {
            layout: FileLayout::new(root),
            synced: false,
            sync_failure: None,
        };
        storage.init_repository()?;
        storage.layout.ensure()?;
        Ok(storage)
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    fn git(&self, args: &[&str]) -> StorageResult<GitOutput> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.layout.root)
            .args(args)
            .output()
            .map_err(|e| StorageError::Git(format!("failed to run git: {}", e)))?;

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run a git command that must succeed
    fn git_checked(&self, args: &[&str]) -> StorageResult<GitOutput> {
        let output = self.git(args)?;
        if !output.success {
            return Err(StorageError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                output.message()
            )));
        }
        Ok(output)
    }

    fn init_repository(&self) -> StorageResult<()> {
        if !self.layout.root.join(".git").exists() {
            info!("Initializing git repository at {:?}", self.layout.root);
            self.git_checked(&["init"])?;
            self.git_checked(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        }

        // Staged writes never belong in the history
        let exclude = self.layout.root.join(".git").join("info").join("exclude");
        let current = fs::read_to_string(&exclude).unwrap_or_default();
        if !current.lines().any(|line| line.trim() == ".temp/") {
            if let Some(parent) = exclude.parent() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
            let mut content = current;
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(".temp/\n");
            fs::write(&exclude, content).map_err(|e| StorageError::io(&exclude, e))?;
        }

        if !self.git(&["config", "user.email"])?.success {
            self.git_checked(&["config", "user.name", "taskline"])?;
            self.git_checked(&["config", "user.email", "taskline@localhost"])?;
        }
        Ok(())
    }

    fn has_remote(&self) -> StorageResult<bool> {
        let output = self.git(&["remote"])?;
        Ok(output.success && output.stdout.lines().any(|line| line.trim() == REMOTE))
    }

    fn sync_failed(&mut self, reason: String) {
        warn!("{}", reason);
        self.sync_failure = Some(reason);
    }

    /// Fetch `origin` and return the tracked branch, if any.
    fn fetch_remote_branch(&mut self) -> StorageResult<Option<&'static str>> {
        if !self.has_remote()? {
            info!("No git remote configured, keeping changes local");
            return Ok(None);
        }

        let fetch = self.git(&["fetch", REMOTE])?;
        if !fetch.success {
            self.sync_failed(format!("Failed to fetch from {}: {}", REMOTE, fetch.message()));
            return Ok(None);
        }

        for branch in REMOTE_BRANCHES {
            let reference = format!("refs/remotes/{}/{}", REMOTE, branch);
            if self.git(&["rev-parse", "--verify", "--quiet", &reference])?.success {
                return Ok(Some(branch));
            }
        }
        Ok(None)
    }

    /// Reset the work tree to the remote tip once per process, before the
    /// first write. Failures are warned about whichever write runs it.
    ///
    /// Later writes in the same process build on the commits made since.
    fn sync_with_remote(&mut self) -> StorageResult<()> {
        if self.synced {
            return Ok(());
        }
        self.synced = true;

        if let Some(branch) = self.fetch_remote_branch()? {
            let target = format!("{}/{}", REMOTE, branch);
            let reset = self.git(&["reset", "--hard", &target])?;
            if reset.success {
                debug!("Reset to {}", target);
            } else {
                self.sync_failed(format!("Failed to reset to {}: {}", target, reset.message()));
            }
        }
        Ok(())
    }

    fn commit(&self, path: &Path, message: &str) -> StorageResult<()> {
        let relative = path.strip_prefix(&self.layout.root).unwrap_or(path);
        let relative = relative.to_string_lossy();
        self.git_checked(&["add", "--", &relative])?;

        let commit = self.git(&["commit", "-m", message])?;
        if !commit.success {
            let text = format!("{}{}", commit.stdout, commit.stderr);
            if text.contains("nothing to commit") || text.contains("nothing added to commit") {
                debug!("Nothing to commit for {}", relative);
                return Ok(());
            }
            return Err(StorageError::Git(format!("git commit failed: {}", commit.message())));
        }
        Ok(())
    }

    fn push(&self, report: bool) -> StorageResult<()> {
        if !self.has_remote()? {
            return Ok(());
        }

        let head = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = if head.success {
            head.stdout.trim().to_string()
        } else {
            "main".to_string()
        };

        let refspec = format!("HEAD:{}", branch);
        let push = self.git(&["push", REMOTE, &refspec])?;
        if !push.success {
            if report {
                warn!("Failed to push to {}: {}", REMOTE, push.message());
            } else {
                debug!("Failed to push to {}: {}", REMOTE, push.message());
            }
        }
        Ok(())
    }

    fn write(&mut self, path: PathBuf, data: &[Item], message: &str, report: bool) -> StorageResult<()> {
        self.sync_with_remote()?;
        self.layout.write(&path, data)?;
        self.commit(&path, message)?;
        self.push(report)
    }
}

impl Storage for GitStorage {
    fn get(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>> {
        let items = self.layout.read(&self.layout.storage_file)?;
        Ok(filter_ids(items, ids))
    }

    fn get_archive(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>> {
        let items = self.layout.read(&self.layout.archive_file)?;
        Ok(filter_ids(items, ids))
    }

    fn set(&mut self, data: &[Item]) -> StorageResult<()> {
        let path = self.layout.storage_file.clone();
        self.write(path, data, "Update storage", true)
    }

    fn set_archive(&mut self, data: &[Item]) -> StorageResult<()> {
        // Always paired with `set`, which reports push problems
        let path = self.layout.archive_file.clone();
        self.write(path, data, "Update archive", false)
    }

    fn status(&self) -> StorageStatus {
        if let Some(reason) = &self.sync_failure {
            return StorageStatus::Offline(reason.clone());
        }
        match self.git(&["status", "--porcelain"]) {
            Ok(output) if output.success => StorageStatus::Online,
            Ok(output) => StorageStatus::Offline(output.message()),
            Err(e) => StorageStatus::Offline(e.to_string()),
        }
    }
}
