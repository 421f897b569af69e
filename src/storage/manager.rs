//! Named storage modules and selection of the active one.

use super::firestore::{FirestoreConfig, FirestoreStorage};
use super::git::{GitConfig, GitStorage};
use super::local::{LocalConfig, LocalStorage};
use super::{Storage, StorageError, StorageResult, StorageStatus};
use crate::item::Item;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The closed set of backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Git,
    Firestore,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageKind::Local => "local",
            StorageKind::Git => "git",
            StorageKind::Firestore => "firestore",
        };
        f.write_str(name)
    }
}

/// One entry of `storageModules` in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageModuleConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StorageKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

impl StorageModuleConfig {
    pub fn new(name: impl Into<String>, kind: StorageKind, config: Value) -> Self {
        StorageModuleConfig {
            name: name.into(),
            kind,
            config,
        }
    }

    fn settings<T: DeserializeOwned>(&self) -> StorageResult<T> {
        let raw = if self.config.is_null() {
            Value::Object(Default::default())
        } else {
            self.config.clone()
        };
        serde_json::from_value(raw).map_err(|e| StorageError::InvalidConfig {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// Instantiate the backend this entry describes.
    ///
    /// Filesystem backends without a configured directory live under
    /// `data_root`, git ones in its `git/` subdirectory.
    pub fn open(&self, data_root: &Path) -> StorageResult<Box<dyn Storage>> {
        debug!("Opening {} storage module '{}'", self.kind, self.name);
        let storage: Box<dyn Storage> = match self.kind {
            StorageKind::Local => {
                let config: LocalConfig = self.settings()?;
                Box::new(LocalStorage::new(&config, data_root)?)
            }
            StorageKind::Git => {
                let config: GitConfig = self.settings()?;
                Box::new(GitStorage::new(&config, &data_root.join("git"))?)
            }
            StorageKind::Firestore => {
                let config: FirestoreConfig = self.settings()?;
                Box::new(FirestoreStorage::new(&self.name, config)?)
            }
        };
        Ok(storage)
    }
}

/// A row of `tl storage`
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntry {
    pub name: String,
    pub kind: StorageKind,
    pub active: bool,
    pub status: StorageStatus,
}

/// Holds every configured backend and routes calls to the active one
pub struct StorageManager {
    data_root: PathBuf,
    active: String,
    modules: Vec<StorageModuleConfig>,
    backends: HashMap<String, Box<dyn Storage>>,
    failures: HashMap<String, String>,
}

impl StorageManager {
    /// Instantiate all configured modules.
    ///
    /// A module that fails to open is excluded and remembered; only using it
    /// as the active module is an error.
    pub fn load(modules: &[StorageModuleConfig], active: &str, data_root: &Path) -> Self {
        let mut manager = StorageManager {
            data_root: data_root.to_path_buf(),
            active: active.to_string(),
            modules: Vec::new(),
            backends: HashMap::new(),
            failures: HashMap::new(),
        };

        for module in modules {
            if manager.modules.iter().any(|m| m.name == module.name) {
                warn!("Ignoring duplicate storage module '{}'", module.name);
                continue;
            }
            match module.open(data_root) {
                Ok(backend) => {
                    manager.backends.insert(module.name.clone(), backend);
                }
                Err(e) => {
                    warn!("Storage module '{}' failed to load: {}", module.name, e);
                    manager.failures.insert(module.name.clone(), e.to_string());
                }
            }
            manager.modules.push(module.clone());
        }

        manager
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    pub fn modules(&self) -> &[StorageModuleConfig] {
        &self.modules
    }

    fn missing(&self, name: &str) -> StorageError {
        match self.failures.get(name) {
            Some(reason) => StorageError::Unavailable {
                name: name.to_string(),
                reason: reason.clone(),
            },
            None => StorageError::UnknownStorage(name.to_string()),
        }
    }

    fn active(&self) -> StorageResult<&dyn Storage> {
        match self.backends.get(&self.active) {
            Some(backend) => Ok(backend.as_ref()),
            None => Err(self.missing(&self.active)),
        }
    }

    fn active_mut(&mut self) -> StorageResult<&mut dyn Storage> {
        if !self.backends.contains_key(&self.active) {
            return Err(self.missing(&self.active));
        }
        match self.backends.get_mut(&self.active) {
            Some(backend) => Ok(backend.as_mut()),
            None => Err(StorageError::UnknownStorage(self.active.clone())),
        }
    }

    /// Switch the active module; it must be configured and loaded.
    pub fn set_active(&mut self, name: &str) -> StorageResult<()> {
        if !self.backends.contains_key(name) {
            return Err(self.missing(name));
        }
        self.active = name.to_string();
        Ok(())
    }

    pub fn get_data(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>> {
        self.active()?.get(ids)
    }

    pub fn get_archive(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>> {
        self.active()?.get_archive(ids)
    }

    pub fn set_data(&mut self, data: &[Item]) -> StorageResult<()> {
        self.active_mut()?.set(data)
    }

    pub fn set_archive(&mut self, data: &[Item]) -> StorageResult<()> {
        self.active_mut()?.set_archive(data)
    }

    /// Configure and open a new module. Opening failures are returned.
    pub fn add(&mut self, module: StorageModuleConfig) -> StorageResult<()> {
        if self.modules.iter().any(|m| m.name == module.name) {
            return Err(StorageError::DuplicateName(module.name));
        }
        let backend = module.open(&self.data_root)?;
        self.backends.insert(module.name.clone(), backend);
        self.modules.push(module);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> StorageResult<StorageModuleConfig> {
        if name == self.active {
            return Err(StorageError::RemoveActive(name.to_string()));
        }
        let index = self
            .modules
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| StorageError::UnknownStorage(name.to_string()))?;

        self.backends.remove(name);
        self.failures.remove(name);
        Ok(self.modules.remove(index))
    }

    pub fn list(&self) -> Vec<StorageEntry> {
        self.modules
            .iter()
            .map(|module| {
                let status = match (self.backends.get(&module.name), self.failures.get(&module.name)) {
                    (Some(backend), _) => backend.status(),
                    (None, Some(reason)) => StorageStatus::Offline(reason.clone()),
                    (None, None) => StorageStatus::Offline("not loaded".to_string()),
                };
                StorageEntry {
                    name: module.name.clone(),
                    kind: module.kind,
                    active: module.name == self.active,
                    status,
                }
            })
            .collect()
    }
}
