//! User configuration stored as JSON in the XDG config directory.
//!
//! The file is created with defaults on first run. Fields missing from an
//! existing file take their default values.

use crate::error::{Result, TasklineError};
use crate::item::DEFAULT_DATE_FORMAT;
use crate::storage::{StorageKind, StorageModuleConfig};
use chrono::format::{Item as FormatItem, StrftimeItems};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "config.json";
const SUPPORTED_LANGUAGES: [&str; 1] = ["en"];

/// Colors as `#rrggbb` hex strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub pale: String,
    pub error: String,
    pub success: String,
    pub warning: String,
    pub priority_medium: String,
    pub priority_high: String,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            pale: "#808080".to_string(),
            error: "#ff0000".to_string(),
            success: "#00ff00".to_string(),
            warning: "#ffff00".to_string(),
            priority_medium: "#ffa500".to_string(),
            priority_high: "#ff0000".to_string(),
        }
    }
}

impl Theme {
    fn colors(&self) -> [(&'static str, &str); 6] {
        [
            ("pale", &self.pale),
            ("error", &self.error),
            ("success", &self.success),
            ("warning", &self.warning),
            ("priorityMedium", &self.priority_medium),
            ("priorityHigh", &self.priority_high),
        ]
    }
}

/// Parse a `#rrggbb` color
pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub language: String,
    /// chrono format of the creation date shown in the timeline
    pub dateformat: String,
    pub display_complete_tasks: bool,
    pub display_progress_overview: bool,
    /// Name of the active entry of `storage_modules`
    pub storage_module: String,
    pub storage_modules: Vec<StorageModuleConfig>,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            language: "en".to_string(),
            dateformat: DEFAULT_DATE_FORMAT.to_string(),
            display_complete_tasks: true,
            display_progress_overview: true,
            storage_module: "local".to_string(),
            storage_modules: vec![StorageModuleConfig::new("local", StorageKind::Local, Value::Null)],
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// Load the config at `path`, writing the defaults there if it is missing.
    pub fn load_or_create(path: &Path) -> Result<Config> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            info!("Created default config at {:?}", path);
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| TasklineError::Config(format!("cannot read {:?}: {}", path, e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| TasklineError::Config(format!("invalid config file {:?}: {}", path, e)))?;
        config.validate()?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| TasklineError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TasklineError::Config(format!("cannot create {:?}: {}", parent, e)))?;
        }
        fs::write(path, content + "\n")
            .map_err(|e| TasklineError::Config(format!("cannot write {:?}: {}", path, e)))
    }

    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_LANGUAGES.contains(&self.language.as_str()) {
            return Err(TasklineError::Config(format!(
                "unsupported language '{}'",
                self.language
            )));
        }

        if StrftimeItems::new(&self.dateformat).any(|item| matches!(item, FormatItem::Error)) {
            return Err(TasklineError::Config(format!(
                "invalid dateformat '{}'",
                self.dateformat
            )));
        }

        for (name, color) in self.theme.colors() {
            if parse_hex_color(color).is_none() {
                return Err(TasklineError::Config(format!(
                    "theme color {} is not a #rrggbb value: '{}'",
                    name, color
                )));
            }
        }
        Ok(())
    }
}
