//! On-disk vault layout and configuration.
//!
//! # Responsibility
//! - Create and recognize vault metadata under `<root>/.graphnotes/`.
//! - Load and persist the per-vault `config.json`.
//!
//! # Invariants
//! - Initialization never overwrites an existing log or config file.
//! - A directory is a vault iff `<root>/.graphnotes` is a directory.
//! - `settings` is opaque to the core and round-trips unchanged.

pub mod event_file;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Metadata directory name inside a vault root.
pub const METADATA_DIR: &str = ".graphnotes";
const EVENTS_FILE: &str = "events.jsonl";
const CONFIG_FILE: &str = "config.json";
/// Config format version written by [`init_vault`].
pub const CONFIG_VERSION: &str = "1.0.0";

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug)]
pub enum VaultError {
    Io { path: PathBuf, source: std::io::Error },
    InvalidConfig { path: PathBuf, source: serde_json::Error },
    NotAVault(PathBuf),
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "vault io failed at {}: {source}", path.display()),
            Self::InvalidConfig { path, source } => {
                write!(f, "invalid vault config {}: {source}", path.display())
            }
            Self::NotAVault(path) => write!(f, "not a vault: {}", path.display()),
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidConfig { source, .. } => Some(source),
            Self::NotAVault(_) => None,
        }
    }
}

/// Resolved metadata paths of one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    pub root: PathBuf,
    pub metadata_dir: PathBuf,
    pub events_file: PathBuf,
    pub config_file: PathBuf,
}

impl VaultPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let metadata_dir = root.join(METADATA_DIR);
        Self {
            events_file: metadata_dir.join(EVENTS_FILE),
            config_file: metadata_dir.join(CONFIG_FILE),
            metadata_dir,
            root,
        }
    }
}

/// Per-vault configuration stored in `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub version: String,
    /// Identifies this replica; generated once at init.
    pub device_id: String,
    /// Unix epoch milliseconds.
    pub created: i64,
    #[serde(default = "default_settings")]
    pub settings: serde_json::Value,
}

impl VaultConfig {
    /// Fresh config with a new device id.
    pub fn generate(created: i64) -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            device_id: Uuid::new_v4().to_string(),
            created,
            settings: default_settings(),
        }
    }

    pub fn load(root: impl AsRef<Path>) -> VaultResult<Self> {
        let paths = VaultPaths::new(root);
        if !is_vault(&paths.root) {
            return Err(VaultError::NotAVault(paths.root));
        }
        let text = fs::read_to_string(&paths.config_file).map_err(|source| VaultError::Io {
            path: paths.config_file.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| VaultError::InvalidConfig {
            path: paths.config_file,
            source,
        })
    }

    pub fn save(&self, root: impl AsRef<Path>) -> VaultResult<()> {
        let paths = VaultPaths::new(root);
        let text = serde_json::to_string_pretty(self).map_err(|source| {
            VaultError::InvalidConfig {
                path: paths.config_file.clone(),
                source,
            }
        })?;
        fs::write(&paths.config_file, text).map_err(|source| VaultError::Io {
            path: paths.config_file,
            source,
        })
    }
}

/// Default editor/graph settings for new vaults.
pub fn default_settings() -> serde_json::Value {
    json!({
        "theme": "dark",
        "editorFontSize": 16,
        "graphSettings": {
            "defaultLayout": "force-directed",
            "showLabels": true,
            "nodeSize": 10
        }
    })
}

/// Creates missing vault metadata under `root` and returns the effective config.
pub fn init_vault(root: impl AsRef<Path>) -> VaultResult<VaultConfig> {
    let paths = VaultPaths::new(root);

    fs::create_dir_all(&paths.metadata_dir).map_err(|source| VaultError::Io {
        path: paths.metadata_dir.clone(),
        source,
    })?;

    let created_log = create_if_missing(&paths.events_file, "")?;

    let created_config = match fs::metadata(&paths.config_file) {
        Ok(_) => false,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            VaultConfig::generate(now_epoch_ms()).save(&paths.root)?;
            true
        }
        Err(source) => {
            return Err(VaultError::Io {
                path: paths.config_file,
                source,
            })
        }
    };

    info!(
        "event=vault_init module=vault status=ok root={} created_log={} created_config={}",
        paths.root.display(),
        created_log,
        created_config
    );
    VaultConfig::load(&paths.root)
}

/// Returns `true` when `root` carries vault metadata.
pub fn is_vault(root: impl AsRef<Path>) -> bool {
    root.as_ref().join(METADATA_DIR).is_dir()
}

/// Current wall clock in Unix epoch milliseconds; `0` if the clock predates the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn create_if_missing(path: &Path, contents: &str) -> VaultResult<bool> {
    use std::io::Write;

    match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(contents.as_bytes())
                .map_err(|source| VaultError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(source) => Err(VaultError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{default_settings, VaultConfig, VaultPaths};

    #[test]
    fn paths_live_under_metadata_dir() {
        let paths = VaultPaths::new("/vault");
        assert!(paths.events_file.ends_with(".graphnotes/events.jsonl"));
        assert!(paths.config_file.ends_with(".graphnotes/config.json"));
    }

    #[test]
    fn config_uses_camel_case_keys() {
        let config = VaultConfig::generate(42);
        let json = serde_json::to_value(&config).expect("serialize config");
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["created"], 42);
        assert!(json["deviceId"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(json["settings"]["graphSettings"]["nodeSize"], 10);
    }

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let config: VaultConfig = serde_json::from_value(serde_json::json!({
            "version": "1.0.0",
            "deviceId": "device-a",
            "created": 1
        }))
        .expect("decode config");
        assert_eq!(config.settings, default_settings());
    }
}
