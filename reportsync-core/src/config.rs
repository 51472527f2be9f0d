//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.reportsync/
//!   config.yaml     (mode 0600, written by `reportsync init`)
//!   manifest.json   (processed-record audit trail)
//! ```
//!
//! Relative paths inside the config are resolved against the directory that
//! holds the config file.
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io_err, ConfigError};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub local: LocalConfig,
    pub download: DownloadConfig,
    pub schema: SchemaConfig,
}

/// Where the remote store lives and which folders the pipeline uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Root of the filesystem-backed store.
    pub root: PathBuf,
    /// Folder under the root holding the structured records.
    pub data_folder: String,
    /// Folder under the root receiving generated artifacts and source data.
    pub output_folder: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            root: PathBuf::from("remote"),
            data_folder: "data".to_string(),
            output_folder: "generated".to_string(),
        }
    }
}

/// Local working set and artifact locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub work_dir: PathBuf,
    pub artifact_dir: PathBuf,
    /// Optional directory with a `report.html.tera` override.
    pub template_dir: Option<PathBuf>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        LocalConfig {
            work_dir: PathBuf::from("records"),
            artifact_dir: PathBuf::from("artifacts"),
            template_dir: None,
        }
    }
}

/// Download retry and stabilization tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        DownloadConfig {
            max_attempts: 3,
            base_delay_ms: 1000,
            poll_interval_ms: 250,
            max_polls: 40,
        }
    }
}

impl DownloadConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Field path lists for each validation tier, as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SchemaConfig {
    pub required: Vec<String>,
    pub structural: Vec<String>,
    pub recommended: Vec<String>,
    pub date_fields: Vec<String>,
}

impl Config {
    /// Reject values the pipeline cannot run with.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.download.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "download.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.download.max_polls < 2 {
            return Err(ConfigError::Invalid(
                "download.max_polls must be at least 2 (stabilization compares two polls)"
                    .to_string(),
            ));
        }
        if self.remote.data_folder.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "remote.data_folder must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn resolve_relative_to(mut self, base: &Path) -> Self {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.remote.root);
        join(&mut self.local.work_dir);
        join(&mut self.local.artifact_dir);
        if let Some(dir) = self.local.template_dir.as_mut() {
            join(dir);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.reportsync/`: pure, no I/O.
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".reportsync")
}

/// `<home>/.reportsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join("config.yaml")
}

/// `<home>/.reportsync/manifest.json`: pure, no I/O.
pub fn manifest_path_at(home: &Path) -> PathBuf {
    root_at(home).join("manifest.json")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and check the config file at `path`, resolving relative paths
/// against its parent directory.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io_err(path, e))?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.check()?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_relative_to(base))
}

/// Load `<home>/.reportsync/config.yaml`.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// Init (atomic)
// ---------------------------------------------------------------------------

const CONFIG_HEADER: &str = "\
# reportsync configuration.
# Relative paths are resolved against this file's directory.
# schema paths use dots for nesting, numeric segments to index arrays and
# `field[].sub` to require `sub` on every element of a non-empty `field`.
";

/// Write a default config to `<home>/.reportsync/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// Refuses to replace an existing file unless `force` is set.
pub fn init_at(home: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    let path = config_path_at(home);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists { path });
    }
    let dir = root_at(home);
    std::fs::create_dir_all(&dir).map_err(|e| config_io_err(&dir, e))?;

    let body = serde_yaml::to_string(&Config::default())?;
    let tmp = dir.join("config.yaml.tmp");
    std::fs::write(&tmp, format!("{CONFIG_HEADER}{body}")).map_err(|e| config_io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| config_io_err(&path, e))?;
    Ok(path)
}

/// `init_at` convenience wrapper.
pub fn init(force: bool) -> Result<PathBuf, ConfigError> {
    init_at(&home()?, force)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| config_io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
