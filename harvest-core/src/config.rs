//! Harvest YAML config.
//!
//! # Storage layout
//!
//! ```text
//! ~/.harvest/
//!   config.yaml              (mode 0600, written by `harvest init`)
//!   templates/fields/*.tera  (optional overrides)
//!   store/
//!     <store_name>.json      (production record store)
//!     <store_name>-staging.json
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable that overrides [`HarvestConfig::environment`].
pub const ENVIRONMENT_VAR: &str = "HARVEST_ENVIRONMENT";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Deployment environment. Staging reads and writes a separate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl Environment {
    /// Suffix appended to the store name.
    pub fn store_suffix(&self) -> &'static str {
        match self {
            Environment::Production => "",
            Environment::Staging => "-staging",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Staging => write!(f, "staging"),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// Root of `~/.harvest/config.yaml`. Every field has a default so a partial
/// file (or no file at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub environment: Environment,
    pub store_name: String,
    /// Path or `http(s)://` URL of the discovery catalog: a sitemap, a
    /// sitemap index, or a JSON export.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    /// Substring marking the `<loc>`s of a sitemap index that are followed.
    pub sitemap_filter: String,
    pub identity_prefix: String,
    pub source_label: String,
    pub default_authors: String,
    pub tags: String,
    /// Case-insensitive keywords matched against locator and title. Empty
    /// accepts every catalog entry.
    pub include_keywords: Vec<String>,
    pub workers: usize,
    pub interval_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            store_name: "posts".to_string(),
            catalog: None,
            sitemap_filter: "/sitemaps/articles/".to_string(),
            identity_prefix: "builder-".to_string(),
            source_label: "builder.aws.com".to_string(),
            default_authors: "AWS Builder Community".to_string(),
            tags: "End User Computing, Builder.AWS".to_string(),
            include_keywords: [
                "euc",
                "end-user-computing",
                "end user computing",
                "workspaces",
                "appstream",
                "workspace",
                "end user",
                "desktop",
                "virtual desktop",
                "vdi",
                "daas",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            workers: 1,
            interval_secs: 3600,
        }
    }
}

impl HarvestConfig {
    /// Store file name including the environment suffix.
    pub fn store_file_name(&self) -> String {
        format!("{}{}.json", self.store_name, self.environment.store_suffix())
    }

    /// `<home>/.harvest/store/<store_name>[-staging].json`
    pub fn store_path_at(&self, home: &Path) -> PathBuf {
        harvest_root(home).join("store").join(self.store_file_name())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.harvest`
pub fn harvest_root(home: &Path) -> PathBuf {
    home.join(".harvest")
}

/// `<home>/.harvest/templates`: optional user overrides for field templates.
pub fn templates_dir_at(home: &Path) -> PathBuf {
    harvest_root(home).join("templates")
}

/// `<home>/.harvest/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    harvest_root(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save / init
// ---------------------------------------------------------------------------

/// Load the config, falling back to defaults when the file is absent.
///
/// `HARVEST_ENVIRONMENT`, when set, overrides the file's `environment`.
pub fn load_at(home: &Path) -> Result<HarvestConfig, ConfigError> {
    let mut config = read_at(home)?;
    if let Ok(value) = std::env::var(ENVIRONMENT_VAR) {
        config.environment = value.parse()?;
    }
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<HarvestConfig, ConfigError> {
    load_at(&home()?)
}

/// Load the config file without environment overrides.
pub fn read_at(home: &Path) -> Result<HarvestConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(HarvestConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(HarvestConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Atomically save the config: `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &HarvestConfig) -> Result<(), ConfigError> {
    let root = harvest_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &HarvestConfig) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

/// Write `config` unless a config file already exists.
///
/// Idempotent: returns the existing config unchanged if present.
pub fn init_at(home: &Path, config: HarvestConfig) -> Result<HarvestConfig, ConfigError> {
    if config_path_at(home).exists() {
        return read_at(home);
    }
    save_at(home, &config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
