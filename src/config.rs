//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXNER_CONFIG` (environment variable)
//! 2. `~/.config/mboxner/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxner\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line arguments override the file; the file overrides defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{NerError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Extraction defaults.
    pub ner: NerSettings,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for log files.
    pub cache_dir: Option<PathBuf>,
}

/// Extraction defaults, overridable on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerSettings {
    /// Default NER model id.
    pub model: String,
    /// Default score threshold; mentions below it are dropped.
    pub threshold: f64,
    /// Default category-directory map as `KEY=VALUE` entries.
    pub cat_dir_map: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for NerSettings {
    fn default() -> Self {
        Self {
            model: "builtin:pattern".to_string(),
            threshold: 0.8,
            cat_dir_map: vec![
                "PER=Person".to_string(),
                "LOC=Place".to_string(),
                "ORG=Organisation".to_string(),
                "MISC=Other".to_string(),
            ],
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXNER_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mboxner").join("config.toml"))
}

/// Return the cache directory used for log files.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxner")
}

// ── Category-directory map ──────────────────────────────────────

/// Mapping from raw model category labels (e.g. `"PER"`) to on-disk category
/// directory names (e.g. `"Person"`).
///
/// Validated against the backend's label universe at startup so that a label
/// with no mapping fails the run before any inference work is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap(BTreeMap<String, String>);

impl CategoryMap {
    /// Parse a list of `KEY=VALUE` strings, or alternating key/value tokens.
    ///
    /// The two forms cannot be mixed; mixed or odd-length input is a
    /// configuration error.
    pub fn parse(args: &[String]) -> Result<Self> {
        if args.is_empty() {
            return Err(NerError::Config(
                "Category map must not be empty".to_string(),
            ));
        }

        let mut map = BTreeMap::new();
        if args.iter().all(|arg| arg.contains('=')) {
            for arg in args {
                let (label, dir) = arg
                    .split_once('=')
                    .expect("checked: every arg contains '='");
                map.insert(label.trim().to_string(), dir.trim().to_string());
            }
        } else if args.iter().all(|arg| !arg.contains('=')) && args.len() % 2 == 0 {
            for pair in args.chunks(2) {
                map.insert(pair[0].trim().to_string(), pair[1].trim().to_string());
            }
        } else {
            return Err(NerError::Config(
                "Malformatted category map. Provide a list of 'LABEL=Directory' \
                 entries or alternating label/directory tokens"
                    .to_string(),
            ));
        }
        Ok(Self(map))
    }

    /// Directory name for a raw model label.
    pub fn directory(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    /// All mapped directory names, in label order.
    pub fn directories(&self) -> Vec<&str> {
        self.0.values().map(String::as_str).collect()
    }

    /// Require a mapping for every label the model can emit.
    pub fn validate_labels(&self, universe: &BTreeSet<String>) -> Result<()> {
        let unmapped: Vec<&str> = universe
            .iter()
            .filter(|label| !self.0.contains_key(*label))
            .map(String::as_str)
            .collect();
        if unmapped.is_empty() {
            Ok(())
        } else {
            Err(NerError::Config(format!(
                "Model labels with no category mapping: {}",
                unmapped.join(", ")
            )))
        }
    }
}
