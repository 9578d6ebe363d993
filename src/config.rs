use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::visibility::Visibility;

/// Catalog document name used when none is configured
pub const DEFAULT_CATALOG: &str = "catalog.xml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No root directory configured")]
    MissingRoot,

    #[error("Root directory does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("Root path is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    #[error("Templates path is not a directory: {0}")]
    TemplatesNotDirectory(PathBuf),

    #[error("Catalog name must be a single file name: {0:?}")]
    InvalidCatalog(String),

    #[error("Invalid file filter regex: {0}")]
    InvalidFilter(#[from] regex::Error),
}

/// File server configuration as written in the TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory to serve
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directory holding `index.html` / `catalog.xml` layout overrides
    #[serde(default)]
    pub templates: Option<PathBuf>,

    /// Request name that triggers the catalog document
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Entries with a matching name (or path segment) are hidden
    #[serde(default)]
    pub file_filter_regex: Option<String>,

    /// Whether the filter is enforced at all
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub restrict_with_filter: bool,

    /// Everything else is forwarded to content handlers
    #[serde(flatten)]
    pub passthrough: BTreeMap<String, toml::Value>,
}

fn default_catalog() -> String {
    DEFAULT_CATALOG.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            templates: None,
            catalog: default_catalog(),
            file_filter_regex: None,
            restrict_with_filter: false,
            passthrough: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Text(s) => parse_flag(&s),
    })
}

/// Interpret a textual boolean. `False`, `false`, `0` and the empty string are false.
pub fn parse_flag(value: &str) -> bool {
    !matches!(value.trim(), "" | "False" | "false" | "0")
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Validated, immutable server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Canonical absolute root directory
    pub root: PathBuf,
    pub templates: Option<PathBuf>,
    pub catalog: String,
    pub filter: Option<Regex>,
    pub restrict: bool,
    pub passthrough: BTreeMap<String, String>,
}

impl ServerConfig {
    /// Validate a raw config. Fails when the root is missing or not a directory.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let root = config.root.ok_or(ConfigError::MissingRoot)?;
        let root = root
            .canonicalize()
            .map_err(|_| ConfigError::RootNotFound(root.clone()))?;
        if !root.is_dir() {
            return Err(ConfigError::RootNotDirectory(root));
        }

        if let Some(templates) = &config.templates {
            if !templates.is_dir() {
                return Err(ConfigError::TemplatesNotDirectory(templates.clone()));
            }
        }

        if config.catalog.is_empty() || config.catalog.contains('/') {
            return Err(ConfigError::InvalidCatalog(config.catalog));
        }

        let filter = match config.file_filter_regex.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(Regex::new(pattern)?),
            _ => None,
        };

        let passthrough = config
            .passthrough
            .into_iter()
            .map(|(key, value)| (key, stringify_value(value)))
            .collect();

        Ok(Self {
            root,
            templates: config.templates,
            catalog: config.catalog,
            filter,
            restrict: config.restrict_with_filter,
            passthrough,
        })
    }

    /// Filter used for both serving and listing. Without restriction nothing is hidden.
    pub fn visibility(&self) -> Visibility<'_> {
        let pattern = if self.restrict { self.filter.as_ref() } else { None };
        Visibility::new(&self.root, pattern)
    }
}

fn stringify_value(value: toml::Value) -> String {
    match value {
        toml::Value::String(s) => s,
        other => other.to_string(),
    }
}
