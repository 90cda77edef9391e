//! TOML configuration.
//!
//! ```toml
//! [pipeline]
//! internal_prefix = "__aggrel"
//! log_stages = false
//!
//! [store]
//! name = "default"
//! [[store.seed]]
//! collection = "group"
//! path = "${FIXTURES_DIR}/groups.json"
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{DEFAULT_INTERNAL_PREFIX, InternalFields};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {name} not set")]
    MissingEnv { name: String },

    #[error("seed file {} is not valid JSON: {source}", path.display())]
    Seed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("seed file {} must contain a JSON array of documents", path.display())]
    SeedShape { path: PathBuf },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

impl Settings {
    /// Load from a file; relative seed paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_toml_str(&raw)?;
        settings.store.base_dir = path.parent().map(Path::to_path_buf);
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Prefix of the scratch fields written by hierarchy and path pipelines.
    #[serde(default = "default_internal_prefix")]
    pub internal_prefix: String,
    /// Log every stage document at debug level before execution.
    #[serde(default)]
    pub log_stages: bool,
}

impl PipelineSettings {
    pub fn internal_fields(&self) -> InternalFields {
        InternalFields::with_prefix(&self.internal_prefix)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            internal_prefix: default_internal_prefix(),
            log_stages: false,
        }
    }
}

fn default_internal_prefix() -> String {
    DEFAULT_INTERNAL_PREFIX.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_name")]
    pub name: String,
    #[serde(default)]
    pub seed: Vec<SeedSettings>,
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            seed: Vec::new(),
            base_dir: None,
        }
    }
}

fn default_store_name() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSettings {
    pub collection: String,
    /// JSON array of documents; `${VAR}` is expanded from the environment.
    pub path: String,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl SeedSettings {
    pub fn new(collection: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            path: path.into(),
            base_dir: None,
        }
    }

    pub fn resolved_path(&self) -> Result<PathBuf, SettingsError> {
        let path = PathBuf::from(expand_env(&self.path)?);
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        })
    }
}

impl StoreSettings {
    /// Seeds with relative paths anchored at the settings file's directory.
    pub fn seeds(&self) -> impl Iterator<Item = SeedSettings> + '_ {
        self.seed.iter().map(|seed| SeedSettings {
            base_dir: seed.base_dir.clone().or_else(|| self.base_dir.clone()),
            ..seed.clone()
        })
    }
}

/// Replace every `${VAR}` in `raw` with the variable's value.
pub fn expand_env(raw: &str) -> Result<String, SettingsError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env pattern"));

    let mut missing = None;
    let expanded = pattern.replace_all(raw, |captures: &Captures<'_>| {
        let name = &captures[1];
        std::env::var(name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });
    match missing {
        Some(name) => Err(SettingsError::MissingEnv { name }),
        None => Ok(expanded.into_owned()),
    }
}
