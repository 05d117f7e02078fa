//! Configuration management for EchoGL
//!
//! Handles data locations, library discovery options, cover cache policy and
//! catalog credentials. Configuration lives in a TOML file; credentials are
//! normally injected through the environment.

mod sections;

pub use sections::{CatalogSettings, CoverSettings, PathsConfig, ScanSettings};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Env file error: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Application directory name under the per-user data/config roots
pub const APP_DIR_NAME: &str = "echogl";

/// Environment overrides
pub const ENV_DATA_DIR: &str = "ECHOGL_DATA_DIR";
pub const ENV_CLIENT_ID: &str = "TWITCH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "TWITCH_CLIENT_SECRET";

/// Catalog client credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Main EchoGL configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EchoConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub scan: ScanSettings,

    #[serde(default)]
    pub covers: CoverSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,
}

impl EchoConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the user configuration file, or defaults when there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path()
            && path.exists()
        {
            return Self::load(&path);
        }

        tracing::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// User configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a `.env` file without touching the process
    /// environment
    pub fn apply_env_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let vars = dotenvy::from_path_iter(path)?.collect::<Result<HashMap<String, String>, _>>()?;
        tracing::debug!("Read {} variable(s) from {}", vars.len(), path.display());
        self.apply_env_from(|key| vars.get(key).cloned());
        Ok(())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.paths.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(id) = non_empty(ENV_CLIENT_ID) {
            self.catalog.client_id = Some(id);
        }
        if let Some(secret) = non_empty(ENV_CLIENT_SECRET) {
            self.catalog.client_secret = Some(secret);
        }
    }

    /// Catalog credentials, when both halves are configured
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.catalog.client_id, &self.catalog.client_secret) {
            (Some(id), Some(secret)) => Some(Credentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
            }),
            _ => None,
        }
    }

    /// Application data directory
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.paths.data_dir {
            return dir.clone();
        }

        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .or_else(|| dirs::home_dir().map(|home| home.join(format!(".{APP_DIR_NAME}"))))
            .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR_NAME}")))
    }

    /// Cover cache directory
    pub fn covers_dir(&self) -> PathBuf {
        self.data_dir().join("covers")
    }

    /// Library database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("games.db")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.covers.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "covers.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.covers.thumbnail_width == 0 || self.covers.thumbnail_height == 0 {
            return Err(ConfigError::Invalid(
                "thumbnail dimensions must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
