use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DirigentConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// User-tier directives root (`~/.dirigent/directives`).
    pub user_dir: String,
    /// Project-tier directives subpath, joined onto the project root.
    pub project_subdir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RegistryConfig {
    /// Path to the registry SQLite database. Empty disables the registry
    /// tier entirely (lookups and searches then cover local tiers only).
    pub db_path: String,
    /// Maximum published directive content size in bytes.
    pub max_content_bytes: usize,
    /// Server-side search result limit.
    pub search_limit: usize,
}

impl Default for DirigentConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8974,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let user_dir = default_dirigent_dir()
            .join("directives")
            .to_string_lossy()
            .into_owned();
        Self {
            user_dir,
            project_subdir: ".ai/directives".into(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let db_path = default_dirigent_dir()
            .join("registry.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            max_content_bytes: 100 * 1024,
            search_limit: 50,
        }
    }
}

/// Returns `~/.dirigent/`
pub fn default_dirigent_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".dirigent")
}

/// Returns the default config file path: `~/.dirigent/config.toml`
pub fn default_config_path() -> PathBuf {
    default_dirigent_dir().join("config.toml")
}

impl DirigentConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            DirigentConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (DIRIGENT_USER_DIR,
    /// DIRIGENT_REGISTRY_DB, DIRIGENT_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DIRIGENT_USER_DIR") {
            self.storage.user_dir = val;
        }
        if let Ok(val) = std::env::var("DIRIGENT_REGISTRY_DB") {
            self.registry.db_path = val;
        }
        if let Ok(val) = std::env::var("DIRIGENT_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the user-tier directives root, expanding `~` if needed.
    pub fn resolved_user_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.user_dir)
    }

    /// Resolve the registry database path, or `None` when disabled.
    pub fn resolved_registry_db(&self) -> Option<PathBuf> {
        if self.registry.db_path.is_empty() {
            None
        } else {
            Some(expand_tilde(&self.registry.db_path))
        }
    }

    /// Resolve a project root into its directives directory.
    pub fn project_directives_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.storage.project_subdir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
