use crate::db::NewGame;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Global configuration for the portal
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Game store location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Page rendering and asset settings
    #[serde(default)]
    pub portal: PortalConfig,

    /// Registry validation settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Extra catalog entries seeded after the built-in ones
    #[serde(default)]
    pub games: Vec<NewGame>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port (default: 3001, overridden by the PORT environment variable)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds open connections get to finish after shutdown starts (default: 5)
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite file, created if missing
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortalConfig {
    /// Directory served under /assets/
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Games API base URL (e.g. "http://localhost:3001/api").
    /// When unset the pages read the local store directly.
    pub api_base_url: Option<String>,

    /// Timeout for requests to a remote games API in seconds (default: 10)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl PortalConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            api_base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Refuse to start when a catalog entry has no registered game unit
    #[serde(default = "default_strict")]
    pub strict: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict: default_strict(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_database_path() -> PathBuf {
    PathBuf::from("kids_games.sqlite")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_request_timeout() -> u64 {
    10
}

fn default_strict() -> bool {
    true
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "No configuration file found, using defaults");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the PORT environment variable on top of the file settings
    pub fn apply_env(&mut self, port: Option<&str>) -> anyhow::Result<()> {
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT value '{}': {}", port, e))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        if self.portal.request_timeout_secs == 0 {
            errors.push("portal.request_timeout_secs must be greater than 0".to_string());
        }

        let mut seen = HashSet::new();
        for (i, game) in self.games.iter().enumerate() {
            if game.title.trim().is_empty() {
                errors.push(format!("games[{}]: 'title' must not be empty", i));
            }
            if game.game_component_path.trim().is_empty() {
                errors.push(format!("games[{}]: 'game_component_path' must not be empty", i));
            } else if !seen.insert(game.game_component_path.as_str()) {
                errors.push(format!(
                    "games[{}]: duplicate game_component_path '{}'",
                    i, game.game_component_path
                ));
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration validation failed:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}
