#![deny(unsafe_code)]

//! Configuration loading and validation for promptcode.
//!
//! Loads an optional TOML file, fills every missing field with a default, and
//! then layers the process environment (`WORKSPACE`, `PORT`) on top. The
//! resulting [`AppConfig`] is the single source of settings for the CLI and
//! the HTTP server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable selecting the workspace root.
pub const WORKSPACE_ENV: &str = "WORKSPACE";

/// Environment variable overriding the HTTP listen port.
pub const PORT_ENV: &str = "PORT";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace selection.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Tokenizer selection.
    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// Pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which directory presets and their files are resolved against.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace root. `None` means the current working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// Tokenizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Tokenizer used when a caller does not name one (model or encoding name).
    #[serde(default = "default_tokenizer")]
    pub default: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            default: default_tokenizer(),
        }
    }
}

fn default_tokenizer() -> String {
    "gpt-4o".to_string()
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on file reads / token counts in flight at once.
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reads: default_max_concurrent_reads(),
        }
    }
}

fn default_max_concurrent_reads() -> usize {
    16
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port the server binds to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8787
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load configuration from `path` if it exists, otherwise use defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using a custom lookup.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(WORKSPACE_ENV).filter(|v| !v.is_empty()) {
            self.workspace.root = Some(root);
        }
        if let Some(port) = lookup(PORT_ENV).filter(|v| !v.is_empty()) {
            self.server.listen_port = port.parse().map_err(|_| {
                ConfigError::Validation(format!("{PORT_ENV} must be a port number, got {port:?}"))
            })?;
        }
        self.validate()
    }

    /// Resolve the workspace root, falling back to the current directory.
    pub fn workspace_root(&self) -> PathBuf {
        match &self.workspace.root {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokenizer.default.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tokenizer.default must not be empty".to_string(),
            ));
        }
        if self.pipeline.max_concurrent_reads == 0 {
            return Err(ConfigError::Validation(
                "pipeline.max_concurrent_reads must be at least 1".to_string(),
            ));
        }
        if self.server.listen_port == 0 {
            return Err(ConfigError::Validation(
                "server.listen_port must be non-zero".to_string(),
            ));
        }
        if self.server.listen_addr.is_empty() {
            return Err(ConfigError::Validation(
                "server.listen_addr must not be empty".to_string(),
            ));
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }
        if let Some(root) = &self.workspace.root {
            if root.is_empty() {
                return Err(ConfigError::Validation(
                    "workspace.root must not be empty when set".to_string(),
                ));
            }
        }
        Ok(())
    }
}
