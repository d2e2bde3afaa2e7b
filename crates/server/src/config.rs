//! # Application Configuration
//!
//! This module defines the configuration structure for the `finder-server` and
//! provides the logic for loading it from an optional `config.yml` file and
//! environment variables.
//!
//! The plain variables `API_HOST`, `API_PORT`, `RPC_HOST`, `RPC_PORT` and
//! `DOWNLOAD_PATH` map directly onto the top-level keys. Any key can also be
//! set with a `FINDER_` prefix (e.g. `FINDER_RPC_TIMEOUT_SECS`).

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use finder::{DownloadSettings, RpcSettings};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates a required configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The interface the HTTP server binds to.
    #[serde(default = "default_api_host")]
    pub api_host: String,
    /// The port the HTTP server listens on.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Host of the recognition RPC service.
    #[serde(default = "default_rpc_host")]
    pub rpc_host: String,
    /// Port of the recognition RPC service.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    /// Directory downloaded images are written to. Created at startup if missing.
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_download_connect_timeout_secs")]
    pub download_connect_timeout_secs: u64,
    #[serde(default = "default_rpc_connect_timeout_secs")]
    pub rpc_connect_timeout_secs: u64,
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
    /// Upper bound on a downloaded image's size.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}
fn default_api_port() -> u16 {
    8000
}
fn default_rpc_host() -> String {
    "127.0.0.1".to_string()
}
fn default_rpc_port() -> u16 {
    4242
}
fn default_download_path() -> PathBuf {
    PathBuf::from("downloads")
}
fn default_download_timeout_secs() -> u64 {
    30
}
fn default_download_connect_timeout_secs() -> u64 {
    10
}
fn default_rpc_connect_timeout_secs() -> u64 {
    10
}
fn default_rpc_timeout_secs() -> u64 {
    30
}
fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}

impl AppConfig {
    /// Download limits for the image downloader.
    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            timeout: Duration::from_secs(self.download_timeout_secs),
            connect_timeout: Duration::from_secs(self.download_connect_timeout_secs),
            max_bytes: self.max_image_bytes,
        }
    }

    /// Connection settings for the recognition client.
    pub fn rpc_settings(&self) -> RpcSettings {
        RpcSettings {
            connect_timeout: Duration::from_secs(self.rpc_connect_timeout_secs),
            call_timeout: Duration::from_secs(self.rpc_timeout_secs),
            ..RpcSettings::new(self.rpc_host.clone(), self.rpc_port)
        }
    }
}

// Helper to read a file, substitute `${VAR}` references, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(format!("Invalid substitution pattern: {e}")))?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads the application configuration from a file and environment variables.
///
/// Layers, lowest precedence first:
/// 1. Built-in defaults.
/// 2. The YAML file at `config_path_override`, or `config.yml` next to this
///    crate's manifest if it exists. An explicit override path must exist.
/// 3. Plain environment variables (`RPC_HOST`, `DOWNLOAD_PATH`, ...).
/// 4. `FINDER_`-prefixed environment variables.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    let file_content = match config_path_override {
        Some(path) => Some(read_and_substitute(path)?.ok_or_else(|| {
            ConfigError::NotFound(format!("Config file not found at '{path}'."))
        })?),
        None => {
            let default_path = format!("{}/config.yml", env!("CARGO_MANIFEST_DIR"));
            let content = read_and_substitute(&default_path)?;
            if content.is_some() {
                info!("Loading configuration from '{default_path}'.");
            }
            content
        }
    };
    if let Some(content) = file_content {
        builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
    }

    let settings = builder
        .add_source(Environment::default().try_parsing(true))
        .add_source(
            Environment::with_prefix("FINDER")
                .prefix_separator("_")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
