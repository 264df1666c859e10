//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lowest render factor the model accepts
pub const MIN_RENDER_FACTOR: u32 = 7;
/// Highest render factor the model accepts
pub const MAX_RENDER_FACTOR: u32 = 45;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest request body accepted by the transport, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Input image limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Maximum decoded payload size in bytes
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Images larger than this on either axis are downscaled
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

fn default_max_payload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_max_dimension() -> u32 {
    4096
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_dimension: default_max_dimension(),
        }
    }
}

/// Colorization model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_weights_path")]
    pub weights_path: PathBuf,
    #[serde(default = "default_weights_url")]
    pub weights_url: Option<String>,
    #[serde(default = "default_true")]
    pub auto_download: bool,
    #[serde(default = "default_true")]
    pub prefer_gpu: bool,
    /// Start initializing the model as soon as the server boots
    #[serde(default = "default_true")]
    pub eager_init: bool,
    #[serde(default = "default_render_factor")]
    pub render_factor: u32,
    #[serde(default = "default_true")]
    pub post_process: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Directory for the bridge's scratch files; system temp dir when unset
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_weights_path() -> PathBuf {
    PathBuf::from("./DeOldify/models/ColorizeArtistic_gen.pth")
}

fn default_weights_url() -> Option<String> {
    Some("https://data.deepai.org/deoldify/ColorizeArtistic_gen.pth".to_string())
}

fn default_render_factor() -> u32 {
    35
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent_jobs() -> usize {
    2
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: default_weights_path(),
            weights_url: default_weights_url(),
            auto_download: true,
            prefer_gpu: true,
            eager_init: true,
            render_factor: default_render_factor(),
            post_process: true,
            timeout_secs: default_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            scratch_dir: None,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// External colorizer program configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Command whose success means a GPU can be acquired
    #[serde(default = "default_gpu_probe_program")]
    pub gpu_probe_program: Option<String>,
    #[serde(default = "default_gpu_probe_args")]
    pub gpu_probe_args: Vec<String>,
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_args() -> Vec<String> {
    vec!["scripts/colorize_cli.py".to_string()]
}

fn default_gpu_probe_program() -> Option<String> {
    Some("nvidia-smi".to_string())
}

fn default_gpu_probe_args() -> Vec<String> {
    vec!["-L".to_string()]
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            gpu_probe_program: default_gpu_probe_program(),
            gpu_probe_args: default_gpu_probe_args(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            // Override with environment variables (prefixed with COLORIZER_)
            .add_source(
                Environment::with_prefix("COLORIZER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }
        if self.limits.max_payload_bytes == 0 || self.limits.max_dimension == 0 {
            return Err(invalid("Image limits must be greater than 0"));
        }
        if !(MIN_RENDER_FACTOR..=MAX_RENDER_FACTOR).contains(&self.model.render_factor) {
            return Err(invalid(format!(
                "Render factor {} is outside {}..={}",
                self.model.render_factor, MIN_RENDER_FACTOR, MAX_RENDER_FACTOR
            )));
        }
        if self.model.max_concurrent_jobs == 0 {
            return Err(invalid("model.max_concurrent_jobs must be at least 1"));
        }
        if self.model.timeout_secs == 0 {
            return Err(invalid("model.timeout_secs must be at least 1"));
        }
        if self.backend.program.trim().is_empty() {
            return Err(invalid("backend.program cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Config(config::ConfigError::Message(message.into()))
}
