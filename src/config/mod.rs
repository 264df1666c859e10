//! Configuration module

pub mod settings;

pub use settings::{
    BackendConfig, LimitsConfig, LoggingConfig, ModelConfig, ServerConfig, Settings,
    MAX_RENDER_FACTOR, MIN_RENDER_FACTOR,
};
