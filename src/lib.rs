//! Image Colorization Service
//!
//! Accepts base64-encoded images over HTTP, normalizes them and runs them
//! through a pretrained colorization model behind a one-time lifecycle.

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod imaging;
pub mod model;
pub mod telemetry;

pub use error::{AppError, Result};

use std::sync::Arc;

use bridge::ColorizationBridge;
use imaging::ImageDecoder;
use model::command_backend::CommandBackendLoader;
use model::{BackendLoader, LocalWeights, ModelLifecycle, WeightProvisioner};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub decoder: ImageDecoder,
    pub lifecycle: Arc<ModelLifecycle>,
    pub bridge: Arc<ColorizationBridge>,
}

impl AppState {
    /// Wire the state with explicit model collaborators
    pub fn new(
        settings: config::Settings,
        loader: Arc<dyn BackendLoader>,
        provisioner: Arc<dyn WeightProvisioner>,
    ) -> Self {
        let lifecycle = ModelLifecycle::new(loader, provisioner, settings.model.prefer_gpu);

        Self {
            decoder: ImageDecoder::new(&settings.limits),
            lifecycle: Arc::new(lifecycle),
            bridge: Arc::new(ColorizationBridge::from_config(&settings.model)),
            settings: Arc::new(settings),
        }
    }

    /// Production wiring: external colorizer program and local weight file
    pub fn from_settings(settings: config::Settings) -> Self {
        let loader = CommandBackendLoader::new(&settings.backend, settings.model.timeout());
        let provisioner = LocalWeights::from_config(&settings.model);
        Self::new(settings, Arc::new(loader), Arc::new(provisioner))
    }
}
