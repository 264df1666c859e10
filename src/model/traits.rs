//! Common traits and types for colorization backends

use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Compute device a backend runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Gpu,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Gpu => "gpu",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend hands back after a transform
#[derive(Debug)]
pub enum BackendOutput {
    /// Result written to a file; the caller owns and removes it
    File(PathBuf),
    /// Result kept in memory
    Image(DynamicImage),
}

/// Errors raised by a backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("backend process failed: {0}")]
    Process(String),

    #[error("backend timed out after {0:?}")]
    Timeout(Duration),
}

/// A loaded colorization model.
///
/// Implementations block; callers run them on the blocking pool.
pub trait ColorizationBackend: Send + Sync {
    /// Colorize the image stored at `input`.
    ///
    /// `Ok(None)` means the backend ran but produced nothing.
    fn transform(
        &self,
        input: &Path,
        render_factor: u32,
        post_process: bool,
    ) -> Result<Option<BackendOutput>, BackendError>;
}

/// One-time device and weights setup producing a backend
pub trait BackendLoader: Send + Sync {
    fn load(
        &self,
        device: Device,
        weights: &Path,
    ) -> Result<Arc<dyn ColorizationBackend>, BackendError>;
}
