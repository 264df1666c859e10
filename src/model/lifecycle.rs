//! One-time initialization of the colorization backend
//!
//! The first caller of [`ModelLifecycle::ensure_ready`] starts an
//! initialization attempt. Callers arriving while it is in flight join the
//! same attempt instead of starting another, and all of them observe its
//! outcome. A successful attempt publishes the handle for lock-free reads;
//! a failed one is remembered until the next caller retries.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::traits::{BackendLoader, ColorizationBackend, Device};
use crate::model::weights::WeightProvisioner;

/// Reasons the model could not be brought up
#[derive(Error, Debug, Clone)]
pub enum InitError {
    #[error("model weights missing at {}: {reason}", .path.display())]
    WeightsMissing { path: PathBuf, reason: String },

    #[error("failed to load colorization backend on {device}: {reason}")]
    BackendLoad { device: Device, reason: String },

    #[error("model initialization aborted: {0}")]
    Aborted(String),
}

/// A ready-to-use backend together with how it was loaded
pub struct ModelHandle {
    backend: Arc<dyn ColorizationBackend>,
    device: Device,
    weights: PathBuf,
}

impl ModelHandle {
    pub fn new(backend: Arc<dyn ColorizationBackend>, device: Device, weights: PathBuf) -> Self {
        Self {
            backend,
            device,
            weights,
        }
    }

    pub fn backend(&self) -> &dyn ColorizationBackend {
        self.backend.as_ref()
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("device", &self.device)
            .field("weights", &self.weights)
            .finish_non_exhaustive()
    }
}

/// Observable lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Uninitialized,
    Initializing,
    Ready(Device),
    Failed(String),
}

type InitFuture = Shared<BoxFuture<'static, Result<Arc<ModelHandle>, InitError>>>;

enum Slot {
    Idle,
    Initializing { attempt: u64, future: InitFuture },
    Failed(InitError),
}

/// Owner of the process-wide model handle
pub struct ModelLifecycle {
    loader: Arc<dyn BackendLoader>,
    provisioner: Arc<dyn WeightProvisioner>,
    prefer_gpu: bool,
    ready: OnceLock<Arc<ModelHandle>>,
    slot: Mutex<Slot>,
    attempts: AtomicU64,
}

impl ModelLifecycle {
    pub fn new(
        loader: Arc<dyn BackendLoader>,
        provisioner: Arc<dyn WeightProvisioner>,
        prefer_gpu: bool,
    ) -> Self {
        Self {
            loader,
            provisioner,
            prefer_gpu,
            ready: OnceLock::new(),
            slot: Mutex::new(Slot::Idle),
            attempts: AtomicU64::new(0),
        }
    }

    /// Return the ready handle, initializing the model if needed
    pub async fn ensure_ready(&self) -> Result<Arc<ModelHandle>, InitError> {
        if let Some(handle) = self.ready.get() {
            return Ok(handle.clone());
        }

        let (attempt, future) = {
            let mut slot = self.slot.lock();
            if let Some(handle) = self.ready.get() {
                return Ok(handle.clone());
            }

            match &*slot {
                Slot::Initializing { attempt, future } => (*attempt, future.clone()),
                Slot::Idle | Slot::Failed(_) => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(attempt, "Initializing colorization model");
                    let future = self.start_attempt();
                    *slot = Slot::Initializing {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let result = future.await;

        let mut slot = self.slot.lock();
        let current = matches!(&*slot, Slot::Initializing { attempt: a, .. } if *a == attempt);
        if current {
            match &result {
                Ok(handle) => {
                    // Only this attempt can publish, so the cell is still empty
                    let _ = self.ready.set(handle.clone());
                    *slot = Slot::Idle;
                    info!(attempt, device = %handle.device(), "Colorization model ready");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Colorization model initialization failed");
                    *slot = Slot::Failed(e.clone());
                }
            }
        }

        result
    }

    /// Current state, for diagnostics
    pub fn state(&self) -> ModelState {
        if let Some(handle) = self.ready.get() {
            return ModelState::Ready(handle.device());
        }

        match &*self.slot.lock() {
            Slot::Idle => ModelState::Uninitialized,
            Slot::Initializing { .. } => ModelState::Initializing,
            Slot::Failed(e) => ModelState::Failed(e.to_string()),
        }
    }

    /// Number of initialization attempts started so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn start_attempt(&self) -> InitFuture {
        let loader = self.loader.clone();
        let provisioner = self.provisioner.clone();
        let prefer_gpu = self.prefer_gpu;

        async move {
            let weights = provisioner.ensure_weights().await?;
            tokio::task::spawn_blocking(move || load_backend(loader.as_ref(), prefer_gpu, weights))
                .await
                .map_err(|e| InitError::Aborted(e.to_string()))?
        }
        .boxed()
        .shared()
    }
}

/// Load on the GPU when preferred, falling back to the CPU on any failure
fn load_backend(
    loader: &dyn BackendLoader,
    prefer_gpu: bool,
    weights: PathBuf,
) -> Result<Arc<ModelHandle>, InitError> {
    if prefer_gpu {
        match loader.load(Device::Gpu, &weights) {
            Ok(backend) => return Ok(Arc::new(ModelHandle::new(backend, Device::Gpu, weights))),
            Err(e) => warn!(error = %e, "GPU not available, falling back to CPU"),
        }
    }

    let backend = loader
        .load(Device::Cpu, &weights)
        .map_err(|e| InitError::BackendLoad {
            device: Device::Cpu,
            reason: e.to_string(),
        })?;

    Ok(Arc::new(ModelHandle::new(backend, Device::Cpu, weights)))
}
