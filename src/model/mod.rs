//! Model module - Backend traits, lifecycle, weight provisioning and the command backend

pub mod command_backend;
pub mod lifecycle;
pub mod traits;
pub mod weights;

pub use lifecycle::{InitError, ModelHandle, ModelLifecycle, ModelState};
pub use traits::{BackendError, BackendLoader, BackendOutput, ColorizationBackend, Device};
pub use weights::{LocalWeights, WeightProvisioner};
