//! Bridge between in-memory bitmaps and the file-based model backend

pub mod scratch;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageReader, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::model::{BackendError, BackendOutput, ModelHandle};
use scratch::ScratchFile;

/// JPEG quality of the image handed to the backend
pub const INPUT_JPEG_QUALITY: u8 = 95;

/// Default wait past the deadline for a backend that does not enforce it
pub const DEADLINE_GRACE: Duration = Duration::from_secs(5);

/// Per-call colorization parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    pub render_factor: u32,
    pub post_process: bool,
}

impl RenderConfig {
    /// Defaults from configuration, with an optional per-request render factor
    pub fn resolve(render_factor: Option<u32>, config: &ModelConfig) -> Self {
        Self {
            render_factor: render_factor.unwrap_or(config.render_factor),
            post_process: config.post_process,
        }
    }
}

/// Colorization failures
#[derive(Error, Debug)]
pub enum ColorizeError {
    #[error("cannot create scratch file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("cannot write backend input: {0}")]
    Input(#[source] image::ImageError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("backend returned no image")]
    EmptyResult,

    #[error("cannot read backend output: {0}")]
    Output(#[source] image::ImageError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("colorization task aborted: {0}")]
    Aborted(String),

    #[error("colorization queue closed")]
    QueueClosed,
}

/// Runs the model on bitmaps, one scratch file per call
pub struct ColorizationBridge {
    scratch_dir: PathBuf,
    timeout: Duration,
    grace: Duration,
    jobs: Arc<Semaphore>,
}

impl ColorizationBridge {
    pub fn new(scratch_dir: PathBuf, timeout: Duration, max_concurrent_jobs: usize) -> Self {
        Self {
            scratch_dir,
            timeout,
            grace: DEADLINE_GRACE,
            jobs: Arc::new(Semaphore::new(max_concurrent_jobs)),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(
            config.scratch_dir(),
            config.timeout(),
            config.max_concurrent_jobs,
        )
    }

    /// How long past the deadline a backend that ignores it is waited for
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Colorize on the blocking pool with bounded concurrency and a deadline.
    ///
    /// The deadline covers waiting for a job slot as well as the backend
    /// call, and a result arriving after it is reported as a timeout. A
    /// backend still running `grace` past the deadline is abandoned; it keeps
    /// its job slot until it returns, but the input file is removed here.
    pub async fn run(
        self: &Arc<Self>,
        bitmap: RgbImage,
        config: RenderConfig,
        handle: Arc<ModelHandle>,
    ) -> Result<RgbImage, ColorizeError> {
        let deadline = tokio::time::Instant::now() + self.timeout;

        let permit = tokio::time::timeout_at(deadline, self.jobs.clone().acquire_owned())
            .await
            .map_err(|_| ColorizeError::Timeout(self.timeout))?
            .map_err(|_| ColorizeError::QueueClosed)?;

        let (input, file) =
            ScratchFile::create_in(&self.scratch_dir, ".jpg").map_err(ColorizeError::TempFile)?;
        let path = input.path().to_path_buf();
        let timeout = self.timeout;

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            if Instant::now() >= deadline.into_std() {
                return Err(ColorizeError::Timeout(timeout));
            }
            write_input(&bitmap, file)?;
            transform(&path, config, &handle)
        });

        let result = match tokio::time::timeout_at(deadline + self.grace, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ColorizeError::Aborted(e.to_string())),
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Backend ignored its deadline, abandoning the call"
                );
                Err(ColorizeError::Timeout(self.timeout))
            }
        };
        drop(input);

        match result {
            Ok(_) if tokio::time::Instant::now() > deadline => {
                Err(ColorizeError::Timeout(timeout))
            }
            Err(ColorizeError::Backend(BackendError::Timeout(_))) => {
                Err(ColorizeError::Timeout(timeout))
            }
            other => other,
        }
    }

    /// Colorize synchronously. Every scratch file is gone when this returns.
    pub fn colorize(
        &self,
        bitmap: &RgbImage,
        config: RenderConfig,
        handle: &ModelHandle,
    ) -> Result<RgbImage, ColorizeError> {
        let (input, file) =
            ScratchFile::create_in(&self.scratch_dir, ".jpg").map_err(ColorizeError::TempFile)?;
        write_input(bitmap, file)?;
        transform(input.path(), config, handle)
    }
}

fn write_input(bitmap: &RgbImage, file: File) -> Result<(), ColorizeError> {
    let mut writer = BufWriter::new(file);
    bitmap
        .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, INPUT_JPEG_QUALITY))
        .map_err(ColorizeError::Input)?;
    writer
        .flush()
        .map_err(|e| ColorizeError::Input(image::ImageError::IoError(e)))
}

fn transform(
    input: &Path,
    config: RenderConfig,
    handle: &ModelHandle,
) -> Result<RgbImage, ColorizeError> {
    let started = Instant::now();

    let output = handle
        .backend()
        .transform(input, config.render_factor, config.post_process)?
        .ok_or(ColorizeError::EmptyResult)?;

    let colorized = normalize(output)?;
    debug!(
        width = colorized.width(),
        height = colorized.height(),
        render_factor = config.render_factor,
        device = %handle.device(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Colorized image"
    );

    Ok(colorized)
}

/// Turn either kind of backend output into an RGB bitmap
fn normalize(output: BackendOutput) -> Result<RgbImage, ColorizeError> {
    let image = match output {
        BackendOutput::Image(image) => image,
        BackendOutput::File(path) => {
            let file = ScratchFile::adopt(path);
            match std::fs::metadata(file.path()) {
                Ok(meta) if meta.len() == 0 => return Err(ColorizeError::EmptyResult),
                Ok(_) => {}
                Err(e) => warn!(path = ?file.path(), error = %e, "Cannot stat backend output"),
            }
            ImageReader::open(file.path())
                .and_then(|reader| reader.with_guessed_format())
                .map_err(|e| ColorizeError::Output(image::ImageError::IoError(e)))?
                .decode()
                .map_err(ColorizeError::Output)?
        }
    };

    if image.width() == 0 || image.height() == 0 {
        return Err(ColorizeError::EmptyResult);
    }

    Ok(image.into_rgb8())
}
