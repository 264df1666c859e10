//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use colorize_server::config::Settings;
use colorize_server::imaging::base64;
use colorize_server::model::{
    BackendError, BackendLoader, BackendOutput, ColorizationBackend, Device, InitError,
    WeightProvisioner,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake backend answers
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Invert the input and return it in memory
    InvertInMemory,
    /// Invert the input and write it to a file next to the input
    InvertToFile,
    Fail,
    Empty,
    Sleep(Duration),
}

pub struct FakeBackend {
    pub behavior: Behavior,
    pub seen_inputs: Mutex<Vec<PathBuf>>,
}

impl FakeBackend {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            seen_inputs: Mutex::new(Vec::new()),
        }
    }
}

fn inverted(input: &Path) -> Result<RgbImage, BackendError> {
    let mut image = image::open(input)
        .map_err(|e| BackendError::Process(e.to_string()))?
        .to_rgb8();
    image::imageops::invert(&mut image);
    Ok(image)
}

impl ColorizationBackend for FakeBackend {
    fn transform(
        &self,
        input: &Path,
        _render_factor: u32,
        _post_process: bool,
    ) -> Result<Option<BackendOutput>, BackendError> {
        assert!(input.exists(), "input must exist while the backend runs");
        self.seen_inputs.lock().unwrap().push(input.to_path_buf());

        match self.behavior {
            Behavior::InvertInMemory => Ok(Some(BackendOutput::Image(DynamicImage::ImageRgb8(
                inverted(input)?,
            )))),
            Behavior::InvertToFile => {
                let output = input.with_extension("out.png");
                inverted(input)?
                    .save_with_format(&output, ImageFormat::Png)
                    .map_err(|e| BackendError::Process(e.to_string()))?;
                Ok(Some(BackendOutput::File(output)))
            }
            Behavior::Fail => Err(BackendError::Process("model exploded".to_string())),
            Behavior::Empty => Ok(None),
            Behavior::Sleep(duration) => {
                std::thread::sleep(duration);
                Ok(Some(BackendOutput::Image(DynamicImage::ImageRgb8(
                    inverted(input)?,
                ))))
            }
        }
    }
}

/// Loader handing out one shared backend, counting loads per device
pub struct FakeLoader {
    pub backend: Arc<FakeBackend>,
    pub gpu_available: bool,
    pub load_delay: Duration,
    pub gpu_loads: AtomicUsize,
    pub cpu_loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            backend: Arc::new(FakeBackend::new(behavior)),
            gpu_available: false,
            load_delay: Duration::ZERO,
            gpu_loads: AtomicUsize::new(0),
            cpu_loads: AtomicUsize::new(0),
        }
    }

    pub fn total_loads(&self) -> usize {
        self.gpu_loads.load(Ordering::SeqCst) + self.cpu_loads.load(Ordering::SeqCst)
    }
}

impl BackendLoader for FakeLoader {
    fn load(
        &self,
        device: Device,
        _weights: &Path,
    ) -> Result<Arc<dyn ColorizationBackend>, BackendError> {
        std::thread::sleep(self.load_delay);
        match device {
            Device::Gpu => {
                self.gpu_loads.fetch_add(1, Ordering::SeqCst);
                if !self.gpu_available {
                    return Err(BackendError::DeviceUnavailable("no CUDA device".to_string()));
                }
            }
            Device::Cpu => {
                self.cpu_loads.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(self.backend.clone())
    }
}

/// Provisioner that either succeeds or reports missing weights
pub struct FakeWeights {
    pub present: bool,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeWeights {
    pub fn present() -> Self {
        Self {
            present: true,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn missing() -> Self {
        Self {
            present: false,
            ..Self::present()
        }
    }
}

#[async_trait]
impl WeightProvisioner for FakeWeights {
    async fn ensure_weights(&self) -> Result<PathBuf, InitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.present {
            Ok(PathBuf::from("/models/ColorizeArtistic_gen.pth"))
        } else {
            Err(InitError::WeightsMissing {
                path: PathBuf::from("/models/ColorizeArtistic_gen.pth"),
                reason: "file not found".to_string(),
            })
        }
    }
}

/// Settings pointing the bridge at `scratch_dir`
pub fn settings(scratch_dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.model.scratch_dir = Some(scratch_dir.to_path_buf());
    settings.model.prefer_gpu = false;
    settings
}

pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = ((x + y) % 256) as u8;
        Rgb([v, v, v])
    })
}

pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

pub fn png_base64(width: u32, height: u32) -> String {
    base64::encode(&encode_image(
        &DynamicImage::ImageRgb8(gradient(width, height)),
        ImageFormat::Png,
    ))
}

pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}
