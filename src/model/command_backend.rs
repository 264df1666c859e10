//! Colorization backend running an external program per image
//!
//! The program is invoked as
//! `<program> <args..> --input <in> --output <out> --render-factor <n>
//! --device <cpu|gpu> --weights <path> [--post-process]`
//! and is expected to write the colorized image to `<out>`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::bridge::scratch::ScratchFile;
use crate::config::BackendConfig;
use crate::model::traits::{
    BackendError, BackendLoader, BackendOutput, ColorizationBackend, Device,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_CHARS: usize = 2000;

/// Builds [`CommandBackend`]s, probing for a GPU when asked for one
#[derive(Debug, Clone)]
pub struct CommandBackendLoader {
    program: String,
    args: Vec<String>,
    gpu_probe: Option<(String, Vec<String>)>,
    timeout: Duration,
}

impl CommandBackendLoader {
    pub fn new(config: &BackendConfig, timeout: Duration) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            gpu_probe: config
                .gpu_probe_program
                .clone()
                .map(|program| (program, config.gpu_probe_args.clone())),
            timeout,
        }
    }

    fn probe_gpu(&self) -> Result<(), BackendError> {
        let Some((program, args)) = &self.gpu_probe else {
            return Err(BackendError::DeviceUnavailable(
                "no GPU probe configured".to_string(),
            ));
        };

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| BackendError::DeviceUnavailable(format!("{}: {}", program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(BackendError::DeviceUnavailable(format!(
                "{} exited with {}",
                program, status
            )))
        }
    }
}

impl BackendLoader for CommandBackendLoader {
    fn load(
        &self,
        device: Device,
        weights: &Path,
    ) -> Result<Arc<dyn ColorizationBackend>, BackendError> {
        if device == Device::Gpu {
            self.probe_gpu()?;
        }

        info!(program = %self.program, device = %device, weights = ?weights, "Configured colorizer program");

        Ok(Arc::new(CommandBackend {
            program: self.program.clone(),
            args: self.args.clone(),
            device,
            weights: weights.to_path_buf(),
            timeout: self.timeout,
        }))
    }
}

/// Runs the colorizer program once per transform
#[derive(Debug)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    device: Device,
    weights: PathBuf,
    timeout: Duration,
}

impl CommandBackend {
    fn command(&self, input: &Path, output: &Path, render_factor: u32, post_process: bool) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(output)
            .arg("--render-factor")
            .arg(render_factor.to_string())
            .arg("--device")
            .arg(self.device.as_str())
            .arg("--weights")
            .arg(&self.weights);
        if post_process {
            command.arg("--post-process");
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }
}

impl ColorizationBackend for CommandBackend {
    fn transform(
        &self,
        input: &Path,
        render_factor: u32,
        post_process: bool,
    ) -> Result<Option<BackendOutput>, BackendError> {
        // Removed on every early return; handed to the caller on success
        let output = ScratchFile::adopt(input.with_extension("colorized.png"));

        let mut child = self
            .command(input, output.path(), render_factor, post_process)
            .spawn()
            .map_err(|e| BackendError::Process(format!("cannot start {}: {}", self.program, e)))?;

        // Drain stderr concurrently so a chatty program cannot block on a full pipe
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let started = Instant::now();
        let status = wait_with_deadline(&mut child, self.timeout)?;
        let stderr = stderr
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        debug!(
            program = %self.program,
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Colorizer program finished"
        );

        if !status.success() {
            return Err(BackendError::Process(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                tail(stderr.trim(), STDERR_TAIL_CHARS)
            )));
        }

        if !output.path().exists() {
            return Ok(None);
        }

        Ok(Some(BackendOutput::File(output.into_path())))
    }
}

/// Wait for the child, killing it once `timeout` has elapsed
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus, BackendError> {
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }

        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BackendError::Timeout(timeout));
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let start = text
        .char_indices()
        .nth(count - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}
