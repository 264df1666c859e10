//! Provisioning of the pretrained weight file

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::model::lifecycle::InitError;

const PROGRESS_STEP_BYTES: u64 = 100 * 1024 * 1024;

/// Makes the model weights available on local storage
#[async_trait]
pub trait WeightProvisioner: Send + Sync {
    /// Return the path of a usable weight file
    async fn ensure_weights(&self) -> Result<PathBuf, InitError>;
}

/// Weights at a fixed local path, optionally fetched over HTTP when absent
pub struct LocalWeights {
    path: PathBuf,
    download_url: Option<String>,
    client: Client,
}

impl LocalWeights {
    pub fn new(path: impl Into<PathBuf>, download_url: Option<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            path: path.into(),
            download_url,
            client,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        let url = if config.auto_download {
            config.weights_url.clone()
        } else {
            None
        };
        Self::new(config.weights_path.clone(), url)
    }

    fn missing(&self, reason: impl Into<String>) -> InitError {
        InitError::WeightsMissing {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    async fn download(&self, url: &str) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
        }

        let partial = self.path.with_extension("part");
        let result = self.fetch_to(url, &partial).await;

        match result {
            Ok(bytes) => {
                fs::rename(&partial, &self.path)
                    .await
                    .map_err(|e| format!("cannot move downloaded weights into place: {}", e))?;
                info!(path = ?self.path, bytes, "Downloaded model weights");
                Ok(())
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&partial).await {
                    debug!(path = ?partial, error = %remove_err, "No partial download to remove");
                }
                Err(e)
            }
        }
    }

    async fn fetch_to(&self, url: &str, target: &Path) -> Result<u64, String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| format!("download from {} failed: {}", url, e))?;

        let total = response.content_length();
        info!(url = %url, total_bytes = ?total, "Downloading model weights (this may take several minutes)");

        let mut file = fs::File::create(target)
            .await
            .map_err(|e| format!("cannot create {}: {}", target.display(), e))?;

        let mut written: u64 = 0;
        let mut next_report = PROGRESS_STEP_BYTES;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| format!("download from {} interrupted: {}", url, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("cannot write {}: {}", target.display(), e))?;
            written += chunk.len() as u64;

            if written >= next_report {
                info!(downloaded_bytes = written, total_bytes = ?total, "Weight download progress");
                next_report += PROGRESS_STEP_BYTES;
            }
        }

        file.flush()
            .await
            .map_err(|e| format!("cannot write {}: {}", target.display(), e))?;

        if written == 0 {
            return Err(format!("download from {} returned an empty body", url));
        }

        Ok(written)
    }
}

#[async_trait]
impl WeightProvisioner for LocalWeights {
    async fn ensure_weights(&self) -> Result<PathBuf, InitError> {
        if is_usable(&self.path).await {
            debug!(path = ?self.path, "Model weights present");
            return Ok(self.path.clone());
        }

        let Some(url) = self.download_url.as_deref() else {
            return Err(self.missing(
                "file not found; download it manually and place it at this path \
                 (auto-download is disabled)",
            ));
        };

        warn!(path = ?self.path, "Model weights not found, attempting download");
        self.download(url).await.map_err(|e| {
            self.missing(format!(
                "{}; download it manually from {} and place it at this path",
                e, url
            ))
        })?;

        Ok(self.path.clone())
    }
}

async fn is_usable(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}
