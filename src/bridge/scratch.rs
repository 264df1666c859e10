//! Scratch files shared with the file-based model backend

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PREFIX: &str = "colorize-";

/// A file on disk that is removed when the guard is dropped.
///
/// Removal failures are logged and swallowed, so dropping never panics
/// and never turns a successful request into a failed one.
#[derive(Debug)]
pub struct ScratchFile {
    path: Option<PathBuf>,
}

impl ScratchFile {
    /// Create a new uniquely named file in `dir`
    pub fn create_in(dir: &Path, suffix: &str) -> io::Result<(Self, File)> {
        let (file, path) = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)?
            .keep()?;

        debug!(path = ?path, "Created scratch file");
        Ok((Self { path: Some(path) }, file))
    }

    /// Take ownership of a file created by someone else
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Hand the file over to the caller without deleting it
    pub fn into_path(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };

        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = ?path, "Removed scratch file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?path, error = %e, "Failed to remove scratch file"),
        }
    }
}
