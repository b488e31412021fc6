//! Project directory of one run and its per-stage module directories.

use chrono::Local;
use std::path::{Path, PathBuf};

use crate::error::CleanseqError;
use crate::samples::{write_manifest, SampleGroup};

/// File name of the sample manifest written into the project directory.
pub const SAMPLE_MANIFEST: &str = "samples.tsv";

/// `<output>/Project_<timestamp>_<pid>`, nothing is created until [`Project::create`].
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    pub fn new(output_dir: &Path) -> Self {
        let name = format!(
            "Project_{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            std::process::id()
        );
        Self { root: output_dir.join(name) }
    }
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    /// Creates the project directory (and missing parents).
    ///
    /// # Errors
    ///
    /// * `CleanseqError::ProjectExists` if the directory is already present.
    pub fn create(&self) -> Result<(), CleanseqError> {
        if let Some(parent) = self.root.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::create_dir(&self.root) {
            Ok(()) => {
                log::info!("Created project directory: {}", self.root.display());
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(CleanseqError::ProjectExists(self.root.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }
    /// Path of a module directory, without creating it.
    pub fn module_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
    /// Creates the module directory if needed and returns its path.
    pub fn module_dir(&self, name: &str) -> Result<PathBuf, CleanseqError> {
        let dir = self.module_path(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
    pub fn write_manifest(&self, samples: &[SampleGroup]) -> Result<PathBuf, CleanseqError> {
        let path = self.root.join(SAMPLE_MANIFEST);
        write_manifest(samples, &path)?;
        Ok(path)
    }
}
