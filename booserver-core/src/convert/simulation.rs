//! Deterministic converter for tests.
//!
//! Stands in for the ffprobe/ffmpeg binaries: probe results are configured
//! up front, "conversion" is a plain file copy, and every call is recorded so
//! tests can assert on ingestion behavior.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Chapter, ConvertError, MediaConverter};
use crate::media::paths;

/// Simulation [`MediaConverter`] with scriptable probe failures.
#[derive(Debug, Default)]
pub struct SimulationConverter {
    duration: f64,
    fail_probe: Mutex<HashSet<PathBuf>>,
    fail_convert: Mutex<HashSet<PathBuf>>,
    no_video: Mutex<HashSet<PathBuf>>,
    conversions: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl SimulationConverter {
    /// Creates a converter reporting a duration of 0 for every probe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the duration reported for every successful probe.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Makes duration probes for `path` fail until [`Self::unfail_probe`],
    /// simulating a cloud-mounted file whose bytes are not downloaded yet.
    pub fn fail_probe(&self, path: &Path) {
        self.locked(&self.fail_probe).insert(path.to_path_buf());
    }

    /// Lets duration probes for `path` succeed again.
    pub fn unfail_probe(&self, path: &Path) {
        self.locked(&self.fail_probe).remove(path);
    }

    /// Makes conversions with `path` as input fail.
    pub fn fail_convert(&self, path: &Path) {
        self.locked(&self.fail_convert).insert(path.to_path_buf());
    }

    /// Treats `path` as having no video stream, so conversion returns false.
    pub fn mark_no_video(&self, path: &Path) {
        self.locked(&self.no_video).insert(path.to_path_buf());
    }

    /// Every `(input, output)` pair `convert` was called with so far.
    pub fn conversions(&self) -> Vec<(PathBuf, PathBuf)> {
        self.locked(&self.conversions).clone()
    }

    fn locked<'a, T>(&self, lock: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl MediaConverter for SimulationConverter {
    async fn duration(&self, path: &Path) -> Result<f64, ConvertError> {
        if self.locked(&self.fail_probe).contains(path) {
            return Err(ConvertError::Failed {
                tool: "ffprobe",
                path: paths::normalize(path),
                stderr: "simulated probe failure".to_string(),
            });
        }
        Ok(self.duration)
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<bool, ConvertError> {
        self.locked(&self.conversions)
            .push((input.to_path_buf(), output.to_path_buf()));

        if self.locked(&self.fail_convert).contains(input) {
            return Err(ConvertError::Failed {
                tool: "ffmpeg",
                path: paths::normalize(input),
                stderr: "simulated conversion failure".to_string(),
            });
        }
        if self.locked(&self.no_video).contains(input) {
            return Ok(false);
        }

        tokio::fs::copy(input, output)
            .await
            .map_err(|source| ConvertError::Spawn { tool: "ffmpeg", source })?;
        Ok(true)
    }

    async fn chapters(&self, _path: &Path) -> Result<Vec<Chapter>, ConvertError> {
        Ok(Vec::new())
    }
}
