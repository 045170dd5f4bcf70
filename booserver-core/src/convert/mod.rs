//! Media inspection and conversion.
//!
//! Abstracts ffprobe/ffmpeg behind [`MediaConverter`] so the engine can run
//! against the real binaries in production and a deterministic simulation in
//! tests.

mod ffmpeg;
#[cfg(any(test, feature = "test-utils"))]
pub mod simulation;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

pub use ffmpeg::FfmpegConverter;

/// One chapter marker as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    /// Chapter identifier from the container.
    pub id: i64,
    /// Start offset in seconds.
    pub start: f64,
    /// End offset in seconds.
    pub end: f64,
    /// Chapter title; empty when the container carries none.
    pub title: String,
}

/// Media inspection and conversion operations.
#[async_trait]
pub trait MediaConverter: Send + Sync {
    /// Playback duration of a media file in seconds.
    ///
    /// # Errors
    ///
    /// - `ConvertError::Failed` - ffprobe exited non-zero (typically a file
    ///   whose bytes are not fully materialized yet)
    /// - `ConvertError::Parse` - ffprobe produced no parseable duration
    async fn duration(&self, path: &Path) -> Result<f64, ConvertError>;

    /// Normalizes `input` into `output` for streaming.
    ///
    /// HEVC video is re-encoded with the `hvc1` tag and faststart layout;
    /// any other video stream is stream-copied with faststart. Returns
    /// `false` without writing `output` when the input has no video stream.
    ///
    /// # Errors
    ///
    /// - `ConvertError::Failed` - ffmpeg exited non-zero; the message carries
    ///   the captured stderr
    async fn convert(&self, input: &Path, output: &Path) -> Result<bool, ConvertError>;

    /// Chapter markers of a media file.
    ///
    /// # Errors
    ///
    /// - `ConvertError::Failed` - ffprobe exited non-zero
    async fn chapters(&self, path: &Path) -> Result<Vec<Chapter>, ConvertError>;
}

/// Errors from ffprobe/ffmpeg invocations.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The tool binary could not be started at all.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        /// Binary that failed to start.
        tool: &'static str,
        /// Underlying process spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited non-zero.
    #[error("{tool} failed on {path}: {stderr}")]
    Failed {
        /// Binary that failed.
        tool: &'static str,
        /// Input the tool was pointed at.
        path: String,
        /// Captured stderr of the failed run.
        stderr: String,
    },

    /// The tool output could not be interpreted.
    #[error("unreadable {tool} output for {path}: {reason}")]
    Parse {
        /// Binary whose output was unreadable.
        tool: &'static str,
        /// Input the tool was pointed at.
        path: String,
        /// What was wrong with the output.
        reason: String,
    },
}
