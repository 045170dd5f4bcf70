//! BooServer Core - media-source synchronization engine
//!
//! This crate keeps an on-disk metadata store continuously consistent with
//! one or more media source roots: filesystem watchers (native events or
//! periodic rescan for cloud-mounted drives) feed per-source orchestrators
//! that reconcile an in-memory file cache, ingest raw-data staging
//! directories (transcoding where appropriate) and mirror every change into
//! the store the HTTP front-end serves from.

#![deny(missing_docs)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]

pub mod config;
pub mod convert;
pub mod manager;
pub mod media;
pub mod source;
pub mod store;
pub mod tracing_setup;
pub mod watcher;

// Re-export main types for convenient access
pub use config::{ConfigError, ServerConfig, SourceConfig};
pub use convert::{ConvertError, FfmpegConverter, MediaConverter};
pub use manager::MediaFileManager;
pub use media::{MediaFile, MediaType};
pub use source::{MediaChange, MediaChangeKind, MediaSourceHandle, SourceError, spawn_media_source};
pub use store::{MetaData, MetaDataStore, StoreError};
pub use tracing_setup::{CliLogLevel, init_tracing};
pub use watcher::{FileChangeEvent, FileWatcher, WatcherError};

/// Errors that can bubble up from any BooServer subsystem.
#[derive(Debug, thiserror::Error)]
pub enum BooError {
    /// Watcher backend errors (observer installation, event delivery)
    #[error("Watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// ffprobe/ffmpeg invocation errors
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Metadata store errors (connection, queries, migrations)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Per-source orchestration errors (scan, ingestion, actor lifecycle)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Standard I/O errors from filesystem operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using BooError as the error type
pub type Result<T> = std::result::Result<T, BooError>;
