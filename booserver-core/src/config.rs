//! Centralized configuration for BooServer.
//!
//! Loaded from a TOML file; every section has defaults so a minimal config
//! only needs to name its media sources.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Central configuration for all BooServer components.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Media source roots to index and watch.
    pub sources: Vec<SourceConfig>,
    /// Cloud polling settings shared by all cloud-backed watchers.
    pub cloud: CloudConfig,
    /// ffmpeg/ffprobe binary locations.
    pub ffmpeg: FfmpegConfig,
    /// Metadata store location.
    pub store: StoreConfig,
    /// HTTP front-end bind settings.
    pub http: HttpConfig,
}

impl ServerConfig {
    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Io` - The file could not be read
    /// - `ConfigError::Parse` - The file is not valid configuration TOML
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// One media source root.
///
/// A source with `raw_data` promises that the raw-data staging directory and
/// the source root are distinct directories.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Directory whose contents this source indexes and exposes.
    pub path: PathBuf,
    /// Display name of the source.
    pub name: String,
    /// Whether to index subdirectories.
    #[serde(default)]
    pub recursive: bool,
    /// Whether the root lives on a cloud mount (polling watcher backend).
    #[serde(default)]
    pub cloud: bool,
    /// Optional staging directory whose new files are imported lazily.
    #[serde(default)]
    pub raw_data: Option<RawDataConfig>,
}

/// Raw-data staging directory paired with a source.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDataConfig {
    /// Staging directory to watch for new files.
    pub path: PathBuf,
    /// Whether to watch subdirectories of the staging directory.
    #[serde(default)]
    pub recursive: bool,
    /// Whether the staging directory lives on a cloud mount.
    #[serde(default)]
    pub cloud: bool,
}

/// Cloud polling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Scan interval in milliseconds for all cloud watchers.
    pub scan_interval_ms: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 180_000, // 3 minutes
        }
    }
}

/// ffmpeg/ffprobe binary locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Path of the ffmpeg binary.
    pub ffmpeg: PathBuf,
    /// Path of the ffprobe binary.
    pub ffprobe: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Metadata store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path; `:memory:` for an ephemeral store.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "booserver.db".to_string(),
        }
    }
}

/// HTTP front-end configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration {path}: {source}")]
    Io {
        /// File that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("invalid configuration {path}: {source}")]
    Parse {
        /// File that was attempted.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ServerConfig::default();

        assert!(config.sources.is_empty());
        assert_eq!(config.cloud.scan_interval_ms, 180_000);
        assert_eq!(config.ffmpeg.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffmpeg.ffprobe, PathBuf::from("ffprobe"));
        assert_eq!(config.store.path, "booserver.db");
        assert_eq!(config.http.port, 3000);
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("booserver.toml");
        std::fs::write(
            &path,
            r#"
                [[sources]]
                path = "/m"
                name = "movies"
                recursive = true

                [sources.raw_data]
                path = "/r"
                cloud = true

                [cloud]
                scan_interval_ms = 60000

                [store]
                path = "/var/lib/booserver/meta.db"

                [http]
                host = "0.0.0.0"
                port = 8080
            "#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();

        assert_eq!(config.sources.len(), 1);
        let source = &config.sources[0];
        assert_eq!(source.name, "movies");
        assert!(source.recursive);
        assert!(!source.cloud);
        let raw = source.raw_data.as_ref().unwrap();
        assert_eq!(raw.path, PathBuf::from("/r"));
        assert!(raw.cloud);
        assert!(!raw.recursive);
        assert_eq!(config.cloud.scan_interval_ms, 60_000);
        assert_eq!(config.store.path, "/var/lib/booserver/meta.db");
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let result = ServerConfig::load(Path::new("/nonexistent/booserver.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
