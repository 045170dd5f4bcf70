//! Production converter backed by the ffprobe/ffmpeg binaries.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use super::{Chapter, ConvertError, MediaConverter};
use crate::config::FfmpegConfig;
use crate::media::paths;

/// Root of ffprobe's `-print_format json` output.
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
    #[serde(default)]
    chapters: Vec<ProbeChapter>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeChapter {
    #[serde(default)]
    id: i64,
    start_time: Option<String>,
    end_time: Option<String>,
    tags: Option<ChapterTags>,
}

#[derive(Debug, Deserialize)]
struct ChapterTags {
    title: Option<String>,
}

/// [`MediaConverter`] implementation spawning the configured ffprobe and
/// ffmpeg binaries as child processes.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegConverter {
    /// Creates a converter using the given binary paths.
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        Self { ffmpeg, ffprobe }
    }

    /// Creates a converter from the `[ffmpeg]` configuration section.
    pub fn from_config(config: &FfmpegConfig) -> Self {
        Self::new(config.ffmpeg.clone(), config.ffprobe.clone())
    }

    /// ffmpeg arguments for the HEVC re-encode with `hvc1` tag and faststart.
    fn transcode_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-c:v".into(),
            "libx265".into(),
            "-x265-params".into(),
            "chroma-format=420".into(),
            "-tag:v".into(),
            "hvc1".into(),
            "-c:a".into(),
            "copy".into(),
            "-movflags".into(),
            "faststart".into(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// ffmpeg arguments for the stream-copy faststart rewrite.
    fn remux_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "copy".into(),
            "-movflags".into(),
            "faststart".into(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// Runs a tool to completion, capturing output and mapping non-zero exit
    /// to [`ConvertError::Failed`].
    async fn run(
        binary: &Path,
        tool: &'static str,
        args: &[String],
        input: &Path,
    ) -> Result<std::process::Output, ConvertError> {
        let output = tokio::process::Command::new(binary)
            .args(args)
            .output()
            .await
            .map_err(|source| ConvertError::Spawn { tool, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!("{tool} exited with {}: {stderr}", output.status);
            return Err(ConvertError::Failed {
                tool,
                path: paths::normalize(input),
                stderr,
            });
        }

        Ok(output)
    }

    async fn probe(&self, path: &Path, section: &str) -> Result<ProbeOutput, ConvertError> {
        let args: Vec<String> = vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            section.into(),
            path.to_string_lossy().into_owned(),
        ];
        let output = Self::run(&self.ffprobe, "ffprobe", &args, path).await?;
        parse_probe_output(&output.stdout, path)
    }
}

fn parse_probe_output(stdout: &[u8], path: &Path) -> Result<ProbeOutput, ConvertError> {
    serde_json::from_slice(stdout).map_err(|err| ConvertError::Parse {
        tool: "ffprobe",
        path: paths::normalize(path),
        reason: err.to_string(),
    })
}

fn parse_duration(probe: &ProbeOutput, path: &Path) -> Result<f64, ConvertError> {
    probe
        .format
        .as_ref()
        .and_then(|format| format.duration.as_deref())
        .and_then(|duration| duration.parse::<f64>().ok())
        .ok_or_else(|| ConvertError::Parse {
            tool: "ffprobe",
            path: paths::normalize(path),
            reason: "missing format.duration".to_string(),
        })
}

/// Codec name of the first video stream, if the file has one.
fn video_codec(probe: &ProbeOutput) -> Option<&str> {
    probe
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
        .and_then(|stream| stream.codec_name.as_deref())
}

fn seconds(value: Option<&str>) -> f64 {
    value.and_then(|raw| raw.parse::<f64>().ok()).unwrap_or(0.0)
}

#[async_trait]
impl MediaConverter for FfmpegConverter {
    async fn duration(&self, path: &Path) -> Result<f64, ConvertError> {
        let probe = self.probe(path, "-show_format").await?;
        parse_duration(&probe, path)
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<bool, ConvertError> {
        let probe = self.probe(input, "-show_streams").await?;
        let Some(codec) = video_codec(&probe) else {
            return Ok(false);
        };

        let args = if codec.eq_ignore_ascii_case("hevc") {
            tracing::info!("transcoding HEVC {} -> {}", input.display(), output.display());
            Self::transcode_args(input, output)
        } else {
            tracing::info!("remuxing {} -> {}", input.display(), output.display());
            Self::remux_args(input, output)
        };

        Self::run(&self.ffmpeg, "ffmpeg", &args, input).await?;
        Ok(true)
    }

    async fn chapters(&self, path: &Path) -> Result<Vec<Chapter>, ConvertError> {
        let probe = self.probe(path, "-show_chapters").await?;
        Ok(probe
            .chapters
            .iter()
            .map(|chapter| Chapter {
                id: chapter.id,
                start: seconds(chapter.start_time.as_deref()),
                end: seconds(chapter.end_time.as_deref()),
                title: chapter
                    .tags
                    .as_ref()
                    .and_then(|tags| tags.title.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_args_tag_hevc_with_faststart() {
        let args = FfmpegConverter::transcode_args(Path::new("/r/v.mp4"), Path::new("/m/v.mp4"));
        let joined = args.join(" ");
        assert_eq!(
            joined,
            "-y -i /r/v.mp4 -c:v libx265 -x265-params chroma-format=420 \
             -tag:v hvc1 -c:a copy -movflags faststart /m/v.mp4"
        );
    }

    #[test]
    fn test_remux_args_copy_streams() {
        let args = FfmpegConverter::remux_args(Path::new("/r/v.mp4"), Path::new("/m/v.mp4"));
        let joined = args.join(" ");
        assert_eq!(joined, "-y -i /r/v.mp4 -c:v copy -c:a copy -movflags faststart /m/v.mp4");
    }

    #[test]
    fn test_parse_duration() {
        let raw = br#"{"format": {"duration": "12.480000"}}"#;
        let probe = parse_probe_output(raw, Path::new("/m/a.mp4")).unwrap();
        assert_eq!(parse_duration(&probe, Path::new("/m/a.mp4")).unwrap(), 12.48);
    }

    #[test]
    fn test_parse_duration_missing_is_an_error() {
        let raw = br#"{"format": {}}"#;
        let probe = parse_probe_output(raw, Path::new("/m/a.mp4")).unwrap();
        assert!(matches!(
            parse_duration(&probe, Path::new("/m/a.mp4")),
            Err(ConvertError::Parse { .. })
        ));
    }

    #[test]
    fn test_video_codec_picks_first_video_stream() {
        let raw = br#"{"streams": [
            {"codec_type": "audio", "codec_name": "aac"},
            {"codec_type": "video", "codec_name": "hevc"},
            {"codec_type": "video", "codec_name": "h264"}
        ]}"#;
        let probe = parse_probe_output(raw, Path::new("/m/a.mp4")).unwrap();
        assert_eq!(video_codec(&probe), Some("hevc"));
    }

    #[test]
    fn test_video_codec_none_for_audio_only() {
        let raw = br#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}]}"#;
        let probe = parse_probe_output(raw, Path::new("/m/a.mp3")).unwrap();
        assert_eq!(video_codec(&probe), None);
    }

    #[test]
    fn test_parse_chapters() {
        let raw = br#"{"chapters": [
            {"id": 0, "start_time": "0.000000", "end_time": "30.5", "tags": {"title": "Intro"}},
            {"id": 1, "start_time": "30.5", "end_time": "60.0"}
        ]}"#;
        let probe = parse_probe_output(raw, Path::new("/m/a.mp4")).unwrap();
        assert_eq!(probe.chapters.len(), 2);
        assert_eq!(probe.chapters[0].tags.as_ref().unwrap().title.as_deref(), Some("Intro"));
    }
}
