//! FFmpeg wrapper for rendering and probing masters

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use artifacts::models::master::ProbeSummary;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;

use crate::services::config::ProductionConfig;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("unusable probe output: {0}")]
    Probe(String),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One master to encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_seconds: u32,
}

#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), ToolError>;
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeSummary, ToolError>;
}

/// FFmpeg client for rendering and stream probing
#[derive(Debug, Clone)]
pub struct FFmpegClient {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    encode_timeout: Duration,
    probe_timeout: Duration,
}

impl FFmpegClient {
    /// Configured paths win; otherwise search the usual install locations.
    /// An unresolved tool is launched by bare name so the failure surfaces
    /// per render rather than aborting the stage.
    pub fn from_config(config: &ProductionConfig) -> Self {
        Self {
            ffmpeg_path: config
                .ffmpeg_path
                .clone()
                .unwrap_or_else(|| Self::find_executable("ffmpeg")),
            ffprobe_path: config
                .ffprobe_path
                .clone()
                .unwrap_or_else(|| Self::find_executable("ffprobe")),
            encode_timeout: Duration::from_secs(config.encode_timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        }
    }

    fn find_executable(name: &str) -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_default();
        let mut candidates = vec![
            PathBuf::from(format!("{}/bin/{}", home, name)),
            PathBuf::from(format!("{}/.local/bin/{}", home, name)),
            PathBuf::from(format!("/usr/local/bin/{}", name)),
            PathBuf::from(format!("/opt/homebrew/bin/{}", name)),
        ];
        if let Some(path_var) = std::env::var_os("PATH") {
            candidates.extend(std::env::split_paths(&path_var).map(|dir| dir.join(name)));
        }

        candidates
            .into_iter()
            .find(|p| p.is_file())
            .unwrap_or_else(|| PathBuf::from(name))
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe_path
    }

    /// Synthetic vertical master: a solid colour card with a tone bed,
    /// fixed resolution and frame rate, bounded by `-t`.
    pub fn encode_args(request: &EncodeRequest) -> Vec<String> {
        let d = request.duration_seconds;
        vec![
            "-y".into(),
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!(
                "color=c=0x0b1d3a:s={}x{}:r={}:d={}",
                request.width, request.height, request.fps, d
            ),
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!("sine=frequency=220:sample_rate=48000:duration={}", d),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-r".into(),
            request.fps.to_string(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "128k".into(),
            "-t".into(),
            d.to_string(),
            "-shortest".into(),
            "-movflags".into(),
            "+faststart".into(),
            request.output.to_string_lossy().to_string(),
        ]
    }

    async fn run_tool(
        program: &Path,
        args: &[String],
        limit: Duration,
    ) -> Result<std::process::Output, ToolError> {
        let tool = program.to_string_lossy().to_string();
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(limit, command.output()).await {
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool,
                    secs: limit.as_secs(),
                });
            }
            Ok(result) => result.map_err(|source| ToolError::Spawn {
                tool: tool.clone(),
                source,
            })?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // The banner comes first; the actual error is at the end
            let lines: Vec<&str> = stderr.lines().collect();
            return Err(ToolError::Failed {
                tool,
                status: output.status.to_string(),
                stderr: lines[lines.len().saturating_sub(5)..].join("\n"),
            });
        }
        Ok(output)
    }

    /// Parse `ffprobe -print_format json -show_format -show_streams` output.
    pub fn parse_probe(json: &Value) -> Result<ProbeSummary, ToolError> {
        let streams = json["streams"]
            .as_array()
            .ok_or_else(|| ToolError::Probe("no streams found".to_string()))?;

        let video_stream = streams
            .iter()
            .find(|s| s["codec_type"].as_str() == Some("video"))
            .ok_or_else(|| ToolError::Probe("no video stream found".to_string()))?;

        let audio_stream = streams
            .iter()
            .find(|s| s["codec_type"].as_str() == Some("audio"));

        // "30/1" or "29.97"
        let frame_rate = video_stream["r_frame_rate"]
            .as_str()
            .and_then(parse_rate)
            .unwrap_or(0.0);

        let duration_seconds = json["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| {
                video_stream["duration"]
                    .as_str()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or(0.0);

        Ok(ProbeSummary {
            width: video_stream["width"].as_u64().unwrap_or(0) as u32,
            height: video_stream["height"].as_u64().unwrap_or(0) as u32,
            duration_seconds,
            video_codec: video_stream["codec_name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            audio_codec: audio_stream
                .and_then(|s| s["codec_name"].as_str())
                .map(|s| s.to_string()),
            frame_rate,
        })
    }
}

fn parse_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => raw.parse().ok(),
    }
}

#[async_trait]
impl Encoder for FFmpegClient {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), ToolError> {
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ToolError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let args = Self::encode_args(request);
        Self::run_tool(&self.ffmpeg_path, &args, self.encode_timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl Prober for FFmpegClient {
    async fn probe(&self, path: &Path) -> Result<ProbeSummary, ToolError> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = Self::run_tool(&self.ffprobe_path, &args, self.probe_timeout).await?;
        let json: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ToolError::Probe(e.to_string()))?;
        Self::parse_probe(&json)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn probe_json_is_summarised() {
        let raw = json!({
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1080, "height": 1920, "r_frame_rate": "30/1"},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "45.021000"}
        });
        let probe = FFmpegClient::parse_probe(&raw).unwrap();
        assert_eq!(probe.resolution(), "1080x1920");
        assert_eq!(probe.frame_rate, 30.0);
        assert_eq!(probe.audio_codec.as_deref(), Some("aac"));
        assert!((probe.duration_seconds - 45.021).abs() < 1e-9);
    }

    #[test]
    fn missing_video_stream_is_an_error() {
        let raw = json!({"streams": [{"codec_type": "audio", "codec_name": "aac"}], "format": {}});
        assert!(matches!(FFmpegClient::parse_probe(&raw), Err(ToolError::Probe(_))));
    }

    #[test]
    fn rates() {
        assert_eq!(parse_rate("30000/1001").map(|r| (r * 100.0).round()), Some(2997.0));
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
    }

    #[test]
    fn encode_args_pin_target_and_duration() {
        let args = FFmpegClient::encode_args(&EncodeRequest {
            output: PathBuf::from("/tmp/MST_x.mp4"),
            width: 1080,
            height: 1920,
            fps: 30,
            duration_seconds: 45,
        });
        assert!(args.iter().any(|a| a.contains("s=1080x1920:r=30")));
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "45");
        assert_eq!(args.last().map(String::as_str), Some("/tmp/MST_x.mp4"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let client = FFmpegClient::from_config(&ProductionConfig {
            ffprobe_path: Some(PathBuf::from("/nonexistent/ffprobe")),
            ..ProductionConfig::default()
        });
        let err = client.probe(Path::new("/tmp/none.mp4")).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
