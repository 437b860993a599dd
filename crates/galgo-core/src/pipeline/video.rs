//! ffprobe / ffmpeg wrappers for video containers.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::{LimitsConfig, VideoConfig};
use crate::error::{ConfigError, PipelineError};

/// Subset of `ffprobe -print_format json -show_format -show_streams`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub format: Option<FfprobeFormat>,
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeFormat {
    #[serde(default)]
    pub format_name: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl FfprobeOutput {
    /// Container `creation_time`: format tags first, then the first stream
    /// that carries one.
    pub fn creation_time(&self) -> Option<&str> {
        self.format
            .as_ref()
            .and_then(|f| f.tags.get("creation_time"))
            .or_else(|| {
                self.streams
                    .iter()
                    .find_map(|s| s.tags.get("creation_time"))
            })
            .map(String::as_str)
    }
}

/// Runs ffprobe and ffmpeg under a timeout.
#[derive(Debug, Clone)]
pub struct VideoTools {
    ffprobe_path: String,
    ffmpeg_path: String,
    timeout_ms: u64,
}

impl VideoTools {
    /// Validate the configured tool paths.
    pub fn new(video: &VideoConfig, limits: &LimitsConfig) -> Result<Self, ConfigError> {
        validate_tool_path("video.ffprobe_path", &video.ffprobe_path)?;
        validate_tool_path("video.ffmpeg_path", &video.ffmpeg_path)?;
        Ok(Self {
            ffprobe_path: video.ffprobe_path.clone(),
            ffmpeg_path: video.ffmpeg_path.clone(),
            timeout_ms: limits.probe_timeout_ms,
        })
    }

    /// Probe container metadata.
    ///
    /// A tool that cannot run yields [`PipelineError::Tool`]. A tool that
    /// runs and refuses the container yields [`PipelineError::Decode`]: the
    /// payload is not a readable video.
    pub async fn probe(&self, path: &Path) -> Result<FfprobeOutput, PipelineError> {
        let start = std::time::Instant::now();
        let mut command = Command::new(&self.ffprobe_path);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);

        let finished = self.run(command, "ffprobe", path).await?;
        if !finished.status.success() {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!(
                    "ffprobe rejected the container ({}): {}",
                    finished.status,
                    String::from_utf8_lossy(&finished.stderr).trim()
                ),
            });
        }
        let output: FfprobeOutput =
            serde_json::from_slice(&finished.stdout).map_err(|e| PipelineError::Tool {
                tool: "ffprobe".to_string(),
                path: path.to_path_buf(),
                message: format!("Unparseable output: {}", e),
            })?;

        tracing::trace!(
            path = %path.display(),
            duration_ms = start.elapsed().as_millis() as u64,
            "ffprobe completed"
        );
        Ok(output)
    }

    /// Write a single frame at `offset_secs` to `output` as PNG.
    ///
    /// Clips shorter than the offset produce no frame; the first frame is
    /// tried in that case.
    pub async fn extract_frame(
        &self,
        input: &Path,
        offset_secs: f64,
        output: &Path,
    ) -> Result<(), PipelineError> {
        self.extract_frame_at(input, offset_secs, output).await?;
        if offset_secs > 0.0 && !has_content(output).await {
            tracing::debug!(
                path = %input.display(),
                offset_secs,
                "No frame at offset, retrying at start"
            );
            self.extract_frame_at(input, 0.0, output).await?;
        }
        if !has_content(output).await {
            return Err(PipelineError::Tool {
                tool: "ffmpeg".to_string(),
                path: input.to_path_buf(),
                message: "no frame extracted".to_string(),
            });
        }
        Ok(())
    }

    async fn extract_frame_at(
        &self,
        input: &Path,
        offset_secs: f64,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-v", "error", "-y", "-ss"])
            .arg(format!("{offset_secs:.3}"))
            .arg("-i")
            .arg(input)
            .args(["-frames:v", "1", "-f", "image2", "-c:v", "png"])
            .arg(output);
        let finished = self.run(command, "ffmpeg", input).await?;
        if !finished.status.success() {
            return Err(PipelineError::Tool {
                tool: "ffmpeg".to_string(),
                path: input.to_path_buf(),
                message: format!(
                    "exited with {}: {}",
                    finished.status,
                    String::from_utf8_lossy(&finished.stderr).trim()
                ),
            });
        }
        Ok(())
    }

    /// Spawn and wait under the timeout. Exit status is left to the caller.
    async fn run(
        &self,
        mut command: Command,
        tool: &str,
        path: &Path,
    ) -> Result<Output, PipelineError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let tool_error = |message: String| PipelineError::Tool {
            tool: tool.to_string(),
            path: path.to_path_buf(),
            message,
        };

        let child = command
            .spawn()
            .map_err(|e| tool_error(format!("Failed to execute: {}", e)))?;

        match timeout(
            Duration::from_millis(self.timeout_ms),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result.map_err(|e| tool_error(e.to_string())),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: tool.to_string(),
                timeout_ms: self.timeout_ms,
            }),
        }
    }
}

async fn has_content(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len() > 0)
        .unwrap_or(false)
}

/// Tool paths are passed straight to `Command::new`; refuse anything that
/// looks like shell syntax or traversal.
fn validate_tool_path(key: &str, path: &str) -> Result<(), ConfigError> {
    let safe = !path.is_empty()
        && !path.contains("..")
        && path.chars().all(|c| {
            c.is_alphanumeric() || matches!(c, '/' | '\\' | '-' | '_' | '.' | ':' | ' ')
        });
    if safe {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{key} contains unsafe characters: {path:?}"
        )))
    }
}
