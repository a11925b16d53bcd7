//! Audio assembly
//!
//! Joins the per-chunk MP3 segments of a run into a single output file.
//! One segment is moved into place untouched. Several are concatenated by
//! ffmpeg's concat demuxer with stream copy, so no re-encoding happens.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;

/// Assembly errors
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("No audio segments to assemble")]
    NoSegments,

    #[error("Audio tool '{tool}' is not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("Audio tool exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for assembly operations
pub type Result<T> = std::result::Result<T, AssemblyError>;

/// Audio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    /// ffmpeg executable name or path
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// Where segments are written during a run; defaults to the output directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    /// Where finished files land; defaults to the current directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            work_dir: None,
            output_dir: None,
        }
    }
}

impl AudioConfig {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.ffmpeg_path.as_os_str().is_empty() {
            return Err("ffmpegPath must not be empty".to_string());
        }
        Ok(())
    }
}

/// Concatenates ordered segments into one file.
#[derive(Debug, Clone)]
pub struct AudioAssembler {
    ffmpeg_path: PathBuf,
}

impl Default for AudioAssembler {
    fn default() -> Self {
        Self::new(default_ffmpeg_path())
    }
}

impl AudioAssembler {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.ffmpeg_path.clone())
    }

    /// Assemble `segments` (already in playback order) into `output`.
    ///
    /// Input segments are left in place except in the single-segment case,
    /// where the segment itself becomes the output.
    pub async fn assemble(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        match segments {
            [] => Err(AssemblyError::NoSegments),
            [single] => {
                move_file(single, output).await?;
                tracing::debug!(output = %output.display(), "Single segment moved into place");
                Ok(output.to_path_buf())
            }
            _ => {
                self.concat(segments, output).await?;
                tracing::debug!(
                    output = %output.display(),
                    segments = segments.len(),
                    "Segments concatenated"
                );
                Ok(output.to_path_buf())
            }
        }
    }

    async fn concat(&self, segments: &[PathBuf], output: &Path) -> Result<()> {
        let run_id = uuid::Uuid::new_v4();
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let manifest = output.with_file_name(format!(".{}.{}.concat.txt", stem, run_id));
        let staging = output.with_file_name(format!(".{}.{}.staging.mp3", stem, run_id));

        let result = self.run_concat(segments, &manifest, &staging, output).await;

        if let Err(e) = fs::remove_file(&manifest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %manifest.display(), error = %e, "Failed to remove concat manifest");
            }
        }
        if result.is_err() {
            let _ = fs::remove_file(&staging).await;
        }

        result
    }

    async fn run_concat(
        &self,
        segments: &[PathBuf],
        manifest: &Path,
        staging: &Path,
        output: &Path,
    ) -> Result<()> {
        let mut listing = String::new();
        for segment in segments {
            let absolute = fs::canonicalize(segment).await?;
            listing.push_str(&manifest_line(&absolute));
            listing.push('\n');
        }
        fs::write(manifest, listing).await?;

        let result = Command::new(&self.ffmpeg_path)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(staging)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output_status = match result {
            Ok(out) => out,
            Err(e) => {
                return Err(AssemblyError::ToolUnavailable {
                    tool: self.ffmpeg_path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        if !output_status.status.success() {
            return Err(AssemblyError::ToolFailed {
                status: output_status.status.to_string(),
                stderr: String::from_utf8_lossy(&output_status.stderr).trim().to_string(),
            });
        }

        fs::rename(staging, output).await?;
        Ok(())
    }
}

/// One concat-demuxer entry; single quotes are closed, escaped and reopened.
fn manifest_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{}'", escaped)
}

/// Rename, falling back to a copy when crossing filesystems.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(error = %rename_err, "Rename failed, copying instead");
            copy_into_place(from, to).await
        }
    }
}

/// Copy `from` beside `to` under a hidden name, then rename it into place.
///
/// `to` only ever appears complete. The source is removed afterwards; failing
/// to do so is logged, since the caller's cleanup also owns it.
async fn copy_into_place(from: &Path, to: &Path) -> std::io::Result<()> {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let staging = to.with_file_name(format!(".{}.{}.copy", name, uuid::Uuid::new_v4()));

    let copied = match fs::copy(from, &staging).await {
        Ok(_) => fs::rename(&staging, to).await,
        Err(e) => Err(e),
    };
    if let Err(e) = copied {
        let _ = fs::remove_file(&staging).await;
        return Err(e);
    }

    if let Err(e) = fs::remove_file(from).await {
        tracing::warn!(path = %from.display(), error = %e, "Failed to remove moved segment");
    }
    Ok(())
}
