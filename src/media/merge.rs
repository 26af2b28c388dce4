// Pica - Media Download Core
// Copyright (C) 2025 Pica contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Audio/video merge
//!
//! Combines a video-only and an audio-only file into one container without
//! re-encoding:
//!
//! `ffmpeg -y -i <video> -i <audio> -c copy <output>`
//!
//! The merge reports no progress; callers animate it themselves.

use crate::error::{PicaError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Inputs and output of one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
}

impl MergeRequest {
    pub fn new(video: impl Into<PathBuf>, audio: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            audio: audio.into(),
            output: output.into(),
        }
    }
}

/// Out-of-process merge capability
#[async_trait]
pub trait MergeTool: Send + Sync {
    async fn merge(&self, request: &MergeRequest) -> Result<()>;
}

/// ffmpeg-backed [`MergeTool`]
#[derive(Debug, Clone)]
pub struct FfmpegMerger {
    binary: String,
}

impl Default for FfmpegMerger {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegMerger {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn build_args(request: &MergeRequest) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            request.video.to_string_lossy().to_string(),
            "-i".to_string(),
            request.audio.to_string_lossy().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            request.output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl MergeTool for FfmpegMerger {
    async fn merge(&self, request: &MergeRequest) -> Result<()> {
        for input in [&request.video, &request.audio] {
            if !input.exists() {
                return Err(PicaError::FileNotFound(input.display().to_string()));
            }
        }

        tracing::debug!(
            video = %request.video.display(),
            audio = %request.audio.display(),
            output = %request.output.display(),
            "running ffmpeg merge"
        );

        let status = Command::new(&self.binary)
            .args(Self::build_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PicaError::FfmpegNotFound
                } else {
                    PicaError::FfmpegError(format!("Failed to execute ffmpeg: {}", e))
                }
            })?;

        if !status.success() {
            return Err(PicaError::MergeFailed(format!(
                "FFmpeg exited with status: {}",
                status
            )));
        }

        Ok(())
    }
}
