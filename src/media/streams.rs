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


//! Stream descriptors and selection policy
//!
//! A resolved source is a set of [`StreamDescriptor`]s. Each descriptor is
//! read-only metadata plus an opaque download capability
//! ([`StreamTransfer`]). Descriptors are shared through `Arc` so the caller
//! keeps ownership while a job references them.
//!
//! # Selection rules
//! - Quality options: one per resolution, progressive preferred over
//!   video-only at the same resolution, highest resolution first
//! - Audio pairing: highest bitrate in the video container's audio family,
//!   otherwise highest bitrate of any container

use crate::error::{PicaError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// What a stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Audio and video muxed together
    Progressive,
    /// Video track only (adaptive)
    VideoOnly,
    /// Audio track only (adaptive)
    AudioOnly,
}

/// Container format of a stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Container {
    Mp4,
    Webm,
    Other(String),
}

impl Container {
    /// Parse from an extension or a mime subtype (`mp4`, `video/webm`, `m4a`)
    pub fn parse(value: &str) -> Self {
        let subtype = value.rsplit('/').next().unwrap_or(value).trim().to_lowercase();
        match subtype.as_str() {
            "mp4" | "m4a" | "m4v" => Container::Mp4,
            "webm" | "weba" => Container::Webm,
            other => Container::Other(other.to_string()),
        }
    }

    /// File extension for a file holding video (or muxed) content
    pub fn video_extension(&self) -> &str {
        match self {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::Other(ext) => ext,
        }
    }

    /// File extension for a file holding audio-only content
    pub fn audio_extension(&self) -> &str {
        match self {
            Container::Mp4 => "m4a",
            Container::Webm => "webm",
            Container::Other(ext) => ext,
        }
    }
}

/// One progress notification from a running transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Id of the stream being transferred
    pub stream_id: String,
    /// Size of the chunk just written
    pub chunk_len: u64,
    /// Bytes still expected after this chunk
    pub bytes_remaining: u64,
    /// Size the transfer expects in total (0 if unknown)
    pub total_bytes: u64,
}

/// Callback type for chunk notifications, passed explicitly per transfer
pub type ChunkCallback = Arc<dyn Fn(ChunkProgress) + Send + Sync>;

/// Download capability of a stream
///
/// Implementations write the stream to `target_dir/filename`, invoke
/// `on_chunk` zero or more times, and return the final path.
#[async_trait]
pub trait StreamTransfer: Send + Sync {
    async fn download(
        &self,
        stream: &StreamDescriptor,
        target_dir: &Path,
        filename: &str,
        on_chunk: ChunkCallback,
    ) -> Result<PathBuf>;
}

/// A selectable media stream
#[derive(Clone)]
pub struct StreamDescriptor {
    /// Provider-assigned id (unique within a source)
    pub id: String,

    pub kind: StreamKind,

    pub container: Container,

    /// Resolution label for video streams (e.g. "720p")
    pub resolution: Option<String>,

    /// Audio bitrate in kbps, if known
    pub abr_kbps: Option<u32>,

    /// Exact size in bytes, if the provider knows it
    pub filesize: Option<u64>,

    /// Approximate size in bytes
    pub filesize_approx: u64,

    transfer: Arc<dyn StreamTransfer>,
}

impl StreamDescriptor {
    pub fn new(
        id: impl Into<String>,
        kind: StreamKind,
        container: Container,
        transfer: Arc<dyn StreamTransfer>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            container,
            resolution: None,
            abr_kbps: None,
            filesize: None,
            filesize_approx: 0,
            transfer,
        }
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn with_abr(mut self, abr_kbps: u32) -> Self {
        self.abr_kbps = Some(abr_kbps);
        self
    }

    pub fn with_size(mut self, filesize: Option<u64>, filesize_approx: u64) -> Self {
        self.filesize = filesize;
        self.filesize_approx = filesize_approx;
        self
    }

    pub fn is_progressive(&self) -> bool {
        self.kind == StreamKind::Progressive
    }

    pub fn is_audio_only(&self) -> bool {
        self.kind == StreamKind::AudioOnly
    }

    pub fn has_video(&self) -> bool {
        matches!(self.kind, StreamKind::Progressive | StreamKind::VideoOnly)
    }

    /// Expected byte count: exact size when known, else the approximation
    pub fn total_bytes(&self) -> u64 {
        self.filesize.filter(|size| *size > 0).unwrap_or(self.filesize_approx)
    }

    /// Vertical resolution parsed from the label ("1080p" -> 1080)
    pub fn height(&self) -> Option<u32> {
        static RESOLUTION: OnceLock<Regex> = OnceLock::new();
        let re = RESOLUTION.get_or_init(|| Regex::new(r"^(\d+)p").expect("valid regex"));
        let label = self.resolution.as_deref()?;
        re.captures(label)?.get(1)?.as_str().parse().ok()
    }

    /// Human label: resolution for video streams, "audio" otherwise
    pub fn label(&self) -> String {
        match (&self.resolution, self.kind) {
            (_, StreamKind::AudioOnly) => "audio".to_string(),
            (Some(res), _) => res.clone(),
            (None, _) => "video".to_string(),
        }
    }

    /// Extension for a file holding this stream on its own
    pub fn file_extension(&self) -> &str {
        if self.is_audio_only() {
            self.container.audio_extension()
        } else {
            self.container.video_extension()
        }
    }

    /// Run the download capability
    pub async fn download(
        &self,
        target_dir: &Path,
        filename: &str,
        on_chunk: ChunkCallback,
    ) -> Result<PathBuf> {
        self.transfer.download(self, target_dir, filename, on_chunk).await
    }
}

impl fmt::Debug for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("container", &self.container)
            .field("resolution", &self.resolution)
            .field("abr_kbps", &self.abr_kbps)
            .field("filesize", &self.filesize)
            .field("filesize_approx", &self.filesize_approx)
            .finish_non_exhaustive()
    }
}

/// Metadata about the source a set of streams belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Provider id of the source (dedup key in the library)
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub publish_date: Option<NaiveDate>,

    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Result of stream resolution
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub source: SourceInfo,
    pub streams: Vec<Arc<StreamDescriptor>>,
}

/// Stream Resolution Provider
///
/// Errors here are surfaced to the caller before any job exists.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, source_id: &str) -> Result<ResolvedMedia>;
}

/// A quality choice presented to the user
#[derive(Debug, Clone)]
pub struct QualityOption {
    /// e.g. `"720p  •  12.3 MB"` or `"Audio  •  3.1 MB"`
    pub label: String,
    pub stream: Arc<StreamDescriptor>,
}

/// Pick the audio stream to pair with a video in `preferred` container
pub fn select_audio(
    streams: &[Arc<StreamDescriptor>],
    preferred: Option<&Container>,
) -> Option<Arc<StreamDescriptor>> {
    preferred
        .and_then(|container| best_audio_where(streams, |s| &s.container == container))
        .or_else(|| best_audio_where(streams, |_| true))
}

fn best_audio_where<F>(streams: &[Arc<StreamDescriptor>], accept: F) -> Option<Arc<StreamDescriptor>>
where
    F: Fn(&StreamDescriptor) -> bool,
{
    streams
        .iter()
        .filter(|s| s.is_audio_only() && accept(s))
        .max_by_key(|s| s.abr_kbps.unwrap_or(0))
        .cloned()
}

/// Build the quality picker options for a resolved source
pub fn quality_options(media: &ResolvedMedia) -> Result<Vec<QualityOption>> {
    let mut by_resolution: HashMap<u32, Arc<StreamDescriptor>> = HashMap::new();

    for stream in media.streams.iter().filter(|s| s.has_video()) {
        let Some(height) = stream.height() else {
            continue;
        };
        let replace = match by_resolution.get(&height) {
            Some(existing) => stream.is_progressive() && !existing.is_progressive(),
            None => true,
        };
        if replace {
            by_resolution.insert(height, Arc::clone(stream));
        }
    }

    let best_audio = select_audio(&media.streams, Some(&Container::Mp4));

    if by_resolution.is_empty() && best_audio.is_none() {
        return Err(PicaError::NoStreams);
    }

    let mut heights: Vec<u32> = by_resolution.keys().copied().collect();
    heights.sort_unstable_by(|a, b| b.cmp(a));

    let mut options: Vec<QualityOption> = heights
        .into_iter()
        .filter_map(|height| by_resolution.remove(&height))
        .map(|stream| QualityOption {
            label: format!("{}  •  {:.1} MB", stream.label(), size_mib(&stream)),
            stream,
        })
        .collect();

    if let Some(audio) = best_audio {
        options.push(QualityOption {
            label: format!("Audio  •  {:.1} MB", size_mib(&audio)),
            stream: audio,
        });
    }

    Ok(options)
}

fn size_mib(stream: &StreamDescriptor) -> f64 {
    stream.filesize_approx as f64 / (1024.0 * 1024.0)
}
