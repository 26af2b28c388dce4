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


//! JSON manifest stream resolver
//!
//! Resolves a source from a manifest file listing the source metadata and
//! its streams with direct HTTP URLs:
//!
//! ```json
//! {
//!   "source": { "id": "dQw4w9WgXcQ", "title": "Clip", "author": "Someone",
//!               "publish_date": "2024-05-01" },
//!   "streams": [
//!     { "id": "137", "kind": "video_only", "container": "mp4",
//!       "resolution": "1080p", "filesize": 52428800, "url": "https://..." },
//!     { "id": "140", "kind": "audio_only", "container": "m4a",
//!       "abr_kbps": 128, "filesize_approx": 3145728, "url": "https://..." }
//!   ]
//! }
//! ```

use crate::download::stream::HttpTransfer;
use crate::error::{PicaError, Result};
use crate::media::streams::{
    Container, ResolvedMedia, SourceInfo, StreamDescriptor, StreamKind, StreamResolver,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Manifest {
    source: SourceInfo,
    streams: Vec<ManifestStream>,
}

#[derive(Debug, Deserialize)]
struct ManifestStream {
    id: String,
    kind: StreamKind,
    container: String,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    abr_kbps: Option<u32>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    filesize_approx: Option<u64>,
    url: String,
}

/// Resolves `source_id` as a path to a JSON manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestResolver {
    client: Client,
}

impl ManifestResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Parse manifest text into resolved media
    pub fn parse(&self, source_id: &str, json: &str) -> Result<ResolvedMedia> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| PicaError::resolution_failed(source_id, format!("invalid manifest: {}", e)))?;

        if manifest.source.id.trim().is_empty() {
            return Err(PicaError::InvalidManifest("source id is empty".to_string()));
        }

        let streams = manifest
            .streams
            .into_iter()
            .map(|entry| self.build_stream(entry))
            .collect::<Result<Vec<_>>>()?;

        if streams.is_empty() {
            return Err(PicaError::NoStreams);
        }

        Ok(ResolvedMedia {
            source: manifest.source,
            streams,
        })
    }

    fn build_stream(&self, entry: ManifestStream) -> Result<Arc<StreamDescriptor>> {
        let transfer = HttpTransfer::new(self.client.clone(), &entry.url).map_err(|e| {
            PicaError::InvalidManifest(format!("stream {}: {}", entry.id, e))
        })?;

        let approx = entry.filesize_approx.or(entry.filesize).unwrap_or(0);
        let mut stream = StreamDescriptor::new(
            entry.id,
            entry.kind,
            Container::parse(&entry.container),
            Arc::new(transfer),
        )
        .with_size(entry.filesize, approx);

        if let Some(resolution) = entry.resolution {
            stream = stream.with_resolution(resolution);
        }
        if let Some(abr) = entry.abr_kbps {
            stream = stream.with_abr(abr);
        }

        Ok(Arc::new(stream))
    }
}

#[async_trait]
impl StreamResolver for ManifestResolver {
    async fn resolve(&self, source_id: &str) -> Result<ResolvedMedia> {
        let json = tokio::fs::read_to_string(Path::new(source_id))
            .await
            .map_err(|e| PicaError::resolution_failed(source_id, e.to_string()))?;
        self.parse(source_id, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "source": { "id": "vid1", "title": "A: Clip?", "author": "Me", "publish_date": "2024-05-01" },
        "streams": [
            { "id": "137", "kind": "video_only", "container": "video/mp4",
              "resolution": "1080p", "filesize": 1000, "url": "https://example.com/v" },
            { "id": "140", "kind": "audio_only", "container": "m4a",
              "abr_kbps": 128, "filesize_approx": 300, "url": "https://example.com/a" }
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let media = ManifestResolver::default().parse("m.json", MANIFEST).unwrap();

        assert_eq!(media.source.id, "vid1");
        assert_eq!(media.source.publish_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(media.streams.len(), 2);

        let video = &media.streams[0];
        assert_eq!(video.kind, StreamKind::VideoOnly);
        assert_eq!(video.container, Container::Mp4);
        assert_eq!(video.total_bytes(), 1000);
        assert_eq!(video.filesize_approx, 1000);

        let audio = &media.streams[1];
        assert_eq!(audio.abr_kbps, Some(128));
        assert_eq!(audio.total_bytes(), 300);
    }

    #[test]
    fn test_parse_rejects_bad_url() {
        let json = MANIFEST.replace("https://example.com/a", "file:///etc/passwd");
        let err = ManifestResolver::default().parse("m.json", &json).unwrap_err();
        assert!(matches!(err, PicaError::InvalidManifest(_)));
    }

    #[test]
    fn test_parse_rejects_empty_streams() {
        let json = r#"{ "source": { "id": "x", "title": "t" }, "streams": [] }"#;
        let err = ManifestResolver::default().parse("m.json", json).unwrap_err();
        assert!(matches!(err, PicaError::NoStreams));
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nope.json");
        let err = ManifestResolver::default()
            .resolve(path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PicaError::ResolutionFailed { .. }));
    }
}
