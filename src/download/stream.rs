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


//! HTTP stream download capability
//!
//! # Transfer loop
//! - Single GET request, no range/resume support
//! - Response body streamed into a buffered file writer
//! - Every chunk is reported as `(stream id, chunk length, bytes remaining)`
//! - Expected size comes from Content-Length, falling back to the
//!   descriptor's size when the server doesn't send one
//! - A short body is an error, never a silent success

use crate::error::{PicaError, Result};
use crate::media::streams::{ChunkCallback, ChunkProgress, StreamDescriptor, StreamTransfer};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

const DOWNLOAD_BUFF_SZ: usize = 64 * 1024; // 64KB write buffer

/// Stream download capability backed by a plain HTTP(S) URL
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: Client,
    url: Url,
}

impl HttpTransfer {
    /// Create a transfer for `url` using a shared client
    pub fn new(client: Client, url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "http" | "https" => Ok(Self { client, url }),
            other => Err(PicaError::InvalidDownloadUrl(format!(
                "unsupported scheme '{}' in {}",
                other, url
            ))),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request(&self) -> Result<reqwest::Response> {
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PicaError::network_error(
                format!("Unexpected status code {} from {}", status, self.url),
                Some(status.as_u16()),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl StreamTransfer for HttpTransfer {
    async fn download(
        &self,
        stream: &StreamDescriptor,
        target_dir: &Path,
        filename: &str,
        on_chunk: ChunkCallback,
    ) -> Result<PathBuf> {
        if !target_dir.is_dir() {
            return Err(PicaError::DownloadDirectoryUnavailable(
                target_dir.display().to_string(),
            ));
        }

        let response = self.request().await?;
        let announced = response.content_length();
        let expected = announced.unwrap_or_else(|| stream.total_bytes());

        let output_path = target_dir.join(filename);
        let file = File::create(&output_path).await.map_err(|e| {
            PicaError::FileIoError(format!("create: {} - {}", output_path.display(), e))
        })?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFF_SZ, file);

        tracing::debug!(
            stream = %stream.id,
            url = %self.url,
            expected,
            "starting transfer"
        );

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;

            let chunk_len = chunk.len() as u64;
            written += chunk_len;
            on_chunk(ChunkProgress {
                stream_id: stream.id.clone(),
                chunk_len,
                bytes_remaining: expected.saturating_sub(written),
                total_bytes: expected,
            });
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        if let Some(expected) = announced {
            if written < expected {
                return Err(PicaError::IncompleteDownload {
                    expected,
                    received: written,
                });
            }
        }

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::streams::{Container, StreamKind};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[test]
    fn test_rejects_non_http_urls() {
        let err = HttpTransfer::new(Client::new(), "ftp://example.com/a.mp4").unwrap_err();
        assert!(matches!(err, PicaError::InvalidDownloadUrl(_)));

        let err = HttpTransfer::new(Client::new(), "not a url").unwrap_err();
        assert!(matches!(err, PicaError::InvalidDownloadUrl(_)));
    }

    #[tokio::test]
    async fn test_download_reports_chunks() {
        let body = vec![7u8; 4096];
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/video.mp4")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let transfer =
            Arc::new(HttpTransfer::new(Client::new(), &format!("{}/video.mp4", server.url())).unwrap());
        let stream = StreamDescriptor::new("18", StreamKind::Progressive, Container::Mp4, transfer)
            .with_size(None, 4096);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ChunkCallback = Arc::new(move |progress: ChunkProgress| sink.lock().unwrap().push(progress));

        let temp_dir = TempDir::new().unwrap();
        let path = stream
            .download(temp_dir.path(), "clip.mp4", callback)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(path, temp_dir.path().join("clip.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), body);

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert_eq!(seen.iter().map(|p| p.chunk_len).sum::<u64>(), 4096);
        assert_eq!(seen.last().unwrap().bytes_remaining, 0);
        assert!(seen.iter().all(|p| p.stream_id == "18"));
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.mp4")
            .with_status(404)
            .create_async()
            .await;

        let transfer = Arc::new(
            HttpTransfer::new(Client::new(), &format!("{}/missing.mp4", server.url())).unwrap(),
        );
        let stream = StreamDescriptor::new("18", StreamKind::Progressive, Container::Mp4, transfer);

        let temp_dir = TempDir::new().unwrap();
        let err = stream
            .download(temp_dir.path(), "clip.mp4", Arc::new(|_: ChunkProgress| {}))
            .await
            .unwrap_err();

        assert!(matches!(err, PicaError::NetworkError { status_code: Some(404), .. }));
        assert!(!temp_dir.path().join("clip.mp4").exists());
    }
}
