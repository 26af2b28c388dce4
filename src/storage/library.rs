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


//! Download history
//!
//! Every completed download is recorded once per source id in
//! `library.json`:
//!
//! ```json
//! [{ "id": "abc", "title": "Clip", "author": "Someone",
//!    "publish_date": "2024-05-01", "downloaded_at": "2025-01-01T10:00:00+00:00",
//!    "thumbnail": "/home/me/.pica/thumbs/abc.jpg", "path": "/home/me/Downloads/Pica/Clip.mp4" }]
//! ```
//!
//! An unreadable or corrupt file loads as an empty library. Writes go to a
//! temporary file that is renamed over the original.

use crate::error::{PicaError, Result};
use crate::file::cleanup::remove_if_exists_sync;
use crate::media::streams::SourceInfo;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const UNKNOWN: &str = "Unknown";

/// Library side effect of a successful download
pub trait LibraryStore: Send + Sync {
    /// Record a download. Returns false if the source id was already present
    fn add(&self, source: &SourceInfo, path: &Path) -> Result<bool>;

    fn count(&self) -> usize;
}

/// One history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    pub title: String,
    pub author: String,
    /// `YYYY-MM-DD`, or empty when unknown
    #[serde(default)]
    pub publish_date: String,
    /// RFC 3339 timestamp
    pub downloaded_at: String,
    /// Cached thumbnail path, empty when none
    #[serde(default)]
    pub thumbnail: String,
    pub path: String,
}

impl LibraryEntry {
    pub fn from_source(source: &SourceInfo, path: &Path, thumbnail: Option<&Path>) -> Self {
        let non_empty = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        };

        Self {
            id: source.id.clone(),
            title: non_empty(Some(source.title.as_str())),
            author: non_empty(source.author.as_deref()),
            publish_date: source
                .publish_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            downloaded_at: Utc::now().to_rfc3339(),
            thumbnail: thumbnail
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.to_string_lossy().to_string(),
        }
    }
}

/// JSON file backed [`LibraryStore`]
#[derive(Debug)]
pub struct JsonLibrary {
    file: PathBuf,
    thumbs_dir: Option<PathBuf>,
    entries: Mutex<Vec<LibraryEntry>>,
}

impl JsonLibrary {
    /// Open the library at `file`, loading existing entries
    pub fn open(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let entries = Self::load(&file);
        Self {
            file,
            thumbs_dir: None,
            entries: Mutex::new(entries),
        }
    }

    /// Look up cached thumbnails (`<id>.jpg`) in `dir` when adding entries
    pub fn with_thumbs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.thumbs_dir = Some(dir.into());
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    fn load(file: &Path) -> Vec<LibraryEntry> {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "failed to read library");
                return Vec::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %file.display(), error = %e, "corrupt library file, starting empty");
            Vec::new()
        })
    }

    fn save(&self, entries: &[LibraryEntry]) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PicaError::LibraryError(format!("{}: {}", parent.display(), e)))?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.file.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.file))
            .map_err(|e| PicaError::LibraryError(format!("{}: {}", self.file.display(), e)))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<LibraryEntry>>> {
        self.entries
            .lock()
            .map_err(|_| PicaError::internal("library lock poisoned"))
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Result<Vec<LibraryEntry>> {
        Ok(self.lock()?.clone())
    }

    pub fn get(&self, id: &str) -> Result<Option<LibraryEntry>> {
        Ok(self.lock()?.iter().find(|e| e.id == id).cloned())
    }

    /// Remove the entry with `id` and its cached thumbnail
    ///
    /// Returns false if no such entry exists.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.lock()?;
        let Some(index) = entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };

        let removed = entries.remove(index);
        self.save(&entries)?;

        if !removed.thumbnail.is_empty() {
            remove_if_exists_sync(Path::new(&removed.thumbnail));
        }
        tracing::info!(id, "removed library entry");
        Ok(true)
    }

    fn thumbnail_for(&self, id: &str) -> Option<PathBuf> {
        let path = self.thumbs_dir.as_ref()?.join(format!("{}.jpg", id));
        path.exists().then_some(path)
    }
}

impl LibraryStore for JsonLibrary {
    fn add(&self, source: &SourceInfo, path: &Path) -> Result<bool> {
        let mut entries = self.lock()?;
        if entries.iter().any(|e| e.id == source.id) {
            tracing::debug!(id = %source.id, "already in library");
            return Ok(false);
        }

        let thumbnail = self.thumbnail_for(&source.id);
        entries.push(LibraryEntry::from_source(source, path, thumbnail.as_deref()));
        if let Err(e) = self.save(&entries) {
            entries.pop();
            return Err(e);
        }

        tracing::info!(id = %source.id, path = %path.display(), "added to library");
        Ok(true)
    }

    fn count(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn source(id: &str) -> SourceInfo {
        SourceInfo {
            id: id.to_string(),
            title: "Clip".to_string(),
            author: None,
            publish_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            thumbnail_url: None,
        }
    }

    #[test]
    fn test_add_dedups_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("library.json");

        let library = JsonLibrary::open(&file);
        assert_eq!(library.count(), 0);
        assert!(library.add(&source("a"), Path::new("/out/Clip.mp4")).unwrap());
        assert!(!library.add(&source("a"), Path::new("/out/Clip (1).mp4")).unwrap());
        assert!(library.add(&source("b"), Path::new("/out/Other.mp4")).unwrap());
        assert_eq!(library.count(), 2);

        let reopened = JsonLibrary::open(&file);
        assert_eq!(reopened.count(), 2);
        let entry = reopened.get("a").unwrap().unwrap();
        assert_eq!(entry.author, "Unknown");
        assert_eq!(entry.publish_date, "2024-05-01");
        assert_eq!(entry.path, "/out/Clip.mp4");
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.downloaded_at).is_ok());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("library.json");
        std::fs::write(&file, "{not json").unwrap();

        let library = JsonLibrary::open(&file);
        assert_eq!(library.count(), 0);
        assert!(library.add(&source("a"), Path::new("/out/a.mp4")).unwrap());
        assert_eq!(JsonLibrary::open(&file).count(), 1);
    }

    #[test]
    fn test_remove_deletes_thumbnail() {
        let temp_dir = TempDir::new().unwrap();
        let thumbs = temp_dir.path().join("thumbs");
        std::fs::create_dir_all(&thumbs).unwrap();
        let thumb = thumbs.join("a.jpg");
        std::fs::write(&thumb, b"jpg").unwrap();

        let library = JsonLibrary::open(temp_dir.path().join("library.json")).with_thumbs_dir(&thumbs);
        library.add(&source("a"), Path::new("/out/a.mp4")).unwrap();
        assert_eq!(
            library.get("a").unwrap().unwrap().thumbnail,
            thumb.to_string_lossy()
        );

        assert!(library.remove("a").unwrap());
        assert!(!thumb.exists());
        assert!(!library.remove("a").unwrap());
        assert_eq!(library.count(), 0);
    }
}
