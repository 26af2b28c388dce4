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


//! Persistent preferences
//!
//! Stores the last used download directory in `settings.json`:
//! `{ "last_download_dir": "/home/me/Videos" }`. A missing, unreadable or
//! non-directory value falls back to `<Downloads>/Pica`.

use crate::error::{PicaError, Result};
use crate::file::paths::default_download_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_download_dir: Option<PathBuf>,
}

/// Read/write access to the saved download directory
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    file: PathBuf,
    fallback: PathBuf,
}

impl PreferenceStore {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            fallback: default_download_dir(),
        }
    }

    /// Override the fallback directory (tests)
    pub fn with_fallback(mut self, fallback: impl Into<PathBuf>) -> Self {
        self.fallback = fallback.into();
        self
    }

    fn load(&self) -> Settings {
        std::fs::read_to_string(&self.file)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Saved directory if it still exists, else the default (created on demand)
    pub fn download_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.load().last_download_dir {
            if dir.is_dir() {
                return Ok(dir);
            }
            tracing::debug!(dir = %dir.display(), "saved download dir is gone, using default");
        }

        std::fs::create_dir_all(&self.fallback).map_err(|e| {
            PicaError::DownloadDirectoryUnavailable(format!("{}: {}", self.fallback.display(), e))
        })?;
        Ok(self.fallback.clone())
    }

    /// Remember `dir` as the last used download directory
    pub fn set_download_dir(&self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(PicaError::InvalidPath(dir.display().to_string()));
        }

        let mut settings = self.load();
        settings.last_download_dir = Some(dir.to_path_buf());

        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.file, serde_json::to_string_pretty(&settings)?).map_err(|e| {
            PicaError::ConfigurationError(format!("{}: {}", self.file.display(), e))
        })
    }
}
