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


//! Path generation and application directories
//!
//! # Output naming
//! - Titles are made filesystem-safe by stripping `<>:"/\|?*` and trimming
//! - Collisions get a ` (n)` suffix before the extension, counting up from 1
//! - The uniqueness check is a plain existence probe, not an atomic create
//!
//! # Application directories
//! - `~/.pica/library.json` - download history
//! - `~/.pica/settings.json` - last used download directory
//! - `~/.pica/thumbs/` - thumbnail cache referenced by library entries

use crate::error::{PicaError, Result};
use std::path::{Path, PathBuf};

/// Characters that are not allowed in file names on at least one platform
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Name of the application data directory under the user's home
const APP_DIR_NAME: &str = ".pica";

/// Subdirectory of the user's download area used by default
const DEFAULT_DOWNLOAD_SUBDIR: &str = "Pica";

/// Strip filesystem-invalid characters from a title and trim whitespace
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Return `dir/filename`, or the first free `dir/<stem> (n).<ext>` if taken
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(filename);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let extension = as_path.extension().and_then(|s| s.to_str());

    let mut counter = 1u32;
    loop {
        let new_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, counter, ext),
            None => format!("{} ({})", stem, counter),
        };

        let new_path = dir.join(new_name);
        if !new_path.exists() {
            return new_path;
        }
        counter += 1;
    }
}

/// Build the output file name for a title and extension
pub fn output_filename(title: &str, extension: &str) -> String {
    let safe = safe_filename(title);
    let stem = if safe.is_empty() { "video".to_string() } else { safe };
    format!("{}.{}", stem, extension)
}

/// Default download directory: `<Downloads>/Pica`
///
/// Falls back to `~/Downloads/Pica` when the platform has no download dir.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
        .join(DEFAULT_DOWNLOAD_SUBDIR)
}

/// Locations of the application's persistent files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    /// Use `~/.pica` as the data directory
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            PicaError::ConfigurationError("Could not determine home directory".to_string())
        })?;
        Ok(Self::with_data_dir(home.join(APP_DIR_NAME)))
    }

    /// Use an explicit data directory (tests, portable installs)
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn library_file(&self) -> PathBuf {
        self.data_dir.join("library.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn thumbs_dir(&self) -> PathBuf {
        self.data_dir.join("thumbs")
    }

    /// Create the data and thumbnail directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.thumbs_dir()).map_err(|e| {
            PicaError::FileIoError(format!(
                "Failed to create directory {}: {}",
                self.thumbs_dir().display(),
                e
            ))
        })
    }
}
