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


//! Best-effort file removal
//!
//! Cleanup after cancellation or failure must never surface an error to the
//! caller. These helpers log and swallow every failure.

use std::path::Path;
use tokio::fs;

/// Remove a file if it exists. Returns whether a file was removed.
pub async fn remove_if_exists(path: &Path) -> bool {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return false;
    }

    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed file");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
            false
        }
    }
}

/// Remove every path in `paths`, ignoring failures
pub async fn remove_all<P: AsRef<Path>>(paths: &[P]) -> usize {
    let mut removed = 0;
    for path in paths {
        if remove_if_exists(path.as_ref()).await {
            removed += 1;
        }
    }
    removed
}

/// Synchronous variant for non-async callers (library maintenance)
pub fn remove_if_exists_sync(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
            false
        }
    }
}
