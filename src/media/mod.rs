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


//! Media collaborators
//!
//! Stream descriptors and resolution, the JSON manifest resolver, and the
//! ffmpeg merge tool.

pub mod manifest;
pub mod merge;
pub mod streams;

pub use manifest::ManifestResolver;
pub use merge::{FfmpegMerger, MergeRequest, MergeTool};
pub use streams::{
    quality_options, select_audio, ChunkCallback, ChunkProgress, Container, QualityOption,
    ResolvedMedia, SourceInfo, StreamDescriptor, StreamKind, StreamResolver, StreamTransfer,
};
