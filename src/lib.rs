//! Pica media download core
//!
//! Downloads one resolved media source (a single progressive or audio
//! stream, or a video/audio pair merged with ffmpeg) on a background task,
//! while an observer polls smoothed progress on a fixed cadence.
//!
//! - [`media`]: stream descriptors, resolution, merge tool
//! - [`download`]: phases, progress estimation, runner, observer, completion
//! - [`storage`]: download history and preferences
//! - [`file`]: output naming, application paths, cleanup

pub mod download;
pub mod error;
pub mod file;
pub mod format;
pub mod media;
pub mod storage;

pub use download::{
    DownloadConfig, DownloadJob, DownloadPlan, DownloadRunner, JobControl, JobEvent, JobHandle,
    JobSummary, ObserverBridge, Phase, ProgressEstimator, ProgressView,
};
pub use error::{PicaError, Result};
pub use media::{ResolvedMedia, SourceInfo, StreamDescriptor, StreamKind};
pub use storage::{JsonLibrary, LibraryStore, PreferenceStore};
