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


//! Download jobs
//!
//! A [`DownloadJob`] is created when the user commits to a quality choice.
//! It carries the chosen plan, the target directory, the unique output path
//! computed at job start, and the shared [`JobControl`] outcome cell.

use crate::error::{PicaError, Result};
use crate::file::paths::{output_filename, unique_path};
use crate::media::streams::{select_audio, ResolvedMedia, SourceInfo, StreamDescriptor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const RUNNING: u8 = 0;
const DONE: u8 = 1;
const CANCELLED: u8 = 2;
const FAILED: u8 = 3;

/// Settled outcome of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Running,
    Done,
    Cancelled,
    Failed,
}

/// Cancellation flag and outcome cell shared between caller and runner
///
/// The first of `cancel`, `try_complete` and `try_fail` to run settles the
/// outcome. A cancel that loses to a completed job is a no-op.
#[derive(Debug, Default)]
pub struct JobControl {
    state: AtomicU8,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; returns true if this call settled it
    pub fn cancel(&self) -> bool {
        self.settle(CANCELLED)
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Claim success; false if the job was already cancelled or failed
    pub fn try_complete(&self) -> bool {
        self.settle(DONE)
    }

    pub fn try_fail(&self) -> bool {
        self.settle(FAILED)
    }

    pub fn outcome(&self) -> JobOutcome {
        match self.state.load(Ordering::Acquire) {
            DONE => JobOutcome::Done,
            CANCELLED => JobOutcome::Cancelled,
            FAILED => JobOutcome::Failed,
            _ => JobOutcome::Running,
        }
    }

    /// Error out at a checkpoint if cancellation was requested
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PicaError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn settle(&self, outcome: u8) -> bool {
        self.state
            .compare_exchange(RUNNING, outcome, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Download strategy for a chosen stream
#[derive(Debug, Clone)]
pub enum DownloadPlan {
    /// Progressive or audio-only: one stream written straight to the output
    Direct { stream: Arc<StreamDescriptor> },
    /// Separate video and audio streams merged afterwards
    Adaptive {
        video: Arc<StreamDescriptor>,
        audio: Arc<StreamDescriptor>,
    },
}

impl DownloadPlan {
    /// Pick the strategy for `chosen` among the resolved streams
    pub fn select(chosen: Arc<StreamDescriptor>, media: &ResolvedMedia) -> Result<Self> {
        if chosen.is_progressive() || chosen.is_audio_only() {
            return Ok(DownloadPlan::Direct { stream: chosen });
        }

        let audio = select_audio(&media.streams, Some(&chosen.container))
            .ok_or_else(|| PicaError::NoAudioStream(chosen.id.clone()))?;

        Ok(DownloadPlan::Adaptive {
            video: chosen,
            audio,
        })
    }

    /// Extension of the final output file
    pub fn output_extension(&self) -> &str {
        match self {
            DownloadPlan::Direct { stream } => stream.file_extension(),
            DownloadPlan::Adaptive { video, .. } => video.container.video_extension(),
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self, DownloadPlan::Adaptive { .. })
    }
}

/// One committed download
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: String,
    pub source: SourceInfo,
    pub plan: DownloadPlan,
    pub target_dir: PathBuf,
    /// Unique final path, computed once at job start
    pub output_path: PathBuf,
    pub control: Arc<JobControl>,
}

impl DownloadJob {
    /// Create a job, reserving a collision-free output name in `target_dir`
    pub fn new(source: SourceInfo, plan: DownloadPlan, target_dir: impl AsRef<Path>) -> Result<Self> {
        let target_dir = target_dir.as_ref().to_path_buf();
        if !target_dir.is_dir() {
            return Err(PicaError::DownloadDirectoryUnavailable(
                target_dir.display().to_string(),
            ));
        }

        let filename = output_filename(&source.title, plan.output_extension());
        let output_path = unique_path(&target_dir, &filename);

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            plan,
            target_dir,
            output_path,
            control: Arc::new(JobControl::new()),
        })
    }

    /// Recompute the unique output name (done again before merging)
    pub fn refresh_output_path(&mut self) {
        let filename = output_filename(&self.source.title, self.plan.output_extension());
        self.output_path = unique_path(&self.target_dir, &filename);
    }

    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::streams::tests::stream;
    use crate::media::streams::{Container, StreamKind};
    use tempfile::TempDir;

    fn source(title: &str) -> SourceInfo {
        SourceInfo {
            id: "abc".to_string(),
            title: title.to_string(),
            author: None,
            publish_date: None,
            thumbnail_url: None,
        }
    }

    fn media(streams: Vec<StreamDescriptor>) -> ResolvedMedia {
        ResolvedMedia {
            source: source("Clip"),
            streams: streams.into_iter().map(Arc::new).collect(),
        }
    }

    #[test]
    fn test_control_cancel_is_idempotent() {
        let control = JobControl::new();
        assert_eq!(control.outcome(), JobOutcome::Running);
        assert!(control.checkpoint().is_ok());

        assert!(control.cancel());
        assert!(!control.cancel());
        assert!(control.is_cancelled());
        assert!(!control.try_complete());
        assert!(control.checkpoint().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_control_cancel_after_done_is_noop() {
        let control = JobControl::new();
        assert!(control.try_complete());
        assert!(!control.cancel());
        assert!(!control.is_cancelled());
        assert_eq!(control.outcome(), JobOutcome::Done);
    }

    #[test]
    fn test_plan_selection() {
        let resolved = media(vec![
            stream("prog", StreamKind::Progressive, Container::Mp4),
            stream("vid", StreamKind::VideoOnly, Container::Webm),
            stream("a_mp4", StreamKind::AudioOnly, Container::Mp4).with_abr(128),
            stream("a_webm", StreamKind::AudioOnly, Container::Webm).with_abr(64),
        ]);

        let plan = DownloadPlan::select(Arc::clone(&resolved.streams[0]), &resolved).unwrap();
        assert!(!plan.is_adaptive());
        assert_eq!(plan.output_extension(), "mp4");

        let plan = DownloadPlan::select(Arc::clone(&resolved.streams[1]), &resolved).unwrap();
        match plan {
            DownloadPlan::Adaptive { video, audio } => {
                assert_eq!(video.id, "vid");
                assert_eq!(audio.id, "a_webm");
            }
            other => panic!("expected adaptive plan, got {:?}", other),
        }

        let plan = DownloadPlan::select(Arc::clone(&resolved.streams[2]), &resolved).unwrap();
        assert_eq!(plan.output_extension(), "m4a");
    }

    #[test]
    fn test_plan_requires_audio_for_video_only() {
        let resolved = media(vec![stream("vid", StreamKind::VideoOnly, Container::Mp4)]);
        let err = DownloadPlan::select(Arc::clone(&resolved.streams[0]), &resolved).unwrap_err();
        assert!(matches!(err, PicaError::NoAudioStream(id) if id == "vid"));
    }

    #[test]
    fn test_job_output_path_is_unique() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("Title.mp4"), b"x").unwrap();

        let plan = DownloadPlan::Direct {
            stream: Arc::new(stream("p", StreamKind::Progressive, Container::Mp4)),
        };
        let mut job = DownloadJob::new(source("Title"), plan, temp_dir.path()).unwrap();
        assert_eq!(job.output_path, temp_dir.path().join("Title (1).mp4"));

        std::fs::write(&job.output_path, b"x").unwrap();
        job.refresh_output_path();
        assert_eq!(job.output_path, temp_dir.path().join("Title (2).mp4"));
    }

    #[test]
    fn test_job_requires_existing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let plan = DownloadPlan::Direct {
            stream: Arc::new(stream("p", StreamKind::Progressive, Container::Mp4)),
        };
        let err = DownloadJob::new(source("T"), plan, temp_dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, PicaError::DownloadDirectoryUnavailable(_)));
    }
}
