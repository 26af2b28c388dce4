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


//! Completion and cancellation
//!
//! - `on_success` settles the job as done, unless cancellation got there
//!   first, and records it in the library. Library failures are logged and
//!   never affect the download's reported success.
//! - `on_cancel` is idempotent and may run while a phase is still in flight.
//! - `on_abort` is the shared exit for cancellation and hard failure: it
//!   removes the final output. On cancellation it also removes the adaptive
//!   temporary inputs; on failure those are kept for inspection.

use crate::download::job::{DownloadJob, JobOutcome};
use crate::download::phase::{lock_phases, Phase, PhaseController};
use crate::error::PicaError;
use crate::file::cleanup::{remove_all, remove_if_exists};
use crate::storage::library::LibraryStore;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Final report of a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub job_id: String,
    /// Terminal phase (`Done`, `Cancelled` or `Failed`)
    pub phase: Phase,
    /// Output file, present only on success
    pub output_path: Option<PathBuf>,
    /// Cumulative time of all phases
    pub elapsed: Duration,
    /// Whether a new library entry was written
    pub added_to_library: bool,
}

impl JobSummary {
    pub fn is_success(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn outcome(&self) -> JobOutcome {
        match self.phase {
            Phase::Done => JobOutcome::Done,
            Phase::Cancelled => JobOutcome::Cancelled,
            Phase::Failed { .. } => JobOutcome::Failed,
            _ => JobOutcome::Running,
        }
    }
}

/// Finalizes jobs on success, cancellation or failure
#[derive(Clone)]
pub struct CompletionHandler {
    library: Arc<dyn LibraryStore>,
}

impl CompletionHandler {
    pub fn new(library: Arc<dyn LibraryStore>) -> Self {
        Self { library }
    }

    /// Settle a finished job as done
    ///
    /// Returns `None` if the job was cancelled before it could be settled; the
    /// caller must then take the cancellation path.
    pub fn on_success(
        &self,
        job: &DownloadJob,
        output: &Path,
        phases: &Mutex<PhaseController>,
    ) -> Option<JobSummary> {
        if !job.control.try_complete() {
            tracing::debug!(job = %job.id, "cancellation won over completion");
            return None;
        }

        let elapsed = {
            let mut controller = lock_phases(phases);
            controller.complete();
            controller.total_elapsed()
        };

        let added_to_library = match self.library.add(&job.source, output) {
            Ok(added) => added,
            Err(e) => {
                tracing::warn!(job = %job.id, error = %e, "failed to record download in library");
                false
            }
        };

        tracing::info!(
            job = %job.id,
            path = %output.display(),
            elapsed_secs = elapsed.as_secs(),
            "download completed"
        );

        Some(JobSummary {
            job_id: job.id.clone(),
            phase: Phase::Done,
            output_path: Some(output.to_path_buf()),
            elapsed,
            added_to_library,
        })
    }

    /// Request cancellation; safe to call repeatedly and concurrently
    pub fn on_cancel(&self, job: &DownloadJob) -> bool {
        let settled = job.control.cancel();
        if settled {
            tracing::info!(job = %job.id, "cancellation requested");
        }
        settled
    }

    /// Shared exit path for cancellation and failure
    pub async fn on_abort(
        &self,
        job: &DownloadJob,
        error: Option<&PicaError>,
        temp_inputs: &[PathBuf],
        phases: &Mutex<PhaseController>,
    ) -> JobSummary {
        let cancelled = match error {
            Some(e) if !e.is_cancelled() => !job.control.try_fail() && job.control.is_cancelled(),
            _ => {
                job.control.cancel();
                true
            }
        };

        remove_if_exists(&job.output_path).await;
        if cancelled {
            remove_all(temp_inputs).await;
        }

        let (phase, elapsed) = {
            let mut controller = lock_phases(phases);
            if cancelled {
                controller.cancel();
            } else {
                let reason = error.map(|e| e.to_string()).unwrap_or_default();
                controller.fail(reason);
            }
            (controller.current().clone(), controller.total_elapsed())
        };

        match (&phase, error) {
            (Phase::Failed { .. }, Some(e)) => {
                tracing::warn!(job = %job.id, error = %e, "download failed")
            }
            _ => tracing::info!(job = %job.id, "download cancelled"),
        }

        JobSummary {
            job_id: job.id.clone(),
            phase,
            output_path: None,
            elapsed,
            added_to_library: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::job::DownloadPlan;
    use crate::error::Result;
    use crate::media::streams::tests::stream;
    use crate::media::streams::{Container, SourceInfo, StreamKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingLibrary {
        adds: AtomicUsize,
        fail: bool,
    }

    impl LibraryStore for CountingLibrary {
        fn add(&self, _source: &SourceInfo, _path: &Path) -> Result<bool> {
            if self.fail {
                return Err(PicaError::LibraryError("disk full".into()));
            }
            self.adds.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        fn count(&self) -> usize {
            self.adds.load(Ordering::SeqCst)
        }
    }

    fn job(dir: &Path) -> DownloadJob {
        let source = SourceInfo {
            id: "abc".into(),
            title: "Clip".into(),
            author: None,
            publish_date: None,
            thumbnail_url: None,
        };
        let plan = DownloadPlan::Direct {
            stream: Arc::new(stream("p", StreamKind::Progressive, Container::Mp4)),
        };
        DownloadJob::new(source, plan, dir).unwrap()
    }

    #[test]
    fn test_success_records_library_once() {
        let temp_dir = TempDir::new().unwrap();
        let library = Arc::new(CountingLibrary::default());
        let handler = CompletionHandler::new(library.clone());
        let job = job(temp_dir.path());
        let phases = Mutex::new(PhaseController::new());

        let summary = handler.on_success(&job, &job.output_path, &phases).unwrap();
        assert!(summary.is_success());
        assert!(summary.added_to_library);
        assert_eq!(library.count(), 1);

        assert!(handler.on_success(&job, &job.output_path, &phases).is_none());
        assert_eq!(library.count(), 1);
        assert!(!handler.on_cancel(&job));
    }

    #[test]
    fn test_library_failure_does_not_fail_download() {
        let temp_dir = TempDir::new().unwrap();
        let handler = CompletionHandler::new(Arc::new(CountingLibrary {
            fail: true,
            ..Default::default()
        }));
        let job = job(temp_dir.path());
        let phases = Mutex::new(PhaseController::new());

        let summary = handler.on_success(&job, &job.output_path, &phases).unwrap();
        assert!(summary.is_success());
        assert!(!summary.added_to_library);
    }

    #[test]
    fn test_cancel_wins_over_success() {
        let temp_dir = TempDir::new().unwrap();
        let library = Arc::new(CountingLibrary::default());
        let handler = CompletionHandler::new(library.clone());
        let job = job(temp_dir.path());

        assert!(handler.on_cancel(&job));
        assert!(!handler.on_cancel(&job));
        let phases = Mutex::new(PhaseController::new());
        assert!(handler.on_success(&job, &job.output_path, &phases).is_none());
        assert_eq!(library.count(), 0);
        assert_eq!(lock_phases(&phases).current(), &Phase::Idle);
    }

    #[tokio::test]
    async fn test_abort_on_cancel_removes_output_and_temps() {
        let temp_dir = TempDir::new().unwrap();
        let handler = CompletionHandler::new(Arc::new(CountingLibrary::default()));
        let job = job(temp_dir.path());
        let temp = temp_dir.path().join("video_only.mp4");
        std::fs::write(&job.output_path, b"partial").unwrap();
        std::fs::write(&temp, b"video").unwrap();

        handler.on_cancel(&job);
        let phases = Mutex::new(PhaseController::new());
        let summary = handler
            .on_abort(&job, Some(&PicaError::Cancelled), &[temp.clone()], &phases)
            .await;

        assert_eq!(summary.phase, Phase::Cancelled);
        assert_eq!(summary.outcome(), JobOutcome::Cancelled);
        assert!(!job.output_path.exists());
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_abort_on_failure_keeps_temps() {
        let temp_dir = TempDir::new().unwrap();
        let handler = CompletionHandler::new(Arc::new(CountingLibrary::default()));
        let job = job(temp_dir.path());
        let temp = temp_dir.path().join("audio_only.m4a");
        std::fs::write(&job.output_path, b"partial").unwrap();
        std::fs::write(&temp, b"audio").unwrap();

        let phases = Mutex::new(PhaseController::new());
        let error = PicaError::MergeFailed("exit 1".into());
        let summary = handler.on_abort(&job, Some(&error), &[temp.clone()], &phases).await;

        assert!(matches!(summary.phase, Phase::Failed { ref reason } if reason.contains("exit 1")));
        assert_eq!(job.control.outcome(), JobOutcome::Failed);
        assert!(!job.output_path.exists());
        assert!(temp.exists());
    }
}
