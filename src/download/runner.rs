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


//! Download task runner
//!
//! Drives one [`DownloadJob`] on a spawned tokio task and never blocks the
//! caller. Strategies:
//!
//! - **Direct**: one `Download` phase written straight to the output path
//! - **Adaptive**: `Video` phase to `video_only.<ext>`, `Audio` phase to
//!   `audio_only.<ext>`, then `Merging` into a freshly deduplicated output
//!   path. While the merge runs a synthetic ramp (1 point per tick, capped)
//!   stands in for progress; 100 is only sent after the merge succeeded.
//!   Temporary inputs are removed after a successful merge.
//!
//! Cancellation is cooperative. The cancel flag is checked before each phase
//! and right after every download or merge call returns; a call already in
//! flight runs to completion. Every error is contained: it ends the job in
//! `Failed` through the same cleanup path as cancellation.
//!
//! The runner only produces [`JobEvent`]s. Rendering is left to the
//! [`ObserverBridge`](crate::download::observer::ObserverBridge).

use crate::download::completion::{CompletionHandler, JobSummary};
use crate::download::job::{DownloadJob, DownloadPlan, JobControl};
use crate::download::observer::ObserverBridge;
use crate::download::phase::{lock_phases, ActiveStream, Phase, PhaseController, SharedPhases, Stage};
use crate::download::progress::{MergeRamp, ProgressSample, MAX_PERCENT};
use crate::error::{PicaError, Result};
use crate::file::cleanup::remove_all;
use crate::media::merge::{FfmpegMerger, MergeRequest, MergeTool};
use crate::media::streams::{ChunkCallback, ChunkProgress, StreamDescriptor};
use crate::storage::library::LibraryStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Observer poll interval in milliseconds
    pub tick_interval_ms: u64,

    /// Merge ramp step interval in milliseconds
    pub merge_tick_ms: u64,

    /// Highest value the synthetic merge ramp reaches
    pub merge_ramp_cap: u8,

    /// File stem of the temporary video input
    pub video_temp_stem: String,

    /// File stem of the temporary audio input
    pub audio_temp_stem: String,

    /// ffmpeg executable name or path
    pub ffmpeg_path: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            merge_tick_ms: 80,
            merge_ramp_cap: 95,
            video_temp_stem: "video_only".to_string(),
            audio_temp_stem: "audio_only".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl DownloadConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn merge_tick(&self) -> Duration {
        Duration::from_millis(self.merge_tick_ms.max(1))
    }

    /// Temporary input paths used by an adaptive plan (empty for direct)
    pub fn temp_inputs(&self, job: &DownloadJob) -> Vec<PathBuf> {
        match &job.plan {
            DownloadPlan::Direct { .. } => Vec::new(),
            DownloadPlan::Adaptive { video, audio } => vec![
                job.target_dir
                    .join(format!("{}.{}", self.video_temp_stem, video.file_extension())),
                job.target_dir
                    .join(format!("{}.{}", self.audio_temp_stem, audio.file_extension())),
            ],
        }
    }
}

/// Message from the runner to its observer
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The phase changed (opened, or first bytes arrived)
    Phase(Phase),
    /// Raw transfer progress of the current phase
    Sample(ProgressSample),
    /// Synthetic merge progress
    MergeProgress(u8),
    /// The job reached a terminal phase; always the last event
    Finished(JobSummary),
}

type EventSender = mpsc::UnboundedSender<JobEvent>;

/// Handle to a running job
pub struct JobHandle {
    job_id: String,
    control: Arc<JobControl>,
    started_at: Instant,
    tick_interval: Duration,
    events: Option<mpsc::UnboundedReceiver<JobEvent>>,
    task: JoinHandle<JobSummary>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn control(&self) -> Arc<JobControl> {
        Arc::clone(&self.control)
    }

    /// Request cancellation; idempotent, a no-op once the job is done
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Take the raw event stream (only once; the observer uses it otherwise)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<JobEvent>> {
        self.events.take()
    }

    /// Build the observer bridge for this job
    pub fn observer(&mut self) -> Result<ObserverBridge> {
        let events = self
            .events
            .take()
            .ok_or_else(|| PicaError::InvalidState("job events already taken".to_string()))?;
        Ok(ObserverBridge::new(
            events,
            Arc::clone(&self.control),
            self.started_at,
            self.tick_interval,
        ))
    }

    /// Wait for the background task to finish
    pub async fn join(self) -> Result<JobSummary> {
        Ok(self.task.await?)
    }
}

/// Runs download jobs on background tasks
#[derive(Clone)]
pub struct DownloadRunner {
    merger: Arc<dyn MergeTool>,
    completion: CompletionHandler,
    config: DownloadConfig,
}

impl DownloadRunner {
    pub fn new(
        merger: Arc<dyn MergeTool>,
        library: Arc<dyn LibraryStore>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            merger,
            completion: CompletionHandler::new(library),
            config,
        }
    }

    /// Runner merging with the ffmpeg binary named in `config.ffmpeg_path`
    pub fn with_ffmpeg(library: Arc<dyn LibraryStore>, config: DownloadConfig) -> Self {
        let merger = Arc::new(FfmpegMerger::new(config.ffmpeg_path.clone()));
        Self::new(merger, library, config)
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Spawn `job` and return its handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, job: DownloadJob) -> JobHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle_control = Arc::clone(&job.control);
        let job_id = job.id.clone();
        let runner = self.clone();

        tracing::info!(
            job = %job.id,
            source = %job.source.id,
            adaptive = job.plan.is_adaptive(),
            output = %job.output_path.display(),
            "starting download"
        );

        let task = tokio::spawn(async move { runner.execute(job, tx).await });

        JobHandle {
            job_id,
            control: handle_control,
            started_at: Instant::now(),
            tick_interval: self.config.tick_interval(),
            events: Some(rx),
            task,
        }
    }

    async fn execute(self, mut job: DownloadJob, events: EventSender) -> JobSummary {
        let phases: SharedPhases = Arc::new(Mutex::new(PhaseController::new()));
        let temp_inputs = self.config.temp_inputs(&job);

        let result = match job.plan.clone() {
            DownloadPlan::Direct { stream } => self.run_direct(&job, &stream, &phases, &events).await,
            DownloadPlan::Adaptive { video, audio } => {
                self.run_adaptive(&mut job, &video, &audio, &temp_inputs, &phases, &events)
                    .await
            }
        };

        let summary = match result {
            Ok(output) => match self.completion.on_success(&job, &output, &phases) {
                Some(summary) => summary,
                None => {
                    self.completion
                        .on_abort(&job, None, &temp_inputs, &phases)
                        .await
                }
            },
            Err(e) => {
                self.completion
                    .on_abort(&job, Some(&e), &temp_inputs, &phases)
                    .await
            }
        };

        // The receiver may already be gone; nothing to report then
        let _ = events.send(JobEvent::Finished(summary.clone()));
        summary
    }

    async fn run_direct(
        &self,
        job: &DownloadJob,
        stream: &StreamDescriptor,
        phases: &SharedPhases,
        events: &EventSender,
    ) -> Result<PathBuf> {
        let filename = job
            .output_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PicaError::InvalidPath(job.output_path.display().to_string()))?
            .to_string();

        self.download_phase(job, stream, Stage::Download, &filename, phases, events)
            .await
    }

    async fn run_adaptive(
        &self,
        job: &mut DownloadJob,
        video: &StreamDescriptor,
        audio: &StreamDescriptor,
        temp_inputs: &[PathBuf],
        phases: &SharedPhases,
        events: &EventSender,
    ) -> Result<PathBuf> {
        let [video_tmp, audio_tmp] = temp_inputs else {
            return Err(PicaError::internal("adaptive plan without temporary inputs"));
        };

        let video_path = self
            .download_phase(job, video, Stage::Video, &file_name(video_tmp)?, phases, events)
            .await?;
        let audio_path = self
            .download_phase(job, audio, Stage::Audio, &file_name(audio_tmp)?, phases, events)
            .await?;

        job.control.checkpoint()?;
        job.refresh_output_path();
        self.open_phase(phases, events, |controller| controller.begin_merge());

        let request = MergeRequest::new(video_path, audio_path, job.output_path.clone());
        self.merge_with_ramp(&request, events).await?;
        job.control.checkpoint()?;

        let _ = events.send(JobEvent::MergeProgress(MAX_PERCENT));
        remove_all(&[&request.video, &request.audio]).await;

        Ok(request.output)
    }

    async fn download_phase(
        &self,
        job: &DownloadJob,
        stream: &StreamDescriptor,
        stage: Stage,
        filename: &str,
        phases: &SharedPhases,
        events: &EventSender,
    ) -> Result<PathBuf> {
        job.control.checkpoint()?;

        let total_bytes = stream.total_bytes();
        let active = ActiveStream {
            id: stream.id.clone(),
            total_bytes,
        };
        self.open_phase(phases, events, |controller| controller.begin_phase(active, stage));

        let on_chunk = chunk_callback(Arc::clone(phases), events.clone(), total_bytes);
        let path = stream.download(&job.target_dir, filename, on_chunk).await?;
        job.control.checkpoint()?;

        tracing::debug!(job = %job.id, stream = %stream.id, path = %path.display(), "phase finished");
        Ok(path)
    }

    fn open_phase<F>(&self, phases: &SharedPhases, events: &EventSender, open: F)
    where
        F: FnOnce(&mut PhaseController) -> bool,
    {
        let mut controller = lock_phases(phases);
        if open(&mut *controller) {
            let _ = events.send(JobEvent::Phase(controller.current().clone()));
        }
    }

    async fn merge_with_ramp(&self, request: &MergeRequest, events: &EventSender) -> Result<()> {
        let mut merge = self.merger.merge(request);
        let mut ramp = MergeRamp::new(self.config.merge_ramp_cap);
        let mut ticker = tokio::time::interval(self.config.merge_tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                result = &mut merge => return result,
                _ = ticker.tick() => {
                    let _ = events.send(JobEvent::MergeProgress(ramp.step()));
                }
            }
        }
    }
}

/// Chunk callback: flips `Connecting` to `Active` and forwards samples
///
/// The total comes from the transfer when it reports one, then from the
/// descriptor, then from bytes received plus bytes remaining. With none of
/// these the sample carries a zero total and the received byte count.
fn chunk_callback(phases: SharedPhases, events: EventSender, fallback_total: u64) -> ChunkCallback {
    let received = AtomicU64::new(0);
    let derived_total = AtomicU64::new(0);

    Arc::new(move |chunk: ChunkProgress| {
        let received = received.fetch_add(chunk.chunk_len, Ordering::Relaxed) + chunk.chunk_len;
        let elapsed = {
            let mut controller = lock_phases(&phases);
            if controller.mark_started() {
                let _ = events.send(JobEvent::Phase(controller.current().clone()));
            }
            controller.phase_elapsed()
        };

        let total = if chunk.total_bytes > 0 {
            chunk.total_bytes
        } else if fallback_total > 0 {
            fallback_total
        } else {
            if chunk.bytes_remaining > 0 {
                derived_total.fetch_max(received + chunk.bytes_remaining, Ordering::Relaxed);
            }
            derived_total.load(Ordering::Relaxed)
        };

        let sample = if total > 0 {
            ProgressSample::from_remaining(total, chunk.bytes_remaining, elapsed)
        } else {
            ProgressSample::new(received, 0, elapsed)
        };
        let _ = events.send(JobEvent::Sample(sample.for_stream(chunk.stream_id)));
    })
}

fn file_name(path: &std::path::Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| PicaError::InvalidPath(path.display().to_string()))
}
