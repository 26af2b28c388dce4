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


//! Observer bridge
//!
//! The only consumer of runner output. A fixed-cadence loop that, each tick:
//! 1. drains pending [`JobEvent`]s into the local phase and estimator
//! 2. advances the displayed percentage by at most one point
//! 3. recomputes elapsed time from the job's start
//! 4. hands a [`ProgressView`] snapshot to the renderer
//!
//! It never blocks on the runner and stops by itself once the job reaches a
//! terminal phase (or the cancel flag is raised).

use crate::download::completion::JobSummary;
use crate::download::job::JobControl;
use crate::download::phase::Phase;
use crate::download::progress::{ProgressEstimator, RemainingMode};
use crate::download::runner::JobEvent;
use crate::format::{format_size, format_time};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{Instant, MissedTickBehavior};

/// What a renderer shows for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub phase: Phase,
    /// Smoothed percentage
    pub percent: u8,
    /// Latest true percentage
    pub target: u8,
    /// Total bytes of the current phase
    pub total_bytes: u64,
    /// Bytes per second
    pub speed: f64,
    pub remaining_mode: RemainingMode,
    pub remaining_secs: f64,
    pub elapsed: Duration,
}

impl ProgressView {
    pub fn status(&self) -> String {
        self.phase.to_string()
    }

    pub fn speed_label(&self) -> String {
        format!("Speed: {}/s", format_size(self.speed))
    }

    pub fn size_label(&self) -> String {
        format!("Size: {}", format_size(self.total_bytes as f64))
    }

    pub fn elapsed_label(&self) -> String {
        format!("Elapsed: {}", format_time(self.elapsed.as_secs_f64()))
    }

    pub fn remaining_label(&self) -> String {
        let value = match self.remaining_mode {
            RemainingMode::Unknown => "Na".to_string(),
            RemainingMode::Calculating => "Calculating".to_string(),
            RemainingMode::Active => format_time(self.remaining_secs),
            RemainingMode::Finished => format_time(0.0),
        };
        format!("Remaining: {}", value)
    }
}

/// Polls runner events on a fixed interval and renders snapshots
pub struct ObserverBridge {
    events: mpsc::UnboundedReceiver<JobEvent>,
    control: Arc<JobControl>,
    started_at: Instant,
    tick_interval: Duration,
    phase: Phase,
    estimator: ProgressEstimator,
    summary: Option<JobSummary>,
}

impl ObserverBridge {
    pub fn new(
        events: mpsc::UnboundedReceiver<JobEvent>,
        control: Arc<JobControl>,
        started_at: Instant,
        tick_interval: Duration,
    ) -> Self {
        Self {
            events,
            control,
            started_at,
            tick_interval,
            phase: Phase::Idle,
            estimator: ProgressEstimator::new(),
            summary: None,
        }
    }

    /// Final summary, once the `Finished` event was seen
    pub fn summary(&self) -> Option<&JobSummary> {
        self.summary.as_ref()
    }

    /// Run until the job is terminal; returns the last rendered view
    pub async fn run<F>(mut self, mut render: F) -> ProgressView
    where
        F: FnMut(&ProgressView),
    {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let view = self.poll();
            render(&view);
            if view.phase.is_terminal() {
                return view;
            }
        }
    }

    /// One tick: drain events, advance the estimator, build a snapshot
    pub fn poll(&mut self) -> ProgressView {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.phase.is_terminal() {
                        self.phase = Phase::Failed {
                            reason: "download task ended unexpectedly".to_string(),
                        };
                        self.estimator.stop();
                    }
                    break;
                }
            }
        }

        if self.control.is_cancelled() && !self.phase.is_terminal() {
            self.phase = Phase::Cancelled;
            self.estimator.stop();
        }

        self.estimator.tick();
        self.view()
    }

    /// Fold one runner event into the local state
    pub fn apply(&mut self, event: JobEvent) {
        match event {
            JobEvent::Phase(phase) => {
                if self.phase.is_terminal() {
                    return;
                }
                match phase {
                    Phase::Connecting { .. } => self.estimator.reset(),
                    Phase::Merging => self.estimator.reset_for_merge(),
                    _ => {}
                }
                self.phase = phase;
            }
            JobEvent::Sample(sample) => {
                let current = self.phase.stream().map(|s| s.id.as_str());
                let stale = match (current, sample.stream_id.as_deref()) {
                    (Some(current), Some(id)) => current != id,
                    (None, _) => true,
                    _ => false,
                };
                if !stale {
                    self.estimator.observe(&sample);
                }
            }
            JobEvent::MergeProgress(percent) => {
                if self.phase == Phase::Merging {
                    self.estimator.set_synthetic(percent);
                }
            }
            JobEvent::Finished(summary) => {
                match summary.phase {
                    Phase::Done => self.estimator.finish(),
                    _ => self.estimator.stop(),
                }
                self.phase = summary.phase.clone();
                self.summary = Some(summary);
            }
        }
    }

    /// Snapshot of the current state
    pub fn view(&self) -> ProgressView {
        let state = self.estimator.state();
        let elapsed = match &self.summary {
            Some(summary) => summary.elapsed,
            None => self.started_at.elapsed(),
        };

        ProgressView {
            phase: self.phase.clone(),
            percent: state.displayed,
            target: state.target,
            total_bytes: state.total_bytes,
            speed: state.speed,
            remaining_mode: state.mode,
            remaining_secs: state.remaining_secs,
            elapsed,
        }
    }
}
