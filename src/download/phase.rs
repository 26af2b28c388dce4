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


//! Phase state machine
//!
//! A job moves through
//! `Idle → Connecting(n) → Active(n) → [Connecting(n+1) …] → Merging → Done`,
//! with `Cancelled` and `Failed` reachable from every non-terminal phase.
//! Terminal phases accept no further transitions; attempts are no-ops.
//!
//! [`PhaseController`] also keeps the elapsed-time ledger: opening a phase
//! folds the previous phase's duration into the cumulative total.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Which logical download step a phase represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Single-stream download (direct strategy)
    Download,
    /// Video half of an adaptive download
    Video,
    /// Audio half of an adaptive download
    Audio,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Download => "Downloading",
            Stage::Video => "Downloading Video",
            Stage::Audio => "Downloading Audio",
        }
    }
}

/// The stream a download phase is transferring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveStream {
    pub id: String,
    pub total_bytes: u64,
}

/// Current phase of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    /// Phase opened, no bytes received yet
    Connecting { stream: ActiveStream, stage: Stage },
    /// Bytes are flowing
    Active { stream: ActiveStream, stage: Stage },
    Merging,
    Done,
    Cancelled,
    Failed { reason: String },
}

impl Phase {
    /// Status text for display
    pub fn label(&self) -> &str {
        match self {
            Phase::Idle => "Waiting",
            Phase::Connecting { .. } => "Connecting…",
            Phase::Active { stage, .. } => stage.label(),
            Phase::Merging => "Merging",
            Phase::Done => "Completed",
            Phase::Cancelled => "Cancelled",
            Phase::Failed { .. } => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Cancelled | Phase::Failed { .. })
    }

    /// Stream being transferred, for download phases
    pub fn stream(&self) -> Option<&ActiveStream> {
        match self {
            Phase::Connecting { stream, .. } | Phase::Active { stream, .. } => Some(stream),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Phase::Connecting { stage, .. } | Phase::Active { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the first bytes of this phase have arrived
    pub fn is_started(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::Connecting { .. })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Failed { reason } => write!(f, "Failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Phase controller shared between a runner and its chunk callbacks
pub type SharedPhases = Arc<Mutex<PhaseController>>;

/// Lock a shared controller, recovering the data from a poisoned lock
pub(crate) fn lock_phases(phases: &Mutex<PhaseController>) -> MutexGuard<'_, PhaseController> {
    phases.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the current phase and the elapsed-time ledger
#[derive(Debug)]
pub struct PhaseController {
    current: Phase,
    opened_at: Option<Instant>,
    total_elapsed: Duration,
}

impl Default for PhaseController {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseController {
    pub fn new() -> Self {
        Self {
            current: Phase::Idle,
            opened_at: None,
            total_elapsed: Duration::ZERO,
        }
    }

    pub fn current(&self) -> &Phase {
        &self.current
    }

    /// Open a download phase, closing the previous one first
    ///
    /// Returns false (and does nothing) once a terminal phase was reached.
    pub fn begin_phase(&mut self, stream: ActiveStream, stage: Stage) -> bool {
        self.open(Phase::Connecting { stream, stage })
    }

    /// Flip `Connecting` to `Active` on the first received bytes
    ///
    /// Returns true only for the call that performed the flip.
    pub fn mark_started(&mut self) -> bool {
        let phase = std::mem::replace(&mut self.current, Phase::Idle);
        let (phase, flipped) = match phase {
            Phase::Connecting { stream, stage } => (Phase::Active { stream, stage }, true),
            other => (other, false),
        };
        self.current = phase;
        flipped
    }

    /// Open the merge phase
    pub fn begin_merge(&mut self) -> bool {
        self.open(Phase::Merging)
    }

    /// Time since the open phase started
    pub fn phase_elapsed(&self) -> Duration {
        self.opened_at.map(|at| at.elapsed()).unwrap_or_default()
    }

    /// Close the open phase and fold its duration into the total
    pub fn finalize(&mut self) -> Duration {
        if let Some(opened_at) = self.opened_at.take() {
            self.total_elapsed += opened_at.elapsed();
        }
        self.total_elapsed
    }

    /// Cumulative time of closed phases
    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    pub fn complete(&mut self) -> bool {
        self.terminate(Phase::Done)
    }

    pub fn cancel(&mut self) -> bool {
        self.terminate(Phase::Cancelled)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        self.terminate(Phase::Failed {
            reason: reason.into(),
        })
    }

    fn open(&mut self, next: Phase) -> bool {
        if self.current.is_terminal() {
            tracing::debug!(phase = %self.current, "ignoring transition out of terminal phase");
            return false;
        }
        self.finalize();
        self.opened_at = Some(Instant::now());
        tracing::debug!(from = %self.current, to = %next, "phase transition");
        self.current = next;
        true
    }

    fn terminate(&mut self, next: Phase) -> bool {
        if self.current.is_terminal() {
            return false;
        }
        self.finalize();
        tracing::debug!(from = %self.current, to = %next, "terminal phase");
        self.current = next;
        true
    }
}
