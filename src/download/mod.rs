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


//! Download orchestration
//!
//! - [`job`]: the committed download, its plan, and the cancel/outcome cell
//! - [`phase`]: phase state machine and elapsed-time ledger
//! - [`progress`]: sample to percentage/speed/ETA estimation
//! - [`runner`]: background execution of direct and adaptive plans
//! - [`observer`]: fixed-cadence polling bridge for renderers
//! - [`completion`]: success, cancellation and failure finalization
//! - [`stream`]: HTTP download capability

pub mod completion;
pub mod job;
pub mod observer;
pub mod phase;
pub mod progress;
pub mod runner;
pub mod stream;

pub use completion::{CompletionHandler, JobSummary};
pub use job::{DownloadJob, DownloadPlan, JobControl, JobOutcome};
pub use observer::{ObserverBridge, ProgressView};
pub use phase::{ActiveStream, Phase, PhaseController, Stage};
pub use progress::{EstimatorState, MergeRamp, ProgressEstimator, ProgressSample, RemainingMode};
pub use runner::{DownloadConfig, DownloadRunner, JobEvent, JobHandle};
pub use stream::HttpTransfer;
