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


//! Progress estimation
//!
//! Converts raw transfer samples into display values.
//!
//! # Model
//! - `target`: true completion ratio of the current phase, `floor(d / t * 100)`
//! - `displayed`: monotonic animation value stepping toward `target` by at
//!   most one point per tick, so bursty chunk callbacks render smoothly
//! - Speed is instantaneous over the phase (`bytes / elapsed`)
//! - Remaining time is `(total - downloaded) / speed`, only once speed is known
//!
//! The merge step has no byte signal, so [`MergeRamp`] drives a synthetic
//! ramp instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound of any percentage value
pub const MAX_PERCENT: u8 = 100;

/// One raw progress observation for the current phase
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    /// Stream the sample belongs to (stale samples are dropped by the observer)
    pub stream_id: Option<String>,

    /// Bytes downloaded so far in this phase
    pub bytes_downloaded: u64,

    /// Total bytes expected in this phase (0 if unknown)
    pub total_bytes: u64,

    /// Wall-clock time since the phase started
    pub elapsed: Duration,
}

impl ProgressSample {
    pub fn new(bytes_downloaded: u64, total_bytes: u64, elapsed: Duration) -> Self {
        Self {
            stream_id: None,
            bytes_downloaded,
            total_bytes,
            elapsed,
        }
    }

    pub fn for_stream(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    /// Build a sample from a chunk notification's remaining-bytes value
    pub fn from_remaining(total_bytes: u64, bytes_remaining: u64, elapsed: Duration) -> Self {
        Self::new(total_bytes.saturating_sub(bytes_remaining), total_bytes, elapsed)
    }
}

/// Confidence of the remaining-time estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainingMode {
    /// Nothing is running
    Unknown,
    /// A phase is open but no usable speed yet
    Calculating,
    /// Speed estimate available
    Active,
    /// Job reached a terminal phase
    Finished,
}

/// Snapshot of the estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorState {
    /// Smoothed percentage shown to the user (monotonic within a phase)
    pub displayed: u8,

    /// Latest computed percentage
    pub target: u8,

    /// Bytes per second
    pub speed: f64,

    /// Remaining seconds (meaningful only in `Active` mode)
    pub remaining_secs: f64,

    pub mode: RemainingMode,

    /// Total bytes of the current phase
    pub total_bytes: u64,
}

impl Default for EstimatorState {
    fn default() -> Self {
        Self {
            displayed: 0,
            target: 0,
            speed: 0.0,
            remaining_secs: 0.0,
            mode: RemainingMode::Unknown,
            total_bytes: 0,
        }
    }
}

/// Turns samples into smoothed display values
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimator {
    state: EstimatorState,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh phase: zero progress, reset speed/ETA, mode `Calculating`
    pub fn reset(&mut self) {
        self.state = EstimatorState {
            mode: RemainingMode::Calculating,
            ..EstimatorState::default()
        };
    }

    /// Enter the merge phase: zero progress, no speed, mode `Unknown`
    ///
    /// Merging has no byte signal, so there is nothing to estimate.
    pub fn reset_for_merge(&mut self) {
        self.state = EstimatorState::default();
    }

    /// Feed one raw sample
    ///
    /// A zero total means the size is unknown: speed is still tracked from
    /// the raw byte count, but target stays 0 and no remaining time is given.
    pub fn observe(&mut self, sample: &ProgressSample) {
        let total = sample.total_bytes;
        let downloaded = if total > 0 {
            sample.bytes_downloaded.min(total)
        } else {
            sample.bytes_downloaded
        };

        self.state.total_bytes = total;
        self.state.target = if total > 0 {
            let ratio = downloaded as f64 / total as f64 * 100.0;
            ratio.floor().clamp(0.0, MAX_PERCENT as f64) as u8
        } else {
            0
        };

        let elapsed = sample.elapsed.as_secs_f64();
        self.state.speed = if elapsed > 0.0 {
            downloaded as f64 / elapsed
        } else {
            0.0
        };

        if self.state.speed > 0.0 && total > 0 {
            self.state.remaining_secs = (total - downloaded) as f64 / self.state.speed;
            if self.state.mode != RemainingMode::Finished {
                self.state.mode = RemainingMode::Active;
            }
        } else {
            self.state.remaining_secs = 0.0;
        }
    }

    /// Advance `displayed` one step toward `target`
    ///
    /// Returns true if the displayed value changed.
    pub fn tick(&mut self) -> bool {
        if self.state.displayed < self.state.target && self.state.displayed < MAX_PERCENT {
            self.state.displayed += 1;
            true
        } else {
            false
        }
    }

    /// Override the displayed value from a synthetic driver (merge ramp)
    ///
    /// Never moves the value backwards.
    pub fn set_synthetic(&mut self, percent: u8) {
        let percent = percent.min(MAX_PERCENT);
        self.state.target = self.state.target.max(percent);
        self.state.displayed = self.state.displayed.max(percent);
    }

    /// Jump to 100% and mark the estimate finished
    pub fn finish(&mut self) {
        self.state.displayed = MAX_PERCENT;
        self.state.target = MAX_PERCENT;
        self.state.remaining_secs = 0.0;
        self.state.mode = RemainingMode::Finished;
    }

    /// Freeze the estimate without touching the percentages
    pub fn stop(&mut self) {
        self.state.mode = RemainingMode::Unknown;
        self.state.speed = 0.0;
        self.state.remaining_secs = 0.0;
    }

    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    pub fn displayed(&self) -> u8 {
        self.state.displayed
    }

    pub fn target(&self) -> u8 {
        self.state.target
    }
}

/// Synthetic merge progress: one point per step up to a cap
#[derive(Debug, Clone)]
pub struct MergeRamp {
    value: u8,
    cap: u8,
}

impl MergeRamp {
    pub fn new(cap: u8) -> Self {
        Self {
            value: 0,
            cap: cap.min(MAX_PERCENT),
        }
    }

    /// Advance and return the new value (stays at the cap once reached)
    pub fn step(&mut self) -> u8 {
        if self.value < self.cap {
            self.value += 1;
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_observe_target_and_speed() {
        let mut estimator = ProgressEstimator::new();
        estimator.reset();
        assert_eq!(estimator.state().mode, RemainingMode::Calculating);

        estimator.observe(&ProgressSample::new(2_500_000, 10_000_000, secs(5)));
        let state = estimator.state();
        assert_eq!(state.target, 25);
        assert_eq!(state.speed, 500_000.0);
        assert_eq!(state.remaining_secs, 15.0);
        assert_eq!(state.mode, RemainingMode::Active);
    }

    #[test]
    fn test_zero_elapsed_keeps_calculating() {
        let mut estimator = ProgressEstimator::new();
        estimator.reset();
        estimator.observe(&ProgressSample::new(100, 1000, Duration::ZERO));

        assert_eq!(estimator.target(), 10);
        assert_eq!(estimator.state().speed, 0.0);
        assert_eq!(estimator.state().mode, RemainingMode::Calculating);
    }

    #[test]
    fn test_target_is_clamped() {
        let mut estimator = ProgressEstimator::new();
        estimator.observe(&ProgressSample::new(2000, 1000, secs(1)));
        assert_eq!(estimator.target(), 100);
        assert_eq!(estimator.state().remaining_secs, 0.0);

        estimator.observe(&ProgressSample::new(10, 0, secs(1)));
        assert_eq!(estimator.target(), 0);
    }

    #[test]
    fn test_unknown_total_tracks_speed_only() {
        let mut estimator = ProgressEstimator::new();
        estimator.reset();
        estimator.observe(&ProgressSample::new(4096, 0, secs(2)));

        let state = estimator.state();
        assert_eq!(state.target, 0);
        assert_eq!(state.speed, 2048.0);
        assert_eq!(state.remaining_secs, 0.0);
        assert_eq!(state.mode, RemainingMode::Calculating);
    }

    #[test]
    fn test_reset_for_merge_clears_estimate() {
        let mut estimator = ProgressEstimator::new();
        estimator.reset();
        estimator.observe(&ProgressSample::new(500, 1000, secs(1)));
        assert_eq!(estimator.state().mode, RemainingMode::Active);

        estimator.reset_for_merge();
        let state = estimator.state();
        assert_eq!(state.target, 0);
        assert_eq!(state.speed, 0.0);
        assert_eq!(state.mode, RemainingMode::Unknown);
    }

    #[test]
    fn test_from_remaining() {
        let sample = ProgressSample::from_remaining(10_000_000, 7_500_000, secs(1));
        assert_eq!(sample.bytes_downloaded, 2_500_000);

        let sample = ProgressSample::from_remaining(100, 500, secs(1));
        assert_eq!(sample.bytes_downloaded, 0);
    }

    #[test]
    fn test_target_non_decreasing_for_growing_samples() {
        let total = 7_777_777u64;
        let mut estimator = ProgressEstimator::new();
        let mut last = 0u8;

        for step in 0..=97u64 {
            let downloaded = (total * step / 97).min(total);
            estimator.observe(&ProgressSample::new(downloaded, total, secs(step + 1)));
            let target = estimator.target();
            assert!(target >= last);
            assert!(target <= 100);
            last = target;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_tick_steps_by_one_and_never_overshoots() {
        let mut estimator = ProgressEstimator::new();
        estimator.reset();
        estimator.observe(&ProgressSample::new(3, 100, secs(1)));

        let mut seen = Vec::new();
        for _ in 0..5 {
            estimator.tick();
            seen.push(estimator.displayed());
        }
        assert_eq!(seen, vec![1, 2, 3, 3, 3]);

        // A lower recompute never pulls the display back
        estimator.observe(&ProgressSample::new(1, 100, secs(2)));
        estimator.tick();
        assert_eq!(estimator.displayed(), 3);
        assert_eq!(estimator.target(), 1);
    }

    #[test]
    fn test_finish_and_reset() {
        let mut estimator = ProgressEstimator::new();
        estimator.observe(&ProgressSample::new(50, 100, secs(1)));
        estimator.finish();
        assert_eq!(estimator.displayed(), 100);
        assert_eq!(estimator.state().mode, RemainingMode::Finished);

        estimator.reset();
        assert_eq!(estimator.displayed(), 0);
        assert_eq!(estimator.state().speed, 0.0);
        assert_eq!(estimator.state().mode, RemainingMode::Calculating);
    }

    #[test]
    fn test_set_synthetic_is_monotonic() {
        let mut estimator = ProgressEstimator::new();
        estimator.set_synthetic(40);
        estimator.set_synthetic(20);
        assert_eq!(estimator.displayed(), 40);
        estimator.set_synthetic(250);
        assert_eq!(estimator.displayed(), 100);
    }

    #[test]
    fn test_merge_ramp_caps() {
        let mut ramp = MergeRamp::new(95);
        let mut last = 0;
        for _ in 0..200 {
            last = ramp.step();
        }
        assert_eq!(last, 95);
        assert_eq!(ramp.step(), 95);
    }
}
