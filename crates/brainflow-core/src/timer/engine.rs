//! Countdown engine implementation.
//!
//! The engine is a tick-driven state machine. It owns the remaining-seconds
//! value and arms/disarms a [`Ticker`], but performs no I/O itself: every
//! command returns the timer events it produced and the caller decides where
//! they go (normally an event bus node).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (pause) -> Idle
//!            |
//!            +--> remaining hits 0 -> Finished -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CountdownEngine::new(Some(durations), Box::new(ticker));
//! let events = engine.start();
//! // For every TickSignal delivered by the ticker:
//! let events = engine.handle_tick(signal);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::durations::{DurationField, Durations};
use super::ticker::{TickSignal, Ticker};
use crate::events::TimerEvent;

pub const DEFAULT_TICK_INTERVAL_SECS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
}

/// Point-in-time view of the engine, for hosts that print or ship state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: TimerState,
    pub remaining_secs: u32,
    pub work_secs: Option<u32>,
    pub tick_interval_secs: u32,
}

pub struct CountdownEngine {
    durations: Option<Durations>,
    remaining_secs: u32,
    is_running: bool,
    tick_interval_secs: u32,
    /// Bumped whenever the ticker is (re)armed or disarmed.
    generation: u64,
    ticker: Box<dyn Ticker>,
    remaining_tx: watch::Sender<u32>,
}

impl CountdownEngine {
    /// Create an idle engine. `remaining_secs` starts at the configured work
    /// length, or 0 when no durations are configured yet.
    pub fn new(durations: Option<Durations>, ticker: Box<dyn Ticker>) -> Self {
        let remaining_secs = durations.map(|d| d.work).unwrap_or(0);
        let (remaining_tx, _) = watch::channel(remaining_secs);
        Self {
            durations,
            remaining_secs,
            is_running: false,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            generation: 0,
            ticker,
            remaining_tx,
        }
    }

    /// Use a tick interval other than one second. Zero is raised to one.
    pub fn with_tick_interval(mut self, secs: u32) -> Self {
        self.tick_interval_secs = secs.max(1);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        if self.is_running {
            TimerState::Running
        } else {
            TimerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn durations(&self) -> Option<Durations> {
        self.durations
    }

    pub fn tick_interval_secs(&self) -> u32 {
        self.tick_interval_secs
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stream of remaining-seconds values; the current value is readable
    /// immediately.
    pub fn subscribe_remaining(&self) -> watch::Receiver<u32> {
        self.remaining_tx.subscribe()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state(),
            remaining_secs: self.remaining_secs,
            work_secs: self.durations.map(|d| d.work),
            tick_interval_secs: self.tick_interval_secs,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume the countdown.
    ///
    /// Emits `IntervalStarted` only when the full work length remains. A
    /// countdown that already reached zero is rewound to a fresh interval.
    pub fn start(&mut self) -> Vec<TimerEvent> {
        if self.is_running {
            return Vec::new();
        }
        let Some(work) = self.configured_work() else {
            return Vec::new();
        };
        if self.remaining_secs == 0 {
            self.set_remaining(work);
        }

        let mut events = Vec::new();
        if self.remaining_secs == work {
            events.push(TimerEvent::IntervalStarted {
                duration_secs: work,
            });
        }
        self.arm();
        tracing::debug!(remaining = self.remaining_secs, fresh = !events.is_empty(), "countdown started");
        events
    }

    /// Resume after a suspension with an already-corrected remaining value.
    ///
    /// Never emits `IntervalStarted`. A corrected value of zero takes the
    /// finish path immediately instead of arming a zero-length run.
    pub fn resume_at(&mut self, corrected_secs: u32) -> Vec<TimerEvent> {
        if self.is_running {
            tracing::debug!("resume ignored, countdown already running");
            return Vec::new();
        }
        if self.configured_work().is_none() {
            return Vec::new();
        }
        self.set_remaining(corrected_secs);
        if corrected_secs == 0 {
            return self.finish();
        }
        self.arm();
        tracing::debug!(remaining = corrected_secs, "countdown resumed");
        Vec::new()
    }

    /// Apply one tick. No-op unless running.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        if !self.is_running || self.durations.is_none() {
            return Vec::new();
        }
        let remaining = self.remaining_secs.saturating_sub(self.tick_interval_secs);
        self.set_remaining(remaining);

        let mut events = vec![TimerEvent::Tick {
            remaining_secs: remaining,
        }];
        if remaining == 0 {
            events.extend(self.finish());
        }
        events
    }

    /// Apply a ticker signal, discarding ones armed before the latest
    /// start/pause/stop.
    pub fn handle_tick(&mut self, signal: TickSignal) -> Vec<TimerEvent> {
        if signal.generation != self.generation {
            tracing::trace!(
                stale = signal.generation,
                current = self.generation,
                "dropping stale tick"
            );
            return Vec::new();
        }
        self.tick()
    }

    /// Stop ticking and keep the remaining value. Idempotent.
    pub fn pause(&mut self) {
        self.disarm();
        if self.is_running {
            tracing::debug!(remaining = self.remaining_secs, "countdown paused");
        }
        self.is_running = false;
    }

    /// Stop ticking and rewind to the full work length.
    ///
    /// Clearing a persisted suspend mark is the caller's job; the engine
    /// does no I/O.
    pub fn stop(&mut self) {
        self.pause();
        let work = self.durations.map(|d| d.work).unwrap_or(0);
        self.set_remaining(work);
        tracing::debug!(remaining = work, "countdown stopped");
    }

    /// Replace the durations snapshot. An idle countdown snaps to the new
    /// work length; a running one is left alone.
    pub fn set_durations(&mut self, durations: Durations) {
        self.durations = Some(durations);
        if !self.is_running {
            self.set_remaining(durations.work);
        }
    }

    /// Field-level change notification from the duration store.
    pub fn apply_duration_change(&mut self, field: DurationField, secs: u32) {
        let updated = self.durations.unwrap_or_default().with(field, secs);
        match field {
            DurationField::Work => self.set_durations(updated),
            DurationField::ShortBreak => self.durations = Some(updated),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn configured_work(&self) -> Option<u32> {
        self.durations.map(|d| d.work).filter(|&work| work > 0)
    }

    fn finish(&mut self) -> Vec<TimerEvent> {
        self.pause();
        tracing::debug!("countdown finished");
        vec![TimerEvent::IntervalFinished]
    }

    fn arm(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.is_running = true;
        self.ticker.start(
            Duration::from_secs(u64::from(self.tick_interval_secs)),
            self.generation,
        );
    }

    fn disarm(&mut self) {
        self.ticker.stop();
        self.generation = self.generation.wrapping_add(1);
    }

    fn set_remaining(&mut self, secs: u32) {
        self.remaining_secs = secs;
        self.remaining_tx.send_replace(secs);
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        self.ticker.stop();
    }
}

impl std::fmt::Debug for CountdownEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownEngine")
            .field("durations", &self.durations)
            .field("remaining_secs", &self.remaining_secs)
            .field("is_running", &self.is_running)
            .field("tick_interval_secs", &self.tick_interval_secs)
            .field("generation", &self.generation)
            .finish()
    }
}
