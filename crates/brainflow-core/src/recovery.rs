//! Suspend/resume correction for a running countdown.
//!
//! When the host goes to the background a running countdown is paused and
//! the wall-clock time is written to the [`SnapshotStore`]. When the host
//! comes back, the time spent away is subtracted from the remaining value
//! and the countdown resumes. Store I/O never happens under the engine
//! lock, and no store failure is allowed to break the countdown:
//!
//! | failure                       | fallback                          |
//! |-------------------------------|-----------------------------------|
//! | save/load/clear I/O error     | logged, treated as no suspension  |
//! | unparsable timestamp          | resume with zero elapsed time     |
//! | clock moved backwards         | resume with zero elapsed time     |

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::events::TimerEvent;
use crate::storage::SnapshotStore;
use crate::timer::CountdownEngine;

/// What a foreground transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// No suspend mark on record.
    NotSuspended,
    /// The countdown was corrected and resumed (or finished, when the
    /// correction reached zero).
    Resumed {
        elapsed_secs: u32,
        remaining_secs: u32,
        events: Vec<TimerEvent>,
    },
    /// A mark existed but the engine was already running again.
    AlreadyRunning,
}

impl ResumeOutcome {
    pub fn into_events(self) -> Vec<TimerEvent> {
        match self {
            ResumeOutcome::Resumed { events, .. } => events,
            _ => Vec::new(),
        }
    }
}

pub struct LifecycleRecovery {
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
}

impl LifecycleRecovery {
    pub fn new(store: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Pause a running countdown and record when it happened.
    ///
    /// Returns `true` when the engine was running and got paused.
    ///
    /// The mark is saved after the engine lock is released, so callers must
    /// deliver lifecycle events for one engine from a single thread.
    pub fn enter_background(&self, engine: &Mutex<CountdownEngine>) -> bool {
        {
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            if !engine.is_running() {
                return false;
            }
            engine.pause();
        }

        let now = self.clock.now();
        match self.store.save_suspended_at(now) {
            Ok(()) => tracing::info!(at = %now, "countdown suspended"),
            Err(e) => tracing::warn!(error = %e, "failed to persist suspend mark"),
        }
        true
    }

    /// Apply the time spent in the background and resume.
    pub fn enter_foreground(&self, engine: &Mutex<CountdownEngine>) -> ResumeOutcome {
        let now = self.clock.now();
        let elapsed_secs = match self.store.load_suspended_at() {
            Ok(None) => return ResumeOutcome::NotSuspended,
            Ok(Some(suspended_at)) => elapsed_secs(suspended_at, now),
            Err(StoreError::Malformed { value, .. }) => {
                tracing::warn!(%value, "unreadable suspend mark, resuming without correction");
                0
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read suspend mark");
                return ResumeOutcome::NotSuspended;
            }
        };
        self.clear();

        let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
        if engine.is_running() {
            return ResumeOutcome::AlreadyRunning;
        }
        let remaining_secs = engine.remaining_secs().saturating_sub(elapsed_secs);
        let events = engine.resume_at(remaining_secs);
        tracing::info!(elapsed_secs, remaining_secs, "countdown recovered");
        ResumeOutcome::Resumed {
            elapsed_secs,
            remaining_secs,
            events,
        }
    }

    /// Drop any suspend mark. Failures are logged.
    pub fn clear(&self) {
        if let Err(e) = self.store.clear_suspended_at() {
            tracing::warn!(error = %e, "failed to clear suspend mark");
        }
    }
}

/// Whole seconds from `suspended_at` to `now`, rounded down. A timestamp in
/// the future counts as zero.
pub fn elapsed_secs(suspended_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let secs = (now - suspended_at).num_seconds();
    u32::try_from(secs.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemorySnapshotStore;
    use crate::timer::{Durations, ManualTicker};
    use chrono::{Duration, TimeZone};

    struct BrokenStore {
        malformed: bool,
    }

    impl SnapshotStore for BrokenStore {
        fn save_suspended_at(&self, _at: DateTime<Utc>) -> Result<(), StoreError> {
            Err(StoreError::Locked)
        }

        fn load_suspended_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
            if self.malformed {
                Err(StoreError::Malformed {
                    key: "suspended_at".into(),
                    value: "garbage".into(),
                })
            } else {
                Err(StoreError::QueryFailed("disk gone".into()))
            }
        }

        fn clear_suspended_at(&self) -> Result<(), StoreError> {
            Err(StoreError::Locked)
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap()
    }

    fn running_engine(work: u32, ticks: u32) -> Mutex<CountdownEngine> {
        let mut engine = CountdownEngine::new(
            Some(Durations::new(work, 300)),
            Box::new(ManualTicker::new()),
        );
        engine.start();
        for _ in 0..ticks {
            engine.tick();
        }
        Mutex::new(engine)
    }

    fn recovery(store: Arc<dyn SnapshotStore>) -> (LifecycleRecovery, ManualClock) {
        let clock = ManualClock::new(t0());
        (LifecycleRecovery::new(store, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn elapsed_floors_and_clamps() {
        assert_eq!(elapsed_secs(t0(), t0() + Duration::milliseconds(10_999)), 10);
        assert_eq!(elapsed_secs(t0(), t0() - Duration::seconds(30)), 0);
        assert_eq!(elapsed_secs(t0(), t0()), 0);
    }

    #[test]
    fn background_pauses_and_records_time() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (recovery, _clock) = recovery(store.clone());
        let engine = running_engine(100, 3);

        assert!(recovery.enter_background(&engine));
        assert!(!engine.lock().unwrap().is_running());
        assert_eq!(store.load_suspended_at().unwrap(), Some(t0()));
    }

    #[test]
    fn background_while_idle_records_nothing() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (recovery, _clock) = recovery(store.clone());
        let engine = running_engine(100, 0);
        engine.lock().unwrap().pause();

        assert!(!recovery.enter_background(&engine));
        assert!(store.load_suspended_at().unwrap().is_none());
    }

    #[test]
    fn foreground_subtracts_elapsed_and_resumes() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (recovery, clock) = recovery(store.clone());
        let engine = running_engine(100, 3);
        recovery.enter_background(&engine);

        clock.advance_secs(10);
        let outcome = recovery.enter_foreground(&engine);
        assert_eq!(
            outcome,
            ResumeOutcome::Resumed {
                elapsed_secs: 10,
                remaining_secs: 87,
                events: vec![],
            }
        );
        let engine = engine.lock().unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.remaining_secs(), 87);
        assert!(store.load_suspended_at().unwrap().is_none());
    }

    #[test]
    fn foreground_past_the_end_finishes_once() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (recovery, clock) = recovery(store.clone());
        let engine = running_engine(20, 5);
        recovery.enter_background(&engine);

        clock.advance_secs(600);
        let events = recovery.enter_foreground(&engine).into_events();
        assert_eq!(events, vec![TimerEvent::IntervalFinished]);
        assert!(!engine.lock().unwrap().is_running());
        assert_eq!(engine.lock().unwrap().remaining_secs(), 0);

        assert_eq!(recovery.enter_foreground(&engine), ResumeOutcome::NotSuspended);
    }

    #[test]
    fn clock_set_backwards_resumes_without_correction() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (recovery, clock) = recovery(store.clone());
        let engine = running_engine(100, 3);
        recovery.enter_background(&engine);

        clock.set(t0() - Duration::hours(1));
        let outcome = recovery.enter_foreground(&engine);
        assert!(matches!(
            outcome,
            ResumeOutcome::Resumed { elapsed_secs: 0, remaining_secs: 97, .. }
        ));
        assert!(engine.lock().unwrap().is_running());
    }

    #[test]
    fn foreground_without_mark_is_noop() {
        let (recovery, _clock) = recovery(Arc::new(MemorySnapshotStore::new()));
        let engine = running_engine(20, 2);
        engine.lock().unwrap().pause();
        assert_eq!(recovery.enter_foreground(&engine), ResumeOutcome::NotSuspended);
        assert!(!engine.lock().unwrap().is_running());
        assert_eq!(engine.lock().unwrap().remaining_secs(), 18);
    }

    #[test]
    fn already_running_engine_is_left_alone() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (recovery, clock) = recovery(store.clone());
        let engine = running_engine(50, 0);
        recovery.enter_background(&engine);
        engine.lock().unwrap().start();

        clock.advance_secs(5);
        assert_eq!(recovery.enter_foreground(&engine), ResumeOutcome::AlreadyRunning);
        assert_eq!(engine.lock().unwrap().remaining_secs(), 50);
        assert!(store.load_suspended_at().unwrap().is_none());
    }

    #[test]
    fn store_failures_never_break_the_countdown() {
        let (recovery, _clock) = recovery(Arc::new(BrokenStore { malformed: false }));
        let engine = running_engine(50, 1);
        assert!(recovery.enter_background(&engine));
        assert_eq!(recovery.enter_foreground(&engine), ResumeOutcome::NotSuspended);
        assert_eq!(engine.lock().unwrap().remaining_secs(), 49);
    }

    #[test]
    fn malformed_mark_resumes_without_correction() {
        let (recovery, _clock) = recovery(Arc::new(BrokenStore { malformed: true }));
        let engine = running_engine(50, 1);
        engine.lock().unwrap().pause();
        let outcome = recovery.enter_foreground(&engine);
        assert_eq!(
            outcome,
            ResumeOutcome::Resumed {
                elapsed_secs: 0,
                remaining_secs: 49,
                events: vec![],
            }
        );
        assert!(engine.lock().unwrap().is_running());
    }
}
