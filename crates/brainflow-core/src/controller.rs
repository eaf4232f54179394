//! Wiring of engine, bus node, recovery and duration observation.
//!
//! [`TimerController`] is the single serialization point for a countdown:
//! every command, ticker signal and lifecycle callback takes the engine
//! mutex for the state change only, then raises the resulting events on the
//! controller's bus node after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{mpsc, watch};

use crate::bus::{EventNode, NodeHandle, Propagation};
use crate::clock::Clock;
use crate::events::{LifecycleEvent, TimerEvent};
use crate::recovery::LifecycleRecovery;
use crate::storage::{DurationStore, ObserverId, SnapshotStore};
use crate::timer::{CountdownEngine, EngineStatus, TickSignal, Ticker};

/// Constructor-injected collaborators.
#[derive(Clone)]
pub struct TimerDeps {
    pub durations: Arc<dyn DurationStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub clock: Arc<dyn Clock>,
}

struct Shared {
    engine: Mutex<CountdownEngine>,
    recovery: LifecycleRecovery,
    node: NodeHandle,
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, CountdownEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: Vec<TimerEvent>) {
        for event in events {
            self.node.raise(event);
        }
    }

    fn on_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::EnteredBackground => {
                self.recovery.enter_background(&self.engine);
            }
            LifecycleEvent::EnteredForeground => {
                let outcome = self.recovery.enter_foreground(&self.engine);
                self.emit(outcome.into_events());
            }
        }
    }
}

pub struct TimerController {
    shared: Arc<Shared>,
    node: EventNode,
    durations: Arc<dyn DurationStore>,
    observer: Option<ObserverId>,
}

impl TimerController {
    /// Build the countdown as a child of `parent`.
    ///
    /// The child node propagates every event to `parent`, so alert routing
    /// and navigation registered higher up see timer events even when UI
    /// observers subscribe on the timer node itself.
    pub fn new(
        parent: &EventNode,
        deps: TimerDeps,
        ticker: Box<dyn Ticker>,
        tick_interval_secs: u32,
    ) -> Self {
        let engine = CountdownEngine::new(deps.durations.current_durations(), ticker)
            .with_tick_interval(tick_interval_secs);
        let node = parent.child_with("timer", Propagation::Always);
        let shared = Arc::new(Shared {
            engine: Mutex::new(engine),
            recovery: LifecycleRecovery::new(deps.snapshots, deps.clock),
            node: node.handle(),
        });

        let lifecycle = Arc::clone(&shared);
        node.on_lifecycle(move |event| lifecycle.on_lifecycle(event));

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let observer = deps.durations.on_durations_changed(Box::new(move |field, secs| {
            if let Some(shared) = weak.upgrade() {
                shared.engine().apply_duration_change(field, secs);
            }
        }));

        Self {
            shared,
            node,
            durations: deps.durations,
            observer: Some(observer),
        }
    }

    /// The controller's bus node; subscribe here for timer events or raise
    /// host lifecycle events here.
    pub fn node(&self) -> &EventNode {
        &self.node
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn remaining_secs(&self) -> u32 {
        self.shared.engine().remaining_secs()
    }

    pub fn is_running(&self) -> bool {
        self.shared.engine().is_running()
    }

    pub fn status(&self) -> EngineStatus {
        self.shared.engine().status()
    }

    pub fn subscribe_remaining(&self) -> watch::Receiver<u32> {
        self.shared.engine().subscribe_remaining()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self) {
        let events = self.shared.engine().start();
        self.shared.emit(events);
    }

    pub fn pause(&self) {
        self.shared.engine().pause();
    }

    /// Rewind to the full work length and forget any suspension.
    pub fn stop(&self) {
        self.shared.engine().stop();
        self.shared.recovery.clear();
    }

    pub fn handle_tick(&self, signal: TickSignal) {
        let events = self.shared.engine().handle_tick(signal);
        self.shared.emit(events);
    }

    /// Deliver a host lifecycle signal through the bus.
    pub fn notify_lifecycle(&self, event: LifecycleEvent) {
        self.node.raise(event);
    }

    pub fn open_settings(&self) {
        self.node.raise(TimerEvent::OpenSettings);
    }

    pub fn open_statistics(&self) {
        self.node.raise(TimerEvent::OpenStatistics);
    }

    /// Feed ticker signals into the engine until the channel closes.
    pub async fn drive_ticks(&self, mut ticks: mpsc::UnboundedReceiver<TickSignal>) {
        while let Some(signal) = ticks.recv().await {
            self.handle_tick(signal);
        }
    }
}

impl Drop for TimerController {
    fn drop(&mut self) {
        if let Some(id) = self.observer.take() {
            self.durations.remove_observer(id);
        }
        self.shared.engine().pause();
    }
}

impl std::fmt::Debug for TimerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerController")
            .field("node", &self.node)
            .field("engine", &*self.shared.engine())
            .finish()
    }
}
