//! Integration tests for the countdown, suspend recovery and alert routing.

use std::sync::{Arc, Mutex};

use brainflow_core::{
    AlertKind, AlertPolicy, AlertSink, Database, Durations, EventNode, LifecycleEvent,
    ManualClock, ManualTicker, MemorySnapshotStore, NotificationKind, NotificationSink,
    ObservableDurations, SinkRouter, SnapshotStore, TimerController, TimerDeps, TimerEvent,
};
use chrono::{TimeZone, Utc};

#[derive(Default)]
struct Sinks {
    alerts: Mutex<Vec<(AlertKind, bool)>>,
    notifications: Mutex<Vec<(NotificationKind, u16)>>,
}

impl AlertSink for Sinks {
    fn play(&self, kind: AlertKind, with_vibration: bool) {
        self.alerts.lock().unwrap().push((kind, with_vibration));
    }
}

impl NotificationSink for Sinks {
    fn schedule_fallback_notification(&self, kind: NotificationKind, after_secs: u16) {
        self.notifications.lock().unwrap().push((kind, after_secs));
    }
}

impl Sinks {
    fn count(&self, kind: AlertKind) -> usize {
        self.alerts.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }
}

struct App {
    _root: EventNode,
    timer: TimerController,
    ticker: ManualTicker,
    clock: ManualClock,
    durations: Arc<ObservableDurations>,
    snapshots: Arc<dyn SnapshotStore>,
    sinks: Arc<Sinks>,
    events: Arc<Mutex<Vec<TimerEvent>>>,
}

fn app_with_store(work: u32, snapshots: Arc<dyn SnapshotStore>) -> App {
    let root = EventNode::root("app");
    let sinks = Arc::new(Sinks::default());
    SinkRouter::new(sinks.clone(), sinks.clone(), AlertPolicy::default()).attach(&root);

    let ticker = ManualTicker::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
    let durations = Arc::new(ObservableDurations::new(Some(Durations::new(work, 300))));
    let timer = TimerController::new(
        &root,
        TimerDeps {
            durations: durations.clone(),
            snapshots: snapshots.clone(),
            clock: Arc::new(clock.clone()),
        },
        Box::new(ticker.clone()),
        1,
    );

    let events = Arc::new(Mutex::new(Vec::new()));
    let events2 = Arc::clone(&events);
    timer.node().on_timer(move |e| events2.lock().unwrap().push(e));

    App {
        _root: root,
        timer,
        ticker,
        clock,
        durations,
        snapshots,
        sinks,
        events,
    }
}

fn app(work: u32) -> App {
    app_with_store(work, Arc::new(MemorySnapshotStore::new()))
}

impl App {
    fn tick(&self) {
        if let Some(signal) = self.ticker.signal() {
            self.timer.handle_tick(signal);
        }
    }

    fn count(&self, wanted: TimerEvent) -> usize {
        self.events.lock().unwrap().iter().filter(|e| **e == wanted).count()
    }

    fn started_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, TimerEvent::IntervalStarted { .. }))
            .count()
    }
}

#[test]
fn pomodoro_with_suspension_scenario() {
    let app = app(1500);

    app.timer.start();
    assert!(app.timer.is_running());
    assert_eq!(app.timer.remaining_secs(), 1500);
    assert_eq!(app.started_count(), 1);
    assert_eq!(
        *app.sinks.notifications.lock().unwrap(),
        vec![(NotificationKind::WorkIntervalFinished, 1500)]
    );

    for _ in 0..3 {
        app.tick();
    }
    assert_eq!(app.timer.remaining_secs(), 1497);
    assert_eq!(app.sinks.count(AlertKind::Tick), 3);

    app.timer.notify_lifecycle(LifecycleEvent::EnteredBackground);
    assert!(!app.timer.is_running());
    assert!(app.snapshots.load_suspended_at().unwrap().is_some());

    app.clock.advance_secs(10);
    app.timer.notify_lifecycle(LifecycleEvent::EnteredForeground);
    assert_eq!(app.timer.remaining_secs(), 1487);
    assert!(app.timer.is_running());
    assert_eq!(app.started_count(), 1);
    assert_eq!(app.sinks.count(AlertKind::Start), 1);
    assert_eq!(app.sinks.notifications.lock().unwrap().len(), 1);
    assert!(app.snapshots.load_suspended_at().unwrap().is_none());
}

#[test]
fn reaching_zero_finishes_exactly_once() {
    let app = app(3);
    app.timer.start();
    let last_signal = {
        app.tick();
        app.tick();
        app.ticker.signal().unwrap()
    };
    app.tick();

    assert_eq!(app.timer.remaining_secs(), 0);
    assert!(!app.timer.is_running());
    assert_eq!(app.count(TimerEvent::IntervalFinished), 1);
    assert_eq!(app.sinks.alerts.lock().unwrap().last(), Some(&(AlertKind::Finish, true)));

    app.timer.handle_tick(last_signal);
    app.tick();
    assert_eq!(app.count(TimerEvent::IntervalFinished), 1);
    assert_eq!(app.timer.remaining_secs(), 0);
}

#[test]
fn suspension_longer_than_remaining_finishes_once_on_resume() {
    let app = app(60);
    app.timer.start();
    for _ in 0..20 {
        app.tick();
    }
    app.timer.notify_lifecycle(LifecycleEvent::EnteredBackground);
    app.clock.advance_secs(40);
    app.timer.notify_lifecycle(LifecycleEvent::EnteredForeground);

    assert_eq!(app.timer.remaining_secs(), 0);
    assert!(!app.timer.is_running());
    assert_eq!(app.count(TimerEvent::IntervalFinished), 1);
    assert_eq!(app.sinks.count(AlertKind::Finish), 1);

    app.timer.notify_lifecycle(LifecycleEvent::EnteredForeground);
    assert_eq!(app.count(TimerEvent::IntervalFinished), 1);
}

#[test]
fn finished_before_suspension_does_not_refire() {
    let app = app(2);
    app.timer.start();
    app.tick();
    app.tick();
    assert_eq!(app.count(TimerEvent::IntervalFinished), 1);

    app.timer.notify_lifecycle(LifecycleEvent::EnteredBackground);
    app.clock.advance_secs(100);
    app.timer.notify_lifecycle(LifecycleEvent::EnteredForeground);
    assert_eq!(app.count(TimerEvent::IntervalFinished), 1);
    assert!(!app.timer.is_running());
}

#[test]
fn resume_after_manual_pause_does_not_restart_interval() {
    let app = app(30);
    app.timer.start();
    app.tick();
    app.timer.pause();
    app.timer.start();
    assert_eq!(app.started_count(), 1);
    assert_eq!(app.timer.remaining_secs(), 29);
}

#[test]
fn configured_work_change_respects_running_countdown() {
    let app = app(1500);
    app.durations.set_work(900).unwrap();
    assert_eq!(app.timer.remaining_secs(), 900);

    app.timer.start();
    app.tick();
    app.durations.set_work(300).unwrap();
    assert_eq!(app.timer.remaining_secs(), 899);

    app.timer.stop();
    assert_eq!(app.timer.remaining_secs(), 300);
    assert!(!app.timer.is_running());
}

#[test]
fn sqlite_store_carries_the_suspend_mark() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open_at(&dir.path().join("brainflow.db")).unwrap());
    let app = app_with_store(120, db.clone());

    app.timer.start();
    app.tick();
    app.timer.notify_lifecycle(LifecycleEvent::EnteredBackground);
    assert!(db.kv_get("suspended_at").unwrap().is_some());

    app.clock.advance_secs(19);
    app.timer.notify_lifecycle(LifecycleEvent::EnteredForeground);
    assert_eq!(app.timer.remaining_secs(), 100);
    assert!(db.kv_get("suspended_at").unwrap().is_none());
}

#[test]
fn corrupt_suspend_mark_resumes_without_correction() {
    let db = Arc::new(Database::open_memory().unwrap());
    let app = app_with_store(120, db.clone());

    app.timer.start();
    app.tick();
    app.timer.notify_lifecycle(LifecycleEvent::EnteredBackground);
    db.kv_set("suspended_at", "half past nine").unwrap();

    app.clock.advance_secs(50);
    app.timer.notify_lifecycle(LifecycleEvent::EnteredForeground);
    assert_eq!(app.timer.remaining_secs(), 119);
    assert!(app.timer.is_running());
}

#[test]
fn missing_configuration_is_a_silent_noop() {
    let root = EventNode::root("app");
    let ticker = ManualTicker::new();
    let timer = TimerController::new(
        &root,
        TimerDeps {
            durations: Arc::new(ObservableDurations::new(None)),
            snapshots: Arc::new(MemorySnapshotStore::new()),
            clock: Arc::new(ManualClock::new(Utc::now())),
        },
        Box::new(ticker.clone()),
        1,
    );
    timer.start();
    assert!(!timer.is_running());
    assert!(!ticker.is_armed());
    assert_eq!(timer.remaining_secs(), 0);
}
