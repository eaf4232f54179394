//! # BrainFlow Core Library
//!
//! This library provides the core logic of the BrainFlow work/break timer:
//! a countdown that stays accurate when the host process is suspended. Hosts
//! (the `brainflow-cli` binary, or a GUI shell) wire it to real storage,
//! sound and notification services through narrow traits.
//!
//! ## Architecture
//!
//! - **Countdown Engine**: tick-driven state machine that owns the remaining
//!   seconds and arms/disarms a ticker
//! - **Lifecycle Recovery**: pauses on background, records the time, and
//!   subtracts the time spent away on foreground
//! - **Event Bus**: hierarchical, synchronous publish/subscribe tree that
//!   carries lifecycle signals in and timer events out
//! - **Storage**: TOML configuration and a SQLite key-value store for the
//!   suspend mark
//!
//! ## Key Components
//!
//! - [`TimerController`]: wires the pieces together and serializes access
//! - [`CountdownEngine`]: core timer state machine
//! - [`EventNode`]: one node of the event tree
//! - [`LifecycleRecovery`]: suspend/resume correction
//! - [`SinkRouter`]: forwards timer events to alert and notification sinks

pub mod bus;
pub mod clock;
pub mod controller;
pub mod error;
pub mod events;
pub mod recovery;
pub mod sinks;
pub mod storage;
pub mod timer;

pub use bus::{EventNode, NodeHandle, Propagation, SubscriptionId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{TimerController, TimerDeps};
pub use error::{ConfigError, CoreError, StoreError};
pub use events::{DomainEvent, EventCategory, LifecycleEvent, TimerEvent};
pub use recovery::{LifecycleRecovery, ResumeOutcome};
pub use sinks::{
    AlertKind, AlertPolicy, AlertSink, NotificationKind, NotificationSink, SinkRouter, SoundId,
    SoundMap, TracingAlertSink, TracingNotificationSink,
};
pub use storage::{
    Config, Database, DurationStore, MemorySnapshotStore, ObservableDurations, SnapshotStore,
};
pub use timer::{
    CountdownEngine, DurationField, Durations, EngineStatus, ManualTicker, TickSignal, Ticker,
    TimerState, TokioTicker,
};
