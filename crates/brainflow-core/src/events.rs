use serde::{Deserialize, Serialize};

/// Routing key for bus subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Lifecycle,
    Timer,
}

/// Host process lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The host lost foreground execution.
    EnteredBackground,
    /// The host is about to regain foreground execution.
    EnteredForeground,
}

/// Timer-domain signals: navigation requests and countdown alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    OpenSettings,
    OpenStatistics,
    /// One tick was applied to a running countdown.
    Tick { remaining_secs: u32 },
    /// A fresh work interval began.
    IntervalStarted { duration_secs: u32 },
    /// The countdown reached zero.
    IntervalFinished,
}

/// Everything that travels over the event bus.
///
/// The inner enums carry their own `type` tag, so the wire form is flat:
/// `{"type":"tick","remaining_secs":1497}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Lifecycle(LifecycleEvent),
    Timer(TimerEvent),
}

impl DomainEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            DomainEvent::Lifecycle(_) => EventCategory::Lifecycle,
            DomainEvent::Timer(_) => EventCategory::Timer,
        }
    }
}

impl From<LifecycleEvent> for DomainEvent {
    fn from(event: LifecycleEvent) -> Self {
        DomainEvent::Lifecycle(event)
    }
}

impl From<TimerEvent> for DomainEvent {
    fn from(event: TimerEvent) -> Self {
        DomainEvent::Timer(event)
    }
}
