//! Alert and notification collaborators.
//!
//! The core never plays sounds or delivers notifications itself. It routes
//! timer events from the bus to an [`AlertSink`] and a [`NotificationSink`]
//! supplied by the host. The tracing-backed sinks here are what the CLI host
//! uses in place of real audio and push notifications.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bus::{EventNode, SubscriptionId};
use crate::events::TimerEvent;
use crate::storage::Config;

/// Sound assets shipped with the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundId {
    StartCountdown1,
    StartCountdown2,
    ClockTick1,
    ClockTick2,
    ClockTick3,
    Finish1,
}

impl SoundId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundId::StartCountdown1 => "start_countdown1",
            SoundId::StartCountdown2 => "start_countdown2",
            SoundId::ClockTick1 => "clock_tick1",
            SoundId::ClockTick2 => "clock_tick2",
            SoundId::ClockTick3 => "clock_tick3",
            SoundId::Finish1 => "finish1",
        }
    }

    /// Asset file name, e.g. `clock_tick1.wav`.
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Start,
    Tick,
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WorkIntervalFinished,
}

pub trait AlertSink: Send + Sync {
    fn play(&self, kind: AlertKind, with_vibration: bool);
}

pub trait NotificationSink: Send + Sync {
    /// Schedule a local notification `after_secs` from now.
    fn schedule_fallback_notification(&self, kind: NotificationKind, after_secs: u16);
}

/// Which sound each alert plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundMap {
    pub start: SoundId,
    pub tick: SoundId,
    pub finish: SoundId,
}

impl SoundMap {
    pub fn sound_for(&self, kind: AlertKind) -> SoundId {
        match kind {
            AlertKind::Start => self.start,
            AlertKind::Tick => self.tick,
            AlertKind::Finish => self.finish,
        }
    }
}

impl Default for SoundMap {
    fn default() -> Self {
        Self {
            start: SoundId::StartCountdown2,
            tick: SoundId::ClockTick1,
            finish: SoundId::Finish1,
        }
    }
}

/// Alert sink that logs what would be played.
#[derive(Debug, Default, Clone)]
pub struct TracingAlertSink {
    sounds: SoundMap,
}

impl TracingAlertSink {
    pub fn new(sounds: SoundMap) -> Self {
        Self { sounds }
    }
}

impl AlertSink for TracingAlertSink {
    fn play(&self, kind: AlertKind, with_vibration: bool) {
        let sound = self.sounds.sound_for(kind);
        tracing::info!(?kind, file = %sound.file_name(), vibrate = with_vibration, "alert");
    }
}

/// Notification sink that logs what would be scheduled.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn schedule_fallback_notification(&self, kind: NotificationKind, after_secs: u16) {
        tracing::info!(?kind, after_secs, "fallback notification scheduled");
    }
}

/// User preferences applied while routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub sounds_enabled: bool,
    pub vibration_enabled: bool,
    pub fallback_enabled: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            sounds_enabled: true,
            vibration_enabled: true,
            fallback_enabled: true,
        }
    }
}

impl From<&Config> for AlertPolicy {
    fn from(config: &Config) -> Self {
        Self {
            sounds_enabled: config.alerts.enabled,
            vibration_enabled: config.alerts.vibration,
            fallback_enabled: config.notifications.fallback_enabled,
        }
    }
}

/// Forwards timer events to the alert and notification sinks.
pub struct SinkRouter {
    alerts: Arc<dyn AlertSink>,
    notifications: Arc<dyn NotificationSink>,
    policy: AlertPolicy,
}

impl SinkRouter {
    pub fn new(
        alerts: Arc<dyn AlertSink>,
        notifications: Arc<dyn NotificationSink>,
        policy: AlertPolicy,
    ) -> Self {
        Self {
            alerts,
            notifications,
            policy,
        }
    }

    /// Subscribe on `node` for timer events. Release with
    /// `node.unsubscribe(id)` or by dropping the node.
    pub fn attach(self, node: &EventNode) -> SubscriptionId {
        let router = Arc::new(self);
        node.on_timer(move |event| router.route(event))
    }

    pub fn route(&self, event: TimerEvent) {
        match event {
            TimerEvent::IntervalStarted { duration_secs } => {
                self.play(AlertKind::Start, true);
                if self.policy.fallback_enabled {
                    let after = u16::try_from(duration_secs).unwrap_or(u16::MAX);
                    self.notifications
                        .schedule_fallback_notification(NotificationKind::WorkIntervalFinished, after);
                }
            }
            TimerEvent::Tick { .. } => self.play(AlertKind::Tick, false),
            TimerEvent::IntervalFinished => self.play(AlertKind::Finish, true),
            TimerEvent::OpenSettings | TimerEvent::OpenStatistics => {}
        }
    }

    fn play(&self, kind: AlertKind, vibrate: bool) {
        if self.policy.sounds_enabled {
            self.alerts
                .play(kind, vibrate && self.policy.vibration_enabled);
        }
    }
}
