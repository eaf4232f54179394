//! Observable store for the configured interval lengths.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::config::Config;
use crate::error::Result;
use crate::timer::{DurationField, Durations};

/// Called with the changed field and its new value.
pub type DurationObserver = Box<dyn Fn(DurationField, u32) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub trait DurationStore: Send + Sync {
    /// `None` until durations have been configured.
    fn current_durations(&self) -> Option<Durations>;

    fn on_durations_changed(&self, observer: DurationObserver) -> ObserverId;

    /// Returns `false` when the id is unknown.
    fn remove_observer(&self, id: ObserverId) -> bool;
}

/// In-memory durations with change notification, optionally written
/// through to a `config.toml`.
pub struct ObservableDurations {
    current: Mutex<Option<Durations>>,
    observers: Mutex<Vec<(ObserverId, Arc<dyn Fn(DurationField, u32) + Send + Sync>)>>,
    next_id: AtomicU64,
    config_path: Option<PathBuf>,
}

impl ObservableDurations {
    pub fn new(initial: Option<Durations>) -> Self {
        Self {
            current: Mutex::new(initial),
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            config_path: None,
        }
    }

    /// Seed from the config file at `path` and write changes back to it.
    pub fn file_backed(path: PathBuf) -> Result<Self> {
        let config = Config::load_from(&path)?;
        let mut store = Self::new(Some(config.durations));
        store.config_path = Some(path);
        Ok(store)
    }

    pub fn set_work(&self, secs: u32) -> Result<()> {
        self.set(DurationField::Work, secs)
    }

    pub fn set_short_break(&self, secs: u32) -> Result<()> {
        self.set(DurationField::ShortBreak, secs)
    }

    /// Update one field, persist it, then notify observers if it changed.
    ///
    /// The in-memory value only moves once the write-through succeeded.
    pub fn set(&self, field: DurationField, secs: u32) -> Result<()> {
        let previous = {
            let mut current = lock(&self.current);
            let previous = *current;
            let updated = previous.unwrap_or_default().with(field, secs);
            if let Some(path) = &self.config_path {
                let mut config = Config::load_from(path)?;
                config.durations = updated;
                config.save_to(path)?;
            }
            *current = Some(updated);
            previous
        };

        if previous.map(|d| d.get(field)) == Some(secs) {
            return Ok(());
        }
        tracing::debug!(field = field.key(), secs, "durations changed");

        let observers: Vec<_> = lock(&self.observers)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(field, secs);
        }
        Ok(())
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }
}

impl DurationStore for ObservableDurations {
    fn current_durations(&self) -> Option<Durations> {
        *lock(&self.current)
    }

    fn on_durations_changed(&self, observer: DurationObserver) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.observers).push((id, Arc::from(observer)));
        id
    }

    fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
