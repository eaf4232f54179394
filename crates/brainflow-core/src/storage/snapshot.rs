use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Persistence for the single suspend timestamp.
pub trait SnapshotStore: Send + Sync {
    fn save_suspended_at(&self, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// `Ok(None)` means no suspension is on record.
    fn load_suspended_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn clear_suspended_at(&self) -> Result<(), StoreError>;
}

/// In-process store; the mark lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    suspended_at: Mutex<Option<DateTime<Utc>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save_suspended_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        *self
            .suspended_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
        Ok(())
    }

    fn load_suspended_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(*self
            .suspended_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn clear_suspended_at(&self) -> Result<(), StoreError> {
        self.suspended_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
