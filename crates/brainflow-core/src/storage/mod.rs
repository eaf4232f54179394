mod config;
pub mod database;
mod durations;
mod snapshot;

pub use config::{AlertsConfig, Config, NotificationsConfig, TimerConfig};
pub use database::Database;
pub use durations::{DurationObserver, DurationStore, ObservableDurations, ObserverId};
pub use snapshot::{MemorySnapshotStore, SnapshotStore};

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory, creating it if needed.
///
/// `BRAINFLOW_DATA_DIR` wins when set. Otherwise `~/.config/brainflow/`,
/// or `~/.config/brainflow-dev/` with `BRAINFLOW_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("BRAINFLOW_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("BRAINFLOW_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("brainflow-dev")
            } else {
                base_dir.join("brainflow")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
