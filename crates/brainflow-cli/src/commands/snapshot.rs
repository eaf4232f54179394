use brainflow_core::recovery::elapsed_secs;
use brainflow_core::{Database, SnapshotStore};
use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

#[derive(Subcommand)]
pub enum SnapshotAction {
    /// Print the suspend mark as JSON
    Status,
    /// Remove the suspend mark
    Clear,
}

pub fn run(action: SnapshotAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        SnapshotAction::Status => {
            let status = match db.load_suspended_at()? {
                Some(at) => json!({
                    "suspended": true,
                    "suspended_at": at.to_rfc3339(),
                    "elapsed_secs": elapsed_secs(at, Utc::now()),
                }),
                None => json!({ "suspended": false }),
            };
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        SnapshotAction::Clear => {
            db.clear_suspended_at()?;
            println!("ok");
        }
    }
    Ok(())
}
