//! File spawner: a subprocess-free local variant for dry runs and tests.
//!
//! Claims like the other two variants, then writes the work item as JSON
//! into a directory instead of launching a container or a Job — no Docker,
//! no Kubernetes, no detached thread, so a `spawn` call here is fully
//! synchronous and its effect is observable the moment it returns.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::WorkItem;
use crate::naming::sanitize;
use crate::tracker::TrackerAdapter;

pub struct FileSpawner<T: ?Sized> {
    tracker: Arc<T>,
    out_dir: PathBuf,
}

impl<T> FileSpawner<T>
where
    T: TrackerAdapter + ?Sized + Send + Sync + 'static,
{
    pub fn new(tracker: Arc<T>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            tracker,
            out_dir: out_dir.into(),
        }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.out_dir.join(format!("{}.json", sanitize(id)))
    }
}

impl<T> super::Spawner for FileSpawner<T>
where
    T: TrackerAdapter + ?Sized + Send + Sync + 'static,
{
    fn spawn(&self, item: &WorkItem) -> Result<()> {
        let path = self.record_path(&item.id);
        if path.exists() {
            println!("[file] {} already recorded, no-op", item.id);
            return Ok(());
        }

        if let Err(e) = self.tracker.update_status(&item.id, "In Progress", None) {
            println!("[file] {} claim failed, skipping: {e}", item.id);
            return Ok(());
        }

        fs::create_dir_all(&self.out_dir)
            .map_err(|e| Error::Spawn(format!("failed to create spawn-record dir: {e}")))?;

        let payload = serde_json::json!({
            "id": item.id,
            "summary": item.summary,
            "repo_url": item.repo_url,
            "env_vars": item.env_vars,
        });
        fs::write(&path, serde_json::to_vec_pretty(&payload).unwrap())
            .map_err(|e| Error::Spawn(format!("failed to write spawn record: {e}")))?;

        if let Err(e) = self.tracker.update_status(&item.id, "Done", None) {
            println!("[file] {} recorded but status update failed: {e}", item.id);
        }
        println!("[file] recorded {}", item.id);
        Ok(())
    }
}
