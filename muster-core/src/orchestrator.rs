//! Orchestrator loop: the process that ties a tracker, a dependency-aware
//! poller, and a spawner together into a periodic tick — poll the tracker,
//! compute the ready set, dispatch each ready item to the spawner, sleep,
//! repeat — with a startup banner, per-tick logging, and a sentinel-file
//! `DrainSignal` for graceful shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::poller::Poller;
use crate::spawner::Spawner;
use crate::tracker::TrackerAdapter;

/// Object-safe aliases for CLI code that picks the concrete adapter/spawner
/// at runtime from configuration rather than at compile time.
pub type DynTracker = dyn TrackerAdapter + Send + Sync;
pub type DynSpawner = dyn Spawner + Send + Sync;

/// Sentinel-file drain signal at `<state_dir>/drain`. A bash-compatible
/// protocol: presence of the file means "finish in-flight work, stop
/// picking up new items."
pub struct DrainSignal(PathBuf);

impl DrainSignal {
    pub fn new(state_dir: &Path) -> Self {
        Self(state_dir.join("drain"))
    }

    pub fn is_set(&self) -> bool {
        self.0.exists()
    }

    pub fn set(&self) -> std::io::Result<()> {
        if let Some(parent) = self.0.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.0, "")
    }

    pub fn clear(&self) -> std::io::Result<()> {
        if self.0.exists() {
            std::fs::remove_file(&self.0)?;
        }
        Ok(())
    }
}

pub struct OrchestratorLoop<T: ?Sized, Sp: ?Sized> {
    tracker: Arc<T>,
    spawner: Arc<Sp>,
    query: String,
    poll_interval: Duration,
    drain: DrainSignal,
    tracker_kind: String,
    spawner_kind: String,
    once: bool,
}

impl<T, Sp> OrchestratorLoop<T, Sp>
where
    T: TrackerAdapter + ?Sized + Send + Sync + 'static,
    Sp: Spawner + ?Sized + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tracker: Arc<T>,
        spawner: Arc<Sp>,
        query: impl Into<String>,
        poll_interval: Duration,
        state_dir: &Path,
        tracker_kind: impl Into<String>,
        spawner_kind: impl Into<String>,
        once: bool,
    ) -> Self {
        Self {
            tracker,
            spawner,
            query: query.into(),
            poll_interval,
            drain: DrainSignal::new(state_dir),
            tracker_kind: tracker_kind.into(),
            spawner_kind: spawner_kind.into(),
            once,
        }
    }

    pub fn drain_signal(&self) -> &DrainSignal {
        &self.drain
    }

    /// Run until the drain signal is set (or, in `once` mode, after the
    /// first tick regardless of whether it found work).
    pub fn run(&self) -> Result<()> {
        println!("muster orchestrator v{}", env!("CARGO_PKG_VERSION"));
        println!("Tracker: {}", self.tracker_kind);
        println!("Spawner: {}", self.spawner_kind);
        println!("Poll interval: {}s", self.poll_interval.as_secs());
        println!(
            "Started: {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!();

        loop {
            if self.drain.is_set() {
                println!("[{}] drain signal detected, stopping", timestamp());
                break;
            }

            match self.tick() {
                Ok(dispatched) => {
                    if dispatched == 0 {
                        println!("[{}] no ready items this tick", timestamp());
                    }
                }
                Err(e) => {
                    eprintln!("[{}] poll failed, skipping tick: {e}", timestamp());
                }
            }

            if self.once {
                println!("[{}] once: exiting after single tick", timestamp());
                break;
            }

            std::thread::sleep(self.poll_interval);
        }

        Ok(())
    }

    /// One poll-and-dispatch cycle. Returns the number of items dispatched.
    /// Blocks until every dispatched item's `spawn` call has returned — this
    /// is the synchronous part of shutdown draining; the worker or Job each
    /// spawn launches is not waited on.
    fn tick(&self) -> Result<usize> {
        let poller = Poller::new(self.tracker.as_ref(), &self.query);
        let items = poller.poll()?;

        let handles: Vec<_> = items
            .iter()
            .map(|item| {
                let tracker = Arc::clone(&self.tracker);
                let spawner = Arc::clone(&self.spawner);
                let id = item.id.clone();
                let item = item.clone();
                std::thread::spawn(move || {
                    if let Err(e) = spawner.spawn(&item) {
                        eprintln!("[{}] spawn failed for {id}: {e}", timestamp());
                        let _ = tracker.update_status(&id, "Failed", Some(&e.to_string()));
                    }
                })
            })
            .collect();

        let count = handles.len();
        for h in handles {
            let _ = h.join();
        }

        Ok(count)
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}
