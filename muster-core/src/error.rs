//! Crate-wide error taxonomy.
//!
//! Most fallible boundaries return `anyhow::Result`; this enum exists for
//! the handful of call sites that must match on *kind* rather than just
//! propagate — the orchestrator loop distinguishes fatal configuration
//! errors from tick-skippable tracker errors, and the session store
//! distinguishes not-found from any other load failure.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Fatal at startup — refuse to run.
    #[error("configuration error: {0}")]
    Config(String),

    /// A tracker call failed. Always treated as transient by the poller:
    /// the tick is skipped and the loop continues.
    #[error("tracker error: {0}")]
    Tracker(String),

    /// `SessionStore::load` found no record for the given name.
    #[error("not found: {0}")]
    NotFound(String),

    /// The dependency graph contains a cycle; `topo_sort` could not finish.
    #[error("dependency cycle detected, stopped after {processed} of {total} nodes")]
    Cycle { processed: usize, total: usize },

    /// A spawner failed to launch a workload.
    #[error("spawn error: {0}")]
    Spawn(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
