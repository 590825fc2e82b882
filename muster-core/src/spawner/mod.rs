//! Spawner contract: launch an isolated worker for one `WorkItem`.
//!
//! Three concrete realizations — `container` (local Docker), `cluster`
//! (Kubernetes Job), and `file` (dry-run record, no subprocess) — share the
//! same env-variable de-duplication rule: explicit item `EnvVars` first,
//! then host-propagated vars, then provider/model hints, with later
//! duplicate names silently dropped.

pub mod cluster;
pub mod container;
pub mod file;

use crate::error::Result;
use crate::model::WorkItem;

pub trait Spawner {
    /// Launch a worker for `item`. Must, as its first externally visible
    /// act, claim the item via the tracker (transition to "In Progress" or
    /// equivalent) so at-most-once dispatch holds across ticks.
    fn spawn(&self, item: &WorkItem) -> Result<()>;
}

/// Merge environment sources in priority order — item `env_vars` first,
/// then `host_env`, then `extra` (provider/model hints) — keeping only the
/// first occurrence of each name.
pub fn merge_env<'a>(
    item_env: impl IntoIterator<Item = (&'a str, &'a str)>,
    host_env: impl IntoIterator<Item = (&'a str, &'a str)>,
    extra: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (k, v) in item_env.into_iter().chain(host_env).chain(extra) {
        if seen.insert(k.to_string()) {
            out.push((k.to_string(), v.to_string()));
        }
    }
    out
}
