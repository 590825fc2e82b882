//! Poller: combines a tracker adapter and a dependency graph into the set
//! of `WorkItem`s that are ready to dispatch right now.
//!
//! Pure with respect to the tracker — no mutations happen here (the
//! file-queue adapter's processed-file rename is the one adapter-level
//! exception, and it lives entirely inside `search`). Mirrors the
//! pure-plan shape of `worker/cycle.rs`'s `plan_cycle`, and the per-tick
//! logging texture of `worker/poll.rs`'s `run_worker_loop`.

use std::collections::HashSet;

use serde_json::json;

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::markers::{extract_feature_bullets, extract_repo_url};
use crate::model::{WorkItem, ENV_INJECTED_FEATURES};
use crate::tracker::{blocker_key, TrackerAdapter};

pub struct Poller<'a, T: TrackerAdapter + ?Sized> {
    adapter: &'a T,
    query: String,
}

impl<'a, T: TrackerAdapter + ?Sized> Poller<'a, T> {
    pub fn new(adapter: &'a T, query: impl Into<String>) -> Self {
        Self {
            adapter,
            query: query.into(),
        }
    }

    /// Run one poll cycle: search, build graph, ready(∅), external-blocker
    /// re-check, repo/feature extraction.
    pub fn poll(&self) -> Result<Vec<WorkItem>> {
        let tickets = self.adapter.search(&self.query)?;
        if tickets.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = tickets.iter().map(|t| t.id.as_str()).collect();
        let by_id: std::collections::HashMap<&str, &crate::model::Ticket> =
            tickets.iter().map(|t| (t.id.as_str(), t)).collect();

        let graph = DependencyGraph::build(ids.iter().copied(), |id| {
            let ticket = by_id[id];
            self.adapter
                .get_blockers(ticket)
                .unwrap_or_default()
                .iter()
                .map(|rendered| blocker_key(rendered).to_string())
                .collect()
        });

        let ready_ids = graph.ready(&HashSet::new());
        println!("[poller] {} ticket(s), {} ready", tickets.len(), ready_ids.len());

        let mut items = Vec::new();
        for id in ready_ids {
            let ticket = by_id[id.as_str()];

            // External-blocker safety net: re-check live blockers even
            // though the graph dropped anything outside the node set.
            let remaining = self.adapter.get_blockers(ticket).unwrap_or_default();
            if !remaining.is_empty() {
                println!("[poller] {id} skipped: external blocker(s) {remaining:?}");
                continue;
            }

            let description = self.adapter.parse_description(ticket);
            let repo_url = extract_repo_url(&description);
            if repo_url.is_empty() {
                println!("[poller] {id} skipped: no Repo: marker in description");
                continue;
            }

            let mut item = WorkItem::new(ticket.id.clone(), ticket.summary.clone(), description.clone(), repo_url);

            let bullets = extract_feature_bullets(&description);
            if !bullets.is_empty() {
                item.env_vars
                    .insert(ENV_INJECTED_FEATURES.to_string(), json!(bullets).to_string());
            }

            items.push(item);
        }

        Ok(items)
    }
}
