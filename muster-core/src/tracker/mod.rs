//! Tracker adapter contract: one uniform surface over three backends.
//!
//! The orchestrator loop consumes only `search`/`get_blockers`/
//! `parse_description`/`update_status`; `add_link`/`create_ticket`/
//! `create_child_ticket`/`delete_ticket` exist for scenario generation and
//! are never called by the loop itself. Mirrors the small, capability-based
//! trait shape of `worker/ports.rs`'s `GitHubGateway`.

pub mod file_queue;
pub mod github;
pub mod jira;

use crate::error::Result;
use crate::model::Ticket;

pub trait TrackerAdapter {
    /// Search for tickets. An empty query uses the adapter's own default
    /// (for the rich tracker: "not-done, oldest-first").
    fn search(&self, query: &str) -> Result<Vec<Ticket>>;

    /// Blocker keys from not-yet-done "is blocked by" inward links, each
    /// rendered as `"<key> (<status>)"` for logging.
    fn get_blockers(&self, ticket: &Ticket) -> Result<Vec<String>>;

    /// Normalize the tracker's native document format into newline-
    /// separated plain text. Must be a pure function of `ticket`.
    fn parse_description(&self, ticket: &Ticket) -> String;

    /// Transition a ticket to `target` (matched by exact id or
    /// case-insensitive name) and optionally attach a comment. Must error
    /// loudly, never silently no-op, when `target` matches nothing.
    fn update_status(&self, id: &str, target: &str, comment: Option<&str>) -> Result<()>;

    fn add_link(&self, inward: &str, outward: &str, relation: &str) -> Result<()>;

    fn create_ticket(&self, summary: &str, description: &str) -> Result<String>;

    fn create_child_ticket(&self, parent: &str, summary: &str, description: &str) -> Result<String>;

    fn delete_ticket(&self, id: &str) -> Result<()>;
}

/// Parse a blocker-log entry of the form `"<key> (<status>)"` back into the
/// bare key, the way the poller's survivor re-check needs to.
pub fn blocker_key(rendered: &str) -> &str {
    rendered
        .split_once(" (")
        .map(|(key, _)| key)
        .unwrap_or(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocker_key_strips_status_suffix() {
        assert_eq!(blocker_key("PROJ-1 (In Progress)"), "PROJ-1");
    }

    #[test]
    fn blocker_key_passes_through_bare_key() {
        assert_eq!(blocker_key("PROJ-1"), "PROJ-1");
    }
}
