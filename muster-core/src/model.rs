//! Tracker- and orchestrator-level data types.
//!
//! `Ticket` is the adapter-level snapshot; `WorkItem` is what the poller
//! hands the orchestrator once a ticket has cleared the ready-set and
//! blocker checks.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Where a ticket sits in the tracker's own workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCategory {
    Todo,
    InProgress,
    Done,
}

impl StatusCategory {
    pub fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// One inward or outward relation from a ticket to another ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLink {
    /// e.g. "is blocked by", "blocks", "relates to".
    pub relation: String,
    /// The other ticket's identifier.
    pub other_key: String,
    /// The other ticket's status-category, if known at link-read time.
    pub other_status: Option<StatusCategory>,
}

/// An immutable snapshot of one tracker ticket, normalized at the adapter
/// boundary. No untyped tracker payload crosses past this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub summary: String,
    pub description: String,
    pub labels: HashSet<String>,
    pub status: String,
    pub status_category: StatusCategory,
    pub issue_links: Vec<IssueLink>,
    pub parent_key: Option<String>,
}

impl Ticket {
    /// Blocker keys from not-done "is blocked by" inward links.
    pub fn blockers(&self) -> Vec<&str> {
        self.issue_links
            .iter()
            .filter(|link| link.relation.eq_ignore_ascii_case("is blocked by"))
            .filter(|link| !matches!(link.other_status, Some(s) if s.is_done()))
            .map(|link| link.other_key.as_str())
            .collect()
    }
}

/// Well-known environment variable key the orchestrator always sets.
pub const ENV_ITEM_ID: &str = "RECAC_ITEM_ID";
/// Environment variable carrying the optional injected feature/criteria list.
pub const ENV_INJECTED_FEATURES: &str = "RECAC_INJECTED_FEATURES";
/// Environment variable carrying the tracker token, when one is propagated
/// to the worker — also the credential a spawner's git helper draws from.
pub const ENV_TRACKER_TOKEN: &str = "RECAC_TRACKER_TOKEN";

/// One unit of dispatchable work, derived from a `Ticket` once it is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub summary: String,
    pub description: String,
    pub repo_url: String,
    /// Ordered for deterministic command composition; see `shellquote`.
    pub env_vars: BTreeMap<String, String>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, summary: impl Into<String>, description: impl Into<String>, repo_url: impl Into<String>) -> Self {
        let id = id.into();
        let mut env_vars = BTreeMap::new();
        env_vars.insert(ENV_ITEM_ID.to_string(), id.clone());
        Self {
            id,
            summary: summary.into(),
            description: description.into(),
            repo_url: repo_url.into(),
            env_vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(links: Vec<IssueLink>) -> Ticket {
        Ticket {
            id: "A".into(),
            summary: "s".into(),
            description: "d".into(),
            labels: HashSet::new(),
            status: "Open".into(),
            status_category: StatusCategory::Todo,
            issue_links: links,
            parent_key: None,
        }
    }

    #[test]
    fn blockers_excludes_done() {
        let t = ticket(vec![
            IssueLink {
                relation: "is blocked by".into(),
                other_key: "B".into(),
                other_status: Some(StatusCategory::Done),
            },
            IssueLink {
                relation: "is blocked by".into(),
                other_key: "C".into(),
                other_status: Some(StatusCategory::Todo),
            },
        ]);
        assert_eq!(t.blockers(), vec!["C"]);
    }

    #[test]
    fn blockers_ignores_other_relations() {
        let t = ticket(vec![IssueLink {
            relation: "blocks".into(),
            other_key: "B".into(),
            other_status: Some(StatusCategory::Todo),
        }]);
        assert!(t.blockers().is_empty());
    }

    #[test]
    fn blockers_relation_case_insensitive() {
        let t = ticket(vec![IssueLink {
            relation: "Is Blocked By".into(),
            other_key: "B".into(),
            other_status: None,
        }]);
        assert_eq!(t.blockers(), vec!["B"]);
    }

    #[test]
    fn work_item_sets_id_env_var() {
        let w = WorkItem::new("PROJ-1", "s", "d", "https://example.com/r");
        assert_eq!(w.env_vars.get(ENV_ITEM_ID), Some(&"PROJ-1".to_string()));
    }
}
