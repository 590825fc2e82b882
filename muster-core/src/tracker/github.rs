//! Label-tracker (GitHub-shaped) adapter.
//!
//! Shells the `gh` CLI via `std::process::Command` rather than hitting the
//! GitHub API directly — no HTTP client, no token handling in-process, auth
//! is whatever `gh auth` already has configured on the host.

use std::collections::HashSet;
use std::process::{Command, Stdio};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{IssueLink, StatusCategory, Ticket};

use super::TrackerAdapter;

const ID_PREFIX: &str = "gh-";

pub struct GithubAdapter {
    repo: String,
    ready_label: String,
}

impl GithubAdapter {
    pub fn new(repo: impl Into<String>, ready_label: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            ready_label: ready_label.into(),
        }
    }

    fn gh_output(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("gh")
            .args(args)
            .arg("--repo")
            .arg(&self.repo)
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::Tracker(format!("failed to spawn gh: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let prefix: String = stderr.chars().take(200).collect();
            return Err(Error::Tracker(format!(
                "gh {args:?} failed: {} {prefix}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn bare_number(id: &str) -> Result<&str> {
        id.strip_prefix(ID_PREFIX)
            .ok_or_else(|| Error::Tracker(format!("not a github id: {id}")))
    }
}

fn parse_issue(raw: &Value) -> Option<Ticket> {
    let number = raw.get("number").and_then(Value::as_i64)?;
    let id = format!("{ID_PREFIX}{number}");
    let summary = raw.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
    let description = raw.get("body").and_then(Value::as_str).unwrap_or_default().to_string();
    let labels: HashSet<String> = raw
        .get("labels")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|l| l.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let state = raw.get("state").and_then(Value::as_str).unwrap_or("OPEN");
    let status_category = if state.eq_ignore_ascii_case("closed") {
        StatusCategory::Done
    } else {
        StatusCategory::Todo
    };

    let issue_links = raw
        .get("body")
        .and_then(Value::as_str)
        .map(parse_blocked_by_mentions)
        .unwrap_or_default();

    Some(Ticket {
        id,
        summary,
        description,
        labels,
        status: state.to_string(),
        status_category,
        issue_links,
        parent_key: None,
    })
}

/// GitHub has no native issue-link graph; blockers are expressed in the body
/// as `Blocked by #N` lines. We treat an unresolved reference as "not done"
/// since a fresh body scan has no live status for the referenced issue —
/// the poller's external-blocker re-check is what actually resolves this.
fn parse_blocked_by_mentions(body: &str) -> Vec<IssueLink> {
    body.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let lower = trimmed.to_lowercase();
            let rest = lower.strip_prefix("blocked by")?;
            let number: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
            if number.is_empty() {
                return None;
            }
            Some(IssueLink {
                relation: "is blocked by".to_string(),
                other_key: format!("{ID_PREFIX}{number}"),
                other_status: None,
            })
        })
        .collect()
}

fn is_done_class(status: &str) -> bool {
    status.eq_ignore_ascii_case("Done") || status.eq_ignore_ascii_case("Closed")
}

impl TrackerAdapter for GithubAdapter {
    fn search(&self, query: &str) -> Result<Vec<Ticket>> {
        let mut args = vec!["issue", "list", "--state", "open", "--json", "number,title,body,labels,state"];
        if !query.is_empty() {
            args.push("--search");
            args.push(query);
        } else {
            args.push("--label");
            args.push(&self.ready_label);
        }
        let out = self.gh_output(&args)?;
        let raw: Value = serde_json::from_str(&out)
            .map_err(|e| Error::Tracker(format!("invalid gh issue list response: {e}")))?;
        let issues = raw.as_array().cloned().unwrap_or_default();
        Ok(issues.iter().filter_map(parse_issue).collect())
    }

    fn get_blockers(&self, ticket: &Ticket) -> Result<Vec<String>> {
        Ok(ticket
            .blockers()
            .into_iter()
            .map(|key| format!("{key} (unknown)"))
            .collect())
    }

    fn parse_description(&self, ticket: &Ticket) -> String {
        ticket.description.clone()
    }

    fn update_status(&self, id: &str, target: &str, comment: Option<&str>) -> Result<()> {
        let number = Self::bare_number(id)?;

        if is_done_class(target) {
            let mut args = vec!["issue", "close", number];
            if let Some(text) = comment {
                args.push("--comment");
                args.push(text);
            }
            self.gh_output(&args)?;
            return Ok(());
        }

        if target.trim().is_empty() {
            return Err(Error::Tracker(format!("empty target status for {id}")));
        }

        if let Some(text) = comment {
            self.gh_output(&["issue", "comment", number, "--body", text])?;
        }
        self.gh_output(&["issue", "edit", number, "--add-label", target])?;
        Ok(())
    }

    fn add_link(&self, inward: &str, _outward: &str, relation: &str) -> Result<()> {
        let number = Self::bare_number(inward)?;
        let note = format!("{relation}");
        self.gh_output(&["issue", "comment", number, "--body", &note])?;
        Ok(())
    }

    fn create_ticket(&self, summary: &str, description: &str) -> Result<String> {
        let out = self.gh_output(&["issue", "create", "--title", summary, "--body", description])?;
        let number = out
            .trim()
            .rsplit('/')
            .next()
            .ok_or_else(|| Error::Tracker("could not parse issue number from gh output".into()))?;
        Ok(format!("{ID_PREFIX}{number}"))
    }

    fn create_child_ticket(&self, parent: &str, summary: &str, description: &str) -> Result<String> {
        let body = format!("{description}\n\nBlocked by {parent}");
        self.create_ticket(summary, &body)
    }

    fn delete_ticket(&self, id: &str) -> Result<()> {
        let number = Self::bare_number(id)?;
        self.gh_output(&["issue", "delete", number, "--yes"])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_strips_prefix() {
        assert_eq!(GithubAdapter::bare_number("gh-42").unwrap(), "42");
    }

    #[test]
    fn bare_number_rejects_non_github_id() {
        assert!(GithubAdapter::bare_number("PROJ-1").is_err());
    }

    #[test]
    fn is_done_class_matches_case_insensitively() {
        assert!(is_done_class("done"));
        assert!(is_done_class("CLOSED"));
        assert!(!is_done_class("In Progress"));
    }

    #[test]
    fn parse_blocked_by_mentions_extracts_number() {
        let links = parse_blocked_by_mentions("Work item.\nBlocked by #17\nmore text");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].other_key, "gh-17");
        assert_eq!(links[0].relation, "is blocked by");
    }

    #[test]
    fn parse_issue_prefixes_id() {
        let raw = serde_json::json!({
            "number": 5,
            "title": "t",
            "body": "b",
            "labels": [],
            "state": "OPEN",
        });
        let ticket = parse_issue(&raw).unwrap();
        assert_eq!(ticket.id, "gh-5");
        assert_eq!(ticket.status_category, StatusCategory::Todo);
    }

    #[test]
    fn parse_issue_closed_state_is_done() {
        let raw = serde_json::json!({
            "number": 5, "title": "t", "body": "", "labels": [], "state": "CLOSED",
        });
        let ticket = parse_issue(&raw).unwrap();
        assert_eq!(ticket.status_category, StatusCategory::Done);
    }
}
