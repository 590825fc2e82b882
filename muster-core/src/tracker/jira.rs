//! Rich-tracker (Jira-shaped) adapter.
//!
//! Basic-auth HTTP against the REST search/issue/transitions endpoints.
//! Uses `reqwest`'s `blocking` feature (paired with `json`) to keep this
//! adapter synchronous, matching the rest of the crate's
//! `std::thread`-based concurrency model.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{IssueLink, StatusCategory, Ticket};

use super::TrackerAdapter;

const DEFAULT_QUERY: &str = "statusCategory != Done ORDER BY created ASC";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct JiraAdapter {
    base_url: String,
    user: String,
    token: String,
    project_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl JiraAdapter {
    pub fn new(base_url: impl Into<String>, user: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            token: token.into(),
            project_key: None,
            client,
        })
    }

    pub fn with_project_key(mut self, project_key: impl Into<String>) -> Self {
        self.project_key = Some(project_key.into());
        self
    }

    fn request_error(resp: reqwest::blocking::Response) -> Error {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        let prefix: String = body.chars().take(200).collect();
        Error::Tracker(format!("jira request failed: {status} {prefix}"))
    }

    fn parse_ticket(&self, raw: &Value) -> Ticket {
        let id = raw
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let fields = raw.get("fields").cloned().unwrap_or(Value::Null);

        let summary = fields
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let description = fields
            .get("description")
            .map(parse_document)
            .unwrap_or_default();

        let labels: HashSet<String> = fields
            .get("labels")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let status = fields
            .get("status")
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let status_category = fields
            .get("status")
            .and_then(|s| s.get("statusCategory"))
            .and_then(|c| c.get("key"))
            .and_then(Value::as_str)
            .map(category_from_key)
            .unwrap_or(StatusCategory::Todo);

        let issue_links = fields
            .get("issuelinks")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(parse_link).collect())
            .unwrap_or_default();

        let parent_key = fields
            .get("parent")
            .and_then(|p| p.get("key"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ticket {
            id,
            summary,
            description,
            labels,
            status,
            status_category,
            issue_links,
            parent_key,
        }
    }
}

fn category_from_key(key: &str) -> StatusCategory {
    match key {
        "done" => StatusCategory::Done,
        "indeterminate" => StatusCategory::InProgress,
        _ => StatusCategory::Todo,
    }
}

fn parse_link(raw: &Value) -> Option<IssueLink> {
    if let Some(inward) = raw.get("inwardIssue") {
        let relation = raw
            .get("type")
            .and_then(|t| t.get("inward"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let other_key = inward.get("key").and_then(Value::as_str)?.to_string();
        let other_status = inward
            .get("fields")
            .and_then(|f| f.get("status"))
            .and_then(|s| s.get("statusCategory"))
            .and_then(|c| c.get("key"))
            .and_then(Value::as_str)
            .map(category_from_key);
        return Some(IssueLink {
            relation,
            other_key,
            other_status,
        });
    }
    if let Some(outward) = raw.get("outwardIssue") {
        let relation = raw
            .get("type")
            .and_then(|t| t.get("outward"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let other_key = outward.get("key").and_then(Value::as_str)?.to_string();
        let other_status = outward
            .get("fields")
            .and_then(|f| f.get("status"))
            .and_then(|s| s.get("statusCategory"))
            .and_then(|c| c.get("key"))
            .and_then(Value::as_str)
            .map(category_from_key);
        return Some(IssueLink {
            relation,
            other_key,
            other_status,
        });
    }
    None
}

/// Recursively flatten a nested Atlassian-document-shaped description into
/// plain text. Text nodes append literally; paragraph nodes append a
/// newline after their children. Pure function of the input — same `Value`
/// always yields the same string, byte for byte.
pub fn parse_document(doc: &Value) -> String {
    let mut out = String::new();
    walk_document(doc, &mut out);
    out
}

fn walk_document(node: &Value, out: &mut String) {
    // Plain string descriptions (older Jira / non-ADF payloads) pass through.
    if let Some(s) = node.as_str() {
        out.push_str(s);
        return;
    }

    let node_type = node.get("type").and_then(Value::as_str);
    if node_type == Some("text") {
        if let Some(text) = node.get("text").and_then(Value::as_str) {
            out.push_str(text);
        }
        return;
    }

    if let Some(content) = node.get("content").and_then(Value::as_array) {
        for child in content {
            walk_document(child, out);
        }
    }

    if node_type == Some("paragraph") {
        out.push('\n');
    }
}

impl TrackerAdapter for JiraAdapter {
    fn search(&self, query: &str) -> Result<Vec<Ticket>> {
        let jql = if query.is_empty() { DEFAULT_QUERY } else { query };
        let resp = self
            .client
            .get(format!("{}/rest/api/2/search", self.base_url))
            .basic_auth(&self.user, Some(&self.token))
            .query(&[("jql", jql), ("fields", "summary,description,labels,status,issuelinks,parent")])
            .send()
            .map_err(|e| Error::Tracker(format!("search request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Self::request_error(resp));
        }

        let body: Value = resp
            .json()
            .map_err(|e| Error::Tracker(format!("invalid search response: {e}")))?;

        let issues = body
            .get("issues")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(issues.iter().map(|raw| self.parse_ticket(raw)).collect())
    }

    fn get_blockers(&self, ticket: &Ticket) -> Result<Vec<String>> {
        Ok(ticket
            .blockers()
            .into_iter()
            .map(|key| {
                let status = ticket
                    .issue_links
                    .iter()
                    .find(|l| l.other_key == key)
                    .and_then(|l| l.other_status)
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_else(|| "Unknown".to_string());
                format!("{key} ({status})")
            })
            .collect())
    }

    fn parse_description(&self, ticket: &Ticket) -> String {
        ticket.description.clone()
    }

    fn update_status(&self, id: &str, target: &str, comment: Option<&str>) -> Result<()> {
        let transitions_resp = self
            .client
            .get(format!("{}/rest/api/2/issue/{id}/transitions", self.base_url))
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .map_err(|e| Error::Tracker(format!("transitions request failed: {e}")))?;

        if !transitions_resp.status().is_success() {
            return Err(Self::request_error(transitions_resp));
        }

        let body: Value = transitions_resp
            .json()
            .map_err(|e| Error::Tracker(format!("invalid transitions response: {e}")))?;

        let transitions = body
            .get("transitions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let matched = transitions.iter().find(|t| {
            let tid = t.get("id").and_then(Value::as_str).unwrap_or_default();
            let name = t
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            tid == target || name.eq_ignore_ascii_case(target)
        });

        // A failed match still needs the comment attempted below, so the
        // failure is captured rather than returned immediately.
        let transition_error = match matched {
            Some(matched) => {
                let transition_id = matched.get("id").and_then(Value::as_str).unwrap_or_default();
                let resp = self
                    .client
                    .post(format!("{}/rest/api/2/issue/{id}/transitions", self.base_url))
                    .basic_auth(&self.user, Some(&self.token))
                    .json(&serde_json::json!({ "transition": { "id": transition_id } }))
                    .send()
                    .map_err(|e| Error::Tracker(format!("transition post failed: {e}")))?;
                if resp.status().is_success() {
                    None
                } else {
                    Some(Self::request_error(resp))
                }
            }
            None => Some(Error::Tracker(format!(
                "no transition matching '{target}' for {id}"
            ))),
        };

        if let Some(text) = comment {
            let comment_resp = self
                .client
                .post(format!("{}/rest/api/2/issue/{id}/comment", self.base_url))
                .basic_auth(&self.user, Some(&self.token))
                .json(&serde_json::json!({ "body": text }))
                .send()
                .map_err(|e| Error::Tracker(format!("comment post failed: {e}")))?;
            if !comment_resp.status().is_success() {
                return Err(Self::request_error(comment_resp));
            }
        }

        match transition_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn add_link(&self, inward: &str, outward: &str, relation: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/rest/api/2/issueLink", self.base_url))
            .basic_auth(&self.user, Some(&self.token))
            .json(&serde_json::json!({
                "type": { "name": relation },
                "inwardIssue": { "key": inward },
                "outwardIssue": { "key": outward },
            }))
            .send()
            .map_err(|e| Error::Tracker(format!("add_link request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Self::request_error(resp));
        }
        Ok(())
    }

    fn create_ticket(&self, summary: &str, description: &str) -> Result<String> {
        let project_key = self
            .project_key
            .as_deref()
            .ok_or_else(|| Error::Config("tracker.projectKey is required to create tickets".into()))?;
        let resp = self
            .client
            .post(format!("{}/rest/api/2/issue", self.base_url))
            .basic_auth(&self.user, Some(&self.token))
            .json(&serde_json::json!({
                "fields": {
                    "project": { "key": project_key },
                    "summary": summary,
                    "description": description,
                    "issuetype": { "name": "Task" },
                }
            }))
            .send()
            .map_err(|e| Error::Tracker(format!("create_ticket request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Self::request_error(resp));
        }
        let body: Value = resp
            .json()
            .map_err(|e| Error::Tracker(format!("invalid create response: {e}")))?;
        body.get("key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Tracker("create response missing key".into()))
    }

    fn create_child_ticket(&self, parent: &str, summary: &str, description: &str) -> Result<String> {
        let child = self.create_ticket(summary, description)?;
        self.add_link(parent, &child, "is parent of")?;
        Ok(child)
    }

    fn delete_ticket(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(format!("{}/rest/api/2/issue/{id}", self.base_url))
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .map_err(|e| Error::Tracker(format!("delete_ticket request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Self::request_error(resp));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_document_is_byte_stable() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "Please build."}]},
                {"type": "paragraph", "content": [{"type": "text", "text": "Repo: https://example.com/org/repo.git"}]},
            ]
        });
        let first = parse_document(&doc);
        let second = parse_document(&doc);
        assert_eq!(first, second);
        assert_eq!(first, "Please build.\nRepo: https://example.com/org/repo.git\n");
    }

    #[test]
    fn parse_document_handles_plain_string() {
        assert_eq!(parse_document(&json!("plain text")), "plain text");
    }

    #[test]
    fn parse_document_nested_text_appends_literally() {
        let doc = json!({
            "type": "paragraph",
            "content": [
                {"type": "text", "text": "a"},
                {"type": "text", "text": "b"},
            ]
        });
        assert_eq!(parse_document(&doc), "ab\n");
    }

    #[test]
    fn category_from_key_maps_known_values() {
        assert_eq!(category_from_key("done"), StatusCategory::Done);
        assert_eq!(category_from_key("indeterminate"), StatusCategory::InProgress);
        assert_eq!(category_from_key("new"), StatusCategory::Todo);
    }
}
