//! File-queue adapter: an on-disk JSON directory acting as the tracker.
//!
//! Each `*.json` file in the watched directory is one ticket. A successful
//! read atomically renames the file into a `processed/` subdirectory (the
//! same atomic-rename idiom as `worker/store.rs`'s `atomic_write`), which is
//! this adapter's claim mechanism: the file is gone from the next `search`.
//! Read failures leave the file in place so the next tick retries it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{IssueLink, StatusCategory, Ticket};

use super::TrackerAdapter;

#[derive(Debug, Deserialize)]
struct QueueFile {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    blocked_by: Vec<String>,
}

pub struct FileQueueAdapter {
    dir: PathBuf,
}

impl FileQueueAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn processed_dir(&self) -> PathBuf {
        self.dir.join("processed")
    }

    fn log_path(&self) -> PathBuf {
        self.dir.join("status.log")
    }
}

impl TrackerAdapter for FileQueueAdapter {
    fn search(&self, _query: &str) -> Result<Vec<Ticket>> {
        let processed_dir = self.processed_dir();
        fs::create_dir_all(&processed_dir)
            .map_err(|e| Error::Tracker(format!("failed to create processed dir: {e}")))?;

        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) => return Err(Error::Tracker(format!("failed to read queue dir: {e}"))),
        };

        let mut tickets = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if !path.is_file() {
                continue;
            }

            match read_ticket(&path) {
                Ok(ticket) => {
                    let dest = processed_dir.join(path.file_name().unwrap());
                    if let Err(e) = fs::rename(&path, &dest) {
                        // Could not claim the file — leave it for retry, but
                        // still surface it this tick since we already read it.
                        eprintln!("[file-queue] warning: failed to move {path:?} to processed/: {e}");
                    }
                    tickets.push(ticket);
                }
                Err(e) => {
                    eprintln!("[file-queue] warning: skipping unreadable {path:?}: {e}");
                    // Left in place; retried next tick.
                }
            }
        }

        tickets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tickets)
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
        if target.trim().is_empty() {
            return Err(Error::Tracker(format!("empty target status for {id}")));
        }
        let line = match comment {
            Some(c) => format!("{id} -> {target}: {c}\n"),
            None => format!("{id} -> {target}\n"),
        };
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .map_err(|e| Error::Tracker(format!("failed to open status log: {e}")))?;
        file.write_all(line.as_bytes())
            .map_err(|e| Error::Tracker(format!("failed to write status log: {e}")))?;
        Ok(())
    }

    fn add_link(&self, _inward: &str, _outward: &str, _relation: &str) -> Result<()> {
        Err(Error::Tracker("file-queue adapter does not support links".into()))
    }

    fn create_ticket(&self, summary: &str, description: &str) -> Result<String> {
        let id = format!("file-{}", uid_from_summary(summary));
        let path = self.dir.join(format!("{id}.json"));
        let payload = serde_json::json!({
            "id": id,
            "summary": summary,
            "description": description,
            "blocked_by": [],
        });
        fs::write(&path, serde_json::to_vec_pretty(&payload).unwrap())
            .map_err(|e| Error::Tracker(format!("failed to write queue file: {e}")))?;
        Ok(id)
    }

    fn create_child_ticket(&self, parent: &str, summary: &str, description: &str) -> Result<String> {
        let id = format!("file-{}", uid_from_summary(summary));
        let path = self.dir.join(format!("{id}.json"));
        let payload = serde_json::json!({
            "id": id,
            "summary": summary,
            "description": description,
            "blocked_by": [parent],
        });
        fs::write(&path, serde_json::to_vec_pretty(&payload).unwrap())
            .map_err(|e| Error::Tracker(format!("failed to write queue file: {e}")))?;
        Ok(id)
    }

    fn delete_ticket(&self, id: &str) -> Result<()> {
        let path = self.dir.join(format!("{id}.json"));
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Tracker(format!("failed to delete queue file: {e}"))),
        }
    }
}

fn uid_from_summary(summary: &str) -> String {
    crate::naming::sanitize(summary)
        .chars()
        .take(24)
        .collect()
}

fn read_ticket(path: &Path) -> Result<Ticket> {
    let contents = fs::read_to_string(path).map_err(|e| Error::Tracker(e.to_string()))?;
    let queue_file: QueueFile =
        serde_json::from_str(&contents).map_err(|e| Error::Tracker(e.to_string()))?;
    if queue_file.id.trim().is_empty() {
        return Err(Error::Tracker("queue file missing id".into()));
    }

    let issue_links: Vec<IssueLink> = queue_file
        .blocked_by
        .into_iter()
        .map(|other_key| IssueLink {
            relation: "is blocked by".to_string(),
            other_key,
            other_status: None,
        })
        .collect();

    Ok(Ticket {
        id: queue_file.id,
        summary: queue_file.summary,
        description: queue_file.description,
        labels: HashSet::new(),
        status: "queued".to_string(),
        status_category: StatusCategory::Todo,
        issue_links,
        parent_key: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn search_reads_and_moves_to_processed() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "a.json",
            r#"{"id": "file-a", "summary": "s", "description": "Repo: https://x/y"}"#,
        );
        let adapter = FileQueueAdapter::new(tmp.path());

        let tickets = adapter.search("").unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].id, "file-a");
        assert!(!tmp.path().join("a.json").exists());
        assert!(tmp.path().join("processed").join("a.json").exists());
    }

    #[test]
    fn search_is_idempotent_after_processing() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.json", r#"{"id": "file-a", "summary": "s"}"#);
        let adapter = FileQueueAdapter::new(tmp.path());

        adapter.search("").unwrap();
        let second = adapter.search("").unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn search_leaves_unreadable_file_in_place() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "bad.json", "not json");
        let adapter = FileQueueAdapter::new(tmp.path());

        let tickets = adapter.search("").unwrap();
        assert!(tickets.is_empty());
        assert!(tmp.path().join("bad.json").exists());
    }

    #[test]
    fn update_status_rejects_empty_target() {
        let tmp = TempDir::new().unwrap();
        let adapter = FileQueueAdapter::new(tmp.path());
        assert!(adapter.update_status("file-a", "", None).is_err());
    }

    #[test]
    fn update_status_appends_log_line() {
        let tmp = TempDir::new().unwrap();
        let adapter = FileQueueAdapter::new(tmp.path());
        adapter.update_status("file-a", "Done", Some("ok")).unwrap();
        let log = fs::read_to_string(tmp.path().join("status.log")).unwrap();
        assert!(log.contains("file-a -> Done: ok"));
    }
}
