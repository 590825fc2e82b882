//! Session store: one persisted lifecycle record per spawn attempt.
//!
//! Atomic-write idiom (temp file + `fs::rename` within the same directory)
//! lifted directly from `worker/store.rs`'s `atomic_write` — rename(2) is
//! atomic on POSIX so a reader never observes a partial write.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub name: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub command: Vec<String>,
    pub workspace_path: String,
    pub status: SessionStatus,
    pub error: Option<String>,
    pub start_commit_sha: Option<String>,
    pub end_commit_sha: Option<String>,
}

impl SessionState {
    pub fn new_running(name: impl Into<String>, command: Vec<String>, workspace_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_time: now_iso8601(),
            end_time: None,
            command,
            workspace_path: workspace_path.into(),
            status: SessionStatus::Running,
            error: None,
            start_commit_sha: None,
            end_commit_sha: None,
        }
    }

    pub fn finish_ok(&mut self, end_commit_sha: Option<String>) {
        self.status = SessionStatus::Completed;
        self.end_time = Some(now_iso8601());
        self.end_commit_sha = end_commit_sha;
    }

    pub fn finish_err(&mut self, error: impl Into<String>) {
        self.status = SessionStatus::Error;
        self.end_time = Some(now_iso8601());
        self.error = Some(error.into());
    }
}

pub fn now_iso8601() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub trait SessionStore {
    fn save(&self, session: &SessionState) -> Result<()>;
    /// `Err(Error::NotFound(_))` when no record exists for `name`.
    fn load(&self, name: &str) -> Result<SessionState>;
}

pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(content.as_bytes())?;
    f.sync_all()?;
    fs::rename(&tmp, path)
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &SessionState) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Other(anyhow::anyhow!("failed to create session dir: {e}")))?;
        let path = self.path_for(&session.name);
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| Error::Other(anyhow::anyhow!("failed to serialize session: {e}")))?;
        atomic_write(&path, &json)
            .map_err(|e| Error::Other(anyhow::anyhow!("failed to write session {}: {e}", session.name)))?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<SessionState> {
        let path = self.path_for(name);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Error::Other(anyhow::anyhow!("corrupt session {name}: {e}"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            Err(e) => Err(Error::Other(anyhow::anyhow!("failed to read session {name}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path());
        let session = SessionState::new_running("A", vec!["agent".into()], "/tmp/ws");
        store.save(&session).unwrap();
        let loaded = store.load("A").unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn load_missing_returns_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path());
        assert!(matches!(store.load("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn save_overwrites_existing() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path());
        let mut session = SessionState::new_running("A", vec![], "/tmp/ws");
        store.save(&session).unwrap();
        session.finish_ok(Some("deadbeef".into()));
        store.save(&session).unwrap();
        let loaded = store.load("A").unwrap();
        assert_eq!(loaded.status, SessionStatus::Completed);
        assert_eq!(loaded.end_commit_sha.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn finish_err_sets_error_and_status() {
        let mut session = SessionState::new_running("A", vec![], "/tmp/ws");
        session.finish_err("boom");
        assert_eq!(session.status, SessionStatus::Error);
        assert_eq!(session.error.as_deref(), Some("boom"));
        assert!(session.end_time.is_some());
    }
}
