//! Runtime configuration for the orchestrator.
//!
//! Resolution order: **env var > config file (`<state_dir>/config`,
//! `key=value`) > hardcoded default**. Credentials follow the identical
//! chain and are never logged.
//!
//! ```text
//! Field                     Env Var                    Config Key            Default
//! ───────────────────────── ────────────────────────── ───────────────────── ───────────
//! tracker.kind              RECAC_TRACKER_KIND          tracker_kind          "file"
//! tracker.url               RECAC_TRACKER_URL           tracker_url           —
//! tracker.user              RECAC_TRACKER_USER          tracker_user          —
//! tracker.token             RECAC_TRACKER_TOKEN         tracker_token         —
//! tracker.query             RECAC_TRACKER_QUERY         tracker_query         "" (adapter default)
//! tracker.projectKey        RECAC_TRACKER_PROJECT_KEY   tracker_project_key   —
//! poll.interval             RECAC_POLL_INTERVAL         poll_interval         300 (5m)
//! spawner.kind              RECAC_SPAWNER_KIND          spawner_kind          "container"
//! spawner.image             RECAC_SPAWNER_IMAGE         spawner_image         "ghcr.io/recac/agent:latest"
//! spawner.imagePullPolicy   RECAC_IMAGE_PULL_POLICY     image_pull_policy     "IfNotPresent"
//! spawner.namespace         RECAC_SPAWNER_NAMESPACE     spawner_namespace     "default"
//! spawner.secretName        RECAC_SPAWNER_SECRET_NAME   spawner_secret_name   —
//! agent.provider            RECAC_AGENT_PROVIDER        agent_provider        —
//! agent.model               RECAC_AGENT_MODEL           agent_model           —
//! agent.maxIterations       RECAC_AGENT_MAX_ITERATIONS  agent_max_iterations  —
//! once                      — (CLI --once flag only)    —                     false
//! state_dir                 RECAC_STATE_DIR             —                     ~/.muster
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::error::{Error, Result};

pub const DEFAULT_IMAGE: &str = "ghcr.io/recac/agent:latest";

#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub tracker_kind: String,
    pub tracker_url: Option<String>,
    pub tracker_user: Option<String>,
    pub tracker_token: Option<String>,
    pub tracker_query: String,
    pub tracker_project_key: Option<String>,
    pub poll_interval: Duration,
    pub spawner_kind: String,
    pub spawner_image: String,
    pub image_pull_policy: String,
    pub spawner_namespace: String,
    pub spawner_secret_name: Option<String>,
    pub agent_provider: Option<String>,
    pub agent_model: Option<String>,
    pub agent_max_iterations: Option<u32>,
    pub once: bool,
}

impl Config {
    pub fn load(state_dir: &Path, once: bool) -> Result<Self> {
        Self::load_with_env(state_dir, once, |k| env::var(k).ok())
    }

    fn load_with_env(
        state_dir: &Path,
        once: bool,
        get_env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut cfg = Self::defaults(state_dir, once);

        let config_file = state_dir.join("config");
        if config_file.exists() {
            parse_config_file(&config_file, |key, value| {
                cfg.apply_file_entry(key, value);
            })
            .map_err(|e| Error::Config(format!("failed to read config file: {e}")))?;
        }

        cfg.apply_env_overrides(get_env);
        cfg.validate()?;
        Ok(cfg)
    }

    fn defaults(state_dir: &Path, once: bool) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            tracker_kind: "file".to_string(),
            tracker_url: None,
            tracker_user: None,
            tracker_token: None,
            tracker_query: String::new(),
            tracker_project_key: None,
            poll_interval: Duration::from_secs(300),
            spawner_kind: "container".to_string(),
            spawner_image: DEFAULT_IMAGE.to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            spawner_namespace: "default".to_string(),
            spawner_secret_name: None,
            agent_provider: None,
            agent_model: None,
            agent_max_iterations: None,
            once,
        }
    }

    fn apply_file_entry(&mut self, key: &str, value: &str) {
        match key {
            "tracker_kind" => self.tracker_kind = value.to_string(),
            "tracker_url" => self.tracker_url = Some(value.to_string()),
            "tracker_user" => self.tracker_user = Some(value.to_string()),
            "tracker_token" => self.tracker_token = Some(value.to_string()),
            "tracker_query" => self.tracker_query = value.to_string(),
            "tracker_project_key" => self.tracker_project_key = Some(value.to_string()),
            "poll_interval" => {
                if let Ok(n) = value.parse::<u64>() {
                    self.poll_interval = Duration::from_secs(n);
                }
            }
            "spawner_kind" => self.spawner_kind = value.to_string(),
            "spawner_image" => self.spawner_image = value.to_string(),
            "image_pull_policy" => self.image_pull_policy = value.to_string(),
            "spawner_namespace" => self.spawner_namespace = value.to_string(),
            "spawner_secret_name" => self.spawner_secret_name = Some(value.to_string()),
            "agent_provider" => self.agent_provider = Some(value.to_string()),
            "agent_model" => self.agent_model = Some(value.to_string()),
            "agent_max_iterations" => {
                if let Ok(n) = value.parse::<u32>() {
                    self.agent_max_iterations = Some(n);
                }
            }
            _ => {}
        }
    }

    fn apply_env_overrides(&mut self, get_env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get_env("RECAC_TRACKER_KIND") {
            self.tracker_kind = v;
        }
        if let Some(v) = get_env("RECAC_TRACKER_URL") {
            self.tracker_url = Some(v);
        }
        if let Some(v) = get_env("RECAC_TRACKER_USER") {
            self.tracker_user = Some(v);
        }
        if let Some(v) = get_env("RECAC_TRACKER_TOKEN") {
            self.tracker_token = Some(v);
        }
        if let Some(v) = get_env("RECAC_TRACKER_QUERY") {
            self.tracker_query = v;
        }
        if let Some(v) = get_env("RECAC_TRACKER_PROJECT_KEY") {
            self.tracker_project_key = Some(v);
        }
        if let Some(v) = get_env("RECAC_POLL_INTERVAL") {
            if let Ok(n) = v.parse::<u64>() {
                self.poll_interval = Duration::from_secs(n);
            }
        }
        if let Some(v) = get_env("RECAC_SPAWNER_KIND") {
            self.spawner_kind = v;
        }
        if let Some(v) = get_env("RECAC_SPAWNER_IMAGE") {
            self.spawner_image = v;
        }
        if let Some(v) = get_env("RECAC_IMAGE_PULL_POLICY") {
            self.image_pull_policy = v;
        }
        if let Some(v) = get_env("RECAC_SPAWNER_NAMESPACE") {
            self.spawner_namespace = v;
        }
        if let Some(v) = get_env("RECAC_SPAWNER_SECRET_NAME") {
            self.spawner_secret_name = Some(v);
        }
        if let Some(v) = get_env("RECAC_AGENT_PROVIDER") {
            self.agent_provider = Some(v);
        }
        if let Some(v) = get_env("RECAC_AGENT_MODEL") {
            self.agent_model = Some(v);
        }
        if let Some(v) = get_env("RECAC_AGENT_MAX_ITERATIONS") {
            if let Ok(n) = v.parse::<u32>() {
                self.agent_max_iterations = Some(n);
            }
        }
    }

    /// Config errors are the one fatal non-cancellation failure mode
    /// (exit code 1 per the external interface's exit-code contract).
    fn validate(&self) -> Result<()> {
        match self.spawner_kind.as_str() {
            "container" | "cluster" | "file" => {}
            other => return Err(Error::Config(format!("unknown spawner.kind: {other}"))),
        }
        match self.tracker_kind.as_str() {
            "jira" | "github" | "file" => {}
            other => return Err(Error::Config(format!("unknown tracker.kind: {other}"))),
        }
        if self.tracker_kind == "jira" && self.tracker_url.is_none() {
            return Err(Error::Config("tracker.url is required for tracker.kind=jira".into()));
        }
        Ok(())
    }
}

/// Credentials resolved through the same chain as [`Config`], kept in a
/// separate type so they are never accidentally serialized alongside it.
#[derive(Debug)]
pub struct Credentials {
    pub tracker_token: Option<String>,
    pub model_provider_token: Option<String>,
    pub git_identity_name: Option<String>,
    pub git_identity_email: Option<String>,
}

impl Credentials {
    pub fn load(state_dir: &Path) -> Self {
        Self::load_with_env(state_dir, |k| env::var(k).ok())
    }

    fn load_with_env(_state_dir: &Path, get_env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            tracker_token: get_env("RECAC_TRACKER_TOKEN"),
            model_provider_token: get_env("ANTHROPIC_API_KEY"),
            git_identity_name: get_env("RECAC_GIT_NAME"),
            git_identity_email: get_env("RECAC_GIT_EMAIL"),
        }
    }
}

fn parse_config_file(path: &Path, mut f: impl FnMut(&str, &str)) -> std::io::Result<()> {
    let content = fs::read_to_string(path)?;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            f(k.trim(), v.trim());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_are_file_spawner_and_five_minute_poll() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load_with_env(dir.path(), false, no_env).unwrap();
        assert_eq!(cfg.spawner_kind, "container");
        assert_eq!(cfg.tracker_kind, "file");
        assert_eq!(cfg.poll_interval, Duration::from_secs(300));
        assert_eq!(cfg.spawner_image, DEFAULT_IMAGE);
    }

    #[test]
    fn file_overrides_default() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config"),
            "spawner_kind=cluster\npoll_interval=60\n",
        )
        .unwrap();
        let cfg = Config::load_with_env(dir.path(), false, no_env).unwrap();
        assert_eq!(cfg.spawner_kind, "cluster");
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn env_overrides_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config"), "spawner_kind=cluster\n").unwrap();
        let cfg = Config::load_with_env(dir.path(), false, |k| {
            if k == "RECAC_SPAWNER_KIND" {
                Some("file".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(cfg.spawner_kind, "file");
    }

    #[test]
    fn unknown_spawner_kind_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config"), "spawner_kind=made_up\n").unwrap();
        let err = Config::load_with_env(dir.path(), false, no_env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn jira_tracker_requires_url() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config"), "tracker_kind=jira\n").unwrap();
        let err = Config::load_with_env(dir.path(), false, no_env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config"),
            "# comment\n\n  # indented\nspawner_kind=cluster\n",
        )
        .unwrap();
        let cfg = Config::load_with_env(dir.path(), false, no_env).unwrap();
        assert_eq!(cfg.spawner_kind, "cluster");
    }

    #[test]
    fn once_flag_is_cli_only_not_file_or_env() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config"), "once=true\n").unwrap();
        let cfg = Config::load_with_env(dir.path(), false, no_env).unwrap();
        assert!(!cfg.once);
        let cfg = Config::load_with_env(dir.path(), true, no_env).unwrap();
        assert!(cfg.once);
    }

    #[test]
    fn credentials_read_from_env() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials::load_with_env(dir.path(), |k| match k {
            "RECAC_TRACKER_TOKEN" => Some("t".to_string()),
            "ANTHROPIC_API_KEY" => Some("sk-ant".to_string()),
            _ => None,
        });
        assert_eq!(creds.tracker_token.as_deref(), Some("t"));
        assert_eq!(creds.model_provider_token.as_deref(), Some("sk-ant"));
    }
}
