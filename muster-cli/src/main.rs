//! Thin wiring binary: resolve configuration, construct the configured
//! tracker adapter and spawner, then hand off to the core orchestrator
//! loop. Contains no orchestration logic of its own — that all lives in
//! `muster-core`. Rich CLI parsing (subcommands, shell completions, a TUI)
//! is out of scope — this binary prints a startup banner and runs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use muster_core::config::{Config, Credentials};
use muster_core::orchestrator::OrchestratorLoop;
use muster_core::session::FileSessionStore;
use muster_core::spawner::cluster::ClusterSpawner;
use muster_core::spawner::container::ContainerSpawner;
use muster_core::spawner::file::FileSpawner;
use muster_core::spawner::Spawner;
use muster_core::tracker::file_queue::FileQueueAdapter;
use muster_core::tracker::github::GithubAdapter;
use muster_core::tracker::jira::JiraAdapter;
use muster_core::tracker::TrackerAdapter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `muster` — poll a ticket tracker for ready work and dispatch it to
/// isolated agent workers.
#[derive(Parser, Debug)]
#[command(name = "muster", version = VERSION)]
struct Args {
    /// Directory for state (config file, sessions, drain sentinel).
    /// Defaults to $RECAC_STATE_DIR, falling back to ~/.muster.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Run a single poll-and-dispatch tick, then exit.
    #[arg(long)]
    once: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn default_state_dir() -> PathBuf {
    if let Ok(v) = std::env::var("RECAC_STATE_DIR") {
        return PathBuf::from(v);
    }
    dirs_home().join(".muster")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run(args: Args) -> Result<()> {
    let state_dir = args.state_dir.unwrap_or_else(default_state_dir);
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("failed to create state dir {}", state_dir.display()))?;

    let config = Config::load(&state_dir, args.once)
        .with_context(|| "failed to load configuration")?;
    let credentials = Credentials::load(&state_dir);

    let tracker = build_tracker(&config, &credentials)?;
    let spawner = build_spawner(&config, &credentials, Arc::clone(&tracker))?;

    let loop_ = OrchestratorLoop::new(
        tracker,
        spawner,
        config.tracker_query.clone(),
        config.poll_interval,
        &state_dir,
        config.tracker_kind.clone(),
        config.spawner_kind.clone(),
        config.once,
    );

    loop_.run()?;
    Ok(())
}

fn build_tracker(
    config: &Config,
    credentials: &Credentials,
) -> Result<Arc<dyn TrackerAdapter + Send + Sync>> {
    match config.tracker_kind.as_str() {
        "jira" => {
            let url = config
                .tracker_url
                .clone()
                .context("tracker.url is required for tracker.kind=jira")?;
            let user = config
                .tracker_user
                .clone()
                .context("tracker.user is required for tracker.kind=jira")?;
            let token = credentials
                .tracker_token
                .clone()
                .or_else(|| config.tracker_token.clone())
                .context("tracker.token is required for tracker.kind=jira")?;
            let mut adapter = JiraAdapter::new(url, user, token)?;
            if let Some(key) = &config.tracker_project_key {
                adapter = adapter.with_project_key(key.clone());
            }
            Ok(Arc::new(adapter))
        }
        "github" => {
            let repo = config
                .tracker_url
                .clone()
                .context("tracker.url (owner/repo) is required for tracker.kind=github")?;
            Ok(Arc::new(GithubAdapter::new(repo, "ready")))
        }
        "file" => Ok(Arc::new(FileQueueAdapter::new(state_queue_dir(config)))),
        other => bail!("unknown tracker.kind: {other}"),
    }
}

fn state_queue_dir(config: &Config) -> PathBuf {
    config.state_dir.join("queue")
}

fn build_spawner(
    config: &Config,
    credentials: &Credentials,
    tracker: Arc<dyn TrackerAdapter + Send + Sync>,
) -> Result<Arc<dyn Spawner + Send + Sync>> {
    let host_env = host_env(config, credentials);

    match config.spawner_kind.as_str() {
        "container" => {
            let session_store = Arc::new(FileSessionStore::new(config.state_dir.join("sessions")));
            let spawner = ContainerSpawner::new(
                tracker,
                session_store,
                config.spawner_image.clone(),
                docker_socket_path(),
                "recac".to_string(),
                config.state_dir.join("workspaces"),
                "recac-agent".to_string(),
                host_env,
                agent_hints(config),
            );
            Ok(Arc::new(spawner))
        }
        "cluster" => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start a Tokio runtime to build the Kubernetes client")?;
            let client = runtime
                .block_on(kube::Client::try_default())
                .context("failed to construct a Kubernetes client from the ambient kubeconfig")?;
            let spawner = ClusterSpawner::new(
                tracker,
                client,
                config.spawner_namespace.clone(),
                "recac".to_string(),
                config.spawner_image.clone(),
                config.image_pull_policy.clone(),
                config.spawner_secret_name.clone(),
                docker_socket_path().map(|p| p.display().to_string()),
                host_env,
                agent_hints(config),
            )?;
            Ok(Arc::new(spawner))
        }
        "file" => {
            let spawner = FileSpawner::new(tracker, config.state_dir.join("dispatched"));
            Ok(Arc::new(spawner))
        }
        other => bail!("unknown spawner.kind: {other}"),
    }
}

fn docker_socket_path() -> Option<PathBuf> {
    let default = PathBuf::from("/var/run/docker.sock");
    if default.exists() {
        Some(default)
    } else {
        None
    }
}

fn host_env(config: &Config, credentials: &Credentials) -> Vec<(String, String)> {
    let mut env = Vec::new();
    if let Some(url) = &config.tracker_url {
        env.push(("RECAC_TRACKER_URL".to_string(), url.clone()));
    }
    if let Some(user) = &config.tracker_user {
        env.push(("RECAC_TRACKER_USER".to_string(), user.clone()));
    }
    if let Some(token) = &credentials.tracker_token {
        env.push((muster_core::model::ENV_TRACKER_TOKEN.to_string(), token.clone()));
    }
    if let Some(token) = &credentials.model_provider_token {
        env.push(("ANTHROPIC_API_KEY".to_string(), token.clone()));
    }
    if let Some(name) = &credentials.git_identity_name {
        env.push(("RECAC_GIT_NAME".to_string(), name.clone()));
    }
    if let Some(email) = &credentials.git_identity_email {
        env.push(("RECAC_GIT_EMAIL".to_string(), email.clone()));
    }
    env
}

fn agent_hints(config: &Config) -> Vec<(String, String)> {
    let mut hints = Vec::new();
    if let Some(provider) = &config.agent_provider {
        hints.push(("RECAC_AGENT_PROVIDER".to_string(), provider.clone()));
    }
    if let Some(model) = &config.agent_model {
        hints.push(("RECAC_AGENT_MODEL".to_string(), model.clone()));
    }
    if let Some(n) = config.agent_max_iterations {
        hints.push(("RECAC_AGENT_MAX_ITERATIONS".to_string(), n.to_string()));
    }
    hints
}
