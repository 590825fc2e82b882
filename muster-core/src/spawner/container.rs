//! Container-local spawner: one long-running Docker container per
//! `WorkItem`, with the agent invocation `exec`'d into it from a detached
//! thread. Two-phase by design — start a long-running container, then run
//! the agent invocation inside it via a detached `docker exec` — and
//! composes its shell command through `shellquote` instead of unescaped
//! string concatenation.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::error::{Error, Result};
use crate::model::WorkItem;
use crate::naming::sanitize;
use crate::session::{SessionState, SessionStore};
use crate::shellquote::export_block;
use crate::tracker::TrackerAdapter;

use super::merge_env;

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct ContainerSpawner<T: ?Sized, S: ?Sized> {
    tracker: Arc<T>,
    session_store: Arc<S>,
    image: String,
    docker_socket: Option<PathBuf>,
    prefix: String,
    workspace_root: PathBuf,
    agent_binary: String,
    host_env: Vec<(String, String)>,
    extra_env: Vec<(String, String)>,
}

impl<T, S> ContainerSpawner<T, S>
where
    T: TrackerAdapter + ?Sized + Send + Sync + 'static,
    S: SessionStore + ?Sized + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tracker: Arc<T>,
        session_store: Arc<S>,
        image: impl Into<String>,
        docker_socket: Option<PathBuf>,
        prefix: impl Into<String>,
        workspace_root: impl Into<PathBuf>,
        agent_binary: impl Into<String>,
        host_env: Vec<(String, String)>,
        extra_env: Vec<(String, String)>,
    ) -> Self {
        Self {
            tracker,
            session_store,
            image: image.into(),
            docker_socket,
            prefix: prefix.into(),
            workspace_root: workspace_root.into(),
            agent_binary: agent_binary.into(),
            host_env,
            extra_env,
        }
    }

    fn container_name(&self, id: &str) -> String {
        format!("{}-{}", self.prefix, sanitize(id))
    }

    fn is_running(&self, container_name: &str) -> bool {
        let pattern = format!("^{container_name}$");
        Command::new("docker")
            .args(["ps", "--filter", &format!("name={pattern}"), "--format", "{{.Names}}"])
            .output()
            .map(|out| {
                String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .any(|l| l == container_name)
            })
            .unwrap_or(false)
    }
}

impl<T, S> super::Spawner for ContainerSpawner<T, S>
where
    T: TrackerAdapter + ?Sized + Send + Sync + 'static,
    S: SessionStore + ?Sized + Send + Sync + 'static,
{
    fn spawn(&self, item: &WorkItem) -> Result<()> {
        let container_name = self.container_name(&item.id);

        if self.is_running(&container_name) {
            println!("[container] {} already running, no-op", item.id);
            return Ok(());
        }

        // Claim. A failure here is not fatal to the whole spawn: the item is
        // skipped and will be re-offered next tick.
        if let Err(e) = self.tracker.update_status(&item.id, "In Progress", None) {
            println!("[container] {} claim failed, skipping: {e}", item.id);
            return Ok(());
        }

        let suffix = format!(
            "{}-{}",
            std::process::id(),
            WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let workspace = self
            .workspace_root
            .join(format!("{}-{}-{suffix}", self.prefix, sanitize(&item.id)));
        std::fs::create_dir_all(&workspace)
            .map_err(|e| Error::Spawn(format!("failed to create workspace: {e}")))?;

        let mut run_args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--rm".into(),
            "--name".into(),
            container_name.clone(),
            "-v".into(),
            format!("{}:/workspace", workspace.display()),
        ];
        if let Some(sock) = &self.docker_socket {
            run_args.push("-v".into());
            run_args.push(format!("{}:/var/run/docker.sock", sock.display()));
        }
        run_args.push(self.image.clone());
        run_args.push("tail".into());
        run_args.push("-f".into());
        run_args.push("/dev/null".into());

        let start = Command::new("docker")
            .args(&run_args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let start = match start {
            Ok(o) if o.status.success() => o,
            Ok(o) => {
                let _ = std::fs::remove_dir_all(&workspace);
                return Err(Error::Spawn(format!(
                    "docker run failed: {}",
                    String::from_utf8_lossy(&o.stderr)
                )));
            }
            Err(e) => {
                let _ = std::fs::remove_dir_all(&workspace);
                return Err(Error::Spawn(format!("failed to exec docker: {e}")));
            }
        };
        let _ = start;

        let agent_cmd = format!(
            "{} --item {} --path /workspace --repo-url {}",
            self.agent_binary,
            crate::shellquote::quote(&item.id),
            crate::shellquote::quote(&item.repo_url),
        );
        // Only the agent invocation itself is persisted: the exported env
        // block and credential-helper line carry secrets that must not land
        // in the session record.
        let command = vec![
            "docker".to_string(),
            "exec".to_string(),
            container_name.clone(),
            "bash".to_string(),
            "-c".to_string(),
            agent_cmd.clone(),
        ];
        let session = SessionState::new_running(item.id.clone(), command, workspace.display().to_string());
        if let Err(e) = self.session_store.save(&session) {
            let _ = Command::new("docker").args(["rm", "-f", &container_name]).output();
            let _ = std::fs::remove_dir_all(&workspace);
            return Err(Error::Spawn(format!("failed to persist initial session: {e}")));
        }

        let env = merge_env(
            item.env_vars.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            self.host_env.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            self.extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );

        let tracker = Arc::clone(&self.tracker);
        let session_store = Arc::clone(&self.session_store);
        let item_id = item.id.clone();
        let container_for_thread = container_name.clone();
        let workspace_for_thread = workspace.clone();

        thread::spawn(move || {
            let has_token = env.iter().any(|(k, _)| k == crate::model::ENV_TRACKER_TOKEN);
            let export_block = export_block(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            let script = if has_token {
                format!(
                    "{export_block}\n{}\n{agent_cmd}",
                    crate::shellquote::git_credential_helper_line()
                )
            } else {
                format!("{export_block}\n{agent_cmd}")
            };

            let output = Command::new("docker")
                .args(["exec", &container_for_thread, "bash", "-c", &script])
                .output();

            let mut session = match session_store.load(&item_id) {
                Ok(s) => s,
                Err(_) => SessionState::new_running(item_id.clone(), vec![], workspace_for_thread.display().to_string()),
            };

            match output {
                Ok(o) if o.status.success() => {
                    let end_sha = git_head_sha(&workspace_for_thread);
                    session.finish_ok(end_sha);
                    let _ = session_store.save(&session);
                }
                Ok(o) => {
                    let logs = format!(
                        "stdout:\n{}\nstderr:\n{}",
                        String::from_utf8_lossy(&o.stdout),
                        String::from_utf8_lossy(&o.stderr)
                    );
                    session.finish_err(logs.clone());
                    let _ = session_store.save(&session);
                    let _ = tracker.update_status(&item_id, "Failed", Some(&logs));
                }
                Err(e) => {
                    session.finish_err(e.to_string());
                    let _ = session_store.save(&session);
                    let _ = tracker.update_status(&item_id, "Failed", Some(&e.to_string()));
                }
            }

            let _ = Command::new("docker").args(["rm", "-f", &container_for_thread]).output();
            if let Err(e) = std::fs::remove_dir_all(&workspace_for_thread) {
                eprintln!("[container] cleanup failed for {workspace_for_thread:?}: {e}");
            }
        });

        Ok(())
    }
}

fn git_head_sha(workspace: &std::path::Path) -> Option<String> {
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(workspace)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}
