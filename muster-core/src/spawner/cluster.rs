//! Cluster Job spawner: one Kubernetes `Job` per `WorkItem`, idempotent by
//! name via the typed `Api<Job>` client. Looks up any existing Job with the
//! same name first and classifies it Active/Succeeded/Failed/NotFound
//! before deciding whether to create a new one.
//!
//! This is the one async module in an otherwise synchronous crate: the
//! rest of the orchestrator uses `std::thread`, so `spawn` builds a
//! single-threaded Tokio runtime internally and blocks on it rather than
//! infecting the whole crate with `async fn`.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, HostPathVolumeSource, PodSpec, PodTemplateSpec,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{WorkItem, ENV_TRACKER_TOKEN};
use crate::naming::job_name;
use crate::shellquote::{git_credential_helper_line, quote};
use crate::tracker::TrackerAdapter;

use super::merge_env;

pub struct ClusterSpawner<T: ?Sized> {
    tracker: Arc<T>,
    client: Client,
    namespace: String,
    prefix: String,
    image: String,
    image_pull_policy: String,
    secret_envelope: Option<String>,
    docker_sock_host_path: Option<String>,
    host_env: Vec<(String, String)>,
    extra_env: Vec<(String, String)>,
    runtime: tokio::runtime::Runtime,
}

impl<T> ClusterSpawner<T>
where
    T: TrackerAdapter + ?Sized + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tracker: Arc<T>,
        client: Client,
        namespace: impl Into<String>,
        prefix: impl Into<String>,
        image: impl Into<String>,
        image_pull_policy: impl Into<String>,
        secret_envelope: Option<String>,
        docker_sock_host_path: Option<String>,
        host_env: Vec<(String, String)>,
        extra_env: Vec<(String, String)>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Spawn(format!("failed to start cluster runtime: {e}")))?;
        Ok(Self {
            tracker,
            client,
            namespace: namespace.into(),
            prefix: prefix.into(),
            image: image.into(),
            image_pull_policy: image_pull_policy.into(),
            secret_envelope,
            docker_sock_host_path,
            host_env,
            extra_env,
            runtime,
        })
    }

    fn jobs_api(&self) -> Api<Job> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn build_job(&self, name: &str, item: &WorkItem) -> Job {
        let env = merge_env(
            item.env_vars.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            self.host_env.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            self.extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );
        let env_vars: Vec<EnvVar> = env
            .into_iter()
            .map(|(name, value)| EnvVar {
                name,
                value: Some(value),
                value_from: None,
            })
            .collect();

        let has_token = env_vars.iter().any(|v| v.name == ENV_TRACKER_TOKEN);
        let agent_invocation = format!(
            "recac-agent --jira {} --path /workspace --repo-url {}",
            quote(&item.id),
            quote(&item.repo_url),
        );
        let command = if has_token {
            format!("{} && {agent_invocation}", git_credential_helper_line())
        } else {
            agent_invocation
        };

        let mut volumes = vec![Volume {
            name: "workspace".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }];
        let mut mounts = vec![VolumeMount {
            name: "workspace".to_string(),
            mount_path: "/workspace".to_string(),
            ..Default::default()
        }];
        if let Some(sock) = &self.docker_sock_host_path {
            volumes.push(Volume {
                name: "docker-sock".to_string(),
                host_path: Some(HostPathVolumeSource {
                    path: sock.clone(),
                    type_: None,
                }),
                ..Default::default()
            });
            mounts.push(VolumeMount {
                name: "docker-sock".to_string(),
                mount_path: "/var/run/docker.sock".to_string(),
                ..Default::default()
            });
        }

        let mut annotations = BTreeMap::new();
        if let Some(envelope) = &self.secret_envelope {
            annotations.insert("recac.io/secret-envelope".to_string(), envelope.clone());
        }

        let container = Container {
            name: "agent".to_string(),
            image: Some(self.image.clone()),
            image_pull_policy: Some(self.image_pull_policy.clone()),
            command: Some(vec!["bash".to_string(), "-c".to_string(), command]),
            env: Some(env_vars),
            volume_mounts: Some(mounts),
            ..Default::default()
        };

        Job {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                annotations: if annotations.is_empty() { None } else { Some(annotations) },
                ..Default::default()
            },
            spec: Some(JobSpec {
                backoff_limit: Some(0),
                ttl_seconds_after_finished: Some(3600),
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        restart_policy: Some("Never".to_string()),
                        containers: vec![container],
                        volumes: Some(volumes),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            status: None,
        }
    }
}

enum ExistingJob {
    Active,
    Succeeded,
    Failed,
    NotFound,
}

fn classify(job: &Job) -> ExistingJob {
    let Some(status) = &job.status else {
        return ExistingJob::Active;
    };
    if status.succeeded.unwrap_or(0) > 0 {
        ExistingJob::Succeeded
    } else if status.failed.unwrap_or(0) > 0 {
        ExistingJob::Failed
    } else {
        ExistingJob::Active
    }
}

impl<T> super::Spawner for ClusterSpawner<T>
where
    T: TrackerAdapter + ?Sized + Send + Sync + 'static,
{
    fn spawn(&self, item: &WorkItem) -> Result<()> {
        let name = job_name(&self.prefix, &item.id);
        let jobs = self.jobs_api();

        let existing = self.runtime.block_on(jobs.get_opt(&name));
        let existing = existing.map_err(|e| Error::Spawn(format!("get job {name}: {e}")))?;

        match existing.as_ref().map(classify) {
            Some(ExistingJob::Active) => {
                println!("[cluster] {name} already active, no-op");
                return Ok(());
            }
            Some(ExistingJob::Succeeded) => {
                println!("[cluster] {name} already succeeded, no-op");
                return Ok(());
            }
            Some(ExistingJob::Failed) => {
                println!("[cluster] {name} failed previously, deleting");
                self.runtime
                    .block_on(jobs.delete(&name, &DeleteParams::background()))
                    .map_err(|e| Error::Spawn(format!("delete failed job {name}: {e}")))?;
                return Err(Error::Tracker(
                    "cleaning up, will retry next cycle".to_string(),
                ));
            }
            Some(ExistingJob::NotFound) | None => {}
        }

        // Claim first: as with the container spawner, a claim failure
        // skips the item for this tick rather than failing the cycle.
        if let Err(e) = self.tracker.update_status(&item.id, "In Progress", None) {
            println!("[cluster] {name} claim failed, skipping: {e}");
            return Ok(());
        }

        let job = self.build_job(&name, item);
        self.runtime
            .block_on(jobs.create(&PostParams::default(), &job))
            .map_err(|e| Error::Spawn(format!("create job {name}: {e}")))?;
        println!("[cluster] created job {name}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::batch::v1::JobStatus;

    fn job_with_status(succeeded: Option<i32>, failed: Option<i32>) -> Job {
        Job {
            metadata: Default::default(),
            spec: None,
            status: Some(JobStatus {
                succeeded,
                failed,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn classify_no_status_is_active() {
        let job = Job {
            metadata: Default::default(),
            spec: None,
            status: None,
        };
        assert!(matches!(classify(&job), ExistingJob::Active));
    }

    #[test]
    fn classify_succeeded_count_wins() {
        let job = job_with_status(Some(1), None);
        assert!(matches!(classify(&job), ExistingJob::Succeeded));
    }

    #[test]
    fn classify_failed_count_detected() {
        let job = job_with_status(None, Some(1));
        assert!(matches!(classify(&job), ExistingJob::Failed));
    }

    #[test]
    fn classify_zero_counts_is_active() {
        let job = job_with_status(Some(0), Some(0));
        assert!(matches!(classify(&job), ExistingJob::Active));
    }
}
