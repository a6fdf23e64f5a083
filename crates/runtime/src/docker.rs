use crate::manager::{EnvironmentError, EnvironmentManager};
use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
        StopContainerOptions,
    },
    exec::{CreateExecOptions, StartExecResults},
    models::{HostConfig, PortBinding},
    Docker,
};
use futures_util::StreamExt;
use models::{
    EnvironmentHandle, EnvironmentSpec, EnvironmentStatus, EnvironmentSummary, ExecOutput,
    MOUNT_ROOT,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Check whether the Docker daemon is reachable before committing to it.
pub async fn is_available() -> bool {
    match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => true,
            Err(e) => {
                logging::error(&format!("Docker ping failed: {}", e));
                false
            }
        },
        Err(e) => {
            logging::error(&format!("Docker connection failed: {}", e));
            false
        }
    }
}

struct Tracked {
    status: EnvironmentStatus,
    image: String,
    submission_id: Uuid,
}

/// Docker-backed `EnvironmentManager`. Keeps its own table of managed
/// environments so cleanup and listing never depend on daemon-side state
/// alone, and so `remove` stays idempotent.
pub struct DockerManager {
    docker: Docker,
    environments: Mutex<HashMap<String, Tracked>>,
}

impl DockerManager {
    pub fn new() -> Result<Self, EnvironmentError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EnvironmentError::Connect(e.to_string()))?;

        Ok(DockerManager {
            docker,
            environments: Mutex::new(HashMap::new()),
        })
    }

    fn set_status(&self, id: &str, next: EnvironmentStatus) {
        if let Ok(mut environments) = self.environments.lock() {
            if let Some(tracked) = environments.get_mut(id) {
                if tracked.status.can_transition_to(next) {
                    tracked.status = next;
                }
            }
        }
    }

    fn tracked_status(&self, id: &str) -> Option<EnvironmentStatus> {
        self.environments
            .lock()
            .ok()
            .and_then(|environments| environments.get(id).map(|tracked| tracked.status))
    }

    async fn ensure_image(&self, image: &str) -> Result<(), EnvironmentError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        logging::info(&format!("Pulling image: {}", image));
        let options = bollard::image::CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| EnvironmentError::Create(e.to_string()))?;
        }

        Ok(())
    }

    /// Stop and remove every environment this manager still tracks. Used on
    /// shutdown so no sandbox outlives the process.
    pub async fn cleanup_environments(&self) {
        let leftovers: Vec<EnvironmentHandle> = {
            match self.environments.lock() {
                Ok(environments) => environments
                    .iter()
                    .filter(|(_, tracked)| tracked.status != EnvironmentStatus::Removed)
                    .map(|(id, tracked)| EnvironmentHandle {
                        id: id.clone(),
                        submission_id: tracked.submission_id,
                    })
                    .collect(),
                Err(_) => Vec::new(),
            }
        };

        for handle in leftovers {
            logging::warning(&format!("Reclaiming leftover environment {}", handle.id));
            let _ = self.stop(&handle, Duration::from_secs(1)).await;
            let _ = self.remove(&handle).await;
        }
    }
}

fn port_map(spec: &EnvironmentSpec) -> Option<HashMap<String, Option<Vec<PortBinding>>>> {
    if spec.port_bindings.is_empty() {
        return None;
    }

    let mut map = HashMap::new();
    for (container_port, host_port) in &spec.port_bindings {
        map.insert(
            container_port.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(host_port.clone()),
            }]),
        );
    }
    Some(map)
}

#[async_trait]
impl EnvironmentManager for DockerManager {
    async fn build_image(
        &self,
        context_dir: &Path,
        image_name: &str,
    ) -> Result<String, EnvironmentError> {
        let tar_buffer = {
            let mut tar_builder = tar::Builder::new(Vec::new());
            tar_builder
                .append_dir_all(".", context_dir)
                .map_err(|e| EnvironmentError::Build(e.to_string()))?;
            tar_builder
                .into_inner()
                .map_err(|e| EnvironmentError::Build(e.to_string()))?
        };

        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: image_name,
            rm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(tar_buffer.into()));

        while let Some(result) = stream.next().await {
            result.map_err(|e| EnvironmentError::Build(e.to_string()))?;
        }

        logging::info(&format!("Built image: {}", image_name));
        Ok(image_name.to_string())
    }

    async fn create(&self, spec: &EnvironmentSpec) -> Result<EnvironmentHandle, EnvironmentError> {
        let image = spec.image_ref();
        self.ensure_image(&image).await?;

        let binds = vec![format!("{}:{}", spec.submission_dir.display(), MOUNT_ROOT)];

        let host_config = HostConfig {
            binds: Some(binds),
            memory: Some(spec.memory_limit_bytes),
            nano_cpus: Some(spec.nano_cpus),
            port_bindings: port_map(spec),
            ..Default::default()
        };

        let config = Config {
            image: Some(image.clone()),
            cmd: Some(spec.cmd.clone()),
            working_dir: Some(MOUNT_ROOT.to_string()),
            network_disabled: Some(spec.network_disabled),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = Some(CreateContainerOptions {
            name: format!("judgr-{}", Uuid::new_v4()),
            platform: None,
        });

        let container = self
            .docker
            .create_container(options, config)
            .await
            .map_err(|e| EnvironmentError::Create(e.to_string()))?;

        if let Ok(mut environments) = self.environments.lock() {
            environments.insert(
                container.id.clone(),
                Tracked {
                    status: EnvironmentStatus::Created,
                    image,
                    submission_id: spec.submission_id,
                },
            );
        }

        logging::submission(spec.submission_id, &format!("Environment created: {}", container.id));

        Ok(EnvironmentHandle {
            id: container.id,
            submission_id: spec.submission_id,
        })
    }

    async fn start(&self, handle: &EnvironmentHandle) -> Result<(), EnvironmentError> {
        self.docker
            .start_container::<String>(&handle.id, None)
            .await
            .map_err(|e| EnvironmentError::Start(e.to_string()))?;

        self.set_status(&handle.id, EnvironmentStatus::Running);
        Ok(())
    }

    async fn stop(
        &self,
        handle: &EnvironmentHandle,
        grace: Duration,
    ) -> Result<(), EnvironmentError> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };

        match self.docker.stop_container(&handle.id, Some(options)).await {
            Ok(_) => {}
            // 304: already stopped
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {}
            Err(e) => return Err(EnvironmentError::Stop(e.to_string())),
        }

        self.set_status(&handle.id, EnvironmentStatus::Stopped);
        Ok(())
    }

    async fn kill(&self, handle: &EnvironmentHandle) -> Result<(), EnvironmentError> {
        self.docker
            .kill_container::<String>(&handle.id, None)
            .await
            .map_err(|e| EnvironmentError::Kill(e.to_string()))?;

        self.set_status(&handle.id, EnvironmentStatus::Killed);
        Ok(())
    }

    async fn remove(&self, handle: &EnvironmentHandle) -> Result<(), EnvironmentError> {
        match self.tracked_status(&handle.id) {
            None | Some(EnvironmentStatus::Removed) => return Ok(()),
            Some(_) => {}
        }

        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self.docker.remove_container(&handle.id, Some(options)).await {
            Ok(_) => {}
            // 404: gone already, treat as removed
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(EnvironmentError::Remove(e.to_string())),
        }

        self.set_status(&handle.id, EnvironmentStatus::Removed);
        Ok(())
    }

    async fn list(
        &self,
        filter: Option<EnvironmentStatus>,
    ) -> Result<Vec<EnvironmentSummary>, EnvironmentError> {
        let environments = self
            .environments
            .lock()
            .map_err(|_| EnvironmentError::Query("environment table poisoned".to_string()))?;

        Ok(environments
            .iter()
            .filter(|(_, tracked)| filter.map_or(true, |status| tracked.status == status))
            .map(|(id, tracked)| EnvironmentSummary {
                id: id.clone(),
                image: tracked.image.clone(),
                status: tracked.status,
                submission_id: tracked.submission_id,
            })
            .collect())
    }

    async fn is_running(&self, handle: &EnvironmentHandle) -> Result<bool, EnvironmentError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let options = ListContainersOptions {
            all: false,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| EnvironmentError::Query(e.to_string()))?;

        Ok(containers
            .iter()
            .any(|container| container.id.as_deref() == Some(handle.id.as_str())))
    }

    async fn exec(
        &self,
        handle: &EnvironmentHandle,
        cmd: &[String],
        timeout: Duration,
    ) -> Result<ExecOutput, EnvironmentError> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: Some(MOUNT_ROOT.to_string()),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&handle.id, options)
            .await
            .map_err(|e| EnvironmentError::Exec(e.to_string()))?;

        let started = Instant::now();
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut timed_out = false;

        let start_result = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| EnvironmentError::Exec(e.to_string()))?;

        if let StartExecResults::Attached { mut output, .. } = start_result {
            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    chunk = output.next() => match chunk {
                        Some(Ok(bollard::container::LogOutput::StdOut { message })) => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        Some(Ok(bollard::container::LogOutput::StdErr { message })) => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(EnvironmentError::Exec(e.to_string())),
                        None => break,
                    },
                    _ = &mut deadline => {
                        timed_out = true;
                        break;
                    }
                }
            }
        }

        if timed_out {
            // Killing the environment takes the whole process tree with it,
            // not just the top process of the exec.
            logging::submission(handle.submission_id, "Deadline expired, killing environment");
            let _ = self.kill(handle).await;
        }

        let exit_code = if timed_out {
            -1
        } else {
            self.docker
                .inspect_exec(&exec.id)
                .await
                .map_err(|e| EnvironmentError::Exec(e.to_string()))?
                .exit_code
                .unwrap_or(-1)
        };

        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
            duration: started.elapsed(),
            timed_out,
        })
    }
}
