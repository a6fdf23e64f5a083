use async_trait::async_trait;
use models::{EnvironmentHandle, EnvironmentSpec, EnvironmentStatus, EnvironmentSummary, ExecOutput};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Failed to connect to container platform: {0}")]
    Connect(String),

    #[error("Failed to build image: {0}")]
    Build(String),

    #[error("Failed to create environment: {0}")]
    Create(String),

    #[error("Failed to start environment: {0}")]
    Start(String),

    #[error("Failed to stop environment: {0}")]
    Stop(String),

    #[error("Failed to kill environment: {0}")]
    Kill(String),

    #[error("Failed to remove environment: {0}")]
    Remove(String),

    #[error("Command execution failed in environment: {0}")]
    Exec(String),

    #[error("Failed to query environment state: {0}")]
    Query(String),
}

/// Lifecycle contract for isolated execution environments.
///
/// The engine depends on the platform only through this trait; any backend
/// offering process isolation, filesystem mount binding, and a network-off
/// switch satisfies it. Tests inject an in-memory implementation.
#[async_trait]
pub trait EnvironmentManager: Send + Sync {
    /// Build a reusable environment image from a build context directory.
    async fn build_image(
        &self,
        context_dir: &Path,
        image_name: &str,
    ) -> Result<String, EnvironmentError>;

    /// Allocate a new environment bound to exactly one submission's
    /// directory. The environment is created but not yet running.
    async fn create(&self, spec: &EnvironmentSpec) -> Result<EnvironmentHandle, EnvironmentError>;

    async fn start(&self, handle: &EnvironmentHandle) -> Result<(), EnvironmentError>;

    /// Graceful termination; escalates to a hard kill after `grace`.
    async fn stop(
        &self,
        handle: &EnvironmentHandle,
        grace: Duration,
    ) -> Result<(), EnvironmentError>;

    /// Hard cutoff, terminating every process inside the environment.
    async fn kill(&self, handle: &EnvironmentHandle) -> Result<(), EnvironmentError>;

    /// Release all resources tied to the environment. Idempotent: removing
    /// an already-removed handle is a no-op, so cleanup paths can call it
    /// unconditionally.
    async fn remove(&self, handle: &EnvironmentHandle) -> Result<(), EnvironmentError>;

    /// Snapshot of managed environments, optionally filtered by status.
    /// Ordering is unspecified between calls.
    async fn list(
        &self,
        filter: Option<EnvironmentStatus>,
    ) -> Result<Vec<EnvironmentSummary>, EnvironmentError>;

    /// Queries the platform, not the local table, so an externally
    /// terminated environment is detected before further operations.
    async fn is_running(&self, handle: &EnvironmentHandle) -> Result<bool, EnvironmentError>;

    /// Run a command inside a running environment with a bounded wall-clock
    /// timeout. On expiry the environment is force-killed and the output is
    /// returned with `timed_out` set; the caller is never blocked past the
    /// deadline.
    async fn exec(
        &self,
        handle: &EnvironmentHandle,
        cmd: &[String],
        timeout: Duration,
    ) -> Result<ExecOutput, EnvironmentError>;
}
