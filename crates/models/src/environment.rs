use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Every submission directory is bind-mounted at this path inside its
/// execution environment. Handlers derive all in-environment paths from it.
pub const MOUNT_ROOT: &str = "/usr/local/submission";

const DEFAULT_MEMORY_LIMIT_BYTES: i64 = 256 * 1024 * 1024;
const DEFAULT_NANO_CPUS: i64 = 500_000_000; // half a core

/// Lifecycle states of an execution environment. Only forward transitions
/// are valid; `Removed` is reachable from any earlier state so cleanup can
/// run unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentStatus {
    Created,
    Running,
    Stopped,
    Killed,
    Removed,
}

impl EnvironmentStatus {
    pub fn can_transition_to(self, next: EnvironmentStatus) -> bool {
        use EnvironmentStatus::*;
        match (self, next) {
            (_, Removed) => self != Removed,
            (Created, Running) => true,
            (Running, Stopped) | (Running, Killed) => true,
            _ => false,
        }
    }
}

/// Everything needed to provision one isolated environment for one
/// submission. Network access is off and resource caps are applied by
/// default; callers opt out explicitly.
#[derive(Debug, Clone)]
pub struct EnvironmentSpec {
    pub image: String,
    pub image_version: Option<String>,
    pub cmd: Vec<String>,
    /// Host directory holding the submission's source and test input,
    /// mounted read-write at `MOUNT_ROOT`.
    pub submission_dir: PathBuf,
    pub submission_id: Uuid,
    /// (container port like "8080/tcp", host port) pairs.
    pub port_bindings: Vec<(String, String)>,
    pub network_disabled: bool,
    pub memory_limit_bytes: i64,
    pub nano_cpus: i64,
}

impl EnvironmentSpec {
    pub fn new(
        image: impl Into<String>,
        image_version: Option<String>,
        submission_dir: PathBuf,
        submission_id: Uuid,
    ) -> Self {
        EnvironmentSpec {
            image: image.into(),
            image_version,
            // Keep the environment alive so compile and run can be driven
            // as separate steps inside it.
            cmd: vec!["sleep".to_string(), "infinity".to_string()],
            submission_dir,
            submission_id,
            port_bindings: Vec::new(),
            network_disabled: true,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            nano_cpus: DEFAULT_NANO_CPUS,
        }
    }

    pub fn image_ref(&self) -> String {
        match &self.image_version {
            Some(version) => format!("{}:{}", self.image, version),
            None => self.image.clone(),
        }
    }
}

/// Opaque handle to a provisioned environment. An environment belongs to
/// exactly one submission and is never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    pub id: String,
    pub submission_id: Uuid,
}

/// Read-only snapshot of one managed environment, as returned by `list`.
#[derive(Debug, Clone)]
pub struct EnvironmentSummary {
    pub id: String,
    pub image: String,
    pub status: EnvironmentStatus,
    pub submission_id: Uuid,
}

/// Raw result of one command executed inside an environment.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// Set when the command was forcibly terminated at the deadline rather
    /// than exiting on its own.
    pub timed_out: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_status_forward_transitions() {
        use EnvironmentStatus::*;
        assert!(Created.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopped));
        assert!(Running.can_transition_to(Killed));
        assert!(Created.can_transition_to(Removed));
        assert!(Stopped.can_transition_to(Removed));
        assert!(Killed.can_transition_to(Removed));
    }

    #[test]
    fn environment_status_rejects_backward_transitions() {
        use EnvironmentStatus::*;
        assert!(!Running.can_transition_to(Created));
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Removed.can_transition_to(Removed));
        assert!(!Removed.can_transition_to(Running));
    }

    #[test]
    fn spec_defaults_are_isolated() {
        let spec = EnvironmentSpec::new(
            "gcc",
            Some("13".to_string()),
            PathBuf::from("/tmp/sub"),
            Uuid::new_v4(),
        );
        assert!(spec.network_disabled);
        assert!(spec.memory_limit_bytes > 0);
        assert!(spec.nano_cpus > 0);
        assert_eq!(spec.image_ref(), "gcc:13");
    }

    #[test]
    fn image_ref_without_version() {
        let spec = EnvironmentSpec::new("gcc", None, PathBuf::from("/tmp/sub"), Uuid::new_v4());
        assert_eq!(spec.image_ref(), "gcc");
    }
}
