use crate::environment::ExecOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// States a submission moves through while being judged.
///
/// `Pending` and the terminal states are externally observable; `Compiling`
/// and `Running` are transient and exist for status queries made while the
/// submission is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Compiling,
    Running,
    Completed,
    CompileFailed,
    RuntimeError,
    TimedOut,
    Unsupported,
    Cancelled,
    /// The judging attempt itself failed (platform unavailable, environment
    /// could not be provisioned). Distinct from a judged verdict.
    InfraFailed,
}

impl SubmissionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            SubmissionStatus::Pending | SubmissionStatus::Compiling | SubmissionStatus::Running
        )
    }
}

/// Final judged outcome carried alongside the terminal status. Output
/// comparison against the expected answer happens outside the engine, so a
/// clean run is `Executed` rather than accepted/rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Executed,
    CompileError,
    RuntimeError,
    TimeLimit,
}

/// What the intake layer hands the engine: an identifier, a language tag,
/// and readable source/test-input locations on the host.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub id: Uuid,
    pub language: String,
    pub source_path: PathBuf,
    pub input_path: PathBuf,
}

/// One unit of user-supplied code under judgment. Mutated only by the
/// executor that owns it; read-only once a terminal state is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub language: String,
    pub source_path: PathBuf,
    pub input_path: PathBuf,
    pub status: SubmissionStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i64>,
    pub elapsed: Option<Duration>,
    pub verdict: Option<Verdict>,
    /// Environment cleanup failures, reported separately so they never
    /// overwrite an already-determined verdict.
    pub release_failures: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn new(request: &SubmissionRequest) -> Self {
        Submission {
            id: request.id,
            language: request.language.clone(),
            source_path: request.source_path.clone(),
            input_path: request.input_path.clone(),
            status: SubmissionStatus::Pending,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            elapsed: None,
            verdict: None,
            release_failures: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn transition(&mut self, next: SubmissionStatus) {
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl CompileResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Interpreted languages report compilation as skipped; the contract is
/// still uniformly callable.
#[derive(Debug, Clone)]
pub enum CompileOutcome {
    Skipped,
    Finished(CompileResult),
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl From<ExecOutput> for CompileResult {
    fn from(out: ExecOutput) -> Self {
        CompileResult {
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            duration: out.duration,
            timed_out: out.timed_out,
        }
    }
}

impl From<ExecOutput> for RunResult {
    fn from(out: ExecOutput) -> Self {
        RunResult {
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            duration: out.duration,
            timed_out: out.timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            id: Uuid::new_v4(),
            language: "cpp".to_string(),
            source_path: PathBuf::from("/tmp/sub/Main.cpp"),
            input_path: PathBuf::from("/tmp/sub/test.txt"),
        }
    }

    #[test]
    fn new_submission_is_pending() {
        let submission = Submission::new(&request());
        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert!(submission.verdict.is_none());
        assert!(submission.finished_at.is_none());
    }

    #[test]
    fn terminal_transition_stamps_finished_at() {
        let mut submission = Submission::new(&request());
        submission.transition(SubmissionStatus::Compiling);
        assert!(submission.finished_at.is_none());
        submission.transition(SubmissionStatus::CompileFailed);
        assert!(submission.finished_at.is_some());
        assert!(submission.status.is_terminal());
    }

    #[test]
    fn intermediate_states_are_not_terminal() {
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(!SubmissionStatus::Compiling.is_terminal());
        assert!(!SubmissionStatus::Running.is_terminal());
        assert!(SubmissionStatus::Unsupported.is_terminal());
        assert!(SubmissionStatus::Cancelled.is_terminal());
        assert!(SubmissionStatus::InfraFailed.is_terminal());
    }

    #[test]
    fn compile_result_success_requires_zero_exit_and_no_timeout() {
        let ok = CompileResult::from(ExecOutput::default());
        assert!(ok.succeeded());

        let failed = CompileResult::from(ExecOutput {
            exit_code: 1,
            ..Default::default()
        });
        assert!(!failed.succeeded());

        let timed_out = CompileResult::from(ExecOutput {
            timed_out: true,
            ..Default::default()
        });
        assert!(!timed_out.succeeded());
    }
}
