// models crate

pub mod environment;
pub mod submission;

pub use environment::{
    EnvironmentHandle, EnvironmentSpec, EnvironmentStatus, EnvironmentSummary, ExecOutput,
    MOUNT_ROOT,
};
pub use submission::{
    CompileOutcome, CompileResult, RunResult, Submission, SubmissionRequest, SubmissionStatus,
    Verdict,
};
