// languages crate

pub mod handlers;
pub mod registry;

pub use handlers::{CHandler, CppHandler, JavaHandler, PythonHandler};
pub use registry::{HandlerRegistry, UnsupportedLanguage};

use async_trait::async_trait;
use models::{CompileOutcome, CompileResult, EnvironmentHandle, RunResult};
use runtime::{EnvironmentError, EnvironmentManager};
use std::time::Duration;

/// Image a handler's environments are provisioned from.
#[derive(Debug, Clone, Copy)]
pub struct ImageRef {
    pub name: &'static str,
    pub version: Option<&'static str>,
}

/// Where and how a handler's commands run: a live environment plus the
/// in-environment paths of the submission files.
pub struct ExecutionContext<'a> {
    pub manager: &'a dyn EnvironmentManager,
    pub handle: &'a EnvironmentHandle,
    pub source_file: String,
    pub input_file: String,
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
}

/// Compile/run strategy for one language.
///
/// Concrete handlers only declare their commands; the default `compile` and
/// `run` drive them through the environment manager. Commands must derive
/// every artifact name deterministically from the source file name so a
/// retried submission behaves identically.
#[async_trait]
pub trait LanguageHandler: Send + Sync + std::fmt::Debug {
    fn tag(&self) -> &'static str;

    /// Source file extension used by the `Main.<ext>` naming convention.
    fn extension(&self) -> &'static str;

    fn image(&self) -> ImageRef;

    /// `None` means compilation is skipped (interpreted language).
    fn compile_command(&self, source_file: &str) -> Option<Vec<String>>;

    fn run_command(&self, source_file: &str, input_file: &str) -> Vec<String>;

    async fn compile(&self, ctx: &ExecutionContext<'_>) -> Result<CompileOutcome, EnvironmentError> {
        match self.compile_command(&ctx.source_file) {
            None => Ok(CompileOutcome::Skipped),
            Some(cmd) => {
                let output = ctx
                    .manager
                    .exec(ctx.handle, &cmd, ctx.compile_timeout)
                    .await?;
                Ok(CompileOutcome::Finished(CompileResult::from(output)))
            }
        }
    }

    async fn run(&self, ctx: &ExecutionContext<'_>) -> Result<RunResult, EnvironmentError> {
        let cmd = self.run_command(&ctx.source_file, &ctx.input_file);
        let output = ctx.manager.exec(ctx.handle, &cmd, ctx.run_timeout).await?;
        Ok(RunResult::from(output))
    }
}

/// Strip the extension: `/usr/local/submission/Main.cpp` → `Main`'s binary
/// path. Falls back to the full name when there is no extension to strip.
pub(crate) fn artifact_path(source_file: &str) -> String {
    match source_file.rfind('.') {
        Some(dot) if dot > source_file.rfind('/').map_or(0, |slash| slash + 1) => {
            source_file[..dot].to_string()
        }
        _ => source_file.to_string(),
    }
}

/// Wrap a pipeline in `sh -c` so stdin redirection from the test file works
/// inside the environment.
pub(crate) fn shell(command: String) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), command]
}
