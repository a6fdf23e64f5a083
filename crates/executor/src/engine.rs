use crate::scheduler::{ExecutionScheduler, SchedulerError};
use crate::store::SubmissionStore;
use languages::{ExecutionContext, HandlerRegistry, LanguageHandler};
use models::{
    CompileOutcome, EnvironmentHandle, EnvironmentSpec, RunResult, Submission, SubmissionRequest,
    SubmissionStatus, Verdict, MOUNT_ROOT,
};
use runtime::{EnvironmentError, EnvironmentManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

/// Failures of the judging attempt itself. Submission-caused outcomes
/// (compile errors, runtime errors, timeouts) are terminal statuses on the
/// record, never errors; the caller decides whether an infrastructure
/// failure warrants a retry.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
    /// Grace given to `stop` before the platform escalates to a kill.
    pub stop_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            compile_timeout: Duration::from_secs(30),
            run_timeout: Duration::from_secs(5),
            stop_grace: Duration::from_secs(1),
        }
    }
}

/// Drives one submission end-to-end: resolve handler, acquire an
/// environment through the scheduler, compile, run, record the outcome,
/// release the environment on every exit path.
pub struct SubmissionExecutor {
    manager: Arc<dyn EnvironmentManager>,
    registry: Arc<HandlerRegistry>,
    scheduler: Arc<ExecutionScheduler>,
    store: Arc<SubmissionStore>,
    config: ExecutorConfig,
}

impl SubmissionExecutor {
    pub fn new(
        manager: Arc<dyn EnvironmentManager>,
        registry: Arc<HandlerRegistry>,
        scheduler: Arc<ExecutionScheduler>,
        store: Arc<SubmissionStore>,
        config: ExecutorConfig,
    ) -> Self {
        SubmissionExecutor {
            manager,
            registry,
            scheduler,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SubmissionStore> {
        &self.store
    }

    pub async fn execute(&self, request: SubmissionRequest) -> Result<Submission, ExecutionError> {
        self.execute_with_cancel(request, None).await
    }

    /// Like `execute`, but the submission can be cancelled externally by
    /// sending `true` on the watch channel. Cancellation force-kills the
    /// owned environment and ends the submission in `Cancelled`.
    pub async fn execute_with_cancel(
        &self,
        request: SubmissionRequest,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Submission, ExecutionError> {
        let id = request.id;
        self.store.insert(Submission::new(&request));

        // Fail fast before consuming a scarce slot or environment.
        let handler = match self.registry.resolve(&request.language) {
            Ok(handler) => handler,
            Err(e) => {
                logging::submission(id, &e.to_string());
                self.store
                    .update(id, |s| s.transition(SubmissionStatus::Unsupported));
                return Ok(self.snapshot(id));
            }
        };

        let slot = match self.scheduler.admit().await {
            Ok(slot) => slot,
            Err(e) => {
                self.store.update(id, |s| {
                    s.stderr = e.to_string();
                    s.transition(SubmissionStatus::InfraFailed);
                });
                return Err(e.into());
            }
        };

        let image = handler.image();
        let spec = EnvironmentSpec::new(
            image.name,
            image.version.map(str::to_string),
            submission_dir(&request.source_path),
            id,
        );

        let handle = match self.manager.create(&spec).await {
            Ok(handle) => handle,
            Err(e) => {
                self.store.update(id, |s| {
                    s.stderr = e.to_string();
                    s.transition(SubmissionStatus::InfraFailed);
                });
                drop(slot);
                return Err(e.into());
            }
        };

        let result = self.drive(handler.as_ref(), &handle, &request, cancel).await;

        // Unconditional release, on every exit path. Release failures are
        // reported on the side and never overwrite the verdict above.
        self.release(id, &handle).await;
        drop(slot);

        match result {
            Ok(()) => Ok(self.snapshot(id)),
            Err(e) => {
                self.store.update(id, |s| {
                    if !s.status.is_terminal() {
                        s.stderr = e.to_string();
                        s.transition(SubmissionStatus::InfraFailed);
                    }
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        handler: &dyn LanguageHandler,
        handle: &EnvironmentHandle,
        request: &SubmissionRequest,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<(), ExecutionError> {
        let id = request.id;

        self.manager.start(handle).await?;

        let ctx = ExecutionContext {
            manager: self.manager.as_ref(),
            handle,
            source_file: mounted_path(&request.source_path),
            input_file: mounted_path(&request.input_path),
            compile_timeout: self.config.compile_timeout,
            run_timeout: self.config.run_timeout,
        };

        if cancel_requested(&cancel) {
            return self.cancel(id, handle).await;
        }

        self.store
            .update(id, |s| s.transition(SubmissionStatus::Compiling));
        logging::submission(id, &format!("Compiling ({})", handler.tag()));

        match handler.compile(&ctx).await? {
            CompileOutcome::Finished(compiled) if !compiled.succeeded() => {
                logging::submission(id, "Compilation failed");
                self.store.update(id, |s| {
                    s.stderr = compiled.stderr.clone();
                    s.verdict = Some(Verdict::CompileError);
                    s.transition(SubmissionStatus::CompileFailed);
                });
                return Ok(());
            }
            _ => {}
        }

        if cancel_requested(&cancel) {
            return self.cancel(id, handle).await;
        }

        // The environment may have died underneath us (daemon restart,
        // external kill); check before running in it.
        if !self.manager.is_running(handle).await? {
            return Err(
                EnvironmentError::Exec("environment terminated externally".to_string()).into(),
            );
        }

        self.store
            .update(id, |s| s.transition(SubmissionStatus::Running));
        logging::submission(id, "Running");

        let run = tokio::select! {
            run = handler.run(&ctx) => run?,
            _ = wait_cancelled(&mut cancel) => {
                let _ = self.manager.kill(handle).await;
                self.store
                    .update(id, |s| s.transition(SubmissionStatus::Cancelled));
                logging::submission(id, "Cancelled");
                return Ok(());
            }
        };

        self.record_run(id, run);
        Ok(())
    }

    fn record_run(&self, id: Uuid, run: RunResult) {
        self.store.update(id, |s| {
            s.stdout = run.stdout.clone();
            s.stderr = run.stderr.clone();
            s.exit_code = Some(run.exit_code);
            s.elapsed = Some(run.duration);
            if run.timed_out {
                s.verdict = Some(Verdict::TimeLimit);
                s.transition(SubmissionStatus::TimedOut);
            } else if run.exit_code != 0 {
                s.verdict = Some(Verdict::RuntimeError);
                s.transition(SubmissionStatus::RuntimeError);
            } else {
                s.verdict = Some(Verdict::Executed);
                s.transition(SubmissionStatus::Completed);
            }
        });
    }

    async fn cancel(&self, id: Uuid, handle: &EnvironmentHandle) -> Result<(), ExecutionError> {
        let _ = self.manager.kill(handle).await;
        self.store
            .update(id, |s| s.transition(SubmissionStatus::Cancelled));
        logging::submission(id, "Cancelled");
        Ok(())
    }

    async fn release(&self, id: Uuid, handle: &EnvironmentHandle) {
        if let Err(e) = self.manager.stop(handle, self.config.stop_grace).await {
            logging::warning(&format!("[{}] Environment stop failed: {}", id, e));
            self.store
                .update(id, |s| s.release_failures.push(e.to_string()));
        }

        match self.manager.remove(handle).await {
            Ok(()) => logging::submission(id, "Environment released"),
            Err(e) => {
                // The handle stays in the manager's table so an out-of-band
                // sweep can reclaim it; no inline retry.
                logging::error(&format!("[{}] Environment remove failed: {}", id, e));
                self.store
                    .update(id, |s| s.release_failures.push(e.to_string()));
            }
        }
    }

    fn snapshot(&self, id: Uuid) -> Submission {
        self.store
            .get(id)
            .expect("submission record exists for the executor that created it")
    }
}

/// The host directory mounted into the environment: the submission root
/// holding both the source file and the test input.
fn submission_dir(source_path: &Path) -> PathBuf {
    source_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// In-environment path of a submission file, per the fixed mount convention.
fn mounted_path(host_path: &Path) -> String {
    let name = host_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}/{}", MOUNT_ROOT, name)
}

fn cancel_requested(cancel: &Option<watch::Receiver<bool>>) -> bool {
    matches!(cancel, Some(rx) if *rx.borrow())
}

async fn wait_cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            if *rx.borrow() {
                return;
            }
            while rx.changed().await.is_ok() {
                if *rx.borrow() {
                    return;
                }
            }
            // Sender dropped without cancelling; never resolve.
            futures::future::pending::<()>().await
        }
        None => futures::future::pending::<()>().await,
    }
}
