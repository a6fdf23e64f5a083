use bollard::container::ListContainersOptions;
use bollard::Docker;
use clap::{Parser, Subcommand};
use executor::{ExecutionScheduler, ExecutorConfig, SubmissionExecutor, SubmissionStore};
use languages::HandlerRegistry;
use models::{SubmissionRequest, SubmissionStatus};
use runtime::{docker, DockerManager, EnvironmentManager};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "judgr",
    about = "Sandboxed execution engine for judging untrusted code",
    version,
    long_about = "Judges untrusted code submissions inside isolated containers.\n\nExamples:\n  judgr run cpp solution.cpp input.txt        # Judge a C++ submission\n  judgr run --timeout 2 cpp loop.cpp in.txt   # With a 2 second run limit\n  judgr build-image ./sandbox judge-cpp       # Build a judge image\n  judgr ps                                     # List judge containers"
)]
struct Judgr {
    #[command(subcommand)]
    command: Commands,

    /// Run in verbose mode with detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run in debug mode with extensive execution details
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Judge one submission: compile (if needed) and run it against a test input
    Run {
        /// Language tag (c, cpp, java, py; c++ is accepted for cpp)
        language: String,

        /// Path to the source file
        source: PathBuf,

        /// Path to the test input file
        input: PathBuf,

        /// Run timeout in seconds
        #[arg(short, long, default_value_t = 5)]
        timeout: u64,

        /// Compile timeout in seconds
        #[arg(long, default_value_t = 30)]
        compile_timeout: u64,

        /// Parallel execution slots
        #[arg(long, default_value_t = 4)]
        capacity: usize,

        /// Bounded wait queue beyond the execution slots
        #[arg(long, default_value_t = 16)]
        queue: usize,
    },

    /// Build an environment image from a build context directory
    BuildImage {
        /// Directory containing a Dockerfile
        context: PathBuf,

        /// Name to tag the built image with
        name: String,
    },

    /// List judge containers known to the local Docker daemon
    Ps,
}

async fn handle_signals(manager: Arc<DockerManager>) {
    // Docker operations can hang; force exit if cleanup takes too long.
    let hard_exit_time = Duration::from_secs(10);

    match tokio::signal::ctrl_c().await {
        Ok(_) => println!("Received Ctrl+C, shutting down and cleaning up..."),
        Err(e) => {
            eprintln!("Warning: Failed to listen for ctrl+c event: {}", e);
            println!("Shutting down and cleaning up...");
        }
    }

    let _ = std::thread::spawn(move || {
        std::thread::sleep(hard_exit_time);
        eprintln!(
            "Cleanup taking too long (over {} seconds), forcing exit...",
            hard_exit_time.as_secs()
        );
        logging::error("Forced exit due to cleanup timeout");
        std::process::exit(1);
    });

    match tokio::time::timeout(Duration::from_secs(5), manager.cleanup_environments()).await {
        Ok(_) => logging::debug("Environment cleanup completed"),
        Err(_) => logging::warning("Environment cleanup timed out, continuing with shutdown"),
    }

    std::process::exit(130);
}

/// Copy the submission files into a fresh directory following the fixed
/// naming convention the handlers expect: `Main.<ext>` plus `test.txt`.
fn stage_submission(
    registry: &HandlerRegistry,
    language: &str,
    source: &PathBuf,
    input: &PathBuf,
) -> Result<(tempfile::TempDir, SubmissionRequest), String> {
    let extension = match registry.resolve(language) {
        Ok(handler) => handler.extension(),
        // Let the executor record the Unsupported terminal state; staging
        // just needs some file name.
        Err(_) => "txt",
    };

    let dir = tempfile::tempdir().map_err(|e| format!("Failed to create submission dir: {}", e))?;
    let staged_source = dir.path().join(format!("Main.{}", extension));
    let staged_input = dir.path().join("test.txt");

    std::fs::copy(source, &staged_source)
        .map_err(|e| format!("Failed to stage {}: {}", source.display(), e))?;
    std::fs::copy(input, &staged_input)
        .map_err(|e| format!("Failed to stage {}: {}", input.display(), e))?;

    let request = SubmissionRequest {
        id: Uuid::new_v4(),
        language: language.to_string(),
        source_path: staged_source,
        input_path: staged_input,
    };

    Ok((dir, request))
}

async fn run_submission(
    language: String,
    source: PathBuf,
    input: PathBuf,
    timeout: u64,
    compile_timeout: u64,
    capacity: usize,
    queue: usize,
    verbose: bool,
) -> i32 {
    if !docker::is_available().await {
        eprintln!("Error: Docker is not available. Judging requires an isolation platform.");
        return 1;
    }

    let manager = match DockerManager::new() {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    tokio::spawn(handle_signals(Arc::clone(&manager)));

    let registry = Arc::new(HandlerRegistry::new());
    let config = ExecutorConfig {
        compile_timeout: Duration::from_secs(compile_timeout),
        run_timeout: Duration::from_secs(timeout),
        ..Default::default()
    };
    let submission_executor = SubmissionExecutor::new(
        Arc::clone(&manager) as Arc<dyn EnvironmentManager>,
        Arc::clone(&registry),
        Arc::new(ExecutionScheduler::new(capacity, queue)),
        Arc::new(SubmissionStore::new()),
        config,
    );

    let (_dir, request) = match stage_submission(&registry, &language, &source, &input) {
        Ok(staged) => staged,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match submission_executor.execute(request).await {
        Ok(submission) => {
            let (mark, label) = match submission.status {
                SubmissionStatus::Completed => ("✅", "completed"),
                SubmissionStatus::CompileFailed => ("❌", "compile failed"),
                SubmissionStatus::RuntimeError => ("❌", "runtime error"),
                SubmissionStatus::TimedOut => ("⏱️", "time limit exceeded"),
                SubmissionStatus::Unsupported => ("❌", "unsupported language"),
                _ => ("❌", "failed"),
            };
            println!("\n{} Submission {}: {}", mark, submission.id, label);

            if let Some(elapsed) = submission.elapsed {
                println!("  Elapsed: {} ms", elapsed.as_millis());
            }
            if !submission.stdout.trim().is_empty() {
                println!("  Output:");
                for line in submission.stdout.lines() {
                    println!("    {}", line);
                }
            }
            if !submission.stderr.trim().is_empty()
                && (verbose || submission.status != SubmissionStatus::Completed)
            {
                println!("  Diagnostics:");
                for line in submission.stderr.lines() {
                    println!("    {}", line);
                }
            }

            if submission.status == SubmissionStatus::Completed {
                0
            } else {
                1
            }
        }
        Err(e) => {
            logging::error(&format!("Judging attempt failed: {}", e));
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn list_judge_containers() -> i32 {
    let docker = match Docker::connect_with_local_defaults() {
        Ok(docker) => docker,
        Err(e) => {
            eprintln!("Error: Docker connection failed: {}", e);
            return 1;
        }
    };

    let mut filters = HashMap::new();
    filters.insert("name".to_string(), vec!["judgr-".to_string()]);

    let options = ListContainersOptions {
        all: true,
        filters,
        ..Default::default()
    };

    match docker.list_containers(Some(options)).await {
        Ok(containers) => {
            if containers.is_empty() {
                println!("No judge containers found");
            } else {
                for container in containers {
                    println!(
                        "{}  {}  {}",
                        container.id.as_deref().unwrap_or("<unknown>"),
                        container.image.as_deref().unwrap_or("<unknown>"),
                        container.state.as_deref().unwrap_or("<unknown>"),
                    );
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error listing containers: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Judgr::parse();

    if cli.debug {
        logging::set_log_level(logging::LogLevel::Debug);
        logging::debug("Debug mode enabled - showing detailed logs");
    } else if cli.verbose {
        logging::set_log_level(logging::LogLevel::Info);
    } else {
        logging::set_log_level(logging::LogLevel::Warning);
    }

    let exit_code = match cli.command {
        Commands::Run {
            language,
            source,
            input,
            timeout,
            compile_timeout,
            capacity,
            queue,
        } => {
            run_submission(
                language,
                source,
                input,
                timeout,
                compile_timeout,
                capacity,
                queue,
                cli.verbose || cli.debug,
            )
            .await
        }

        Commands::BuildImage { context, name } => {
            let manager = match DockerManager::new() {
                Ok(manager) => manager,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            match manager.build_image(&context, &name).await {
                Ok(image) => {
                    println!("✅ Built image: {}", image);
                    0
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }

        Commands::Ps => list_judge_containers().await,
    };

    std::process::exit(exit_code);
}
