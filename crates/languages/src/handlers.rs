use crate::{artifact_path, shell, ImageRef, LanguageHandler};

/// C: compile with gcc to a binary named after the source file.
#[derive(Debug)]
pub struct CHandler;

impl LanguageHandler for CHandler {
    fn tag(&self) -> &'static str {
        "c"
    }

    fn extension(&self) -> &'static str {
        "c"
    }

    fn image(&self) -> ImageRef {
        ImageRef {
            name: "gcc",
            version: Some("13"),
        }
    }

    fn compile_command(&self, source_file: &str) -> Option<Vec<String>> {
        Some(vec![
            "gcc".to_string(),
            source_file.to_string(),
            "-o".to_string(),
            artifact_path(source_file),
        ])
    }

    fn run_command(&self, source_file: &str, input_file: &str) -> Vec<String> {
        shell(format!("{} < {}", artifact_path(source_file), input_file))
    }
}

/// C++: same shape as C, compiled with g++.
#[derive(Debug)]
pub struct CppHandler;

impl LanguageHandler for CppHandler {
    fn tag(&self) -> &'static str {
        "cpp"
    }

    fn extension(&self) -> &'static str {
        "cpp"
    }

    fn image(&self) -> ImageRef {
        ImageRef {
            name: "gcc",
            version: Some("13"),
        }
    }

    fn compile_command(&self, source_file: &str) -> Option<Vec<String>> {
        Some(vec![
            "g++".to_string(),
            source_file.to_string(),
            "-o".to_string(),
            artifact_path(source_file),
        ])
    }

    fn run_command(&self, source_file: &str, input_file: &str) -> Vec<String> {
        shell(format!("{} < {}", artifact_path(source_file), input_file))
    }
}

/// Java: javac emits `<Class>.class` next to the source; run resolves the
/// class name from the file name.
#[derive(Debug)]
pub struct JavaHandler;

impl JavaHandler {
    fn class_name(source_file: &str) -> String {
        let artifact = artifact_path(source_file);
        match artifact.rfind('/') {
            Some(slash) => artifact[slash + 1..].to_string(),
            None => artifact,
        }
    }

    fn class_dir(source_file: &str) -> String {
        match source_file.rfind('/') {
            Some(slash) => source_file[..slash].to_string(),
            None => ".".to_string(),
        }
    }
}

impl LanguageHandler for JavaHandler {
    fn tag(&self) -> &'static str {
        "java"
    }

    fn extension(&self) -> &'static str {
        "java"
    }

    fn image(&self) -> ImageRef {
        ImageRef {
            name: "eclipse-temurin",
            version: Some("17-jdk"),
        }
    }

    fn compile_command(&self, source_file: &str) -> Option<Vec<String>> {
        Some(vec!["javac".to_string(), source_file.to_string()])
    }

    fn run_command(&self, source_file: &str, input_file: &str) -> Vec<String> {
        shell(format!(
            "java -cp {} {} < {}",
            Self::class_dir(source_file),
            Self::class_name(source_file),
            input_file
        ))
    }
}

/// Python: no compile step, `compile` reports skipped.
#[derive(Debug)]
pub struct PythonHandler;

impl LanguageHandler for PythonHandler {
    fn tag(&self) -> &'static str {
        "py"
    }

    fn extension(&self) -> &'static str {
        "py"
    }

    fn image(&self) -> ImageRef {
        ImageRef {
            name: "python",
            version: Some("3.12-slim"),
        }
    }

    fn compile_command(&self, _source_file: &str) -> Option<Vec<String>> {
        None
    }

    fn run_command(&self, source_file: &str, input_file: &str) -> Vec<String> {
        shell(format!("python3 {} < {}", source_file, input_file))
    }
}
