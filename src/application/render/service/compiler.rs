use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("compiler `{}` is not available: {source}", program.display())]
    NotFound {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to run compiler: {0}")]
    Io(#[source] io::Error),
    #[error("compiler pass {pass} failed (exit {exit_code:?})")]
    Failed {
        pass: u8,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("compiler pass {pass} timed out after {}s", timeout.as_secs_f64())]
    Timeout { pass: u8, timeout: Duration },
}

/// Thin wrapper around a `pdflatex`-compatible executable.
#[derive(Debug, Clone)]
pub(crate) struct LatexCompiler {
    program: PathBuf,
    timeout: Duration,
}

impl LatexCompiler {
    pub(crate) fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    /// Run one non-interactive pass over `source`, writing every output file
    /// into `output_dir`.
    ///
    /// The child is killed if it outlives the configured timeout.
    pub(crate) async fn run_pass(
        &self,
        source: &Path,
        output_dir: &Path,
        pass: u8,
    ) -> Result<(), CompilerError> {
        let started_at = Instant::now();

        let child = Command::new(&self.program)
            .arg(format!("-output-directory={}", output_dir.display()))
            .arg("-synctex=1")
            .arg("-no-shell-escape")
            .arg("-interaction=nonstopmode")
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                warn!(
                    target = "application::render::compiler",
                    op = "compiler::run_pass",
                    result = "error",
                    pass,
                    program = %self.program.display(),
                    error_code = "spawn_compiler",
                    error = %err,
                    "Failed to spawn compiler"
                );
                if err.kind() == ErrorKind::NotFound {
                    CompilerError::NotFound {
                        program: self.program.clone(),
                        source: err,
                    }
                } else {
                    CompilerError::Io(err)
                }
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(CompilerError::Io)?,
            Err(_) => {
                warn!(
                    target = "application::render::compiler",
                    op = "compiler::run_pass",
                    result = "timeout",
                    pass,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Compiler timed out and was killed"
                );
                return Err(CompilerError::Timeout {
                    pass,
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let exit_code = output.status.code();
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "application::render::compiler",
                op = "compiler::run_pass",
                result = "error",
                pass,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "compiler_failed",
                stderr = %stderr,
                stdout = %stdout,
                "Compiler pass failed"
            );
            return Err(CompilerError::Failed {
                pass,
                exit_code,
                stdout,
                stderr,
            });
        }

        info!(
            target = "application::render::compiler",
            op = "compiler::run_pass",
            result = "ok",
            pass,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            output_dir = %output_dir.display(),
            "Compiler pass finished"
        );

        Ok(())
    }
}
