use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use gatecheck_core::errors::GeneratorError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One generator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub work_dir: PathBuf,
    pub script: PathBuf,
    pub args: Vec<OsString>,
}

/// How the generator terminated. `code` is `None` when killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorExit {
    pub code: Option<i32>,
}

impl GeneratorExit {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Produces the artifacts a run verifies.
pub trait Generator {
    fn generate(&self, request: &GenerateRequest) -> Result<GeneratorExit, GeneratorError>;
}

/// Runs `<program> <script> <args...>` as a child process with inherited
/// stdout/stderr.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    pub program: String,
    pub timeout: Option<Duration>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Generator for CommandGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<GeneratorExit, GeneratorError> {
        tracing::info!(
            program = %self.program,
            script = %request.script.display(),
            args = ?request.args,
            "launching generator"
        );
        let mut child = Command::new(&self.program)
            .arg(&request.script)
            .args(&request.args)
            .current_dir(&request.work_dir)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| GeneratorError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let status = match self.timeout {
            None => child.wait().map_err(GeneratorError::Wait)?,
            Some(limit) => wait_bounded(&mut child, limit)?,
        };
        Ok(GeneratorExit {
            code: status.code(),
        })
    }
}

fn wait_bounded(child: &mut Child, limit: Duration) -> Result<std::process::ExitStatus, GeneratorError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(GeneratorError::Wait)? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GeneratorError::Timeout(limit));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
