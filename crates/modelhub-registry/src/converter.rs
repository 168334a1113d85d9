//! External-command converter
//!
//! Runs a configured program to turn a raw model into its served form. The
//! argument template may reference `{input}` and `{output}`.

use modelhub_kernel::{ConversionError, Converter};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const STDERR_TAIL: usize = 512;

#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    extension: String,
    timeout: Option<Duration>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            extension: "json".to_string(),
            timeout: None,
        }
    }

    /// Builds a converter from `[program, args...]`. Returns `None` for an
    /// empty template.
    pub fn from_template(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn render_args(&self, source: &Path, target: &Path) -> Vec<String> {
        let input = source.to_string_lossy();
        let output = target.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }

    fn failed(&self, source: &Path, message: impl Into<String>) -> ConversionError {
        ConversionError::Failed {
            converter: self.program.clone(),
            path: source.to_path_buf(),
            message: message.into(),
        }
    }
}

impl Converter for CommandConverter {
    fn name(&self) -> &str {
        &self.program
    }

    fn target_extension(&self) -> &str {
        &self.extension
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConversionError> {
        let args = self.render_args(source, target);
        debug!(program = %self.program, ?args, "running converter");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failed(source, format!("spawn failed: {e}")))?;

        // Drain stderr on its own thread so a chatty child cannot block.
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if let Some(timeout) = self.timeout {
                        if started.elapsed() >= timeout {
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(ConversionError::Timeout {
                                converter: self.program.clone(),
                                path: source.to_path_buf(),
                                timeout,
                            });
                        }
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(self.failed(source, format!("wait failed: {e}"))),
            }
        };

        if status.success() {
            return Ok(());
        }

        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let trimmed = stderr.trim();
        let tail = match trimmed.char_indices().rev().nth(STDERR_TAIL) {
            Some((idx, _)) => &trimmed[idx..],
            None => trimmed,
        };
        Err(self.failed(source, format!("{status}: {tail}")))
    }
}
