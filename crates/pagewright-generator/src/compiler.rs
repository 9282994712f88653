//! External content compiler boundary.
//!
//! The compiler receives [`CompilerFlags`] as JSON on stdin and answers with
//! newline-delimited JSON on stdout. The first line carrying a `kind` field
//! is the answer and ends the exchange: the process is stopped and whatever
//! it printed besides the answer is passed through to the log.

use std::{future::Future, path::PathBuf, process::Stdio};

use pagewright_core::{CompilerFlags, CompilerMessage, config::CompilerConfig};
use serde_json::Value;
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines},
    process::Command,
};
use tracing::{debug, info, instrument, warn};

/// Compiler boundary errors.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// The compiler process could not be started.
    #[error("failed to start compiler `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A pipe task panicked or was cancelled.
    #[error("compiler pipe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Pipe I/O with the compiler failed.
    #[error("compiler I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Flags could not be encoded.
    #[error("failed to encode compiler flags: {0}")]
    Encode(#[from] serde_json::Error),

    /// A message line did not match any known message.
    #[error("malformed compiler message `{line}`: {source}")]
    Malformed {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The compiler finished without answering.
    #[error("compiler exited ({status}) without a message{}", stderr_suffix(.stderr))]
    NoMessage { status: String, stderr: String },
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompilerError>;

/// A content compiler reachable across a process or test boundary.
pub trait Compiler {
    /// Hand the flags to the compiler and wait for its single answer.
    fn compile(&self, flags: &CompilerFlags) -> impl Future<Output = Result<CompilerMessage>> + Send;
}

/// Compiler run as a child process.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl ProcessCompiler {
    /// Create a compiler invocation from configuration.
    #[must_use]
    pub fn new(config: &CompilerConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: working_dir.into(),
        }
    }
}

impl Compiler for ProcessCompiler {
    #[instrument(skip(self, flags), fields(program = %self.program))]
    async fn compile(&self, flags: &CompilerFlags) -> Result<CompilerMessage> {
        let payload = serde_json::to_vec(flags)?;
        debug!(bytes = payload.len(), "sending flags to compiler");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompilerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Writing runs beside the reads so a large payload cannot deadlock
        // against a compiler that prints before draining stdin. Dropping
        // stdin at the end signals EOF.
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                match stdin.write_all(&payload).await {
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            })
        });
        let stderr = tokio::spawn(drain_stderr(child.stderr.take()));
        let mut stdout = child.stdout.take().map(|out| BufReader::new(out).lines());

        let message = match stdout.as_mut() {
            Some(lines) => next_message(lines).await?,
            None => None,
        };

        if let Some(message) = message {
            // The answer is final; the compiler has nothing left to do.
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "compiler already gone");
            }
            tokio::spawn(async move {
                if let Some(mut lines) = stdout {
                    while let Ok(Some(line)) = lines.next_line().await {
                        info!(line = %line, "compiler output");
                    }
                }
                if let Ok(status) = child.wait().await {
                    debug!(%status, "compiler exited");
                }
            });
            return Ok(message);
        }

        if let Some(writer) = writer {
            writer.await??;
        }
        let status = child.wait().await?;
        let stderr = stderr.await??;
        debug!(%status, "compiler exited without a message");

        Err(CompilerError::NoMessage {
            status: status.to_string(),
            stderr,
        })
    }
}

/// Read stdout lines until the first message, logging everything before it.
async fn next_message<R>(lines: &mut Lines<R>) -> Result<Option<CompilerMessage>>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line)? {
            Some(message) => return Ok(Some(message)),
            None => info!(line = %line, "compiler output"),
        }
    }
    Ok(None)
}

/// Classify one stdout line: a message, or plain output.
fn parse_line(line: &str) -> Result<Option<CompilerMessage>> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return Ok(None);
    }

    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(trimmed) else {
        return Ok(None);
    };
    if !object.contains_key("kind") {
        return Ok(None);
    }

    serde_json::from_value(Value::Object(object))
        .map(Some)
        .map_err(|source| CompilerError::Malformed {
            line: trimmed.to_string(),
            source,
        })
}

/// Log stderr line by line and keep it for error reports.
async fn drain_stderr(stderr: Option<impl AsyncRead + Unpin>) -> Result<String> {
    let mut collected = String::new();
    let Some(stderr) = stderr else {
        return Ok(collected);
    };

    let mut lines = BufReader::new(stderr).lines();
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            warn!(line = %line, "compiler stderr");
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    Ok(collected)
}
