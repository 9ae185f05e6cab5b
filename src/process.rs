//! External process execution.
//!
//! Every external tool (container engine, make, npm) is driven through a
//! [`CommandRunner`]. Commands are argument vectors and are never handed to a
//! shell, so names and paths are passed through untouched.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::errors::{Result, ToolchainError};

/// A program plus its arguments, optionally run from a given directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run from `dir` instead of our own working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn quote(part: &str) -> String {
            if part.is_empty() {
                return "\"\"".to_string();
            }
            if part.chars().any(|c| c.is_whitespace() || c == '"') {
                return format!("\"{}\"", part.replace('"', "\\\""));
            }
            part.to_string()
        }

        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Abstraction over process execution for testability.
/// Real implementation: `SystemRunner`. Test double: `testing::MockRunner`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion and return everything it wrote to stdout.
    ///
    /// A non-zero exit is an [`ToolchainError::Execution`].
    async fn run(&self, command: &CommandLine) -> Result<String>;
}

/// Runs commands on the host, streaming their output to ours as it arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandLine) -> Result<String> {
        let rendered = command.to_string();
        debug!(command = %rendered, dir = ?command.current_dir, "Spawning");

        let mut process = Command::new(&command.program);
        process.args(&command.args);
        if let Some(dir) = &command.current_dir {
            process.current_dir(dir);
        }
        let mut child = process
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolchainError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (captured_out, captured_err) = tokio::try_join!(
            tee(stdout, tokio::io::stdout()),
            tee(stderr, tokio::io::stderr()),
        )
        .map_err(|e| anyhow::Error::new(e).context(format!("Failed to relay output of `{}`", rendered)))?;

        let status = child
            .wait()
            .await
            .map_err(|e| anyhow::Error::new(e).context(format!("Failed to wait for `{}`", rendered)))?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            debug!(command = %rendered, status = code, "Command failed");
            return Err(ToolchainError::Execution {
                command: rendered,
                status: code,
                stderr: String::from_utf8_lossy(&captured_err).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&captured_out).into_owned())
    }
}

/// Copy `reader` into `writer` chunk by chunk, keeping a copy of everything.
async fn tee<R, W>(reader: Option<R>, mut writer: W) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut captured = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        captured.extend_from_slice(&buf[..n]);
    }
    Ok(captured)
}
