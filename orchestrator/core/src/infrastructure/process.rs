// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

//! External process execution for git and compose invocations

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} {args} exited with status {code}: {output}")]
    Failed {
        program: String,
        args: String,
        code: i32,
        output: String,
    },
}

/// One external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn display_args(&self) -> String {
        self.args.join(" ")
    }
}

/// Combined stdout and stderr of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
}

impl CommandOutput {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines().filter(|l| !l.trim().is_empty())
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion; a non-zero exit status is an error
    async fn run(&self, command: CommandSpec) -> Result<CommandOutput, ProcessError>;
}

/// Runs commands as child processes via `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: CommandSpec) -> Result<CommandOutput, ProcessError> {
        debug!(program = %command.program, args = %command.display_args(), "Running command");

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args).stdin(std::process::Stdio::null());
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| ProcessError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ProcessError::Failed {
                program: command.program,
                args: command.args.join(" "),
                code: output.status.code().unwrap_or(-1),
                output: combined.trim().to_string(),
            });
        }

        Ok(CommandOutput { output: combined })
    }
}
