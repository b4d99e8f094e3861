// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command execution on managed hosts.
//!
//! The [`RemoteExecutor`] trait is the seam between the job runner and the
//! transport. [`SshExecutor`] drives the system OpenSSH client, so host keys,
//! agents and `~/.ssh/config` behave as they do for an operator.
//!
//! Scripts are fed to `sh -s` on stdin rather than passed as an argument,
//! which keeps multi-line certificate values out of the remote command line.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{CertManagerError, Result};

/// Default limit for one remote command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Where and as whom to run commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Identity file. `None` leaves key selection to ssh.
    pub key: Option<PathBuf>,
}

impl SshTarget {
    /// `user@host` form.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs shell scripts on a target host.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `script` with a POSIX shell on `target`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteCommand` if the host cannot be reached or the script
    /// exits unsuccessfully.
    async fn run(&self, target: &SshTarget, script: &str) -> Result<CommandOutput>;
}

/// [`RemoteExecutor`] backed by the `ssh` binary.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    program: PathBuf,
    options: Vec<String>,
    timeout: Duration,
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SshExecutor {
    /// Use `ssh` from `PATH` in batch mode.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ssh"),
            options: vec!["BatchMode=yes".to_string(), "ConnectTimeout=10".to_string()],
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Use another client binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Add a `-o` option, e.g. `StrictHostKeyChecking=accept-new`.
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments passed to the client for `target`.
    pub fn args(&self, target: &SshTarget) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(key) = &target.key {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push("-p".to_string());
        args.push(target.port.to_string());
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push(target.destination());
        args.push("sh".to_string());
        args.push("-s".to_string());
        args
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, target: &SshTarget, script: &str) -> Result<CommandOutput> {
        tracing::info!(
            "Running remote command on {}:{} as {}",
            target.host,
            target.port,
            target.user
        );
        tracing::debug!("Script:\n{}", script);

        let fail = |msg: String| CertManagerError::remote_command(&target.host, msg);

        let mut child = Command::new(&self.program)
            .args(self.args(target))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("failed to start {}: {e}", self.program.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| fail(format!("failed to send script: {e}")))?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| fail(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| fail(format!("failed to collect output: {e}")))?;

        let result = CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        };

        if !output.status.success() {
            return Err(fail(format!(
                "exited with {}: {}",
                output.status,
                result.stderr_lossy().trim()
            )));
        }

        if !result.stderr.is_empty() {
            tracing::debug!("stderr from {}: {}", target.host, result.stderr_lossy().trim());
        }
        Ok(result)
    }
}
