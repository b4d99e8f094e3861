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

//! Shell scripts run on target hosts.
//!
//! Commands in a job file may reference job values as `${section_key}`,
//! for example `${target_cert_path}`. The references are resolved against a
//! closed set of variables when the job is loaded. Rendering prefixes one
//! shell assignment per referenced variable, so the remote shell performs
//! the actual expansion:
//!
//! ```text
//! target_cert_path="/etc/ssl/device.crt"
//! cat > "${target_cert_path}"
//! ```

use std::fmt;

use crate::error::{CertManagerError, Result};

/// A job value that commands may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellVariable {
    /// Job name (the managed host).
    JobHost,
    /// Expected CA server name.
    CaHost,
    /// Contents of the configured CA certificate file.
    CaCacert,
    /// Certificate path on the target.
    TargetCertPath,
    /// Private key path on the target.
    TargetKeyPath,
    /// Subject requested in the CSR.
    TargetSubject,
    /// Subject alternative names requested in the CSR.
    TargetSubjectAltName,
    /// SSH login user.
    TargetSshUser,
    /// Issued certificate summary and PEM. Empty until a certificate exists.
    TargetCertificate,
}

impl ShellVariable {
    /// All known variables.
    pub const ALL: [ShellVariable; 9] = [
        Self::JobHost,
        Self::CaHost,
        Self::CaCacert,
        Self::TargetCertPath,
        Self::TargetKeyPath,
        Self::TargetSubject,
        Self::TargetSubjectAltName,
        Self::TargetSshUser,
        Self::TargetCertificate,
    ];

    /// Name as written between `${` and `}`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobHost => "job_host",
            Self::CaHost => "ca_host",
            Self::CaCacert => "ca_cacert",
            Self::TargetCertPath => "target_cert_path",
            Self::TargetKeyPath => "target_key_path",
            Self::TargetSubject => "target_subject",
            Self::TargetSubjectAltName => "target_subject_alt_name",
            Self::TargetSshUser => "target_ssh_user",
            Self::TargetCertificate => "target_certificate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }
}

impl fmt::Display for ShellVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command together with the variables it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplate {
    command: String,
    variables: Vec<ShellVariable>,
}

impl ScriptTemplate {
    /// Scan `command` for `${...}` references.
    ///
    /// Each variable is listed once, in order of first use. `${` without a
    /// closing brace is left to the shell.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a reference names an unknown variable.
    pub fn parse(command: impl Into<String>) -> Result<Self> {
        let command = command.into();
        let mut variables = Vec::new();
        let mut unknown = Vec::new();
        let mut start = 0;

        while let Some(var_start) = command[start..].find("${") {
            let name_start = start + var_start + 2;
            let Some(var_end) = command[name_start..].find('}') else {
                break;
            };
            let name = &command[name_start..name_start + var_end];

            match ShellVariable::from_name(name) {
                Some(var) if !variables.contains(&var) => variables.push(var),
                Some(_) => {}
                None => unknown.push(name.to_string()),
            }
            start = name_start + var_end + 1;
        }

        if !unknown.is_empty() {
            return Err(CertManagerError::config(format!(
                "unknown shell variable(s): {}",
                unknown
                    .iter()
                    .map(|n| format!("${{{n}}}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(Self { command, variables })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn variables(&self) -> &[ShellVariable] {
        &self.variables
    }

    pub fn references(&self, var: ShellVariable) -> bool {
        self.variables.contains(&var)
    }

    /// Produce the script text: assignments first, then the command.
    pub fn render<F>(&self, mut value_of: F) -> String
    where
        F: FnMut(ShellVariable) -> String,
    {
        let mut script = String::new();
        for var in &self.variables {
            script.push_str(var.name());
            script.push_str("=\"");
            script.push_str(&escape_double_quoted(&value_of(*var)));
            script.push_str("\"\n");
        }
        script.push_str(&self.command);
        if !self.command.ends_with('\n') {
            script.push('\n');
        }
        script
    }
}

/// Escape a value for use inside a double-quoted shell word.
fn escape_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
