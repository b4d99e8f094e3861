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

//! Error types for the certificate manager.
//!
//! Every failure is scoped to a single job: the runner logs it and moves on
//! to the next host. The variants mirror the stages of a renewal sequence
//! (credentials, transport, protocol, decoding, signatures) so callers can
//! tell where a job stopped.

use thiserror::Error;

/// Result type alias using [`CertManagerError`].
pub type Result<T> = std::result::Result<T, CertManagerError>;

/// Errors that can occur while renewing a certificate.
#[derive(Debug, Error)]
pub enum CertManagerError {
    /// Dial, TLS handshake, transport or connectivity probe failure.
    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    /// Client certificate, client key or CA bundle could not be loaded.
    #[error("Credential load failure: {0}")]
    CredentialLoad(String),

    /// The CA answered with an empty, malformed or faulted response.
    #[error("Protocol failure: {0}")]
    Protocol(String),

    /// A certificate payload could not be recovered.
    #[error("Certificate decode failure: {0}")]
    Decode(String),

    /// A signature check failed.
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// The CA issued a certificate that is already expired.
    #[error("Issued certificate already expired (NotAfter {not_after})")]
    CertificateExpired {
        /// NotAfter of the rejected certificate.
        not_after: String,
    },

    /// Configuration file or value is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A validity string could not be parsed.
    #[error("Invalid duration {input:?}: {reason}")]
    InvalidDuration {
        /// The offending input.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A command on the target host failed.
    #[error("Remote command failed on {host}: {message}")]
    RemoteCommand {
        /// Target host.
        host: String,
        /// Failure description.
        message: String,
    },

    /// The deadline bound to the call expired.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The deadline bound to the call was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// DER encoding/decoding error.
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CertManagerError {
    /// Create a connectivity error with the given message.
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Create a credential load error with the given message.
    pub fn credential_load(msg: impl Into<String>) -> Self {
        Self::CredentialLoad(msg.into())
    }

    /// Create a protocol error with the given message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a decode error with the given message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a signature error with the given message.
    pub fn signature_invalid(msg: impl Into<String>) -> Self {
        Self::SignatureInvalid(msg.into())
    }

    /// Create an expired certificate error.
    pub fn certificate_expired(not_after: impl Into<String>) -> Self {
        Self::CertificateExpired {
            not_after: not_after.into(),
        }
    }

    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid duration error.
    pub fn invalid_duration(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a remote command error.
    pub fn remote_command(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCommand {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error was raised by the deadline rather than the call itself.
    pub fn is_deadline(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }

    /// Returns true if the job failed before any network traffic.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::CredentialLoad(_)
                | Self::Config(_)
                | Self::InvalidDuration { .. }
                | Self::SignatureInvalid(_)
        )
    }
}
