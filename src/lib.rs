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

//! # embed-cert-manager
//!
//! Keeps the X.509 certificates of embedded hosts fresh. The hosts are too
//! constrained to run an enrollment client themselves, so this crate does it
//! for them: it asks an EJBCA instance which certificates it holds for a
//! host, decides whether a renewal is due, fetches a CSR from the host over
//! SSH, enrolls it through the EJBCA web service over mutual TLS and pushes
//! the issued certificate back.
//!
//! ## Features
//!
//! - **Async-first design** using Tokio
//! - **EJBCA web service calls**: `findCerts`, `pkcs10Request`
//! - **Mutual TLS** with a dedicated trust bundle and optional pinned address
//! - **Renewal policy** with renewal window and rotation age
//! - **Cancellable deadlines** shared by the calls of one job
//! - **Remote execution** through the system OpenSSH client
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use embed_cert_manager::config::JobLoader;
//! use embed_cert_manager::job::JobRunner;
//! use embed_cert_manager::remote::SshExecutor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let jobs = JobLoader::new()
//!         .with_path("/etc/embed-cert-manager.d")
//!         .load()?;
//!
//!     let runner = JobRunner::new(Arc::new(SshExecutor::new()));
//!     let failed = runner.run_all(&jobs).await;
//!     println!("{} of {} job(s) failed", failed, jobs.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Talking to the CA directly
//!
//! ```no_run
//! use std::time::SystemTime;
//!
//! use embed_cert_manager::{ChannelConfig, DeadlineManager, EjbcaClient, RenewalPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChannelConfig::builder()
//!     .client_identity("ra.crt", "ra.key")
//!     .ca_bundle("chain.pem")
//!     .endpoint("https://ca.example.com/ejbca/ejbcaws/ejbcaws")?
//!     .build()?;
//! let client = EjbcaClient::new(&config)?;
//! let deadlines = DeadlineManager::default();
//!
//! let certs = client.find_certs("device01", false, &deadlines.get()).await?;
//! let policy = RenewalPolicy::builder()
//!     .renew_before(std::time::Duration::from_secs(30 * 86400))
//!     .build();
//! println!("{}", policy.evaluate(SystemTime::now(), &certs));
//! # Ok(())
//! # }
//! ```
//!
//! ## Cargo Features
//!
//! - `cli` (default): builds the `embed-cert-manager` binary and
//!   [`logging::init`]

#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod csr;
pub mod deadline;
pub mod duration;
pub mod error;
pub mod job;
pub mod logging;
pub mod operations;
pub mod remote;
pub mod renewal;
pub mod soap;
pub mod tls;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export main types at crate root for convenience
pub use client::EjbcaClient;
pub use config::{Job, JobConfig, JobLoader};
pub use deadline::{Deadline, DeadlineManager};
pub use duration::ValidityDuration;
pub use error::{CertManagerError, Result};
pub use job::{JobOutcome, JobRunner};
pub use remote::{RemoteExecutor, SshExecutor, SshTarget};
pub use renewal::{RenewalDecision, RenewalPolicy};
pub use tls::{Channel, ChannelConfig};
pub use types::{CertificateCandidate, EnrollmentRequest};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent string for HTTP requests.
pub const USER_AGENT: &str = concat!("embed-cert-manager/", env!("CARGO_PKG_VERSION"));
