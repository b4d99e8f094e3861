// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Job configuration.
//!
//! The configuration directory holds a `jobs.d/` subdirectory with one TOML
//! file per managed host. See [`JobConfig`] for the file format.
//!
//! # Usage
//!
//! ```no_run
//! use embed_cert_manager::config::JobLoader;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let jobs = JobLoader::new()
//!     .with_path("/etc/embed-cert-manager.d")
//!     .load()?;
//!
//! for job in &jobs {
//!     println!("{} -> {}", job.name, job.config.ca.api_url);
//! }
//! # Ok(())
//! # }
//! ```

mod job;
mod loader;
mod script;

pub use job::*;
pub use loader::{DEFAULT_CONFIG_DIR, JOBS_DIR, JobLoader, load_job_file};
pub use script::{ScriptTemplate, ShellVariable};
