// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Job file discovery and loading.

use std::path::{Path, PathBuf};

use crate::error::{CertManagerError, Result};

use super::job::{Job, JobConfig};

/// Configuration directory used when none is given.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/embed-cert-manager.d";

/// Subdirectory holding one file per job.
pub const JOBS_DIR: &str = "jobs.d";

/// Loads the jobs of a configuration directory.
///
/// Every `*.toml` file in `<dir>/jobs.d` is one job, loaded in file name
/// order. A file that fails to parse or validate is logged and skipped so
/// the remaining hosts are still served; disabled jobs are skipped too.
///
/// # Example
///
/// ```no_run
/// use embed_cert_manager::config::JobLoader;
///
/// let jobs = JobLoader::new()
///     .with_path("/srv/ecm")
///     .load()
///     .unwrap();
/// for job in &jobs {
///     println!("{}", job.name);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JobLoader {
    config_dir: PathBuf,
}

impl Default for JobLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl JobLoader {
    /// Create a loader for [`DEFAULT_CONFIG_DIR`].
    pub fn new() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
        }
    }

    /// Use another configuration directory.
    pub fn with_path(mut self, dir: impl AsRef<Path>) -> Self {
        self.config_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.config_dir.join(JOBS_DIR)
    }

    /// Load all enabled jobs.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the jobs directory cannot be read or holds no job
    /// files at all.
    pub fn load(&self) -> Result<Vec<Job>> {
        let files = self.job_files()?;

        let mut jobs = Vec::new();
        for path in files {
            match load_job_file(&path) {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => {}
                Err(e) => tracing::error!("Skipping {}: {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} job(s)", jobs.len());
        Ok(jobs)
    }

    /// Job files in name order.
    fn job_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.jobs_dir();
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            CertManagerError::config(format!("Failed to read {}: {e}", dir.display()))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_toml = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
            if path.is_file() && is_toml {
                tracing::debug!("Adding job file {}", path.display());
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(CertManagerError::config(format!(
                "no job files found in {}",
                dir.display()
            )));
        }

        files.sort();
        Ok(files)
    }
}

/// Load one job file.
///
/// Returns `Ok(None)` for a disabled job.
pub fn load_job_file(path: &Path) -> Result<Option<Job>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CertManagerError::config(format!("Failed to read {}: {e}", path.display())))?;

    let config = JobConfig::from_toml(&content)?;

    let name = match config.job.host.as_deref().map(str::trim) {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::warn!(
                "{} has no job.host, assuming {:?}",
                path.display(),
                stem
            );
            stem
        }
    };

    if !config.job.enabled {
        tracing::info!("Job {} not enabled, skipping", name);
        return Ok(None);
    }

    config.validate()?;

    let ca_cert_pem = config.ca.ca_cert.as_deref().and_then(|p| load_ca_cert(&name, p));

    Job::from_config(name, config, ca_cert_pem).map(Some)
}

fn load_ca_cert(job: &str, path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(pem) => {
            tracing::info!("Job {}: loaded CA certificate {}", job, path.display());
            Some(pem)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Job {}: CA certificate {} not found", job, path.display());
            None
        }
        Err(e) => {
            tracing::error!(
                "Job {}: failed to read CA certificate {}: {}",
                job,
                path.display(),
                e
            );
            None
        }
    }
}
