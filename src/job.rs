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

//! Renewal sequence for one managed host.
//!
//! For each job the runner:
//!
//! 1. builds the mutual TLS channel to the job's CA and probes it,
//! 2. looks up the certificates the CA holds for the host,
//! 3. evaluates the renewal policy (`--force` overrides a valid result),
//! 4. asks the host for a CSR over the remote channel,
//! 5. enrolls the CSR,
//! 6. pushes the issued certificate back to the host.
//!
//! A failed step ends that job. Jobs run one after another.

use std::sync::Arc;
use std::time::SystemTime;

use crate::client::EjbcaClient;
use crate::config::Job;
use crate::csr::extract_csr;
use crate::deadline::DeadlineManager;
use crate::error::Result;
use crate::remote::RemoteExecutor;
use crate::renewal::RenewalDecision;
use crate::types::{CertificateCandidate, EnrollmentRequest};

/// What a successful job did.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The current certificate stays in place.
    Skipped(RenewalDecision),

    /// A new certificate was issued and installed.
    Renewed(CertificateCandidate),
}

/// Drives jobs against their CA and target host.
#[derive(Clone)]
pub struct JobRunner {
    executor: Arc<dyn RemoteExecutor>,
    force: bool,
}

impl JobRunner {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            executor,
            force: false,
        }
    }

    /// Renew even when the current certificate is still valid.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Run every job and return the number that failed.
    pub async fn run_all(&self, jobs: &[Job]) -> usize {
        let mut failed = 0;
        for job in jobs {
            tracing::info!("Processing job {}", job.name);
            match self.run(job).await {
                Ok(JobOutcome::Skipped(decision)) => {
                    tracing::info!("Job {}: no renewal needed ({})", job.name, decision);
                }
                Ok(JobOutcome::Renewed(cert)) => {
                    tracing::info!(
                        "Job {}: installed certificate {} valid until {}",
                        job.name,
                        cert.serial_hex(),
                        cert.not_after_rfc3339()
                    );
                }
                Err(e) => {
                    tracing::error!("Job {} failed: {}", job.name, e);
                    failed += 1;
                }
            }
        }
        failed
    }

    /// Run one job against its configured CA.
    pub async fn run(&self, job: &Job) -> Result<JobOutcome> {
        let config = job.channel_config()?.resolve_dial_address().await?;
        let client = EjbcaClient::new(&config)?;
        self.run_with_client(job, &client).await
    }

    /// Run one job with an existing client.
    pub async fn run_with_client(&self, job: &Job, client: &EjbcaClient) -> Result<JobOutcome> {
        let deadlines = DeadlineManager::new(job.timeout);

        client.probe(&deadlines.get()).await?;

        let existing = client.find_certs(&job.name, false, &deadlines.get()).await?;
        let decision = job.policy.evaluate(SystemTime::now(), &existing);
        tracing::info!("Job {}: {}", job.name, decision);

        if !decision.needs_renewal() {
            if !self.force {
                return Ok(JobOutcome::Skipped(decision));
            }
            tracing::info!("Job {}: renewal forced", job.name);
        }

        let target = job.ssh_target();
        let output = self
            .executor
            .run(&target, &job.render_csr_script())
            .await?;
        let csr = extract_csr(&output.stdout)?;
        tracing::info!("Job {}: got CSR for {}", job.name, csr.subject());

        // The remote step may have used up most of the budget.
        let deadline = deadlines.renew();
        let request = EnrollmentRequest::new(&job.name, &job.config.ca.password, csr.to_pem());
        let cert = client.enroll(&request, &deadline).await?;
        deadlines.cancel();

        self.executor
            .run(&target, &job.render_set_cert_script(&cert.summary()))
            .await?;

        Ok(JobOutcome::Renewed(cert))
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}
