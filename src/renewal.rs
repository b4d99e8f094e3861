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

//! Renewal decisions.
//!
//! Given the certificates the CA currently holds for an identity, decide
//! whether a new one must be requested. Nothing here talks to the network,
//! so every decision can be tested with generated certificates and a fixed
//! clock.
//!
//! # Example
//!
//! ```no_run
//! use std::time::{Duration, SystemTime};
//! use embed_cert_manager::renewal::RenewalPolicy;
//! use embed_cert_manager::types::CertificateCandidate;
//!
//! # fn example(candidates: &[CertificateCandidate]) {
//! let policy = RenewalPolicy::builder()
//!     .renew_before(Duration::from_secs(30 * 24 * 60 * 60))
//!     .build();
//!
//! let decision = policy.evaluate(SystemTime::now(), candidates);
//! if decision.needs_renewal() {
//!     println!("renewing: {}", decision);
//! }
//! # }
//! ```

use std::fmt;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::duration::{format_duration, signed_secs};
use crate::types::CertificateCandidate;

/// Select the currently valid candidate with the latest NotAfter.
///
/// Candidates outside `NotBefore <= now < NotAfter` are ignored. Ties keep
/// the first one seen.
pub fn pick_best_valid_cert(
    now: SystemTime,
    candidates: &[CertificateCandidate],
) -> Option<&CertificateCandidate> {
    let mut best: Option<&CertificateCandidate> = None;
    for cand in candidates {
        if !cand.is_valid_at(now) {
            continue;
        }
        match best {
            Some(current) if cand.not_after() <= current.not_after() => {}
            _ => best = Some(cand),
        }
    }
    best
}

/// Whether `candidate` is inside the renewal window at `now`.
///
/// No candidate always needs renewal. Otherwise renewal is due when the
/// remaining lifetime is at most `window`; a NotAfter in the past counts as
/// zero remaining.
pub fn needs_renew(
    now: SystemTime,
    candidate: Option<&CertificateCandidate>,
    window: Duration,
) -> bool {
    let Some(cand) = candidate else {
        debug!("no certificate, renewal needed");
        return true;
    };

    let remaining = cand.remaining(now);
    let needs = remaining <= window;

    let now_secs = since_epoch(now);
    let not_after_secs = since_epoch(cand.not_after());
    let remaining_signed = signed_secs(not_after_secs, now_secs);
    let delta = remaining_signed - window.as_secs() as i128;

    debug!(
        "certificate remaining={} renew_before={} delta={} needs_renew={} not_after={}",
        format_duration(remaining_signed),
        format_duration(window.as_secs() as i128),
        format_duration(delta),
        needs,
        cand.not_after_rfc3339(),
    );

    needs
}

fn since_epoch(t: SystemTime) -> Duration {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

/// Outcome of a [`RenewalPolicy`] evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    /// The CA holds no certificate for the identity.
    NoCertificate,

    /// Certificates exist but none is valid right now.
    NoValidCertificate,

    /// The best certificate expires within the renewal window.
    WithinRenewalWindow {
        /// Lifetime left on the best certificate.
        remaining: Duration,
    },

    /// The best certificate is older than the configured maximum age.
    MaxAgeReached {
        /// Time since the best certificate's NotBefore.
        age: Duration,
    },

    /// The best certificate can stay in place.
    Valid {
        /// Lifetime left on the best certificate.
        remaining: Duration,
    },
}

impl RenewalDecision {
    /// Returns true unless the decision is [`RenewalDecision::Valid`].
    pub fn needs_renewal(&self) -> bool {
        !matches!(self, Self::Valid { .. })
    }
}

impl fmt::Display for RenewalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCertificate => write!(f, "no certificate on record"),
            Self::NoValidCertificate => write!(f, "no currently valid certificate"),
            Self::WithinRenewalWindow { remaining } => write!(
                f,
                "expires in {}, inside renewal window",
                format_duration(remaining.as_secs() as i128)
            ),
            Self::MaxAgeReached { age } => write!(
                f,
                "certificate age {} reached rotation age",
                format_duration(age.as_secs() as i128)
            ),
            Self::Valid { remaining } => write!(
                f,
                "valid for another {}",
                format_duration(remaining.as_secs() as i128)
            ),
        }
    }
}

/// Renewal thresholds for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenewalPolicy {
    /// Renew when at most this much lifetime is left.
    pub renew_before: Duration,

    /// Rotate once a certificate is this old. Zero disables rotation.
    pub max_age: Duration,
}

impl RenewalPolicy {
    /// Create a new renewal policy builder.
    pub fn builder() -> RenewalPolicyBuilder {
        RenewalPolicyBuilder::default()
    }

    /// Decide whether the identity owning `candidates` needs a new certificate.
    pub fn evaluate(&self, now: SystemTime, candidates: &[CertificateCandidate]) -> RenewalDecision {
        if candidates.is_empty() {
            info!("No certificate found for identity");
            return RenewalDecision::NoCertificate;
        }

        let best = pick_best_valid_cert(now, candidates);
        let Some(best) = best else {
            info!(
                "None of {} certificate(s) is currently valid",
                candidates.len()
            );
            return RenewalDecision::NoValidCertificate;
        };

        let remaining = best.remaining(now);
        if needs_renew(now, Some(best), self.renew_before) {
            return RenewalDecision::WithinRenewalWindow { remaining };
        }

        let age = best.age(now);
        if !self.max_age.is_zero() && age >= self.max_age {
            return RenewalDecision::MaxAgeReached { age };
        }

        RenewalDecision::Valid { remaining }
    }
}

/// Builder for [`RenewalPolicy`].
#[derive(Debug, Default)]
pub struct RenewalPolicyBuilder {
    renew_before: Option<Duration>,
    max_age: Option<Duration>,
}

impl RenewalPolicyBuilder {
    /// Set the renewal window.
    pub fn renew_before(mut self, window: Duration) -> Self {
        self.renew_before = Some(window);
        self
    }

    /// Set the rotation age.
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Build the policy. Unset values are zero.
    pub fn build(self) -> RenewalPolicy {
        RenewalPolicy {
            renew_before: self.renew_before.unwrap_or_default(),
            max_age: self.max_age.unwrap_or_default(),
        }
    }
}
