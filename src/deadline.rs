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

//! Cancellable deadlines for CA calls.
//!
//! A job binds all of its CA calls to one [`Deadline`] obtained from its
//! [`DeadlineManager`]. Renewing the deadline cancels whatever was still
//! running under the old one.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CertManagerError, Result};

/// Window used when no explicit timeout is given.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(2 * 60);

/// Longest deadline actually armed; larger timeouts are clamped to it.
pub const MAX_DEADLINE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A point in time after which bound calls fail, plus a cancellation switch.
///
/// Clones share the same token: cancelling any of them cancels all.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// Create a deadline `timeout` from now, at most [`MAX_DEADLINE`] away.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(timeout.min(MAX_DEADLINE))
            .unwrap_or(now);
        Self {
            expires_at,
            token: CancellationToken::new(),
        }
    }

    /// Instant after which bound calls fail.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before expiry; zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Whether [`cancel`](Self::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the expiry instant has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Cancel this deadline and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Drive `fut` until it completes, the deadline expires or it is cancelled.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CertManagerError::Cancelled),
            _ = tokio::time::sleep_until(self.expires_at) => Err(CertManagerError::DeadlineExceeded),
            res = fut => res,
        }
    }
}

/// Holds at most one live [`Deadline`].
///
/// One manager belongs to one job sequence.
#[derive(Debug)]
pub struct DeadlineManager {
    default_timeout: Duration,
    current: Mutex<Option<Deadline>>,
}

impl Default for DeadlineManager {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE)
    }
}

impl DeadlineManager {
    /// Create a manager whose lazily created deadlines last `default_timeout`.
    pub fn new(default_timeout: Duration) -> Self {
        let default_timeout = if default_timeout.is_zero() {
            DEFAULT_DEADLINE
        } else {
            default_timeout
        };
        Self {
            default_timeout,
            current: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Deadline>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The current deadline, created on first use.
    pub fn get(&self) -> Deadline {
        let mut slot = self.slot();
        slot.get_or_insert_with(|| Deadline::after(self.default_timeout))
            .clone()
    }

    /// Replace the current deadline with a fresh default one.
    pub fn renew(&self) -> Deadline {
        self.renew_with(Duration::ZERO)
    }

    /// Replace the current deadline with one lasting `timeout`.
    ///
    /// A zero timeout uses the manager's default. The previous deadline is
    /// cancelled.
    pub fn renew_with(&self, timeout: Duration) -> Deadline {
        let timeout = if timeout.is_zero() {
            self.default_timeout
        } else {
            timeout
        };

        let mut slot = self.slot();
        if let Some(old) = slot.take() {
            old.cancel();
        }
        let fresh = Deadline::after(timeout);
        *slot = Some(fresh.clone());
        fresh
    }

    /// Cancel and drop the current deadline, if any.
    pub fn cancel(&self) {
        if let Some(old) = self.slot().take() {
            old.cancel();
        }
    }
}

impl Drop for DeadlineManager {
    fn drop(&mut self) {
        self.cancel();
    }
}
