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

//! CA-style validity strings.
//!
//! EJBCA expresses certificate validity as a list of `<number><unit>` tokens,
//! e.g. `"1y 2mo 4d 1h"`. The same grammar is used for the renewal windows in
//! job files.
//!
//! | Unit | Meaning | Seconds     |
//! |------|---------|-------------|
//! | `y`  | year    | 31 557 600  |
//! | `mo` | month   | 2 629 800   |
//! | `d`  | day     | 86 400      |
//! | `h`  | hour    | 3 600       |
//! | `m`  | minute  | 60          |
//! | `s`  | second  | 1           |
//!
//! A year is 365.25 days and a month is a twelfth of that.

use std::fmt;
use std::time::Duration;

use crate::error::{CertManagerError, Result};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;
const SECS_PER_YEAR: u64 = 31_557_600;
const SECS_PER_MONTH: u64 = SECS_PER_YEAR / 12;

// "mo" must be tried before "m".
const UNITS: &[(&str, u64)] = &[
    ("mo", SECS_PER_MONTH),
    ("y", SECS_PER_YEAR),
    ("d", SECS_PER_DAY),
    ("h", SECS_PER_HOUR),
    ("m", SECS_PER_MINUTE),
    ("s", 1),
];

/// A validity or renewal window in whole seconds.
///
/// Zero is a legitimate value and means "no window".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ValidityDuration(u64);

impl ValidityDuration {
    /// The empty window.
    pub const ZERO: Self = Self(0);

    /// Create a window from a number of seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Parse a validity string.
    ///
    /// Blank input is `Ok(ZERO)`. Any malformed token fails the whole parse;
    /// there is no partial result.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let bytes = s.as_bytes();
        let mut total: u64 = 0;
        let mut i = 0;

        while i < bytes.len() {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                break;
            }

            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if start == i {
                return Err(CertManagerError::invalid_duration(
                    input,
                    format!("expected number at {:?}", &s[start..]),
                ));
            }
            let number: u64 = s[start..i].parse().map_err(|_| {
                CertManagerError::invalid_duration(
                    input,
                    format!("number {:?} out of range", &s[start..i]),
                )
            })?;

            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                return Err(CertManagerError::invalid_duration(
                    input,
                    format!("missing unit after {number}"),
                ));
            }

            let rest = &s[i..];
            let Some((unit, multiplier)) = UNITS.iter().find(|(unit, _)| rest.starts_with(unit))
            else {
                return Err(CertManagerError::invalid_duration(
                    input,
                    format!("unknown unit at {rest:?} (allowed: y, mo, d, h, m, s)"),
                ));
            };
            i += unit.len();

            let add = number.checked_mul(*multiplier).ok_or_else(|| {
                CertManagerError::invalid_duration(
                    input,
                    format!("overflow computing {number} * {multiplier}"),
                )
            })?;
            total = total.checked_add(add).ok_or_else(|| {
                CertManagerError::invalid_duration(input, format!("overflow adding {add}"))
            })?;
        }

        Ok(Self(total))
    }

    /// Number of seconds in the window.
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Returns true for the empty window.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The window as a [`Duration`].
    pub const fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl From<ValidityDuration> for Duration {
    fn from(value: ValidityDuration) -> Self {
        value.as_duration()
    }
}

impl fmt::Display for ValidityDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(self.0 as i128))
    }
}

/// Parse a validity string into seconds, degrading to zero on error.
///
/// A malformed value is logged and indistinguishable from an empty one. Use
/// [`ValidityDuration::parse`] where the difference matters.
pub fn parse_validity(input: &str) -> u64 {
    match ValidityDuration::parse(input) {
        Ok(duration) => duration.as_secs(),
        Err(e) => {
            tracing::error!("{}", e);
            0
        }
    }
}

/// Format a signed number of seconds as e.g. `"1y 2d 3h 4m 5s"`.
///
/// Years here are 365 days; the output is meant for log lines, not for
/// feeding back into [`ValidityDuration::parse`].
pub fn format_duration(secs: i128) -> String {
    const YEAR: i128 = 365 * 24 * 3600;
    const DAY: i128 = 24 * 3600;
    const HOUR: i128 = 3600;
    const MINUTE: i128 = 60;

    let negative = secs < 0;
    let mut rest = secs.abs();

    let mut parts = Vec::new();
    for (unit, size) in [("y", YEAR), ("d", DAY), ("h", HOUR), ("m", MINUTE)] {
        let count = rest / size;
        rest %= size;
        if count > 0 {
            parts.push(format!("{count}{unit}"));
        }
    }
    if rest > 0 || parts.is_empty() {
        parts.push(format!("{rest}s"));
    }

    let out = parts.join(" ");
    if negative { format!("-{out}") } else { out }
}

/// Signed difference `a - b` in whole seconds.
pub(crate) fn signed_secs(a: Duration, b: Duration) -> i128 {
    a.as_secs() as i128 - b.as_secs() as i128
}
