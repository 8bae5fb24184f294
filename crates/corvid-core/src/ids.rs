// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tweet-ID ordering utilities.
//!
//! Tweet IDs are decimal strings too large for an `i64` to be assumed safe, so
//! all comparisons go through [`compare_ids`]: a longer string is greater, with
//! a lexicographic tie-break at equal length. Every ID comparison in the
//! system uses these helpers; no call site compares ID strings directly.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Compares two tweet IDs numerically without parsing them.
///
/// Longer decimal strings are strictly greater; equal-length strings compare
/// lexicographically, which matches numeric order for canonical IDs.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

/// Returns the larger of two optional tweet IDs.
///
/// Empty strings are treated as absent. When only one operand is present it
/// wins; when both are absent the result is `None`.
pub fn max_id<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    match (non_empty(a), non_empty(b)) {
        (Some(a), Some(b)) => Some(if compare_ids(a, b) == Ordering::Less {
            b
        } else {
            a
        }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Returns the smaller of two optional tweet IDs.
///
/// Empty strings are treated as absent. When only one operand is present it
/// wins; when both are absent the result is `None`.
pub fn min_id<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    match (non_empty(a), non_empty(b)) {
        (Some(a), Some(b)) => Some(if compare_ids(a, b) == Ordering::Greater {
            b
        } else {
            a
        }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn non_empty(id: Option<&str>) -> Option<&str> {
    id.filter(|s| !s.is_empty())
}

/// A tweet ID ordered by [`compare_ids`].
///
/// Used as the key type for sorted mention indexes so that range queries walk
/// IDs in numeric order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TweetId(pub String);

impl TweetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for TweetId {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_ids(&self.0, &other.0)
    }
}

impl PartialOrd for TweetId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for TweetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TweetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TweetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
