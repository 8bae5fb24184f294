// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-wide failure flags.
//!
//! Flags are set by the first mention to hit a global condition and checked
//! at the top of every subsequent mention, so one rate limit does not turn
//! into a batch worth of doomed upstream calls. Mentions already in flight
//! are not interrupted.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct SessionFlags {
    pub rate_limited_feed: AtomicBool,
    pub rate_limited_upstream: AtomicBool,
    pub auth_expired_feed: AtomicBool,
    pub auth_expired_upstream: AtomicBool,
    pub network_error: AtomicBool,
    pub pool_exhausted: AtomicBool,
}

impl SessionFlags {
    /// The reason to skip this mention outright, if any condition has
    /// already been recorded this session.
    pub fn fail_fast_reason(&self) -> Option<&'static str> {
        if self.network_error.load(Ordering::Relaxed) {
            Some("network error")
        } else if self.rate_limited_upstream.load(Ordering::Relaxed) {
            Some("chat upstream rate limited")
        } else if self.rate_limited_feed.load(Ordering::Relaxed) {
            Some("feed rate limited")
        } else if self.auth_expired_upstream.load(Ordering::Relaxed) {
            Some("chat auth expired")
        } else if self.auth_expired_feed.load(Ordering::Relaxed) {
            Some("feed auth expired")
        } else if self.pool_exhausted.load(Ordering::Relaxed) {
            Some("all chat accounts exhausted")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_session_has_no_fail_fast_reason() {
        assert!(SessionFlags::default().fail_fast_reason().is_none());
    }

    #[test]
    fn network_outage_wins_over_other_flags() {
        let flags = SessionFlags::default();
        flags.rate_limited_feed.store(true, Ordering::Relaxed);
        flags.network_error.store(true, Ordering::Relaxed);
        assert_eq!(flags.fail_fast_reason(), Some("network error"));
    }
}
