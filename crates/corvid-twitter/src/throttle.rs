// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side post throttle.
//!
//! The feed enforces a hard per-window quota on tweet creation; tripping it
//! costs the whole window. This throttle stays under the quota locally and
//! adds a minimum spacing between consecutive posts.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rolling-window quota plus minimum inter-call spacing.
pub struct PostThrottle {
    quota: usize,
    window: Duration,
    min_spacing: Duration,
    state: Mutex<ThrottleState>,
}

struct ThrottleState {
    recent: VecDeque<Instant>,
    last: Option<Instant>,
}

impl PostThrottle {
    pub fn new(quota: usize, window: Duration, min_spacing: Duration) -> Self {
        Self {
            quota,
            window,
            min_spacing,
            state: Mutex::new(ThrottleState {
                recent: VecDeque::new(),
                last: None,
            }),
        }
    }

    /// Waits until a post is allowed, then records it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                while state
                    .recent
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    state.recent.pop_front();
                }

                let spacing_wait = state
                    .last
                    .and_then(|last| (last + self.min_spacing).checked_duration_since(now));
                let quota_wait = if state.recent.len() >= self.quota {
                    state
                        .recent
                        .front()
                        .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
                } else {
                    None
                };

                match spacing_wait.into_iter().chain(quota_wait).max() {
                    Some(wait) if !wait.is_zero() => Some(wait),
                    _ => {
                        state.recent.push_back(now);
                        state.last = Some(now);
                        None
                    }
                }
            };

            match wait {
                Some(wait) => tokio::time::sleep(wait).await,
                None => return,
            }
        }
    }
}
