// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply poster that captures posts and mints sequential IDs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use corvid_core::{BotError, ReplyPoster};

/// One captured reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedReply {
    pub id: String,
    pub text: String,
    pub in_reply_to_id: Option<String>,
}

/// A mock reply poster.
///
/// Successful posts are assigned sequential IDs starting at 9000 and
/// captured for later assertions. Scripted failures are consumed before
/// successes, one per call.
pub struct MockPoster {
    next_id: AtomicU64,
    posted: Arc<Mutex<Vec<PostedReply>>>,
    failures: Arc<Mutex<VecDeque<BotError>>>,
}

impl MockPoster {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(9000),
            posted: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queues an error for the next `post_reply` call.
    pub async fn push_failure(&self, error: BotError) {
        self.failures.lock().await.push_back(error);
    }

    /// Returns the captured posts in order.
    pub async fn posted(&self) -> Vec<PostedReply> {
        self.posted.lock().await.clone()
    }
}

impl Default for MockPoster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyPoster for MockPoster {
    async fn post_reply(
        &self,
        text: &str,
        in_reply_to_id: Option<&str>,
    ) -> Result<String, BotError> {
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.posted.lock().await.push(PostedReply {
            id: id.clone(),
            text: text.to_string(),
            in_reply_to_id: in_reply_to_id.map(str::to_string),
        });
        Ok(id)
    }
}
