// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply-posting trait for the outbound side of the social-media API.

use async_trait::async_trait;

use crate::error::BotError;

/// Posts replies back to the feed.
///
/// Implementations carry their own client-side throttle (the upstream
/// enforces a per-window quota) and map 403/429/400-invalid-token onto
/// [`BotError::TwitterForbidden`] / [`BotError::TwitterRateLimit`] /
/// [`BotError::TwitterAuth`].
#[async_trait]
pub trait ReplyPoster: Send + Sync {
    /// Posts `text` as a reply to `in_reply_to_id` and returns the created
    /// post's ID. A `None` parent posts a standalone tweet.
    async fn post_reply(&self, text: &str, in_reply_to_id: Option<&str>)
    -> Result<String, BotError>;
}
