// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mentions-feed trait for the inbound side of the social-media API.

use async_trait::async_trait;

use crate::error::BotError;
use crate::types::{MentionPage, TweetRef};

/// Read access to the upstream mentions feed.
///
/// The feed is paginated and rate-limited; implementations map the upstream
/// error taxonomy (403, 429, invalid token) onto [`BotError`] variants.
#[async_trait]
pub trait MentionsFeed: Send + Sync {
    /// Fetches one page of mentions for `user_id` newer than `since_id`.
    ///
    /// `pagination_token` continues a previous page. Side-tables (authors,
    /// referenced tweets) are embedded in the returned page.
    async fn fetch_mentions(
        &self,
        user_id: &str,
        since_id: Option<&str>,
        pagination_token: Option<&str>,
    ) -> Result<FeedPage, BotError>;

    /// Looks up a single tweet by ID.
    ///
    /// Returns `Ok(None)` when the tweet does not exist;
    /// [`BotError::TwitterForbidden`] when it exists but is inaccessible.
    async fn find_tweet(&self, tweet_id: &str) -> Result<Option<TweetRef>, BotError>;
}

/// One page of feed results plus the token for the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub page: MentionPage,
    pub next_token: Option<String>,
}
