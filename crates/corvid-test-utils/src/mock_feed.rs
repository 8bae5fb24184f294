// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted mentions feed for deterministic testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use corvid_core::{BotError, FeedPage, MentionsFeed, TweetRef};

/// One recorded `fetch_mentions` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedCall {
    pub since_id: Option<String>,
    pub pagination_token: Option<String>,
}

/// A mock mentions feed that pops pre-scripted results from a FIFO queue.
///
/// When the queue is empty an empty page is returned, so polling loops
/// quiesce naturally. Tweets registered via [`MockFeed::add_tweet`] are
/// served by `find_tweet`.
pub struct MockFeed {
    results: Arc<Mutex<VecDeque<Result<FeedPage, BotError>>>>,
    tweets: Arc<Mutex<HashMap<String, TweetRef>>>,
    find_errors: Arc<Mutex<VecDeque<BotError>>>,
    calls: Arc<Mutex<Vec<FeedCall>>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::new())),
            tweets: Arc::new(Mutex::new(HashMap::new())),
            find_errors: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a page to be returned by the next `fetch_mentions` call.
    pub async fn push_page(&self, page: FeedPage) {
        self.results.lock().await.push_back(Ok(page));
    }

    /// Queues an error to be returned by the next `fetch_mentions` call.
    pub async fn push_error(&self, error: BotError) {
        self.results.lock().await.push_back(Err(error));
    }

    /// Registers a tweet for `find_tweet` lookup.
    pub async fn add_tweet(&self, tweet: TweetRef) {
        self.tweets.lock().await.insert(tweet.id.clone(), tweet);
    }

    /// Queues an error to be returned by the next `find_tweet` call.
    pub async fn push_find_error(&self, error: BotError) {
        self.find_errors.lock().await.push_back(error);
    }

    /// Returns the recorded `fetch_mentions` calls in order.
    pub async fn calls(&self) -> Vec<FeedCall> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MentionsFeed for MockFeed {
    async fn fetch_mentions(
        &self,
        _user_id: &str,
        since_id: Option<&str>,
        pagination_token: Option<&str>,
    ) -> Result<FeedPage, BotError> {
        self.calls.lock().await.push(FeedCall {
            since_id: since_id.map(str::to_string),
            pagination_token: pagination_token.map(str::to_string),
        });
        match self.results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(FeedPage::default()),
        }
    }

    async fn find_tweet(&self, tweet_id: &str) -> Result<Option<TweetRef>, BotError> {
        if let Some(error) = self.find_errors.lock().await.pop_front() {
            return Err(error);
        }
        Ok(self.tweets.lock().await.get(tweet_id).cloned())
    }
}
