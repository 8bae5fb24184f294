// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache-first mention fetching with live top-up.
//!
//! Reads the sorted cache for everything it already knows past the cursor,
//! then pages the live feed only for what's newly appeared past the cache's
//! frontier, merging the results back into the cache.

use std::time::Duration;

use tracing::{debug, info};

use corvid_config::TwitterConfig;
use corvid_core::{BotError, MentionPage, MentionsFeed, max_id};

use crate::cache::MentionsCache;

/// Options for one fetch pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip the cache read and go straight to the live feed.
    pub no_cache: bool,
    /// Keep issuing live queries until the feed stops producing new
    /// mentions, instead of stopping after one round.
    pub resolve_all_mentions: bool,
}

/// The merged result of one fetch pass.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub page: MentionPage,
    /// Max mention ID observed, or the input cursor when nothing new showed
    /// up.
    pub since_mention_id: Option<String>,
}

/// Fetches mentions for one user, consulting `cache` before the live feed.
pub struct MentionFetcher<'a> {
    feed: &'a dyn MentionsFeed,
    config: &'a TwitterConfig,
}

impl<'a> MentionFetcher<'a> {
    pub fn new(feed: &'a dyn MentionsFeed, config: &'a TwitterConfig) -> Self {
        Self { feed, config }
    }

    pub async fn fetch(
        &self,
        cache: &mut MentionsCache,
        since_mention_id: Option<&str>,
        opts: FetchOptions,
    ) -> Result<FetchResult, BotError> {
        let user_id = cache.user_id().to_string();
        let mut result = FetchResult {
            since_mention_id: since_mention_id.map(str::to_string),
            ..Default::default()
        };

        if !opts.no_cache {
            let cached = cache.since(since_mention_id.unwrap_or(""));
            if !cached.page.mentions.is_empty() {
                debug!(
                    since_mention_id = since_mention_id.unwrap_or("forever"),
                    num_mentions = cached.page.mentions.len(),
                    "mentions cache hit"
                );
            }
            result.since_mention_id =
                max_id(result.since_mention_id.as_deref(), Some(&cached.cursor))
                    .map(str::to_string);
            result.page.merge(cached.page);
        }

        // Live top-up past the cache frontier. One round normally; repeat
        // until quiescent when resolving all mentions.
        let mut last_cursor = result.since_mention_id.clone();
        loop {
            let mut num_in_round = 0usize;
            let mut next_token: Option<String> = None;

            for _ in 0..self.config.max_live_pages {
                let page = self
                    .feed
                    .fetch_mentions(
                        &user_id,
                        result.since_mention_id.as_deref(),
                        next_token.as_deref(),
                    )
                    .await?;

                num_in_round += page.page.mentions.len();
                for mention in &page.page.mentions {
                    result.since_mention_id =
                        max_id(result.since_mention_id.as_deref(), Some(&mention.id))
                            .map(str::to_string);
                }
                result.page.merge(page.page);

                next_token = page.next_token;
                if next_token.is_none() {
                    break;
                }
            }

            info!(
                num_in_round,
                since_mention_id = result.since_mention_id.as_deref().unwrap_or("forever"),
                "fetched live mentions"
            );

            if num_in_round == 0
                || !opts.resolve_all_mentions
                || result.since_mention_id == last_cursor
            {
                break;
            }
            last_cursor = result.since_mention_id.clone();
            tokio::time::sleep(Duration::from_secs(self.config.page_pause_secs)).await;
        }

        cache.add_page(&result.page);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corvid_core::traits::feed::FeedPage;
    use corvid_core::{Mention, TweetRef};
    use std::sync::Mutex;

    fn mention(id: &str) -> Mention {
        Mention {
            id: id.into(),
            author_id: "u1".into(),
            text: format!("@CorvidBot hello {id}"),
            created_at: None,
            replied_to_id: None,
            prompt: None,
            num_mentions: 0,
            num_followers: 0,
            priority_score: 0.0,
            use_priority_model: false,
        }
    }

    /// Serves a fixed queue of pages, recording the since-IDs requested.
    struct ScriptedFeed {
        pages: Mutex<Vec<FeedPage>>,
        requests: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedFeed {
        fn new(pages: Vec<FeedPage>) -> Self {
            Self {
                pages: Mutex::new(pages),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MentionsFeed for ScriptedFeed {
        async fn fetch_mentions(
            &self,
            _user_id: &str,
            since_id: Option<&str>,
            _pagination_token: Option<&str>,
        ) -> Result<FeedPage, BotError> {
            self.requests
                .lock()
                .unwrap()
                .push(since_id.map(str::to_string));
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(FeedPage::default())
            } else {
                Ok(pages.remove(0))
            }
        }

        async fn find_tweet(&self, _tweet_id: &str) -> Result<Option<TweetRef>, BotError> {
            Ok(None)
        }
    }

    fn config() -> TwitterConfig {
        TwitterConfig {
            page_pause_secs: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn cache_hit_requests_only_past_the_frontier() {
        let mut cache = MentionsCache::new("bot");
        cache.add_page(&MentionPage {
            mentions: vec![mention("100"), mention("200")],
            ..Default::default()
        });

        let feed = ScriptedFeed::new(vec![]);
        let cfg = config();
        let fetcher = MentionFetcher::new(&feed, &cfg);

        let result = fetcher
            .fetch(&mut cache, Some("50"), FetchOptions::default())
            .await
            .unwrap();

        // Cached mentions are returned and the live query starts at the
        // cache's max key, not the caller's cursor.
        assert_eq!(result.page.mentions.len(), 2);
        assert_eq!(result.since_mention_id.as_deref(), Some("200"));
        let requests = feed.requests.lock().unwrap();
        assert_eq!(requests.as_slice(), &[Some("200".to_string())]);
    }

    #[tokio::test]
    async fn live_results_are_merged_into_the_cache() {
        let mut cache = MentionsCache::new("bot");
        let feed = ScriptedFeed::new(vec![FeedPage {
            page: MentionPage {
                mentions: vec![mention("300"), mention("301")],
                ..Default::default()
            },
            next_token: None,
        }]);
        let cfg = config();
        let fetcher = MentionFetcher::new(&feed, &cfg);

        let result = fetcher
            .fetch(&mut cache, None, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(result.page.mentions.len(), 2);
        assert_eq!(result.since_mention_id.as_deref(), Some("301"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.max_tweet_id(), Some("301"));
    }

    #[tokio::test]
    async fn pagination_tokens_are_followed() {
        let mut cache = MentionsCache::new("bot");
        let feed = ScriptedFeed::new(vec![
            FeedPage {
                page: MentionPage {
                    mentions: vec![mention("400")],
                    ..Default::default()
                },
                next_token: Some("page2".into()),
            },
            FeedPage {
                page: MentionPage {
                    mentions: vec![mention("401")],
                    ..Default::default()
                },
                next_token: None,
            },
        ]);
        let cfg = config();
        let fetcher = MentionFetcher::new(&feed, &cfg);

        let result = fetcher
            .fetch(&mut cache, None, FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(result.page.mentions.len(), 2);
    }

    #[tokio::test]
    async fn resolve_all_repeats_until_quiescent() {
        let mut cache = MentionsCache::new("bot");
        let feed = ScriptedFeed::new(vec![
            FeedPage {
                page: MentionPage {
                    mentions: vec![mention("500")],
                    ..Default::default()
                },
                next_token: None,
            },
            FeedPage {
                page: MentionPage {
                    mentions: vec![mention("501")],
                    ..Default::default()
                },
                next_token: None,
            },
            // Third round is empty: stop.
            FeedPage::default(),
        ]);
        let cfg = config();
        let fetcher = MentionFetcher::new(&feed, &cfg);

        let result = fetcher
            .fetch(
                &mut cache,
                None,
                FetchOptions {
                    resolve_all_mentions: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.page.mentions.len(), 2);
        assert_eq!(result.since_mention_id.as_deref(), Some("501"));
        assert_eq!(feed.requests.lock().unwrap().len(), 3);
    }
}
