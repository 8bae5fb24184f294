// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent sorted cache of previously-seen mentions.
//!
//! The upstream mentions API is rate-limited and pagination-expensive, while
//! consecutive polling cycles mostly overlap. Keeping a sorted,
//! range-queryable local cache turns "fetch everything since X" into "fetch
//! only what's newly appeared past the cache's frontier," collapsing most
//! polling cycles to zero network calls.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use corvid_core::{Author, BotError, Mention, MentionPage, TweetId, TweetRef};

/// Sorted index of one upstream user's mentions plus the feed's side-tables.
///
/// Keys are ordered by the tweet-ID total order, not string order, so range
/// queries walk mentions chronologically even across ID-length boundaries.
#[derive(Debug, Clone)]
pub struct MentionsCache {
    user_id: String,
    mentions: BTreeMap<TweetId, Mention>,
    authors: HashMap<String, Author>,
    tweets: HashMap<String, TweetRef>,
}

/// Result of a [`MentionsCache::since`] range query.
#[derive(Debug, Clone)]
pub struct SinceResult {
    pub page: MentionPage,
    /// New since-cursor: the max stored key on a hit, or the input ID echoed
    /// unchanged on a miss.
    pub cursor: String,
}

impl MentionsCache {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            mentions: BTreeMap::new(),
            authors: HashMap::new(),
            tweets: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn len(&self) -> usize {
        self.mentions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }

    /// Smallest stored mention ID, if any.
    pub fn min_tweet_id(&self) -> Option<&str> {
        self.mentions.keys().next().map(|k| k.as_str())
    }

    /// Largest stored mention ID, if any. This is the cache's frontier.
    pub fn max_tweet_id(&self) -> Option<&str> {
        self.mentions.keys().next_back().map(|k| k.as_str())
    }

    /// Bulk-upserts a fetched page into the index.
    ///
    /// Idempotent by key: a later write for the same ID wins. Side-tables are
    /// shallow-merged with new entries overriding old ones.
    pub fn add_page(&mut self, page: &MentionPage) {
        self.authors
            .extend(page.authors.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.tweets.extend(
            page.referenced_tweets
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        for mention in &page.mentions {
            self.mentions
                .insert(TweetId::from(mention.id.clone()), mention.clone());
        }
    }

    /// Returns all stored mentions with ID in `[first stored >= since_id,
    /// max stored]`, ascending, plus the new cursor.
    ///
    /// A miss (no stored key >= `since_id`) returns an empty page and echoes
    /// `since_id` unchanged, signalling "the cache cannot answer this window,
    /// fetch live" without advancing the cursor past unseen mentions.
    pub fn since(&self, since_id: &str) -> SinceResult {
        let lower = TweetId::from(since_id);
        let mentions: Vec<Mention> = self
            .mentions
            .range(lower..)
            .map(|(_, m)| m.clone())
            .collect();

        let cursor = if mentions.is_empty() {
            since_id.to_string()
        } else {
            // Non-empty range implies a max key exists.
            self.max_tweet_id().unwrap_or(since_id).to_string()
        };

        SinceResult {
            page: MentionPage {
                mentions,
                authors: self.authors.clone(),
                referenced_tweets: self.tweets.clone(),
            },
            cursor,
        }
    }

    /// Loads a snapshot from disk. Missing or corrupt files are non-fatal:
    /// they are logged and an empty cache is returned.
    pub fn load(user_id: &str, path: &Path) -> Self {
        let mut cache = Self::new(user_id);
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no cache snapshot, starting empty");
                return cache;
            }
        };
        match serde_json::from_str::<CacheSnapshot>(&raw) {
            Ok(snapshot) => {
                cache.add_page(&MentionPage {
                    mentions: snapshot.mentions,
                    authors: snapshot.authors,
                    referenced_tweets: snapshot.referenced_tweets,
                });
                debug!(
                    path = %path.display(),
                    num_mentions = cache.len(),
                    "loaded mentions cache snapshot"
                );
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache snapshot, starting empty");
            }
        }
        cache
    }

    /// Saves a snapshot atomically: write a temp file in the same directory,
    /// then rename over the target, so a crash mid-write never leaves a
    /// truncated snapshot behind.
    pub fn save(&self, path: &Path) -> Result<(), BotError> {
        let snapshot = CacheSnapshot {
            user_id: self.user_id.clone(),
            min_tweet_id: self.min_tweet_id().map(str::to_string),
            max_tweet_id: self.max_tweet_id().map(str::to_string),
            mentions: self.mentions.values().cloned().collect(),
            authors: self.authors.clone(),
            referenced_tweets: self.tweets.clone(),
        };
        let json = serde_json::to_string(&snapshot).map_err(|e| BotError::Storage {
            message: format!("failed to serialize cache snapshot: {e}"),
        })?;

        let tmp_path = path.with_extension("json.tmp");
        let mut tmp = std::fs::File::create(&tmp_path).map_err(|e| BotError::Storage {
            message: format!("failed to create {}: {e}", tmp_path.display()),
        })?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.sync_all())
            .map_err(|e| BotError::Storage {
                message: format!("failed to write {}: {e}", tmp_path.display()),
            })?;
        std::fs::rename(&tmp_path, path).map_err(|e| BotError::Storage {
            message: format!("failed to rename cache snapshot into place: {e}"),
        })?;
        debug!(path = %path.display(), num_mentions = self.len(), "saved mentions cache snapshot");
        Ok(())
    }
}

/// Flat on-disk form of the cache, as of the last save.
#[derive(Debug, Serialize, Deserialize)]
struct CacheSnapshot {
    user_id: String,
    #[serde(default)]
    min_tweet_id: Option<String>,
    #[serde(default)]
    max_tweet_id: Option<String>,
    mentions: Vec<Mention>,
    #[serde(default)]
    authors: HashMap<String, Author>,
    #[serde(default)]
    referenced_tweets: HashMap<String, TweetRef>,
}
