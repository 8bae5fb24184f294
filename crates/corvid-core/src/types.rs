// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared data types for the Corvid mention bot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A mention author, as embedded in the feed's side-tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    /// Follower count at fetch time. Feeds the visibility bonus in scoring.
    #[serde(default)]
    pub num_followers: u64,
}

/// A referenced tweet (reply parent), as embedded in the feed's side-tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetRef {
    pub id: String,
    pub author_id: String,
    pub text: String,
    /// ID of the tweet this one replies to, if any. Needed for the
    /// leading-mention accounting on reply parents.
    #[serde(default)]
    pub replied_to_id: Option<String>,
}

/// A candidate unit of work: one post addressing the bot's handle.
///
/// Created from a feed page; the `prompt`, scoring, and routing fields are
/// filled in during triage and are immutable once a mention is handed to the
/// orchestrator. Mentions are never persisted directly, only the derived
/// [`Interaction`] records are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub author_id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    /// ID of the tweet this mention replies to, if any.
    #[serde(default)]
    pub replied_to_id: Option<String>,
    /// Derived prompt: `text` with the bot handle, leading mentions, and URLs
    /// stripped. `None` until triage runs.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Count of consecutive leading `@handle` tokens in `text`. Used for
    /// terminal-addressee accounting against the parent tweet.
    #[serde(default)]
    pub num_mentions: usize,
    #[serde(default)]
    pub num_followers: u64,
    #[serde(default)]
    pub priority_score: f64,
    /// Set when the raw text carries the priority-model tag.
    #[serde(default)]
    pub use_priority_model: bool,
}

impl Mention {
    pub fn is_reply(&self) -> bool {
        self.replied_to_id.is_some()
    }
}

/// One page of mentions plus the feed's embedded side-tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MentionPage {
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub authors: HashMap<String, Author>,
    #[serde(default)]
    pub referenced_tweets: HashMap<String, TweetRef>,
}

impl MentionPage {
    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }

    /// Merges another page into this one. Mentions are appended; side-table
    /// entries from `other` win on key collision.
    pub fn merge(&mut self, other: MentionPage) {
        self.mentions.extend(other.mentions);
        self.authors.extend(other.authors);
        self.referenced_tweets.extend(other.referenced_tweets);
    }
}

/// Which side of the exchange an [`Interaction`] record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// The durable record of one answered (or failed) prompt.
///
/// Two entries are written per successful interaction: one keyed by the
/// prompt's tweet ID with `role = user` and one keyed by the final response
/// tweet ID with `role = assistant`, so continuity lookup is O(1) from either
/// direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub role: Role,
    pub prompt_id: String,
    pub prompt_user_id: String,
    pub prompt_username: String,
    pub prompt: String,
    #[serde(default)]
    pub response: Option<String>,
    /// Ordered reply IDs; more than one when the response was split into a
    /// thread. The last entry is the assistant-keyed record's key.
    #[serde(default)]
    pub response_ids: Vec<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub parent_message_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    /// Which pool account produced the response. Required for continuity.
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// `false` means retry on a later pass; `true` means permanently resolved.
    #[serde(default)]
    pub is_error_final: bool,
    #[serde(default)]
    pub priority_score: f64,
    #[serde(default)]
    pub num_followers: u64,
    #[serde(default)]
    pub is_reply: bool,
}

impl Interaction {
    /// Whether this record is settled: either it succeeded or it failed in a
    /// way that must never be reprocessed.
    pub fn is_finalized(&self) -> bool {
        self.error.is_none() || self.is_error_final
    }

    /// Whether this record is a completed, successful exchange.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.response.as_deref().is_some_and(|r| !r.is_empty())
    }
}

/// The chat backend's answer for one dispatched prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    /// Filled in by the pool with the account that served the request.
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Continuity context for a chat dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatContext {
    pub conversation_id: Option<String>,
    pub parent_message_id: Option<String>,
    /// Route to the priority model when available.
    pub use_priority_model: bool,
}

/// Moderation outcome for a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub flagged: bool,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Small typed blob of durable bot state, persisted alongside interactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotState {
    pub since_mention_id: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
}

/// The result of one orchestrator batch, returned to the outer polling loop.
///
/// The session flags tell the caller which backoff class to apply before the
/// next iteration; `since_mention_id` is the new cursor to persist.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub interactions: Vec<Interaction>,
    pub since_mention_id: Option<String>,
    pub is_rate_limited: bool,
    pub is_rate_limited_upstream: bool,
    pub is_auth_expired: bool,
    pub is_auth_expired_upstream: bool,
    pub has_network_error: bool,
    /// Every chat account is gone. Session-fatal; the caller must halt.
    pub is_pool_exhausted: bool,
}
