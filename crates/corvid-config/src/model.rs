// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Corvid mention bot.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Corvid configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CorvidConfig {
    /// Bot identity and batch-shaping settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Social-media feed API settings.
    #[serde(default)]
    pub twitter: TwitterConfig,

    /// Conversational upstream and account credentials.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Account pool scheduling settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Priority-scoring weights.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Moderation settings.
    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Outer polling-loop backoff settings.
    #[serde(default)]
    pub poll: PollConfig,
}

/// Bot identity and batch-shaping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// The bot's handle without the leading `@`.
    #[serde(default = "default_handle")]
    pub handle: String,

    /// The bot's upstream user ID (mentions are fetched for this ID).
    #[serde(default)]
    pub user_id: String,

    /// Maximum mentions answered per batch.
    #[serde(default = "default_max_mentions_per_batch")]
    pub max_mentions_per_batch: usize,

    /// Concurrent mentions processed within a batch.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Tweet IDs that are never answered.
    #[serde(default)]
    pub tweet_ignore_list: Vec<String>,

    /// Author user IDs that are never answered.
    #[serde(default)]
    pub user_ignore_list: Vec<String>,

    /// Author user IDs whose mentions receive the priority-score bonus.
    #[serde(default)]
    pub priority_users: Vec<String>,

    /// Hashtag (without `#`) that routes a mention to the priority model.
    #[serde(default = "default_priority_tag")]
    pub priority_model_tag: String,

    /// Keep paging the live feed until it is exhausted, instead of stopping
    /// at the first page past the cache frontier.
    #[serde(default)]
    pub resolve_all_mentions: bool,

    /// Process mentions but never post replies or persist interactions.
    #[serde(default)]
    pub dry_run: bool,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            handle: default_handle(),
            user_id: String::new(),
            max_mentions_per_batch: default_max_mentions_per_batch(),
            batch_concurrency: default_batch_concurrency(),
            tweet_ignore_list: Vec::new(),
            user_ignore_list: Vec::new(),
            priority_users: Vec::new(),
            priority_model_tag: default_priority_tag(),
            resolve_all_mentions: false,
            dry_run: false,
            log_level: default_log_level(),
        }
    }
}

fn default_handle() -> String {
    "CorvidBot".to_string()
}

fn default_max_mentions_per_batch() -> usize {
    10
}

fn default_batch_concurrency() -> usize {
    2
}

fn default_priority_tag() -> String {
    "priority".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Social-media feed API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TwitterConfig {
    /// Base URL of the feed API.
    #[serde(default = "default_twitter_base_url")]
    pub base_url: String,

    /// OAuth2 access token. Usually supplied via `CORVID_TWITTER_ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: Option<String>,

    /// OAuth2 refresh token used by the outer loop's token refresh.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// OAuth2 client ID, required for the refresh-token grant.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Maximum reply posts per rolling window.
    #[serde(default = "default_post_quota")]
    pub post_quota: u32,

    /// Rolling-window length for the post quota, in seconds.
    #[serde(default = "default_post_window_secs")]
    pub post_window_secs: u64,

    /// Minimum spacing between consecutive posts, in milliseconds.
    #[serde(default = "default_post_spacing_ms")]
    pub post_spacing_ms: u64,

    /// Pause between live mention pages, in seconds.
    #[serde(default = "default_page_pause_secs")]
    pub page_pause_secs: u64,

    /// Upper bound on live pages fetched per poll.
    #[serde(default = "default_max_live_pages")]
    pub max_live_pages: usize,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            base_url: default_twitter_base_url(),
            access_token: None,
            refresh_token: None,
            client_id: None,
            post_quota: default_post_quota(),
            post_window_secs: default_post_window_secs(),
            post_spacing_ms: default_post_spacing_ms(),
            page_pause_secs: default_page_pause_secs(),
            max_live_pages: default_max_live_pages(),
        }
    }
}

fn default_twitter_base_url() -> String {
    "https://api.twitter.com/2".to_string()
}

fn default_post_quota() -> u32 {
    200
}

fn default_post_window_secs() -> u64 {
    15 * 60
}

fn default_post_spacing_ms() -> u64 {
    1_000
}

fn default_page_pause_secs() -> u64 {
    6
}

fn default_max_live_pages() -> usize {
    10
}

/// Conversational upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Base URL of the conversational upstream.
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,

    /// Model requested for ordinary mentions.
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Model requested when a mention carries the priority tag.
    #[serde(default)]
    pub priority_model: Option<String>,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,

    /// Pool account credentials, one entry per upstream account.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            model: default_chat_model(),
            priority_model: None,
            timeout_secs: default_chat_timeout_secs(),
            accounts: Vec::new(),
        }
    }
}

fn default_chat_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_chat_timeout_secs() -> u64 {
    2 * 60
}

/// One upstream account's credentials.
///
/// `id` defaults to the email when omitted; it is the stable identity the
/// pool and continuity records refer to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub email: String,
    pub password: String,
}

impl AccountConfig {
    pub fn account_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.email)
    }
}

/// Account pool scheduling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Base cooldown applied after a timeout, in seconds. Other failure
    /// classes multiply this.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Cooldown multiplier for hard rate limits.
    #[serde(default = "default_rate_limit_multiplier")]
    pub rate_limit_multiplier: u32,

    /// Cooldown multiplier for 502/503 responses.
    #[serde(default = "default_unavailable_multiplier")]
    pub unavailable_multiplier: u32,

    /// Cooldown multiplier after a failed re-authentication.
    #[serde(default = "default_auth_multiplier")]
    pub auth_multiplier: u32,

    /// Cooldown multiplier for unclassified failures.
    #[serde(default = "default_unknown_multiplier")]
    pub unknown_multiplier: u32,

    /// How many times `acquire` polls for a continuity-bound account before
    /// giving up.
    #[serde(default = "default_acquire_retry_limit")]
    pub acquire_retry_limit: u32,

    /// Interval between `acquire` polls, in seconds.
    #[serde(default = "default_acquire_poll_secs")]
    pub acquire_poll_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            rate_limit_multiplier: default_rate_limit_multiplier(),
            unavailable_multiplier: default_unavailable_multiplier(),
            auth_multiplier: default_auth_multiplier(),
            unknown_multiplier: default_unknown_multiplier(),
            acquire_retry_limit: default_acquire_retry_limit(),
            acquire_poll_secs: default_acquire_poll_secs(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    3 * 60
}

fn default_rate_limit_multiplier() -> u32 {
    3
}

fn default_unavailable_multiplier() -> u32 {
    2
}

fn default_auth_multiplier() -> u32 {
    2
}

fn default_unknown_multiplier() -> u32 {
    10
}

fn default_acquire_retry_limit() -> u32 {
    300
}

fn default_acquire_poll_secs() -> u64 {
    1
}

/// Priority-scoring weights.
///
/// These are hand-tuned values carried over from the production deployment;
/// they are exposed as configuration rather than re-derived, and changing
/// them changes which mentions win a contended batch slot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Weight of the linear age-position decay (older mentions score higher).
    #[serde(default = "default_age_weight")]
    pub age_weight: f64,

    /// Base penalty applied to replies.
    #[serde(default = "default_reply_penalty")]
    pub reply_penalty: f64,

    /// Penalty divisor when the reply continues the bot's own thread.
    #[serde(default = "default_own_thread_divisor")]
    pub own_thread_divisor: f64,

    /// Penalty divisor when the same author previously produced a valid
    /// interaction.
    #[serde(default = "default_same_author_divisor")]
    pub same_author_divisor: f64,

    /// Penalty multiplier when the parent has no recorded interaction.
    #[serde(default = "default_no_interaction_multiplier")]
    pub no_interaction_multiplier: f64,

    /// Penalty multiplier when the parent interaction belongs to another
    /// author or is already finalized.
    #[serde(default = "default_other_author_multiplier")]
    pub other_author_multiplier: f64,

    /// Penalty multiplier when the prior turn errored non-finally.
    #[serde(default = "default_retryable_error_multiplier")]
    pub retryable_error_multiplier: f64,

    /// Penalty multiplier when the reply's parent tweet is missing.
    #[serde(default = "default_missing_parent_multiplier")]
    pub missing_parent_multiplier: f64,

    /// Flat bonus for allowlisted priority users.
    #[serde(default = "default_priority_user_bonus")]
    pub priority_user_bonus: f64,

    /// Follower count is divided by this before being added to the score.
    #[serde(default = "default_follower_divisor")]
    pub follower_divisor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            age_weight: default_age_weight(),
            reply_penalty: default_reply_penalty(),
            own_thread_divisor: default_own_thread_divisor(),
            same_author_divisor: default_same_author_divisor(),
            no_interaction_multiplier: default_no_interaction_multiplier(),
            other_author_multiplier: default_other_author_multiplier(),
            retryable_error_multiplier: default_retryable_error_multiplier(),
            missing_parent_multiplier: default_missing_parent_multiplier(),
            priority_user_bonus: default_priority_user_bonus(),
            follower_divisor: default_follower_divisor(),
        }
    }
}

fn default_age_weight() -> f64 {
    0.5
}

fn default_reply_penalty() -> f64 {
    10.0
}

fn default_own_thread_divisor() -> f64 {
    3.0
}

fn default_same_author_divisor() -> f64 {
    2.0
}

fn default_no_interaction_multiplier() -> f64 {
    5.0
}

fn default_other_author_multiplier() -> f64 {
    10.0
}

fn default_retryable_error_multiplier() -> f64 {
    1000.0
}

fn default_missing_parent_multiplier() -> f64 {
    100.0
}

fn default_priority_user_bonus() -> f64 {
    10_000.0
}

fn default_follower_divisor() -> f64 {
    1000.0
}

/// Moderation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationConfig {
    /// Base URL of the moderation endpoint.
    #[serde(default = "default_moderation_base_url")]
    pub base_url: String,

    /// API key for the moderation endpoint.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Regex patterns short-circuited without a network round-trip. Matching
    /// text is flagged immediately.
    #[serde(default)]
    pub blocklist: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_moderation_base_url(),
            api_key: None,
            blocklist: Vec::new(),
        }
    }
}

fn default_moderation_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to the XDG data directory.
    #[serde(default)]
    pub db_path: Option<String>,

    /// Key namespace separating this deployment's records.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Path of the mentions-cache JSON snapshot.
    #[serde(default)]
    pub cache_snapshot_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            namespace: default_namespace(),
            cache_snapshot_path: None,
        }
    }
}

fn default_namespace() -> String {
    "corvid".to_string()
}

/// Outer polling-loop backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Sleep after a network outage, in seconds.
    #[serde(default = "default_network_backoff_secs")]
    pub network_backoff_secs: u64,

    /// Sleep after an upstream rate limit, in seconds.
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,

    /// Extra sleep added when the feed itself rate-limited us, in seconds.
    #[serde(default = "default_feed_rate_limit_extra_secs")]
    pub feed_rate_limit_extra_secs: u64,

    /// Sleep after an empty batch, in seconds.
    #[serde(default = "default_empty_batch_sleep_secs")]
    pub empty_batch_sleep_secs: u64,

    /// Sleep after an ordinary batch, in seconds.
    #[serde(default = "default_batch_sleep_secs")]
    pub batch_sleep_secs: u64,

    /// Refresh the feed auth token every N loop iterations.
    #[serde(default = "default_token_refresh_loops")]
    pub token_refresh_loops: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            network_backoff_secs: default_network_backoff_secs(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
            feed_rate_limit_extra_secs: default_feed_rate_limit_extra_secs(),
            empty_batch_sleep_secs: default_empty_batch_sleep_secs(),
            batch_sleep_secs: default_batch_sleep_secs(),
            token_refresh_loops: default_token_refresh_loops(),
        }
    }
}

fn default_network_backoff_secs() -> u64 {
    2 * 60
}

fn default_rate_limit_backoff_secs() -> u64 {
    2 * 60
}

fn default_feed_rate_limit_extra_secs() -> u64 {
    5 * 60
}

fn default_empty_batch_sleep_secs() -> u64 {
    15
}

fn default_batch_sleep_secs() -> u64 {
    5
}

fn default_token_refresh_loops() -> u32 {
    20
}
