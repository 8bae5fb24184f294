// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./corvid.toml` > `~/.config/corvid/corvid.toml` >
//! `/etc/corvid/corvid.toml` with environment variable overrides via the
//! `CORVID_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CorvidConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/corvid/corvid.toml` (system-wide)
/// 3. `~/.config/corvid/corvid.toml` (user XDG config)
/// 4. `./corvid.toml` (local directory)
/// 5. `CORVID_*` environment variables
pub fn load_config() -> Result<CorvidConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CorvidConfig::default()))
        .merge(Toml::file("/etc/corvid/corvid.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("corvid/corvid.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("corvid.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and for loading config from an in-memory string.
pub fn load_config_from_str(toml_content: &str) -> Result<CorvidConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CorvidConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CorvidConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CorvidConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CORVID_TWITTER_ACCESS_TOKEN` must map to
/// `twitter.access_token`, not `twitter.access.token`.
fn env_provider() -> Env {
    Env::prefixed("CORVID_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: CORVID_TWITTER_ACCESS_TOKEN -> "twitter_access_token"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("bot_", "bot.", 1)
            .replacen("twitter_", "twitter.", 1)
            .replacen("chat_", "chat.", 1)
            .replacen("pool_", "pool.", 1)
            .replacen("scoring_", "scoring.", 1)
            .replacen("moderation_", "moderation.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("poll_", "poll.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.bot.max_mentions_per_batch, 10);
        assert_eq!(config.bot.batch_concurrency, 2);
        assert_eq!(config.pool.acquire_retry_limit, 300);
        assert_eq!(config.pool.rate_limit_multiplier, 3);
        assert_eq!(config.scoring.age_weight, 0.5);
        assert_eq!(config.scoring.priority_user_bonus, 10_000.0);
        assert_eq!(config.twitter.post_quota, 200);
        assert_eq!(config.twitter.post_spacing_ms, 1_000);
        assert_eq!(config.poll.empty_batch_sleep_secs, 15);
        assert!(config.chat.accounts.is_empty());
        assert!(!config.bot.dry_run);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [bot]
            handle = "TestBot"
            user_id = "12345"
            max_mentions_per_batch = 5
            priority_users = ["alice"]

            [[chat.accounts]]
            email = "bot@example.com"
            password = "hunter2"

            [scoring]
            reply_penalty = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(config.bot.handle, "TestBot");
        assert_eq!(config.bot.max_mentions_per_batch, 5);
        assert_eq!(config.chat.accounts.len(), 1);
        assert_eq!(config.chat.accounts[0].account_id(), "bot@example.com");
        assert_eq!(config.scoring.reply_penalty, 20.0);
        // Untouched sections keep their defaults.
        assert_eq!(config.pool.cooldown_secs, 3 * 60);
    }

    #[test]
    fn account_id_defaults_to_email() {
        let config = load_config_from_str(
            r#"
            [[chat.accounts]]
            id = "primary"
            email = "a@example.com"
            password = "x"

            [[chat.accounts]]
            email = "b@example.com"
            password = "y"
            "#,
        )
        .unwrap();
        assert_eq!(config.chat.accounts[0].account_id(), "primary");
        assert_eq!(config.chat.accounts[1].account_id(), "b@example.com");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [bot]
            handel = "typo"
            "#,
        );
        assert!(result.is_err());
    }
}
