// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Figment guarantees shape; this module checks the cross-field rules that
//! serde cannot express.

use corvid_core::BotError;

use crate::model::CorvidConfig;

/// Validates a deserialized config, returning every violation found.
pub fn validate_config(config: &CorvidConfig) -> Result<(), Vec<BotError>> {
    let mut errors = Vec::new();

    if config.bot.handle.is_empty() {
        errors.push(BotError::Config("bot.handle must not be empty".into()));
    }
    if config.bot.handle.starts_with('@') {
        errors.push(BotError::Config(
            "bot.handle must not include the leading '@'".into(),
        ));
    }
    if config.bot.max_mentions_per_batch == 0 {
        errors.push(BotError::Config(
            "bot.max_mentions_per_batch must be at least 1".into(),
        ));
    }
    if config.bot.batch_concurrency == 0 {
        errors.push(BotError::Config(
            "bot.batch_concurrency must be at least 1".into(),
        ));
    }
    if config.pool.acquire_retry_limit == 0 {
        errors.push(BotError::Config(
            "pool.acquire_retry_limit must be at least 1".into(),
        ));
    }
    if config.scoring.follower_divisor == 0.0 {
        errors.push(BotError::Config(
            "scoring.follower_divisor must be non-zero".into(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for account in &config.chat.accounts {
        if !seen.insert(account.account_id().to_string()) {
            errors.push(BotError::Config(format!(
                "duplicate chat account id \"{}\"",
                account.account_id()
            )));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
