// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the Corvid mention bot.
//!
//! Every failure the bot can observe is a variant of [`BotError`], constructed
//! once at the point where the failure is classified. Variants carry the
//! offending account and upstream status code where those exist, so nothing
//! downstream ever needs to string-match an error message.

use thiserror::Error;

/// The primary error type used across all Corvid crates.
#[derive(Debug, Clone, Error)]
pub enum BotError {
    /// The mention stripped down to an empty prompt.
    #[error("empty prompt")]
    EmptyPrompt,

    /// Transport-level failure reaching any upstream (DNS, connect, read).
    #[error("network error: {message}")]
    Network { message: String },

    /// The feed rejected an operation as forbidden -- typically the source
    /// tweet was deleted or is otherwise inaccessible.
    #[error("twitter forbidden: {message}")]
    TwitterForbidden { message: String },

    /// The feed returned 429 for a fetch or post.
    #[error("twitter rate limited")]
    TwitterRateLimit,

    /// The feed rejected our token as invalid or expired.
    #[error("twitter auth token invalid or expired")]
    TwitterAuth,

    /// Raw upstream chat failure, pre-classification by the pool.
    #[error("chat upstream error{}: {message}", fmt_status(.status_code))]
    Upstream {
        message: String,
        status_code: Option<u16>,
    },

    /// The upstream chat call exceeded its deadline.
    #[error("chat upstream timed out")]
    UpstreamTimeout,

    /// In-band "session expired" response from the chat upstream.
    #[error("chat session expired: {message}")]
    UpstreamSessionExpired { message: String },

    /// In-band "too many requests" response embedded in the chat text.
    #[error("chat upstream rate limited (in-band)")]
    UpstreamRateLimited,

    /// A pool account timed out and was placed on cooldown.
    #[error("chat account \"{account_id}\" timed out")]
    PoolTimeout { account_id: String },

    /// A pool account hit 502/503 and was placed on cooldown.
    #[error("chat account \"{account_id}\" unavailable ({status_code})")]
    PoolUnavailable {
        account_id: String,
        status_code: u16,
    },

    /// A pool account hit a hard 429 and was placed on extended cooldown.
    #[error("chat account \"{account_id}\" rate limited")]
    PoolRateLimit { account_id: String },

    /// A continuity-bound account no longer exists in the pool.
    #[error("chat account not found: \"{account_id}\"")]
    PoolAccountNotFound { account_id: String },

    /// A continuity-bound account stayed on cooldown/in-use past the
    /// bounded wait.
    #[error("chat account \"{account_id}\" is on cooldown")]
    PoolAccountOnCooldown { account_id: String },

    /// Every account has been removed from the pool. Unrecoverable without
    /// operator intervention.
    #[error("no chat accounts available")]
    PoolNoAccounts,

    /// Chat-side auth expired and could not be refreshed in-call.
    #[error("chat auth expired{}", fmt_account(.account_id))]
    ChatAuthExpired { account_id: Option<String> },

    /// The prompt was flagged by moderation.
    #[error("prompt flagged for moderation: {categories}")]
    ModerationPrompt { categories: String },

    /// The generated response was flagged by moderation.
    #[error("response flagged for moderation: {categories}")]
    ModerationResponse { categories: String },

    /// Configuration errors (missing credentials, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable key-value store failure.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Anything we could not classify. Non-final the first time an account
    /// produces one; the pool escalates on repeat.
    #[error("unknown error{}: {message}", fmt_account(.account_id))]
    Unknown {
        message: String,
        account_id: Option<String>,
        is_final: bool,
    },
}

impl BotError {
    /// Whether this failure is permanent for the mention that hit it.
    ///
    /// Non-final errors leave the mention eligible for a later pass; final
    /// errors are recorded and never reprocessed.
    pub fn is_final(&self) -> bool {
        match self {
            Self::EmptyPrompt
            | Self::TwitterForbidden { .. }
            | Self::PoolUnavailable { .. }
            | Self::PoolAccountNotFound { .. }
            | Self::ModerationPrompt { .. }
            | Self::ModerationResponse { .. } => true,
            Self::Unknown { is_final, .. } => *is_final,
            _ => false,
        }
    }

    /// The pool account involved in this failure, if any.
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::PoolTimeout { account_id }
            | Self::PoolUnavailable { account_id, .. }
            | Self::PoolRateLimit { account_id }
            | Self::PoolAccountNotFound { account_id }
            | Self::PoolAccountOnCooldown { account_id } => Some(account_id),
            Self::ChatAuthExpired { account_id } | Self::Unknown { account_id, .. } => {
                account_id.as_deref()
            }
            _ => None,
        }
    }

    /// The upstream HTTP status associated with this failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Upstream { status_code, .. } => *status_code,
            Self::PoolUnavailable { status_code, .. } => Some(*status_code),
            Self::UpstreamRateLimited | Self::PoolRateLimit { .. } | Self::TwitterRateLimit => {
                Some(429)
            }
            _ => None,
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

fn fmt_account(account: &Option<String>) -> String {
    account
        .as_ref()
        .map(|a| format!(" (account \"{a}\")"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finality_matches_taxonomy() {
        assert!(BotError::EmptyPrompt.is_final());
        assert!(
            BotError::TwitterForbidden {
                message: "deleted".into()
            }
            .is_final()
        );
        assert!(
            BotError::ModerationPrompt {
                categories: "hate".into()
            }
            .is_final()
        );
        assert!(!BotError::TwitterRateLimit.is_final());
        assert!(
            !BotError::PoolTimeout {
                account_id: "a".into()
            }
            .is_final()
        );
        assert!(
            !BotError::PoolAccountOnCooldown {
                account_id: "a".into()
            }
            .is_final()
        );
        assert!(!BotError::PoolNoAccounts.is_final());
    }

    #[test]
    fn unknown_finality_is_carried() {
        let first = BotError::Unknown {
            message: "boom".into(),
            account_id: Some("a".into()),
            is_final: false,
        };
        let repeat = BotError::Unknown {
            message: "boom".into(),
            account_id: Some("a".into()),
            is_final: true,
        };
        assert!(!first.is_final());
        assert!(repeat.is_final());
    }

    #[test]
    fn account_and_status_accessors() {
        let err = BotError::PoolUnavailable {
            account_id: "bot@example.com".into(),
            status_code: 503,
        };
        assert_eq!(err.account_id(), Some("bot@example.com"));
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(BotError::EmptyPrompt.account_id(), None);
    }
}
