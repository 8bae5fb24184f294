// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moderation trait.

use async_trait::async_trait;

use crate::error::BotError;
use crate::types::ModerationVerdict;

/// Classifies text against the content policy.
#[async_trait]
pub trait ModerationProvider: Send + Sync {
    async fn check(&self, text: &str) -> Result<ModerationVerdict, BotError>;
}
