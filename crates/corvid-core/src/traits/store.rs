// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable key-value store trait for interactions and bot state.

use async_trait::async_trait;

use crate::error::BotError;
use crate::types::{BotState, Interaction};

/// Namespaced durable storage keyed by tweet ID.
///
/// The store is the only cross-process shared resource and is treated as
/// eventually consistent; callers that care about write races re-read before
/// writing (the since-cursor epilogue does this).
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Fetches the interaction recorded under `tweet_id`, if any.
    async fn get_interaction(&self, tweet_id: &str) -> Result<Option<Interaction>, BotError>;

    /// Records `interaction` under `tweet_id`, replacing any prior entry.
    async fn put_interaction(
        &self,
        tweet_id: &str,
        interaction: &Interaction,
    ) -> Result<(), BotError>;

    /// Loads the typed bot-state blob. Missing state yields the default.
    async fn load_state(&self) -> Result<BotState, BotError>;

    /// Persists the typed bot-state blob.
    async fn save_state(&self, state: &BotState) -> Result<(), BotError>;
}
