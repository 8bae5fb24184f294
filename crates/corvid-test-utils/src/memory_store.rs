// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory interaction store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use corvid_core::{BotError, BotState, Interaction, InteractionStore};

/// An in-memory [`InteractionStore`] for tests.
#[derive(Default)]
pub struct MemoryStore {
    interactions: Arc<Mutex<HashMap<String, Interaction>>>,
    state: Arc<Mutex<BotState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an interaction record directly, bypassing the trait.
    pub async fn seed(&self, tweet_id: impl Into<String>, interaction: Interaction) {
        self.interactions
            .lock()
            .await
            .insert(tweet_id.into(), interaction);
    }

    pub async fn len(&self) -> usize {
        self.interactions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.interactions.lock().await.is_empty()
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn get_interaction(&self, tweet_id: &str) -> Result<Option<Interaction>, BotError> {
        Ok(self.interactions.lock().await.get(tweet_id).cloned())
    }

    async fn put_interaction(
        &self,
        tweet_id: &str,
        interaction: &Interaction,
    ) -> Result<(), BotError> {
        self.interactions
            .lock()
            .await
            .insert(tweet_id.to_string(), interaction.clone());
        Ok(())
    }

    async fn load_state(&self) -> Result<BotState, BotError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save_state(&self, state: &BotState) -> Result<(), BotError> {
        *self.state.lock().await = state.clone();
        Ok(())
    }
}
