// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moderation provider with a flaggable term list.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use corvid_core::{BotError, ModerationProvider, ModerationVerdict};

/// A mock moderation provider.
///
/// Text containing any configured term (case-insensitive) is flagged with a
/// `"test"` category; everything else is clean. All checked texts are
/// recorded.
pub struct MockModeration {
    flagged_terms: Vec<String>,
    checked: Arc<Mutex<Vec<String>>>,
}

impl MockModeration {
    /// Creates a provider that flags nothing.
    pub fn new() -> Self {
        Self::with_flagged_terms(Vec::new())
    }

    pub fn with_flagged_terms(terms: Vec<String>) -> Self {
        Self {
            flagged_terms: terms.into_iter().map(|t| t.to_lowercase()).collect(),
            checked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the texts checked so far, in order.
    pub async fn checked(&self) -> Vec<String> {
        self.checked.lock().await.clone()
    }
}

impl Default for MockModeration {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModerationProvider for MockModeration {
    async fn check(&self, text: &str) -> Result<ModerationVerdict, BotError> {
        self.checked.lock().await.push(text.to_string());
        let lowered = text.to_lowercase();
        let flagged = self.flagged_terms.iter().any(|t| lowered.contains(t));
        Ok(ModerationVerdict {
            flagged,
            categories: if flagged { vec!["test".into()] } else { Vec::new() },
        })
    }
}
