// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-backend traits: one conversational upstream session, and the
//! authenticator that mints fresh sessions for the pool.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BotError;
use crate::types::{ChatContext, ChatResponse};

/// A single authenticated session against the conversational upstream.
///
/// One instance per pool account. `send_message` is the classification point
/// for the upstream error taxonomy: HTTP status failures and the known
/// in-band error strings both surface as typed [`BotError`] variants, never
/// as valid responses.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends `prompt` upstream, threading the continuity tokens in `ctx`.
    async fn send_message(&self, prompt: &str, ctx: &ChatContext)
    -> Result<ChatResponse, BotError>;
}

/// Mints a fresh [`ChatBackend`] from stored credentials.
///
/// The pool calls this for its one opportunistic re-auth per dispatch and
/// when the outer loop schedules a token refresh. The account's identity
/// never changes across refreshes, only the session handle does.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        account_id: &str,
        email: &str,
        password: &str,
    ) -> Result<Arc<dyn ChatBackend>, BotError>;
}
