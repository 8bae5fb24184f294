// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-account request scheduler for the conversational upstream.
//!
//! The pool owns N independently authenticated account sessions and routes
//! each dispatch to one of them: by affinity when the request continues an
//! existing conversation, round-robin otherwise. Accounts move through
//! cooldown (timed quarantine with per-failure-class TTL multipliers) and
//! in-use states; unrecoverable accounts are removed outright.
//!
//! `conversation_id`/`parent_message_id` are meaningful only relative to the
//! account that produced them. The pool never replays a continuity token
//! against a different account; when the owning account is gone, continuity
//! is dropped and the conversation restarts fresh.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

use corvid_config::{AccountConfig, PoolConfig};
use corvid_core::{Authenticator, BotError, ChatBackend, ChatContext, ChatResponse};

/// How many unclassified failures in a row get an account removed.
const MAX_CONSECUTIVE_UNKNOWN: u32 = 2;

/// One pooled account: stable identity, credentials, and the live session.
struct AccountSlot {
    id: String,
    email: String,
    password: String,
    client: Arc<dyn ChatBackend>,
}

/// Scheduler state behind the pool's mutex.
///
/// The mutex is held only for bookkeeping; client handles are cloned out
/// before any network await.
struct PoolState {
    accounts: Vec<AccountSlot>,
    offset: usize,
    cooldowns: HashMap<String, Instant>,
    in_use: HashSet<String>,
    consecutive_unknown: HashMap<String, u32>,
}

impl PoolState {
    fn slot(&self, account_id: &str) -> Option<&AccountSlot> {
        self.accounts.iter().find(|a| a.id == account_id)
    }

    fn is_available(&self, account_id: &str) -> bool {
        let cooling = self
            .cooldowns
            .get(account_id)
            .is_some_and(|deadline| *deadline > Instant::now());
        !cooling && !self.in_use.contains(account_id)
    }

    fn remove(&mut self, account_id: &str) {
        self.accounts.retain(|a| a.id != account_id);
        self.cooldowns.remove(account_id);
        self.in_use.remove(account_id);
        self.consecutive_unknown.remove(account_id);
        if !self.accounts.is_empty() {
            self.offset %= self.accounts.len();
        }
    }
}

/// The account pool scheduler.
pub struct AccountPool {
    state: Mutex<PoolState>,
    authenticator: Arc<dyn Authenticator>,
    config: PoolConfig,
}

impl AccountPool {
    /// Authenticates every configured account and builds the pool.
    ///
    /// Accounts that fail to authenticate are skipped with an error log; an
    /// empty result is [`BotError::PoolNoAccounts`].
    pub async fn init(
        accounts: &[AccountConfig],
        config: PoolConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, BotError> {
        let mut slots = Vec::new();
        for account in accounts {
            let id = account.account_id().to_string();
            match authenticator
                .authenticate(&id, &account.email, &account.password)
                .await
            {
                Ok(client) => {
                    info!(account_id = %id, "initialized chat account");
                    slots.push(AccountSlot {
                        id,
                        email: account.email.clone(),
                        password: account.password.clone(),
                        client,
                    });
                }
                Err(e) => {
                    error!(account_id = %id, error = %e, "failed to initialize chat account");
                }
            }
        }

        if slots.is_empty() {
            return Err(BotError::PoolNoAccounts);
        }

        Ok(Self {
            state: Mutex::new(PoolState {
                accounts: slots,
                offset: 0,
                cooldowns: HashMap::new(),
                in_use: HashSet::new(),
                consecutive_unknown: HashMap::new(),
            }),
            authenticator,
            config,
        })
    }

    /// Remaining account IDs, in scheduling order.
    pub async fn account_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.accounts.iter().map(|a| a.id.clone()).collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.accounts.is_empty()
    }

    /// Round-robin over the pool, skipping cooldown/in-use accounts.
    ///
    /// When every account is simultaneously unavailable, sleeps briefly and
    /// rescans; bounded only by the caller's own timeout. Marks the chosen
    /// account in-use before returning.
    async fn acquire_any(&self) -> Result<(String, Arc<dyn ChatBackend>), BotError> {
        loop {
            {
                let mut state = self.state.lock().await;
                if state.accounts.is_empty() {
                    return Err(BotError::PoolNoAccounts);
                }
                let len = state.accounts.len();
                for _ in 0..len {
                    state.offset = (state.offset + 1) % len;
                    let id = state.accounts[state.offset].id.clone();
                    if state.is_available(&id) {
                        let client = state.accounts[state.offset].client.clone();
                        state.in_use.insert(id.clone());
                        return Ok((id, client));
                    }
                }
            }
            info!("all chat accounts cooling down or in use; sleeping");
            tokio::time::sleep(Duration::from_secs(self.config.acquire_poll_secs)).await;
        }
    }

    /// Waits for a specific account with bounded polling.
    ///
    /// Continuity-bound requests must reach this exact account; after the
    /// retry budget is exhausted the caller gets
    /// [`BotError::PoolAccountOnCooldown`] and should retry the whole mention
    /// on a later pass. Returns `Ok(None)` when the account no longer exists.
    async fn acquire_by_id(
        &self,
        account_id: &str,
    ) -> Result<Option<(String, Arc<dyn ChatBackend>)>, BotError> {
        let mut num_tries = 0u32;
        loop {
            {
                let mut state = self.state.lock().await;
                let Some(slot) = state.slot(account_id) else {
                    return Ok(None);
                };
                if state.is_available(account_id) {
                    let client = slot.client.clone();
                    state.in_use.insert(account_id.to_string());
                    return Ok(Some((account_id.to_string(), client)));
                }
            }

            if num_tries == 0 {
                info!(account_id, "continuity account busy or cooling; waiting");
            }
            num_tries += 1;
            if num_tries >= self.config.acquire_retry_limit {
                return Err(BotError::PoolAccountOnCooldown {
                    account_id: account_id.to_string(),
                });
            }
            tokio::time::sleep(Duration::from_secs(self.config.acquire_poll_secs)).await;
        }
    }

    /// Refreshes an account's session in place. Returns `false` when the
    /// refresh itself failed; the account's identity never changes.
    async fn try_refresh_session(&self, account_id: &str) -> bool {
        let (email, password) = {
            let state = self.state.lock().await;
            match state.slot(account_id) {
                Some(slot) => (slot.email.clone(), slot.password.clone()),
                None => return false,
            }
        };

        match self
            .authenticator
            .authenticate(account_id, &email, &password)
            .await
        {
            Ok(client) => {
                let mut state = self.state.lock().await;
                if let Some(slot) = state
                    .accounts
                    .iter_mut()
                    .find(|a| a.id == account_id)
                {
                    slot.client = client;
                    info!(account_id, "refreshed chat session");
                    return true;
                }
                false
            }
            Err(e) => {
                warn!(account_id, error = %e, "session refresh failed");
                false
            }
        }
    }

    async fn set_cooldown(&self, account_id: &str, multiplier: u32) {
        let ttl = Duration::from_secs(self.config.cooldown_secs * u64::from(multiplier));
        let mut state = self.state.lock().await;
        state
            .cooldowns
            .insert(account_id.to_string(), Instant::now() + ttl);
        info!(account_id, cooldown_secs = ttl.as_secs(), "chat account on cooldown");
    }

    async fn clear_in_use(&self, account_id: &str) {
        self.state.lock().await.in_use.remove(account_id);
    }

    /// Routes one prompt to an account and classifies any failure.
    ///
    /// `preferred_account` carries conversation affinity. A request with
    /// continuity tokens but no preferred account goes to the first account
    /// (conversations predating the pool all lived there). When the
    /// preferred account no longer exists, continuity is dropped and the
    /// request falls back to round-robin as a fresh conversation.
    ///
    /// At most one opportunistic re-authentication attempt is made per call
    /// before the account is quarantined.
    pub async fn dispatch(
        &self,
        prompt: &str,
        ctx: &ChatContext,
        preferred_account: Option<&str>,
    ) -> Result<ChatResponse, BotError> {
        let mut ctx = ctx.clone();

        let mut preferred = preferred_account.map(str::to_string);
        if preferred.is_none() && ctx.conversation_id.is_some() {
            let state = self.state.lock().await;
            preferred = state.accounts.first().map(|a| a.id.clone());
        }

        let (account_id, mut client) = match preferred {
            Some(id) => match self.acquire_by_id(&id).await? {
                Some(acquired) => acquired,
                None => {
                    warn!(
                        account_id = %id,
                        "continuity account no longer in pool; starting a fresh conversation"
                    );
                    ctx.conversation_id = None;
                    ctx.parent_message_id = None;
                    self.acquire_any().await?
                }
            },
            None => self.acquire_any().await?,
        };

        let result = self.send_with_retry(&account_id, &mut client, prompt, &ctx).await;
        self.clear_in_use(&account_id).await;
        result
    }

    async fn send_with_retry(
        &self,
        account_id: &str,
        client: &mut Arc<dyn ChatBackend>,
        prompt: &str,
        ctx: &ChatContext,
    ) -> Result<ChatResponse, BotError> {
        let mut num_retries = 0u32;

        loop {
            let err = match client.send_message(prompt, ctx).await {
                Ok(mut response) => {
                    let mut state = self.state.lock().await;
                    state.consecutive_unknown.remove(account_id);
                    response.account_id = Some(account_id.to_string());
                    return Ok(response);
                }
                Err(err) => err,
            };

            // One opportunistic re-auth per call, shared across all the
            // retryable failure classes.
            let mut refresh_and_retry = || {
                num_retries += 1;
                num_retries <= 1
            };

            match err {
                BotError::UpstreamTimeout => {
                    if refresh_and_retry() && self.try_refresh_session(account_id).await {
                        *client = self.refreshed_client(account_id).await?;
                        continue;
                    }
                    self.set_cooldown(account_id, 1).await;
                    return Err(BotError::PoolTimeout {
                        account_id: account_id.to_string(),
                    });
                }
                BotError::UpstreamRateLimited => {
                    self.set_cooldown(account_id, self.config.rate_limit_multiplier)
                        .await;
                    return Err(BotError::PoolRateLimit {
                        account_id: account_id.to_string(),
                    });
                }
                BotError::Upstream {
                    status_code: Some(429),
                    ..
                } => {
                    self.set_cooldown(account_id, self.config.rate_limit_multiplier)
                        .await;
                    return Err(BotError::PoolRateLimit {
                        account_id: account_id.to_string(),
                    });
                }
                BotError::UpstreamSessionExpired { message } => {
                    if refresh_and_retry() && self.try_refresh_session(account_id).await {
                        *client = self.refreshed_client(account_id).await?;
                        continue;
                    }
                    self.set_cooldown(account_id, self.config.auth_multiplier).await;
                    warn!(account_id, %message, "chat session expired and refresh failed");
                    return Err(BotError::ChatAuthExpired {
                        account_id: Some(account_id.to_string()),
                    });
                }
                BotError::Upstream {
                    status_code: Some(status @ (502 | 503)),
                    message,
                } => {
                    if refresh_and_retry() && self.try_refresh_session(account_id).await {
                        *client = self.refreshed_client(account_id).await?;
                        continue;
                    }
                    self.set_cooldown(account_id, self.config.unavailable_multiplier)
                        .await;
                    warn!(account_id, status, %message, "chat upstream unavailable");
                    return Err(BotError::PoolUnavailable {
                        account_id: account_id.to_string(),
                        status_code: status,
                    });
                }
                BotError::Network { .. } => {
                    // Transport outage is a session-wide condition, not an
                    // account problem.
                    return Err(err);
                }
                other => {
                    error!(account_id, error = %other, "unexpected chat error");
                    if refresh_and_retry() && self.try_refresh_session(account_id).await {
                        *client = self.refreshed_client(account_id).await?;
                        continue;
                    }

                    let strikes = {
                        let mut state = self.state.lock().await;
                        let strikes = state
                            .consecutive_unknown
                            .entry(account_id.to_string())
                            .or_insert(0);
                        *strikes += 1;
                        *strikes
                    };

                    if strikes >= MAX_CONSECUTIVE_UNKNOWN {
                        error!(account_id, "removing chat account after repeated unclassified errors");
                        self.state.lock().await.remove(account_id);
                        return Err(BotError::Unknown {
                            message: other.to_string(),
                            account_id: Some(account_id.to_string()),
                            is_final: true,
                        });
                    }

                    self.set_cooldown(account_id, self.config.unknown_multiplier)
                        .await;
                    return Err(BotError::Unknown {
                        message: other.to_string(),
                        account_id: Some(account_id.to_string()),
                        is_final: false,
                    });
                }
            }
        }
    }

    async fn refreshed_client(&self, account_id: &str) -> Result<Arc<dyn ChatBackend>, BotError> {
        let state = self.state.lock().await;
        state
            .slot(account_id)
            .map(|s| s.client.clone())
            .ok_or_else(|| BotError::PoolAccountNotFound {
                account_id: account_id.to_string(),
            })
    }
}
