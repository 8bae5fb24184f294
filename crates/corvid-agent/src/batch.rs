// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session orchestrator: one `run_batch` call per polling-loop
//! iteration.
//!
//! Fetches and triages mentions, answers each one with bounded concurrency,
//! and reports the new since-cursor plus the session flags the outer loop
//! keys its backoff policy off. Per-mention failures never abort the batch;
//! they are captured into that mention's [`Interaction`].

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use corvid_config::CorvidConfig;
use corvid_core::{
    BatchReport, BotError, ChatContext, Interaction, InteractionStore, Mention, MentionsFeed,
    ModerationProvider, ReplyPoster, Role, max_id, min_id,
};
use corvid_mentions::{
    FetchOptions, MentionBatch, MentionFetcher, MentionsCache, PromptExtractor, Triager,
};
use corvid_pool::AccountPool;

use crate::reply::split_response;
use crate::session::SessionFlags;

/// Per-invocation switches, mostly for operator debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Skip the mentions cache and hit the live feed directly.
    pub no_cache: bool,
    /// Bypass dedup and the addressee check; replay everything fetched.
    pub force_reply: bool,
    /// Triage only: log the batch and return without answering anything.
    pub early_exit: bool,
}

/// Drives one batch of mentions from fetch to posted replies.
pub struct Orchestrator {
    config: Arc<CorvidConfig>,
    feed: Arc<dyn MentionsFeed>,
    poster: Arc<dyn ReplyPoster>,
    pool: Arc<AccountPool>,
    moderation: Arc<dyn ModerationProvider>,
    store: Arc<dyn InteractionStore>,
    extractor: PromptExtractor,
    cache: Mutex<MentionsCache>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<CorvidConfig>,
        feed: Arc<dyn MentionsFeed>,
        poster: Arc<dyn ReplyPoster>,
        pool: Arc<AccountPool>,
        moderation: Arc<dyn ModerationProvider>,
        store: Arc<dyn InteractionStore>,
    ) -> Result<Self, BotError> {
        let extractor =
            PromptExtractor::new(&config.bot.handle, &config.bot.priority_model_tag)?;
        let cache = Mutex::new(MentionsCache::new(&config.bot.user_id));
        Ok(Self {
            config,
            feed,
            poster,
            pool,
            moderation,
            store,
            extractor,
            cache,
        })
    }

    /// Replaces the in-memory mentions cache with the snapshot at `path`.
    /// A missing or unreadable snapshot starts empty.
    pub async fn load_cache_snapshot(&self, path: &Path) {
        let cache = MentionsCache::load(&self.config.bot.user_id, path);
        *self.cache.lock().await = cache;
    }

    /// Writes the in-memory mentions cache to `path` atomically.
    pub async fn save_cache_snapshot(&self, path: &Path) -> Result<(), BotError> {
        self.cache.lock().await.save(path)
    }

    /// Runs one full batch: fetch, triage, answer, epilogue.
    pub async fn run_batch(
        &self,
        since_mention_id: Option<&str>,
        opts: BatchOptions,
    ) -> Result<BatchReport, BotError> {
        info!(
            since_mention_id = since_mention_id.unwrap_or("forever"),
            "responding to new mentions"
        );

        let fetched = {
            let mut cache = self.cache.lock().await;
            let fetcher = MentionFetcher::new(self.feed.as_ref(), &self.config.twitter);
            fetcher
                .fetch(
                    &mut cache,
                    since_mention_id,
                    FetchOptions {
                        no_cache: opts.no_cache,
                        resolve_all_mentions: self.config.bot.resolve_all_mentions,
                    },
                )
                .await?
        };

        let triager = Triager::new(
            &self.config.bot,
            &self.config.scoring,
            &self.extractor,
            self.store.as_ref(),
        );
        let mut batch = triager
            .triage(fetched.page, fetched.since_mention_id, opts.force_reply)
            .await?;

        if opts.early_exit {
            info!(num_mentions = batch.mentions.len(), "early exit after triage");
            return Ok(BatchReport {
                since_mention_id: since_mention_id.map(str::to_string),
                ..Default::default()
            });
        }

        let mentions = std::mem::take(&mut batch.mentions);
        let flags = SessionFlags::default();
        let concurrency = self.config.bot.batch_concurrency.max(1);
        let results: Vec<Interaction> = futures::stream::iter(mentions)
            .map(|mention| self.process_mention(mention, &batch, &flags))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        // Cursor epilogue: settled mentions advance the cursor; any retryable
        // one rolls it back to its ID so the next poll re-fetches it.
        for interaction in &results {
            if interaction.is_finalized() {
                batch.since_mention_id =
                    max_id(batch.since_mention_id.as_deref(), Some(&interaction.prompt_id))
                        .map(str::to_string);
            } else {
                batch.min_since_mention_id = min_id(
                    batch.min_since_mention_id.as_deref(),
                    Some(&interaction.prompt_id),
                )
                .map(str::to_string);
            }
        }
        if let Some(min) = batch.min_since_mention_id.clone() {
            batch.since_mention_id =
                min_id(Some(&min), batch.since_mention_id.as_deref()).map(str::to_string);
        }

        Ok(BatchReport {
            interactions: results,
            since_mention_id: batch.since_mention_id.clone(),
            is_rate_limited: flags.rate_limited_feed.load(Ordering::Relaxed),
            is_rate_limited_upstream: flags.rate_limited_upstream.load(Ordering::Relaxed),
            is_auth_expired: flags.auth_expired_feed.load(Ordering::Relaxed),
            is_auth_expired_upstream: flags.auth_expired_upstream.load(Ordering::Relaxed),
            has_network_error: flags.network_error.load(Ordering::Relaxed),
            is_pool_exhausted: flags.pool_exhausted.load(Ordering::Relaxed),
        })
    }

    async fn process_mention(
        &self,
        mention: Mention,
        batch: &MentionBatch,
        flags: &SessionFlags,
    ) -> Interaction {
        let username = batch
            .authors
            .get(&mention.author_id)
            .map(|a| a.username.clone())
            .unwrap_or_default();
        let prompt = mention.prompt.clone().unwrap_or_default();

        let mut result = Interaction {
            role: Role::User,
            prompt_id: mention.id.clone(),
            prompt_user_id: mention.author_id.clone(),
            prompt_username: username,
            prompt: prompt.clone(),
            response: None,
            response_ids: Vec::new(),
            conversation_id: None,
            parent_message_id: None,
            message_id: None,
            account_id: None,
            error: None,
            is_error_final: false,
            priority_score: mention.priority_score,
            num_followers: mention.num_followers,
            is_reply: mention.is_reply(),
        };

        // Fail fast once a session-wide condition is recorded; these results
        // are never persisted so the mention retries on a later poll.
        if let Some(reason) = flags.fail_fast_reason() {
            result.error = Some(reason.to_string());
            return result;
        }

        if prompt.is_empty() {
            result.error = Some("empty prompt".to_string());
            result.is_error_final = true;
            return result;
        }

        match self.answer_mention(&mention, &prompt, batch, &mut result).await {
            Ok(()) => {
                info!(
                    tweet_id = %mention.id,
                    num_replies = result.response_ids.len(),
                    "answered mention"
                );
            }
            Err(err) => {
                self.record_failure(err, &mention, &mut result, flags).await;
            }
        }
        result
    }

    /// Steps 3-7 of the per-mention pipeline: re-verify, resume, moderate,
    /// dispatch, post, persist.
    async fn answer_mention(
        &self,
        mention: &Mention,
        prompt: &str,
        batch: &MentionBatch,
        result: &mut Interaction,
    ) -> Result<(), BotError> {
        // The source tweet may have been deleted since the fetch.
        match self.feed.find_tweet(&mention.id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(BotError::TwitterForbidden {
                    message: format!("tweet not found (possibly deleted): {}", mention.id),
                });
            }
            Err(err) => return Err(err),
        }

        // Crash-restart resumption: a prior attempt may have produced a
        // response whose reply post failed.
        if let Some(prev) = self.store.get_interaction(&mention.id).await? {
            if prev.response.as_deref().is_some_and(|r| !r.is_empty()) {
                info!(tweet_id = %mention.id, "resuming from persisted response");
                result.response = prev.response;
                result.response_ids = prev.response_ids;
                result.conversation_id = prev.conversation_id;
                result.parent_message_id = prev.parent_message_id;
                result.message_id = prev.message_id;
                result.account_id = prev.account_id;
            }
        }

        if result.response.is_none() {
            let verdict = self.moderation.check(prompt).await?;
            if verdict.flagged {
                return Err(BotError::ModerationPrompt {
                    categories: verdict.categories.join(", "),
                });
            }

            let (ctx, preferred) = self.resolve_continuity(mention, batch).await;
            result.conversation_id = ctx.conversation_id.clone();
            result.parent_message_id = ctx.parent_message_id.clone();

            let response = self
                .pool
                .dispatch(prompt, &ctx, preferred.as_deref())
                .await?;
            result.response = Some(response.text.clone());
            result.conversation_id = response.conversation_id;
            result.message_id = response.message_id;
            result.account_id = response.account_id;

            let verdict = self.moderation.check(&response.text).await?;
            if verdict.flagged {
                return Err(BotError::ModerationResponse {
                    categories: verdict.categories.join(", "),
                });
            }
        }

        // Post the reply thread serially; each post chains to the previous
        // one, starting at the mention itself.
        if result.response_ids.is_empty() && !self.config.bot.dry_run {
            let texts = split_response(result.response.as_deref().unwrap_or_default());
            let mut parent_id = mention.id.clone();
            let mut ids = Vec::with_capacity(texts.len());
            for text in &texts {
                let id = self.poster.post_reply(text, Some(&parent_id)).await?;
                debug!(tweet_id = %id, "posted reply");
                parent_id = id.clone();
                ids.push(id);
            }
            result.response_ids = ids;
        }

        result.error = None;
        if !self.config.bot.dry_run {
            self.store.put_interaction(&mention.id, result).await?;
            if let Some(last_id) = result.response_ids.last().cloned() {
                let assistant = Interaction {
                    role: Role::Assistant,
                    ..result.clone()
                };
                self.store.put_interaction(&last_id, &assistant).await?;
            }
        }
        Ok(())
    }

    /// Resolves conversation continuity from the parent interaction when the
    /// parent was authored by this bot and succeeded.
    async fn resolve_continuity(
        &self,
        mention: &Mention,
        batch: &MentionBatch,
    ) -> (ChatContext, Option<String>) {
        let mut ctx = ChatContext {
            use_priority_model: mention.use_priority_model,
            ..Default::default()
        };
        let mut preferred = None;

        if let Some(parent_id) = &mention.replied_to_id {
            let bot_authored = batch
                .tweets
                .get(parent_id)
                .is_some_and(|t| t.author_id == self.config.bot.user_id);
            if bot_authored {
                let prev = match batch.prev_interactions.get(parent_id) {
                    Some(prev) => Some(prev.clone()),
                    // Prefetch misses under force-reply; fall back to a read.
                    None => self
                        .store
                        .get_interaction(parent_id)
                        .await
                        .unwrap_or_default(),
                };
                if let Some(prev) = prev {
                    if prev.error.is_none() {
                        debug!(parent_id = %parent_id, "continuing conversation");
                        ctx.conversation_id = prev.conversation_id.clone();
                        ctx.parent_message_id = prev.message_id.clone();
                        preferred = prev.account_id.clone();
                    }
                }
            }
        }
        (ctx, preferred)
    }

    /// Step 8: classify the failure, update session flags, post a
    /// best-effort apology for user-visible finals, and persist.
    async fn record_failure(
        &self,
        err: BotError,
        mention: &Mention,
        result: &mut Interaction,
        flags: &SessionFlags,
    ) {
        error!(tweet_id = %mention.id, error = %err, "mention failed");

        match &err {
            BotError::Network { .. } => {
                flags.network_error.store(true, Ordering::Relaxed);
            }
            BotError::TwitterRateLimit => {
                flags.rate_limited_feed.store(true, Ordering::Relaxed);
            }
            BotError::TwitterAuth => {
                flags.auth_expired_feed.store(true, Ordering::Relaxed);
            }
            BotError::UpstreamRateLimited | BotError::PoolRateLimit { .. } => {
                flags.rate_limited_upstream.store(true, Ordering::Relaxed);
            }
            BotError::UpstreamSessionExpired { .. } | BotError::ChatAuthExpired { .. } => {
                flags.auth_expired_upstream.store(true, Ordering::Relaxed);
            }
            BotError::PoolNoAccounts => {
                flags.pool_exhausted.store(true, Ordering::Relaxed);
            }
            _ => {}
        }

        if let Some(account_id) = err.account_id() {
            result.account_id = Some(account_id.to_string());
        }

        if let Some(apology) = apology_text(&err, &mention.id) {
            if !self.config.bot.dry_run {
                match self.poster.post_reply(&apology, Some(&mention.id)).await {
                    Ok(id) => result.response_ids = vec![id],
                    Err(post_err) => {
                        warn!(
                            tweet_id = %mention.id,
                            error = %post_err,
                            "failed to post apology reply"
                        );
                    }
                }
            }
        }

        result.error = Some(err.to_string());
        result.is_error_final = err.is_final();

        // Stored so scoring sees the retryable failure and dedup sees the
        // final one.
        if !self.config.bot.dry_run {
            if let Err(store_err) = self.store.put_interaction(&mention.id, result).await {
                warn!(
                    tweet_id = %mention.id,
                    error = %store_err,
                    "failed to persist failed interaction"
                );
            }
        }
    }
}

/// The user-visible explanation for a final failure, if this failure class
/// warrants one.
fn apology_text(err: &BotError, tweet_id: &str) -> Option<String> {
    match err {
        BotError::PoolUnavailable { status_code, .. } => Some(format!(
            "Uh-oh, the assistant's servers are overwhelmed right now (error {status_code}). Sorry \u{1F613}\n\nRef: {tweet_id}"
        )),
        BotError::PoolAccountNotFound { .. } => Some(format!(
            "Uh-oh, something went wrong picking your conversation back up. Sorry \u{1F613}\n\nRef: {tweet_id}"
        )),
        BotError::ModerationPrompt { categories } => Some(format!(
            "Uh-oh, your tweet may violate our content policy ({categories}), so it wasn't answered.\n\nRef: {tweet_id}"
        )),
        BotError::ModerationResponse { categories } => Some(format!(
            "Uh-oh, the generated response may have violated our content policy ({categories}) and was withheld.\n\nRef: {tweet_id}"
        )),
        _ => None,
    }
}
