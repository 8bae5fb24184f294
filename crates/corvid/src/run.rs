// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outer polling loop.
//!
//! Wires the concrete clients to the orchestrator, then loops forever:
//! run a batch, merge and persist the since-cursor, save the mentions cache
//! snapshot, and sleep per the failure class the batch reported. The loop
//! only returns on unrecoverable conditions: an exhausted account pool or
//! repeated chat auth expiry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use corvid_agent::{BatchOptions, Orchestrator};
use corvid_config::CorvidConfig;
use corvid_core::{BotError, InteractionStore, MentionsFeed, ModerationProvider, ReplyPoster, max_id};
use corvid_openai::{ModerationClient, TokenAuthenticator};
use corvid_pool::AccountPool;
use corvid_storage::SqliteStore;
use corvid_twitter::TwitterClient;

/// How many auth-expired batches the loop tolerates before giving up. The
/// upstream sometimes recovers after a token refresh, so one strike is not
/// conclusive.
const MAX_AUTH_EXPIRY_STRIKES: u32 = 50;

/// Pause between auth-expiry strikes.
const AUTH_EXPIRY_PAUSE: Duration = Duration::from_secs(10);

pub struct RunOptions {
    pub batch: BatchOptions,
    /// Overrides the persisted cursor; also disables cursor persistence so a
    /// debugging run cannot clobber the production frontier.
    pub since_mention_id: Option<String>,
}

/// Builds the client stack and runs the polling loop until an unrecoverable
/// condition.
pub async fn serve(config: CorvidConfig, opts: RunOptions) -> Result<(), BotError> {
    let config = Arc::new(config);

    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    let state = store.load_state().await?;

    // The access token may live in config (fresh deployments) or in the
    // persisted state (after a refresh rotated it).
    let mut twitter_config = config.twitter.clone();
    if twitter_config.access_token.is_none() {
        twitter_config.access_token = state.access_token.clone();
    }
    let twitter = Arc::new(TwitterClient::new(&twitter_config)?);
    let mut refresh_token = config
        .twitter
        .refresh_token
        .clone()
        .or_else(|| state.refresh_token.clone());

    let authenticator = Arc::new(TokenAuthenticator::new(
        config.chat.base_url.clone(),
        config.chat.model.clone(),
        config.chat.priority_model.clone(),
        Duration::from_secs(config.chat.timeout_secs),
    )?);
    let pool = Arc::new(
        AccountPool::init(&config.chat.accounts, config.pool.clone(), authenticator).await?,
    );
    info!(num_accounts = pool.account_ids().await.len(), "account pool ready");

    let moderation = Arc::new(ModerationClient::new(
        config.moderation.base_url.clone(),
        config.moderation.api_key.as_deref(),
        &config.moderation.blocklist,
    )?);

    let orchestrator = Orchestrator::new(
        Arc::clone(&config),
        Arc::clone(&twitter) as Arc<dyn MentionsFeed>,
        Arc::clone(&twitter) as Arc<dyn ReplyPoster>,
        pool,
        moderation as Arc<dyn ModerationProvider>,
        Arc::clone(&store) as Arc<dyn InteractionStore>,
    )?;

    let snapshot_path = config.storage.cache_snapshot_path.as_ref().map(PathBuf::from);
    if let Some(path) = &snapshot_path {
        orchestrator.load_cache_snapshot(path).await;
    }

    let explicit_since = opts.since_mention_id.is_some();
    let mut since = opts
        .since_mention_id
        .clone()
        .or_else(|| state.since_mention_id.clone());
    if config.bot.resolve_all_mentions {
        since = None;
    }

    let mut loop_num: u32 = 0;
    let mut auth_expiry_strikes: u32 = 0;
    loop {
        // Refresh at startup and periodically; access tokens outlive a
        // handful of polls but not the whole process.
        if config.poll.token_refresh_loops > 0 && loop_num % config.poll.token_refresh_loops == 0
        {
            refresh_feed_token(&twitter, &store, &mut refresh_token, config.bot.dry_run).await;
        }

        let report = match orchestrator.run_batch(since.as_deref(), opts.batch).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "batch failed");
                sleep(Duration::from_secs(config.poll.batch_sleep_secs)).await;
                refresh_feed_token(&twitter, &store, &mut refresh_token, config.bot.dry_run)
                    .await;
                loop_num += 1;
                continue;
            }
        };

        // Cursor epilogue: advance monotonically, re-reading the persisted
        // cursor in case another process moved it. Still racy in theory, but
        // a lost update only means re-fetching a few already-settled
        // mentions, which dedup discards.
        if let Some(new_since) = &report.since_mention_id {
            since = max_id(since.as_deref(), Some(new_since)).map(str::to_string);
            if !explicit_since && !config.bot.resolve_all_mentions {
                match store.load_state().await {
                    Ok(mut persisted) => {
                        since = max_id(since.as_deref(), persisted.since_mention_id.as_deref())
                            .map(str::to_string);
                        if since.is_some() && !config.bot.dry_run {
                            persisted.since_mention_id = since.clone();
                            if let Err(err) = store.save_state(&persisted).await {
                                warn!(error = %err, "failed to persist since-cursor");
                            }
                        }
                    }
                    Err(err) => warn!(error = %err, "failed to re-read persisted cursor"),
                }
            }
        }

        if opts.batch.early_exit {
            return Ok(());
        }

        info!(
            num_interactions = report.interactions.len(),
            since_mention_id = since.as_deref().unwrap_or("forever"),
            "processed batch"
        );

        if let Some(path) = &snapshot_path {
            if let Err(err) = orchestrator.save_cache_snapshot(path).await {
                warn!(error = %err, "failed to save mentions cache snapshot");
            }
        }

        if report.is_pool_exhausted {
            error!("all chat accounts have expired; restart with fresh credentials");
            return Err(BotError::PoolNoAccounts);
        }

        if report.is_auth_expired_upstream {
            auth_expiry_strikes += 1;
            if auth_expiry_strikes > MAX_AUTH_EXPIRY_STRIKES {
                error!("chat auth expired and did not recover; giving up");
                return Err(BotError::ChatAuthExpired { account_id: None });
            }
            warn!(strikes = auth_expiry_strikes, "chat auth expired; backing off");
            sleep(AUTH_EXPIRY_PAUSE).await;
        }

        if report.has_network_error {
            info!(
                secs = config.poll.network_backoff_secs,
                "network error; sleeping"
            );
            sleep(Duration::from_secs(config.poll.network_backoff_secs)).await;
        } else {
            if report.is_rate_limited_upstream || report.is_rate_limited {
                info!(
                    secs = config.poll.rate_limit_backoff_secs,
                    upstream = report.is_rate_limited_upstream,
                    "rate limited; sleeping"
                );
                sleep(Duration::from_secs(config.poll.rate_limit_backoff_secs)).await;
                if report.is_rate_limited {
                    // The feed's mention quota resets on a slower clock.
                    sleep(Duration::from_secs(config.poll.feed_rate_limit_extra_secs)).await;
                }
            }

            if report.interactions.is_empty() {
                sleep(Duration::from_secs(config.poll.empty_batch_sleep_secs)).await;
            } else {
                sleep(Duration::from_secs(config.poll.batch_sleep_secs)).await;
            }
        }

        loop_num += 1;

        if report.is_auth_expired {
            refresh_feed_token(&twitter, &store, &mut refresh_token, config.bot.dry_run).await;
        }
    }
}

/// Exchanges the refresh token for a new access token and persists the
/// rotated refresh token. Failures are logged and swallowed; the next batch
/// will surface an auth error if the token really is gone.
async fn refresh_feed_token(
    twitter: &TwitterClient,
    store: &SqliteStore,
    refresh_token: &mut Option<String>,
    dry_run: bool,
) {
    let Some(token) = refresh_token.clone() else {
        return;
    };
    info!("refreshing feed access token");
    match twitter.refresh_access_token(&token).await {
        Ok(Some(rotated)) => {
            *refresh_token = Some(rotated.clone());
            if !dry_run {
                match store.load_state().await {
                    Ok(mut state) => {
                        state.refresh_token = Some(rotated);
                        if let Err(err) = store.save_state(&state).await {
                            warn!(error = %err, "failed to persist rotated refresh token");
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to load state for token rotation");
                    }
                }
            }
        }
        Ok(None) => {}
        Err(err) => warn!(error = %err, "failed to refresh feed access token"),
    }
}
