// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end batch tests over the mock seams.

use std::collections::HashMap;
use std::sync::Arc;

use corvid_agent::{BatchOptions, Orchestrator};
use corvid_config::{AccountConfig, CorvidConfig};
use corvid_core::{
    Author, BotError, FeedPage, InteractionStore, Mention, MentionPage, ModerationProvider, Role,
    TweetRef,
};
use corvid_pool::AccountPool;
use corvid_test_utils::{MemoryStore, MockAuthenticator, MockFeed, MockModeration, MockPoster};

struct Harness {
    orchestrator: Orchestrator,
    feed: Arc<MockFeed>,
    poster: Arc<MockPoster>,
    auth: Arc<MockAuthenticator>,
    store: Arc<MemoryStore>,
}

fn test_config() -> CorvidConfig {
    let mut config = CorvidConfig::default();
    config.bot.handle = "CorvidBot".into();
    config.bot.user_id = "u-bot".into();
    config.chat.accounts = vec![AccountConfig {
        id: Some("acct-a".into()),
        email: "a@example.com".into(),
        password: "pw".into(),
    }];
    config
}

async fn setup_with(config: CorvidConfig, moderation: MockModeration) -> Harness {
    let feed = Arc::new(MockFeed::new());
    let poster = Arc::new(MockPoster::new());
    let auth = Arc::new(MockAuthenticator::new());
    let store = Arc::new(MemoryStore::new());

    let pool = Arc::new(
        AccountPool::init(&config.chat.accounts, config.pool.clone(), auth.clone())
            .await
            .unwrap(),
    );
    let orchestrator = Orchestrator::new(
        Arc::new(config),
        feed.clone(),
        poster.clone(),
        pool,
        Arc::new(moderation) as Arc<dyn ModerationProvider>,
        store.clone() as Arc<dyn InteractionStore>,
    )
    .unwrap();

    Harness {
        orchestrator,
        feed,
        poster,
        auth,
        store,
    }
}

async fn setup() -> Harness {
    setup_with(test_config(), MockModeration::new()).await
}

fn mention_page(id: &str, text: &str) -> FeedPage {
    let mut authors = HashMap::new();
    authors.insert(
        "u1".to_string(),
        Author {
            id: "u1".into(),
            username: "alice".into(),
            name: "Alice".into(),
            num_followers: 10,
        },
    );
    FeedPage {
        page: MentionPage {
            mentions: vec![Mention {
                id: id.into(),
                author_id: "u1".into(),
                text: text.into(),
                created_at: None,
                replied_to_id: None,
                prompt: None,
                num_mentions: 0,
                num_followers: 0,
                priority_score: 0.0,
                use_priority_model: false,
            }],
            authors,
            referenced_tweets: HashMap::new(),
        },
        next_token: None,
    }
}

async fn seed_mention(harness: &Harness, id: &str, text: &str) {
    harness.feed.push_page(mention_page(id, text)).await;
    harness
        .feed
        .add_tweet(TweetRef {
            id: id.into(),
            author_id: "u1".into(),
            text: text.into(),
            replied_to_id: None,
        })
        .await;
}

#[tokio::test]
async fn end_to_end_mention_is_answered_and_persisted_twice() {
    let harness = setup().await;
    seed_mention(&harness, "1500", "@CorvidBot what is 1+1?").await;
    let backend = harness.auth.backend("acct-a").await;
    backend.push_text("1+1 = 2").await;

    let report = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(report.interactions.len(), 1);
    let interaction = &report.interactions[0];
    assert_eq!(interaction.prompt, "what is 1+1?");
    assert_eq!(interaction.response.as_deref(), Some("1+1 = 2"));
    assert!(interaction.error.is_none());
    assert_eq!(interaction.account_id.as_deref(), Some("acct-a"));
    assert_eq!(report.since_mention_id.as_deref(), Some("1500"));

    let posted = harness.poster.posted().await;
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].text, "1+1 = 2");
    assert_eq!(posted[0].in_reply_to_id.as_deref(), Some("1500"));

    // Dual persistence: user record under the mention ID, assistant record
    // under the reply ID.
    let user = harness.store.get_interaction("1500").await.unwrap().unwrap();
    assert_eq!(user.role, Role::User);
    let assistant = harness
        .store
        .get_interaction(&posted[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.response_ids, vec![posted[0].id.clone()]);
}

#[tokio::test]
async fn replaying_the_same_batch_produces_no_new_interactions() {
    let harness = setup().await;
    seed_mention(&harness, "1500", "@CorvidBot what is 1+1?").await;

    let first = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(first.interactions.len(), 1);
    let stored = harness.store.len().await;

    // Same mention arrives again from the live feed.
    harness
        .feed
        .push_page(mention_page("1500", "@CorvidBot what is 1+1?"))
        .await;
    let second = harness
        .orchestrator
        .run_batch(first.since_mention_id.as_deref(), BatchOptions::default())
        .await
        .unwrap();

    assert!(second.interactions.is_empty());
    assert_eq!(harness.store.len().await, stored);
    assert_eq!(second.since_mention_id, first.since_mention_id);
}

#[tokio::test]
async fn flagged_prompt_never_reaches_the_chat_backend() {
    let harness = setup_with(
        test_config(),
        MockModeration::with_flagged_terms(vec!["forbidden-topic".into()]),
    )
    .await;
    seed_mention(&harness, "1600", "@CorvidBot tell me about forbidden-topic").await;

    let report = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();

    let interaction = &report.interactions[0];
    assert!(interaction.is_error_final);
    assert!(interaction.error.as_deref().unwrap().contains("moderation"));

    // No dispatch happened.
    let backend = harness.auth.backend("acct-a").await;
    assert!(backend.calls().await.is_empty());

    // The apology went out and the final failure advanced the cursor.
    let posted = harness.poster.posted().await;
    assert_eq!(posted.len(), 1);
    assert!(posted[0].text.contains("content policy"));
    assert_eq!(report.since_mention_id.as_deref(), Some("1600"));

    let stored = harness.store.get_interaction("1600").await.unwrap().unwrap();
    assert!(stored.is_error_final);
}

#[tokio::test]
async fn upstream_rate_limit_sets_the_session_flag_and_retries_later() {
    let harness = setup().await;
    seed_mention(&harness, "1700", "@CorvidBot hello?").await;
    let backend = harness.auth.backend("acct-a").await;
    backend.push_error(BotError::UpstreamRateLimited).await;

    let report = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();

    assert!(report.is_rate_limited_upstream);
    let interaction = &report.interactions[0];
    assert!(!interaction.is_error_final);
    assert!(harness.poster.posted().await.is_empty());

    // The retryable failure holds the cursor on the mention so the next poll
    // re-fetches it.
    assert_eq!(report.since_mention_id.as_deref(), Some("1700"));
    let stored = harness.store.get_interaction("1700").await.unwrap().unwrap();
    assert!(!stored.is_finalized());
}

#[tokio::test]
async fn network_outage_during_reverify_is_flagged_and_retryable() {
    let harness = setup().await;
    seed_mention(&harness, "1800", "@CorvidBot ping").await;
    harness
        .feed
        .push_find_error(BotError::Network {
            message: "connection refused".into(),
        })
        .await;

    let report = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();

    assert!(report.has_network_error);
    assert!(!report.interactions[0].is_error_final);
    assert!(harness.poster.posted().await.is_empty());
    let stored = harness.store.get_interaction("1800").await.unwrap().unwrap();
    assert!(!stored.is_finalized());
}

#[tokio::test]
async fn deleted_source_tweet_is_a_final_error() {
    let harness = setup().await;
    // Page arrives but the tweet is not registered for find_tweet.
    harness
        .feed
        .push_page(mention_page("1900", "@CorvidBot still there?"))
        .await;

    let report = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();

    let interaction = &report.interactions[0];
    assert!(interaction.is_error_final);
    assert!(interaction.error.as_deref().unwrap().contains("forbidden"));
    assert_eq!(report.since_mention_id.as_deref(), Some("1900"));
}

#[tokio::test]
async fn long_responses_are_posted_as_a_chained_thread() {
    let harness = setup().await;
    seed_mention(&harness, "2000", "@CorvidBot write me an essay").await;
    let backend = harness.auth.backend("acct-a").await;
    backend
        .push_text("A sentence that repeats itself endlessly. ".repeat(12))
        .await;

    let report = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();

    let posted = harness.poster.posted().await;
    assert!(posted.len() > 1, "expected a thread, got {}", posted.len());
    // Each post replies to the previous one, starting at the mention.
    assert_eq!(posted[0].in_reply_to_id.as_deref(), Some("2000"));
    for pair in posted.windows(2) {
        assert_eq!(pair[1].in_reply_to_id.as_deref(), Some(pair[0].id.as_str()));
    }

    // The assistant record is keyed by the final reply in the thread.
    let last_id = posted.last().unwrap().id.clone();
    assert_eq!(
        report.interactions[0].response_ids.last(),
        Some(&last_id)
    );
    let assistant = harness.store.get_interaction(&last_id).await.unwrap().unwrap();
    assert_eq!(assistant.role, Role::Assistant);
}

#[tokio::test]
async fn follow_up_reply_reuses_conversation_continuity() {
    let harness = setup().await;

    // First exchange.
    seed_mention(&harness, "2100", "@CorvidBot what is 1+1?").await;
    let backend = harness.auth.backend("acct-a").await;
    backend.push_text("1+1 = 2").await;
    let first = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();
    let reply_id = first.interactions[0].response_ids[0].clone();

    // The user replies to the bot's reply.
    let mut page = mention_page("2200", "@CorvidBot and plus one more?");
    page.page.mentions[0].replied_to_id = Some(reply_id.clone());
    page.page.referenced_tweets.insert(
        reply_id.clone(),
        TweetRef {
            id: reply_id.clone(),
            author_id: "u-bot".into(),
            text: "1+1 = 2".into(),
            replied_to_id: Some("2100".into()),
        },
    );
    harness.feed.push_page(page).await;
    harness
        .feed
        .add_tweet(TweetRef {
            id: "2200".into(),
            author_id: "u1".into(),
            text: "@CorvidBot and plus one more?".into(),
            replied_to_id: Some(reply_id.clone()),
        })
        .await;
    backend.push_text("that makes 3").await;

    let second = harness
        .orchestrator
        .run_batch(first.since_mention_id.as_deref(), BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(second.interactions.len(), 1);

    // The dispatch carried the prior conversation's continuity tokens.
    let calls = backend.calls().await;
    let follow_up = calls.last().unwrap();
    assert_eq!(follow_up.prompt, "and plus one more?");
    assert_eq!(
        follow_up.context.conversation_id,
        first.interactions[0].conversation_id
    );
    assert_eq!(
        follow_up.context.parent_message_id,
        first.interactions[0].message_id
    );
}

#[tokio::test]
async fn dry_run_answers_without_posting_or_persisting() {
    let mut config = test_config();
    config.bot.dry_run = true;
    let harness = setup_with(config, MockModeration::new()).await;
    seed_mention(&harness, "2300", "@CorvidBot what is 1+1?").await;
    let backend = harness.auth.backend("acct-a").await;
    backend.push_text("1+1 = 2").await;

    let report = harness
        .orchestrator
        .run_batch(None, BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(
        report.interactions[0].response.as_deref(),
        Some("1+1 = 2")
    );
    assert!(harness.poster.posted().await.is_empty());
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn early_exit_triages_without_answering() {
    let harness = setup().await;
    seed_mention(&harness, "2400", "@CorvidBot hi").await;

    let report = harness
        .orchestrator
        .run_batch(
            None,
            BatchOptions {
                early_exit: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(report.interactions.is_empty());
    assert!(harness.poster.posted().await.is_empty());
    let backend = harness.auth.backend("acct-a").await;
    assert!(backend.calls().await.is_empty());
}
