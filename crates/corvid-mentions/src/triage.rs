// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mention triage: validity filtering, deduplication, priority scoring, and
//! batch slicing.
//!
//! Triage decides which of many candidate mentions are answered in one
//! bounded batch. Rejected-but-settled mentions advance the since-cursor;
//! postponed candidates fold their IDs into `min_since_mention_id` so the
//! next poll's cursor rolls back far enough to pick them up again.

use std::collections::HashMap;

use futures::StreamExt;
use tracing::{debug, info};

use corvid_config::{BotConfig, ScoringConfig};
use corvid_core::{
    Author, BotError, Interaction, InteractionStore, Mention, MentionPage, TweetRef, max_id,
    min_id,
};

use crate::prompt::PromptExtractor;

/// Known upstream rate-limit phrases echoed back at the bot. Prompts
/// containing them are feedback loops, not questions.
const RATE_LIMIT_ECHOES: [&str; 2] = [
    "too many requests, please slow down",
    "too many requests in 1 hour. try again later",
];

/// Prompts from priority users starting with this prefix are an operator
/// replying manually; the bot stays out of the way.
const HUMAN_PREFIX: &str = "(human) ";

/// Concurrency for the dedup store lookups (I/O-bound key-value reads).
const DEDUP_CONCURRENCY: usize = 8;

/// One triaged batch, ready for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MentionBatch {
    /// Accepted mentions, highest priority first.
    pub mentions: Vec<Mention>,
    pub authors: HashMap<String, Author>,
    pub tweets: HashMap<String, TweetRef>,
    /// Parent interactions prefetched during dedup, keyed by parent tweet ID.
    pub prev_interactions: HashMap<String, Interaction>,
    /// New since-cursor: max over the fetch frontier and every settled
    /// (rejected or deduped) mention.
    pub since_mention_id: Option<String>,
    /// Min ID over postponed candidates; the caller rolls the cursor back to
    /// this so nothing is silently skipped.
    pub min_since_mention_id: Option<String>,
    pub num_postponed: usize,
}

impl MentionBatch {
    fn update_since(&mut self, tweet_id: &str) {
        self.since_mention_id = max_id(self.since_mention_id.as_deref(), Some(tweet_id))
            .map(str::to_string);
    }
}

/// Triage pipeline over one fetched page of mentions.
pub struct Triager<'a> {
    bot: &'a BotConfig,
    scoring: &'a ScoringConfig,
    extractor: &'a PromptExtractor,
    store: &'a dyn InteractionStore,
}

impl<'a> Triager<'a> {
    pub fn new(
        bot: &'a BotConfig,
        scoring: &'a ScoringConfig,
        extractor: &'a PromptExtractor,
        store: &'a dyn InteractionStore,
    ) -> Self {
        Self {
            bot,
            scoring,
            extractor,
            store,
        }
    }

    /// Runs the full pipeline: validity filter, chronological sort, dedup
    /// against finalized interactions, priority scoring, and batch slice.
    ///
    /// `force_reply` bypasses dedup and the parent-addressee check, for
    /// replaying specific tweets during debugging.
    pub async fn triage(
        &self,
        page: MentionPage,
        since_mention_id: Option<String>,
        force_reply: bool,
    ) -> Result<MentionBatch, BotError> {
        let mut batch = MentionBatch {
            authors: page.authors,
            tweets: page.referenced_tweets,
            since_mention_id,
            ..Default::default()
        };

        let num_fetched = page.mentions.len();

        // Validity filter.
        let mut valid: Vec<Mention> = Vec::new();
        for mut mention in page.mentions {
            if self.is_valid_mention(&mut mention, &batch.tweets, force_reply) {
                valid.push(mention);
            } else {
                batch.update_since(&mention.id);
            }
        }
        let num_valid = valid.len();

        // Oldest first: the age decay rewards mentions we have kept waiting.
        valid.sort_by(|a, b| corvid_core::compare_ids(&a.id, &b.id));

        // Dedup against finalized interactions; opportunistically prefetch
        // parent interactions for continuity and scoring.
        if !force_reply {
            let lookups = futures::stream::iter(valid.into_iter())
                .map(|mention| async move {
                    let existing = self.store.get_interaction(&mention.id).await?;
                    let parent = match &mention.replied_to_id {
                        Some(parent_id) => self
                            .store
                            .get_interaction(parent_id)
                            .await
                            .unwrap_or_default()
                            .map(|i| (parent_id.clone(), i)),
                        None => None,
                    };
                    Ok::<_, BotError>((mention, existing, parent))
                })
                .buffered(DEDUP_CONCURRENCY)
                .collect::<Vec<_>>()
                .await;

            valid = Vec::new();
            for lookup in lookups {
                let (mention, existing, parent) = lookup?;
                if existing.is_some_and(|i| i.is_finalized()) {
                    batch.update_since(&mention.id);
                    continue;
                }
                if let Some((parent_id, interaction)) = parent {
                    batch.prev_interactions.insert(parent_id, interaction);
                }
                valid.push(mention);
            }
        }

        let num_candidates = valid.len();

        // Priority scoring.
        for i in 0..num_candidates {
            if let Some(author) = batch.authors.get(&valid[i].author_id) {
                valid[i].num_followers = author.num_followers;
            }
            let score = self.score_mention(&valid[i], i, num_candidates, &batch);
            valid[i].priority_score = score;
        }

        // Highest priority first; total_cmp keeps the sort stable and total.
        valid.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));

        // Batch slice: fold every excluded candidate into the rollback ID.
        let max_batch = self.bot.max_mentions_per_batch;
        for mention in valid.iter().skip(max_batch) {
            batch.min_since_mention_id =
                min_id(batch.min_since_mention_id.as_deref(), Some(&mention.id))
                    .map(str::to_string);
        }
        batch.num_postponed = num_candidates.saturating_sub(max_batch);
        valid.truncate(max_batch);
        batch.mentions = valid;

        info!(
            num_fetched,
            num_valid,
            num_candidates,
            num_in_batch = batch.mentions.len(),
            num_postponed = batch.num_postponed,
            "triaged mentions batch"
        );

        Ok(batch)
    }

    /// Whether the mention should be answered at all.
    ///
    /// Fills in the mention's derived fields (`prompt`, `num_mentions`,
    /// `use_priority_model`) as a side effect.
    pub fn is_valid_mention(
        &self,
        mention: &mut Mention,
        tweets: &HashMap<String, TweetRef>,
        force_reply: bool,
    ) -> bool {
        if self.bot.tweet_ignore_list.contains(&mention.id) {
            return false;
        }
        if self.bot.user_ignore_list.contains(&mention.author_id) {
            return false;
        }

        let is_reply = mention.is_reply();
        let parent = mention
            .replied_to_id
            .as_ref()
            .and_then(|id| tweets.get(id));
        if is_reply && parent.is_none() {
            // Unresolvable parent; possibly deleted.
            return false;
        }

        mention.use_priority_model = self.extractor.has_priority_tag(&mention.text);
        let mut prompt = self.extractor.extract_prompt(&mention.text);

        if prompt.starts_with(HUMAN_PREFIX)
            && self.bot.priority_users.contains(&mention.author_id)
        {
            return false;
        }

        let counts = self.extractor.count_leading_mentions(&mention.text, false);
        mention.num_mentions = counts.num_mentions;

        if prompt.is_empty() {
            // A bare mention inherits its parent's prompt.
            if let Some(parent) = parent {
                prompt = self.extractor.extract_prompt(&parent.text);
            }
            if prompt.is_empty() {
                return false;
            }
        }

        let prompt_lower = prompt.to_lowercase();
        if RATE_LIMIT_ECHOES.iter().any(|e| prompt_lower.contains(e)) {
            debug!(tweet_id = %mention.id, "ignoring rate-limit echo mention");
            return false;
        }
        mention.prompt = Some(prompt);

        // Terminal-addressee accounting: answer only when the bot is the
        // last-listed (or sole) addressee, and the immediate parent doesn't
        // already carry an equal-or-deeper mention chain (two bots copied on
        // the same thread would otherwise double-answer it).
        let handle_is_terminal = counts
            .usernames
            .last()
            .is_some_and(|u| u.trim_start_matches('@') == self.bot.handle.to_lowercase());
        if counts.num_mentions > 0
            && (handle_is_terminal || (counts.num_mentions == 1 && !is_reply))
        {
            if let Some(parent) = parent {
                if is_reply && !force_reply {
                    let parent_is_reply = parent.replied_to_id.is_some();
                    let parent_counts = self
                        .extractor
                        .count_leading_mentions(&parent.text, parent_is_reply);
                    if parent_counts.num_mentions > counts.num_mentions
                        || (parent_counts.num_mentions == counts.num_mentions && parent_is_reply)
                    {
                        return false;
                    }
                }
            }
            true
        } else {
            false
        }
    }

    /// Scores one candidate. `index` is the mention's position in the
    /// chronological (oldest-first) candidate order.
    fn score_mention(
        &self,
        mention: &Mention,
        index: usize,
        num_candidates: usize,
        batch: &MentionBatch,
    ) -> f64 {
        let w = self.scoring;
        let mut score =
            (w.age_weight * (num_candidates - index) as f64) / num_candidates.max(1) as f64;

        if let Some(parent_id) = &mention.replied_to_id {
            let mut penalty = w.reply_penalty;
            let prev = batch.prev_interactions.get(parent_id);
            let parent_tweet = batch.tweets.get(parent_id);

            if parent_tweet.is_some_and(|t| t.author_id == self.bot.user_id) {
                // Continuing the bot's own thread.
                penalty /= w.own_thread_divisor;
            } else if prev.is_none() {
                penalty *= w.no_interaction_multiplier;
            }

            if let Some(prev) = prev {
                if prev.prompt_user_id == mention.author_id {
                    penalty /= w.same_author_divisor;
                } else {
                    penalty *= w.other_author_multiplier;
                }

                if prev.is_success() {
                    // Continuing the conversation normally.
                } else if prev.error.is_some() && !prev.is_error_final {
                    penalty *= w.retryable_error_multiplier;
                } else {
                    penalty *= w.other_author_multiplier;
                }
            } else if parent_tweet.is_none() {
                penalty *= w.missing_parent_multiplier;
            }

            score -= penalty;
        }

        if self.bot.priority_users.contains(&mention.author_id) {
            score += w.priority_user_bonus;
        }

        if let Some(author) = batch.authors.get(&mention.author_id) {
            score += author.num_followers as f64 / w.follower_divisor;
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corvid_core::{BotState, Role};
    use std::sync::Mutex;

    struct MemStore {
        interactions: Mutex<HashMap<String, Interaction>>,
    }

    impl MemStore {
        fn new() -> Self {
            Self {
                interactions: Mutex::new(HashMap::new()),
            }
        }

        fn with(entries: Vec<(&str, Interaction)>) -> Self {
            let store = Self::new();
            {
                let mut map = store.interactions.lock().unwrap();
                for (k, v) in entries {
                    map.insert(k.to_string(), v);
                }
            }
            store
        }
    }

    #[async_trait]
    impl InteractionStore for MemStore {
        async fn get_interaction(&self, tweet_id: &str) -> Result<Option<Interaction>, BotError> {
            Ok(self.interactions.lock().unwrap().get(tweet_id).cloned())
        }

        async fn put_interaction(
            &self,
            tweet_id: &str,
            interaction: &Interaction,
        ) -> Result<(), BotError> {
            self.interactions
                .lock()
                .unwrap()
                .insert(tweet_id.to_string(), interaction.clone());
            Ok(())
        }

        async fn load_state(&self) -> Result<BotState, BotError> {
            Ok(BotState::default())
        }

        async fn save_state(&self, _state: &BotState) -> Result<(), BotError> {
            Ok(())
        }
    }

    fn bot_config() -> BotConfig {
        BotConfig {
            handle: "ChatGPTBot".into(),
            user_id: "bot-user".into(),
            tweet_ignore_list: vec!["666".into()],
            user_ignore_list: vec!["spammer".into()],
            priority_users: vec!["vip".into()],
            max_mentions_per_batch: 2,
            ..Default::default()
        }
    }

    fn mention(id: &str, author: &str, text: &str) -> Mention {
        Mention {
            id: id.into(),
            author_id: author.into(),
            text: text.into(),
            created_at: None,
            replied_to_id: None,
            prompt: None,
            num_mentions: 0,
            num_followers: 0,
            priority_score: 0.0,
            use_priority_model: false,
        }
    }

    fn finalized(prompt_id: &str) -> Interaction {
        Interaction {
            role: Role::User,
            prompt_id: prompt_id.into(),
            prompt_user_id: "u1".into(),
            prompt_username: "alice".into(),
            prompt: "old".into(),
            response: Some("answered".into()),
            response_ids: vec!["r1".into()],
            conversation_id: None,
            parent_message_id: None,
            message_id: None,
            account_id: Some("a".into()),
            error: None,
            is_error_final: false,
            priority_score: 0.0,
            num_followers: 0,
            is_reply: false,
        }
    }

    fn extractor() -> PromptExtractor {
        PromptExtractor::new("ChatGPTBot", "gpt4").unwrap()
    }

    #[tokio::test]
    async fn validity_rejects_ignored_and_unaddressed() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::new();
        let triager = Triager::new(&bot, &scoring, &ext, &store);
        let tweets = HashMap::new();

        // Ignore-listed tweet ID, regardless of content.
        let mut m = mention("666", "u1", "@ChatGPTBot hello");
        assert!(!triager.is_valid_mention(&mut m, &tweets, false));

        // Ignore-listed author.
        let mut m = mention("1", "spammer", "@ChatGPTBot hello");
        assert!(!triager.is_valid_mention(&mut m, &tweets, false));

        // No bot-handle reference at all.
        let mut m = mention("2", "u1", "just talking to @someone");
        assert!(!triager.is_valid_mention(&mut m, &tweets, false));

        // Reply with an unresolvable parent.
        let mut m = mention("3", "u1", "@ChatGPTBot what about this");
        m.replied_to_id = Some("404".into());
        assert!(!triager.is_valid_mention(&mut m, &tweets, false));

        // Empty prompt after stripping.
        let mut m = mention("4", "u1", "@ChatGPTBot https://t.co/foobar");
        assert!(!triager.is_valid_mention(&mut m, &tweets, false));

        // Rate-limit echo.
        let mut m = mention(
            "5",
            "u1",
            "@ChatGPTBot Too many requests, please slow down",
        );
        assert!(!triager.is_valid_mention(&mut m, &tweets, false));
    }

    #[tokio::test]
    async fn validity_accepts_and_derives_fields() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::new();
        let triager = Triager::new(&bot, &scoring, &ext, &store);
        let tweets = HashMap::new();

        let mut m = mention("10", "u1", "@ChatGPTBot what is rust? #gpt4");
        assert!(triager.is_valid_mention(&mut m, &tweets, false));
        assert_eq!(m.prompt.as_deref(), Some("what is rust?"));
        assert!(m.use_priority_model);
        assert_eq!(m.num_mentions, 1);
    }

    #[tokio::test]
    async fn validity_skips_operator_human_replies() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::new();
        let triager = Triager::new(&bot, &scoring, &ext, &store);
        let tweets = HashMap::new();

        let mut m = mention("11", "vip", "@ChatGPTBot (human) I'll take this one");
        assert!(!triager.is_valid_mention(&mut m, &tweets, false));

        // Same text from a non-priority user is a normal prompt.
        let mut m = mention("12", "u1", "@ChatGPTBot (human) I'll take this one");
        assert!(triager.is_valid_mention(&mut m, &tweets, false));
    }

    #[tokio::test]
    async fn validity_defers_to_deeper_parent_chain() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::new();
        let triager = Triager::new(&bot, &scoring, &ext, &store);

        let mut tweets = HashMap::new();
        tweets.insert(
            "50".to_string(),
            TweetRef {
                id: "50".into(),
                author_id: "u2".into(),
                text: "@other @ChatGPTBot @ChatGPTBot original".into(),
                replied_to_id: None,
            },
        );

        // Parent carries more bot mentions than the reply: defer.
        let mut m = mention("51", "u1", "@u2 @ChatGPTBot nice");
        m.replied_to_id = Some("50".into());
        assert!(!triager.is_valid_mention(&mut m, &tweets, false));

        // force_reply bypasses the addressee deferral.
        let mut m = mention("52", "u1", "@u2 @ChatGPTBot nice");
        m.replied_to_id = Some("50".into());
        assert!(triager.is_valid_mention(&mut m, &tweets, true));
    }

    #[tokio::test]
    async fn empty_prompt_falls_back_to_parent() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::new();
        let triager = Triager::new(&bot, &scoring, &ext, &store);

        let mut tweets = HashMap::new();
        tweets.insert(
            "60".to_string(),
            TweetRef {
                id: "60".into(),
                author_id: "u2".into(),
                text: "what is the meaning of life?".into(),
                replied_to_id: None,
            },
        );

        let mut m = mention("61", "u1", "@ChatGPTBot");
        m.replied_to_id = Some("60".into());
        assert!(triager.is_valid_mention(&mut m, &tweets, false));
        assert_eq!(m.prompt.as_deref(), Some("what is the meaning of life?"));
    }

    #[tokio::test]
    async fn dedup_drops_finalized_and_advances_cursor() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::with(vec![("100", finalized("100"))]);
        let triager = Triager::new(&bot, &scoring, &ext, &store);

        let page = MentionPage {
            mentions: vec![
                mention("100", "u1", "@ChatGPTBot already answered"),
                mention("101", "u1", "@ChatGPTBot new question"),
            ],
            ..Default::default()
        };

        let batch = triager.triage(page, Some("50".into()), false).await.unwrap();
        let ids: Vec<&str> = batch.mentions.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["101"]);
        // The deduped mention advanced the cursor.
        assert_eq!(batch.since_mention_id.as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn replaying_a_batch_yields_no_new_candidates() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::with(vec![
            ("200", finalized("200")),
            ("201", finalized("201")),
        ]);
        let triager = Triager::new(&bot, &scoring, &ext, &store);

        let page = MentionPage {
            mentions: vec![
                mention("200", "u1", "@ChatGPTBot q1"),
                mention("201", "u1", "@ChatGPTBot q2"),
            ],
            ..Default::default()
        };

        let batch = triager.triage(page, None, false).await.unwrap();
        assert!(batch.mentions.is_empty());
        assert_eq!(batch.num_postponed, 0);
        assert_eq!(batch.since_mention_id.as_deref(), Some("201"));
    }

    #[tokio::test]
    async fn scoring_prefers_priority_users_and_followers() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::new();

        let mut page = MentionPage {
            mentions: vec![
                mention("300", "u1", "@ChatGPTBot ordinary question"),
                mention("301", "vip", "@ChatGPTBot vip question"),
                mention("302", "u2", "@ChatGPTBot popular question"),
            ],
            ..Default::default()
        };
        page.authors.insert(
            "u2".into(),
            Author {
                id: "u2".into(),
                username: "celeb".into(),
                name: String::new(),
                num_followers: 500_000,
            },
        );

        let mut big_bot = bot;
        big_bot.max_mentions_per_batch = 3;
        let triager = Triager::new(&big_bot, &scoring, &ext, &store);
        let batch = triager.triage(page, None, false).await.unwrap();
        let ids: Vec<&str> = batch.mentions.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["301", "302", "300"]);
    }

    #[tokio::test]
    async fn slice_folds_postponed_ids_into_rollback() {
        let bot = bot_config(); // max_mentions_per_batch = 2
        let scoring = ScoringConfig::default();
        let ext = extractor();
        let store = MemStore::new();
        let triager = Triager::new(&bot, &scoring, &ext, &store);

        let page = MentionPage {
            mentions: vec![
                mention("400", "u1", "@ChatGPTBot q1"),
                mention("401", "u2", "@ChatGPTBot q2"),
                mention("402", "u3", "@ChatGPTBot q3"),
                mention("403", "vip", "@ChatGPTBot q4"),
            ],
            ..Default::default()
        };

        let batch = triager.triage(page, None, false).await.unwrap();
        assert_eq!(batch.mentions.len(), 2);
        assert_eq!(batch.num_postponed, 2);
        // The vip mention wins a slot; two of the ordinary ones are postponed
        // and the rollback ID is the smallest of them.
        assert_eq!(batch.mentions[0].id, "403");
        let min = batch.min_since_mention_id.as_deref().unwrap();
        assert!(min == "400" || min == "401");
    }

    #[tokio::test]
    async fn reply_scoring_uses_parent_interaction() {
        let bot = bot_config();
        let scoring = ScoringConfig::default();
        let ext = extractor();

        // Parent interaction errored non-finally: that thread is penalized
        // heavily below a fresh top-level mention.
        let mut errored = finalized("500");
        errored.response = None;
        errored.error = Some("rate limited".into());
        errored.is_error_final = false;
        let store = MemStore::with(vec![("500", errored)]);
        let triager = Triager::new(&bot, &scoring, &ext, &store);

        let mut page = MentionPage {
            mentions: vec![
                mention("501", "u1", "@ChatGPTBot follow-up"),
                mention("502", "u2", "@ChatGPTBot fresh question"),
            ],
            ..Default::default()
        };
        page.mentions[0].replied_to_id = Some("500".into());
        page.referenced_tweets.insert(
            "500".into(),
            TweetRef {
                id: "500".into(),
                author_id: "bot-user".into(),
                text: "earlier answer".into(),
                replied_to_id: None,
            },
        );

        let batch = triager.triage(page, None, false).await.unwrap();
        assert_eq!(batch.mentions[0].id, "502");
        assert!(batch.mentions[0].priority_score > batch.mentions[1].priority_score);
        assert!(batch.prev_interactions.contains_key("500"));
    }
}
