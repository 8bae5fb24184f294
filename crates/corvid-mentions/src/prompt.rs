// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt extraction and leading-mention accounting.
//!
//! Converts a raw mention's text into the prompt sent upstream: the bot's
//! handle, leading `@mentions`, embedded URLs, and the priority-model tag are
//! stripped. Leading-mention counts feed the terminal-addressee check that
//! keeps the bot from answering threads it is merely copied on.

use std::sync::LazyLock;

use regex::Regex;

use corvid_core::BotError;

static LEADING_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@[a-zA-Z0-9_]+").unwrap());
static MENTION_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(@[a-zA-Z0-9_]+\b[,\s]*)+").unwrap());
static MENTION_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[a-zA-Z0-9_]+\b").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());
static LEADING_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^,\s*").unwrap());

/// Maximum number of leading `@mentions` stripped from a prompt.
const MAX_STRIPPED_LEADING_MENTIONS: usize = 4;

/// Mention accounting for one tweet's text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadingMentions {
    /// Lowercased `@username` tokens in the leading run (or the whole text
    /// for top-level tweets).
    pub usernames: Vec<String>,
    /// How many of those tokens are the bot's own handle.
    pub num_mentions: usize,
}

/// Compiled prompt-extraction rules for one bot handle.
#[derive(Debug, Clone)]
pub struct PromptExtractor {
    handle_lower: String,
    handle_re: Regex,
    tag_trailing_re: Regex,
    tag_re: Regex,
}

impl PromptExtractor {
    /// Compiles the extraction rules for `handle` (without the leading `@`)
    /// and the priority-model hashtag (without the leading `#`).
    pub fn new(handle: &str, priority_tag: &str) -> Result<Self, BotError> {
        let handle_re = Regex::new(&format!(r"(?i)@{}\b", regex::escape(handle)))
            .map_err(|e| BotError::Config(format!("invalid bot handle \"{handle}\": {e}")))?;
        let tag_trailing_re = Regex::new(&format!(r"(?im) *#{} *$", regex::escape(priority_tag)))
            .map_err(|e| {
                BotError::Config(format!("invalid priority tag \"{priority_tag}\": {e}"))
            })?;
        let tag_re = Regex::new(&format!(r"(?i)#{}\b", regex::escape(priority_tag)))
            .map_err(|e| BotError::Config(format!("invalid priority tag \"{priority_tag}\": {e}")))?;
        Ok(Self {
            handle_lower: format!("@{}", handle.to_lowercase()),
            handle_re,
            tag_trailing_re,
            tag_re,
        })
    }

    /// Derives the upstream prompt from a mention's raw text.
    ///
    /// Strips every occurrence of the bot handle, up to four leading
    /// `@mentions`, all URLs (image embeds arrive as t.co links), and a
    /// trailing priority tag. Non-leading `@mentions` inside the text are
    /// preserved. May return an empty string; the validity filter decides
    /// what that means.
    pub fn extract_prompt(&self, text: &str) -> String {
        let mut prompt = self.handle_re.replace_all(text, "").trim().to_string();
        for _ in 0..MAX_STRIPPED_LEADING_MENTIONS {
            prompt = LEADING_MENTION_RE.replace(&prompt, "").to_string();
        }
        prompt = URL_RE.replace_all(&prompt, "").to_string();
        prompt = self.tag_trailing_re.replace_all(&prompt, "").to_string();
        prompt = LEADING_COMMA_RE
            .replace(prompt.trim(), "")
            .trim()
            .to_string();
        prompt
    }

    /// Whether the raw text carries the priority-model hashtag.
    pub fn has_priority_tag(&self, text: &str) -> bool {
        self.tag_re.is_match(text)
    }

    /// Counts the mentions at the start of a tweet.
    ///
    /// For replies, only the contiguous run of leading `@username` tokens
    /// counts (the feed prepends the whole reply chain there); for top-level
    /// tweets the whole text is scanned.
    pub fn count_leading_mentions(&self, text: &str, is_reply: bool) -> LeadingMentions {
        let prefix: &str = if is_reply {
            match MENTION_PREFIX_RE.find(text) {
                Some(m) => m.as_str(),
                None => return LeadingMentions::default(),
            }
        } else {
            text
        };

        let usernames: Vec<String> = MENTION_TOKEN_RE
            .find_iter(prefix)
            .map(|m| m.as_str().to_lowercase())
            .collect();
        let num_mentions = usernames
            .iter()
            .filter(|u| **u == self.handle_lower)
            .count();

        LeadingMentions {
            usernames,
            num_mentions,
        }
    }
}
