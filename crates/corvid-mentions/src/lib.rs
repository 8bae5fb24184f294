// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mention ingestion for the Corvid bot: the persistent sorted cache, prompt
//! extraction, and the fetch & triage pipeline that turns a raw feed window
//! into a bounded, priority-ordered batch of answerable mentions.

pub mod cache;
pub mod fetch;
pub mod prompt;
pub mod triage;

pub use cache::{MentionsCache, SinceResult};
pub use fetch::{FetchOptions, FetchResult, MentionFetcher};
pub use prompt::{LeadingMentions, PromptExtractor};
pub use triage::{MentionBatch, Triager};
