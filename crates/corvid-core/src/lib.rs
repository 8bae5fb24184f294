// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Corvid mention bot.
//!
//! This crate provides the error taxonomy, tweet-ID ordering utilities,
//! shared data types, and the adapter traits implemented by the HTTP clients
//! and the storage backend. Everything above this crate consumes the traits
//! only, so the pipeline is fully testable against mocks.

pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BotError;
pub use ids::{TweetId, compare_ids, max_id, min_id};
pub use types::{
    Author, BatchReport, BotState, ChatContext, ChatResponse, Interaction, Mention, MentionPage,
    ModerationVerdict, Role, TweetRef,
};

// Re-export all adapter traits at crate root.
pub use traits::{
    Authenticator, ChatBackend, InteractionStore, MentionsFeed, ModerationProvider, ReplyPoster,
};
pub use traits::feed::FeedPage;
