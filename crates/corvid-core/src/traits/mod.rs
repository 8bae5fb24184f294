// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the seams between Corvid subsystems.
//!
//! The orchestrator and triage pipeline consume only these traits; the
//! concrete HTTP clients and the SQLite store implement them. All traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod chat;
pub mod feed;
pub mod moderation;
pub mod poster;
pub mod store;

// Re-export all traits at the traits module level for convenience.
pub use chat::{Authenticator, ChatBackend};
pub use feed::MentionsFeed;
pub use moderation::ModerationProvider;
pub use poster::ReplyPoster;
pub use store::InteractionStore;
