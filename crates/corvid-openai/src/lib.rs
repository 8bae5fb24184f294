// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP clients for the conversational upstream: chat dispatch with in-band
//! error classification, session minting, and moderation with a local
//! blocklist pre-check.

pub mod auth;
pub mod chat;
pub mod moderation;
pub mod types;

pub use auth::TokenAuthenticator;
pub use chat::ChatClient;
pub use moderation::ModerationClient;
