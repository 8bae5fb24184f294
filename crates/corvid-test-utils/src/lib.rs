// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Corvid integration tests.
//!
//! Provides mock implementations of the core seams for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockFeed`] - Scripted mentions feed with call recording
//! - [`MockPoster`] - Reply poster that captures posts and mints IDs
//! - [`MockChat`] - Chat backend with pre-configured responses
//! - [`MockModeration`] - Moderation provider with a flaggable term list
//! - [`MemoryStore`] - In-memory [`corvid_core::InteractionStore`]

pub mod memory_store;
pub mod mock_chat;
pub mod mock_feed;
pub mod mock_moderation;
pub mod mock_poster;

pub use memory_store::MemoryStore;
pub use mock_chat::{MockAuthenticator, MockChat};
pub use mock_feed::MockFeed;
pub use mock_moderation::MockModeration;
pub use mock_poster::MockPoster;
