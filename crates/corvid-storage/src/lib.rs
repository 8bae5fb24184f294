// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Corvid mention bot.
//!
//! Provides WAL-mode SQLite storage with a single-writer concurrency model
//! via `tokio-rusqlite` and a namespaced JSON key-value surface implementing
//! [`corvid_core::InteractionStore`].

pub mod database;
pub mod store;

pub use database::Database;
pub use store::SqliteStore;
