// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session orchestrator for the Corvid mention bot.
//!
//! One [`Orchestrator::run_batch`] call per polling-loop iteration: fetch and
//! triage mentions, answer each with bounded concurrency, post reply threads,
//! persist interactions, and report session flags plus the new since-cursor.

pub mod batch;
pub mod reply;
pub mod session;

pub use batch::{BatchOptions, Orchestrator};
pub use reply::{MAX_POST_CHARS, split_response};
pub use session::SessionFlags;
