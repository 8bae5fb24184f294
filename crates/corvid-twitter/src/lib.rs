// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feed client: mentions timeline, single-tweet lookup, and throttled reply
//! posting against the v2 social-media API.

pub mod client;
pub mod throttle;
pub mod types;

pub use client::TwitterClient;
pub use throttle::PostThrottle;
