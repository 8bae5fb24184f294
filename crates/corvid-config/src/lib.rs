// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Corvid mention bot.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides.
//!
//! # Usage
//!
//! ```no_run
//! use corvid_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Bot handle: @{}", config.bot.handle);
//! ```

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    AccountConfig, BotConfig, ChatConfig, CorvidConfig, ModerationConfig, PollConfig, PoolConfig,
    ScoringConfig, StorageConfig, TwitterConfig,
};

use corvid_core::BotError;

/// Load configuration from the XDG hierarchy and validate it.
///
/// The high-level entry point: loads config from TOML files + env vars via
/// Figment, then runs post-deserialization validation.
pub fn load_and_validate() -> Result<CorvidConfig, Vec<BotError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(e) => Err(vec![BotError::Config(e.to_string())]),
    }
}
