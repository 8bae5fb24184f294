// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Corvid - answers Twitter mentions with a conversational AI upstream.
//!
//! This is the binary entry point: parse the CLI, load and validate
//! configuration, initialize tracing, and hand off to the polling loop.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use corvid_agent::BatchOptions;
use corvid_config::CorvidConfig;
use corvid_core::BotError;

mod run;

/// Corvid - answers Twitter mentions with a conversational AI upstream.
#[derive(Parser, Debug)]
#[command(name = "corvid", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Process mentions but never post replies or persist anything.
    #[arg(long)]
    dry_run: bool,

    /// Skip the mentions cache and hit the live feed directly.
    #[arg(long)]
    no_cache: bool,

    /// Triage one batch, log it, and exit without answering.
    #[arg(long)]
    early_exit: bool,

    /// Bypass dedup and the addressee check; replay everything fetched.
    #[arg(long)]
    force_reply: bool,

    /// Ignore the cache frontier and re-resolve the full mention history.
    #[arg(long)]
    resolve_all_mentions: bool,

    /// Start from this tweet ID instead of the persisted cursor.
    #[arg(long, value_name = "TWEET_ID")]
    since_mention_id: Option<String>,

    /// Override the per-batch mention cap.
    #[arg(long, value_name = "N")]
    max_mentions: Option<usize>,
}

fn load_config(cli: &Cli) -> Result<CorvidConfig, Vec<BotError>> {
    match &cli.config {
        Some(path) => {
            let config = corvid_config::load_config_from_path(path)
                .map_err(|e| vec![BotError::Config(e.to_string())])?;
            corvid_config::validation::validate_config(&config)?;
            Ok(config)
        }
        None => corvid_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(errors) => {
            for err in &errors {
                eprintln!("corvid: config error: {err}");
            }
            process::exit(1);
        }
    };

    // CLI debug switches override the loaded config.
    if cli.dry_run {
        config.bot.dry_run = true;
    }
    if cli.resolve_all_mentions {
        config.bot.resolve_all_mentions = true;
    }
    if let Some(max) = cli.max_mentions {
        config.bot.max_mentions_per_batch = max;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.bot.log_level)),
        )
        .init();

    let options = run::RunOptions {
        batch: BatchOptions {
            no_cache: cli.no_cache,
            force_reply: cli.force_reply,
            early_exit: cli.early_exit,
        },
        since_mention_id: cli.since_mention_id.clone(),
    };

    if let Err(err) = run::serve(config, options).await {
        error!(error = %err, "corvid terminated");
        process::exit(1);
    }
}
