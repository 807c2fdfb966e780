//! frsh - session store with a per-user TTL index
//!
//! Main entry point for the frsh CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, create, delete, extend, list, sweep, update, verify};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// frsh - session store with a per-user TTL index and expiry sweeps
#[derive(Parser)]
#[command(name = "frsh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(long, global = true, env = "FRSH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tree snapshot the session store is loaded from and saved to
    #[arg(long, global = true, env = "FRSH_DATA", default_value = "frsh-data.json")]
    pub data: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a session for a user
    Create(create::CreateArgs),

    /// Check whether a session is live
    Verify(verify::VerifyArgs),

    /// List a user's live sessions
    List(list::ListArgs),

    /// Extend a session's lifetime
    Extend(extend::ExtendArgs),

    /// Merge attributes into a session
    Update(update::UpdateArgs),

    /// Delete one session
    Delete(delete::DeleteArgs),

    /// Delete every session of a user
    DeleteUser(delete::DeleteUserArgs),

    /// Reclaim expired sessions
    Sweep(sweep::SweepArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => commands::LoadedSettings::explicit(path)?,
        None => commands::LoadedSettings::discover()?,
    };
    loaded.config.validate()?;

    // Console (human-readable, stderr) + optional rotating JSON file
    let logging = loaded.config.logging();
    let filter = match (&logging.filter, cli.verbose) {
        (_, true) => "frsh=debug,frsh_session=debug,frsh_store=debug,frsh_config=debug,info".to_string(),
        (Some(filter), false) => filter.clone(),
        (None, false) => "frsh=info,frsh_session=info,warn".to_string(),
    };

    use tracing_subscriber::prelude::*;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::EnvFilter::new(filter));

    let _guard = match &logging.dir {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "frsh.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(console_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_filter(tracing_subscriber::EnvFilter::new(
                            "frsh=trace,frsh_session=trace,frsh_store=trace,frsh_config=trace,info",
                        )),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(console_layer).init();
            None
        }
    };

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        data_path: cli.data,
        settings: loaded,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Create(args) => create::run(args, &ctx).await,
        Commands::Verify(args) => verify::run(args, &ctx).await,
        Commands::List(args) => list::run(args, &ctx).await,
        Commands::Extend(args) => extend::run(args, &ctx).await,
        Commands::Update(args) => update::run(args, &ctx).await,
        Commands::Delete(args) => delete::run(args, &ctx).await,
        Commands::DeleteUser(args) => delete::run_user(args, &ctx).await,
        Commands::Sweep(args) => sweep::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
