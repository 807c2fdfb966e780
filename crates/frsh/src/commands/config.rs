//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::Style;
use frsh_config::{FrshConfig, LoggingSection, SessionSection, SweepSection};
use serde_json::json;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration (default)
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show the user configuration file path
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./frsh.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(),
        ConfigCommand::Init { local, force } => cmd_init(local, force),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.settings.config;
    let session = config.session();
    let sweep = config.sweep();
    let logging = config.logging();

    if ctx.json_output {
        let sources: Vec<String> = ctx
            .settings
            .sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.display().to_string())
            .collect();
        let value = json!({
            "session": session,
            "sweep": sweep,
            "logging": logging,
            "sources": sources,
            "data": ctx.data_path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("# frsh Configuration\n");

    let loaded: Vec<_> = ctx.settings.sources.iter().filter(|s| s.loaded).collect();
    if loaded.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in loaded {
            println!("  {}", source.path.display());
        }
        println!();
    }

    println!("Session:");
    println!("  root: {}", session.root);
    println!("  expiry: {}s", session.expiry_secs);
    println!();
    println!("Sweep:");
    println!("  concurrency: {}", sweep.concurrency);
    println!("  recheck_primary: {}", sweep.recheck_primary);
    println!();
    println!("Logging:");
    match &logging.dir {
        Some(dir) => println!("  dir: {}", dir.display()),
        None => println!("  dir: (console only)"),
    }
    if let Some(filter) = &logging.filter {
        println!("  filter: {}", filter);
    }
    println!();
    println!("Data: {}", ctx.data_path.display());

    if !ctx.settings.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &ctx.settings.warnings {
            println!("  ⚠ {}", w);
        }
    }

    if ctx.verbose {
        println!("\n---\nRaw config:\n");
        println!("{}", config.to_toml()?);
    }
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let dim = Style::new().dim();
    println!("Config file search order (later overrides earlier):\n");

    for source in &ctx.settings.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!(
            "  {} {:<8} {}",
            status,
            source.layer.label(),
            dim.apply_to(source.path.display())
        );
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    match frsh_config::user_config_path() {
        Some(path) => println!("{}", path.display()),
        None => bail!("could not determine the user config directory"),
    }
    Ok(())
}

fn cmd_init(local: bool, force: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("frsh.toml")
    } else {
        match frsh_config::user_config_path() {
            Some(path) => path,
            None => bail!("could not determine the user config directory"),
        }
    };

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = FrshConfig {
        session: Some(SessionSection::default()),
        sweep: Some(SweepSection::default()),
        logging: Some(LoggingSection::default()),
    };
    frsh_config::save_config(&config, &path)?;

    let green = Style::new().green();
    println!("{} Created {}", green.apply_to("✓"), path.display());
    Ok(())
}
