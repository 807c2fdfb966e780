//! List command - a user's live sessions.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde_json::Value;

use super::{Context, format_ttl, session_json};

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// User ID
    pub user: String,

    /// Maximum sessions to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Run the list command.
pub async fn run(args: ListArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let frsh = ctx.frsh(&store)?;
    let sessions = frsh.list_user_sessions(&args.user).await?;

    if ctx.json_output {
        let items: Vec<Value> = sessions.iter().map(session_json).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style(format!("Sessions for {}", args.user)).bold());
    println!("{}", dim.apply_to("─".repeat(50)));

    if sessions.is_empty() {
        println!("{}", dim.apply_to("No live sessions"));
        return Ok(());
    }

    for session in sessions.iter().take(args.limit) {
        println!(
            "{}  expires {}",
            session.id,
            dim.apply_to(format_ttl(session.ttl))
        );
    }
    if sessions.len() > args.limit {
        println!(
            "{}",
            dim.apply_to(format!("... and {} more", sessions.len() - args.limit))
        );
    }
    Ok(())
}
