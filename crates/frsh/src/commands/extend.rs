//! Extend command - push a session's expiry back.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde_json::json;

use super::{Context, format_ttl};

/// Arguments for the extend command.
#[derive(Args, Debug)]
pub struct ExtendArgs {
    /// Session ID
    pub id: String,

    /// Milliseconds to add to the session's TTL
    #[arg(allow_negative_numbers = true)]
    pub duration_ms: i64,
}

/// Run the extend command.
pub async fn run(args: ExtendArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let frsh = ctx.frsh(&store)?;

    let ttl = frsh.extend_session(&args.id, args.duration_ms).await?;
    ctx.save_store(&store)?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"id": args.id, "TTL": ttl}))?
        );
    } else {
        let green = Style::new().green();
        println!(
            "{} Session {} now expires {}",
            green.apply_to("✓"),
            args.id,
            format_ttl(ttl)
        );
    }
    Ok(())
}
