//! Verify command - check a session is live.

use anyhow::{Result, bail};
use clap::Args;
use console::Style;

use super::{Context, print_session, session_json};

/// Arguments for the verify command.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Session ID
    pub id: String,
}

/// Run the verify command. Exits non-zero when the session is not live.
pub async fn run(args: VerifyArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let frsh = ctx.frsh(&store)?;

    let verified = frsh.verify_session(&args.id).await?;
    // Reading an expired session reclaims it.
    ctx.save_store(&store)?;

    match verified {
        Some(session) => {
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
            } else {
                let green = Style::new().green();
                println!("{} Session is live", green.apply_to("✓"));
                print_session(&session, ctx.verbose);
            }
            Ok(())
        }
        None => {
            if ctx.json_output {
                println!("null");
            }
            bail!("session '{}' not found or expired", args.id)
        }
    }
}
