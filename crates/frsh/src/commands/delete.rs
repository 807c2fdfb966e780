//! Delete commands - remove one session or all of a user's sessions.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde_json::json;

use super::Context;

/// Arguments for the delete command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Session ID
    pub id: String,
}

/// Arguments for the delete-user command.
#[derive(Args, Debug)]
pub struct DeleteUserArgs {
    /// User ID
    pub user: String,
}

/// Run the delete command. Deleting an unknown session succeeds.
pub async fn run(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let frsh = ctx.frsh(&store)?;

    frsh.delete_session(&args.id).await?;
    ctx.save_store(&store)?;

    if ctx.json_output {
        println!("{}", json!({"deleted": args.id}));
    } else {
        let green = Style::new().green();
        println!("{} Session {} deleted", green.apply_to("✓"), args.id);
    }
    Ok(())
}

/// Run the delete-user command.
pub async fn run_user(args: DeleteUserArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let frsh = ctx.frsh(&store)?;

    let count = frsh.delete_user_sessions(&args.user).await?;
    ctx.save_store(&store)?;

    if ctx.json_output {
        println!("{}", json!({"user": args.user, "deleted": count}));
    } else {
        let green = Style::new().green();
        println!(
            "{} Deleted {} session(s) of {}",
            green.apply_to("✓"),
            count,
            args.user
        );
    }
    Ok(())
}
