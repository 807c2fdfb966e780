//! Create command - start a session for a user.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::{Context, parse_attributes, print_session, session_json};

/// Arguments for the create command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// User the session belongs to
    pub user: String,

    /// Extra attribute as key=value (repeatable)
    #[arg(short, long = "attr")]
    pub attrs: Vec<String>,
}

/// Run the create command.
pub async fn run(args: CreateArgs, ctx: &Context) -> Result<()> {
    let attributes = parse_attributes(&args.attrs)?;
    let store = ctx.open_store()?;
    let frsh = ctx.frsh(&store)?;

    let (_, session) = frsh.create_session(&args.user, attributes).await?;
    ctx.save_store(&store)?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
    } else {
        let green = Style::new().green();
        println!("{} Session created", green.apply_to("✓"));
        print_session(&session, ctx.verbose);
    }
    Ok(())
}
