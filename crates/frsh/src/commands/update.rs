//! Update command - merge attributes into a session.

use anyhow::{Result, bail};
use clap::Args;
use console::Style;

use super::{Context, parse_attributes, print_session, session_json};

/// Arguments for the update command.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Session ID
    pub id: String,

    /// Attribute to set as key=value (repeatable)
    #[arg(short, long = "attr")]
    pub attrs: Vec<String>,
}

/// Run the update command.
pub async fn run(args: UpdateArgs, ctx: &Context) -> Result<()> {
    if args.attrs.is_empty() {
        bail!("nothing to update: pass at least one --attr key=value");
    }
    let patch = parse_attributes(&args.attrs)?;
    let store = ctx.open_store()?;
    let frsh = ctx.frsh(&store)?;

    let session = frsh.update_session(&args.id, patch).await?;
    ctx.save_store(&store)?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
    } else {
        let green = Style::new().green();
        println!("{} Session updated", green.apply_to("✓"));
        print_session(&session, ctx.verbose);
    }
    Ok(())
}
