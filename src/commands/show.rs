use anyhow::{Context as _, Result};

use crate::Context;
use crate::system;

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let reconciler = system::live_reconciler(&ctx.settings);
    let live = reconciler
        .load_live()
        .context("Failed to read the live configuration")?;

    let text = if json {
        serde_json::to_string_pretty(&live)?
    } else {
        toml::to_string_pretty(&live).context("Failed to render configuration")?
    };
    println!("{text}");
    Ok(())
}
