use anyhow::{Context as _, Result, bail};
use reconcile::{Datastore, DatastoreKind, SystemConfig};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::commands;
use crate::system;
use crate::ui;

/// Read a configuration document.
pub(crate) fn load_document(path: &Path) -> Result<SystemConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let document: SystemConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid configuration document {}", path.display()))?;
    document
        .validate()
        .with_context(|| format!("Invalid configuration document {}", path.display()))?;
    Ok(document)
}

pub fn run(ctx: &Context, file: &Path, yes: bool, dry_run: bool) -> Result<()> {
    ui::header("Applying Configuration");

    if dry_run {
        ui::warn("Dry run - no changes will be made");
        println!();
    }

    let target = load_document(file)?;
    let mut store = commands::datastore(ctx)?;
    let running = store.load(DatastoreKind::Running)?;

    let events = running.diff(&target);
    if events.is_empty() {
        ui::success("Running configuration already matches");
        return Ok(());
    }

    ui::section("Changes");
    ui::text_diff(
        &toml::to_string_pretty(&running)?,
        &toml::to_string_pretty(&target)?,
    );
    ui::kv("Edit events", &events.len().to_string());
    println!();

    if dry_run {
        let live = system::live_reconciler(&ctx.settings)
            .load_live()
            .context("Failed to snapshot the live system")?;
        let mut preview = system::memory_reconciler(&live, ctx.settings.features);
        preview.remember(&running);
        let outcomes = preview.apply(&events).inspect_err(commands::explain)?;
        commands::print_outcomes(&outcomes);
        println!();
        ui::success("Dry run complete");
        return Ok(());
    }

    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Apply these changes to the system?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            bail!("Aborted by user");
        }
    }

    let mut reconciler = system::live_reconciler(&ctx.settings);
    reconciler.remember(&running);
    let outcomes = reconciler.apply(&events).inspect_err(commands::explain)?;
    commands::print_outcomes(&outcomes);

    store
        .save(DatastoreKind::Running, &target)
        .context("System updated but the running datastore could not be saved")?;

    println!();
    ui::success("Apply complete!");
    Ok(())
}
