use anyhow::{Context as _, Result};
use reconcile::{ChangeEvent, Datastore, DatastoreKind};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::commands;
use crate::system;
use crate::ui;

/// Read a JSON array of edit events.
pub(crate) fn load_events(path: &Path) -> Result<Vec<ChangeEvent>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid event list in {}", path.display()))
}

pub fn run(ctx: &Context, file: &Path, dry_run: bool) -> Result<()> {
    ui::header("Edit Batch");

    let events = load_events(file)?;
    if events.is_empty() {
        ui::info("No events to apply");
        return Ok(());
    }
    ui::kv("Events", &events.len().to_string());

    let mut store = commands::datastore(ctx)?;
    let running = store.load(DatastoreKind::Running)?;

    // Rejected edits never reach the system
    let edited = system::fold_events(&running, &events)
        .inspect_err(commands::explain)
        .context("Edit batch rejected")?;

    let mut reconciler = if dry_run {
        ui::warn("Dry run - no changes will be made");
        let live = system::live_reconciler(&ctx.settings)
            .load_live()
            .context("Failed to snapshot the live system")?;
        system::memory_reconciler(&live, ctx.settings.features)
    } else {
        system::live_reconciler(&ctx.settings)
    };
    reconciler.remember(&running);

    let outcomes = reconciler
        .apply(&events)
        .inspect_err(commands::explain)
        .context("Edit batch failed, system left unchanged")?;
    commands::print_outcomes(&outcomes);

    if !dry_run {
        store
            .save(DatastoreKind::Running, &edited)
            .context("System updated but the running datastore could not be saved")?;
    }

    println!();
    ui::success("Edit batch applied");
    Ok(())
}
