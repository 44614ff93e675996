use anyhow::Result;
use colored::Colorize;
use reconcile::{Datastore, DatastoreKind};

use crate::Context;
use crate::commands;
use crate::system;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("System Status");

    let store = commands::datastore(ctx)?;
    let running = store.load(DatastoreKind::Running)?;
    match store.last_updated(DatastoreKind::Running)? {
        Some(when) => ui::kv("Running datastore", &when.to_rfc3339()),
        None => {
            ui::warn("Running datastore is empty; run 'sysreconcile startup' first");
            return Ok(());
        }
    }

    let reconciler = system::live_reconciler(&ctx.settings);
    let statuses = reconciler.status(&running);
    let mut in_sync = true;

    for status in &statuses {
        ui::section(status.kind);
        if ctx.verbose > 0 {
            ui::kv("Source", &status.source);
        }
        ui::kv(
            "Status",
            &format!(
                "{} ({} desired)",
                ui::status_label(status.status),
                status.desired.to_string().bold()
            ),
        );
        if !status.missing.is_empty() {
            ui::kv("Missing", &status.missing.join(", "));
        }
        if let Some(error) = &status.error {
            ui::kv("Error", &error.red().to_string());
        }
        in_sync &= status.is_equal();
    }

    println!();
    if in_sync {
        ui::success("Live system matches the running datastore");
    } else {
        ui::warn("Live system differs from the running datastore");
    }
    Ok(())
}
