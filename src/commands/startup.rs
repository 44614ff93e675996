use anyhow::{Context as _, Result};

use crate::Context;
use crate::commands;
use crate::system;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Startup Reconciliation");

    let mut store = commands::datastore(ctx)?;
    let mut reconciler = system::live_reconciler(&ctx.settings);
    if !ctx.quiet {
        ui::kv("Collections", &reconciler.kinds().join(", "));
        ui::kv("Datastore", &store.dir().display().to_string());
    }

    let report = match reconciler.startup(&mut store) {
        Ok(report) => report,
        Err(e) => {
            commands::explain(&e);
            return Err(e).context("Startup reconciliation failed");
        }
    };

    if report.seeded {
        ui::success("Startup datastore seeded from the live system");
        return Ok(());
    }

    for (status, pushed) in &report.collections {
        let detail = if *pushed > 0 {
            format!("{} ({pushed} pushed)", ui::status_label(status.status))
        } else {
            ui::status_label(status.status).to_string()
        };
        ui::kv(status.kind, &detail);
        if let Some(error) = &status.error {
            ui::dim(error);
        }
    }

    println!();
    ui::success(&format!(
        "Startup complete, {} entries pushed",
        report.total_pushed()
    ));
    Ok(())
}
