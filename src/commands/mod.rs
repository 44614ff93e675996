pub mod apply;
pub mod config;
pub mod edit;
pub mod show;
pub mod startup;
pub mod status;

use crate::Context;
use crate::store::FileDatastore;
use crate::ui;
use anyhow::Result;
use reconcile::PhaseOutcome;

/// Open the datastore directory named by the settings.
pub(crate) fn datastore(ctx: &Context) -> Result<FileDatastore> {
    let dir = ctx.settings.datastore_dir()?;
    log::debug!("Using datastore in {}", dir.display());
    Ok(FileDatastore::new(dir))
}

/// Print what each collection did with a batch.
pub(crate) fn print_outcomes(outcomes: &[(&'static str, PhaseOutcome)]) {
    for (kind, outcome) in outcomes {
        match outcome {
            PhaseOutcome::Stored { applied, entries } => ui::kv(
                kind,
                &format!("{applied} edits applied, {entries} entries stored"),
            ),
            PhaseOutcome::Skipped => ui::dim(&format!("{kind}: unchanged")),
            PhaseOutcome::Released => ui::kv(kind, "accepted"),
            PhaseOutcome::RolledBack { entries } => {
                ui::kv(kind, &format!("rolled back to {entries} entries"));
            }
        }
    }
}

/// Advice line for a failed reconciliation.
pub(crate) fn explain(err: &reconcile::Error) {
    let category = err.category();
    ui::error(&format!("{}: {err}", category.description()));
    ui::dim(category.advice());
}
