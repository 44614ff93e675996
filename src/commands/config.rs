use anyhow::Result;

use crate::Context;
use crate::config::DEFAULT_CONFIG_PATH;
use crate::store::FileDatastore;
use crate::ui;
use reconcile::DatastoreKind;

/// Print the effective settings as TOML.
pub fn show(ctx: &Context) -> Result<()> {
    print!("{}", ctx.settings.to_toml()?);
    Ok(())
}

/// Print where settings and datastores are read from.
pub fn path(ctx: &Context) -> Result<()> {
    ui::header("Locations");

    let settings_path = ctx
        .config_path
        .as_ref()
        .map_or_else(|| DEFAULT_CONFIG_PATH.to_string(), |p| p.display().to_string());
    let exists = ctx
        .config_path
        .as_deref()
        .map_or_else(|| std::path::Path::new(DEFAULT_CONFIG_PATH).exists(), std::path::Path::exists);
    ui::kv(
        "Settings",
        &format!(
            "{settings_path}{}",
            if exists { "" } else { " (not found, defaults)" }
        ),
    );

    let store = FileDatastore::new(ctx.settings.datastore_dir()?);
    for kind in [DatastoreKind::Startup, DatastoreKind::Running] {
        ui::kv(
            &format!("{kind} datastore"),
            &store.path(kind).display().to_string(),
        );
    }

    let accounts = &ctx.settings.accounts;
    ui::section("Managed files");
    ui::kv("resolv.conf", &ctx.settings.dns.resolv_conf.display().to_string());
    ui::kv("ntp.conf", &ctx.settings.ntp.config.display().to_string());
    ui::kv("passwd", &accounts.passwd.display().to_string());
    ui::kv("shadow", &accounts.shadow.display().to_string());
    ui::kv("group", &accounts.group.display().to_string());
    ui::kv("home base", &accounts.home_base.display().to_string());
    Ok(())
}
