//! File-backed startup and running datastores.

use chrono::{DateTime, Utc};
use reconcile::{Datastore, DatastoreKind, SystemConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk form of one datastore.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StoredDocument {
    /// Last time the datastore was written
    last_updated: DateTime<Utc>,
    #[serde(default)]
    config: SystemConfig,
}

/// Datastores kept as `startup.toml` and `running.toml` in one directory.
pub struct FileDatastore {
    dir: PathBuf,
}

fn datastore_error(message: String) -> reconcile::Error {
    reconcile::Error::Datastore { message }
}

impl FileDatastore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: DatastoreKind) -> PathBuf {
        self.dir.join(format!("{kind}.toml"))
    }

    fn read(&self, kind: DatastoreKind) -> reconcile::Result<Option<StoredDocument>> {
        let path = self.path(kind);
        if !path.exists() {
            log::debug!("{kind} datastore does not exist yet");
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let document = toml::from_str(&content)
            .map_err(|e| datastore_error(format!("{}: {e}", path.display())))?;
        Ok(Some(document))
    }

    /// When the datastore was last written.
    pub fn last_updated(&self, kind: DatastoreKind) -> reconcile::Result<Option<DateTime<Utc>>> {
        Ok(self.read(kind)?.map(|d| d.last_updated))
    }
}

impl Datastore for FileDatastore {
    fn load(&self, kind: DatastoreKind) -> reconcile::Result<SystemConfig> {
        Ok(self.read(kind)?.map(|d| d.config).unwrap_or_default())
    }

    fn save(&mut self, kind: DatastoreKind, config: &SystemConfig) -> reconcile::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let document = StoredDocument {
            last_updated: Utc::now(),
            config: config.clone(),
        };
        let content = toml::to_string_pretty(&document)
            .map_err(|e| datastore_error(format!("cannot serialize {kind}: {e}")))?;
        let path = self.path(kind);
        syskit::swap::replace_private_file(&path, &content)?;
        log::debug!("Saved {kind} datastore to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{AssociationType, DnsServer, NtpServer};
    use tempfile::TempDir;

    fn sample() -> SystemConfig {
        let mut config = SystemConfig::default();
        config
            .dns_servers
            .upsert(DnsServer::new("primary").with_address("192.0.2.53"));
        config.ntp_servers.upsert(
            NtpServer::new("ntp1")
                .with_address("192.0.2.1")
                .with_association(AssociationType::Server)
                .with_iburst(true),
        );
        config
    }

    #[test]
    fn test_missing_datastore_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileDatastore::new(dir.path().join("state"));
        assert!(store.is_empty(DatastoreKind::Startup).unwrap());
        assert!(store.last_updated(DatastoreKind::Startup).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut store = FileDatastore::new(dir.path());

        store.save(DatastoreKind::Running, &sample()).unwrap();

        assert_eq!(store.load(DatastoreKind::Running).unwrap(), sample());
        assert!(store.last_updated(DatastoreKind::Running).unwrap().is_some());
        assert!(store.load(DatastoreKind::Startup).unwrap().is_empty());
    }

    #[test]
    fn test_copy_startup_to_running() {
        let dir = TempDir::new().unwrap();
        let mut store = FileDatastore::new(dir.path());
        store.save(DatastoreKind::Startup, &sample()).unwrap();

        store
            .copy(DatastoreKind::Startup, DatastoreKind::Running)
            .unwrap();

        assert_eq!(store.load(DatastoreKind::Running).unwrap(), sample());
        assert!(dir.path().join("running.toml").exists());
    }

    #[test]
    fn test_corrupt_datastore_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = FileDatastore::new(dir.path());
        fs::write(store.path(DatastoreKind::Startup), "config = 3\n").unwrap();
        let err = store.load(DatastoreKind::Startup).unwrap_err();
        assert!(matches!(err, reconcile::Error::Datastore { .. }));
    }
}
