//! Versioned configuration store interface

use crate::document::SystemConfig;
use crate::error::Result;
use std::fmt;

/// Which copy of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatastoreKind {
    /// Applied at boot
    Startup,
    /// Currently in effect
    Running,
}

impl DatastoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for DatastoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Get/set/commit access to the startup and running datastores.
pub trait Datastore {
    fn load(&self, kind: DatastoreKind) -> Result<SystemConfig>;

    /// Replace and commit one datastore.
    fn save(&mut self, kind: DatastoreKind, config: &SystemConfig) -> Result<()>;

    fn is_empty(&self, kind: DatastoreKind) -> Result<bool> {
        Ok(self.load(kind)?.is_empty())
    }

    fn copy(&mut self, from: DatastoreKind, to: DatastoreKind) -> Result<()> {
        let config = self.load(from)?;
        self.save(to, &config)
    }
}

/// Datastore kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    pub startup: SystemConfig,
    pub running: SystemConfig,
}

impl Datastore for MemoryDatastore {
    fn load(&self, kind: DatastoreKind) -> Result<SystemConfig> {
        Ok(match kind {
            DatastoreKind::Startup => self.startup.clone(),
            DatastoreKind::Running => self.running.clone(),
        })
    }

    fn save(&mut self, kind: DatastoreKind, config: &SystemConfig) -> Result<()> {
        match kind {
            DatastoreKind::Startup => self.startup = config.clone(),
            DatastoreKind::Running => self.running = config.clone(),
        }
        Ok(())
    }
}
