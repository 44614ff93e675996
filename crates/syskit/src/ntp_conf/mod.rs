//! NTP server adapter backed by the NTP daemon's configuration file.

pub mod parser;
pub mod writer;

pub use parser::{parse_file, parse_string};
pub use writer::{write_server, write_string};

use crate::swap;
use reconcile::{Adapter, Collection, NtpServer};
use std::path::PathBuf;

/// Default location of the NTP daemon configuration.
pub const DEFAULT_PATH: &str = "/etc/ntp.conf";

/// Parsed NTP configuration: association lines plus kept lines around them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NtpConf {
    /// Kept lines before the first association line
    pub before: Vec<String>,
    pub servers: Vec<NtpServer>,
    /// Kept lines after the first association line
    pub after: Vec<String>,
}

/// NTP servers in the daemon's configuration file.
pub struct NtpConfAdapter {
    path: PathBuf,
    label: String,
}

impl NtpConfAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            label: path.display().to_string(),
            path,
        }
    }
}

impl Adapter<NtpServer> for NtpConfAdapter {
    fn name(&self) -> &str {
        &self.label
    }

    fn load(&self) -> reconcile::Result<Collection<NtpServer>> {
        let conf = parse_file(&self.path)?;
        Ok(conf.servers.into_iter().collect())
    }

    fn store(&self, collection: &Collection<NtpServer>) -> reconcile::Result<()> {
        let mut conf = parse_file(&self.path)?;
        conf.servers = collection.iter().cloned().collect();
        let text = write_string(&conf)?;
        swap::replace_file(&self.path, &text)?;
        log::debug!("{}: wrote {} servers", self.label, conf.servers.len());
        Ok(())
    }
}
