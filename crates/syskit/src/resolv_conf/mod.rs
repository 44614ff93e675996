//! DNS adapters backed by `/etc/resolv.conf`.
//!
//! Used on systems without the resolver daemon. The file carries no server
//! names or ports, so loaded servers are named after their address.

pub mod parser;
pub mod writer;

pub use parser::{parse_file, parse_string};
pub use writer::write_string;

use crate::error::Error;
use crate::swap;
use reconcile::{Adapter, Collection, DnsSearch, DnsServer, IpAddress};
use std::path::{Path, PathBuf};

/// Default location of the resolver configuration.
pub const DEFAULT_PATH: &str = "/etc/resolv.conf";
/// Most name servers the resolver library will use.
pub const MAX_NAMESERVERS: usize = 3;
/// Most search domains the resolver library will use.
pub const MAX_SEARCH: usize = 6;

/// Resolver `options` this crate understands; other option words are kept
/// in `extra`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub timeout: u8,
    pub attempts: u8,
    pub ndots: u8,
    pub extra: Vec<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            timeout: 5,
            attempts: 2,
            ndots: 1,
            extra: Vec::new(),
        }
    }
}

/// Parsed resolver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvConf {
    pub nameservers: Vec<IpAddress>,
    pub search: Vec<String>,
    pub options: ResolverOptions,
    /// Lines kept verbatim
    pub other: Vec<String>,
}

/// Read-modify-write of the shared file.
fn update(path: &Path, edit: impl FnOnce(&mut ResolvConf)) -> reconcile::Result<()> {
    let mut conf = parse_file(path)?;
    edit(&mut conf);
    swap::replace_file(path, &write_string(&conf))?;
    Ok(())
}

fn label(path: &Path) -> String {
    path.display().to_string()
}

/// Name servers in the resolver configuration file.
pub struct ResolvConfServers {
    path: PathBuf,
    label: String,
}

impl ResolvConfServers {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            label: label(&path),
            path,
        }
    }
}

impl Adapter<DnsServer> for ResolvConfServers {
    fn name(&self) -> &str {
        &self.label
    }

    fn load(&self) -> reconcile::Result<Collection<DnsServer>> {
        let conf = parse_file(&self.path)?;
        Ok(conf
            .nameservers
            .into_iter()
            .map(DnsServer::from_address)
            .collect())
    }

    fn store(&self, collection: &Collection<DnsServer>) -> reconcile::Result<()> {
        let mut addresses: Vec<IpAddress> = Vec::with_capacity(collection.len());
        for server in collection {
            let address = server
                .address
                .as_ref()
                .filter(|a| a.is_ip())
                .ok_or_else(|| Error::Encode {
                    what: format!("dns server '{}'", server.name),
                    message: "resolv.conf needs an IP address".to_string(),
                })?;
            if server.port != 0 {
                log::warn!(
                    "dns server '{}': resolv.conf cannot carry port {}",
                    server.name,
                    server.port
                );
            }
            if !addresses.contains(address) {
                addresses.push(address.clone());
            }
        }
        if addresses.len() > MAX_NAMESERVERS {
            return Err(Error::Encode {
                what: "nameserver list".to_string(),
                message: format!(
                    "{} servers given, resolv.conf allows {MAX_NAMESERVERS}",
                    addresses.len()
                ),
            }
            .into());
        }

        update(&self.path, |conf| conf.nameservers = addresses)
    }
}

/// Search domains in the resolver configuration file.
pub struct ResolvConfSearch {
    path: PathBuf,
    label: String,
}

impl ResolvConfSearch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            label: label(&path),
            path,
        }
    }
}

impl Adapter<DnsSearch> for ResolvConfSearch {
    fn name(&self) -> &str {
        &self.label
    }

    fn load(&self) -> reconcile::Result<Collection<DnsSearch>> {
        let conf = parse_file(&self.path)?;
        Ok(conf.search.into_iter().map(DnsSearch::new).collect())
    }

    fn store(&self, collection: &Collection<DnsSearch>) -> reconcile::Result<()> {
        if collection.len() > MAX_SEARCH {
            return Err(Error::Encode {
                what: "search list".to_string(),
                message: format!(
                    "{} domains given, resolv.conf allows {MAX_SEARCH}",
                    collection.len()
                ),
            }
            .into());
        }
        let domains = collection.keys();
        update(&self.path, |conf| conf.search = domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{CheckStatus, check};
    use std::fs;
    use tempfile::TempDir;

    const ORIGINAL: &str = "# local resolver\n\
                            nameserver 192.0.2.1\n\
                            search old.example\n\
                            options ndots:3 edns0\n";

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resolv.conf");
        fs::write(&path, ORIGINAL).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_servers_and_search() {
        let (_dir, path) = setup();
        let servers = ResolvConfServers::new(&path).load().unwrap();
        assert_eq!(servers.keys(), vec!["192.0.2.1"]);
        let search = ResolvConfSearch::new(&path).load().unwrap();
        assert_eq!(search.keys(), vec!["old.example"]);
    }

    #[test]
    fn test_store_servers_keeps_options_and_search() {
        let (_dir, path) = setup();
        let adapter = ResolvConfServers::new(&path);
        let desired: Collection<DnsServer> = [
            DnsServer::new("primary").with_address("192.0.2.53"),
            DnsServer::new("secondary").with_address("2001:db8::53"),
        ]
        .into_iter()
        .collect();

        adapter.store(&desired).unwrap();
        adapter.store(&desired).unwrap();

        let conf = parse_file(&path).unwrap();
        assert_eq!(conf.search, vec!["old.example"]);
        assert_eq!(conf.options.ndots, 3);
        assert_eq!(conf.options.extra, vec!["edns0"]);
        assert_eq!(conf.other, vec!["# local resolver"]);
        assert!(matches!(check(&desired, &adapter), CheckStatus::Equal));
        assert!(swap::backup_path(&path).exists());
    }

    #[test]
    fn test_store_search() {
        let (_dir, path) = setup();
        let adapter = ResolvConfSearch::new(&path);
        let desired: Collection<DnsSearch> = ["a.example", "b.example"]
            .into_iter()
            .map(DnsSearch::new)
            .collect();

        adapter.store(&desired).unwrap();

        assert_eq!(adapter.load().unwrap(), desired);
        assert_eq!(
            ResolvConfServers::new(&path).load().unwrap().keys(),
            vec!["192.0.2.1"]
        );
    }

    #[test]
    fn test_too_many_nameservers_rejected() {
        let (_dir, path) = setup();
        let desired: Collection<DnsServer> = (1..=4)
            .map(|n| DnsServer::from_address(IpAddress::parse(&format!("192.0.2.{n}"))))
            .collect();

        let err = ResolvConfServers::new(&path).store(&desired).unwrap_err();
        assert_eq!(err.category(), reconcile::ErrorCategory::Validation);
        assert_eq!(fs::read_to_string(&path).unwrap(), ORIGINAL);
    }

    #[test]
    fn test_malformed_file_is_decode_error() {
        let (_dir, path) = setup();
        fs::write(&path, "options timeout:99\n").unwrap();
        let err = ResolvConfServers::new(&path).load().unwrap_err();
        assert_eq!(err.category(), reconcile::ErrorCategory::Decode);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let adapter = ResolvConfSearch::new(dir.path().join("resolv.conf"));
        assert!(adapter.load().unwrap().is_empty());
    }
}
