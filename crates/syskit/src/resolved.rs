//! DNS adapters backed by the resolver daemon.
//!
//! Both adapters own one link: `load` only reports entries on that link and
//! `store` replaces that link's list in a single bus call. The daemon swaps
//! the list atomically, so a failed call leaves the previous list in place.

use crate::bus::{DnsEntry, DomainEntry, ResolverBus};
use crate::error::Error;
use crate::retry::{LogCallback, RetryConfig, with_retry};
use reconcile::{Adapter, Collection, DnsSearch, DnsServer, IpAddress};

/// Bus tuples for `SetLinkDNS`, one per distinct address.
///
/// Hostnames cannot be sent to the daemon. The bus form has no port, so a
/// non-default port is dropped with a warning.
pub fn encode_servers(servers: &Collection<DnsServer>) -> Result<Vec<(i32, Vec<u8>)>, Error> {
    let mut encoded: Vec<(i32, Vec<u8>)> = Vec::with_capacity(servers.len());
    for server in servers {
        let address = server.address.as_ref().ok_or_else(|| Error::Encode {
            what: format!("dns server '{}'", server.name),
            message: "no address".to_string(),
        })?;
        let family = address.family().ok_or_else(|| Error::Encode {
            what: format!("dns server '{}'", server.name),
            message: format!("'{address}' is not an IP address"),
        })?;
        if server.port != 0 {
            log::warn!(
                "dns server '{}': port {} is not supported by the resolver bus, using default",
                server.name,
                server.port
            );
        }
        let bytes = address.as_bytes().to_vec();
        if encoded.iter().any(|(_, existing)| *existing == bytes) {
            continue;
        }
        encoded.push((family, bytes));
    }
    Ok(encoded)
}

/// Servers from `DNS` entries on `ifindex`, each named after its address.
pub fn decode_servers(
    entries: &[DnsEntry],
    ifindex: i32,
) -> reconcile::Result<Collection<DnsServer>> {
    entries
        .iter()
        .filter(|e| e.ifindex == ifindex)
        .map(|e| IpAddress::from_family_bytes(e.family, &e.address).map(DnsServer::from_address))
        .collect()
}

/// Bus tuples for `SetLinkDomains`.
pub fn encode_search(search: &Collection<DnsSearch>) -> Vec<(String, bool)> {
    search
        .iter()
        .map(|s| (s.domain.clone(), s.search))
        .collect()
}

/// Search entries from `Domains` entries on `ifindex`.
pub fn decode_search(entries: &[DomainEntry], ifindex: i32) -> Collection<DnsSearch> {
    entries
        .iter()
        .filter(|e| e.ifindex == ifindex)
        .map(|e| DnsSearch {
            domain: e.domain.clone(),
            ifindex: e.ifindex,
            search: e.search,
        })
        .collect()
}

/// DNS servers on one resolver link.
pub struct ResolvedServers<B> {
    bus: B,
    ifindex: i32,
    retry: RetryConfig,
}

impl<B: ResolverBus> ResolvedServers<B> {
    pub fn new(bus: B, ifindex: i32) -> Self {
        Self {
            bus,
            ifindex,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl<B: ResolverBus> Adapter<DnsServer> for ResolvedServers<B> {
    fn name(&self) -> &str {
        "resolved"
    }

    fn load(&self) -> reconcile::Result<Collection<DnsServer>> {
        let entries = with_retry(&self.retry, Some(&LogCallback), || self.bus.dns())?;
        decode_servers(&entries, self.ifindex)
    }

    fn store(&self, collection: &Collection<DnsServer>) -> reconcile::Result<()> {
        let servers = encode_servers(collection)?;
        log::debug!(
            "SetLinkDNS on link {} with {} servers",
            self.ifindex,
            servers.len()
        );
        with_retry(&self.retry, Some(&LogCallback), || {
            self.bus.set_link_dns(self.ifindex, &servers)
        })?;
        Ok(())
    }
}

/// DNS search domains on one resolver link.
pub struct ResolvedSearch<B> {
    bus: B,
    ifindex: i32,
    retry: RetryConfig,
}

impl<B: ResolverBus> ResolvedSearch<B> {
    pub fn new(bus: B, ifindex: i32) -> Self {
        Self {
            bus,
            ifindex,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl<B: ResolverBus> Adapter<DnsSearch> for ResolvedSearch<B> {
    fn name(&self) -> &str {
        "resolved"
    }

    fn load(&self) -> reconcile::Result<Collection<DnsSearch>> {
        let entries = with_retry(&self.retry, Some(&LogCallback), || self.bus.domains())?;
        Ok(decode_search(&entries, self.ifindex))
    }

    fn store(&self, collection: &Collection<DnsSearch>) -> reconcile::Result<()> {
        let domains = encode_search(collection);
        log::debug!(
            "SetLinkDomains on link {} with {} domains",
            self.ifindex,
            domains.len()
        );
        with_retry(&self.retry, Some(&LogCallback), || {
            self.bus.set_link_domains(self.ifindex, &domains)
        })?;
        Ok(())
    }
}
