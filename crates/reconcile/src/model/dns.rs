//! DNS resolver entities: search domains and name servers

use crate::change::{Changeable, FieldPath, parse_port};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::model::IpAddress;
use serde::{Deserialize, Serialize};

/// A search domain.
///
/// `search` is the resolver daemon's per-domain flag from the bus tuple,
/// carried verbatim. New entries are created with it unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSearch {
    pub domain: String,
    #[serde(default)]
    pub ifindex: i32,
    #[serde(default)]
    pub search: bool,
}

impl DnsSearch {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ifindex: 0,
            search: false,
        }
    }

    pub fn with_ifindex(mut self, ifindex: i32) -> Self {
        self.ifindex = ifindex;
        self
    }
}

impl Entity for DnsSearch {
    const KIND: &'static str = "dns search domain";

    fn key(&self) -> &str {
        &self.domain
    }

    fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(Error::invalid_value("search", "domain must not be empty"));
        }
        if self.domain.chars().any(char::is_whitespace) {
            return Err(Error::invalid_value(
                "search",
                format!("'{}' contains whitespace", self.domain),
            ));
        }
        Ok(())
    }
}

impl Changeable for DnsSearch {
    const LIST_PATH: &'static str = "/ietf-system:system/dns-resolver/search";
    const KEY_LEAF: &'static str = ".";
    const FIELDS: &'static [&'static str] = &["."];

    fn with_key(key: &str) -> Self {
        Self::new(key)
    }

    fn set_field(&mut self, field: &FieldPath, _value: Option<&str>) -> Result<()> {
        Err(field.unknown::<Self>())
    }

    fn field_values(&self) -> Vec<(FieldPath, String)> {
        vec![(FieldPath::leaf("."), self.domain.clone())]
    }
}

/// A name server.
///
/// The bus only knows servers by address, so identity is the address
/// whenever both sides have one. Port 0 means the default port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddress>,
    #[serde(default)]
    pub port: u16,
}

impl DnsServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            port: 0,
        }
    }

    /// A server named after its own address, as loaded from the live system.
    pub fn from_address(address: IpAddress) -> Self {
        Self {
            name: address.to_string(),
            address: Some(address),
            port: 0,
        }
    }

    pub fn with_address(mut self, address: impl Into<IpAddress>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl Entity for DnsServer {
    const KIND: &'static str = "dns server";

    fn key(&self) -> &str {
        &self.name
    }

    fn same_identity(&self, other: &Self) -> bool {
        match (&self.address, &other.address) {
            (Some(a), Some(b)) => a == b,
            _ => self.name == other.name,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_value("name", "must not be empty"));
        }
        if self.address.as_ref().is_none_or(IpAddress::is_empty) {
            return Err(Error::Incomplete {
                kind: Self::KIND,
                key: self.name.clone(),
                field: "address",
            });
        }
        if let Some(address) = &self.address {
            address.validate("udp-and-tcp/address")?;
        }
        Ok(())
    }
}

impl Changeable for DnsServer {
    const LIST_PATH: &'static str = "/ietf-system:system/dns-resolver/server";
    const KEY_LEAF: &'static str = "name";
    const FIELDS: &'static [&'static str] =
        &["name", "udp-and-tcp/address", "udp-and-tcp/port"];

    fn with_key(key: &str) -> Self {
        Self::new(key)
    }

    fn set_field(&mut self, field: &FieldPath, value: Option<&str>) -> Result<()> {
        match field.leaf.as_str() {
            "udp-and-tcp/address" => self.address = value.map(IpAddress::parse),
            "udp-and-tcp/port" => {
                self.port = value
                    .map(|v| parse_port(&field.leaf, v))
                    .transpose()?
                    .unwrap_or(0);
            }
            _ => return Err(field.unknown::<Self>()),
        }
        Ok(())
    }

    fn field_values(&self) -> Vec<(FieldPath, String)> {
        let mut values = vec![(FieldPath::leaf("name"), self.name.clone())];
        if let Some(address) = &self.address {
            values.push((FieldPath::leaf("udp-and-tcp/address"), address.to_string()));
        }
        if self.port != 0 {
            values.push((FieldPath::leaf("udp-and-tcp/port"), self.port.to_string()));
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_uses_address_bytes() {
        let named = DnsServer::new("primary").with_address("2001:db8::53");
        let loaded = DnsServer::from_address(IpAddress::parse("2001:0db8::0053"));
        assert!(named.same_identity(&loaded));
        assert_ne!(named.key(), loaded.key());
    }

    #[test]
    fn test_hostname_never_matches_ipv4_with_same_bytes() {
        // "dns1" is the byte sequence of 100.110.115.49
        let named = DnsServer::new("dns1")
            .with_address(IpAddress::Opaque("dns1".to_string()));
        let loaded = DnsServer::from_address(IpAddress::V4([100, 110, 115, 49]));
        assert!(!named.same_identity(&loaded));
    }

    #[test]
    fn test_validate_rejects_multi_word_address() {
        let server = DnsServer::new("primary").with_address("ns.example rotate");
        assert!(matches!(server.validate(), Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn test_identity_falls_back_to_name() {
        let a = DnsServer::new("primary");
        let b = DnsServer::new("primary").with_address("192.0.2.53");
        assert!(a.same_identity(&b));
    }

    #[test]
    fn test_validate_requires_address() {
        assert!(DnsServer::new("primary").validate().is_err());
        assert!(
            DnsServer::new("primary")
                .with_address("192.0.2.53")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_search_rejects_whitespace() {
        assert!(DnsSearch::new("bad domain").validate().is_err());
        assert!(DnsSearch::new("example.com").validate().is_ok());
    }

    #[test]
    fn test_port_delete_resets_default() {
        let mut server = DnsServer::new("primary").with_port(5353);
        server
            .set_field(&FieldPath::leaf("udp-and-tcp/port"), None)
            .unwrap();
        assert_eq!(server.port, 0);
    }
}
