//! Resolver daemon access over the system bus.
//!
//! The [`ResolverBus`] trait covers the four `org.freedesktop.resolve1`
//! members the DNS adapters need, allowing for different implementations
//! (the real `busctl` tool, a scripted fake for testing).

pub mod busctl;

use crate::error::{Error, Result};
use serde_json::Value;

/// Well-known name of the resolver daemon.
pub const SERVICE: &str = "org.freedesktop.resolve1";
/// Object path of the resolver manager.
pub const OBJECT_PATH: &str = "/org/freedesktop/resolve1";
/// Interface carrying the DNS properties and link methods.
pub const INTERFACE: &str = "org.freedesktop.resolve1.Manager";

/// Bus signature of the `DNS` property.
pub const DNS_SIGNATURE: &str = "a(iiay)";
/// Bus signature of the `Domains` property.
pub const DOMAINS_SIGNATURE: &str = "a(isb)";

/// One element of the `DNS` property: `(ifindex, family, address bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsEntry {
    pub ifindex: i32,
    pub family: i32,
    pub address: Vec<u8>,
}

/// One element of the `Domains` property: `(ifindex, domain, route-only)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub ifindex: i32,
    pub domain: String,
    pub search: bool,
}

/// Resolver daemon operations.
pub trait ResolverBus {
    /// Read the `DNS` property.
    fn dns(&self) -> Result<Vec<DnsEntry>>;

    /// Read the `Domains` property.
    fn domains(&self) -> Result<Vec<DomainEntry>>;

    /// Call `SetLinkDNS(i, a(iay))`, replacing every server on the link.
    fn set_link_dns(&self, ifindex: i32, servers: &[(i32, Vec<u8>)]) -> Result<()>;

    /// Call `SetLinkDomains(i, a(sb))`, replacing every domain on the link.
    fn set_link_domains(&self, ifindex: i32, domains: &[(String, bool)]) -> Result<()>;
}

impl<B: ResolverBus + ?Sized> ResolverBus for Box<B> {
    fn dns(&self) -> Result<Vec<DnsEntry>> {
        (**self).dns()
    }

    fn domains(&self) -> Result<Vec<DomainEntry>> {
        (**self).domains()
    }

    fn set_link_dns(&self, ifindex: i32, servers: &[(i32, Vec<u8>)]) -> Result<()> {
        (**self).set_link_dns(ifindex, servers)
    }

    fn set_link_domains(&self, ifindex: i32, domains: &[(String, bool)]) -> Result<()> {
        (**self).set_link_domains(ifindex, domains)
    }
}

impl<B: ResolverBus + ?Sized> ResolverBus for std::rc::Rc<B> {
    fn dns(&self) -> Result<Vec<DnsEntry>> {
        (**self).dns()
    }

    fn domains(&self) -> Result<Vec<DomainEntry>> {
        (**self).domains()
    }

    fn set_link_dns(&self, ifindex: i32, servers: &[(i32, Vec<u8>)]) -> Result<()> {
        (**self).set_link_dns(ifindex, servers)
    }

    fn set_link_domains(&self, ifindex: i32, domains: &[(String, bool)]) -> Result<()> {
        (**self).set_link_domains(ifindex, domains)
    }
}

fn reply_error(message: impl Into<String>) -> Error {
    Error::BusReply {
        message: message.into(),
    }
}

/// Pull the `data` array out of `busctl --json` property output, checking
/// the declared signature.
fn property_data<'a>(json: &'a Value, signature: &str) -> Result<&'a [Value]> {
    match json["type"].as_str() {
        Some(found) if found == signature => {}
        Some(found) => {
            return Err(reply_error(format!(
                "expected signature {signature}, got {found}"
            )));
        }
        None => return Err(reply_error("missing property type")),
    }
    json["data"]
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| reply_error("property data is not an array"))
}

fn int32(value: &Value, what: &str) -> Result<i32> {
    value
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| reply_error(format!("{what} is not an int32")))
}

/// Decode `DNS` property output (`a(iiay)`).
pub fn parse_dns(json: &Value) -> Result<Vec<DnsEntry>> {
    property_data(json, DNS_SIGNATURE)?
        .iter()
        .map(|item| {
            let fields = item
                .as_array()
                .filter(|f| f.len() == 3)
                .ok_or_else(|| reply_error("DNS entry is not an (iiay) struct"))?;
            let address = fields[2]
                .as_array()
                .ok_or_else(|| reply_error("DNS address is not a byte array"))?
                .iter()
                .map(|b| {
                    b.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| reply_error("DNS address byte out of range"))
                })
                .collect::<Result<Vec<u8>>>()?;
            Ok(DnsEntry {
                ifindex: int32(&fields[0], "ifindex")?,
                family: int32(&fields[1], "address family")?,
                address,
            })
        })
        .collect()
}

/// Decode `Domains` property output (`a(isb)`).
pub fn parse_domains(json: &Value) -> Result<Vec<DomainEntry>> {
    property_data(json, DOMAINS_SIGNATURE)?
        .iter()
        .map(|item| {
            let fields = item
                .as_array()
                .filter(|f| f.len() == 3)
                .ok_or_else(|| reply_error("Domains entry is not an (isb) struct"))?;
            Ok(DomainEntry {
                ifindex: int32(&fields[0], "ifindex")?,
                domain: fields[1]
                    .as_str()
                    .ok_or_else(|| reply_error("domain is not a string"))?
                    .to_string(),
                search: fields[2]
                    .as_bool()
                    .ok_or_else(|| reply_error("route-only flag is not a bool"))?,
            })
        })
        .collect()
}

/// Flattened `busctl call` arguments for `SetLinkDNS`.
pub fn set_link_dns_args(ifindex: i32, servers: &[(i32, Vec<u8>)]) -> Vec<String> {
    let mut args = call_prefix("SetLinkDNS", "ia(iay)");
    args.push(ifindex.to_string());
    args.push(servers.len().to_string());
    for (family, bytes) in servers {
        args.push(family.to_string());
        args.push(bytes.len().to_string());
        args.extend(bytes.iter().map(u8::to_string));
    }
    args
}

/// Flattened `busctl call` arguments for `SetLinkDomains`.
pub fn set_link_domains_args(ifindex: i32, domains: &[(String, bool)]) -> Vec<String> {
    let mut args = call_prefix("SetLinkDomains", "ia(sb)");
    args.push(ifindex.to_string());
    args.push(domains.len().to_string());
    for (domain, search) in domains {
        args.push(domain.clone());
        args.push(search.to_string());
    }
    args
}

fn call_prefix(method: &str, signature: &str) -> Vec<String> {
    [
        "call", SERVICE, OBJECT_PATH, INTERFACE, method, signature,
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
