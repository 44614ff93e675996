//! Tagged network address shared by the DNS and NTP entities.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Address family number for IPv4 on the resolver bus.
pub const AF_INET: i32 = 2;
/// Address family number for IPv6 on the resolver bus.
pub const AF_INET6: i32 = 10;

/// A server address.
///
/// Bus backends only ever produce `V4`/`V6`. File backends may also carry a
/// hostname, kept verbatim as `Opaque`. Equality compares the raw bytes, so
/// two spellings of the same IPv6 address are the same address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum IpAddress {
    V4([u8; 4]),
    V6([u8; 16]),
    Opaque(String),
}

impl IpAddress {
    /// Parse textual input, falling back to `Opaque` for anything that is
    /// not an IP literal.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let bare = text
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .unwrap_or(text);
        match bare.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => Self::V4(v4.octets()),
            Ok(IpAddr::V6(v6)) => Self::V6(v6.octets()),
            Err(_) => Self::Opaque(text.to_string()),
        }
    }

    /// Build an address from a bus `(family, bytes)` pair.
    ///
    /// The byte length must match the family: 4 for `AF_INET`, 16 for
    /// `AF_INET6`. Any other family is rejected.
    pub fn from_family_bytes(family: i32, bytes: &[u8]) -> Result<Self> {
        match family {
            AF_INET => {
                let octets: [u8; 4] = bytes.try_into().map_err(|_| Error::Decode {
                    message: format!("IPv4 address has {} bytes, expected 4", bytes.len()),
                })?;
                Ok(Self::V4(octets))
            }
            AF_INET6 => {
                let octets: [u8; 16] = bytes.try_into().map_err(|_| Error::Decode {
                    message: format!("IPv6 address has {} bytes, expected 16", bytes.len()),
                })?;
                Ok(Self::V6(octets))
            }
            other => Err(Error::Decode {
                message: format!("unknown address family {other}"),
            }),
        }
    }

    /// Bus address family, or `None` for hostnames.
    pub fn family(&self) -> Option<i32> {
        match self {
            Self::V4(_) => Some(AF_INET),
            Self::V6(_) => Some(AF_INET6),
            Self::Opaque(_) => None,
        }
    }

    /// Raw bytes: the octets for IP addresses, the UTF-8 text otherwise.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::V4(octets) => octets.as_slice(),
            Self::V6(octets) => octets.as_slice(),
            Self::Opaque(text) => text.as_bytes(),
        }
    }

    pub fn is_ip(&self) -> bool {
        !matches!(self, Self::Opaque(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Opaque(text) if text.is_empty())
    }

    /// Reject a hostname that cannot be written back as one configuration
    /// word: whitespace, control characters, `#`, `:` and brackets.
    pub fn validate(&self, field: &str) -> Result<()> {
        match self {
            Self::Opaque(text)
                if text.chars().any(|c| {
                    c.is_whitespace() || c.is_control() || matches!(c, '#' | ':' | '[' | ']')
                }) =>
            {
                Err(Error::invalid_value(
                    field,
                    format!("'{}' is not a host name or IP address", text.escape_debug()),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Render with an optional port as `addr:port`, bracketing IPv6.
    pub fn with_port(&self, port: Option<u16>) -> String {
        match (self, port) {
            (_, None) => self.to_string(),
            (Self::V6(_), Some(port)) => format!("[{self}]:{port}"),
            (_, Some(port)) => format!("{self}:{port}"),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(octets) => write!(f, "{}", Ipv4Addr::from(*octets)),
            Self::V6(octets) => write!(f, "{}", Ipv6Addr::from(*octets)),
            Self::Opaque(text) => f.write_str(text),
        }
    }
}

impl From<String> for IpAddress {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<&str> for IpAddress {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<IpAddress> for String {
    fn from(address: IpAddress) -> Self {
        address.to_string()
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self::V4(v4.octets()),
            IpAddr::V6(v6) => Self::V6(v6.octets()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(IpAddress::parse("192.0.2.1"), IpAddress::V4([192, 0, 2, 1]));
    }

    #[test]
    fn test_parse_ipv6_spellings_are_equal() {
        let short = IpAddress::parse("2001:db8::1");
        let long = IpAddress::parse("2001:0db8:0000:0000:0000:0000:0000:0001");
        assert_eq!(short, long);
        assert_eq!(short.family(), Some(AF_INET6));
    }

    #[test]
    fn test_parse_hostname_is_opaque() {
        let addr = IpAddress::parse("pool.ntp.org");
        assert_eq!(addr, IpAddress::Opaque("pool.ntp.org".to_string()));
        assert!(!addr.is_ip());
        assert_eq!(addr.family(), None);
    }

    #[test]
    fn test_parse_bracketed_ipv6() {
        assert_eq!(IpAddress::parse("[::1]"), IpAddress::parse("::1"));
    }

    #[test]
    fn test_from_family_bytes_length_mismatch() {
        let err = IpAddress::from_family_bytes(AF_INET, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));

        let err = IpAddress::from_family_bytes(AF_INET6, &[0; 4]).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_from_family_bytes_unknown_family() {
        let err = IpAddress::from_family_bytes(7, &[0; 4]).unwrap_err();
        assert!(err.to_string().contains("unknown address family 7"));
    }

    #[test]
    fn test_leading_zero_ipv6_keeps_bytes() {
        let mut octets = [0u8; 16];
        octets[15] = 1;
        let addr = IpAddress::from_family_bytes(AF_INET6, &octets).unwrap();
        assert_eq!(addr.as_bytes(), &octets);
        assert_eq!(addr.to_string(), "::1");
    }

    #[test]
    fn test_validate_rejects_non_word_hostnames() {
        assert!(IpAddress::parse("time.example").validate("address").is_ok());
        assert!(IpAddress::parse("2001:db8::1").validate("address").is_ok());
        for bad in ["time.example minpoll", "time#x", "a\nb", "host:12x", "[bogus]"] {
            let err = IpAddress::Opaque(bad.to_string())
                .validate("address")
                .unwrap_err();
            assert!(matches!(err, Error::InvalidValue { .. }), "{bad}");
        }
    }

    #[test]
    fn test_with_port() {
        assert_eq!(IpAddress::parse("10.0.0.1").with_port(Some(123)), "10.0.0.1:123");
        assert_eq!(IpAddress::parse("::1").with_port(Some(123)), "[::1]:123");
        assert_eq!(IpAddress::parse("time.example").with_port(None), "time.example");
    }
}
