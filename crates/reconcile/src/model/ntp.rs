//! NTP server entity

use crate::change::{Changeable, FieldPath, parse_bool, parse_port};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::model::IpAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How ntpd associates with a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationType {
    Server,
    Peer,
    Pool,
}

impl AssociationType {
    /// The ntp.conf keyword, which is also the YANG enum value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Peer => "peer",
            Self::Pool => "pool",
        }
    }
}

impl fmt::Display for AssociationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssociationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "server" => Ok(Self::Server),
            "peer" => Ok(Self::Peer),
            "pool" => Ok(Self::Pool),
            other => Err(Error::invalid_value(
                "association-type",
                format!("'{other}' is not one of server, peer, pool"),
            )),
        }
    }
}

/// One configured time source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NtpServer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_type: Option<AssociationType>,
    #[serde(default)]
    pub iburst: bool,
    #[serde(default)]
    pub prefer: bool,
}

impl NtpServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            port: None,
            association_type: None,
            iburst: false,
            prefer: false,
        }
    }

    pub fn with_address(mut self, address: impl Into<IpAddress>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_association(mut self, association_type: AssociationType) -> Self {
        self.association_type = Some(association_type);
        self
    }

    pub fn with_iburst(mut self, iburst: bool) -> Self {
        self.iburst = iburst;
        self
    }

    pub fn with_prefer(mut self, prefer: bool) -> Self {
        self.prefer = prefer;
        self
    }
}

impl Entity for NtpServer {
    const KIND: &'static str = "ntp server";

    fn key(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_value("name", "must not be empty"));
        }
        // The name is written as a trailing comment and read back trimmed
        if self.name.chars().any(char::is_control) || self.name.trim() != self.name {
            return Err(Error::invalid_value(
                "name",
                format!(
                    "'{}' has control characters or edge whitespace",
                    self.name.escape_debug()
                ),
            ));
        }
        match &self.address {
            Some(address) if !address.is_empty() => address.validate("udp/address")?,
            _ => {
                return Err(Error::Incomplete {
                    kind: Self::KIND,
                    key: self.name.clone(),
                    field: "address",
                });
            }
        }
        if self.association_type.is_none() {
            return Err(Error::Incomplete {
                kind: Self::KIND,
                key: self.name.clone(),
                field: "association-type",
            });
        }
        Ok(())
    }
}

impl Changeable for NtpServer {
    const LIST_PATH: &'static str = "/ietf-system:system/ntp/server";
    const KEY_LEAF: &'static str = "name";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "udp/address",
        "udp/port",
        "association-type",
        "iburst",
        "prefer",
    ];

    fn with_key(key: &str) -> Self {
        Self::new(key)
    }

    fn set_field(&mut self, field: &FieldPath, value: Option<&str>) -> Result<()> {
        match field.leaf.as_str() {
            "udp/address" => self.address = value.map(IpAddress::parse),
            "udp/port" => self.port = value.map(|v| parse_port(&field.leaf, v)).transpose()?,
            "association-type" => {
                self.association_type = value.map(str::parse).transpose()?;
            }
            "iburst" => {
                self.iburst = value
                    .map(|v| parse_bool(&field.leaf, v))
                    .transpose()?
                    .unwrap_or(false);
            }
            "prefer" => {
                self.prefer = value
                    .map(|v| parse_bool(&field.leaf, v))
                    .transpose()?
                    .unwrap_or(false);
            }
            _ => return Err(field.unknown::<Self>()),
        }
        Ok(())
    }

    fn field_values(&self) -> Vec<(FieldPath, String)> {
        let mut values = vec![(FieldPath::leaf("name"), self.name.clone())];
        if let Some(address) = &self.address {
            values.push((FieldPath::leaf("udp/address"), address.to_string()));
        }
        if let Some(port) = self.port {
            values.push((FieldPath::leaf("udp/port"), port.to_string()));
        }
        if let Some(association_type) = self.association_type {
            values.push((
                FieldPath::leaf("association-type"),
                association_type.to_string(),
            ));
        }
        if self.iburst {
            values.push((FieldPath::leaf("iburst"), "true".to_string()));
        }
        if self.prefer {
            values.push((FieldPath::leaf("prefer"), "true".to_string()));
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_association_type() {
        let server = NtpServer::new("ntp1").with_address("10.0.0.1");
        let err = server.validate().unwrap_err();
        assert!(matches!(err, Error::Incomplete { field: "association-type", .. }));

        let server = server.with_association(AssociationType::Server);
        assert!(server.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_address() {
        let server = NtpServer::new("ntp1").with_association(AssociationType::Pool);
        assert!(matches!(
            server.validate(),
            Err(Error::Incomplete { field: "address", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_name_with_newline() {
        let server = NtpServer::new("x\nrestrict default ignore")
            .with_address("192.0.2.1")
            .with_association(AssociationType::Server);
        assert!(matches!(server.validate(), Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_rejects_multi_word_address() {
        let server = NtpServer::new("a")
            .with_address("time.example minpoll")
            .with_association(AssociationType::Server);
        assert!(matches!(server.validate(), Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn test_set_field_clears_flag_on_delete() {
        let mut server = NtpServer::new("ntp1").with_iburst(true);
        server.set_field(&FieldPath::leaf("iburst"), None).unwrap();
        assert!(!server.iburst);
    }

    #[test]
    fn test_set_field_rejects_bad_association() {
        let mut server = NtpServer::new("ntp1");
        let err = server
            .set_field(&FieldPath::leaf("association-type"), Some("broadcast"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn test_serde_kebab_case() {
        let server: NtpServer = toml::from_str(
            r#"
name = "ntp1"
address = "192.0.2.10"
port = 123
association-type = "pool"
iburst = true
"#,
        )
        .unwrap();
        assert_eq!(server.association_type, Some(AssociationType::Pool));
        assert_eq!(server.address, Some(IpAddress::V4([192, 0, 2, 10])));
        assert!(!server.prefer);
    }
}
