//! The full configuration document held by a datastore

use crate::change::{ChangeEvent, Changeable, diff_collections};
use crate::collection::Collection;
use crate::error::Result;
use crate::model::{DnsSearch, DnsServer, LocalUser, NtpServer};
use serde::{Deserialize, Serialize};

/// Every reconciled collection, as stored in the startup and running
/// datastores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SystemConfig {
    #[serde(skip_serializing_if = "Collection::is_empty")]
    pub dns_search: Collection<DnsSearch>,
    #[serde(skip_serializing_if = "Collection::is_empty")]
    pub dns_servers: Collection<DnsServer>,
    #[serde(skip_serializing_if = "Collection::is_empty")]
    pub ntp_servers: Collection<NtpServer>,
    #[serde(skip_serializing_if = "Collection::is_empty")]
    pub users: Collection<LocalUser>,
}

impl SystemConfig {
    pub fn is_empty(&self) -> bool {
        self.dns_search.is_empty()
            && self.dns_servers.is_empty()
            && self.ntp_servers.is_empty()
            && self.users.is_empty()
    }

    /// Reject duplicate keys and incomplete entities.
    pub fn validate(&self) -> Result<()> {
        fn part<T: DocumentPart>(config: &SystemConfig) -> Result<()> {
            let collection = T::part(config);
            collection.check_unique()?;
            collection.validate()
        }
        part::<DnsSearch>(self)?;
        part::<DnsServer>(self)?;
        part::<NtpServer>(self)?;
        part::<LocalUser>(self)?;
        for user in &self.users {
            user.authorized_keys.check_unique()?;
        }
        Ok(())
    }

    /// Edit events that turn `self` into `target`.
    pub fn diff(&self, target: &Self) -> Vec<ChangeEvent> {
        let mut events = diff_collections(&self.dns_search, &target.dns_search);
        events.extend(diff_collections(&self.dns_servers, &target.dns_servers));
        events.extend(diff_collections(&self.ntp_servers, &target.ntp_servers));
        events.extend(diff_collections(&self.users, &target.users));
        events
    }
}

/// Maps an entity type to its collection in [`SystemConfig`].
pub trait DocumentPart: Changeable {
    fn part(config: &SystemConfig) -> &Collection<Self>;
    fn part_mut(config: &mut SystemConfig) -> &mut Collection<Self>;
}

macro_rules! document_part {
    ($entity:ty, $field:ident) => {
        impl DocumentPart for $entity {
            fn part(config: &SystemConfig) -> &Collection<Self> {
                &config.$field
            }

            fn part_mut(config: &mut SystemConfig) -> &mut Collection<Self> {
                &mut config.$field
            }
        }
    };
}

document_part!(DnsSearch, dns_search);
document_part!(DnsServer, dns_servers);
document_part!(NtpServer, ntp_servers);
document_part!(LocalUser, users);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssociationType, AuthorizedKey, IpAddress};

    const DOCUMENT: &str = r#"
[[dns-search]]
domain = "corp.example"

[[dns-servers]]
name = "primary"
address = "192.0.2.53"

[[ntp-servers]]
name = "ntp1"
address = "time.example"
association-type = "pool"
iburst = true

[[users]]
name = "alice"
password = "$6$salt$hash"

[[users.authorized-keys]]
name = "laptop"
algorithm = "ssh-ed25519"
key-data = "AAAAC3NzaC1lZDI1NTE5AAAAIGJvZ3VzLWtleS1mb3ItdGVzdHM="
"#;

    #[test]
    fn test_parse_document() {
        let config: SystemConfig = toml::from_str(DOCUMENT).unwrap();
        config.validate().unwrap();

        assert_eq!(config.dns_search.keys(), vec!["corp.example"]);
        assert_eq!(
            config.dns_servers.find("primary").unwrap().address,
            Some(IpAddress::V4([192, 0, 2, 53]))
        );
        assert_eq!(
            config.ntp_servers.find("ntp1").unwrap().association_type,
            Some(AssociationType::Pool)
        );
        let alice = config.users.find("alice").unwrap();
        assert_eq!(alice.authorized_keys.len(), 1);
    }

    #[test]
    fn test_toml_round_trip() {
        let config: SystemConfig = toml::from_str(DOCUMENT).unwrap();
        let text = toml::to_string(&config).unwrap();
        let reparsed: SystemConfig = toml::from_str(&text).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let config: SystemConfig = toml::from_str(
            r#"
[[dns-search]]
domain = "a.example"

[[dns-search]]
domain = "a.example"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_diff_then_is_empty() {
        let empty = SystemConfig::default();
        assert!(empty.is_empty());

        let mut target = SystemConfig::default();
        target
            .users
            .add(LocalUser::new("bob").with_key(
                AuthorizedKey::new("k")
                    .with_algorithm("ssh-rsa")
                    .with_data("AAAA"),
            ))
            .unwrap();
        let events = empty.diff(&target);
        assert_eq!(events.len(), 4);
        assert!(empty.diff(&empty).is_empty());
    }
}
