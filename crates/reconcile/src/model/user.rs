//! Local user accounts and their SSH authorized keys

use crate::change::{Changeable, FieldPath};
use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// A public key allowed to log in as its owning user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedKey {
    pub name: String,
    #[serde(default)]
    pub algorithm: String,
    /// Base64 key material, as it appears in `authorized_keys`
    #[serde(default, rename = "key-data")]
    pub data: String,
}

impl AuthorizedKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            algorithm: String::new(),
            data: String::new(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }
}

impl Entity for AuthorizedKey {
    const KIND: &'static str = "authorized key";

    fn key(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(Error::invalid_value(
                "authorized-key/name",
                format!("'{}' must be a non-empty word", self.name),
            ));
        }
        for (field, value) in [("algorithm", &self.algorithm), ("key-data", &self.data)] {
            if value.is_empty() {
                return Err(Error::Incomplete {
                    kind: Self::KIND,
                    key: self.name.clone(),
                    field,
                });
            }
        }
        if self.algorithm.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::invalid_value(
                "authorized-key/algorithm",
                format!("key '{}' has a multi-word algorithm", self.name),
            ));
        }
        if STANDARD.decode(&self.data).is_err() {
            return Err(Error::invalid_value(
                "authorized-key/key-data",
                format!("key '{}' is not valid base64", self.name),
            ));
        }
        Ok(())
    }
}

/// A local login account.
///
/// The name is immutable once created; renaming is a delete plus a create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocalUser {
    pub name: String,
    /// crypt(3) hash, stored verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Collection::is_empty")]
    pub authorized_keys: Collection<AuthorizedKey>,
}

impl LocalUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: None,
            authorized_keys: Collection::new(),
        }
    }

    pub fn with_password(mut self, hash: impl Into<String>) -> Self {
        self.password = Some(hash.into());
        self
    }

    pub fn with_key(mut self, key: AuthorizedKey) -> Self {
        self.authorized_keys.upsert(key);
        self
    }

    fn key_mut(&mut self, field: &FieldPath, required: bool) -> Result<Option<&mut AuthorizedKey>> {
        let key_name = nested_key(field)?;
        if required && self.authorized_keys.find(key_name).is_none() {
            return Err(Error::MissingEntity {
                kind: AuthorizedKey::KIND,
                key: format!("{}/{key_name}", self.name),
            });
        }
        Ok(self.authorized_keys.find_mut(key_name))
    }
}

fn nested_key(field: &FieldPath) -> Result<&str> {
    field.nested_key.as_deref().ok_or_else(|| Error::InvalidPath {
        path: field.to_string(),
        message: "authorized-key node without a key name".to_string(),
    })
}

impl Entity for LocalUser {
    const KIND: &'static str = "local user";

    fn key(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty()
            || self.name.starts_with('-')
            || self
                .name
                .chars()
                .any(|c| c == ':' || c == '/' || c.is_whitespace() || c.is_control())
        {
            return Err(Error::invalid_value(
                "name",
                format!("'{}' is not a valid account name", self.name),
            ));
        }
        if let Some(hash) = &self.password
            && hash.contains([':', '\n'])
        {
            return Err(Error::invalid_value(
                "password",
                format!("hash for '{}' contains a record separator", self.name),
            ));
        }
        self.authorized_keys.validate()
    }
}

impl Changeable for LocalUser {
    const LIST_PATH: &'static str = "/ietf-system:system/authentication/user";
    const KEY_LEAF: &'static str = "name";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "password",
        "authorized-key/name",
        "authorized-key/algorithm",
        "authorized-key/key-data",
    ];

    fn with_key(key: &str) -> Self {
        Self::new(key)
    }

    fn set_field(&mut self, field: &FieldPath, value: Option<&str>) -> Result<()> {
        match (field.leaf.as_str(), value) {
            ("password", value) => self.password = value.map(str::to_string),
            ("authorized-key/name", Some(_)) => {
                self.authorized_keys
                    .upsert(AuthorizedKey::new(nested_key(field)?));
            }
            ("authorized-key/name", None) => {
                self.authorized_keys.remove(nested_key(field)?);
            }
            ("authorized-key/algorithm", Some(value)) => {
                if let Some(key) = self.key_mut(field, true)? {
                    key.algorithm = value.to_string();
                }
            }
            ("authorized-key/key-data", Some(value)) => {
                if let Some(key) = self.key_mut(field, true)? {
                    key.data = value.to_string();
                }
            }
            ("authorized-key/algorithm" | "authorized-key/key-data", None) => {
                // A key removed earlier in the batch takes its leaves with it.
                if let Some(key) = self.key_mut(field, false)? {
                    if field.leaf.ends_with("algorithm") {
                        key.algorithm.clear();
                    } else {
                        key.data.clear();
                    }
                }
            }
            _ => return Err(field.unknown::<Self>()),
        }
        Ok(())
    }

    fn field_values(&self) -> Vec<(FieldPath, String)> {
        let mut values = vec![(FieldPath::leaf("name"), self.name.clone())];
        if let Some(hash) = &self.password {
            values.push((FieldPath::leaf("password"), hash.clone()));
        }
        for key in &self.authorized_keys {
            values.push((
                FieldPath::nested("authorized-key/name", &key.name),
                key.name.clone(),
            ));
            if !key.algorithm.is_empty() {
                values.push((
                    FieldPath::nested("authorized-key/algorithm", &key.name),
                    key.algorithm.clone(),
                ));
            }
            if !key.data.is_empty() {
                values.push((
                    FieldPath::nested("authorized-key/key-data", &key.name),
                    key.data.clone(),
                ));
            }
        }
        values
    }
}
