//! Entity trait shared by every reconciled record type

use crate::error::Result;
use std::fmt;

/// A keyed record that lives in a [`Collection`](crate::Collection).
///
/// Every entity has:
/// - a collection key, unique within one collection
/// - an identity used by the comparator, which defaults to the key
/// - a completeness check run before the entity is stored
pub trait Entity: Clone + fmt::Debug + PartialEq {
    /// Human-readable kind, used in errors and logs (e.g. "ntp server")
    const KIND: &'static str;

    /// Collection key
    fn key(&self) -> &str;

    /// Whether `other` denotes the same live object.
    ///
    /// Override when the live system does not carry the collection key,
    /// e.g. DNS servers on the bus are only known by address.
    fn same_identity(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    /// Check that every required field is set.
    fn validate(&self) -> Result<()>;
}
