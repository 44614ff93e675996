//! Entity records for every reconciled collection

mod address;
mod dns;
mod ntp;
mod user;

pub use address::{AF_INET, AF_INET6, IpAddress};
pub use dns::{DnsSearch, DnsServer};
pub use ntp::{AssociationType, NtpServer};
pub use user::{AuthorizedKey, LocalUser};
