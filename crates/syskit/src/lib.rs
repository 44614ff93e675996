//! # syskit
//!
//! Live-system adapters for the [`reconcile`] engine on Linux.
//!
//! This crate provides:
//! - DNS servers and search domains through the systemd-resolved bus
//!   ([`resolved`]), or through `/etc/resolv.conf` ([`resolv_conf`])
//! - NTP servers in the NTP daemon's configuration file ([`ntp_conf`])
//! - Local users and their authorized keys in the account database
//!   ([`accounts`])
//!
//! Files are always replaced through [`swap`], which keeps a `.bak` of the
//! previous content and restores it if the replacement fails halfway.
//!
//! ## Example
//!
//! ```no_run
//! use reconcile::{Adapter, DnsServer, Reconciler};
//! use syskit::bus::busctl::BusctlBackend;
//! use syskit::resolved::ResolvedServers;
//!
//! let servers = ResolvedServers::new(BusctlBackend::new(), 1);
//! let live = servers.load().expect("resolver unreachable");
//! for server in &live {
//!     println!("{}", server.name);
//! }
//!
//! let reconciler = Reconciler::new().subscribe::<DnsServer>(Box::new(servers));
//! # let _ = reconciler;
//! ```
//!
//! ## Retry Logic
//!
//! Bus calls that fail in transit are retried with exponential backoff.
//! Decode failures are never retried. Configure with [`RetryConfig`].

pub mod accounts;
pub mod bus;
pub mod error;
pub mod ntp_conf;
pub mod resolv_conf;
pub mod resolved;
pub mod retry;
pub mod swap;

pub use accounts::{AccountPaths, LocalAccounts, ProvisionReport, UidRange};
pub use bus::ResolverBus;
pub use bus::busctl::BusctlBackend;
pub use error::{Error, ErrorCategory, Result};
pub use ntp_conf::NtpConfAdapter;
pub use resolv_conf::{ResolvConfSearch, ResolvConfServers};
pub use resolved::{ResolvedSearch, ResolvedServers};
pub use retry::RetryConfig;
