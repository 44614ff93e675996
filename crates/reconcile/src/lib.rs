//! # Reconcile
//!
//! Keeps list-valued OS configuration consistent between a versioned
//! configuration store, the live system, and a stream of field-level edits.
//!
//! ## Core Concepts
//!
//! - **Entity**: a keyed record (DNS search domain, DNS server, NTP server,
//!   local user with its authorized keys)
//! - **Collection**: an ordered, duplicate-free set of one entity type
//! - **Comparator**: classifies desired vs. live as non-existent, equal,
//!   partial (with the missing complement) or error
//! - **ChangeBatch**: folds one batch of edit events onto live state and
//!   stores the result in a single call
//! - **Adapter**: loads and stores one collection against one transport
//! - **Reconciler**: startup seeding/pushing and per-phase edit routing
//!
//! ## Example
//!
//! ```
//! use reconcile::{
//!     Adapter, AssociationType, ChangeEvent, Collection, MemoryAdapter, NtpServer, Reconciler,
//! };
//! use std::rc::Rc;
//!
//! let live = Rc::new(MemoryAdapter::<NtpServer>::new("ntp"));
//! let mut reconciler = Reconciler::new().subscribe::<NtpServer>(Box::new(Rc::clone(&live)));
//!
//! let base = "/ietf-system:system/ntp/server[name='ntp1']";
//! reconciler
//!     .apply(&[
//!         ChangeEvent::created(format!("{base}/name"), "ntp1"),
//!         ChangeEvent::created(format!("{base}/udp/address"), "192.0.2.1"),
//!         ChangeEvent::created(format!("{base}/association-type"), "server"),
//!     ])
//!     .unwrap();
//!
//! let stored: Collection<NtpServer> = live.load().unwrap();
//! assert_eq!(
//!     stored.find("ntp1").unwrap().association_type,
//!     Some(AssociationType::Server)
//! );
//! ```
//!
//! ## Adapters
//!
//! The crate ships only [`MemoryAdapter`]. Transports for the resolver bus,
//! config files and the account database implement [`Adapter`] elsewhere,
//! which keeps this crate free of OS dependencies.

pub mod adapter;
pub mod batch;
pub mod change;
pub mod check;
pub mod collection;
pub mod datastore;
pub mod document;
pub mod entity;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod subscription;

// Re-export main types at crate root
pub use adapter::{Adapter, MemoryAdapter};
pub use batch::{BatchState, ChangeBatch, Committed};
pub use change::{
    ChangeEvent, Changeable, EventTarget, FieldPath, Operation, diff_collections, field_path,
};
pub use check::{CheckStatus, check, classify, resolve};
pub use collection::Collection;
pub use datastore::{Datastore, DatastoreKind, MemoryDatastore};
pub use document::{DocumentPart, SystemConfig};
pub use entity::Entity;
pub use error::{Error, ErrorCategory, Result};
pub use model::{
    AF_INET, AF_INET6, AssociationType, AuthorizedKey, DnsSearch, DnsServer, IpAddress, LocalUser,
    NtpServer,
};
pub use reconciler::{CollectionStatus, Reconciler, StartupReport};
pub use subscription::{Phase, PhaseOutcome, Subscription};
