//! Reconciliation comparator.
//!
//! Classifies how a desired collection relates to the live one. Pure: the
//! only I/O is the fresh load done by [`check`].

use crate::adapter::Adapter;
use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::Error;

/// How the desired collection relates to live state.
#[derive(Debug)]
pub enum CheckStatus<T> {
    /// None of the desired entities exist live
    NonExistent,
    /// Every desired entity exists live
    Equal,
    /// Some exist; `complement` holds the ones that don't
    Partial { complement: Collection<T> },
    /// Live state could not be loaded
    Error(Error),
}

impl<T> CheckStatus<T> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NonExistent => "non-existent",
            Self::Equal => "equal",
            Self::Partial { .. } => "partial",
            Self::Error(_) => "error",
        }
    }

    pub fn is_equal(&self) -> bool {
        matches!(self, Self::Equal)
    }
}

/// Classify `desired` against an already loaded `live` collection.
pub fn classify<T: Entity>(desired: &Collection<T>, live: &Collection<T>) -> CheckStatus<T> {
    let matches = desired
        .iter()
        .filter(|item| live.contains_identity(item))
        .count();

    if matches == desired.len() {
        CheckStatus::Equal
    } else if matches == 0 {
        CheckStatus::NonExistent
    } else {
        CheckStatus::Partial {
            complement: desired.difference(live),
        }
    }
}

/// Load live state through `adapter` and classify `desired` against it.
pub fn check<T: Entity>(desired: &Collection<T>, adapter: &dyn Adapter<T>) -> CheckStatus<T> {
    match adapter.load() {
        Ok(live) => classify(desired, &live),
        Err(e) => {
            log::warn!("{}: could not load live {} state: {e}", adapter.name(), T::KIND);
            CheckStatus::Error(e)
        }
    }
}

/// The collection to store so that every desired entity exists live.
///
/// Entities already live are kept; `None` when nothing needs storing.
pub fn resolve<T: Entity>(
    status: &CheckStatus<T>,
    desired: &Collection<T>,
    live: &Collection<T>,
) -> Option<Collection<T>> {
    match status {
        CheckStatus::NonExistent => Some(live.merged_with(desired)),
        CheckStatus::Partial { complement } => Some(live.merged_with(complement)),
        CheckStatus::Equal | CheckStatus::Error(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::model::{AssociationType, DnsServer, IpAddress, NtpServer};

    fn ntp(name: &str) -> NtpServer {
        NtpServer::new(name)
            .with_address(format!("{name}.example"))
            .with_association(AssociationType::Server)
    }

    fn set(names: &[&str]) -> Collection<NtpServer> {
        names.iter().map(|n| ntp(n)).collect()
    }

    #[test]
    fn test_empty_desired_is_equal() {
        assert!(classify(&Collection::<NtpServer>::new(), &set(&["a"])).is_equal());
    }

    #[test]
    fn test_nothing_live_is_non_existent() {
        let status = classify(&set(&["a", "b"]), &set(&["x"]));
        assert!(matches!(status, CheckStatus::NonExistent));
    }

    #[test]
    fn test_partial_returns_complement_then_equal() {
        let desired = set(&["a", "b", "c"]);
        let adapter = MemoryAdapter::with_state("ntp", [ntp("b")]);

        let status = check(&desired, &adapter);
        let CheckStatus::Partial { complement } = &status else {
            panic!("expected partial, got {}", status.label());
        };
        assert_eq!(complement.keys(), vec!["a", "c"]);

        let live = adapter.load().unwrap();
        let to_store = resolve(&status, &desired, &live).unwrap();
        adapter.store(&to_store).unwrap();

        assert!(check(&desired, &adapter).is_equal());
    }

    #[test]
    fn test_load_failure_is_error_not_absent() {
        let adapter = MemoryAdapter::<NtpServer>::new("ntp");
        adapter.fail_next_load();
        let status = check(&set(&["a"]), &adapter);
        assert!(matches!(status, CheckStatus::Error(_)));
        assert_eq!(status.label(), "error");
    }

    #[test]
    fn test_dns_servers_match_by_address() {
        let desired: Collection<DnsServer> = [DnsServer::new("primary").with_address("192.0.2.53")]
            .into_iter()
            .collect();
        let live: Collection<DnsServer> = [DnsServer::from_address(IpAddress::parse("192.0.2.53"))]
            .into_iter()
            .collect();
        assert!(classify(&desired, &live).is_equal());
    }

    #[test]
    fn test_comparison_is_case_sensitive() {
        let status = classify(&set(&["NTP1"]), &set(&["ntp1"]));
        assert!(matches!(status, CheckStatus::NonExistent));
    }

    #[test]
    fn test_store_twice_is_equal() {
        let desired = set(&["a", "b"]);
        let adapter = MemoryAdapter::<NtpServer>::new("ntp");
        adapter.store(&desired).unwrap();
        adapter.store(&desired).unwrap();
        assert!(check(&desired, &adapter).is_equal());
    }
}
