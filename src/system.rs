//! Wiring of settings to live-system adapters.

use crate::config::{DnsBackend, Features, Settings};
use reconcile::{
    DnsSearch, DnsServer, LocalUser, MemoryAdapter, NtpServer, Reconciler, SystemConfig,
};
use std::rc::Rc;
use syskit::{
    BusctlBackend, LocalAccounts, NtpConfAdapter, ResolvConfSearch, ResolvConfServers,
    ResolvedSearch, ResolvedServers,
};

/// Reconciler over the live system, one subscription per enabled feature.
pub fn live_reconciler(settings: &Settings) -> Reconciler {
    let mut reconciler = Reconciler::new();
    let features = settings.features;

    if features.dns_resolver {
        let dns = &settings.dns;
        match dns.backend {
            DnsBackend::Resolved => {
                let bus = Rc::new(BusctlBackend::with_path(dns.busctl.clone()));
                if !bus.is_available() {
                    log::warn!("{} not found, resolver calls will fail", dns.busctl);
                }
                reconciler = reconciler
                    .subscribe::<DnsSearch>(Box::new(
                        ResolvedSearch::new(Rc::clone(&bus), dns.ifindex)
                            .with_retry(settings.retry.clone()),
                    ))
                    .subscribe::<DnsServer>(Box::new(
                        ResolvedServers::new(bus, dns.ifindex).with_retry(settings.retry.clone()),
                    ));
            }
            DnsBackend::ResolvConf => {
                reconciler = reconciler
                    .subscribe::<DnsSearch>(Box::new(ResolvConfSearch::new(&dns.resolv_conf)))
                    .subscribe::<DnsServer>(Box::new(ResolvConfServers::new(&dns.resolv_conf)));
            }
        }
    }

    if features.ntp {
        reconciler =
            reconciler.subscribe::<NtpServer>(Box::new(NtpConfAdapter::new(&settings.ntp.config)));
    }

    if features.authentication {
        reconciler = reconciler.subscribe::<LocalUser>(Box::new(
            LocalAccounts::new(settings.accounts.clone()).with_range(settings.uid_range),
        ));
    }

    reconciler
}

/// Reconciler over an in-memory copy of `state`.
///
/// Used for dry runs against a snapshot of the live system, and with
/// [`Features::all`] to fold edit events into a datastore document.
pub fn memory_reconciler(state: &SystemConfig, features: Features) -> Reconciler {
    let mut reconciler = Reconciler::new();
    if features.dns_resolver {
        reconciler = reconciler
            .subscribe::<DnsSearch>(Box::new(MemoryAdapter::with_state(
                "dns-search",
                state.dns_search.iter().cloned(),
            )))
            .subscribe::<DnsServer>(Box::new(MemoryAdapter::with_state(
                "dns-servers",
                state.dns_servers.iter().cloned(),
            )));
    }
    if features.ntp {
        reconciler = reconciler.subscribe::<NtpServer>(Box::new(MemoryAdapter::with_state(
            "ntp-servers",
            state.ntp_servers.iter().cloned(),
        )));
    }
    if features.authentication {
        reconciler = reconciler.subscribe::<LocalUser>(Box::new(MemoryAdapter::with_state(
            "users",
            state.users.iter().cloned(),
        )));
    }
    reconciler
}

/// Apply `events` to a copy of `document` with the same batch semantics the
/// live system gets.
pub fn fold_events(
    document: &SystemConfig,
    events: &[reconcile::ChangeEvent],
) -> reconcile::Result<SystemConfig> {
    let mut reconciler = memory_reconciler(document, Features::all());
    reconciler.apply(events)?;
    reconciler.load_live()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{AssociationType, ChangeEvent};

    fn document() -> SystemConfig {
        let mut config = SystemConfig::default();
        config.ntp_servers.upsert(
            NtpServer::new("ntp1")
                .with_address("192.0.2.1")
                .with_association(AssociationType::Server),
        );
        config.dns_search.upsert(DnsSearch::new("example.com"));
        config
    }

    #[test]
    fn test_fold_events_edits_document() {
        let events = [ChangeEvent::modified(
            "/ietf-system:system/ntp/server[name='ntp1']/udp/port",
            "",
            "1123",
        )];

        let folded = fold_events(&document(), &events).unwrap();

        assert_eq!(folded.ntp_servers.find("ntp1").unwrap().port, Some(1123));
        assert_eq!(folded.dns_search, document().dns_search);
    }

    #[test]
    fn test_fold_events_rejects_inconsistent_edit() {
        let events = [ChangeEvent::modified(
            "/ietf-system:system/ntp/server[name='missing']/udp/port",
            "",
            "1123",
        )];
        assert!(fold_events(&document(), &events).is_err());
    }

    #[test]
    fn test_memory_reconciler_respects_features() {
        let features = Features {
            dns_resolver: false,
            ntp: true,
            authentication: false,
        };
        let reconciler = memory_reconciler(&document(), features);
        assert_eq!(reconciler.kinds().len(), 1);
        let live = reconciler.load_live().unwrap();
        assert!(live.dns_search.is_empty());
        assert_eq!(live.ntp_servers.len(), 1);
    }

    #[test]
    fn test_live_reconciler_with_files_only() {
        let mut settings = Settings::default();
        settings.dns.backend = DnsBackend::ResolvConf;
        settings.features.authentication = false;
        let reconciler = live_reconciler(&settings);
        assert_eq!(reconciler.kinds().len(), 3);
    }
}
