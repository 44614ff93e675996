//! Per-entity-type edit subscription.
//!
//! The caller delivers each batch in phases: `Change` with the events, then
//! `Done` when the transaction is accepted or `Abort` when it is rejected.
//! Between the two the subscription holds the pre-change live collection so
//! an abort can put it back. That snapshot is released on every exit path.

use crate::adapter::Adapter;
use crate::batch::ChangeBatch;
use crate::change::{ChangeEvent, Changeable};
use crate::collection::Collection;
use crate::error::{Error, Result};

/// Lifecycle phase of an edit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Change,
    Done,
    Abort,
}

/// What handling one phase did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// No events for this entity type
    Skipped,
    /// The working collection was stored
    Stored { applied: usize, entries: usize },
    /// The batch was accepted and the snapshot released
    Released,
    /// The snapshot was stored back
    RolledBack { entries: usize },
}

/// Edit handling for one entity collection.
pub struct Subscription<T: Changeable> {
    adapter: Box<dyn Adapter<T>>,
    pending: Option<Collection<T>>,
    /// Entities as the datastore names them
    known: Collection<T>,
}

impl<T: Changeable> Subscription<T> {
    pub fn new(adapter: Box<dyn Adapter<T>>) -> Self {
        Self {
            adapter,
            pending: None,
            known: Collection::new(),
        }
    }

    /// Record the datastore's view so live entities loaded without their
    /// key can be matched to it.
    pub fn remember(&mut self, known: Collection<T>) {
        self.known = known;
    }

    pub fn adapter(&self) -> &dyn Adapter<T> {
        self.adapter.as_ref()
    }

    /// Whether a change phase is waiting for its done/abort.
    pub fn in_progress(&self) -> bool {
        self.pending.is_some()
    }

    pub fn handle(&mut self, phase: Phase, events: &[ChangeEvent]) -> Result<PhaseOutcome> {
        match phase {
            Phase::Change => self.change(events),
            Phase::Done => {
                if self.pending.take().is_some() {
                    log::debug!("{} batch accepted", T::KIND);
                    Ok(PhaseOutcome::Released)
                } else {
                    Ok(PhaseOutcome::Skipped)
                }
            }
            Phase::Abort => self.abort(),
        }
    }

    fn change(&mut self, events: &[ChangeEvent]) -> Result<PhaseOutcome> {
        if self.pending.is_some() {
            return Err(Error::Reentrant { kind: T::KIND });
        }
        if !events.iter().any(ChangeEvent::belongs_to::<T>) {
            return Ok(PhaseOutcome::Skipped);
        }

        let mut batch = ChangeBatch::begin(self.adapter.as_ref())?;
        batch.adopt_names(&self.known);
        batch.apply(events)?;
        let committed = batch.commit(self.adapter.as_ref())?;
        let entries = committed.stored.len();
        self.known = committed.stored;
        self.pending = Some(committed.previous);

        Ok(PhaseOutcome::Stored {
            applied: committed.applied,
            entries,
        })
    }

    fn abort(&mut self) -> Result<PhaseOutcome> {
        let Some(snapshot) = self.pending.take() else {
            return Ok(PhaseOutcome::Skipped);
        };
        log::info!(
            "{}: restoring {} {} entries after abort",
            self.adapter.name(),
            snapshot.len(),
            T::KIND
        );
        self.adapter.store(&snapshot)?;
        Ok(PhaseOutcome::RolledBack {
            entries: snapshot.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::model::{AssociationType, NtpServer};
    use std::rc::Rc;

    fn create_events(name: &str) -> Vec<ChangeEvent> {
        let base = format!("/ietf-system:system/ntp/server[name='{name}']");
        vec![
            ChangeEvent::created(format!("{base}/name"), name),
            ChangeEvent::created(format!("{base}/udp/address"), "192.0.2.1"),
            ChangeEvent::created(format!("{base}/association-type"), "server"),
        ]
    }

    fn subscription(adapter: &Rc<MemoryAdapter<NtpServer>>) -> Subscription<NtpServer> {
        Subscription::new(Box::new(Rc::clone(adapter)))
    }

    #[test]
    fn test_change_then_done() {
        let adapter = Rc::new(MemoryAdapter::new("ntp"));
        let mut sub = subscription(&adapter);

        let outcome = sub.handle(Phase::Change, &create_events("x")).unwrap();
        assert_eq!(
            outcome,
            PhaseOutcome::Stored {
                applied: 3,
                entries: 1
            }
        );
        assert!(sub.in_progress());

        assert_eq!(sub.handle(Phase::Done, &[]).unwrap(), PhaseOutcome::Released);
        assert!(!sub.in_progress());
        assert_eq!(adapter.snapshot().keys(), vec!["x"]);
    }

    #[test]
    fn test_abort_restores_live_and_releases() {
        let existing = NtpServer::new("old")
            .with_address("192.0.2.9")
            .with_association(AssociationType::Peer);
        let adapter = Rc::new(MemoryAdapter::with_state("ntp", [existing]));
        let mut sub = subscription(&adapter);

        sub.handle(Phase::Change, &create_events("x")).unwrap();
        assert_eq!(adapter.snapshot().len(), 2);

        let outcome = sub.handle(Phase::Abort, &[]).unwrap();
        assert_eq!(outcome, PhaseOutcome::RolledBack { entries: 1 });
        assert_eq!(adapter.snapshot().keys(), vec!["old"]);
        assert!(!sub.in_progress());

        // A later, independent batch is not rejected as reentrant.
        sub.handle(Phase::Change, &create_events("y")).unwrap();
        sub.handle(Phase::Done, &[]).unwrap();
        assert_eq!(adapter.snapshot().keys(), vec!["old", "y"]);
    }

    #[test]
    fn test_second_change_without_done_is_reentrant() {
        let adapter = Rc::new(MemoryAdapter::new("ntp"));
        let mut sub = subscription(&adapter);

        sub.handle(Phase::Change, &create_events("x")).unwrap();
        let err = sub.handle(Phase::Change, &create_events("y")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_failed_change_leaves_nothing_pending() {
        let adapter = Rc::new(MemoryAdapter::new("ntp"));
        let mut sub = subscription(&adapter);
        adapter.fail_next_store();

        assert!(sub.handle(Phase::Change, &create_events("x")).is_err());
        assert!(!sub.in_progress());
        assert!(adapter.snapshot().is_empty());
        assert!(sub.handle(Phase::Change, &create_events("x")).is_ok());
    }

    #[test]
    fn test_abort_releases_even_if_restore_fails() {
        let adapter = Rc::new(MemoryAdapter::new("ntp"));
        let mut sub = subscription(&adapter);

        sub.handle(Phase::Change, &create_events("x")).unwrap();
        adapter.fail_next_store();
        assert!(sub.handle(Phase::Abort, &[]).is_err());
        assert!(!sub.in_progress());
    }

    #[test]
    fn test_unrelated_events_skip() {
        let adapter = Rc::new(MemoryAdapter::new("ntp"));
        let mut sub = subscription(&adapter);
        let events = [ChangeEvent::created(
            "/ietf-system:system/dns-resolver/search[.='example.com']",
            "example.com",
        )];
        assert_eq!(sub.handle(Phase::Change, &events).unwrap(), PhaseOutcome::Skipped);
        assert_eq!(adapter.store_count(), 0);
    }
}
