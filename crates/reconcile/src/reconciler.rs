//! Startup and runtime orchestration across every subscribed collection.

use crate::adapter::Adapter;
use crate::check::{CheckStatus, check, classify, resolve};
use crate::change::ChangeEvent;
use crate::collection::Collection;
use crate::entity::Entity;
use crate::datastore::{Datastore, DatastoreKind};
use crate::document::{DocumentPart, SystemConfig};
use crate::error::Result;
use crate::subscription::{Phase, PhaseOutcome, Subscription};

/// Comparator result for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStatus {
    pub kind: &'static str,
    /// Adapter label
    pub source: String,
    /// `non-existent`, `equal`, `partial` or `error`
    pub status: &'static str,
    pub desired: usize,
    /// Keys of desired entities missing live
    pub missing: Vec<String>,
    pub error: Option<String>,
}

impl CollectionStatus {
    pub fn is_equal(&self) -> bool {
        self.status == "equal"
    }
}

/// What a startup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// The startup datastore was empty and got seeded from live state
    pub seeded: bool,
    /// Per-collection results when pushing startup values
    pub collections: Vec<(CollectionStatus, usize)>,
}

impl StartupReport {
    pub fn total_pushed(&self) -> usize {
        self.collections.iter().map(|(_, pushed)| pushed).sum()
    }
}

/// Type-erased view of one [`Subscription`].
trait Channel {
    fn kind(&self) -> &'static str;
    fn source(&self) -> &str;
    fn in_progress(&self) -> bool;
    fn handle(&mut self, phase: Phase, events: &[ChangeEvent]) -> Result<PhaseOutcome>;
    fn load_into(&self, config: &mut SystemConfig) -> Result<()>;
    fn status(&self, desired: &SystemConfig) -> CollectionStatus;
    fn push(&self, desired: &SystemConfig) -> Result<(CollectionStatus, usize)>;
    fn routes(&self, event: &ChangeEvent) -> bool;
    fn remember(&mut self, config: &SystemConfig);
}

impl<T: DocumentPart> Channel for Subscription<T> {
    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn source(&self) -> &str {
        self.adapter().name()
    }

    fn in_progress(&self) -> bool {
        Subscription::in_progress(self)
    }

    fn handle(&mut self, phase: Phase, events: &[ChangeEvent]) -> Result<PhaseOutcome> {
        Subscription::handle(self, phase, events)
    }

    fn load_into(&self, config: &mut SystemConfig) -> Result<()> {
        *T::part_mut(config) = self.adapter().load()?;
        Ok(())
    }

    fn status(&self, desired: &SystemConfig) -> CollectionStatus {
        let desired = T::part(desired);
        let status = check(desired, self.adapter());
        summarize(T::KIND, self.source(), desired, &status)
    }

    fn push(&self, desired: &SystemConfig) -> Result<(CollectionStatus, usize)> {
        let desired = T::part(desired);
        let live = self.adapter().load()?;
        let status = classify(desired, &live);
        let summary = summarize(T::KIND, self.source(), desired, &status);

        let mut pushed = 0;
        if let Some(target) = resolve(&status, desired, &live) {
            pushed = summary.missing.len();
            log::info!(
                "{}: pushing {pushed} startup {} entries ({})",
                self.source(),
                T::KIND,
                status.label()
            );
            target.validate()?;
            self.adapter().store(&target)?;
        } else {
            log::debug!("{}: {} already matches startup", self.source(), T::KIND);
        }
        Ok((summary, pushed))
    }

    fn routes(&self, event: &ChangeEvent) -> bool {
        event.belongs_to::<T>()
    }

    fn remember(&mut self, config: &SystemConfig) {
        Subscription::remember(self, T::part(config).clone());
    }
}

fn summarize<T: Entity>(
    kind: &'static str,
    source: &str,
    desired: &Collection<T>,
    status: &CheckStatus<T>,
) -> CollectionStatus {
    let (missing, error) = match status {
        CheckStatus::Equal => (Vec::new(), None),
        CheckStatus::NonExistent => (desired.keys(), None),
        CheckStatus::Partial { complement } => (complement.keys(), None),
        CheckStatus::Error(e) => (Vec::new(), Some(e.to_string())),
    };
    CollectionStatus {
        kind,
        source: source.to_string(),
        status: status.label(),
        desired: desired.len(),
        missing,
        error,
    }
}

/// Wires one subscription per enabled collection to startup and edit handling.
#[derive(Default)]
pub struct Reconciler {
    channels: Vec<Box<dyn Channel>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable reconciliation of `T` through `adapter`.
    pub fn subscribe<T: DocumentPart + 'static>(mut self, adapter: Box<dyn Adapter<T>>) -> Self {
        self.channels.push(Box::new(Subscription::new(adapter)));
        self
    }

    /// Kinds of the enabled collections, in subscription order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.kind()).collect()
    }

    pub fn in_progress(&self) -> bool {
        self.channels.iter().any(|c| c.in_progress())
    }

    /// Read every enabled collection from the live system.
    pub fn load_live(&self) -> Result<SystemConfig> {
        let mut config = SystemConfig::default();
        for channel in &self.channels {
            channel.load_into(&mut config)?;
        }
        Ok(config)
    }

    /// Classify each enabled collection of `desired` against live state.
    pub fn status(&self, desired: &SystemConfig) -> Vec<CollectionStatus> {
        self.channels.iter().map(|c| c.status(desired)).collect()
    }

    /// Tell every subscription how the datastore names its entities.
    pub fn remember(&mut self, config: &SystemConfig) {
        for channel in &mut self.channels {
            channel.remember(config);
        }
    }

    /// Bring the store and the live system together at process start.
    ///
    /// An empty startup datastore is seeded from the live system. Otherwise
    /// the startup values are pushed onto the live system, keeping live
    /// entries the datastore does not mention. Either way running ends up as
    /// a copy of startup.
    pub fn startup(&mut self, store: &mut dyn Datastore) -> Result<StartupReport> {
        let mut report = StartupReport::default();

        if store.is_empty(DatastoreKind::Startup)? {
            log::info!("startup datastore is empty, loading from the system");
            let live = self.load_live()?;
            store.save(DatastoreKind::Startup, &live)?;
            report.seeded = true;
        } else {
            let desired = store.load(DatastoreKind::Startup)?;
            desired.validate()?;
            for channel in &self.channels {
                report.collections.push(channel.push(&desired)?);
            }
        }

        store.copy(DatastoreKind::Startup, DatastoreKind::Running)?;
        self.remember(&store.load(DatastoreKind::Running)?);
        Ok(report)
    }

    /// Deliver one phase of an edit batch to every subscription.
    ///
    /// When a change phase fails, subscriptions that already stored are
    /// rolled back before the error is returned.
    pub fn handle(
        &mut self,
        phase: Phase,
        events: &[ChangeEvent],
    ) -> Result<Vec<(&'static str, PhaseOutcome)>> {
        if phase == Phase::Change {
            for event in events {
                if !self.channels.iter().any(|c| c.routes(event)) {
                    log::debug!("no subscription for {}", event.path);
                }
            }
        }

        let mut outcomes = Vec::with_capacity(self.channels.len());
        let mut first_error = None;

        for index in 0..self.channels.len() {
            match self.channels[index].handle(phase, events) {
                Ok(outcome) => outcomes.push((self.channels[index].kind(), outcome)),
                Err(e) if phase == Phase::Change => {
                    log::error!("{} change failed: {e}", self.channels[index].kind());
                    self.rollback(index);
                    return Err(e);
                }
                Err(e) => {
                    log::error!("{} {phase:?} failed: {e}", self.channels[index].kind());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    /// Change then done, as one accepted transaction.
    pub fn apply(&mut self, events: &[ChangeEvent]) -> Result<Vec<(&'static str, PhaseOutcome)>> {
        let outcomes = self.handle(Phase::Change, events)?;
        self.handle(Phase::Done, events)?;
        Ok(outcomes)
    }

    fn rollback(&mut self, failed: usize) {
        for channel in &mut self.channels[..failed] {
            if let Err(e) = channel.handle(Phase::Abort, &[]) {
                log::error!("{} rollback failed: {e}", channel.kind());
            }
        }
    }
}
