//! Change-diff accumulator.
//!
//! A [`ChangeBatch`] folds the field-level events of one edit batch into a
//! materialized collection. The live state is the base, so an event that
//! touches a single field resolves against the entity that already exists.
//!
//! ```text
//! Idle -> Loading -> Applying -> Committed
//!                        \-----> Aborted
//! ```

use crate::adapter::Adapter;
use crate::change::{ChangeEvent, Changeable, EventTarget, Operation};
use crate::collection::Collection;
use crate::error::{Error, Result};

/// Where a batch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Loading,
    Applying,
    Committed,
    Aborted,
}

/// What a commit wrote and what it replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    /// Live collection as loaded at batch start
    pub previous: Collection<T>,
    /// Collection handed to the adapter
    pub stored: Collection<T>,
    /// Number of events that changed the working collection
    pub applied: usize,
}

/// Working state for one edit batch of one entity type.
#[derive(Debug)]
pub struct ChangeBatch<T> {
    state: BatchState,
    base: Collection<T>,
    working: Collection<T>,
    applied: usize,
}

impl<T: Changeable> Default for ChangeBatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Changeable> ChangeBatch<T> {
    pub fn new() -> Self {
        Self {
            state: BatchState::Idle,
            base: Collection::new(),
            working: Collection::new(),
            applied: 0,
        }
    }

    /// Start a batch on top of freshly loaded live state.
    pub fn begin(adapter: &dyn Adapter<T>) -> Result<Self> {
        let mut batch = Self::new();
        batch.load(adapter)?;
        Ok(batch)
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn working(&self) -> &Collection<T> {
        &self.working
    }

    /// Load the base collection. Only valid on an idle batch.
    pub fn load(&mut self, adapter: &dyn Adapter<T>) -> Result<()> {
        if self.state != BatchState::Idle {
            return Err(Error::Reentrant { kind: T::KIND });
        }
        self.state = BatchState::Loading;
        match adapter.load() {
            Ok(base) => {
                log::debug!(
                    "{}: loaded {} {} entries as batch base",
                    adapter.name(),
                    base.len(),
                    T::KIND
                );
                self.working = base.clone();
                self.base = base;
                self.state = BatchState::Applying;
                Ok(())
            }
            Err(e) => {
                self.state = BatchState::Aborted;
                Err(e)
            }
        }
    }

    /// Give live entities the names a datastore knows them by.
    ///
    /// Some transports do not carry the collection key (the resolver bus
    /// only knows server addresses). A working entity with the same identity
    /// as a `known` one is replaced by it, so edits addressed by the stored
    /// key find their target.
    pub fn adopt_names(&mut self, known: &Collection<T>) {
        if self.state != BatchState::Applying {
            return;
        }
        for entry in known {
            let Some(live) = self
                .working
                .iter()
                .find(|live| live.same_identity(entry) && live.key() != entry.key())
                .map(|live| live.key().to_string())
            else {
                continue;
            };
            if self.working.find(entry.key()).is_some() {
                continue;
            }
            log::trace!("{} '{}' is known as '{}'", T::KIND, live, entry.key());
            self.working.remove(&live);
            self.working.upsert(entry.clone());
        }
    }

    /// Apply every event addressed to `T`, in field order.
    ///
    /// Events for other lists are skipped. The first failure aborts the
    /// batch; later calls keep failing.
    pub fn apply(&mut self, events: &[ChangeEvent]) -> Result<usize> {
        if self.state != BatchState::Applying {
            return Err(Error::Reentrant { kind: T::KIND });
        }

        let mut targeted = Vec::new();
        for event in events {
            match event.target::<T>() {
                Ok(Some(target)) => targeted.push((target, event)),
                Ok(None) => {}
                Err(e) => {
                    self.state = BatchState::Aborted;
                    return Err(e);
                }
            }
        }
        // Stable: events for the same field keep their arrival order.
        targeted.sort_by_key(|(target, _)| target.field.rank::<T>());

        let before = self.applied;
        for (target, event) in targeted {
            if let Err(e) = self.apply_one(&target, event) {
                log::warn!("{} batch aborted at {}: {e}", T::KIND, event.path);
                self.state = BatchState::Aborted;
                return Err(e);
            }
        }
        Ok(self.applied - before)
    }

    fn apply_one(&mut self, target: &EventTarget, event: &ChangeEvent) -> Result<()> {
        let is_key = target.field.leaf == T::KEY_LEAF && target.field.nested_key.is_none();

        if !target.field.is_known::<T>() {
            log::debug!("ignoring unhandled field {}", event.path);
            return Ok(());
        }

        match (event.operation, is_key) {
            (Operation::Moved, _) => {
                log::trace!("ignoring move of {}", event.path);
                return Ok(());
            }
            (Operation::Created, true) => {
                log::debug!("{} '{}' created", T::KIND, target.key);
                self.working.upsert(T::with_key(&target.key));
            }
            (Operation::Modified, true) => {
                return Err(Error::InvalidValue {
                    field: event.path.clone(),
                    message: "key leaves cannot be modified".to_string(),
                });
            }
            (Operation::Deleted, true) => {
                if self.working.remove(&target.key).is_some() {
                    log::debug!("{} '{}' removed", T::KIND, target.key);
                }
            }
            (Operation::Created | Operation::Modified, false) => {
                let value = event.value.as_deref().ok_or_else(|| Error::InvalidValue {
                    field: event.path.clone(),
                    message: "event carries no value".to_string(),
                })?;
                let entity = self
                    .working
                    .find_mut(&target.key)
                    .ok_or_else(|| Error::MissingEntity {
                        kind: T::KIND,
                        key: target.key.clone(),
                    })?;
                entity.set_field(&target.field, Some(value))?;
            }
            (Operation::Deleted, false) => match self.working.find_mut(&target.key) {
                Some(entity) => entity.set_field(&target.field, None)?,
                // The entity went with its key earlier in this batch.
                None => return Ok(()),
            },
        }

        self.applied += 1;
        Ok(())
    }

    /// Store the whole working collection in one call.
    ///
    /// Every entity must be complete; otherwise nothing is written.
    pub fn commit(mut self, adapter: &dyn Adapter<T>) -> Result<Committed<T>> {
        if self.state != BatchState::Applying {
            return Err(Error::Reentrant { kind: T::KIND });
        }
        self.working.validate()?;
        adapter.store(&self.working)?;
        self.state = BatchState::Committed;
        log::info!(
            "{}: stored {} {} entries",
            adapter.name(),
            self.working.len(),
            T::KIND
        );
        Ok(Committed {
            previous: self.base,
            stored: self.working,
            applied: self.applied,
        })
    }

    /// Drop the working collection, returning the untouched base.
    pub fn abort(mut self) -> Collection<T> {
        self.state = BatchState::Aborted;
        self.working.clear();
        self.base
    }
}
