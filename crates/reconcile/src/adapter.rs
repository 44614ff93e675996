//! Adapter trait between collections and the live system

use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Loads and stores one entity collection against one live transport.
///
/// `store` replaces the whole live list with the given collection. A failed
/// store must leave the live system as it was before the call.
pub trait Adapter<T: Entity> {
    /// Short label used in logs (e.g. "resolved", "/etc/ntp.conf")
    fn name(&self) -> &str;

    /// Read the current live collection. Never cached.
    fn load(&self) -> Result<Collection<T>>;

    /// Replace the live collection.
    fn store(&self, collection: &Collection<T>) -> Result<()>;
}

impl<T: Entity, A: Adapter<T> + ?Sized> Adapter<T> for Rc<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&self) -> Result<Collection<T>> {
        (**self).load()
    }

    fn store(&self, collection: &Collection<T>) -> Result<()> {
        (**self).store(collection)
    }
}

impl<T: Entity, A: Adapter<T> + ?Sized> Adapter<T> for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&self) -> Result<Collection<T>> {
        (**self).load()
    }

    fn store(&self, collection: &Collection<T>) -> Result<()> {
        (**self).store(collection)
    }
}

/// In-memory live state, for dry runs and tests.
#[derive(Debug)]
pub struct MemoryAdapter<T> {
    name: String,
    state: RefCell<Collection<T>>,
    fail_load: Cell<bool>,
    fail_store: Cell<bool>,
    stores: Cell<usize>,
}

impl<T: Entity> MemoryAdapter<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_state(name, [])
    }

    pub fn with_state(name: impl Into<String>, items: impl IntoIterator<Item = T>) -> Self {
        Self {
            name: name.into(),
            state: RefCell::new(items.into_iter().collect()),
            fail_load: Cell::new(false),
            fail_store: Cell::new(false),
            stores: Cell::new(0),
        }
    }

    /// Current contents.
    pub fn snapshot(&self) -> Collection<T> {
        self.state.borrow().clone()
    }

    /// Number of successful stores so far.
    pub fn store_count(&self) -> usize {
        self.stores.get()
    }

    /// Make the next `load` fail with a transport error.
    pub fn fail_next_load(&self) {
        self.fail_load.set(true);
    }

    /// Make the next `store` fail with a transport error, leaving state as is.
    pub fn fail_next_store(&self) {
        self.fail_store.set(true);
    }
}

impl<T: Entity> Adapter<T> for MemoryAdapter<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Collection<T>> {
        if self.fail_load.replace(false) {
            return Err(Error::Transport {
                message: format!("{}: simulated load failure", self.name),
            });
        }
        Ok(self.snapshot())
    }

    fn store(&self, collection: &Collection<T>) -> Result<()> {
        if self.fail_store.replace(false) {
            return Err(Error::Transport {
                message: format!("{}: simulated store failure", self.name),
            });
        }
        *self.state.borrow_mut() = collection.clone();
        self.stores.set(self.stores.get() + 1);
        Ok(())
    }
}
