use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::Display,
    hash::Hash,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::{failure, Error};

/// One in-flight execution. `outcome` is written exactly once, by the
/// executor, and is `None` until then.
struct Call<T> {
    outcome: Mutex<Option<Result<T, Error>>>,
    done: Condvar,
}

impl<T> Default for Call<T> {
    fn default() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }
}

impl<T: Clone> Call<T> {
    fn wait(&self) -> Result<T, Error> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(ready) = outcome.as_ref() {
                return ready.clone();
            }
            self.done.wait(&mut outcome);
        }
    }
}

impl<T> Call<T> {
    fn complete(&self, outcome: Result<T, Error>) {
        *self.outcome.lock() = Some(outcome);
        self.done.notify_all();
    }

    fn abandon(&self) {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = Some(Err(failure::non_descriptive()));
            self.done.notify_all();
        }
    }
}

/// Held by the executor. Dropping it erases the registry entry, and if the
/// executor unwound before completing the call, releases the waiters with a
/// failure.
struct Landing<'a, K: Hash + Eq, T> {
    group: &'a SingleFlight<K, T>,
    key: K,
    call: Arc<Call<T>>,
}

impl<K: Hash + Eq, T> Drop for Landing<'_, K, T> {
    fn drop(&mut self) {
        self.call.abandon();
        let mut mapping = self.group.mapping.lock();
        if mapping
            .get(&self.key)
            .is_some_and(|c| Arc::ptr_eq(c, &self.call))
        {
            mapping.remove(&self.key);
            trace!("entry removed");
        }
    }
}

/// SingleFlight represents a class of work and creates a space in which units of work
/// can be executed with duplicate suppression, for callers on plain threads.
///
/// Share it between threads by reference (or inside an `Arc`).
pub struct SingleFlight<K, T> {
    mapping: Mutex<HashMap<K, Arc<Call<T>>>>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            mapping: Default::default(),
        }
    }
}

impl<K, T> std::fmt::Debug for SingleFlight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("inflight", &self.mapping.lock().len())
            .finish()
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty SingleFlight.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys whose operation is running right now.
    pub fn inflight_count(&self) -> usize {
        self.mapping.lock().len()
    }

    /// Execute and return the outcome of `func`, making sure that only one
    /// execution is in-flight for `key` at a given moment. If a duplicate call
    /// comes in, that caller blocks until the original call completes and
    /// returns the same outcome.
    ///
    /// Both an `Err` returned by `func` and a panic inside it are reported as
    /// [`Error::OperationFailed`] to every caller of the flight. Once the
    /// flight is over the key is forgotten, so a later call runs `func` again.
    pub fn work<F, E>(&self, key: K, func: F) -> Result<T, Error>
    where
        F: FnOnce() -> Result<T, E>,
        E: Display,
        T: Clone,
    {
        let (call, executor) = match self.mapping.lock().entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => (entry.insert(Arc::default()).clone(), true),
        };
        if !executor {
            trace!("flight in progress, waiting");
            return call.wait();
        }

        let landing = Landing {
            group: self,
            key,
            call,
        };
        trace!("working...");
        let outcome = failure::settle(panic::catch_unwind(AssertUnwindSafe(func)));
        landing.call.complete(outcome.clone());
        trace!("work done");
        drop(landing);

        outcome
    }
}
