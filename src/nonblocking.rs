use std::{
    collections::HashMap,
    fmt::Display,
    future::Future,
    hash::Hash,
    panic::AssertUnwindSafe,
    sync::Arc,
};

use futures_util::{
    future::{BoxFuture, Shared, WeakShared},
    FutureExt,
};
use parking_lot::Mutex as SyncMutex;
use tracing::trace;

use crate::{failure, Error};

type Flight<T> = Shared<BoxFuture<'static, Result<T, Error>>>;
type SharedMapping<K, T> = Arc<SyncMutex<Registry<K, T>>>;

struct Registry<K, T> {
    next_epoch: u64,
    inflight: HashMap<K, BroadcastOnce<T>>,
}

impl<K, T> Default for Registry<K, T> {
    fn default() -> Self {
        Self {
            next_epoch: 0,
            inflight: HashMap::new(),
        }
    }
}

/// AsyncSingleFlight is the async flavor of [`SingleFlight`](crate::SingleFlight):
/// duplicate callers await the original call instead of blocking a thread.
///
/// Every caller of an epoch holds a handle on the same operation future, and
/// whichever caller is polled drives it. Dropping one caller's future neither
/// cancels nor restarts the operation; it is dropped only once no caller is
/// left.
pub struct AsyncSingleFlight<K, T> {
    mapping: SharedMapping<K, T>,
}

impl<K, T> Default for AsyncSingleFlight<K, T> {
    fn default() -> Self {
        Self {
            mapping: Default::default(),
        }
    }
}

impl<K, T> std::fmt::Debug for AsyncSingleFlight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSingleFlight")
            .field("inflight", &self.mapping.lock().inflight.len())
            .finish()
    }
}

/// `BroadcastOnce` is the registry's handle on a flight; callers keep it alive.
struct BroadcastOnce<T> {
    epoch: u64,
    flight: WeakShared<BoxFuture<'static, Result<T, Error>>>,
}

// Lives inside the operation future, so it drops when the operation finishes
// or when the last caller gives up on it.
struct Landing<K: Hash + Eq, T> {
    key: K,
    epoch: u64,
    mapping: SharedMapping<K, T>,
}

impl<K: Hash + Eq, T> Drop for Landing<K, T> {
    fn drop(&mut self) {
        let mut registry = self.mapping.lock();
        if registry
            .inflight
            .get(&self.key)
            .is_some_and(|call| call.epoch == self.epoch)
        {
            registry.inflight.remove(&self.key);
            trace!("entry removed");
        }
    }
}

impl<K, T> AsyncSingleFlight<K, T>
where
    K: Hash + Eq + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty AsyncSingleFlight.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a flight in progress.
    pub fn inflight_count(&self) -> usize {
        self.mapping.lock().inflight.len()
    }

    /// Execute and return the outcome of a given function, making sure that only one
    /// operation is in-flight at a given moment. If a duplicate call comes in, that caller will
    /// wait until the original call completes and return the same outcome.
    ///
    /// Errors and panics are reported as [`Error::OperationFailed`]. A
    /// duplicate caller's `func` is dropped without being called.
    pub fn work<F, Fut, E>(&self, key: K, func: F) -> impl Future<Output = Result<T, Error>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let mut registry = self.mapping.lock();
        if let Some(flight) = registry
            .inflight
            .get(&key)
            .and_then(|call| call.flight.upgrade())
        {
            trace!("flight in progress, waiting");
            return flight;
        }

        let epoch = registry.next_epoch;
        registry.next_epoch += 1;
        let landing = Landing {
            key: key.clone(),
            epoch,
            mapping: self.mapping.clone(),
        };
        let flight: Flight<T> = async move {
            let _landing = landing;
            trace!("working...");
            let caught = AssertUnwindSafe(async move { func().await })
                .catch_unwind()
                .await;
            let outcome = failure::settle(caught);
            trace!("work done");
            outcome
        }
        .boxed()
        .shared();

        // A dead entry left by an abandoned epoch is replaced here.
        if let Some(weak) = flight.downgrade() {
            registry
                .inflight
                .insert(key, BroadcastOnce { epoch, flight: weak });
        }
        flight
    }
}
