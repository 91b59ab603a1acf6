//! Keyed, cancellable delayed tasks.
//!
//! Scheduling a task for a key aborts whatever was still pending for that
//! key, so only the most recent task survives a burst of calls.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs at most one pending delayed task per key.
///
/// Dropping the debouncer detaches, rather than aborts, pending tasks.
pub struct Debouncer<K>
where
    K: Eq + Hash,
{
    pending: DashMap<K, JoinHandle<()>>,
}

impl<K> Default for Debouncer<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }
}

impl<K> Debouncer<K>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, cancelling any task still pending for `key`.
    pub fn schedule<F>(&self, key: K, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        if let Some(previous) = self.pending.insert(key, handle) {
            previous.abort();
        }
    }

    /// Cancel the pending task for `key`. Returns true if one was still waiting.
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some((_, handle)) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Whether a task for `key` has been scheduled and has not run yet.
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }
}
