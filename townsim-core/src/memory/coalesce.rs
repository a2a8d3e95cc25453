//! Request coalescing for background jobs.
//!
//! A [`Coalescer`] maps a key to the job currently running for it. Asking for
//! a key that already has a job returns that job instead of starting another;
//! the entry is removed as soon as the job settles, so the next request after
//! that starts fresh.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A job that any number of callers can await.
pub type SharedJob<V> = Shared<BoxFuture<'static, V>>;

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Get-or-create-or-await map of in-flight jobs.
pub struct Coalescer<K, V> {
    jobs: Arc<Mutex<HashMap<K, SharedJob<V>>>>,
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the job running for `key`, starting one with `start` if there
    /// is none.
    ///
    /// The boolean is true when this call started the job. A started job is
    /// driven to completion on the current tokio runtime even if every caller
    /// drops its handle. `start` runs while the map is locked and should only
    /// build the future, not poll it.
    pub fn run<F>(&self, key: K, start: F) -> (SharedJob<V>, bool)
    where
        F: FnOnce() -> BoxFuture<'static, V>,
    {
        let mut jobs = lock(&self.jobs);
        if let Some(job) = jobs.get(&key) {
            return (job.clone(), false);
        }

        let registry = Arc::clone(&self.jobs);
        let settled_key = key.clone();
        let work = start();
        let job = async move {
            let value = work.await;
            lock(&registry).remove(&settled_key);
            value
        }
        .boxed()
        .shared();

        jobs.insert(key, job.clone());
        drop(jobs);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(job.clone());
        }
        (job, true)
    }

    /// The job currently running for `key`, if any.
    pub fn in_flight(&self, key: &K) -> Option<SharedJob<V>> {
        lock(&self.jobs).get(key).cloned()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.jobs).contains_key(key)
    }

    /// Number of keys with a running job.
    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
