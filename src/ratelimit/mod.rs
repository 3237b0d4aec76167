//! Rate limit coordination.
//!
//! Discord partitions rate limits into buckets keyed by endpoint and major
//! parameters, with a separate account-wide limit layered on top. This module
//! provides the per-bucket gates, the global gate and the registry that maps
//! routes onto them.
//!
//! See: <https://discord.com/developers/docs/topics/rate-limits>

pub mod headers;

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{Notify, Semaphore},
    time::sleep,
};

use crate::route::Route;

/// Mutual exclusion gate for one rate limit bucket.
///
/// Created lazily on first use of a bucket key and kept for the lifetime of
/// the registry. At most one request holds the gate at a time; waiters queue
/// on the semaphore.
#[derive(Debug)]
pub struct Limiter {
    gate: Semaphore,
    locked: AtomicBool,
}

impl Limiter {
    fn new() -> Self {
        Limiter {
            gate: Semaphore::new(1),
            locked: AtomicBool::new(false),
        }
    }

    /// Waits until the gate is free and closes it behind the caller.
    pub async fn acquire(&self) {
        // The semaphore is never closed, so acquisition cannot fail.
        let permit = self.gate.acquire().await.expect("bucket gate closed");
        permit.forget();
        self.locked.store(true, Ordering::Release);
    }

    /// Reopens the gate if it is currently closed.
    ///
    /// Calling this on an open gate is a no-op, so error paths may release
    /// unconditionally.
    pub fn release(&self) {
        if self.locked.swap(false, Ordering::AcqRel) {
            self.gate.add_permits(1);
        }
    }

    /// Schedules the gate to reopen after `reset_after`.
    ///
    /// Used when a response reports the bucket's window as exhausted: the
    /// current holder returns its result immediately while queued requests
    /// keep waiting until the window resets. A zero duration reopens the gate
    /// right away.
    pub fn arm(self: &Arc<Self>, reset_after: Duration) {
        if reset_after.is_zero() {
            self.release();
            return;
        }

        let limiter = Arc::clone(self);

        tokio::spawn(async move {
            sleep(reset_after).await;
            limiter.release();
        });
    }
}

/// Account-wide rate limit gate.
///
/// Engaged only when a response carries the global rate limit flag. While
/// engaged, every request on every bucket waits for it to clear before
/// transmitting.
#[derive(Debug, Default)]
pub struct GlobalLimiter {
    engaged: AtomicBool,
    cleared: Notify,
}

impl GlobalLimiter {
    /// Suspends until the global limit has cleared; returns immediately when
    /// it is not engaged.
    pub async fn wait(&self) {
        loop {
            if !self.engaged.load(Ordering::Acquire) {
                return;
            }

            let cleared = self.cleared.notified();

            // Re-check after registering for notification so a clear between
            // the first load and `notified()` is not missed.
            if !self.engaged.load(Ordering::Acquire) {
                return;
            }

            cleared.await;
        }
    }

    /// Engages the global limit for `reset_after`, then clears it and wakes
    /// all waiters. A limit already in effect is left as is.
    pub fn engage(self: &Arc<Self>, reset_after: Duration) {
        if self.engaged.swap(true, Ordering::AcqRel) {
            return;
        }

        let global = Arc::clone(self);

        tokio::spawn(async move {
            sleep(reset_after).await;
            global.engaged.store(false, Ordering::Release);
            global.cleared.notify_waiters();
            tracing::debug!("global rate limit cleared");
        });
    }

    /// Whether the global limit is currently in effect.
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }
}

/// Registry of rate limit state, owned by one client instance.
///
/// Holds the bucket key to gate mapping and the endpoint signature to
/// server-assigned hash mapping. Both grow for the registry's lifetime;
/// entries are never evicted. Only the dispatcher mutates them.
#[derive(Debug, Default)]
pub struct Buckets {
    limiters: Mutex<HashMap<String, Arc<Limiter>>>,
    hashes: Mutex<HashMap<String, String>>,
    global: Arc<GlobalLimiter>,
}

impl Buckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the bucket key for a route.
    ///
    /// The key is the route's major parameters joined with either the
    /// server-assigned hash learned for its endpoint signature or, before one
    /// is known, the literal method and resolved path.
    pub fn bucket_key(&self, route: &Route) -> String {
        let hashes = self.hashes.lock().expect("hash map poisoned");

        match hashes.get(&route.signature()) {
            Some(hash) => format!("{}:{}", route.major_parameters(), hash),
            None => format!(
                "{}:{}:{}",
                route.major_parameters(),
                route.method(),
                route.path()
            ),
        }
    }

    /// Returns the gate for a bucket key, creating it on first use.
    pub fn limiter(&self, key: &str) -> Arc<Limiter> {
        let mut limiters = self.limiters.lock().expect("limiter map poisoned");

        match limiters.get(key) {
            Some(limiter) => Arc::clone(limiter),
            None => {
                tracing::debug!(bucket = key, "creating bucket gate");
                let limiter = Arc::new(Limiter::new());
                limiters.insert(key.to_owned(), Arc::clone(&limiter));
                limiter
            }
        }
    }

    /// Associates a server-assigned bucket hash with an endpoint signature
    /// for future key resolution.
    pub fn record_hash(&self, signature: String, hash: String) {
        let mut hashes = self.hashes.lock().expect("hash map poisoned");

        if hashes.get(&signature).is_some_and(|known| *known == hash) {
            return;
        }

        tracing::debug!(%signature, %hash, "learned bucket hash");
        hashes.insert(signature, hash);
    }

    /// The account-wide gate shared by every bucket.
    pub fn global(&self) -> &Arc<GlobalLimiter> {
        &self.global
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn limiter() -> Arc<Limiter> {
        Arc::new(Limiter::new())
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let gate = limiter();

        gate.acquire().await;
        gate.release();
        gate.release();

        // The double release must not have minted an extra permit.
        gate.acquire().await;
        assert!(gate.gate.try_acquire().is_err());
    }

    #[tokio::test]
    async fn same_bucket_requests_are_mutually_exclusive() {
        let gate = limiter();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();

        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);

            tasks.push(tokio::spawn(async move {
                gate.acquire().await;

                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);

                gate.release();
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn arm_reopens_after_reset() {
        let gate = limiter();

        gate.acquire().await;
        gate.arm(Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        gate.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(2));
        gate.release();
    }

    #[tokio::test]
    async fn arm_zero_reopens_immediately() {
        let gate = limiter();

        gate.acquire().await;
        gate.arm(Duration::ZERO);

        gate.acquire().await;
        gate.release();
    }

    #[tokio::test(start_paused = true)]
    async fn global_engage_blocks_until_reset() {
        let global = Arc::new(GlobalLimiter::default());

        global.engage(Duration::from_secs(3));
        assert!(global.is_engaged());

        let start = tokio::time::Instant::now();
        global.wait().await;

        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(!global.is_engaged());
    }

    #[tokio::test]
    async fn global_wait_passes_when_disengaged() {
        let global = GlobalLimiter::default();
        global.wait().await;
    }

    #[test]
    fn distinct_channels_resolve_to_distinct_keys() {
        let buckets = Buckets::new();

        let a = Route::get("/channels/{channel_id}/messages").channel_id(123);
        let b = Route::get("/channels/{channel_id}/messages").channel_id(456);

        assert_ne!(buckets.bucket_key(&a), buckets.bucket_key(&b));
    }

    #[test]
    fn learned_hash_unifies_keys_across_paths() {
        let buckets = Buckets::new();

        let a = Route::get("/channels/{channel_id}/messages/{message_id}")
            .channel_id(1)
            .param("message_id", 100);
        let b = Route::get("/channels/{channel_id}/messages/{message_id}")
            .channel_id(1)
            .param("message_id", 200);

        // Before a hash is known, literal paths separate the keys.
        assert_ne!(buckets.bucket_key(&a), buckets.bucket_key(&b));

        buckets.record_hash(a.signature(), "abcd1234".to_owned());

        // Afterwards the shared signature collapses them into one bucket.
        assert_eq!(buckets.bucket_key(&a), buckets.bucket_key(&b));

        buckets.record_hash(a.signature(), "abcd1234".to_owned());
        assert_eq!(buckets.bucket_key(&a), buckets.bucket_key(&b));
    }

    #[test]
    fn hash_does_not_merge_distinct_majors() {
        let buckets = Buckets::new();

        let a = Route::get("/channels/{channel_id}/messages").channel_id(1);
        let b = Route::get("/channels/{channel_id}/messages").channel_id(2);

        buckets.record_hash(a.signature(), "abcd1234".to_owned());

        assert_ne!(buckets.bucket_key(&a), buckets.bucket_key(&b));
    }

    #[test]
    fn limiter_instances_are_reused() {
        let buckets = Buckets::new();

        let first = buckets.limiter("key");
        let second = buckets.limiter("key");

        assert!(Arc::ptr_eq(&first, &second));
    }
}
