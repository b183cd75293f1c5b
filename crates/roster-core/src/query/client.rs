//! The query client: a keyed store of cached values plus the bookkeeping for
//! in-flight fetches.
//!
//! Every slot carries two fetch ids. `written_id` is the id of the write that
//! produced the current value; a fetch resolving with a smaller id is stale
//! and discarded. `invalidated_id` is taken from the same counter when the key
//! is invalidated; an in-flight fetch started before it is not reused by later
//! callers. All slot mutations happen under the map's per-key lock and never
//! across an await point.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::error::QueryError;
use super::key::QueryKey;
use super::policy::QueryPolicy;

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, QueryError>>>;

/// Capacity of the event channel; slow subscribers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Notification about a change to one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// A fetch or direct write stored a new value.
    Updated(QueryKey),
    Invalidated(QueryKey),
    /// The in-flight fetch was aborted; the settled value (if any) is unchanged.
    Cancelled(QueryKey),
    Evicted(QueryKey),
}

impl QueryEvent {
    pub fn key(&self) -> &QueryKey {
        match self {
            QueryEvent::Updated(key)
            | QueryEvent::Invalidated(key)
            | QueryEvent::Cancelled(key)
            | QueryEvent::Evicted(key) => key,
        }
    }
}

/// A value handed back by [`QueryClient::fetch`].
#[derive(Debug)]
pub struct QueryResult<T> {
    pub data: Arc<T>,
    /// Served from the cache without waiting on the network.
    pub from_cache: bool,
    /// Past its freshness window; a background refetch is running.
    pub is_stale: bool,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Clone for QueryResult<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            from_cache: self.from_cache,
            is_stale: self.is_stale,
            fetched_at: self.fetched_at,
        }
    }
}

struct InFlight {
    fetch_id: u64,
    token: CancellationToken,
    result: SharedFetch,
}

struct Slot {
    entry: Option<CacheEntry<AnyValue>>,
    in_flight: Option<InFlight>,
    written_id: u64,
    invalidated_id: u64,
    last_accessed: Instant,
    eviction_window: Duration,
}

impl Slot {
    fn new(policy: &QueryPolicy) -> Self {
        Self {
            entry: None,
            in_flight: None,
            written_id: 0,
            invalidated_id: 0,
            last_accessed: Instant::now(),
            eviction_window: policy.eviction_window,
        }
    }

    fn touch(&mut self, policy: &QueryPolicy) {
        self.last_accessed = Instant::now();
        self.eviction_window = policy.eviction_window;
    }

    /// The in-flight fetch, if it was started after the last invalidation.
    fn reusable_fetch(&self) -> Option<(u64, SharedFetch)> {
        self.in_flight
            .as_ref()
            .filter(|fetch| fetch.fetch_id > self.invalidated_id)
            .map(|fetch| (fetch.fetch_id, fetch.result.clone()))
    }

    fn is_fresh(&mut self, policy: &QueryPolicy) -> bool {
        match self.entry.as_mut() {
            Some(entry) => !entry.check_staleness(policy.freshness_window),
            None => false,
        }
    }

    fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.last_accessed.elapsed() >= self.eviction_window
    }
}

/// Keyed query cache shared by the list and form coordinators.
///
/// Clone is cheap; clones share the same store and event channel.
#[derive(Clone)]
pub struct QueryClient {
    slots: Arc<DashMap<QueryKey, Slot>>,
    next_id: Arc<AtomicU64>,
    events: broadcast::Sender<QueryEvent>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.slots.len())
            .finish()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            slots: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            events,
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn emit(events: &broadcast::Sender<QueryEvent>, event: QueryEvent) {
        // No receivers is not an error
        let _ = events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.events.subscribe()
    }

    /// Return the value for `key`, fetching it if it is missing or stale.
    ///
    /// - fresh entry: returned without a network call
    /// - stale entry with `keep_previous_on_refetch`: returned immediately
    ///   while a background fetch replaces it
    /// - an identical fetch already in flight: awaited instead of duplicated
    /// - otherwise a new fetch is started and awaited
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        policy: &QueryPolicy,
        fetcher: F,
    ) -> Result<QueryResult<T>, QueryError>
    where
        T: Send + Sync + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        self.fetch_inner(key, policy, fetcher, true).await
    }

    /// Invalidate `key` and wait for a new value, even when the policy keeps
    /// previous data.
    pub async fn refetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        policy: &QueryPolicy,
        fetcher: F,
    ) -> Result<QueryResult<T>, QueryError>
    where
        T: Send + Sync + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        self.invalidate(key);
        self.fetch_inner(key, policy, fetcher, false).await
    }

    async fn fetch_inner<T, F, Fut>(
        &self,
        key: &QueryKey,
        policy: &QueryPolicy,
        fetcher: F,
        allow_placeholder: bool,
    ) -> Result<QueryResult<T>, QueryError>
    where
        T: Send + Sync + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let (fetch_id, pending) = {
            let mut guard = self
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(policy));
            let slot = &mut *guard;
            slot.touch(policy);

            if slot.is_fresh(policy) {
                if let Some(entry) = slot.entry.as_ref() {
                    debug!(%key, "Query cache hit");
                    return cached_result(key, entry, false);
                }
            }

            let pending = match slot.reusable_fetch() {
                Some(pending) => {
                    debug!(%key, fetch_id = pending.0, "Attaching to in-flight fetch");
                    pending
                }
                None => self.start_fetch(slot, key, policy, fetcher),
            };

            if allow_placeholder && policy.keep_previous_on_refetch {
                if let Some(entry) = slot.entry.as_ref() {
                    debug!(%key, "Serving stale data while refetching");
                    return cached_result(key, entry, true);
                }
            }
            pending
        };

        let value = pending.await?;

        // A write that landed while this fetch was running wins over its result
        if let Some(slot) = self.slots.get(key) {
            if slot.written_id > fetch_id {
                if let Some(entry) = slot.entry.as_ref() {
                    debug!(%key, fetch_id, written_id = slot.written_id, "Fetch result superseded");
                    return cached_result(key, entry, false);
                }
            }
        }

        Ok(QueryResult {
            data: downcast(key, value)?,
            from_cache: false,
            is_stale: false,
            fetched_at: Utc::now(),
        })
    }

    /// Start a background fetch unless the entry is fresh or already loading.
    /// Returns whether a fetch was started.
    pub fn prefetch<T, F, Fut>(&self, key: &QueryKey, policy: &QueryPolicy, fetcher: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let mut guard = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(policy));
        let slot = &mut *guard;
        slot.touch(policy);

        if slot.is_fresh(policy) || slot.reusable_fetch().is_some() {
            debug!(%key, "Prefetch skipped");
            return false;
        }
        debug!(%key, "Prefetching");
        // The fetch task runs to completion without anyone awaiting it
        drop(self.start_fetch(slot, key, policy, fetcher));
        true
    }

    fn start_fetch<T, F, Fut>(
        &self,
        slot: &mut Slot,
        key: &QueryKey,
        policy: &QueryPolicy,
        fetcher: F,
    ) -> (u64, SharedFetch)
    where
        T: Send + Sync + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        if let Some(previous) = slot.in_flight.take() {
            debug!(%key, fetch_id = previous.fetch_id, "Superseding in-flight fetch");
            previous.token.cancel();
        }

        let fetch_id = self.next_id();
        let token = CancellationToken::new();
        debug!(%key, fetch_id, "Starting fetch");

        let slots = Arc::clone(&self.slots);
        let events = self.events.clone();
        let task_key = key.clone();
        let task_token = token.clone();
        let retry_count = policy.retry_count;
        let handle: JoinHandle<Result<AnyValue, QueryError>> = tokio::spawn(async move {
            let result = run_fetcher(&task_key, &fetcher, retry_count, &task_token)
                .await
                .map(|value| Arc::new(value) as AnyValue);
            settle(&slots, &events, &task_key, fetch_id, &result);
            result
        });

        let result = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(QueryError::Invalid(format!("Fetch task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            fetch_id,
            token,
            result: result.clone(),
        });
        (fetch_id, result)
    }

    /// Mark `key` stale so the next access refetches regardless of its
    /// freshness window. Returns false when nothing is cached under `key`.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let invalidated_id = self.next_id();
        let Some(mut slot) = self.slots.get_mut(key) else {
            return false;
        };
        slot.invalidated_id = invalidated_id;
        if let Some(entry) = slot.entry.as_mut() {
            entry.mark_stale();
        }
        drop(slot);
        debug!(%key, "Invalidated");
        Self::emit(&self.events, QueryEvent::Invalidated(key.clone()));
        true
    }

    /// Invalidate every key of one resource. Returns the number of keys touched.
    pub fn invalidate_resource(&self, resource: &str) -> usize {
        let keys: Vec<QueryKey> = self
            .slots
            .iter()
            .filter(|slot| slot.key().resource() == resource)
            .map(|slot| slot.key().clone())
            .collect();
        keys.iter().filter(|key| self.invalidate(key)).count()
    }

    /// Abort the in-flight fetch for `key`. The settled value stays in place.
    /// Returns whether there was anything to cancel.
    pub fn cancel(&self, key: &QueryKey) -> bool {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return false;
        };
        let Some(fetch) = slot.in_flight.take() else {
            return false;
        };
        drop(slot);
        fetch.token.cancel();
        debug!(%key, fetch_id = fetch.fetch_id, "Cancelled in-flight fetch");
        Self::emit(&self.events, QueryEvent::Cancelled(key.clone()));
        true
    }

    /// The settled value for `key`, fresh or not.
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let slot = self.slots.get(key)?;
        let value = slot.entry.as_ref()?.data.clone();
        drop(slot);
        value.downcast::<T>().ok()
    }

    /// Wall-clock time of the settled value for `key`.
    pub fn updated_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
        let slot = self.slots.get(key)?;
        slot.entry.as_ref().map(|entry| entry.cached_at)
    }

    /// Write a value directly. The write supersedes any fetch for `key` that
    /// is still in flight.
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, data: T, policy: &QueryPolicy) {
        let write_id = self.next_id();
        let value: AnyValue = Arc::new(data);
        {
            let mut guard = self
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(policy));
            let slot = &mut *guard;
            slot.touch(policy);
            slot.written_id = write_id;
            match slot.entry.as_mut() {
                Some(entry) => entry.update(value),
                None => slot.entry = Some(CacheEntry::new(value)),
            }
        }
        debug!(%key, "Query data set");
        Self::emit(&self.events, QueryEvent::Updated(key.clone()));
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.in_flight.is_some())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove entries that have been idle longer than their eviction window.
    /// Entries with a fetch in flight are kept. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let mut evicted = Vec::new();
        self.slots.retain(|key, slot| {
            let idle = slot.is_idle();
            if idle {
                evicted.push(key.clone());
            }
            !idle
        });
        for key in &evicted {
            debug!(%key, "Evicted idle entry");
            Self::emit(&self.events, QueryEvent::Evicted(key.clone()));
        }
        evicted.len()
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `shutdown` fires.
    pub fn spawn_gc(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = client.sweep();
                        if evicted > 0 {
                            debug!(evicted, "Query cache sweep");
                        }
                    }
                }
            }
        })
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> Result<Arc<T>, QueryError> {
    value.downcast::<T>().map_err(|_| {
        QueryError::Invalid(format!(
            "Cached value for {} is not a {}",
            key,
            std::any::type_name::<T>()
        ))
    })
}

fn cached_result<T: Send + Sync + 'static>(
    key: &QueryKey,
    entry: &CacheEntry<AnyValue>,
    is_stale: bool,
) -> Result<QueryResult<T>, QueryError> {
    Ok(QueryResult {
        data: downcast(key, entry.data.clone())?,
        from_cache: true,
        is_stale,
        fetched_at: entry.cached_at,
    })
}

/// Run the fetcher, retrying transient failures with exponential backoff.
async fn run_fetcher<T, F, Fut>(
    key: &QueryKey,
    fetcher: &F,
    retry_count: u32,
    token: &CancellationToken,
) -> Result<T, QueryError>
where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, QueryError>>,
{
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(QueryError::Cancelled),
            result = fetcher(token.clone()) => result,
        };

        match result {
            Err(e) if e.is_retryable() && attempt < retry_count => {
                let delay = QueryPolicy::retry_delay(attempt);
                warn!(%key, attempt = attempt + 1, ?delay, error = %e, "Fetch failed, retrying");
                attempt += 1;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(QueryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            other => return other,
        }
    }
}

/// Store a finished fetch's result, unless a newer write already landed.
fn settle(
    slots: &DashMap<QueryKey, Slot>,
    events: &broadcast::Sender<QueryEvent>,
    key: &QueryKey,
    fetch_id: u64,
    result: &Result<AnyValue, QueryError>,
) {
    let Some(mut slot) = slots.get_mut(key) else {
        return;
    };
    if slot
        .in_flight
        .as_ref()
        .is_some_and(|fetch| fetch.fetch_id == fetch_id)
    {
        slot.in_flight = None;
    }

    match result {
        Ok(value) => {
            if fetch_id <= slot.written_id {
                debug!(%key, fetch_id, written_id = slot.written_id, "Discarding out-of-order result");
                return;
            }
            slot.written_id = fetch_id;
            slot.last_accessed = Instant::now();
            // Data requested before an invalidation is kept but stays stale
            let invalidated = fetch_id < slot.invalidated_id;
            match slot.entry.as_mut() {
                Some(entry) => entry.update(Arc::clone(value)),
                None => slot.entry = Some(CacheEntry::new(Arc::clone(value))),
            }
            if let Some(entry) = slot.entry.as_mut() {
                entry.is_stale = invalidated;
            }
            drop(slot);
            debug!(%key, fetch_id, "Fetch settled");
            QueryClient::emit(events, QueryEvent::Updated(key.clone()));
        }
        Err(QueryError::Cancelled) => {
            debug!(%key, fetch_id, "Fetch cancelled");
        }
        Err(e) => {
            warn!(%key, fetch_id, error = %e, "Fetch failed");
        }
    }
}
