/// Short-lived cache of per-lead activity counters.
///
/// Counters are shown on every card, so a board render asks for many of them
/// at once. Fresh entries are served from memory, concurrent requests for the
/// same lead share one network call, and the rest of a batch goes out as a
/// single bulk request.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::{try_join_all, BoxFuture, FutureExt, Shared, WeakShared};
use tokio::time::Instant;

use crate::api::{ApiError, LeadApi};
use crate::config::ActivityCacheConfig;
use crate::types::{ActivityCounts, ActivityCountsMap, LeadId};

type CountsRequest = BoxFuture<'static, Result<Arc<ActivityCountsMap>, ApiError>>;
type CountsFuture = Shared<CountsRequest>;

struct CachedCounts {
    counts: ActivityCounts,
    fetched_at: Instant,
}

/// Held weakly: once every awaiter has gone, the request is dropped and
/// its slot released.
struct InFlight {
    request: u64,
    future: WeakShared<CountsRequest>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<LeadId, CachedCounts>,
    in_flight: HashMap<LeadId, InFlight>,
    next_request: u64,
}

impl CacheInner {
    /// Live request for `lead_id`, with its request number.
    fn joinable(&self, lead_id: &str) -> Option<(u64, CountsFuture)> {
        let flight = self.in_flight.get(lead_id)?;
        flight.future.upgrade().map(|future| (flight.request, future))
    }

    fn release(&mut self, lead_ids: &[LeadId], request: u64) {
        for id in lead_ids {
            if self
                .in_flight
                .get(id)
                .is_some_and(|flight| flight.request == request)
            {
                self.in_flight.remove(id);
            }
        }
    }
}

/// Frees the in-flight slots of one request when its future finishes or is
/// dropped unfinished.
struct FlightGuard {
    cache: Arc<Mutex<CacheInner>>,
    lead_ids: Vec<LeadId>,
    request: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        lock_inner(&self.cache).release(&self.lead_ids, self.request);
    }
}

pub struct ActivityCountsCache {
    api: Arc<dyn LeadApi>,
    ttl: Duration,
    inner: Arc<Mutex<CacheInner>>,
}

impl ActivityCountsCache {
    pub fn new(api: Arc<dyn LeadApi>, config: &ActivityCacheConfig) -> Self {
        Self {
            api,
            ttl: config.ttl(),
            inner: Arc::new(Mutex::new(CacheInner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        lock_inner(&self.inner)
    }

    fn fresh(&self, inner: &CacheInner, lead_id: &str) -> Option<ActivityCounts> {
        inner
            .entries
            .get(lead_id)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.counts)
    }

    pub async fn get(&self, lead_id: &str) -> Result<ActivityCounts, ApiError> {
        let future = {
            let mut inner = self.lock();
            if let Some(counts) = self.fresh(&inner, lead_id) {
                return Ok(counts);
            }
            match inner.joinable(lead_id) {
                Some((_, future)) => future,
                None => {
                    let api = self.api.clone();
                    let id = lead_id.to_string();
                    let fetch = async move {
                        let counts = api.activity_counts(&id).await?;
                        Ok::<_, ApiError>(HashMap::from([(id, counts)]))
                    };
                    self.register(&mut inner, vec![lead_id.to_string()], fetch.boxed())
                }
            }
        };

        let counts = future.await?;
        counts
            .get(lead_id)
            .copied()
            .ok_or_else(|| ApiError::Decode(format!("no activity counts for lead {}", lead_id)))
    }

    /// Counts for every id in `lead_ids` that the server knows about.
    pub async fn get_many(&self, lead_ids: &[LeadId]) -> Result<ActivityCountsMap, ApiError> {
        let mut result = ActivityCountsMap::new();
        let mut waiting: Vec<CountsFuture> = Vec::new();
        {
            let mut inner = self.lock();
            let mut joined = HashSet::new();
            let mut missing = Vec::new();
            for id in lead_ids {
                if result.contains_key(id) || missing.contains(id) {
                    continue;
                }
                if let Some(counts) = self.fresh(&inner, id) {
                    result.insert(id.clone(), counts);
                } else if inner
                    .in_flight
                    .get(id)
                    .is_some_and(|flight| joined.contains(&flight.request))
                {
                    continue;
                } else if let Some((request, future)) = inner.joinable(id) {
                    joined.insert(request);
                    waiting.push(future);
                } else {
                    missing.push(id.clone());
                }
            }
            if !missing.is_empty() {
                log::debug!(
                    target: "leadboard.activity",
                    "Bulk fetch for {} leads ({} cached)",
                    missing.len(),
                    result.len()
                );
                let api = self.api.clone();
                let ids = missing.clone();
                let fetch = async move { api.activity_counts_bulk(&ids).await };
                waiting.push(self.register(&mut inner, missing, fetch.boxed()));
            }
        }

        for counts in try_join_all(waiting).await? {
            for id in lead_ids {
                if let Some(c) = counts.get(id) {
                    result.insert(id.clone(), *c);
                }
            }
        }
        Ok(result)
    }

    /// Drop the cached entry so the next `get` goes to the server. A request
    /// already in flight for the lead is detached and its answer discarded.
    pub fn invalidate(&self, lead_id: &str) {
        let mut inner = self.lock();
        inner.entries.remove(lead_id);
        inner.in_flight.remove(lead_id);
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.in_flight.clear();
    }

    fn register(
        &self,
        inner: &mut CacheInner,
        lead_ids: Vec<LeadId>,
        fetch: BoxFuture<'static, Result<ActivityCountsMap, ApiError>>,
    ) -> CountsFuture {
        inner.next_request += 1;
        let request = inner.next_request;
        let guard = FlightGuard {
            cache: self.inner.clone(),
            lead_ids: lead_ids.clone(),
            request,
        };
        let future: CountsFuture = async move {
            let result = fetch.await;
            {
                let mut inner = lock_inner(&guard.cache);
                if let Ok(counts) = &result {
                    for id in &guard.lead_ids {
                        let ours = inner
                            .in_flight
                            .get(id)
                            .is_some_and(|flight| flight.request == guard.request);
                        if let (true, Some(c)) = (ours, counts.get(id)) {
                            inner.entries.insert(
                                id.clone(),
                                CachedCounts {
                                    counts: *c,
                                    fetched_at: Instant::now(),
                                },
                            );
                        }
                    }
                }
                inner.release(&guard.lead_ids, guard.request);
            }
            if let Err(e) = &result {
                log::warn!(target: "leadboard.activity", "Activity counts request failed: {}", e);
            }
            result.map(Arc::new)
        }
        .boxed()
        .shared();

        if let Some(weak) = future.downgrade() {
            for id in lead_ids {
                inner.in_flight.insert(
                    id,
                    InFlight {
                        request,
                        future: weak.clone(),
                    },
                );
            }
        }
        future
    }
}

fn lock_inner(inner: &Mutex<CacheInner>) -> MutexGuard<'_, CacheInner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}
