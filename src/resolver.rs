use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::config::ProviderProfile;
use crate::geocode::{GeocodeClient, GeocodeOutcome, LOOKUP_TIMEOUT};
use crate::records::InputRecord;

/// Retries after the initial attempt, per address.
const RETRY_CAP: u32 = 2;

#[derive(Debug, Clone)]
pub struct ResolutionProgress {
    pub completed: usize,
    pub total: usize,
    pub address: String,
}

pub type ProgressObserver = Arc<dyn Fn(ResolutionProgress) + Send + Sync>;

/// Address → outcome map shared across workers. First write wins: a key,
/// once set, is never overwritten within a run.
#[derive(Default)]
pub struct GeocodeCache {
    entries: Mutex<HashMap<String, GeocodeOutcome>>,
}

impl GeocodeCache {
    pub fn get(&self, address: &str) -> Option<GeocodeOutcome> {
        self.entries.lock().get(address).copied()
    }

    fn insert(&self, address: String, outcome: GeocodeOutcome) {
        self.entries.lock().entry(address).or_insert(outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|outcome| outcome.is_resolved())
            .count()
    }

    #[cfg(test)]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, GeocodeOutcome)>,
    {
        Self {
            entries: Mutex::new(entries.into_iter().collect()),
        }
    }
}

/// Geocodes the distinct non-empty addresses of an input batch through one
/// provider, observing that provider's concurrency and pacing profile.
pub struct AddressResolver {
    client: Arc<dyn GeocodeClient>,
    profile: ProviderProfile,
    limiter: RateLimiter,
}

impl AddressResolver {
    pub fn new(client: Arc<dyn GeocodeClient>, profile: ProviderProfile) -> Self {
        let limiter = RateLimiter::new(profile.min_delay);
        Self {
            client,
            profile,
            limiter,
        }
    }

    /// Resolves every distinct non-empty address in `records` and returns the
    /// populated cache. Individual lookup failures degrade to unresolved
    /// entries; this call itself cannot fail.
    ///
    /// The observer fires exactly once per distinct address, with a gap-free
    /// completed count. Completion order is unspecified when the profile
    /// allows more than one worker.
    pub async fn resolve_all(
        &self,
        records: &[InputRecord],
        observer: Option<ProgressObserver>,
        cancel_flag: Option<Arc<AtomicBool>>,
    ) -> GeocodeCache {
        let addresses = distinct_addresses(records);
        let total = addresses.len();
        let cache = GeocodeCache::default();
        // completions are counted and reported under one lock so observers
        // see a strictly increasing, gap-free sequence ending at `total`
        let completed = Mutex::new(0_usize);
        debug!(total, workers = self.profile.workers, "dispatching lookups");

        {
            let cache = &cache;
            let completed = &completed;
            let observer = observer.as_ref();
            let cancel_flag = cancel_flag.as_ref();
            futures_util::stream::iter(addresses)
                .for_each_concurrent(self.profile.workers.max(1), |address| async move {
                    if cancel_flag
                        .map(|flag| flag.load(Ordering::SeqCst))
                        .unwrap_or(false)
                    {
                        return;
                    }

                    let outcome = self.lookup_with_retry(&address).await;
                    cache.insert(address.clone(), outcome);

                    let mut done = completed.lock();
                    *done += 1;
                    if let Some(observer) = observer {
                        observer(ResolutionProgress {
                            completed: *done,
                            total,
                            address,
                        });
                    }
                })
                .await;
        }

        cache
    }

    async fn lookup_with_retry(&self, address: &str) -> GeocodeOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.wait().await;
            match timeout(LOOKUP_TIMEOUT, self.client.resolve(address)).await {
                Ok(Ok(Some(coordinate))) => {
                    debug!(address, "address resolved");
                    return GeocodeOutcome::Resolved(coordinate);
                }
                Ok(Ok(None)) => {
                    debug!(address, "provider found no match");
                    return GeocodeOutcome::Unresolved;
                }
                Ok(Err(err)) if err.is_retryable() && attempt <= RETRY_CAP => {
                    warn!(%err, address, attempt, "lookup failed; retrying");
                }
                Ok(Err(err)) => {
                    warn!(%err, address, attempt, "lookup failed; marking unresolved");
                    return GeocodeOutcome::Unresolved;
                }
                Err(_) if attempt <= RETRY_CAP => {
                    warn!(address, attempt, "lookup timed out; retrying");
                }
                Err(_) => {
                    warn!(address, attempt, "lookup timed out; marking unresolved");
                    return GeocodeOutcome::Unresolved;
                }
            }
        }
    }
}

/// Distinct trimmed addresses in order of first occurrence. Deduplicating up
/// front is what guarantees no two lookups are ever in flight for the same
/// address.
fn distinct_addresses(records: &[InputRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut addresses = Vec::new();
    for record in records {
        if let Some(address) = record.address_key() {
            if seen.insert(address.to_string()) {
                addresses.push(address.to_string());
            }
        }
    }
    addresses
}

/// Enforces the profile's minimum spacing between dispatches. The tick is
/// global, so the cumulative call rate stays at or below one per
/// `min_delay` regardless of worker count.
struct RateLimiter {
    min_delay: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_tick: AsyncMutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                sleep(self.min_delay - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}
