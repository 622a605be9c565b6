use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ListingSettings;
use crate::engine::Resolution;
use crate::limits::MAX_SLOTS_PER_MONTH;
use crate::model::{Instant, ListingId, MonthId, Selection, TimeSlot};
use crate::scheduler::{FetchRequest, plan_fetches};
use crate::store::{self, FetchError, MonthEntry, SlotCache};

/// Host-supplied source of published time slots.
#[async_trait]
pub trait SlotFetcher: Send + Sync + 'static {
    async fn fetch_time_slots(
        &self,
        listing: ListingId,
        start: Instant,
        end: Instant,
        zone: Tz,
    ) -> Result<Vec<TimeSlot>, FetchError>;
}

/// Owns one listing's slot cache and runs scheduling passes against it.
///
/// Every pass plans under the write lock, so two passes racing before any
/// response arrives agree on what is already in flight.
pub struct FetchCoordinator {
    listing: ListingId,
    settings: ListingSettings,
    cache: Arc<RwLock<SlotCache>>,
    fetcher: Arc<dyn SlotFetcher>,
}

impl FetchCoordinator {
    pub fn new(listing: ListingId, settings: ListingSettings, fetcher: Arc<dyn SlotFetcher>) -> Self {
        Self {
            listing,
            settings,
            cache: Arc::new(RwLock::new(SlotCache::new())),
            fetcher,
        }
    }

    pub fn listing(&self) -> ListingId {
        self.listing
    }

    pub fn settings(&self) -> &ListingSettings {
        &self.settings
    }

    pub async fn snapshot(&self) -> SlotCache {
        self.cache.read().await.clone()
    }

    /// Schedule fetches for `visible` plus the look-ahead window. Returns one
    /// handle per request issued; each task merges its own month when done.
    pub async fn ensure_months(&self, visible: MonthId, now: Instant) -> Vec<JoinHandle<()>> {
        let requests = {
            let mut guard = self.cache.write().await;
            let plan = plan_fetches(
                &guard,
                visible,
                self.settings.look_ahead_months,
                self.settings.options.zone,
                now,
                self.settings.options.horizon_days,
            );
            *guard = plan.cache;
            plan.requests
        };
        debug!(
            listing = %self.listing,
            visible = %visible,
            issued = requests.len(),
            "scheduling pass"
        );
        requests
            .into_iter()
            .map(|request| self.spawn_fetch(request))
            .collect()
    }

    fn spawn_fetch(&self, request: FetchRequest) -> JoinHandle<()> {
        let listing = self.listing;
        let zone = self.settings.options.zone;
        let fetcher = self.fetcher.clone();

        metrics::counter!(crate::observability::FETCHES_TOTAL).increment(1);
        metrics::gauge!(crate::observability::FETCHES_IN_FLIGHT).increment(1.0);
        let in_flight = InFlight {
            listing,
            month: request.month,
            cache: self.cache.clone(),
            settled: false,
        };

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let result = fetcher
                .fetch_time_slots(listing, request.start, request.end, zone)
                .await;
            metrics::histogram!(crate::observability::FETCH_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());

            let entry = match result {
                Ok(slots) => {
                    let slots = sanitize(slots, listing, request.month);
                    info!(%listing, month = %request.month, slots = slots.len(), "month fetched");
                    MonthEntry::fetched_within(slots, request.start, request.end)
                }
                Err(error) => {
                    warn!(%listing, month = %request.month, "month fetch failed: {error}");
                    metrics::counter!(crate::observability::FETCH_FAILURES_TOTAL).increment(1);
                    MonthEntry::Failed { error }
                }
            };

            // Merged even if the viewer has paged away from this month.
            in_flight.settle(entry).await;
        })
    }

    /// Resolution pass over the current snapshot.
    pub async fn resolve(&self, selection: &Selection, now: Instant) -> Resolution {
        metrics::counter!(
            crate::observability::RESOLUTION_PASSES_TOTAL,
            "unit_type" => self.settings.unit_type.as_str()
        )
        .increment(1);
        let snapshot = self.snapshot().await;
        Resolution::new(
            &snapshot,
            selection,
            self.settings.unit_type,
            &self.settings.options,
            now,
        )
    }
}

/// One outstanding month fetch. Dropped unsettled (the task panicked or was
/// aborted), it marks the month `Failed` so the next pass retries it.
struct InFlight {
    listing: ListingId,
    month: MonthId,
    cache: Arc<RwLock<SlotCache>>,
    settled: bool,
}

impl InFlight {
    async fn settle(mut self, entry: MonthEntry) {
        let mut guard = self.cache.write().await;
        let merged = store::merge(&guard, self.month, entry);
        *guard = merged;
        self.settled = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::gauge!(crate::observability::FETCHES_IN_FLIGHT).decrement(1.0);
        if self.settled {
            return;
        }
        warn!(listing = %self.listing, month = %self.month, "month fetch ended without a result");
        match self.cache.try_write() {
            Ok(mut guard) => mark_interrupted(&mut guard, self.month),
            Err(_) => {
                let cache = self.cache.clone();
                let month = self.month;
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        let mut guard = cache.write().await;
                        mark_interrupted(&mut guard, month);
                    });
                }
            }
        }
    }
}

fn mark_interrupted(cache: &mut SlotCache, month: MonthId) {
    if store::get(cache, month).is_some_and(MonthEntry::fetch_in_progress) {
        *cache = store::merge(
            cache,
            month,
            MonthEntry::Failed {
                error: FetchError::Interrupted,
            },
        );
    }
}

/// Drop inverted slots and cap the month's size.
fn sanitize(mut slots: Vec<TimeSlot>, listing: ListingId, month: MonthId) -> Vec<TimeSlot> {
    let before = slots.len();
    slots.retain(|s| s.start < s.end);
    if slots.len() != before {
        warn!(%listing, %month, dropped = before - slots.len(), "discarded inverted time slots");
    }
    if slots.len() > MAX_SLOTS_PER_MONTH {
        warn!(%listing, %month, received = slots.len(), "truncating oversized month");
        slots.truncate(MAX_SLOTS_PER_MONTH);
    }
    slots
}

/// Serves slots from a JSON array of [`TimeSlot`] on disk.
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SlotFetcher for FileFetcher {
    async fn fetch_time_slots(
        &self,
        _listing: ListingId,
        start: Instant,
        end: Instant,
        _zone: Tz,
    ) -> Result<Vec<TimeSlot>, FetchError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| FetchError::Transport(format!("{}: {e}", self.path.display())))?;
        let slots: Vec<TimeSlot> =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(slots
            .into_iter()
            .filter(|s| s.overlaps(start, end))
            .collect())
    }
}
