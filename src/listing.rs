use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::config::ListingSettings;
use crate::engine::EngineError;
use crate::fetch::{FetchCoordinator, SlotFetcher};
use crate::limits::MAX_LISTINGS;
use crate::model::ListingId;

/// Manages per-listing coordinators. Each listing gets its own slot cache,
/// all sharing one fetcher.
pub struct ListingManager {
    coordinators: DashMap<ListingId, Arc<FetchCoordinator>>,
    fetcher: Arc<dyn SlotFetcher>,
    defaults: ListingSettings,
}

impl ListingManager {
    pub fn new(fetcher: Arc<dyn SlotFetcher>, defaults: ListingSettings) -> Self {
        Self {
            coordinators: DashMap::new(),
            fetcher,
            defaults,
        }
    }

    /// Get or lazily create the coordinator for `listing` with default settings.
    pub fn get_or_create(&self, listing: ListingId) -> Result<Arc<FetchCoordinator>, EngineError> {
        self.get_or_create_with(listing, self.defaults.clone())
    }

    /// Settings only apply when the coordinator is created by this call.
    pub fn get_or_create_with(
        &self,
        listing: ListingId,
        settings: ListingSettings,
    ) -> Result<Arc<FetchCoordinator>, EngineError> {
        if let Some(existing) = self.coordinators.get(&listing) {
            return Ok(existing.value().clone());
        }
        if self.coordinators.len() >= MAX_LISTINGS {
            return Err(EngineError::LimitExceeded("too many listings"));
        }
        let coordinator = self
            .coordinators
            .entry(listing)
            .or_insert_with(|| {
                info!(%listing, unit_type = settings.unit_type.as_str(), "tracking listing");
                Arc::new(FetchCoordinator::new(listing, settings, self.fetcher.clone()))
            })
            .value()
            .clone();
        metrics::gauge!(crate::observability::LISTINGS_ACTIVE).set(self.coordinators.len() as f64);
        Ok(coordinator)
    }

    pub fn get(&self, listing: &ListingId) -> Option<Arc<FetchCoordinator>> {
        self.coordinators.get(listing).map(|e| e.value().clone())
    }

    /// Forget a listing's cache, e.g. when its availability was edited.
    pub fn remove(&self, listing: &ListingId) -> bool {
        let removed = self.coordinators.remove(listing).is_some();
        metrics::gauge!(crate::observability::LISTINGS_ACTIVE).set(self.coordinators.len() as f64);
        removed
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }
}
