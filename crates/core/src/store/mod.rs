pub mod error;
mod fetch;
mod mutate;
pub mod scope;
pub mod snapshot;
mod view;


use crate::config::Settings;
use crate::domain::pagination::PaginationState;
use crate::domain::prediction::{DatasetKey, DatasetKind, Prediction, Scope};
use crate::identity::IdentityProvider;
use crate::ingest::endpoints::PredictionEndpoints;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use error::FetchError;
pub use fetch::{FetchOutcome, SkipReason};
pub use scope::FetchStrategy;
pub use snapshot::{CacheSnapshot, FetchState, StoreSummary};

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub page_size: u32,
    pub freshness_window: chrono::Duration,
}

impl StoreOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            page_size: settings.page_size,
            freshness_window: settings.freshness_window(),
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub struct PredictionStore {
    state: Arc<Mutex<CacheSnapshot>>,
    endpoints: Arc<dyn PredictionEndpoints>,
    identity: Arc<dyn IdentityProvider>,
    options: StoreOptions,
}

impl PredictionStore {
    pub fn new(
        endpoints: Arc<dyn PredictionEndpoints>,
        identity: Arc<dyn IdentityProvider>,
        options: StoreOptions,
    ) -> Self {
        let state = Arc::new(Mutex::new(CacheSnapshot::empty(options.page_size)));

        let weak = Arc::downgrade(&state);
        identity.on_logout(Arc::new(move || {
            if let Some(state) = weak.upgrade() {
                tracing::info!("logout detected; clearing prediction cache");
                lock_snapshot(&state).reset();
            }
        }));

        Self {
            state,
            endpoints,
            identity,
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheSnapshot> {
        lock_snapshot(&self.state)
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.lock().clone()
    }

    pub fn summary(&self) -> StoreSummary {
        self.lock().summary()
    }

    pub fn fetch_state(&self) -> FetchState {
        self.lock().fetch_state()
    }

    pub fn is_fetching(&self) -> bool {
        self.lock().is_fetching()
    }

    pub fn last_error(&self) -> Option<FetchError> {
        self.lock().last_error().cloned()
    }

    pub fn pagination(&self, key: DatasetKey) -> PaginationState {
        self.lock().pagination(key)
    }

    pub fn active_scope(&self) -> Scope {
        self.lock().active_scope()
    }

    pub fn set_active_scope(&self, scope: Scope) {
        let mut state = self.lock();
        tracing::debug!(from = %state.active_scope, to = %scope, "switching active scope");
        state.active_scope = scope;
    }

    pub fn get_visible(&self, kind: DatasetKind) -> Vec<Prediction> {
        self.lock().visible(kind).to_vec()
    }

    pub fn get_visible_for(&self, kind: DatasetKind, scope: Scope) -> Vec<Prediction> {
        self.lock().visible_for(kind, scope).to_vec()
    }

    pub fn invalidate(&self) {
        tracing::debug!("invalidating prediction cache");
        self.lock().invalidate();
    }

    pub fn reset(&self) {
        tracing::info!("resetting prediction cache");
        self.lock().reset();
    }

    pub fn clear_error(&self) {
        self.lock().last_error = None;
    }

    pub fn add_local(&self, record: Prediction, kind: DatasetKind) -> DatasetKey {
        let company = record.company_symbol.clone();
        let key = self.lock().add_local(record, kind);
        tracing::info!(dataset = %key, %company, "added prediction to cache");
        key
    }

    pub fn replace_local(
        &self,
        record: Prediction,
        kind: DatasetKind,
        placeholder_id: &str,
    ) -> bool {
        let confirmed_id = record.id.clone();
        let replaced = self.lock().replace_local(record, kind, placeholder_id);
        if replaced {
            tracing::info!(%kind, placeholder_id, %confirmed_id, "replaced placeholder prediction");
        } else {
            tracing::debug!(%kind, placeholder_id, "placeholder not found; nothing replaced");
        }
        replaced
    }

    pub fn remove_local(&self, id: &str, kind: DatasetKind) -> usize {
        let removed = self.lock().remove_local(id, kind);
        tracing::info!(%kind, id, removed, "removed prediction from cache");
        removed
    }
}

fn lock_snapshot(state: &Mutex<CacheSnapshot>) -> MutexGuard<'_, CacheSnapshot> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
