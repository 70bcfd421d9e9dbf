use crate::domain::pagination::PaginationState;
use crate::domain::prediction::{DatasetKey, Prediction, Scope};
use crate::store::error::FetchError;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchState {
    Idle,
    Fetching,
    Error,
    Ready,
}

impl FetchState {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchState::Idle => "idle",
            FetchState::Fetching => "fetching",
            FetchState::Error => "error",
            FetchState::Ready => "ready",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    datasets: [Vec<Prediction>; 4],
    pagination: [PaginationState; 4],
    page_size: u32,
    pub(crate) last_fetched: Option<DateTime<Utc>>,
    pub(crate) initialized: bool,
    pub(crate) fetching: bool,
    pub(crate) last_error: Option<FetchError>,
    pub(crate) active_scope: Scope,
    // Bumped by every reset; a fetch cycle may only commit into the generation it started in.
    pub(crate) generation: u64,
}

impl CacheSnapshot {
    pub fn empty(page_size: u32) -> Self {
        Self {
            datasets: Default::default(),
            pagination: [PaginationState::new(page_size); 4],
            page_size,
            last_fetched: None,
            initialized: false,
            fetching: false,
            last_error: None,
            active_scope: Scope::Personal,
            generation: 0,
        }
    }

    pub fn dataset(&self, key: DatasetKey) -> &[Prediction] {
        &self.datasets[key.index()]
    }

    pub(crate) fn dataset_mut(&mut self, key: DatasetKey) -> &mut Vec<Prediction> {
        &mut self.datasets[key.index()]
    }

    pub(crate) fn replace_dataset(&mut self, key: DatasetKey, records: Vec<Prediction>) {
        self.datasets[key.index()] = records;
    }

    pub fn pagination(&self, key: DatasetKey) -> PaginationState {
        self.pagination[key.index()]
    }

    pub(crate) fn set_pagination(&mut self, key: DatasetKey, state: PaginationState) {
        self.pagination[key.index()] = state;
    }

    pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.last_fetched
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn active_scope(&self) -> Scope {
        self.active_scope
    }

    pub fn fetch_state(&self) -> FetchState {
        if self.fetching {
            FetchState::Fetching
        } else if self.last_error.is_some() {
            FetchState::Error
        } else if self.initialized {
            FetchState::Ready
        } else {
            FetchState::Idle
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        match (self.initialized, self.last_fetched) {
            (true, Some(at)) => now.signed_duration_since(at) < window,
            _ => false,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.last_fetched = None;
        self.initialized = false;
    }

    pub(crate) fn reset(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self::empty(self.page_size);
        self.generation = generation;
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            state: self.fetch_state(),
            is_loading: self.fetching,
            is_initialized: self.initialized,
            active_scope: self.active_scope,
            last_error: self.last_error.as_ref().map(ToString::to_string),
            last_fetched: self.last_fetched,
            datasets: DatasetKey::ALL
                .iter()
                .map(|&key| DatasetSummary {
                    dataset: key.to_string(),
                    count: self.dataset(key).len(),
                    pagination: self.pagination(key),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub state: FetchState,
    pub is_loading: bool,
    pub is_initialized: bool,
    pub active_scope: Scope,
    pub last_error: Option<String>,
    pub last_fetched: Option<DateTime<Utc>>,
    pub datasets: Vec<DatasetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub dataset: String,
    pub count: usize,
    pub pagination: PaginationState,
}
