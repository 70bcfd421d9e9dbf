use crate::domain::pagination::{PageMeta, PaginationState};
use crate::domain::prediction::{CurrentUser, DatasetKey, Prediction, Role, Scope};
use crate::ingest::endpoints::EndpointError;
use crate::ingest::normalize::normalize_all;
use crate::ingest::types::ResponsePayload;
use crate::store::error::FetchError;
use crate::store::scope::{
    resolve_default_scope, resolve_fetch_strategy, resolve_record_scope, FetchStrategy,
};
use crate::store::snapshot::CacheSnapshot;
use crate::store::{lock_snapshot, PredictionStore};
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Skipped(SkipReason),
    Committed(FetchStrategy),
    AuthExpired,
    Failed(FetchError),
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Fresh,
}

/// Releases the in-flight flag once, unless the snapshot was reset since the cycle started.
struct InFlight<'a> {
    state: &'a Mutex<CacheSnapshot>,
    generation: u64,
    released: bool,
}

impl InFlight<'_> {
    fn finish(mut self, commit: impl FnOnce(&mut CacheSnapshot)) -> bool {
        self.released = true;
        let mut state = lock_snapshot(self.state);
        if state.generation != self.generation {
            return false;
        }
        state.fetching = false;
        commit(&mut state);
        true
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = lock_snapshot(self.state);
        if state.generation == self.generation {
            state.fetching = false;
        }
    }
}

struct LoadedDataset {
    key: DatasetKey,
    records: Vec<Prediction>,
    meta: PageMeta,
}

impl PredictionStore {
    pub async fn request_fetch(&self, force_refresh: bool) -> FetchOutcome {
        self.request_fetch_at(force_refresh, Utc::now()).await
    }

    pub async fn refetch(&self) -> FetchOutcome {
        self.request_fetch(true).await
    }

    pub async fn request_fetch_at(&self, force_refresh: bool, now: DateTime<Utc>) -> FetchOutcome {
        let (user, generation, pages) = {
            let mut state = self.lock();

            if state.fetching {
                tracing::debug!("predictions already being fetched; skipping duplicate call");
                return FetchOutcome::Skipped(SkipReason::InFlight);
            }

            if !force_refresh && state.is_fresh(now, self.options.freshness_window) {
                tracing::debug!(
                    last_fetched = ?state.last_fetched,
                    "using cached predictions; still within freshness window"
                );
                return FetchOutcome::Skipped(SkipReason::Fresh);
            }

            let Some(user) = self.identity.current_user() else {
                tracing::warn!("prediction fetch requested without an authenticated user");
                state.last_error = Some(FetchError::NotAuthenticated);
                return FetchOutcome::Failed(FetchError::NotAuthenticated);
            };

            state.fetching = true;
            state.last_error = None;
            let pages = DatasetKey::ALL.map(|key| state.pagination(key));
            (user, state.generation, pages)
        };

        let guard = InFlight {
            state: &self.state,
            generation,
            released: false,
        };

        let strategy = resolve_fetch_strategy(user.role.as_ref());
        tracing::info!(
            user_id = %user.id,
            role = user.role.as_ref().map(Role::as_str),
            ?strategy,
            calls = strategy.call_count(),
            force_refresh,
            "fetching predictions"
        );

        let loaded = match strategy {
            FetchStrategy::OnlyPlatform => self.load_platform_only(&pages).await,
            FetchStrategy::ScopedPlusPlatform => self.load_scoped_plus_platform(&pages).await,
        };

        match loaded {
            Ok(raw) => self.commit(guard, strategy, &user, raw, now),
            Err(err) => fail(guard, err),
        }
    }

    async fn load_platform_only(
        &self,
        pages: &[PaginationState; 4],
    ) -> anyhow::Result<Vec<(DatasetKey, Value)>> {
        let pa = pages[DatasetKey::PLATFORM_ANNUAL.index()];
        let pq = pages[DatasetKey::PLATFORM_QUARTERLY.index()];

        let (platform_annual, platform_quarterly) = tokio::try_join!(
            self.endpoints
                .get_platform_annual(pa.current_page(), pa.page_size()),
            self.endpoints
                .get_platform_quarterly(pq.current_page(), pq.page_size()),
        )?;

        Ok(vec![
            (DatasetKey::PLATFORM_ANNUAL, platform_annual),
            (DatasetKey::PLATFORM_QUARTERLY, platform_quarterly),
        ])
    }

    async fn load_scoped_plus_platform(
        &self,
        pages: &[PaginationState; 4],
    ) -> anyhow::Result<Vec<(DatasetKey, Value)>> {
        let sa = pages[DatasetKey::SCOPED_ANNUAL.index()];
        let sq = pages[DatasetKey::SCOPED_QUARTERLY.index()];
        let pa = pages[DatasetKey::PLATFORM_ANNUAL.index()];
        let pq = pages[DatasetKey::PLATFORM_QUARTERLY.index()];

        let (scoped_annual, scoped_quarterly, platform_annual, platform_quarterly) = tokio::try_join!(
            self.endpoints
                .get_scoped_annual(sa.current_page(), sa.page_size()),
            self.endpoints
                .get_scoped_quarterly(sq.current_page(), sq.page_size()),
            self.endpoints
                .get_platform_annual(pa.current_page(), pa.page_size()),
            self.endpoints
                .get_platform_quarterly(pq.current_page(), pq.page_size()),
        )?;

        Ok(vec![
            (DatasetKey::SCOPED_ANNUAL, scoped_annual),
            (DatasetKey::SCOPED_QUARTERLY, scoped_quarterly),
            (DatasetKey::PLATFORM_ANNUAL, platform_annual),
            (DatasetKey::PLATFORM_QUARTERLY, platform_quarterly),
        ])
    }

    fn commit(
        &self,
        guard: InFlight<'_>,
        strategy: FetchStrategy,
        user: &CurrentUser,
        raw: Vec<(DatasetKey, Value)>,
        now: DateTime<Utc>,
    ) -> FetchOutcome {
        let role = user.role.as_ref();
        let current_year = now.year();

        let loaded: Vec<LoadedDataset> = raw
            .into_iter()
            .map(|(key, body)| {
                let payload = ResponsePayload::decode(body);
                let meta = payload.meta();
                let records = normalize_all(payload.into_records(), key.kind, current_year, |r| {
                    resolve_record_scope(r, role, key.source)
                });
                LoadedDataset { key, records, meta }
            })
            .collect();

        let counts: Vec<(String, usize)> = loaded
            .iter()
            .map(|d| (d.key.to_string(), d.records.len()))
            .collect();

        let active_scope = match strategy {
            FetchStrategy::OnlyPlatform => Scope::System,
            FetchStrategy::ScopedPlusPlatform => resolve_default_scope(role),
        };

        let committed = guard.finish(|state| {
            if strategy == FetchStrategy::OnlyPlatform {
                state.replace_dataset(DatasetKey::SCOPED_ANNUAL, Vec::new());
                state.replace_dataset(DatasetKey::SCOPED_QUARTERLY, Vec::new());
            }
            for dataset in loaded {
                let pagination = state
                    .pagination(dataset.key)
                    .after_load(dataset.meta, dataset.records.len());
                state.set_pagination(dataset.key, pagination);
                state.replace_dataset(dataset.key, dataset.records);
            }
            state.active_scope = active_scope;
            state.last_fetched = Some(now);
            state.initialized = true;
            state.last_error = None;
        });

        if !committed {
            tracing::info!(
                ?strategy,
                "prediction cache was reset during fetch; discarding results"
            );
            return FetchOutcome::Discarded;
        }

        tracing::info!(?strategy, %active_scope, ?counts, "prediction cache updated");
        FetchOutcome::Committed(strategy)
    }
}

fn fail(guard: InFlight<'_>, err: anyhow::Error) -> FetchOutcome {
    if is_auth_failure(&err) {
        tracing::warn!(error = %err, "auth error while fetching predictions; keeping cached data");
        if !guard.finish(|state| state.last_error = None) {
            return FetchOutcome::Discarded;
        }
        return FetchOutcome::AuthExpired;
    }

    let error = FetchError::fetch_failed(format!("{err:#}"));
    tracing::error!(error = %err, "failed to fetch predictions");
    let recorded = error.clone();
    if !guard.finish(move |state| state.last_error = Some(recorded)) {
        return FetchOutcome::Discarded;
    }
    FetchOutcome::Failed(error)
}

// Endpoint errors are judged by status only; their detail is a server body.
pub(crate) fn is_auth_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<EndpointError>() {
        Some(endpoint) => endpoint.is_unauthorized(),
        None => cause.to_string().to_ascii_lowercase().contains("unauthorized"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classifies_401_through_context_layers() {
        let err = anyhow::Error::new(EndpointError {
            endpoint: "/predictions/annual/system".to_string(),
            status: Some(401),
            detail: "expired".to_string(),
        });
        let wrapped = Err::<(), _>(err).context("loading platform annual").unwrap_err();
        assert!(is_auth_failure(&wrapped));
    }

    #[test]
    fn classifies_unauthorized_message_marker() {
        assert!(is_auth_failure(&anyhow::anyhow!("request unauthorized")));
        assert!(is_auth_failure(&anyhow::anyhow!("401 Unauthorized")));
        assert!(!is_auth_failure(&anyhow::anyhow!("connection refused")));
    }

    #[test]
    fn unauthorized_in_a_server_body_is_not_an_auth_failure() {
        let err = anyhow::Error::new(EndpointError {
            endpoint: "/predictions/annual".to_string(),
            status: Some(500),
            detail: r#"{"detail":"Unauthorized access to model registry"}"#.to_string(),
        });
        assert!(!is_auth_failure(&err));
        let wrapped = Err::<(), _>(err).context("loading scoped annual").unwrap_err();
        assert!(!is_auth_failure(&wrapped));
    }

    #[test]
    fn other_statuses_are_not_auth_failures() {
        let err = anyhow::Error::new(EndpointError {
            endpoint: "/predictions/annual".to_string(),
            status: Some(503),
            detail: "maintenance".to_string(),
        });
        assert!(!is_auth_failure(&err));
    }
}
