use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use predsync_core::display::{format_period, prediction_probability, RiskCategory};
use predsync_core::domain::prediction::{
    CurrentUser, DatasetKey, DatasetKind, Prediction, Role, Scope,
};
use predsync_core::identity::SessionIdentity;
use predsync_core::ingest::endpoints::HttpPredictionEndpoints;
use predsync_core::store::{
    FetchOutcome, FetchStrategy, PredictionStore, SkipReason, StoreOptions, StoreSummary,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = predsync_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let predictions = match HttpPredictionEndpoints::from_settings(&settings) {
        Ok(endpoints) => {
            let identity = Arc::new(SessionIdentity::new());
            let store = Arc::new(PredictionStore::new(
                Arc::new(endpoints),
                identity.clone(),
                StoreOptions::from_settings(&settings),
            ));
            Some(Predictions { store, identity })
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "prediction endpoints unavailable; starting API in degraded mode");
            None
        }
    };

    let state = AppState { predictions };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/state", get(get_state))
        .route("/fetch", post(fetch))
        .route("/refetch", post(refetch))
        .route("/invalidate", post(invalidate))
        .route("/reset", post(reset))
        .route("/clear-error", post(clear_error))
        .route("/scope", put(set_scope))
        .route("/predictions/:kind", get(get_visible).post(add_prediction))
        .route(
            "/predictions/:kind/:id",
            put(replace_prediction).delete(remove_prediction),
        )
        .route("/session", post(login).delete(logout))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct Predictions {
    store: Arc<PredictionStore>,
    identity: Arc<SessionIdentity>,
}

#[derive(Clone)]
struct AppState {
    predictions: Option<Predictions>,
}

impl AppState {
    fn predictions(&self) -> Result<&Predictions, StatusCode> {
        self.predictions
            .as_ref()
            .ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }

    fn store(&self) -> Result<&PredictionStore, StatusCode> {
        Ok(self.predictions()?.store.as_ref())
    }
}

fn parse_kind(raw: &str) -> Result<DatasetKind, StatusCode> {
    raw.parse().map_err(|_| StatusCode::BAD_REQUEST)
}

async fn get_state(State(state): State<AppState>) -> Result<Json<StoreSummary>, StatusCode> {
    Ok(Json(state.store()?.summary()))
}

#[derive(Debug, Serialize)]
struct ApiPrediction {
    #[serde(flatten)]
    prediction: Prediction,
    display_probability: f64,
    risk: RiskCategory,
    risk_badge_class: &'static str,
    period: String,
}

impl From<Prediction> for ApiPrediction {
    fn from(prediction: Prediction) -> Self {
        let risk = RiskCategory::of(&prediction);
        Self {
            display_probability: prediction_probability(&prediction),
            risk,
            risk_badge_class: risk.badge_class(),
            period: format_period(&prediction),
            prediction,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VisibleQuery {
    scope: Option<Scope>,
}

async fn get_visible(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<VisibleQuery>,
) -> Result<Json<Vec<ApiPrediction>>, StatusCode> {
    let store = state.store()?;
    let kind = parse_kind(&kind)?;

    let records = match query.scope {
        Some(scope) => store.get_visible_for(kind, scope),
        None => store.get_visible(kind),
    };

    Ok(Json(records.into_iter().map(ApiPrediction::from).collect()))
}

#[derive(Debug, Serialize)]
struct ApiFetchResult {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<FetchStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    state: StoreSummary,
}

fn fetch_result(store: &PredictionStore, outcome: FetchOutcome) -> ApiFetchResult {
    let (outcome, strategy, error) = match outcome {
        FetchOutcome::Skipped(SkipReason::InFlight) => ("skipped_in_flight", None, None),
        FetchOutcome::Skipped(SkipReason::Fresh) => ("skipped_fresh", None, None),
        FetchOutcome::Committed(strategy) => ("committed", Some(strategy), None),
        FetchOutcome::AuthExpired => ("auth_expired", None, None),
        FetchOutcome::Failed(err) => ("failed", None, Some(err.to_string())),
        FetchOutcome::Discarded => ("discarded", None, None),
    };
    ApiFetchResult {
        outcome,
        strategy,
        error,
        state: store.summary(),
    }
}

#[derive(Debug, Deserialize)]
struct FetchQuery {
    #[serde(default)]
    force: bool,
}

async fn fetch(
    State(state): State<AppState>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<ApiFetchResult>, StatusCode> {
    let store = state.store()?;
    let outcome = store.request_fetch(query.force).await;
    Ok(Json(fetch_result(store, outcome)))
}

async fn refetch(State(state): State<AppState>) -> Result<Json<ApiFetchResult>, StatusCode> {
    let store = state.store()?;
    let outcome = store.refetch().await;
    Ok(Json(fetch_result(store, outcome)))
}

async fn invalidate(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.store()?.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

async fn reset(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.store()?.reset();
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_error(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.store()?.clear_error();
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ScopeBody {
    scope: Scope,
}

async fn set_scope(
    State(state): State<AppState>,
    Json(body): Json<ScopeBody>,
) -> Result<StatusCode, StatusCode> {
    state.store()?.set_active_scope(body.scope);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ApiAdded {
    id: String,
    dataset: DatasetKey,
}

async fn add_prediction(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<(StatusCode, Json<ApiAdded>), StatusCode> {
    let store = state.store()?;
    let kind = parse_kind(&kind)?;

    let obj = body.as_object_mut().ok_or(StatusCode::BAD_REQUEST)?;
    let has_id = obj
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if !has_id {
        obj.insert("id".to_string(), Value::String(format!("temp-{}", Uuid::new_v4())));
    }

    let record: Prediction = serde_json::from_value(body).map_err(|e| {
        tracing::debug!(error = %e, "rejected prediction body");
        StatusCode::BAD_REQUEST
    })?;
    let id = record.id.clone();
    let dataset = store.add_local(record, kind);

    Ok((StatusCode::CREATED, Json(ApiAdded { id, dataset })))
}

async fn replace_prediction(
    State(state): State<AppState>,
    Path((kind, placeholder_id)): Path<(String, String)>,
    Json(record): Json<Prediction>,
) -> Result<StatusCode, StatusCode> {
    let store = state.store()?;
    let kind = parse_kind(&kind)?;

    if store.replace_local(record, kind, &placeholder_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn remove_prediction(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    let store = state.store()?;
    let kind = parse_kind(&kind)?;

    match store.remove_local(&id, kind) {
        0 => Err(StatusCode::NOT_FOUND),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    user_id: String,
    role: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<StatusCode, StatusCode> {
    if body.user_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let role = body.role.as_deref().map(Role::parse);
    state
        .predictions()?
        .identity
        .login(CurrentUser::new(body.user_id, role));
    Ok(StatusCode::NO_CONTENT)
}

async fn logout(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.predictions()?.identity.logout();
    Ok(StatusCode::NO_CONTENT)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &predsync_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
