use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use predsync_core::display::{format_period, prediction_probability, RiskCategory};
use predsync_core::domain::prediction::{CurrentUser, DatasetKind, Prediction, Role, Scope};
use predsync_core::identity::SessionIdentity;
use predsync_core::ingest::endpoints::HttpPredictionEndpoints;
use predsync_core::store::{FetchOutcome, PredictionStore, StoreOptions};

#[derive(Debug, Parser)]
#[command(name = "predsync_worker")]
struct Args {
    /// Identity to fetch as.
    #[arg(long, default_value = "cli")]
    user_id: String,

    /// Role of that identity (user, super_admin, org_admin, org_member, tenant_admin).
    #[arg(long)]
    role: Option<String>,

    /// Ignore the freshness window.
    #[arg(long)]
    force: bool,

    /// Only print one dataset kind (annual or quarterly).
    #[arg(long)]
    kind: Option<String>,

    /// View to print instead of the role's default (personal, organization, system).
    #[arg(long)]
    scope: Option<String>,

    /// Print the summary and records as JSON.
    #[arg(long)]
    json: bool,
}

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

    let args = Args::parse();

    let kinds: Vec<DatasetKind> = match args.kind.as_deref() {
        Some(raw) => vec![raw.parse::<DatasetKind>().context("invalid --kind")?],
        None => vec![DatasetKind::Annual, DatasetKind::Quarterly],
    };
    let scope: Option<Scope> = args
        .scope
        .as_deref()
        .map(str::parse::<Scope>)
        .transpose()
        .context("invalid --scope")?;

    let endpoints = HttpPredictionEndpoints::from_settings(&settings)?;
    let role = args.role.as_deref().map(Role::parse);
    let identity = Arc::new(SessionIdentity::with_user(CurrentUser::new(
        args.user_id.clone(),
        role,
    )));
    let store = PredictionStore::new(
        Arc::new(endpoints),
        identity,
        StoreOptions::from_settings(&settings),
    );

    match store.request_fetch(args.force).await {
        FetchOutcome::Committed(strategy) => {
            tracing::info!(user_id = %args.user_id, ?strategy, "fetch cycle committed");
        }
        FetchOutcome::AuthExpired => {
            let err = anyhow::anyhow!("credentials rejected by prediction endpoints");
            sentry_anyhow::capture_anyhow(&err);
            return Err(err);
        }
        FetchOutcome::Failed(fetch_err) => {
            let err = anyhow::Error::new(fetch_err).context("prediction fetch failed");
            sentry_anyhow::capture_anyhow(&err);
            return Err(err);
        }
        other => {
            tracing::warn!(outcome = ?other, "fetch cycle did not commit");
        }
    }

    if let Some(scope) = scope {
        store.set_active_scope(scope);
    }

    let visible: Vec<(DatasetKind, Vec<Prediction>)> = kinds
        .into_iter()
        .map(|kind| (kind, store.get_visible(kind)))
        .collect();

    if args.json {
        let mut out = serde_json::Map::new();
        out.insert("state".to_string(), serde_json::to_value(store.summary())?);
        for (kind, records) in &visible {
            out.insert(kind.to_string(), serde_json::to_value(records)?);
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let summary = store.summary();
    println!(
        "state={} scope={} last_fetched={}",
        summary.state.as_str(),
        summary.active_scope,
        summary
            .last_fetched
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string()),
    );
    for (kind, records) in &visible {
        println!("\n[{kind}] {} record(s)", records.len());
        for p in records {
            println!(
                "{}\t{}\t{:.4}\t{}",
                p.company_symbol,
                format_period(p),
                prediction_probability(p),
                RiskCategory::of(p),
            );
        }
    }

    Ok(())
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
