use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finscope_core::advisor::{
    AdviceRequest, Advisor, DraftRequest, GeneratedRecommendations, ScenarioDraft,
};
use finscope_core::analysis::analyze;
use finscope_core::domain::profile::FinancialProfile;
use finscope_core::domain::recommendation::Recommendation;
use finscope_core::domain::result::SavedScenarioResult;
use finscope_core::domain::scenario::ScenarioDefinition;
use finscope_core::domain::snapshot::AnalysisSnapshot;
use finscope_core::storage::{HistoryStore, InMemoryHistoryStore, PgHistoryStore};
use finscope_core::tracker::{self, AppliedHistory};

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 200;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finscope_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let store: Arc<dyn HistoryStore> = match connect_pool(&settings).await {
        Some(pool) => Arc::new(PgHistoryStore::new(pool)),
        None => Arc::new(InMemoryHistoryStore::new()),
    };

    let advisor = match Advisor::from_settings(&settings) {
        Ok(advisor) => advisor,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "advisory client unavailable; serving standard recommendations only");
            Advisor::rule_based_only()
        }
    };

    let state = AppState { advisor, store };
    let app = router(state).layer(TraceLayer::new_for_http());

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

/// Postgres when configured and migrated; otherwise `None` and the API keeps
/// history in memory (degraded mode).
async fn connect_pool(settings: &finscope_core::config::Settings) -> Option<PgPool> {
    let db_url = match settings.require_database_url() {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; keeping history in memory");
            return None;
        }
    };

    match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
    {
        Ok(pool) => match finscope_core::storage::migrate(&pool).await {
            Ok(()) => Some(pool),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "db migrations failed; keeping history in memory");
                None
            }
        },
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; keeping history in memory");
            None
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/snapshot", post(compute_snapshot))
        .route("/v1/recommendations", post(generate_recommendations))
        .route("/v1/scenarios/draft", post(draft_scenario))
        .route("/v1/apply", post(apply_recommendations))
        .route("/v1/history", get(list_history))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    advisor: Advisor,
    store: Arc<dyn HistoryStore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotBody {
    profile: FinancialProfile,
    scenario: ScenarioDefinition,
    #[serde(default)]
    applied_history: AppliedHistory,
    #[serde(default)]
    selected: Vec<Recommendation>,
}

async fn compute_snapshot(
    Json(body): Json<SnapshotBody>,
) -> Result<Json<AnalysisSnapshot>, StatusCode> {
    analyze(
        &body.profile,
        &body.scenario,
        body.applied_history.as_slice(),
        &body.selected,
    )
    .map(Json)
    .map_err(|e| {
        tracing::warn!(error = %e, "rejected snapshot input");
        StatusCode::UNPROCESSABLE_ENTITY
    })
}

async fn generate_recommendations(
    State(state): State<AppState>,
    Json(request): Json<AdviceRequest>,
) -> Json<GeneratedRecommendations> {
    Json(state.advisor.generate(&request).await)
}

async fn draft_scenario(
    State(state): State<AppState>,
    Json(request): Json<DraftRequest>,
) -> Result<Json<ScenarioDraft>, StatusCode> {
    state
        .advisor
        .draft_scenario(&request)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(error = %e, "rejected scenario draft input");
            StatusCode::UNPROCESSABLE_ENTITY
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyBody {
    profile: FinancialProfile,
    scenario: ScenarioDefinition,
    #[serde(default)]
    applied_history: AppliedHistory,
    /// The offered list; entries with `checked = true` are applied.
    recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyResponse {
    result: Option<SavedScenarioResult>,
    applied_history: AppliedHistory,
    /// Regenerated from the new baseline; absent when nothing was applied.
    next: Option<GeneratedRecommendations>,
}

async fn apply_recommendations(
    State(state): State<AppState>,
    Json(body): Json<ApplyBody>,
) -> Result<Json<ApplyResponse>, StatusCode> {
    let ApplyBody {
        profile,
        scenario,
        mut applied_history,
        recommendations,
    } = body;
    let selected: Vec<Recommendation> = recommendations
        .iter()
        .filter(|r| r.is_checked())
        .cloned()
        .collect();

    let result = tracker::apply_selection(
        state.store.as_ref(),
        &profile,
        &scenario,
        &mut applied_history,
        &recommendations,
        &selected,
    )
    .await
    .map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "apply failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let next = match result {
        Some(_) => {
            let request = AdviceRequest {
                projected_balance: tracker::running_baseline(&profile, &scenario, &applied_history),
                exclude_texts: applied_history.texts(),
                profile,
                scenario,
            };
            Some(state.advisor.generate(&request).await)
        }
        None => None,
    };

    Ok(Json(ApplyResponse {
        result,
        applied_history,
        next,
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SavedScenarioResult>>, StatusCode> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    state.store.list(limit).await.map(Json).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &finscope_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
