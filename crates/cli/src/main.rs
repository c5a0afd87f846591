use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finscope_core::advisor::Advisor;
use finscope_core::catalog::ScenarioCatalog;
use finscope_core::domain::profile::FinancialProfile;
use finscope_core::domain::scenario::ScenarioDefinition;
use finscope_core::projection::projection_series;
use finscope_core::session::ScenarioSession;
use finscope_core::storage::{HistoryStore, InMemoryHistoryStore, PgHistoryStore};

const CHART_YEARS: u32 = 5;
const CHART_STRIDE_MONTHS: u32 = 6;

/// Runs one scenario analysis cycle and prints the results as JSON.
#[derive(Debug, Parser)]
#[command(name = "finscope")]
struct Args {
    /// Financial profile JSON file.
    #[arg(long)]
    profile: PathBuf,

    /// Scenario definition JSON file.
    #[arg(long, conflicts_with_all = ["catalog", "preset"])]
    scenario: Option<PathBuf>,

    /// Scenario catalog JSON file (id -> scenario definition).
    #[arg(long, requires = "preset")]
    catalog: Option<PathBuf>,

    /// Preset id within --catalog.
    #[arg(long, requires = "catalog")]
    preset: Option<String>,

    /// Recommendation ids to select. Repeatable.
    #[arg(long = "select")]
    select: Vec<String>,

    /// Apply the selected recommendations and save the result.
    #[arg(long)]
    apply: bool,

    /// Skip the advisory service and use the rule engine only.
    #[arg(long)]
    standard_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finscope_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "analysis run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &finscope_core::config::Settings, args: Args) -> anyhow::Result<()> {
    let profile: FinancialProfile = read_json(&args.profile)?;
    let scenario = resolve_scenario(&args)?;

    let advisor = if args.standard_only {
        Advisor::rule_based_only()
    } else {
        Advisor::from_settings(settings)?
    };
    let store = open_store(settings, args.apply).await?;

    let mut session = ScenarioSession::new(profile, advisor, store);
    session.run_scenario(scenario);
    session.settled_recommendations().await;

    for id in &args.select {
        anyhow::ensure!(
            session.toggle_recommendation(id),
            "no recommendation with id {id:?} in this run"
        );
    }

    let snapshot = session.snapshot()?;
    let recommendations = session.recommendations();
    let series = snapshot.map(|s| {
        projection_series(
            s.with_recommendations.balance,
            s.with_recommendations.monthly_savings,
            session.profile().annual_return_rate(),
            CHART_YEARS,
            CHART_STRIDE_MONTHS,
        )
        .into_iter()
        .map(|p| serde_json::json!({"label": p.label(), "monthIndex": p.month_index, "balance": p.balance}))
        .collect::<Vec<_>>()
    });

    let saved = if args.apply {
        let saved = session.apply().await?;
        if saved.is_none() {
            tracing::warn!("--apply given without --select; nothing applied");
        }
        saved
    } else {
        None
    };
    let next = if saved.is_some() {
        Some(session.settled_recommendations().await)
    } else {
        None
    };

    let out = serde_json::json!({
        "snapshot": snapshot,
        "recommendations": recommendations,
        "projection": series,
        "saved": saved,
        "nextRecommendations": next,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn resolve_scenario(args: &Args) -> anyhow::Result<ScenarioDefinition> {
    if let Some(path) = &args.scenario {
        return read_json(path);
    }
    match (&args.catalog, &args.preset) {
        (Some(catalog), Some(preset)) => {
            let catalog = ScenarioCatalog::load(catalog)?;
            Ok(catalog.require(preset)?.clone())
        }
        _ => anyhow::bail!("pass --scenario, or --catalog with --preset"),
    }
}

/// Saved results go to Postgres when applying with DATABASE_URL set.
async fn open_store(
    settings: &finscope_core::config::Settings,
    applying: bool,
) -> anyhow::Result<Arc<dyn HistoryStore>> {
    let Some(db_url) = settings.database_url.as_deref().filter(|_| applying) else {
        return Ok(Arc::new(InMemoryHistoryStore::new()));
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    finscope_core::storage::migrate(&pool).await?;
    Ok(Arc::new(PgHistoryStore::new(pool)))
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
