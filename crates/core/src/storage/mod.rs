pub mod scenario_results;

pub use scenario_results::PgHistoryStore;

use crate::domain::result::SavedScenarioResult;
use anyhow::Context;
use tokio::sync::Mutex;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Append-only sink for saved scenario results. `list` serves display only;
/// the engine never reads history back for computation.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, result: &SavedScenarioResult) -> anyhow::Result<()>;

    /// Most recent first.
    async fn list(&self, limit: usize) -> anyhow::Result<Vec<SavedScenarioResult>>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    results: Mutex<Vec<SavedScenarioResult>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, result: &SavedScenarioResult) -> anyhow::Result<()> {
        self.results.lock().await.push(result.clone());
        Ok(())
    }

    async fn list(&self, limit: usize) -> anyhow::Result<Vec<SavedScenarioResult>> {
        let results = self.results.lock().await;
        Ok(results.iter().rev().take(limit).cloned().collect())
    }
}
