use crate::domain::result::{OutcomeStatus, SavedScenarioResult};
use crate::domain::scenario::ImpactPeriod;
use crate::storage::HistoryStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgHistoryStore {
    pool: sqlx::PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

type ResultRow = (
    Uuid,
    String,
    DateTime<Utc>,
    f64,
    String,
    serde_json::Value,
    serde_json::Value,
    serde_json::Value,
    serde_json::Value,
    String,
);

fn from_row(row: ResultRow) -> anyhow::Result<SavedScenarioResult> {
    let (
        id,
        scenario_title,
        run_date,
        total_cost,
        impact_period,
        before_state,
        after_state,
        recommendations,
        applied_recommendations,
        outcome_status,
    ) = row;

    let impact_period = match impact_period.as_str() {
        "one-time" => ImpactPeriod::OneTime,
        "recurring" => ImpactPeriod::Recurring,
        other => anyhow::bail!("invalid impact_period in DB for id={id}: {other}"),
    };
    let outcome_status = OutcomeStatus::parse(&outcome_status)
        .with_context(|| format!("invalid outcome_status in DB for id={id}"))?;

    Ok(SavedScenarioResult {
        id,
        scenario_title,
        run_date,
        total_cost,
        impact_period,
        before_state: serde_json::from_value(before_state)
            .with_context(|| format!("invalid before_state in DB for id={id}"))?,
        after_state: serde_json::from_value(after_state)
            .with_context(|| format!("invalid after_state in DB for id={id}"))?,
        recommendations: serde_json::from_value(recommendations)
            .with_context(|| format!("invalid recommendations in DB for id={id}"))?,
        applied_recommendations: serde_json::from_value(applied_recommendations)
            .with_context(|| format!("invalid applied_recommendations in DB for id={id}"))?,
        outcome_status,
    })
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, result: &SavedScenarioResult) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO saved_scenario_results \
             (id, scenario_title, run_date, total_cost, impact_period, before_state, after_state, \
              recommendations, applied_recommendations, outcome_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(result.id)
        .bind(&result.scenario_title)
        .bind(result.run_date)
        .bind(result.total_cost)
        .bind(result.impact_period.as_str())
        .bind(serde_json::to_value(result.before_state)?)
        .bind(serde_json::to_value(result.after_state)?)
        .bind(serde_json::to_value(&result.recommendations)?)
        .bind(serde_json::to_value(&result.applied_recommendations)?)
        .bind(result.outcome_status.as_str())
        .execute(&self.pool)
        .await
        .context("insert saved_scenario_results failed")?;

        Ok(())
    }

    async fn list(&self, limit: usize) -> anyhow::Result<Vec<SavedScenarioResult>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, ResultRow>(
            "SELECT id, scenario_title, run_date, total_cost, impact_period, before_state, \
                    after_state, recommendations, applied_recommendations, outcome_status \
             FROM saved_scenario_results \
             ORDER BY run_date DESC, created_at DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("select saved_scenario_results failed")?;

        rows.into_iter().map(from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{Priority, Recommendation};
    use crate::domain::result::{AfterState, BeforeState};
    use chrono::TimeZone;
    use serde_json::json;

    fn row(impact_period: &str, outcome: &str) -> ResultRow {
        let rec = Recommendation::new("r1", "Trim subscriptions", 120.0, Priority::Low)
            .unwrap()
            .with_checked(true);
        (
            Uuid::nil(),
            "Job Loss".to_string(),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            45_000.0,
            impact_period.to_string(),
            json!({"totalEquity": 146251.7, "monthlyExpenses": 4285.2, "savingsRate": 42.86}),
            serde_json::to_value(AfterState {
                total_equity: 101_371.7,
                monthly_expenses: 4285.2,
                savings_rate: 42.86,
                projected_equity_1_year: 150_000.0,
                projected_equity_5_year: 300_000.0,
            })
            .unwrap(),
            json!([rec]),
            json!([rec]),
            outcome.to_string(),
        )
    }

    #[test]
    fn decodes_jsonb_columns() {
        let result = from_row(row("one-time", "negative")).unwrap();
        assert_eq!(result.impact_period, ImpactPeriod::OneTime);
        assert_eq!(result.outcome_status, OutcomeStatus::Negative);
        assert_eq!(
            result.before_state,
            BeforeState {
                total_equity: 146_251.7,
                monthly_expenses: 4285.2,
                savings_rate: 42.86,
            }
        );
        assert!(result.applied_recommendations[0].is_checked());
    }

    #[test]
    fn rejects_unknown_enum_text() {
        assert!(from_row(row("weekly", "positive")).is_err());
        assert!(from_row(row("recurring", "great")).is_err());
    }
}
