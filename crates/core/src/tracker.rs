//! Applied-recommendation history and the "apply" action.

use crate::analysis::analyze;
use crate::domain::profile::FinancialProfile;
use crate::domain::recommendation::{total_impact, Recommendation};
use crate::domain::result::{AfterState, BeforeState, OutcomeStatus, SavedScenarioResult};
use crate::domain::scenario::ScenarioDefinition;
use crate::domain::snapshot::AnalysisSnapshot;
use crate::storage::HistoryStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recommendations committed within a session, in the order applied.
/// Append-only: never reordered or deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppliedHistory(Vec<Recommendation>);

impl AppliedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, recs: impl IntoIterator<Item = Recommendation>) {
        self.0.extend(recs);
    }

    pub fn as_slice(&self) -> &[Recommendation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_impact(&self) -> f64 {
        total_impact(&self.0)
    }

    /// Texts to exclude from regeneration.
    pub fn texts(&self) -> Vec<String> {
        self.0.iter().map(|r| r.text().to_string()).collect()
    }
}

impl From<Vec<Recommendation>> for AppliedHistory {
    fn from(recs: Vec<Recommendation>) -> Self {
        Self(recs)
    }
}

/// Balance that regeneration should plan from: the post-scenario balance
/// plus everything applied so far.
pub fn running_baseline(
    profile: &FinancialProfile,
    scenario: &ScenarioDefinition,
    history: &AppliedHistory,
) -> f64 {
    profile.net_worth() - scenario.total_cost() + history.total_impact()
}

/// Builds the record for one apply. The outcome compares pre-scenario equity
/// with the with-recommendations equity at the moment of applying.
pub fn build_saved_result(
    profile: &FinancialProfile,
    scenario: &ScenarioDefinition,
    snapshot: &AnalysisSnapshot,
    offered: &[Recommendation],
    applied: &[Recommendation],
    run_date: DateTime<Utc>,
) -> SavedScenarioResult {
    let expenses = profile.total_monthly_expenses();
    let with = &snapshot.with_recommendations;

    SavedScenarioResult {
        id: uuid::Uuid::new_v4(),
        scenario_title: scenario.title().to_string(),
        run_date,
        total_cost: scenario.total_cost(),
        impact_period: scenario.impact_period(),
        before_state: BeforeState {
            total_equity: snapshot.before.balance,
            monthly_expenses: expenses,
            savings_rate: snapshot.before.savings_rate,
        },
        after_state: AfterState {
            total_equity: with.balance,
            monthly_expenses: expenses + scenario.monthly_drag(),
            savings_rate: with.savings_rate,
            projected_equity_1_year: with.projection_1_year,
            projected_equity_5_year: with.projection_5_year,
        },
        recommendations: offered.to_vec(),
        applied_recommendations: applied.to_vec(),
        outcome_status: OutcomeStatus::classify(snapshot.before.balance, with.balance),
    }
}

/// Applies `selected` against the running history.
///
/// Empty selection is a no-op. Otherwise the result is persisted first and
/// the history is extended only after the store accepted it, so a failed
/// append leaves `history` untouched.
pub async fn apply_selection(
    store: &dyn HistoryStore,
    profile: &FinancialProfile,
    scenario: &ScenarioDefinition,
    history: &mut AppliedHistory,
    offered: &[Recommendation],
    selected: &[Recommendation],
) -> anyhow::Result<Option<SavedScenarioResult>> {
    if selected.is_empty() {
        return Ok(None);
    }

    let snapshot = analyze(profile, scenario, history.as_slice(), selected)?;
    let result = build_saved_result(profile, scenario, &snapshot, offered, selected, Utc::now());

    store
        .append(&result)
        .await
        .context("failed to persist saved scenario result")?;

    history.extend(selected.iter().cloned());
    tracing::info!(
        result_id = %result.id,
        scenario = %result.scenario_title,
        applied = selected.len(),
        impact = total_impact(selected),
        outcome = result.outcome_status.as_str(),
        "recommendations applied"
    );
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::fixtures::sample_profile;
    use crate::domain::recommendation::Priority;
    use crate::storage::InMemoryHistoryStore;

    struct RejectingStore;

    #[async_trait::async_trait]
    impl HistoryStore for RejectingStore {
        async fn append(&self, _result: &SavedScenarioResult) -> anyhow::Result<()> {
            anyhow::bail!("store offline")
        }

        async fn list(&self, _limit: usize) -> anyhow::Result<Vec<SavedScenarioResult>> {
            Ok(vec![])
        }
    }

    fn rec(id: &str, impact: f64) -> Recommendation {
        Recommendation::new(id, format!("Apply {id}"), impact, Priority::Medium)
            .unwrap()
            .with_checked(true)
    }

    #[tokio::test]
    async fn empty_selection_is_a_no_op() {
        let store = InMemoryHistoryStore::new();
        let mut history = AppliedHistory::new();
        let scenario = ScenarioDefinition::one_time("House", 50_000.0).unwrap();
        let out = apply_selection(&store, &sample_profile(), &scenario, &mut history, &[], &[])
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(history.is_empty());
        assert!(store.list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn applying_two_recommendations_updates_history_in_order() {
        let store = InMemoryHistoryStore::new();
        let mut history = AppliedHistory::new();
        let profile = sample_profile();
        let scenario = ScenarioDefinition::one_time("House", 50_000.0).unwrap();
        let selected = vec![rec("a", 500.0), rec("b", 1200.0)];

        let result = apply_selection(&store, &profile, &scenario, &mut history, &selected, &selected)
            .await
            .unwrap()
            .unwrap();

        assert!((result.after_state.total_equity - 97_951.70).abs() < 1e-6);
        assert_eq!(result.outcome_status, OutcomeStatus::Negative);
        assert_eq!(history.as_slice(), selected.as_slice());
        assert_eq!(store.list(10).await.unwrap(), vec![result]);

        let snap = analyze(&profile, &scenario, history.as_slice(), &[]).unwrap();
        assert!((snap.with_recommendations.balance - 97_951.70).abs() < 1e-6);
        assert!((running_baseline(&profile, &scenario, &history) - 97_951.70).abs() < 1e-6);
    }

    #[tokio::test]
    async fn duplicate_texts_are_preserved() {
        let store = InMemoryHistoryStore::new();
        let mut history = AppliedHistory::new();
        let profile = sample_profile();
        let scenario = ScenarioDefinition::one_time("Car repair", 1_000.0).unwrap();
        for _ in 0..2 {
            apply_selection(&store, &profile, &scenario, &mut history, &[], &[rec("a", 100.0)])
                .await
                .unwrap();
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.texts(), vec!["Apply a", "Apply a"]);
        assert_eq!(store.list(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_persist_leaves_history_untouched() {
        let mut history = AppliedHistory::new();
        let scenario = ScenarioDefinition::one_time("House", 50_000.0).unwrap();
        let err = apply_selection(
            &RejectingStore,
            &sample_profile(),
            &scenario,
            &mut history,
            &[],
            &[rec("a", 500.0)],
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("persist"));
        assert!(history.is_empty());
    }

    #[test]
    fn small_loss_is_neutral() {
        let profile = sample_profile();
        let scenario = ScenarioDefinition::one_time("Car repair", 1_000.0).unwrap();
        let snap = analyze(&profile, &scenario, &[], &[]).unwrap();
        let result = build_saved_result(&profile, &scenario, &snap, &[], &[], Utc::now());
        assert_eq!(result.outcome_status, OutcomeStatus::Neutral);
        assert_eq!(result.after_state.monthly_expenses, result.before_state.monthly_expenses);
    }
}
