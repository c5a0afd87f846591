//! One user's analysis cycle: pick a scenario, review recommendations,
//! select, apply, repeat.

use crate::advisor::{AdviceRequest, Advisor, FeedView, RecommendationFeed};
use crate::analysis::analyze;
use crate::domain::profile::FinancialProfile;
use crate::domain::result::SavedScenarioResult;
use crate::domain::scenario::ScenarioDefinition;
use crate::domain::snapshot::AnalysisSnapshot;
use crate::storage::HistoryStore;
use crate::tracker::{self, AppliedHistory};
use std::sync::Arc;

pub struct ScenarioSession {
    profile: FinancialProfile,
    scenario: Option<ScenarioDefinition>,
    history: AppliedHistory,
    feed: RecommendationFeed,
    store: Arc<dyn HistoryStore>,
}

impl ScenarioSession {
    pub fn new(profile: FinancialProfile, advisor: Advisor, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            profile,
            scenario: None,
            history: AppliedHistory::new(),
            feed: RecommendationFeed::new(advisor),
            store,
        }
    }

    pub fn profile(&self) -> &FinancialProfile {
        &self.profile
    }

    pub fn scenario(&self) -> Option<&ScenarioDefinition> {
        self.scenario.as_ref()
    }

    pub fn history(&self) -> &AppliedHistory {
        &self.history
    }

    pub fn run_scenario(&mut self, scenario: ScenarioDefinition) {
        tracing::info!(scenario = scenario.title(), "running scenario");
        self.scenario = Some(scenario);
        self.refresh();
    }

    /// Replaces the active scenario with adjusted parameters.
    pub fn adjust_scenario(&mut self, scenario: ScenarioDefinition) {
        self.scenario = Some(scenario);
        self.refresh();
    }

    pub fn set_profile(&mut self, profile: FinancialProfile) {
        self.profile = profile;
        self.refresh();
    }

    /// Clears the active scenario and the current selection. Applied history
    /// and saved results are kept.
    pub fn run_new_scenario(&mut self) {
        self.scenario = None;
        self.feed.clear();
    }

    pub fn toggle_recommendation(&self, id: &str) -> bool {
        self.feed.toggle(id)
    }

    pub fn recommendations(&self) -> FeedView {
        self.feed.view()
    }

    /// Waits for any outstanding advisory refresh.
    pub async fn settled_recommendations(&self) -> FeedView {
        self.feed.settled().await
    }

    /// Current snapshot, or `None` without an active scenario.
    pub fn snapshot(&self) -> anyhow::Result<Option<AnalysisSnapshot>> {
        let Some(scenario) = &self.scenario else {
            return Ok(None);
        };
        let selected = self.feed.selected();
        analyze(&self.profile, scenario, self.history.as_slice(), &selected).map(Some)
    }

    /// Applies the selected recommendations and regenerates from the new
    /// baseline. No-op without an active scenario or selection.
    pub async fn apply(&mut self) -> anyhow::Result<Option<SavedScenarioResult>> {
        let Some(scenario) = self.scenario.clone() else {
            return Ok(None);
        };
        let offered = self.feed.view().recommendations;
        let selected = self.feed.selected();

        let result = tracker::apply_selection(
            self.store.as_ref(),
            &self.profile,
            &scenario,
            &mut self.history,
            &offered,
            &selected,
        )
        .await?;

        if result.is_some() {
            self.refresh();
        }
        Ok(result)
    }

    fn advice_request(&self) -> Option<AdviceRequest> {
        let scenario = self.scenario.clone()?;
        Some(AdviceRequest {
            projected_balance: tracker::running_baseline(&self.profile, &scenario, &self.history),
            exclude_texts: self.history.texts(),
            profile: self.profile.clone(),
            scenario,
        })
    }

    fn refresh(&self) {
        if let Some(request) = self.advice_request() {
            self.feed.refresh(request);
        }
    }
}
