//! Background recommendation refresh keyed by a monotonically increasing
//! token. Each refresh supersedes the previous one; a result is applied only
//! if its token is still the latest when it resolves.

use crate::advisor::{AdviceRequest, Advisor, GeneratedRecommendations, RecommendationSource};
use crate::domain::recommendation::Recommendation;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct FeedState {
    latest_token: u64,
    loading: bool,
    recommendations: Vec<Recommendation>,
    source: Option<RecommendationSource>,
}

/// Point-in-time view for display. While `loading`, `recommendations` still
/// holds the last good set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    pub loading: bool,
    pub recommendations: Vec<Recommendation>,
    pub source: Option<RecommendationSource>,
}

pub struct RecommendationFeed {
    advisor: Advisor,
    state: Arc<Mutex<FeedState>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // Holders never panic mid-update, so a poisoned state is still consistent.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl RecommendationFeed {
    pub fn new(advisor: Advisor) -> Self {
        Self {
            advisor,
            state: Arc::new(Mutex::new(FeedState::default())),
            in_flight: Mutex::new(None),
        }
    }

    /// Starts a new generation and returns its token. Without an advisory
    /// client the rule engine result is applied before returning; otherwise
    /// the call runs on a spawned task and must be called inside a tokio
    /// runtime.
    pub fn refresh(&self, request: AdviceRequest) -> u64 {
        let token = {
            let mut state = lock(&self.state);
            state.latest_token += 1;
            state.latest_token
        };

        if !self.advisor.has_client() {
            let generated = GeneratedRecommendations {
                source: RecommendationSource::Standard,
                recommendations: Advisor::rule_based(&request),
            };
            apply_if_current(&self.state, token, generated);
            self.abort_in_flight();
            return token;
        }

        lock(&self.state).loading = true;
        let advisor = self.advisor.clone();
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            let generated = advisor.generate(&request).await;
            apply_if_current(&state, token, generated);
        });

        if let Some(previous) = lock(&self.in_flight).replace(handle) {
            previous.abort();
        }
        tracing::debug!(token, "recommendation refresh started");
        token
    }

    /// Drops the current list and supersedes any in-flight refresh.
    pub fn clear(&self) {
        {
            let mut state = lock(&self.state);
            state.latest_token += 1;
            state.loading = false;
            state.recommendations.clear();
            state.source = None;
        }
        self.abort_in_flight();
    }

    fn abort_in_flight(&self) {
        if let Some(previous) = lock(&self.in_flight).take() {
            previous.abort();
        }
    }

    pub fn view(&self) -> FeedView {
        let state = lock(&self.state);
        FeedView {
            loading: state.loading,
            recommendations: state.recommendations.clone(),
            source: state.source,
        }
    }

    pub fn latest_token(&self) -> u64 {
        lock(&self.state).latest_token
    }

    /// Flips the checked flag of the recommendation with `id`. Returns false
    /// when no such recommendation is shown.
    pub fn toggle(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        match state.recommendations.iter_mut().find(|r| r.id() == id) {
            Some(rec) => {
                let checked = !rec.is_checked();
                rec.set_checked(checked);
                true
            }
            None => false,
        }
    }

    pub fn selected(&self) -> Vec<Recommendation> {
        lock(&self.state)
            .recommendations
            .iter()
            .filter(|r| r.is_checked())
            .cloned()
            .collect()
    }

    /// Waits for the in-flight refresh, if any, and returns the view.
    pub async fn settled(&self) -> FeedView {
        let handle = lock(&self.in_flight).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::error!(error = %err, "recommendation refresh task failed");
                }
            }
        }
        self.view()
    }
}

impl Drop for RecommendationFeed {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

fn apply_if_current(state: &Mutex<FeedState>, token: u64, generated: GeneratedRecommendations) {
    let mut state = lock(state);
    if state.latest_token != token {
        tracing::debug!(
            token,
            latest = state.latest_token,
            "discarding superseded recommendation refresh"
        );
        return;
    }
    state.loading = false;
    state.recommendations = generated.recommendations;
    state.source = Some(generated.source);
}
