use crate::domain::recommendation::Recommendation;
use crate::domain::scenario::ImpactPeriod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Positive,
    Neutral,
    Negative,
}

impl OutcomeStatus {
    /// Positive when equity did not drop, neutral within a 10% drop, negative beyond.
    pub fn classify(before_equity: f64, after_equity: f64) -> Self {
        if after_equity >= before_equity {
            OutcomeStatus::Positive
        } else if after_equity >= before_equity * 0.9 {
            OutcomeStatus::Neutral
        } else {
            OutcomeStatus::Negative
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Positive => "positive",
            OutcomeStatus::Neutral => "neutral",
            OutcomeStatus::Negative => "negative",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "positive" => Some(OutcomeStatus::Positive),
            "neutral" => Some(OutcomeStatus::Neutral),
            "negative" => Some(OutcomeStatus::Negative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeforeState {
    pub total_equity: f64,
    pub monthly_expenses: f64,
    pub savings_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AfterState {
    pub total_equity: f64,
    pub monthly_expenses: f64,
    pub savings_rate: f64,
    pub projected_equity_1_year: f64,
    pub projected_equity_5_year: f64,
}

/// Immutable record of one "apply" action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedScenarioResult {
    pub id: Uuid,
    pub scenario_title: String,
    pub run_date: DateTime<Utc>,
    pub total_cost: f64,
    pub impact_period: ImpactPeriod,
    pub before_state: BeforeState,
    pub after_state: AfterState,
    pub recommendations: Vec<Recommendation>,
    pub applied_recommendations: Vec<Recommendation>,
    pub outcome_status: OutcomeStatus,
}
