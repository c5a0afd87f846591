//! Wire shapes returned by the advisory service, and their conversion into
//! validated domain values.

use crate::domain::recommendation::{Priority, Recommendation};
use crate::domain::scenario::{ImpactPeriod, PeriodUnit, ScenarioDefinition};
use anyhow::{bail, ensure, Context};
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_RECORD_TEXT: &str = "Review your financial strategy";
pub const DEFAULT_RECORD_IMPACT: f64 = 500.0;

/// One recommendation record as the model wrote it. Every field is optional;
/// the text may arrive under `text`, `recommendation` or `advice`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvisoryRecord {
    pub id: Option<String>,
    pub text: Option<String>,
    pub impact: Option<f64>,
    pub priority: Option<String>,
}

impl AdvisoryRecord {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self {
                text: Some(s.clone()),
                ..Default::default()
            },
            Value::Object(map) => {
                let id = map.get("id").and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
                let text = ["text", "recommendation", "advice"]
                    .iter()
                    .filter_map(|k| map.get(*k).and_then(Value::as_str))
                    .map(str::trim)
                    .find(|s| !s.is_empty())
                    .map(str::to_string);
                let impact = map.get("impact").and_then(Value::as_f64);
                let priority = map
                    .get("priority")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Self {
                    id,
                    text,
                    impact,
                    priority,
                }
            }
            _ => Self::default(),
        }
    }

    /// Fills defaults and normalises the impact sign: the model sometimes
    /// signs impacts as costs, and impacts are gains by definition.
    pub fn into_recommendation(self, index: usize) -> anyhow::Result<Recommendation> {
        let id = self
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("advisor-{}", index + 1));
        let text = self
            .text
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_RECORD_TEXT.to_string());
        let impact = self
            .impact
            .filter(|v| v.is_finite())
            .map(f64::abs)
            .unwrap_or(DEFAULT_RECORD_IMPACT);
        let priority = self
            .priority
            .as_deref()
            .and_then(Priority::parse)
            .unwrap_or_default();

        Recommendation::new(id, text, impact, priority)
    }
}

/// Structured scenario estimate requested by scenario drafting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryScenarioDraft {
    #[serde(default)]
    pub title: Option<String>,
    pub total_cost: f64,
    pub impact_period: String,
    #[serde(default)]
    pub cost_each_period: f64,
    #[serde(default)]
    pub period_unit: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<Value>,
}

impl AdvisoryScenarioDraft {
    pub fn from_value(value: Value) -> anyhow::Result<Self> {
        serde_json::from_value(value).context("advisory draft does not match the scenario schema")
    }

    pub fn validate_and_into_parts(
        self,
        requested_title: &str,
    ) -> anyhow::Result<(ScenarioDefinition, Vec<Recommendation>)> {
        let impact_period = match self.impact_period.trim() {
            "one-time" => ImpactPeriod::OneTime,
            "recurring" => ImpactPeriod::Recurring,
            other => bail!("invalid impact period in advisory draft: {other}"),
        };

        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| requested_title.to_string());

        let period_unit = self
            .period_unit
            .as_deref()
            .map(PeriodUnit::parse_lenient)
            .unwrap_or_default();

        let scenario = ScenarioDefinition::new(
            title,
            impact_period,
            self.total_cost,
            self.cost_each_period,
            period_unit,
        )?;

        ensure!(
            !self.recommendations.is_empty(),
            "advisory draft carries no recommendations"
        );
        let recommendations = self
            .recommendations
            .iter()
            .enumerate()
            .map(|(i, v)| AdvisoryRecord::from_value(v).into_recommendation(i))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok((scenario, recommendations))
    }
}
