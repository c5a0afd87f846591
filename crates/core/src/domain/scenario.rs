use anyhow::ensure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactPeriod {
    #[default]
    OneTime,
    Recurring,
}

impl ImpactPeriod {
    /// Unknown or blank values read as one-time.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "recurring" => ImpactPeriod::Recurring,
            _ => ImpactPeriod::OneTime,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImpactPeriod::OneTime => "one-time",
            ImpactPeriod::Recurring => "recurring",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Hour,
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl PeriodUnit {
    /// Unknown or blank values read as month.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" | "hours" => PeriodUnit::Hour,
            "day" | "days" => PeriodUnit::Day,
            "week" | "weeks" => PeriodUnit::Week,
            "year" | "years" => PeriodUnit::Year,
            _ => PeriodUnit::Month,
        }
    }

    /// Number of periods in one month.
    pub fn per_month(self) -> f64 {
        match self {
            PeriodUnit::Hour => 730.0,
            PeriodUnit::Day => 365.0 / 12.0,
            PeriodUnit::Week => 52.0 / 12.0,
            PeriodUnit::Month => 1.0,
            PeriodUnit::Year => 1.0 / 12.0,
        }
    }
}

/// A hypothetical financial event.
///
/// Sign convention: `total_cost` and `cost_each_period` are positive for a
/// cost or loss and negative for a gain or windfall. Instances are only built
/// through [`ScenarioDefinition::new`] (deserialization included), and are
/// replaced rather than mutated when parameters change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ScenarioForm")]
pub struct ScenarioDefinition {
    title: String,
    impact_period: ImpactPeriod,
    total_cost: f64,
    cost_each_period: f64,
    period_unit: PeriodUnit,
}

impl ScenarioDefinition {
    pub fn new(
        title: impl Into<String>,
        impact_period: ImpactPeriod,
        total_cost: f64,
        cost_each_period: f64,
        period_unit: PeriodUnit,
    ) -> anyhow::Result<Self> {
        let title = title.into().trim().to_string();
        ensure!(!title.is_empty(), "scenario title must be non-empty");
        ensure!(
            total_cost.is_finite(),
            "scenario total cost must be finite (got {total_cost})"
        );
        ensure!(
            cost_each_period.is_finite(),
            "scenario cost each period must be finite (got {cost_each_period})"
        );

        Ok(Self {
            title,
            impact_period,
            total_cost,
            cost_each_period,
            period_unit,
        })
    }

    pub fn one_time(title: impl Into<String>, total_cost: f64) -> anyhow::Result<Self> {
        Self::new(title, ImpactPeriod::OneTime, total_cost, 0.0, PeriodUnit::Month)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn impact_period(&self) -> ImpactPeriod {
        self.impact_period
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn cost_each_period(&self) -> f64 {
        self.cost_each_period
    }

    pub fn period_unit(&self) -> PeriodUnit {
        self.period_unit
    }

    /// True when the scenario adds money.
    pub fn is_gain(&self) -> bool {
        self.total_cost < 0.0
    }

    /// Reduction of monthly savings caused by the scenario. Zero unless recurring;
    /// negative for a recurring gain.
    pub fn monthly_drag(&self) -> f64 {
        match self.impact_period {
            ImpactPeriod::OneTime => 0.0,
            ImpactPeriod::Recurring => self.cost_each_period * self.period_unit.per_month(),
        }
    }

    pub fn title_contains(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
    }
}

/// Free-form values as entered by a user. Every scenario is read through this
/// shape: amounts may be numbers or text, and missing or unparsable amounts
/// become 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioForm {
    pub title: String,
    pub impact_period: String,
    #[serde(deserialize_with = "amount_text")]
    pub total_cost: String,
    #[serde(deserialize_with = "amount_text")]
    pub cost_each_period: String,
    pub period_unit: String,
}

impl ScenarioForm {
    pub fn into_definition(self) -> anyhow::Result<ScenarioDefinition> {
        ScenarioDefinition::new(
            self.title,
            ImpactPeriod::parse_lenient(&self.impact_period),
            parse_amount(&self.total_cost),
            parse_amount(&self.cost_each_period),
            PeriodUnit::parse_lenient(&self.period_unit),
        )
    }
}

impl TryFrom<ScenarioForm> for ScenarioDefinition {
    type Error = anyhow::Error;

    fn try_from(form: ScenarioForm) -> anyhow::Result<Self> {
        form.into_definition()
    }
}

fn amount_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_title_and_non_finite_cost() {
        assert!(ScenarioDefinition::one_time("  ", 10.0).is_err());
        assert!(ScenarioDefinition::one_time("x", f64::INFINITY).is_err());
    }

    #[test]
    fn monthly_drag_is_zero_for_one_time() {
        let s = ScenarioDefinition::new(
            "Car",
            ImpactPeriod::OneTime,
            15000.0,
            300.0,
            PeriodUnit::Month,
        )
        .unwrap();
        assert_eq!(s.monthly_drag(), 0.0);
    }

    #[test]
    fn monthly_drag_normalizes_period_unit() {
        let yearly = ScenarioDefinition::new(
            "Tuition",
            ImpactPeriod::Recurring,
            0.0,
            1200.0,
            PeriodUnit::Year,
        )
        .unwrap();
        assert!((yearly.monthly_drag() - 100.0).abs() < 1e-9);

        let gain = ScenarioDefinition::new(
            "Side job",
            ImpactPeriod::Recurring,
            -5000.0,
            -1000.0,
            PeriodUnit::Month,
        )
        .unwrap();
        assert_eq!(gain.monthly_drag(), -1000.0);
        assert!(gain.is_gain());
    }

    #[test]
    fn form_defaults_bad_amounts_to_zero() {
        let form = ScenarioForm {
            title: "Buy a New Car".to_string(),
            impact_period: "recurring".to_string(),
            total_cost: "$15,000".to_string(),
            cost_each_period: "abc".to_string(),
            period_unit: String::new(),
        };
        let s = form.into_definition().unwrap();
        assert_eq!(s.total_cost(), 15000.0);
        assert_eq!(s.cost_each_period(), 0.0);
        assert_eq!(s.impact_period(), ImpactPeriod::Recurring);
        assert_eq!(s.period_unit(), PeriodUnit::Month);
    }

    #[test]
    fn deserialization_goes_through_validation() {
        let ok: ScenarioDefinition = serde_json::from_value(serde_json::json!({
            "title": "Windfall (10k)",
            "impactPeriod": "one-time",
            "totalCost": -10000.0
        }))
        .unwrap();
        assert!(ok.is_gain());

        let bad = serde_json::from_value::<ScenarioDefinition>(serde_json::json!({
            "title": "",
            "totalCost": 1.0
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn deserialized_amounts_default_to_zero() {
        let text: ScenarioDefinition = serde_json::from_value(serde_json::json!({
            "title": "Job Loss",
            "totalCost": "abc",
            "impactPeriod": "recurring",
            "costEachPeriod": "1,250",
            "periodUnit": "week"
        }))
        .unwrap();
        assert_eq!(text.total_cost(), 0.0);
        assert_eq!(text.cost_each_period(), 1250.0);
        assert_eq!(text.period_unit(), PeriodUnit::Week);

        let missing: ScenarioDefinition =
            serde_json::from_value(serde_json::json!({"title": "Job Loss", "totalCost": null}))
                .unwrap();
        assert_eq!(missing.total_cost(), 0.0);
        assert_eq!(missing.impact_period(), ImpactPeriod::OneTime);
    }
}
