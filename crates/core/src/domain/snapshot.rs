use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub month_index: u32,
    pub balance: f64,
}

impl ProjectionPoint {
    /// Display label such as "Now" or "2y 3m".
    pub fn label(&self) -> String {
        if self.month_index == 0 {
            return "Now".to_string();
        }
        format!("{}y {}m", self.month_index / 12, self.month_index % 12)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialState {
    pub balance: f64,
    pub monthly_savings: f64,
    /// Percent of monthly income; 0 when income is 0.
    pub savings_rate: f64,
    pub projection_1_year: f64,
    pub projection_5_year: f64,
}

/// Before to after deltas. Percentages are 0 when the before value is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    pub balance_pct: f64,
    pub monthly_savings_pct: f64,
    /// Difference in percentage points.
    pub savings_rate_points: f64,
    pub projection_1_year_pct: f64,
    pub projection_5_year_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub before: FinancialState,
    pub after: FinancialState,
    pub with_recommendations: FinancialState,
    pub changes: Changes,
}
