//! Monthly compounding simulator.
//!
//! There is exactly one projection method: month `m + 1` is
//! `balance_m * (1 + annual_rate / 12) + monthly_savings`. Headline 1-year and
//! 5-year figures are the final points of the same simulation, so chart series
//! and headline values always agree.

use crate::domain::snapshot::ProjectionPoint;

pub const ONE_YEAR_MONTHS: u32 = 12;
pub const FIVE_YEAR_MONTHS: u32 = 60;

fn step(balance: f64, monthly_savings: f64, monthly_rate: f64) -> f64 {
    balance * (1.0 + monthly_rate) + monthly_savings
}

/// Returns `horizon_months + 1` points; point 0 is `starting_balance`.
pub fn project(
    starting_balance: f64,
    monthly_savings: f64,
    annual_return_rate: f64,
    horizon_months: u32,
) -> Vec<ProjectionPoint> {
    let monthly_rate = annual_return_rate / 12.0;
    let mut out = Vec::with_capacity(horizon_months as usize + 1);
    let mut balance = starting_balance;
    out.push(ProjectionPoint {
        month_index: 0,
        balance,
    });
    for month_index in 1..=horizon_months {
        balance = step(balance, monthly_savings, monthly_rate);
        out.push(ProjectionPoint {
            month_index,
            balance,
        });
    }
    out
}

/// Balance after `horizon_months`, without materialising the series.
pub fn projected_balance(
    starting_balance: f64,
    monthly_savings: f64,
    annual_return_rate: f64,
    horizon_months: u32,
) -> f64 {
    let monthly_rate = annual_return_rate / 12.0;
    (0..horizon_months).fold(starting_balance, |balance, _| {
        step(balance, monthly_savings, monthly_rate)
    })
}

/// Keeps every `stride`-th point plus the final one. A stride of 0 or 1 keeps all points.
pub fn downsample(points: &[ProjectionPoint], stride: u32) -> Vec<ProjectionPoint> {
    if stride <= 1 {
        return points.to_vec();
    }
    let mut out: Vec<ProjectionPoint> = points
        .iter()
        .filter(|p| p.month_index % stride == 0)
        .copied()
        .collect();
    if let Some(last) = points.last() {
        if out.last().map(|p| p.month_index) != Some(last.month_index) {
            out.push(*last);
        }
    }
    out
}

/// Chart series over whole years, down-sampled to `stride` months.
pub fn projection_series(
    starting_balance: f64,
    monthly_savings: f64,
    annual_return_rate: f64,
    years: u32,
    stride: u32,
) -> Vec<ProjectionPoint> {
    let points = project(
        starting_balance,
        monthly_savings,
        annual_return_rate,
        years.saturating_mul(12),
    );
    downsample(&points, stride)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert_eq, proptest};

    #[test]
    fn zero_horizon_is_just_the_start() {
        let points = project(1234.5, 100.0, 0.07, 0);
        assert_eq!(
            points,
            vec![ProjectionPoint {
                month_index: 0,
                balance: 1234.5
            }]
        );
    }

    #[test]
    fn follows_monthly_recurrence() {
        let points = project(1000.0, 100.0, 0.12, 2);
        assert_eq!(points.len(), 3);
        assert!((points[1].balance - 1110.0).abs() < 1e-9);
        assert!((points[2].balance - (1110.0 * 1.01 + 100.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_rate_is_linear() {
        let b = projected_balance(500.0, 250.0, 0.0, 12);
        assert!((b - 3500.0).abs() < 1e-9);
    }

    #[test]
    fn headline_matches_series_end() {
        let series = project(96_251.70, 3214.80, 0.07, FIVE_YEAR_MONTHS);
        let headline = projected_balance(96_251.70, 3214.80, 0.07, FIVE_YEAR_MONTHS);
        assert_eq!(series.last().map(|p| p.balance), Some(headline));
    }

    #[test]
    fn downsample_keeps_final_point() {
        let points = project(0.0, 1.0, 0.0, 13);
        let sampled = downsample(&points, 6);
        let months: Vec<u32> = sampled.iter().map(|p| p.month_index).collect();
        assert_eq!(months, vec![0, 6, 12, 13]);
    }

    #[test]
    fn series_covers_whole_years() {
        let sampled = projection_series(0.0, 1.0, 0.05, 5, 12);
        let months: Vec<u32> = sampled.iter().map(|p| p.month_index).collect();
        assert_eq!(months, vec![0, 12, 24, 36, 48, 60]);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_project_is_deterministic(
            balance in -100_000i64..1_000_000,
            savings in -5_000i64..10_000,
            rate_bp in 0u32..1500,
            horizon in 0u32..120
        ) {
            let rate = rate_bp as f64 / 10_000.0;
            let a = project(balance as f64, savings as f64, rate, horizon);
            let b = project(balance as f64, savings as f64, rate, horizon);
            prop_assert_eq!(a.len(), horizon as usize + 1);
            prop_assert_eq!(a, b);
        }
    }
}
