use crate::domain::profile::FinancialProfile;
use crate::domain::recommendation::{total_impact, Recommendation};
use crate::domain::scenario::ScenarioDefinition;
use crate::domain::snapshot::{AnalysisSnapshot, Changes, FinancialState};
use crate::projection::{projected_balance, FIVE_YEAR_MONTHS, ONE_YEAR_MONTHS};

/// Savings as a percent of income. Zero income yields 0 rather than NaN or infinity.
pub fn savings_rate(monthly_savings: f64, monthly_income: f64) -> f64 {
    if monthly_income == 0.0 {
        return 0.0;
    }
    monthly_savings / monthly_income * 100.0
}

/// Relative change in percent. A zero baseline is not comparable and yields 0;
/// otherwise the change is measured against the baseline's magnitude.
pub fn percent_change(before: f64, after: f64) -> f64 {
    if before == 0.0 {
        return 0.0;
    }
    (after - before) / before.abs() * 100.0
}

fn financial_state(
    balance: f64,
    monthly_savings: f64,
    monthly_income: f64,
    annual_return_rate: f64,
) -> FinancialState {
    FinancialState {
        balance,
        monthly_savings,
        savings_rate: savings_rate(monthly_savings, monthly_income),
        projection_1_year: projected_balance(
            balance,
            monthly_savings,
            annual_return_rate,
            ONE_YEAR_MONTHS,
        ),
        projection_5_year: projected_balance(
            balance,
            monthly_savings,
            annual_return_rate,
            FIVE_YEAR_MONTHS,
        ),
    }
}

/// Before / after / with-recommendations view of a scenario.
///
/// Pure in its four inputs. `after.balance` is net worth minus the scenario's
/// signed total cost; the with-recommendations balance adds the impacts of the
/// already-applied history and of the currently selected recommendations.
/// Errors only on a malformed profile.
pub fn analyze(
    profile: &FinancialProfile,
    scenario: &ScenarioDefinition,
    applied_history: &[Recommendation],
    selected: &[Recommendation],
) -> anyhow::Result<AnalysisSnapshot> {
    profile.validate()?;

    let income = profile.monthly_income;
    let rate = profile.annual_return_rate();

    let before = financial_state(profile.net_worth(), profile.monthly_savings(), income, rate);

    let after = financial_state(
        before.balance - scenario.total_cost(),
        before.monthly_savings - scenario.monthly_drag(),
        income,
        rate,
    );

    let uplift = total_impact(applied_history) + total_impact(selected);
    let with_recommendations =
        financial_state(after.balance + uplift, after.monthly_savings, income, rate);

    let changes = Changes {
        balance_pct: percent_change(before.balance, after.balance),
        monthly_savings_pct: percent_change(before.monthly_savings, after.monthly_savings),
        savings_rate_points: after.savings_rate - before.savings_rate,
        projection_1_year_pct: percent_change(before.projection_1_year, after.projection_1_year),
        projection_5_year_pct: percent_change(before.projection_5_year, after.projection_5_year),
    };

    Ok(AnalysisSnapshot {
        before,
        after,
        with_recommendations,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::fixtures::sample_profile;
    use crate::domain::recommendation::Priority;
    use crate::domain::scenario::{ImpactPeriod, PeriodUnit};
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn rec(id: &str, impact: f64) -> Recommendation {
        Recommendation::new(id, format!("do {id}"), impact, Priority::Medium).unwrap()
    }

    #[test]
    fn one_time_cost_reduces_balance_only() {
        let profile = sample_profile();
        let scenario = ScenarioDefinition::one_time("New House Purchase", 50_000.0).unwrap();
        let snap = analyze(&profile, &scenario, &[], &[]).unwrap();

        assert_approx(snap.before.balance, 146_251.70);
        assert_approx(snap.after.balance, 96_251.70);
        assert_approx(snap.after.monthly_savings, snap.before.monthly_savings);
        assert_approx(snap.with_recommendations.balance, snap.after.balance);
    }

    #[test]
    fn savings_rate_matches_example() {
        let profile = sample_profile();
        let scenario = ScenarioDefinition::one_time("Nothing", 0.0).unwrap();
        let snap = analyze(&profile, &scenario, &[], &[]).unwrap();
        assert_approx(snap.before.monthly_savings, 3214.80);
        assert!((snap.before.savings_rate - 42.864).abs() < 1e-3);
    }

    #[test]
    fn windfall_increases_balance() {
        let profile = sample_profile();
        let scenario = ScenarioDefinition::one_time("Windfall (10k)", -10_000.0).unwrap();
        let snap = analyze(&profile, &scenario, &[], &[]).unwrap();
        assert_approx(snap.after.balance, 156_251.70);
        assert!(snap.changes.balance_pct > 0.0);
    }

    #[test]
    fn recurring_drag_lowers_monthly_savings() {
        let profile = sample_profile();
        let scenario = ScenarioDefinition::new(
            "Car payment",
            ImpactPeriod::Recurring,
            0.0,
            400.0,
            PeriodUnit::Month,
        )
        .unwrap();
        let snap = analyze(&profile, &scenario, &[], &[]).unwrap();
        assert_approx(snap.after.monthly_savings, 2814.80);
        assert!(snap.changes.savings_rate_points < 0.0);
        assert!(snap.after.projection_5_year < snap.before.projection_5_year);
    }

    #[test]
    fn selected_recommendations_add_to_after_balance() {
        let profile = sample_profile();
        let scenario = ScenarioDefinition::one_time("New House Purchase", 50_000.0).unwrap();
        let selected = vec![rec("a", 500.0), rec("b", 1200.0)];
        let snap = analyze(&profile, &scenario, &[], &selected).unwrap();
        assert_approx(snap.with_recommendations.balance, 97_951.70);
    }

    #[test]
    fn applied_history_counts_toward_with_recommendations() {
        let profile = sample_profile();
        let scenario = ScenarioDefinition::one_time("New House Purchase", 50_000.0).unwrap();
        let history = vec![rec("a", 500.0), rec("b", 1200.0)];
        let snap = analyze(&profile, &scenario, &history, &[]).unwrap();
        assert_approx(snap.after.balance, 96_251.70);
        assert_approx(snap.with_recommendations.balance, 97_951.70);
    }

    #[test]
    fn zero_income_keeps_rate_defined() {
        let mut profile = sample_profile();
        profile.monthly_income = 0.0;
        let scenario = ScenarioDefinition::one_time("Job loss", 0.0).unwrap();
        let snap = analyze(&profile, &scenario, &[], &[]).unwrap();
        assert_eq!(snap.before.savings_rate, 0.0);
        assert!(snap.changes.savings_rate_points.is_finite());
    }

    #[test]
    fn zero_baseline_change_is_zero() {
        assert_eq!(percent_change(0.0, 500.0), 0.0);
        assert_approx(percent_change(-100.0, -50.0), 50.0);
    }

    #[test]
    fn malformed_profile_is_an_error() {
        let mut profile = sample_profile();
        profile.monthly_income = f64::NAN;
        let scenario = ScenarioDefinition::one_time("x", 0.0).unwrap();
        assert!(analyze(&profile, &scenario, &[], &[]).is_err());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_after_balance_is_net_worth_minus_cost(
            cost in -200_000i64..200_000,
            checking in 0u32..100_000,
            savings in 0u32..100_000,
        ) {
            let mut profile = sample_profile();
            profile.accounts.checking.balance = checking as f64;
            profile.accounts.savings.balance = savings as f64;
            let scenario = ScenarioDefinition::one_time("Anything", cost as f64).unwrap();
            let snap = analyze(&profile, &scenario, &[], &[]).unwrap();
            prop_assert!((snap.after.balance - (profile.net_worth() - cost as f64)).abs() < EPS);
        }

        #[test]
        fn prop_non_negative_selection_is_monotone(
            impacts in proptest::collection::vec(0u32..50_000, 0..6),
            cost in -50_000i64..150_000,
        ) {
            let profile = sample_profile();
            let scenario = ScenarioDefinition::one_time("Anything", cost as f64).unwrap();
            let selected: Vec<Recommendation> = impacts
                .iter()
                .enumerate()
                .map(|(i, v)| rec(&format!("r{i}"), *v as f64))
                .collect();
            let snap = analyze(&profile, &scenario, &[], &selected).unwrap();
            prop_assert!(snap.with_recommendations.balance >= snap.after.balance);
        }
    }
}
