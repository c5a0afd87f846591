//! Deterministic heuristic advisor.
//!
//! Rules are evaluated in a fixed order and each yields at most one
//! recommendation. Evaluation order doubles as truncation priority. Generic
//! filler rules only run when fewer than [`MIN_RECOMMENDATIONS`] survive, and
//! numbered progress checks top the list up once even those are excluded.

use crate::analysis::savings_rate;
use crate::domain::profile::{FinancialProfile, RiskTolerance};
use crate::domain::recommendation::{normalize_text, Priority, Recommendation};
use crate::domain::scenario::ScenarioDefinition;
use std::collections::HashSet;

pub const MIN_RECOMMENDATIONS: usize = 3;
pub const MAX_RECOMMENDATIONS: usize = 6;

const EMERGENCY_FUND_MONTHS: f64 = 6.0;
const EMERGENCY_FUND_CRITICAL_MONTHS: f64 = 3.0;
const HIGH_YIELD_SAVINGS_RATE: f64 = 0.045;
const TARGET_SAVINGS_RATE_PCT: f64 = 20.0;
const LOW_SAVINGS_RATE_PCT: f64 = 10.0;
const RETIREMENT_CONTRIBUTION_CAP: f64 = 23_000.0;
const CONSERVATIVE_GROWTH_SHARE: f64 = 0.60;
const AGGRESSIVE_CASH_SHARE: f64 = 0.20;
const GOOD_CREDIT_SCORE: u16 = 740;

struct RuleInput<'a> {
    profile: &'a FinancialProfile,
    scenario: &'a ScenarioDefinition,
    projected_balance: f64,
    /// Monthly savings after the scenario's recurring drag.
    monthly_savings: f64,
}

type Rule = fn(&RuleInput<'_>) -> Option<Recommendation>;

const PRIMARY_RULES: &[Rule] = &[
    emergency_fund,
    market_downturn,
    inflation,
    job_loss,
    windfall,
    medical,
    home_purchase,
    savings_rate_shortfall,
    retirement_headroom,
    risk_rebalance,
];

const FILLER_RULES: &[Rule] = &[
    credit_score,
    subscriptions,
    automate_savings,
    insurance_review,
    goal_check_in,
];

/// Runs the rule set. Recommendations whose text matches one of
/// `exclude_texts` (ignoring case and spacing) are never returned.
pub fn generate(
    profile: &FinancialProfile,
    scenario: &ScenarioDefinition,
    projected_balance: f64,
    exclude_texts: &[String],
) -> Vec<Recommendation> {
    let input = RuleInput {
        profile,
        scenario,
        projected_balance,
        monthly_savings: profile.monthly_savings() - scenario.monthly_drag(),
    };

    let mut seen: HashSet<String> = exclude_texts.iter().map(|t| normalize_text(t)).collect();
    let mut out = Vec::with_capacity(MAX_RECOMMENDATIONS);

    for rule in PRIMARY_RULES {
        if let Some(rec) = rule(&input) {
            if seen.insert(rec.text_key()) {
                out.push(rec);
            }
        }
    }

    for rule in FILLER_RULES {
        if out.len() >= MIN_RECOMMENDATIONS {
            break;
        }
        if let Some(rec) = rule(&input) {
            if seen.insert(rec.text_key()) {
                out.push(rec);
            }
        }
    }

    // Each excluded text can shadow at most one check number, so this range
    // always yields enough fresh entries.
    let first_check = exclude_texts.len() + 1;
    for n in first_check..first_check + exclude_texts.len() + MIN_RECOMMENDATIONS {
        if out.len() >= MIN_RECOMMENDATIONS {
            break;
        }
        if let Some(rec) = progress_check(&input, n) {
            if seen.insert(rec.text_key()) {
                out.push(rec);
            }
        }
    }

    out.truncate(MAX_RECOMMENDATIONS);
    tracing::debug!(
        scenario = scenario.title(),
        count = out.len(),
        excluded = exclude_texts.len(),
        "rule engine produced recommendations"
    );
    out
}

fn rec(id: &str, text: String, impact: f64, priority: Priority) -> Option<Recommendation> {
    Recommendation::new(id, text, impact.max(0.0).round(), priority).ok()
}

/// Whole dollars with thousands separators, e.g. `$12,345`.
pub fn format_usd(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

fn emergency_fund(input: &RuleInput<'_>) -> Option<Recommendation> {
    let p = input.profile;
    let months = p.emergency_fund_months()?;
    if months >= EMERGENCY_FUND_MONTHS {
        return None;
    }
    let needed = p.total_monthly_expenses() * EMERGENCY_FUND_MONTHS - p.accounts.savings.balance;
    let priority = if months < EMERGENCY_FUND_CRITICAL_MONTHS {
        Priority::High
    } else {
        Priority::Medium
    };
    rec(
        "rule-emergency-fund",
        format!(
            "Build emergency fund to 6 months: add {} to savings",
            format_usd(needed)
        ),
        needed * HIGH_YIELD_SAVINGS_RATE,
        priority,
    )
}

fn market_downturn(input: &RuleInput<'_>) -> Option<Recommendation> {
    let s = input.scenario;
    if !(s.title_contains("crash") || s.title_contains("market")) {
        return None;
    }
    let invested = input.profile.accounts.investment.balance;
    if invested <= 0.0 {
        return None;
    }
    rec(
        "rule-market-hold",
        format!(
            "Hold your {} in investments and avoid panic selling during the market downturn",
            format_usd(invested)
        ),
        invested * 0.15,
        Priority::High,
    )
}

fn inflation(input: &RuleInput<'_>) -> Option<Recommendation> {
    if !input.scenario.title_contains("inflation") {
        return None;
    }
    let p = input.profile;
    let idle_cash = (p.accounts.checking.balance - p.total_monthly_expenses()).max(0.0);
    let shift = idle_cash * 0.5;
    let trim = p.discretionary_spend() * 0.2;
    if shift <= 0.0 && trim <= 0.0 {
        return None;
    }
    rec(
        "rule-inflation-hedge",
        format!(
            "Shift {} of idle cash into inflation-protected savings (I bonds or TIPS) and trim dining and entertainment by {}/month",
            format_usd(shift),
            format_usd(trim)
        ),
        shift * 0.03 + trim * 12.0,
        Priority::Medium,
    )
}

fn job_loss(input: &RuleInput<'_>) -> Option<Recommendation> {
    if !input.scenario.title_contains("job loss") {
        return None;
    }
    let p = input.profile;
    let monthly_cut = p.discretionary_spend() * 0.5 + p.expense("subscriptions");
    rec(
        "rule-job-loss",
        format!(
            "Cut subscriptions and halve dining and entertainment to free {}/month, and file for unemployment benefits right away to offset lost income",
            format_usd(monthly_cut)
        ),
        monthly_cut * 6.0,
        Priority::High,
    )
}

fn windfall(input: &RuleInput<'_>) -> Option<Recommendation> {
    let s = input.scenario;
    if !(s.title_contains("windfall") || s.is_gain()) {
        return None;
    }
    let amount = (-s.total_cost()).max(0.0);
    if amount <= 0.0 {
        return None;
    }
    let goal = input
        .profile
        .goals
        .iter()
        .filter(|g| g.progress() < 1.0)
        .min_by(|a, b| a.progress().total_cmp(&b.progress()))
        .map(|g| g.name.as_str())
        .unwrap_or("your goals");
    let rate = input.profile.annual_return_rate();
    rec(
        "rule-windfall-split",
        format!(
            "Split the {} windfall 50/30/20: {} toward {}, {} invested, {} for discretionary use (projected net worth {})",
            format_usd(amount),
            format_usd(amount * 0.5),
            goal,
            format_usd(amount * 0.3),
            format_usd(amount * 0.2),
            format_usd(input.projected_balance)
        ),
        amount * 0.5 * HIGH_YIELD_SAVINGS_RATE + amount * 0.3 * rate,
        Priority::Medium,
    )
}

fn medical(input: &RuleInput<'_>) -> Option<Recommendation> {
    let s = input.scenario;
    if !(s.title_contains("medical") || s.title_contains("emergency")) {
        return None;
    }
    let cost = s.total_cost().max(0.0);
    let insurance_savings = input.profile.expense("insurance") * 12.0 * 0.1;
    let text = if cost > 0.0 {
        format!(
            "Negotiate an interest-free payment plan for the {} bill and review your insurance coverage and deductibles",
            format_usd(cost)
        )
    } else {
        "Negotiate payment plans before bills come due and review your insurance coverage and out-of-pocket maximum".to_string()
    };
    rec(
        "rule-medical-plan",
        text,
        cost * 0.1 + insurance_savings,
        Priority::High,
    )
}

fn home_purchase(input: &RuleInput<'_>) -> Option<Recommendation> {
    let s = input.scenario;
    if !(s.title_contains("house") || s.title_contains("purchase")) {
        return None;
    }
    let cost = s.total_cost().max(0.0);
    let reserve = input.profile.total_monthly_expenses() * EMERGENCY_FUND_MONTHS;
    let priority = if input.projected_balance < reserve {
        Priority::High
    } else {
        Priority::Medium
    };
    rec(
        "rule-home-purchase",
        format!(
            "Fund the {} purchase as a 20% down payment to avoid PMI and compare rate quotes from at least three lenders",
            format_usd(cost)
        ),
        cost * 0.02,
        priority,
    )
}

fn savings_rate_shortfall(input: &RuleInput<'_>) -> Option<Recommendation> {
    let income = input.profile.monthly_income;
    if income <= 0.0 {
        return None;
    }
    let rate = savings_rate(input.monthly_savings, income);
    if rate >= TARGET_SAVINGS_RATE_PCT {
        return None;
    }
    let increase = (TARGET_SAVINGS_RATE_PCT - rate) / 100.0 * income;
    let priority = if rate < LOW_SAVINGS_RATE_PCT {
        Priority::High
    } else {
        Priority::Medium
    };
    rec(
        "rule-savings-rate",
        format!(
            "Increase savings rate to 20% by saving an additional {}/month",
            format_usd(increase)
        ),
        increase * 12.0,
        priority,
    )
}

fn retirement_headroom(input: &RuleInput<'_>) -> Option<Recommendation> {
    let contributed = input.profile.accounts.retirement.ytd_contribution?;
    if contributed >= RETIREMENT_CONTRIBUTION_CAP {
        return None;
    }
    let remaining = RETIREMENT_CONTRIBUTION_CAP - contributed;
    rec(
        "rule-retirement-max",
        format!(
            "Maximize 401(k) contributions: {} remaining in this year's limit",
            format_usd(remaining)
        ),
        remaining * 0.25,
        Priority::Medium,
    )
}

fn risk_rebalance(input: &RuleInput<'_>) -> Option<Recommendation> {
    let p = input.profile;
    let net_worth = p.net_worth();
    if net_worth <= 0.0 {
        return None;
    }
    match p.risk_tolerance {
        RiskTolerance::Conservative => {
            let growth = p.accounts.investment.balance + p.accounts.retirement.balance;
            if growth / net_worth <= CONSERVATIVE_GROWTH_SHARE {
                return None;
            }
            let excess = growth - CONSERVATIVE_GROWTH_SHARE * net_worth;
            rec(
                "rule-rebalance-conservative",
                format!(
                    "Rebalance toward your conservative target: move {} from growth assets into bonds or stable-value funds",
                    format_usd(excess)
                ),
                excess * 0.02,
                Priority::Medium,
            )
        }
        RiskTolerance::Aggressive => {
            let cash = p.accounts.checking.balance + p.accounts.savings.balance;
            let idle = cash - p.total_monthly_expenses() * EMERGENCY_FUND_MONTHS;
            if idle <= 0.0 || cash / net_worth <= AGGRESSIVE_CASH_SHARE {
                return None;
            }
            rec(
                "rule-rebalance-aggressive",
                format!(
                    "Invest {} of idle cash beyond a 6-month reserve to match your aggressive risk profile",
                    format_usd(idle)
                ),
                idle * (RiskTolerance::Aggressive.annual_return_rate() - HIGH_YIELD_SAVINGS_RATE),
                Priority::Medium,
            )
        }
        RiskTolerance::Moderate => None,
    }
}

fn credit_score(input: &RuleInput<'_>) -> Option<Recommendation> {
    let score = input.profile.credit_score;
    if score < GOOD_CREDIT_SCORE {
        rec(
            "rule-credit-improve",
            format!(
                "Raise your credit score from {score} toward {GOOD_CREDIT_SCORE}+ by keeping card utilization under 30% and paying every bill on time"
            ),
            600.0,
            Priority::Low,
        )
    } else {
        rec(
            "rule-credit-protect",
            format!(
                "Protect your {score} credit score: keep utilization under 10% and review your credit reports annually"
            ),
            300.0,
            Priority::Low,
        )
    }
}

fn subscriptions(input: &RuleInput<'_>) -> Option<Recommendation> {
    let monthly = input.profile.expense("subscriptions");
    rec(
        "rule-subscriptions",
        format!("Review and optimize subscription costs: currently ${monthly:.2}/month"),
        monthly * 0.3 * 12.0,
        Priority::Low,
    )
}

fn automate_savings(input: &RuleInput<'_>) -> Option<Recommendation> {
    let transfer = (input.monthly_savings * 0.1).max(50.0);
    rec(
        "rule-automate-savings",
        format!(
            "Automate a {}/month transfer to high-yield savings on payday",
            format_usd(transfer)
        ),
        transfer * 12.0 * HIGH_YIELD_SAVINGS_RATE,
        Priority::Low,
    )
}

fn insurance_review(input: &RuleInput<'_>) -> Option<Recommendation> {
    let monthly = input.profile.expense("insurance");
    rec(
        "rule-insurance-review",
        "Compare insurance quotes once a year and bundle policies where it lowers premiums"
            .to_string(),
        monthly * 12.0 * 0.1,
        Priority::Low,
    )
}

fn goal_check_in(_input: &RuleInput<'_>) -> Option<Recommendation> {
    rec(
        "rule-goal-check-in",
        "Review goal progress every quarter and redirect surplus savings to the goal furthest behind"
            .to_string(),
        250.0,
        Priority::Low,
    )
}

/// Last-resort padding. `n` keeps the text distinct across apply rounds.
fn progress_check(input: &RuleInput<'_>, n: usize) -> Option<Recommendation> {
    let projected = if input.projected_balance.is_finite() {
        input.projected_balance.max(0.0)
    } else {
        0.0
    };
    let (text, impact) = match n % 3 {
        1 => {
            let milestone = (projected * 0.01).max(100.0);
            (
                format!(
                    "Progress check {n}: set a {} savings milestone for the next 90 days",
                    format_usd(milestone)
                ),
                milestone * HIGH_YIELD_SAVINGS_RATE,
            )
        }
        2 => (
            format!(
                "Progress check {n}: audit last month's spending and move one unused budget category into savings"
            ),
            200.0,
        ),
        _ => (
            format!(
                "Progress check {n}: review your {} projected net worth and sweep any surplus above budget into investments",
                format_usd(projected)
            ),
            150.0,
        ),
    };
    rec(&format!("rule-progress-check-{n}"), text, impact, Priority::Low)
}
