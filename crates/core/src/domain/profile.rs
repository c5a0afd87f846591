use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    /// Assumed annual return used by every projection for this profile.
    pub fn annual_return_rate(self) -> f64 {
        match self {
            RiskTolerance::Conservative => 0.04,
            RiskTolerance::Moderate => 0.07,
            RiskTolerance::Aggressive => 0.10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTolerance::Conservative => "conservative",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::Aggressive => "aggressive",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub name: String,
    pub balance: f64,
    #[serde(default)]
    pub institution: Option<String>,
    /// APY in percent.
    #[serde(default)]
    pub interest_rate: Option<f64>,
    /// Year-to-date return in percent.
    #[serde(default)]
    pub ytd_return: Option<f64>,
    #[serde(default)]
    pub ytd_contribution: Option<f64>,
    #[serde(default)]
    pub employer_match: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accounts {
    pub checking: Account,
    pub savings: Account,
    pub investment: Account,
    pub retirement: Account,
}

impl Accounts {
    fn iter(&self) -> impl Iterator<Item = (&'static str, &Account)> {
        [
            ("checking", &self.checking),
            ("savings", &self.savings),
            ("investment", &self.investment),
            ("retirement", &self.retirement),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub name: String,
    pub current_amount: f64,
    pub target_amount: f64,
}

impl Goal {
    /// Fraction funded in [0, 1]; a goal without a target counts as funded.
    pub fn progress(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 1.0;
        }
        (self.current_amount / self.target_amount).clamp(0.0, 1.0)
    }
}

/// Read-only input owned by the identity/session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub monthly_income: f64,
    /// Category name to monthly amount.
    pub monthly_expenses: BTreeMap<String, f64>,
    pub accounts: Accounts,
    pub credit_score: u16,
    pub risk_tolerance: RiskTolerance,
    #[serde(default)]
    pub goals: Vec<Goal>,
}

impl FinancialProfile {
    /// Sum of all four account balances.
    pub fn net_worth(&self) -> f64 {
        self.accounts.iter().map(|(_, a)| a.balance).sum()
    }

    pub fn total_monthly_expenses(&self) -> f64 {
        self.monthly_expenses.values().sum()
    }

    /// Amount for one expense category, 0 when the category is absent.
    pub fn expense(&self, category: &str) -> f64 {
        self.monthly_expenses.get(category).copied().unwrap_or(0.0)
    }

    /// Dining plus entertainment.
    pub fn discretionary_spend(&self) -> f64 {
        self.expense("dining") + self.expense("entertainment")
    }

    pub fn monthly_savings(&self) -> f64 {
        self.monthly_income - self.total_monthly_expenses()
    }

    pub fn annual_return_rate(&self) -> f64 {
        self.risk_tolerance.annual_return_rate()
    }

    /// Months of expenses covered by the savings account. `None` without expenses.
    pub fn emergency_fund_months(&self) -> Option<f64> {
        let expenses = self.total_monthly_expenses();
        (expenses > 0.0).then(|| self.accounts.savings.balance / expenses)
    }

    /// Income and expenses must be finite and non-negative. Balances and goal
    /// amounts only need to be finite; an overdrawn account is negative.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.monthly_income.is_finite() && self.monthly_income >= 0.0,
            "monthly income must be a finite non-negative amount (got {})",
            self.monthly_income
        );
        for (category, amount) in &self.monthly_expenses {
            ensure!(
                amount.is_finite() && *amount >= 0.0,
                "monthly expense '{category}' must be a finite non-negative amount (got {amount})"
            );
        }
        for (label, account) in self.accounts.iter() {
            ensure!(
                account.balance.is_finite(),
                "{label} balance must be finite (got {})",
                account.balance
            );
        }
        for goal in &self.goals {
            ensure!(
                goal.current_amount.is_finite() && goal.target_amount.is_finite(),
                "goal '{}' amounts must be finite",
                goal.name
            );
        }
        Ok(())
    }
}
