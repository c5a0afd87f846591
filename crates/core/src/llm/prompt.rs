use crate::advisor::{AdviceRequest, DraftRequest};
use crate::analysis::savings_rate;
use crate::llm::{CompletionRequest, ToolSpec};
use crate::rules::format_usd;

pub const TOOL_EMIT_RECOMMENDATIONS: &str = "emit_recommendations";
pub const TOOL_EMIT_SCENARIO_DRAFT: &str = "emit_scenario_draft";

fn recommendation_item_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["text", "impact", "priority"],
        "properties": {
            "id": {"type": "string"},
            "text": {"type": "string"},
            "impact": {"type": "number"},
            "priority": {"type": "string", "enum": ["high", "medium", "low"]}
        }
    })
}

fn recommendations_tool() -> ToolSpec {
    ToolSpec {
        name: TOOL_EMIT_RECOMMENDATIONS,
        description: "Emit personalised financial recommendations as structured JSON",
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["recommendations"],
            "properties": {
                "recommendations": {
                    "type": "array",
                    "minItems": 4,
                    "maxItems": 6,
                    "items": recommendation_item_schema()
                }
            }
        }),
    }
}

fn draft_tool() -> ToolSpec {
    ToolSpec {
        name: TOOL_EMIT_SCENARIO_DRAFT,
        description: "Emit the estimated scenario impact and recommendations as structured JSON",
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["title", "totalCost", "impactPeriod", "costEachPeriod", "periodUnit", "recommendations"],
            "properties": {
                "title": {"type": "string"},
                "totalCost": {"type": "number"},
                "impactPeriod": {"type": "string", "enum": ["one-time", "recurring"]},
                "costEachPeriod": {"type": "number"},
                "periodUnit": {"type": "string", "enum": ["hour", "day", "week", "month", "year"]},
                "recommendations": {
                    "type": "array",
                    "minItems": 3,
                    "maxItems": 5,
                    "items": recommendation_item_schema()
                }
            }
        }),
    }
}

fn recommendations_system_prompt() -> String {
    [
        "You are a professional financial advisor. Analyze the user's financial situation and provide personalized, actionable recommendations.",
        "Respond ONLY with a valid JSON array of recommendations. No other text, explanations, or markdown.",
        "Each recommendation must follow this exact format:",
        "[",
        "  {",
        "    \"id\": \"unique-id-string\",",
        "    \"text\": \"Clear, specific recommendation with dollar amounts\",",
        "    \"impact\": 1200,",
        "    \"priority\": \"high\" | \"medium\" | \"low\"",
        "  }",
        "]",
        "Guidelines:",
        "- Provide 4-6 specific, personalized recommendations",
        "- impact is the estimated yearly gain in dollars and is always positive",
        "- Include exact dollar amounts based on the user's actual finances",
        "- Consider the scenario impact and the user's risk tolerance",
        "- Prioritize based on urgency and potential impact",
        "- Do NOT repeat any previously applied recommendations",
    ]
    .join("\n")
}

fn profile_lines(request: &AdviceRequest) -> Vec<String> {
    let p = &request.profile;
    let a = &p.accounts;
    let expenses = p.total_monthly_expenses();
    let monthly_savings = p.monthly_savings() - request.scenario.monthly_drag();
    let rate = savings_rate(monthly_savings, p.monthly_income);
    let expense_ratio = if p.monthly_income > 0.0 {
        expenses / p.monthly_income * 100.0
    } else {
        0.0
    };

    let mut lines = vec![
        "USER PROFILE:".to_string(),
        format!("- Name: {}", p.name),
        format!("- Monthly Income: {}", format_usd(p.monthly_income)),
        format!("- Monthly Expenses: {}", format_usd(expenses)),
        format!(
            "- Monthly Savings: {} ({rate:.1}% rate)",
            format_usd(monthly_savings)
        ),
        format!("- Risk Tolerance: {}", p.risk_tolerance.as_str()),
        format!("- Credit Score: {}", p.credit_score),
        String::new(),
        "CURRENT ASSETS:".to_string(),
        format!("- Checking: {}", format_usd(a.checking.balance)),
        format!(
            "- Savings: {} ({}% APY)",
            format_usd(a.savings.balance),
            a.savings.interest_rate.unwrap_or(0.0)
        ),
        format!(
            "- Investments: {} ({}% YTD)",
            format_usd(a.investment.balance),
            a.investment.ytd_return.unwrap_or(0.0)
        ),
        format!("- Retirement (401k): {}", format_usd(a.retirement.balance)),
        format!("- Total Net Worth: {}", format_usd(p.net_worth())),
        String::new(),
        "FINANCIAL HEALTH:".to_string(),
        format!(
            "- Emergency Fund: {:.1} months of expenses",
            p.emergency_fund_months().unwrap_or(0.0)
        ),
        format!("- Expense Ratio: {expense_ratio:.1}%"),
        String::new(),
        "GOALS:".to_string(),
    ];

    if p.goals.is_empty() {
        lines.push("No specific goals set".to_string());
    }
    lines.extend(p.goals.iter().map(|g| {
        format!(
            "- {}: {} / {} ({:.0}%)",
            g.name,
            format_usd(g.current_amount),
            format_usd(g.target_amount),
            g.progress() * 100.0
        )
    }));
    lines
}

fn recommendations_user_prompt(request: &AdviceRequest) -> String {
    let s = &request.scenario;
    let sign = if s.total_cost() > 0.0 { "-" } else { "+" };

    let mut lines = profile_lines(request);
    lines.extend([
        String::new(),
        "SCENARIO ANALYSIS:".to_string(),
        format!("- Scenario: \"{}\"", s.title()),
        format!("- Financial Impact: {sign}{}", format_usd(s.total_cost().abs())),
    ]);
    if s.monthly_drag() != 0.0 {
        lines.push(format!(
            "- Recurring Monthly Impact: {}",
            format_usd(-s.monthly_drag())
        ));
    }
    lines.push(format!(
        "- Projected Balance After Scenario: {}",
        format_usd(request.projected_balance)
    ));

    if !request.exclude_texts.is_empty() {
        lines.push(String::new());
        lines.push("ALREADY APPLIED (DO NOT REPEAT):".to_string());
        lines.extend(request.exclude_texts.iter().map(|text| format!("- {text}")));
    }

    lines.push(String::new());
    lines.push(format!(
        "Based on this financial profile and the \"{}\" scenario, provide personalized recommendations to optimize their financial position. Consider their {} risk tolerance.",
        s.title(),
        request.profile.risk_tolerance.as_str()
    ));
    lines.join("\n")
}

pub fn recommendations(request: &AdviceRequest) -> CompletionRequest {
    CompletionRequest {
        system: recommendations_system_prompt(),
        user: recommendations_user_prompt(request),
        tool: Some(recommendations_tool()),
    }
}

fn draft_system_prompt() -> String {
    [
        "You are a financial advisor. Estimate the financial impact of a scenario for the given user profile.",
        "Return ONLY a single JSON object with keys: title, totalCost, impactPeriod, costEachPeriod, periodUnit, recommendations.",
        "Rules:",
        "- totalCost is the total immediate impact in USD. POSITIVE means it COSTS money. NEGATIVE means a GAIN.",
        "- For a market crash of N%, use N% of the investment portfolio.",
        "- For a job loss, use lost income over the stated duration (6 months if unspecified).",
        "- For a purchase, estimate the cost.",
        "- impactPeriod is \"one-time\" or \"recurring\"; costEachPeriod is the recurring cost per period (0 if one-time).",
        "- periodUnit is one of hour, day, week, month, year.",
        "- recommendations: 3-5 items {text, impact, priority}; impact is the amount saved or gained (always positive).",
    ]
    .join("\n")
}

pub fn draft(request: &DraftRequest) -> anyhow::Result<CompletionRequest> {
    let profile_json = serde_json::to_string_pretty(&request.profile)?;
    let user = format!(
        "User Profile:\n{profile_json}\n\nScenario to Analyze:\nTitle: \"{}\"\nDescription: \"{}\"",
        request.name, request.description
    );
    Ok(CompletionRequest {
        system: draft_system_prompt(),
        user,
        tool: Some(draft_tool()),
    })
}
