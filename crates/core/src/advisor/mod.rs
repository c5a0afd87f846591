//! Recommendation generation with a fallback chain: a time-boxed advisory
//! call first, then the rule engine. Callers always get a populated list;
//! only its [`RecommendationSource`] degrades.

pub mod feed;

pub use feed::{FeedView, RecommendationFeed};

use crate::config::Settings;
use crate::domain::contract::AdvisoryScenarioDraft;
use crate::domain::profile::FinancialProfile;
use crate::domain::recommendation::{normalize_text, Recommendation};
use crate::domain::scenario::ScenarioDefinition;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json::{self, ParsedAdvice};
use crate::llm::{self, AdvisoryClient, Completion};
use crate::rules::{self, MAX_RECOMMENDATIONS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CRASH_PCT: f64 = 30.0;
const JOB_LOSS_MONTHS: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    /// Personalised output from the advisory service.
    Advisory,
    /// Rule engine output.
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
    pub profile: FinancialProfile,
    pub scenario: ScenarioDefinition,
    /// Post-scenario balance including impacts applied so far.
    pub projected_balance: f64,
    /// Texts of already-applied recommendations; never suggested again.
    #[serde(default)]
    pub exclude_texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub profile: FinancialProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecommendations {
    pub source: RecommendationSource,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDraft {
    pub scenario: ScenarioDefinition,
    pub recommendations: Vec<Recommendation>,
    pub source: RecommendationSource,
}

/// Owns the optional advisory client. Cheap to clone.
#[derive(Clone)]
pub struct Advisor {
    client: Option<Arc<dyn AdvisoryClient>>,
    timeout: Duration,
}

impl Advisor {
    pub fn new(client: Option<Arc<dyn AdvisoryClient>>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn rule_based_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = llm::client_from_settings(settings)?;
        Ok(Self::new(client, settings.advisor_timeout))
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Synchronous strategy: the rule engine.
    pub fn rule_based(request: &AdviceRequest) -> Vec<Recommendation> {
        rules::generate(
            &request.profile,
            &request.scenario,
            request.projected_balance,
            &request.exclude_texts,
        )
    }

    /// Never fails: advisory errors, timeouts and unusable output all fall
    /// back to the rule engine.
    pub async fn generate(&self, request: &AdviceRequest) -> GeneratedRecommendations {
        let Some(client) = &self.client else {
            return standard(request);
        };

        match self.try_advisory(client.as_ref(), request).await {
            Ok(recommendations) => GeneratedRecommendations {
                source: RecommendationSource::Advisory,
                recommendations,
            },
            Err(err) => {
                log_fallback(&err, "recommendations");
                standard(request)
            }
        }
    }

    async fn try_advisory(
        &self,
        client: &dyn AdvisoryClient,
        request: &AdviceRequest,
    ) -> anyhow::Result<Vec<Recommendation>> {
        let prompt = llm::prompt::recommendations(request);
        let completion = self.complete_within_deadline(client, prompt).await?;

        let (parsed, raw) = match completion {
            Completion::Structured(value) => (json::parse_structured(&value), value.to_string()),
            Completion::Text(text) => (json::parse_advice(&text), text),
        };
        tracing::info!(
            provider = ?client.provider(),
            stage = parsed.stage(),
            "advisory output parsed"
        );

        let Some(recommendations) = parsed.into_recommendations() else {
            return Err(LlmDiagnosticsError {
                provider: client.provider(),
                stage: "parse",
                detail: "no usable recommendations in advisory output".to_string(),
                raw_output: Some(raw),
            }
            .into());
        };

        let kept = without_excluded(recommendations, &request.exclude_texts);
        anyhow::ensure!(
            !kept.is_empty(),
            LlmDiagnosticsError {
                provider: client.provider(),
                stage: "exclude",
                detail: "advisory output only repeated applied recommendations".to_string(),
                raw_output: Some(raw),
            }
        );
        Ok(kept)
    }

    async fn complete_within_deadline(
        &self,
        client: &dyn AdvisoryClient,
        prompt: llm::CompletionRequest,
    ) -> anyhow::Result<Completion> {
        match tokio::time::timeout(self.timeout, client.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmDiagnosticsError {
                provider: client.provider(),
                stage: "timeout",
                detail: format!("no response within {:?}", self.timeout),
                raw_output: None,
            }
            .into()),
        }
    }

    /// Estimates a scenario from a name and description. Falls back to a
    /// keyword heuristic plus rule engine recommendations when the advisory
    /// service is unavailable. Errors only on a blank name.
    pub async fn draft_scenario(&self, request: &DraftRequest) -> anyhow::Result<ScenarioDraft> {
        if let Some(client) = &self.client {
            match self.try_draft(client.as_ref(), request).await {
                Ok(draft) => return Ok(draft),
                Err(err) => log_fallback(&err, "scenario draft"),
            }
        }

        let scenario = heuristic_scenario(&request.name, &request.profile)?;
        let projected = request.profile.net_worth() - scenario.total_cost();
        let recommendations = rules::generate(&request.profile, &scenario, projected, &[]);
        Ok(ScenarioDraft {
            scenario,
            recommendations,
            source: RecommendationSource::Standard,
        })
    }

    async fn try_draft(
        &self,
        client: &dyn AdvisoryClient,
        request: &DraftRequest,
    ) -> anyhow::Result<ScenarioDraft> {
        let prompt = llm::prompt::draft(request)?;
        let value = match self.complete_within_deadline(client, prompt).await? {
            Completion::Structured(value) => value,
            Completion::Text(text) => {
                let object = json::extract_json_object(&text).ok_or_else(|| LlmDiagnosticsError {
                    provider: client.provider(),
                    stage: "parse",
                    detail: "no JSON object in scenario draft".to_string(),
                    raw_output: Some(text.clone()),
                })?;
                serde_json::from_str(object)?
            }
        };

        let (scenario, recommendations) =
            AdvisoryScenarioDraft::from_value(value)?.validate_and_into_parts(&request.name)?;
        let mut recommendations = recommendations;
        recommendations.truncate(MAX_RECOMMENDATIONS);
        Ok(ScenarioDraft {
            scenario,
            recommendations,
            source: RecommendationSource::Advisory,
        })
    }
}

fn standard(request: &AdviceRequest) -> GeneratedRecommendations {
    GeneratedRecommendations {
        source: RecommendationSource::Standard,
        recommendations: Advisor::rule_based(request),
    }
}

fn log_fallback(err: &anyhow::Error, what: &str) {
    match err.downcast_ref::<LlmDiagnosticsError>() {
        Some(diag) => tracing::warn!(
            provider = ?diag.provider,
            stage = diag.stage,
            detail = %diag.detail,
            raw_len = diag.raw_output.as_ref().map(String::len),
            "advisory {what} unavailable; using standard recommendations"
        ),
        None => tracing::warn!(
            error = %err,
            "advisory {what} failed; using standard recommendations"
        ),
    }
}

/// Drops excluded and duplicate texts, then caps the list.
fn without_excluded(recs: Vec<Recommendation>, exclude_texts: &[String]) -> Vec<Recommendation> {
    let mut seen: HashSet<String> = exclude_texts.iter().map(|t| normalize_text(t)).collect();
    let mut out: Vec<Recommendation> = recs
        .into_iter()
        .filter(|r| seen.insert(r.text_key()))
        .collect();
    out.truncate(MAX_RECOMMENDATIONS);
    out
}

/// Keyword estimate of a scenario's signed cost from its title.
pub fn heuristic_scenario(
    title: &str,
    profile: &FinancialProfile,
) -> anyhow::Result<ScenarioDefinition> {
    let lower = title.to_lowercase();
    let total_cost = if lower.contains("crash") {
        let pct = percent_in(title).unwrap_or(DEFAULT_CRASH_PCT);
        profile.accounts.investment.balance * pct / 100.0
    } else if lower.contains("job loss") {
        profile.monthly_income * JOB_LOSS_MONTHS
    } else if lower.contains("windfall") {
        -amount_in(title).unwrap_or(0.0)
    } else {
        0.0
    };
    ScenarioDefinition::one_time(title, total_cost)
}

/// Numbers in `text` with the character that follows each, e.g.
/// "Crash (30%)" yields `[(30.0, Some('%'))]`.
fn numbers_in(text: &str) -> Vec<(f64, Option<char>)> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == ',') {
            i += 1;
        }
        let raw: String = chars[start..i].iter().filter(|c| **c != ',').collect();
        if let Ok(v) = raw.trim_end_matches('.').parse::<f64>() {
            out.push((v, chars.get(i).copied()));
        }
    }
    out
}

fn percent_in(text: &str) -> Option<f64> {
    numbers_in(text)
        .into_iter()
        .find(|(_, next)| *next == Some('%'))
        .map(|(v, _)| v)
}

fn amount_in(text: &str) -> Option<f64> {
    numbers_in(text).into_iter().next().map(|(v, next)| match next {
        Some('k' | 'K') => v * 1_000.0,
        Some('m' | 'M') => v * 1_000_000.0,
        _ => v,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::llm::{AdvisoryClient, Completion, CompletionRequest, Provider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted client: waits `delay` then returns `reply`. With
    /// `echo_scenario` set, the reply names the scenario from the prompt
    /// instead, so results of different requests can be told apart.
    pub struct MockClient {
        pub delay: Duration,
        pub reply: Result<Completion, String>,
        pub echo_scenario: bool,
        pub calls: AtomicUsize,
    }

    impl MockClient {
        pub fn text(delay: Duration, text: &str) -> Self {
            Self {
                delay,
                reply: Ok(Completion::Text(text.to_string())),
                echo_scenario: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn echo_scenario(delay: Duration) -> Self {
            Self {
                echo_scenario: true,
                ..Self::text(delay, "[]")
            }
        }

        pub fn structured(delay: Duration, value: serde_json::Value) -> Self {
            Self {
                delay,
                reply: Ok(Completion::Structured(value)),
                echo_scenario: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                delay: Duration::ZERO,
                reply: Err(message.to_string()),
                echo_scenario: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl AdvisoryClient for MockClient {
        fn provider(&self) -> Provider {
            Provider::Anthropic
        }

        async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.echo_scenario {
                let title = request
                    .user
                    .lines()
                    .find_map(|l| l.strip_prefix("- Scenario: "))
                    .unwrap_or("\"unknown\"")
                    .trim_matches('"');
                let reply = serde_json::json!([{
                    "id": "echo-1",
                    "text": format!("Prepare a reserve for {title}"),
                    "impact": 400
                }]);
                return Ok(Completion::Text(reply.to_string()));
            }
            match &self.reply {
                Ok(c) => Ok(c.clone()),
                Err(msg) => Err(anyhow::anyhow!(msg.clone())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockClient;
    use super::*;
    use crate::domain::profile::fixtures::sample_profile;
    use serde_json::json;

    fn request(exclude: Vec<String>) -> AdviceRequest {
        AdviceRequest {
            profile: sample_profile(),
            scenario: ScenarioDefinition::one_time("Market Crash (30%)", 13_569.26).unwrap(),
            projected_balance: 132_682.44,
            exclude_texts: exclude,
        }
    }

    fn advisor(client: MockClient) -> Advisor {
        Advisor::new(Some(Arc::new(client)), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn without_client_uses_rule_engine() {
        let req = request(vec![]);
        let out = Advisor::rule_based_only().generate(&req).await;
        assert_eq!(out.source, RecommendationSource::Standard);
        assert_eq!(out.recommendations, Advisor::rule_based(&req));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back_to_rule_engine() {
        let req = request(vec![]);
        let slow = advisor(MockClient::text(
            Duration::from_secs(120),
            "[{\"text\":\"Too late to matter\"}]",
        ));
        let out = slow.generate(&req).await;
        assert_eq!(out.source, RecommendationSource::Standard);
        assert_eq!(out.recommendations, Advisor::rule_based(&req));
    }

    #[tokio::test]
    async fn client_error_falls_back_to_rule_engine() {
        let req = request(vec![]);
        let out = advisor(MockClient::failing("connection refused"))
            .generate(&req)
            .await;
        assert_eq!(out.source, RecommendationSource::Standard);
        assert!(out.recommendations.len() >= rules::MIN_RECOMMENDATIONS);
    }

    #[tokio::test]
    async fn unparseable_text_falls_back_to_rule_engine() {
        let req = request(vec![]);
        let out = advisor(MockClient::text(Duration::ZERO, "Sorry, I cannot help."))
            .generate(&req)
            .await;
        assert_eq!(out.source, RecommendationSource::Standard);
    }

    #[tokio::test]
    async fn advisory_output_filters_applied_texts() {
        let req = request(vec!["Open a Roth IRA".to_string()]);
        let client = MockClient::structured(
            Duration::ZERO,
            json!({"recommendations": [
                {"text": "open a  roth IRA", "impact": 900},
                {"text": "Refinance the car loan", "impact": 400, "priority": "low"}
            ]}),
        );
        let out = advisor(client).generate(&req).await;
        assert_eq!(out.source, RecommendationSource::Advisory);
        assert_eq!(out.recommendations.len(), 1);
        assert_eq!(out.recommendations[0].text(), "Refinance the car loan");
    }

    #[tokio::test]
    async fn advisory_output_of_only_applied_texts_falls_back() {
        let req = request(vec!["Open a Roth IRA".to_string()]);
        let client = MockClient::text(Duration::ZERO, "[{\"text\":\"Open a Roth IRA\"}]");
        let out = advisor(client).generate(&req).await;
        assert_eq!(out.source, RecommendationSource::Standard);
    }

    #[test]
    fn heuristic_reads_percent_and_amounts() {
        let p = sample_profile();
        let crash = heuristic_scenario("Market Crash (20%)", &p).unwrap();
        assert!((crash.total_cost() - 45_230.88 * 0.2).abs() < 1e-6);

        let default_crash = heuristic_scenario("Stock crash", &p).unwrap();
        assert!((default_crash.total_cost() - 45_230.88 * 0.3).abs() < 1e-6);

        let job = heuristic_scenario("Job Loss", &p).unwrap();
        assert_eq!(job.total_cost(), 45_000.0);

        let windfall = heuristic_scenario("Windfall (10k)", &p).unwrap();
        assert_eq!(windfall.total_cost(), -10_000.0);
        assert!(windfall.is_gain());

        let other = heuristic_scenario("Adopt a cat", &p).unwrap();
        assert_eq!(other.total_cost(), 0.0);
    }

    #[tokio::test]
    async fn draft_falls_back_to_heuristic() {
        let req = DraftRequest {
            name: "Market Crash (30%)".to_string(),
            description: String::new(),
            profile: sample_profile(),
        };
        let draft = advisor(MockClient::failing("boom"))
            .draft_scenario(&req)
            .await
            .unwrap();
        assert_eq!(draft.source, RecommendationSource::Standard);
        assert!((draft.scenario.total_cost() - 13_569.264).abs() < 1e-6);
        assert!(draft.recommendations.len() >= rules::MIN_RECOMMENDATIONS);
    }

    #[tokio::test]
    async fn draft_uses_advisory_estimate() {
        let req = DraftRequest {
            name: "Buy a boat".to_string(),
            description: "Used sailboat".to_string(),
            profile: sample_profile(),
        };
        let text = "Estimate:\n{\"totalCost\": 18000, \"impactPeriod\": \"recurring\", \"costEachPeriod\": 250, \"periodUnit\": \"month\", \"recommendations\": [\"Budget for marina fees\"]}";
        let draft = advisor(MockClient::text(Duration::ZERO, text))
            .draft_scenario(&req)
            .await
            .unwrap();
        assert_eq!(draft.source, RecommendationSource::Advisory);
        assert_eq!(draft.scenario.title(), "Buy a boat");
        assert_eq!(draft.scenario.monthly_drag(), 250.0);
        assert_eq!(draft.recommendations[0].id(), "advisor-1");
    }

    #[tokio::test]
    async fn blank_draft_name_is_an_error() {
        let req = DraftRequest {
            name: "  ".to_string(),
            description: String::new(),
            profile: sample_profile(),
        };
        assert!(Advisor::rule_based_only().draft_scenario(&req).await.is_err());
    }
}
