pub mod advisor;
pub mod analysis;
pub mod catalog;
pub mod domain;
pub mod llm;
pub mod projection;
pub mod rules;
pub mod session;
pub mod storage;
pub mod tracker;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_ADVISOR_TIMEOUT_SECS: u64 = 60;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AdvisorProvider {
        Anthropic,
        OpenAi,
        /// Rule engine only.
        Disabled,
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub advisor_provider: AdvisorProvider,
        pub advisor_timeout: Duration,
        pub anthropic_api_key: Option<String>,
        pub openai_api_key: Option<String>,
        pub openai_base_url: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
            let openai_base_url = std::env::var("OPENAI_BASE_URL").ok();

            let advisor_provider = match std::env::var("ADVISOR_PROVIDER").ok().as_deref() {
                Some(raw) => parse_provider(raw)?,
                None if anthropic_api_key.is_some() => AdvisorProvider::Anthropic,
                None if openai_base_url.is_some() => AdvisorProvider::OpenAi,
                None => AdvisorProvider::Disabled,
            };

            let timeout_secs = std::env::var("ADVISOR_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_ADVISOR_TIMEOUT_SECS);

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                advisor_provider,
                advisor_timeout: Duration::from_secs(timeout_secs),
                anthropic_api_key,
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                openai_base_url,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_openai_base_url(&self) -> anyhow::Result<&str> {
            self.openai_base_url
                .as_deref()
                .context("OPENAI_BASE_URL is required")
        }
    }

    fn parse_provider(raw: &str) -> anyhow::Result<AdvisorProvider> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(AdvisorProvider::Anthropic),
            "openai" | "ollama" => Ok(AdvisorProvider::OpenAi),
            "none" | "" => Ok(AdvisorProvider::Disabled),
            other => anyhow::bail!("unknown ADVISOR_PROVIDER: {other}"),
        }
    }

}
