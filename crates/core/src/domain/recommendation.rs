use anyhow::ensure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// A suggested action.
///
/// `impact` is always a gain: a finite, non-negative USD amount that improves
/// the user's position. [`Recommendation::new`] enforces this, and
/// deserialization goes through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecommendation")]
pub struct Recommendation {
    id: String,
    text: String,
    checked: bool,
    impact: f64,
    priority: Priority,
}

impl Recommendation {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        impact: f64,
        priority: Priority,
    ) -> anyhow::Result<Self> {
        let id = id.into().trim().to_string();
        ensure!(!id.is_empty(), "recommendation id must be non-empty");

        let text = text.into().trim().to_string();
        ensure!(!text.is_empty(), "recommendation text must be non-empty");

        ensure!(
            impact.is_finite() && impact >= 0.0,
            "recommendation impact must be a finite gain >= 0 (got {impact})"
        );

        Ok(Self {
            id,
            text,
            checked: false,
            impact,
            priority,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn impact(&self) -> f64 {
        self.impact
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_checked(&mut self, checked: bool) {
        self.checked = checked;
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Case- and whitespace-insensitive key used to match excluded texts.
    pub fn text_key(&self) -> String {
        normalize_text(&self.text)
    }
}

pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn total_impact<'a>(recs: impl IntoIterator<Item = &'a Recommendation>) -> f64 {
    recs.into_iter().map(Recommendation::impact).sum()
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    id: String,
    text: String,
    #[serde(default)]
    checked: bool,
    impact: f64,
    #[serde(default)]
    priority: Priority,
}

impl TryFrom<RawRecommendation> for Recommendation {
    type Error = anyhow::Error;

    fn try_from(raw: RawRecommendation) -> anyhow::Result<Self> {
        Ok(Self::new(raw.id, raw.text, raw.impact, raw.priority)?.with_checked(raw.checked))
    }
}
