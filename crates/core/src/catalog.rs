use crate::domain::scenario::ScenarioDefinition;
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::Path;

/// Preset scenarios keyed by identifier. Loaded from a JSON object mapping
/// id to scenario definition; every entry is validated on load.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    entries: BTreeMap<String, ScenarioDefinition>,
}

impl ScenarioCatalog {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let entries: BTreeMap<String, ScenarioDefinition> =
            serde_json::from_str(raw).context("invalid scenario catalog JSON")?;
        anyhow::ensure!(
            entries.keys().all(|k| !k.trim().is_empty()),
            "scenario catalog ids must be non-empty"
        );
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario catalog {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn get(&self, id: &str) -> Option<&ScenarioDefinition> {
        self.entries.get(id)
    }

    pub fn require(&self, id: &str) -> anyhow::Result<&ScenarioDefinition> {
        self.get(id).with_context(|| {
            format!(
                "unknown scenario preset {id:?} (known: {})",
                self.ids().collect::<Vec<_>>().join(", ")
            )
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESETS: &str = r#"{
        "market-crash": {"title": "Market Crash (30%)", "impactPeriod": "one-time", "totalCost": 13569.26},
        "job-loss": {"title": "Job Loss", "impactPeriod": "one-time", "totalCost": 45000},
        "new-car": {"title": "Buy a New Car", "impactPeriod": "recurring", "totalCost": 5000, "costEachPeriod": 450, "periodUnit": "month"}
    }"#;

    #[test]
    fn loads_presets_by_id() {
        let catalog = ScenarioCatalog::from_json(PRESETS).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["job-loss", "market-crash", "new-car"]);
        assert_eq!(catalog.require("new-car").unwrap().monthly_drag(), 450.0);
        assert!(catalog.get("lottery").is_none());
    }

    #[test]
    fn unknown_preset_lists_known_ids() {
        let catalog = ScenarioCatalog::from_json(PRESETS).unwrap();
        let err = catalog.require("lottery").unwrap_err().to_string();
        assert!(err.contains("job-loss, market-crash, new-car"));
    }

    #[test]
    fn invalid_entry_fails_the_load() {
        assert!(ScenarioCatalog::from_json(r#"{"x": {"title": "", "totalCost": 1}}"#).is_err());
        assert!(ScenarioCatalog::from_json(r#"{" ": {"title": "ok", "totalCost": 1}}"#).is_err());
    }
}
