//! Parse chain for advisory output.
//!
//! Stages run in order and each returns an explicit outcome:
//! 1. a bracketed JSON array somewhere in the text,
//! 2. the whole text as JSON, either a bare list or an object wrapping one,
//! 3. numbered, bulleted or labelled lines scraped from prose.

use crate::domain::contract::AdvisoryRecord;
use crate::domain::recommendation::{Priority, Recommendation};
use serde_json::Value;

pub const MAX_EXTRACTED: usize = 5;
const MIN_EXTRACTED_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAdvice {
    /// Decoded from structured records.
    Structured(Vec<Recommendation>),
    /// Scraped from free text; impacts and priorities are keyword estimates.
    Extracted(Vec<Recommendation>),
    Nothing,
}

impl ParsedAdvice {
    pub fn stage(&self) -> &'static str {
        match self {
            ParsedAdvice::Structured(_) => "structured",
            ParsedAdvice::Extracted(_) => "extracted",
            ParsedAdvice::Nothing => "nothing",
        }
    }

    pub fn into_recommendations(self) -> Option<Vec<Recommendation>> {
        match self {
            ParsedAdvice::Structured(v) | ParsedAdvice::Extracted(v) => Some(v),
            ParsedAdvice::Nothing => None,
        }
    }
}

/// Removes a surrounding Markdown fence (```json ... ``` or ``` ... ```).
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let mut inner = trimmed;
    if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
        inner = after_first;
    }
    if let Some(end) = inner.rfind("```") {
        inner = &inner[..end];
    }
    inner.trim()
}

/// Best-effort extraction of a JSON object: first '{' to last '}'.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = strip_fences(text);
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim())
}

/// A non-empty list of records: a bare array, or an object wrapping one under
/// `recommendations`.
pub fn records_in_value(value: &Value) -> Option<&Vec<Value>> {
    let list = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("recommendations")?.as_array()?,
        _ => return None,
    };
    (!list.is_empty()).then_some(list)
}

fn parse_array(candidate: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Array(items)) if !items.is_empty() => Some(items),
        _ => None,
    }
}

/// Stage 1: a bracketed array substring. Tries the widest span first, then
/// the first closed bracket pair.
pub fn bracketed_array(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;
    let last = text.rfind(']')?;
    if last <= start {
        return None;
    }
    if let Some(items) = parse_array(&text[start..=last]) {
        return Some(items);
    }
    let first_close = start + text[start..].find(']')?;
    if first_close == last {
        return None;
    }
    parse_array(&text[start..=first_close])
}

/// Stage 2: the whole (fence-stripped) payload.
pub fn whole_payload(text: &str) -> Option<Vec<Value>> {
    let value = serde_json::from_str::<Value>(strip_fences(text)).ok()?;
    records_in_value(&value).cloned()
}

pub fn records_to_recommendations(records: &[Value]) -> Vec<Recommendation> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match AdvisoryRecord::from_value(v).into_recommendation(i) {
            Ok(rec) => Some(rec),
            Err(err) => {
                tracing::warn!(index = i, error = %err, "dropping unusable advisory record");
                None
            }
        })
        .collect()
}

fn strip_number_prefix(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    Some(rest.trim_start())
}

fn strip_bullet_prefix(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('•'))
        .or_else(|| line.strip_prefix('*'))?;
    Some(rest.trim_start())
}

fn strip_label_prefix(line: &str) -> Option<&str> {
    let lower = line.to_ascii_lowercase();
    let label = ["recommendation", "advice", "tip"]
        .into_iter()
        .find(|l| lower.starts_with(l))?;
    let rest = &line[label.len()..];
    let body = rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    // The label must be followed by at least one separator.
    (body.len() < rest.len()).then_some(body)
}

fn candidate_text(line: &str) -> Option<String> {
    let body = strip_number_prefix(line)
        .or_else(|| strip_bullet_prefix(line))
        .or_else(|| strip_label_prefix(line))?;
    let body = body.trim().trim_matches('*').trim();
    (body.chars().count() > MIN_EXTRACTED_CHARS).then(|| body.to_string())
}

pub fn estimate_impact(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(&["emergency", "savings"]) {
        1000.0
    } else if has(&["invest", "401k"]) {
        1500.0
    } else if has(&["debt", "loan"]) {
        800.0
    } else if has(&["expense", "reduce"]) {
        500.0
    } else {
        600.0
    }
}

pub fn estimate_priority(text: &str) -> Priority {
    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(&["immediately", "urgent", "critical"]) {
        Priority::High
    } else if has(&["consider", "optional"]) {
        Priority::Low
    } else {
        Priority::Medium
    }
}

/// Stage 3: up to [`MAX_EXTRACTED`] candidates from prose.
pub fn extract_from_text(text: &str) -> Vec<Recommendation> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(candidate_text)
        .take(MAX_EXTRACTED)
        .enumerate()
        .filter_map(|(i, body)| {
            let impact = estimate_impact(&body);
            let priority = estimate_priority(&body);
            Recommendation::new(format!("advisor-text-{}", i + 1), body, impact, priority).ok()
        })
        .collect()
}

/// Runs the full chain over a free-text response.
pub fn parse_advice(text: &str) -> ParsedAdvice {
    let structured = bracketed_array(text).or_else(|| whole_payload(text));
    if let Some(records) = structured {
        let recs = records_to_recommendations(&records);
        if !recs.is_empty() {
            return ParsedAdvice::Structured(recs);
        }
    }

    let extracted = extract_from_text(text);
    if extracted.is_empty() {
        ParsedAdvice::Nothing
    } else {
        ParsedAdvice::Extracted(extracted)
    }
}

/// Interprets tool output, which is already JSON.
pub fn parse_structured(value: &Value) -> ParsedAdvice {
    match records_in_value(value) {
        Some(records) => {
            let recs = records_to_recommendations(records);
            if recs.is_empty() {
                ParsedAdvice::Nothing
            } else {
                ParsedAdvice::Structured(recs)
            }
        }
        None => ParsedAdvice::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_fences_handles_fenced_blocks() {
        let body = "[{\"text\":\"a\"}]";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(strip_fences(&fenced), body);
    }

    #[test]
    fn extract_json_object_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json_object(s), Some("{\"a\":1}"));
    }

    #[test]
    fn finds_array_inside_prose() {
        let text = "Here you go:\n[{\"id\":\"r1\",\"text\":\"Move $5,000 to high-yield savings\",\"impact\":225,\"priority\":\"high\"}]\nGood luck!";
        match parse_advice(text) {
            ParsedAdvice::Structured(recs) => {
                assert_eq!(recs.len(), 1);
                assert_eq!(recs[0].id(), "r1");
                assert_eq!(recs[0].impact(), 225.0);
                assert_eq!(recs[0].priority(), Priority::High);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_first_bracket_pair() {
        let text = "[{\"text\":\"Refinance the car loan at a lower rate\"}] and later [not json]";
        let items = bracketed_array(text).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn accepts_object_wrapping_a_list() {
        let text = json!({"recommendations": [{"advice": "Pay the card balance in full"}]}).to_string();
        assert!(whole_payload(&text).is_some());
        match parse_advice(&text) {
            ParsedAdvice::Structured(recs) => assert_eq!(recs[0].text(), "Pay the card balance in full"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn empty_array_is_not_structured() {
        assert_eq!(bracketed_array("[]"), None);
        assert_eq!(parse_advice("[]"), ParsedAdvice::Nothing);
    }

    #[test]
    fn extracts_numbered_bullets_and_labels() {
        let text = "Some thoughts:\n\
1. Immediately build your emergency savings to six months\n\
2) short one\n\
- Consider investing idle cash in a brokerage index fund\n\
Recommendation: Reduce dining expenses by $150 each month\n\
* **Pay down the highest-interest debt first**";
        let recs = extract_from_text(text);
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[0].priority(), Priority::High);
        assert_eq!(recs[0].impact(), 1000.0);
        assert_eq!(recs[1].priority(), Priority::Low);
        assert_eq!(recs[1].impact(), 1500.0);
        assert_eq!(recs[2].text(), "Reduce dining expenses by $150 each month");
        assert_eq!(recs[2].impact(), 500.0);
        assert_eq!(recs[3].text(), "Pay down the highest-interest debt first");
        assert_eq!(recs[3].impact(), 800.0);
        assert_eq!(recs[3].id(), "advisor-text-4");
    }

    #[test]
    fn extraction_caps_at_five() {
        let text = (1..=8)
            .map(|i| format!("{i}. Put another chunk of money toward goal number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(extract_from_text(&text).len(), MAX_EXTRACTED);
    }

    #[test]
    fn prose_without_candidates_is_nothing() {
        assert_eq!(
            parse_advice("I cannot help with that request."),
            ParsedAdvice::Nothing
        );
    }

    #[test]
    fn tool_output_is_parsed_structurally() {
        let value = json!({"recommendations": [{"text": "Open a Roth IRA", "impact": 900, "priority": "low"}]});
        let parsed = parse_structured(&value);
        assert_eq!(parsed.stage(), "structured");
        assert_eq!(parse_structured(&json!({"other": 1})), ParsedAdvice::Nothing);
    }
}
