//! Tiered record validation.
//!
//! Findings are emitted in a fixed order so reports are reproducible:
//!
//! 1. Required (schema order)
//! 2. Structural (schema order; per-element findings by ascending index)
//! 3. Recommended (schema order)
//! 4. Date format checks (schema order), reported as Required
//!
//! A record fails when any Required or Structural finding exists.
//! Recommended findings are advisory only.

use std::fmt;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use reportsync_core::config::SchemaConfig;

use crate::error::SchemaError;
use crate::path::{FieldPath, Resolved, Segment};

// ASCII digits only; `\d` would also accept other Unicode digit scripts.
const DATE_PATTERN: &str = r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Severity class of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Required,
    Structural,
    Recommended,
}

impl Tier {
    /// Whether a finding of this tier fails the record.
    pub fn is_blocking(self) -> bool {
        !matches!(self, Tier::Recommended)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Required => write!(f, "required"),
            Tier::Structural => write!(f, "structural"),
            Tier::Recommended => write!(f, "recommended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub tier: Tier,
    pub path: String,
    pub message: String,
}

/// Result of validating one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub record: String,
    pub findings: Vec<Finding>,
    pub passed: bool,
}

impl ValidationReport {
    /// Findings that fail the record.
    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.tier.is_blocking())
    }

    /// Recommended-tier findings.
    pub fn advisories(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.tier.is_blocking())
    }

    /// One-line summary of the blocking findings, for error lists.
    pub fn failure_summary(&self) -> String {
        self.failures()
            .map(|f| format!("{}: {}", f.path, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed { "passed" } else { "failed" };
        writeln!(f, "{}: {verdict}", self.record)?;
        for finding in &self.findings {
            writeln!(f, "  [{}] {}: {}", finding.tier, finding.path, finding.message)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Structural rules
// ---------------------------------------------------------------------------

/// A Structural-tier rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralRule {
    /// Absent or `null` is a violation; an empty string is tolerated.
    Plain(FieldPath),
    /// `array[].item`: `array` must be a non-empty sequence and `item` must
    /// be non-blank on every element.
    EachElement { array: FieldPath, item: FieldPath },
}

impl StructuralRule {
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let path = FieldPath::parse(raw)?;
        let split = path
            .segments()
            .iter()
            .position(|s| matches!(s, Segment::AllElements));
        match split {
            Some(idx) if idx + 1 < path.segments().len() => {
                let (head, tail) = path.segments().split_at(idx + 1);
                let inner = tail
                    .iter()
                    .position(|s| matches!(s, Segment::AllElements));
                if inner.is_some_and(|pos| pos + 1 < tail.len()) {
                    return Err(SchemaError::NestedArrayMarker {
                        path: raw.to_string(),
                    });
                }
                Ok(StructuralRule::EachElement {
                    array: FieldPath::from_segments(head.to_vec()),
                    item: FieldPath::from_segments(tail.to_vec()),
                })
            }
            _ => Ok(StructuralRule::Plain(path)),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Compiled tier lists.
#[derive(Debug, Clone)]
pub struct Schema {
    required: Vec<FieldPath>,
    structural: Vec<StructuralRule>,
    recommended: Vec<FieldPath>,
    date_fields: Vec<FieldPath>,
    date_pattern: Regex,
}

impl Schema {
    pub fn new<S: AsRef<str>>(
        required: &[S],
        structural: &[S],
        recommended: &[S],
        date_fields: &[S],
    ) -> Result<Self, SchemaError> {
        Ok(Schema {
            required: parse_all(required)?,
            structural: structural
                .iter()
                .map(|s| StructuralRule::parse(s.as_ref()))
                .collect::<Result<_, _>>()?,
            recommended: parse_all(recommended)?,
            date_fields: parse_all(date_fields)?,
            date_pattern: Regex::new(DATE_PATTERN)?,
        })
    }

    pub fn from_config(config: &SchemaConfig) -> Result<Self, SchemaError> {
        Schema::new(
            &config.required,
            &config.structural,
            &config.recommended,
            &config.date_fields,
        )
    }

    /// A schema with no rules; every record passes.
    pub fn permissive() -> Result<Self, SchemaError> {
        Schema::new::<&str>(&[], &[], &[], &[])
    }

    /// Validate `data`. Pure: no I/O, no hidden state.
    pub fn validate(&self, record: &str, data: &Value) -> ValidationReport {
        let mut findings = Vec::new();

        for path in &self.required {
            if let Some(message) = blank_violation(path, path.resolve(data)) {
                findings.push(finding(Tier::Required, path.as_str(), message));
            }
        }

        for rule in &self.structural {
            self.check_structural(rule, data, &mut findings);
        }

        for path in &self.recommended {
            if let Some(message) = blank_violation(path, path.resolve(data)) {
                findings.push(finding(Tier::Recommended, path.as_str(), message));
            }
        }

        for path in &self.date_fields {
            if let Some(message) = self.date_violation(path.resolve(data)) {
                findings.push(finding(Tier::Required, path.as_str(), message));
            }
        }

        let passed = !findings.iter().any(|f| f.tier.is_blocking());
        ValidationReport {
            record: record.to_string(),
            findings,
            passed,
        }
    }

    fn check_structural(&self, rule: &StructuralRule, data: &Value, out: &mut Vec<Finding>) {
        match rule {
            StructuralRule::Plain(path) => {
                let resolved = path.resolve(data);
                let message = if path.addresses_sequence() {
                    sequence_violation(resolved)
                } else if resolved.is_missing() {
                    Some(describe_blank(resolved).to_string())
                } else {
                    None
                };
                if let Some(message) = message {
                    out.push(finding(Tier::Structural, path.as_str(), message));
                }
            }
            StructuralRule::EachElement { array, item } => {
                let resolved = array.resolve(data);
                if let Some(message) = sequence_violation(resolved) {
                    out.push(finding(Tier::Structural, array.as_str(), message));
                    return;
                }
                let Some(Value::Array(elements)) = resolved.value() else {
                    return;
                };
                let base = array_base(array);
                for (idx, element) in elements.iter().enumerate() {
                    if let Some(message) = blank_violation(item, item.resolve(element)) {
                        out.push(finding(
                            Tier::Structural,
                            &format!("{base}.{idx}.{item}"),
                            message,
                        ));
                    }
                }
            }
        }
    }

    fn date_violation(&self, resolved: Resolved<'_>) -> Option<String> {
        match resolved.value() {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) if self.date_pattern.is_match(s) => None,
            Some(Value::String(s)) => Some(format!("'{s}' is not a YYYY-MM-DD date")),
            Some(other) => Some(format!("expected a YYYY-MM-DD string, found {}", kind(other))),
        }
    }
}

fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Vec<FieldPath>, SchemaError> {
    raw.iter().map(|s| FieldPath::parse(s.as_ref())).collect()
}

fn finding(tier: Tier, path: &str, message: String) -> Finding {
    Finding {
        tier,
        path: path.to_string(),
        message,
    }
}

/// Required / Recommended check: blank values, and empty or non-sequence
/// values for `[]` paths.
fn blank_violation(path: &FieldPath, resolved: Resolved<'_>) -> Option<String> {
    if path.addresses_sequence() {
        return sequence_violation(resolved);
    }
    resolved
        .is_blank()
        .then(|| describe_blank(resolved).to_string())
}

fn sequence_violation(resolved: Resolved<'_>) -> Option<String> {
    match resolved.value() {
        Some(Value::Array(items)) if !items.is_empty() => None,
        Some(Value::Array(_)) => Some("array is empty".to_string()),
        Some(Value::Null) | None => Some("array is missing".to_string()),
        Some(other) => Some(format!("expected an array, found {}", kind(other))),
    }
}

fn describe_blank(resolved: Resolved<'_>) -> &'static str {
    match resolved {
        Resolved::Absent => "field is missing",
        Resolved::Present(Value::Null) => "field is null",
        Resolved::Present(_) => "field is empty",
    }
}

/// `tumors[]` → `tumors`
fn array_base(array: &FieldPath) -> String {
    array
        .as_str()
        .strip_suffix("[]")
        .unwrap_or(array.as_str())
        .to_string()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(
            &["patient.name", "report_date"],
            &["tumors[].name", "pathology"],
            &["physician"],
            &["report_date"],
        )
        .unwrap()
    }

    fn complete() -> Value {
        json!({
            "patient": { "name": "Alice" },
            "report_date": "2024-03-01",
            "tumors": [ { "name": "T1" }, { "name": "T2" } ],
            "pathology": "",
            "physician": "Dr. B"
        })
    }

    #[test]
    fn complete_record_passes_without_findings() {
        let report = schema().validate("alice.json", &complete());
        assert!(report.passed);
        assert!(report.findings.is_empty(), "{report}");
    }

    #[rstest]
    #[case(json!(""), true)]
    #[case(Value::Null, true)]
    #[case(json!(0), false)]
    #[case(json!(false), false)]
    #[case(json!("x"), false)]
    fn required_boundary(#[case] value: Value, #[case] violation: bool) {
        let schema = Schema::new(&["field"], &[], &[], &[]).unwrap();
        let report = schema.validate("r", &json!({ "field": value }));
        assert_eq!(!report.passed, violation);
    }

    #[test]
    fn required_absent_key_is_a_violation() {
        let schema = Schema::new(&["field"], &[], &[], &[]).unwrap();
        let report = schema.validate("r", &json!({}));
        assert!(!report.passed);
        assert_eq!(report.findings[0].message, "field is missing");
    }

    #[test]
    fn structural_plain_tolerates_empty_string_but_not_null() {
        let mut record = complete();
        let report = schema().validate("r", &record);
        assert!(report.passed, "empty pathology string is tolerated");

        record["pathology"] = Value::Null;
        let report = schema().validate("r", &record);
        assert!(!report.passed);
        assert_eq!(report.findings[0].path, "pathology");
        assert_eq!(report.findings[0].tier, Tier::Structural);
    }

    #[test]
    fn empty_array_reports_once_without_element_checks() {
        let mut record = complete();
        record["tumors"] = json!([]);
        let report = schema().validate("r", &record);
        assert!(!report.passed);
        let structural: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.tier == Tier::Structural)
            .collect();
        assert_eq!(structural.len(), 1);
        assert_eq!(structural[0].path, "tumors[]");
        assert_eq!(structural[0].message, "array is empty");
    }

    #[test]
    fn non_array_value_is_a_structural_violation() {
        let mut record = complete();
        record["tumors"] = json!({ "name": "T1" });
        let report = schema().validate("r", &record);
        assert_eq!(report.findings[0].message, "expected an array, found object");
    }

    #[test]
    fn each_blank_element_is_flagged_by_index() {
        let mut record = complete();
        record["tumors"] = json!([
            { "name": "ok" },
            { "name": "" },
            { "site": "lung" },
            { "name": null }
        ]);
        let report = schema().validate("r", &record);
        let paths: Vec<_> = report.findings.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["tumors.1.name", "tumors.2.name", "tumors.3.name"]);
        assert!(!report.passed);
    }

    #[test]
    fn recommended_findings_do_not_fail() {
        let mut record = complete();
        record.as_object_mut().unwrap().remove("physician");
        let report = schema().validate("r", &record);
        assert!(report.passed);
        assert_eq!(report.advisories().count(), 1);
        assert_eq!(report.failures().count(), 0);
    }

    #[rstest]
    #[case(json!("2024-03-01"), true)]
    #[case(json!("01/03/2024"), false)]
    #[case(json!("2024-3-1"), false)]
    #[case(json!(20240301), false)]
    #[case(json!("٢٠٢٤-٠٣-٠١"), false)]
    #[case(json!("２０２４-０３-０１"), false)]
    fn date_format(#[case] value: Value, #[case] ok: bool) {
        let schema = Schema::new(&[], &[], &[], &["report_date"]).unwrap();
        let report = schema.validate("r", &json!({ "report_date": value }));
        assert_eq!(report.passed, ok, "{report}");
        if !ok {
            assert_eq!(report.findings[0].tier, Tier::Required);
        }
    }

    #[test]
    fn absent_or_empty_date_is_not_a_format_violation() {
        let schema = Schema::new(&[], &[], &[], &["report_date"]).unwrap();
        assert!(schema.validate("r", &json!({})).passed);
        assert!(schema.validate("r", &json!({ "report_date": "" })).passed);
    }

    #[test]
    fn findings_follow_tier_order() {
        let record = json!({
            "report_date": "March",
            "tumors": [ { "name": "" } ],
            "pathology": null
        });
        let report = schema().validate("r", &record);
        let order: Vec<_> = report
            .findings
            .iter()
            .map(|f| (f.tier, f.path.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Tier::Required, "patient.name"),
                (Tier::Structural, "tumors.0.name"),
                (Tier::Structural, "pathology"),
                (Tier::Recommended, "physician"),
                (Tier::Required, "report_date"),
            ]
        );
    }

    #[test]
    fn validation_is_deterministic() {
        let record = json!({ "tumors": [ { "name": "" }, {} ] });
        let schema = schema();
        let first = serde_json::to_string(&schema.validate("r", &record)).unwrap();
        for _ in 0..5 {
            assert_eq!(serde_json::to_string(&schema.validate("r", &record)).unwrap(), first);
        }
    }

    #[test]
    fn structural_rule_splits_at_first_marker() {
        let rule = StructuralRule::parse("tumors[].name").unwrap();
        match rule {
            StructuralRule::EachElement { array, item } => {
                assert_eq!(array.as_str(), "tumors[]");
                assert_eq!(item.as_str(), "name");
            }
            other => panic!("expected EachElement, got {other:?}"),
        }
        assert!(matches!(
            StructuralRule::parse("tumors[]").unwrap(),
            StructuralRule::Plain(_)
        ));
    }

    #[test]
    fn nested_sequence_item_must_be_non_empty() {
        let schema = Schema::new(&[], &["tumors[].sites[]"], &[], &[]).unwrap();
        let record = json!({ "tumors": [ { "sites": ["liver"] }, { "sites": [] }, {} ] });
        let report = schema.validate("r", &record);
        assert!(!report.passed);
        let flagged: Vec<_> = report
            .findings
            .iter()
            .map(|f| (f.path.as_str(), f.message.as_str()))
            .collect();
        assert_eq!(
            flagged,
            vec![
                ("tumors.1.sites[]", "array is empty"),
                ("tumors.2.sites[]", "array is missing"),
            ]
        );
    }

    #[test]
    fn nested_marker_followed_by_field_is_rejected() {
        assert!(matches!(
            StructuralRule::parse("tumors[].sites[].name"),
            Err(SchemaError::NestedArrayMarker { .. })
        ));
        assert!(StructuralRule::parse("tumors[].sites[]").is_ok());
    }

    #[test]
    fn schema_from_config_rejects_bad_paths() {
        let config = SchemaConfig {
            required: vec!["a..b".to_string()],
            ..SchemaConfig::default()
        };
        assert!(Schema::from_config(&config).is_err());
    }
}
