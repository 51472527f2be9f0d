//! Template context: serializable rendering payload built from a [`LocalRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use reportsync_core::LocalRecord;

use crate::error::RenderError;

/// Payload handed to `report.html.tera`.
///
/// `record` is the raw JSON tree for templates that know the record shape;
/// `fields` is a flattened view so the default template can list any record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContext {
    /// Record file name, e.g. `alice.json`.
    pub name: String,
    /// File name without extension; used as the page title.
    pub title: String,
    pub record: Value,
    pub fields: Vec<FieldRow>,
    pub generated_at: DateTime<Utc>,
    pub generator_version: String,
}

/// One leaf of the record, addressed by its dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRow {
    pub path: String,
    pub value: String,
}

impl ReportContext {
    pub fn from_record(record: &LocalRecord, generated_at: DateTime<Utc>) -> Self {
        let name = record.name().to_string();
        let title = record
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let mut fields = Vec::new();
        flatten("", &record.data, &mut fields);
        ReportContext {
            name,
            title,
            record: record.data.clone(),
            fields,
            generated_at,
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<FieldRow>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&join(key), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                flatten(&join(&idx.to_string()), child, out);
            }
        }
        Value::Array(_) => out.push(FieldRow {
            path: prefix.to_string(),
            value: "(none)".to_string(),
        }),
        Value::String(s) => out.push(FieldRow {
            path: prefix.to_string(),
            value: s.clone(),
        }),
        Value::Null => out.push(FieldRow {
            path: prefix.to_string(),
            value: String::new(),
        }),
        other => out.push(FieldRow {
            path: prefix.to_string(),
            value: other.to_string(),
        }),
    }
}
