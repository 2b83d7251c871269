//! Normalization of raw source records into [`Document`]s.
//!
//! A transform is pure and synchronous: the same raw record always produces
//! the same document, so reruns are detectable as no-ops via content hashing.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::document::{slugify, Document, Metadata};
use crate::error::{ImportError, Result};
use crate::sources::RawRecord;

/// Trait for record normalizers. Implementations must not perform I/O.
pub trait Transform: Send + Sync {
    fn transform(&self, collection: &str, record: &RawRecord) -> Result<Document>;
}

/// How to derive one output value from a raw record.
///
/// Exactly one of `field` or `value` should be set; `field` takes a plain
/// key or a JSON pointer (leading `/`). `default` applies when the field is
/// absent, `required` makes absence an error, and `slug` slugifies the
/// resolved string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRule {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub slug: bool,
}

impl FieldRule {
    /// Resolve this rule against a record. `Ok(None)` means the field was
    /// absent and neither `default` nor `required` applied.
    fn resolve(&self, record: &RawRecord, name: &str) -> Result<Option<Value>> {
        if let Some(value) = &self.value {
            return Ok(Some(value.clone()));
        }

        let looked_up = match &self.field {
            Some(field) if field.starts_with('/') => record.pointer(field),
            Some(field) => record.get(field),
            None => None,
        };

        let resolved = looked_up.cloned().or_else(|| self.default.clone());
        if resolved.is_none() && self.required {
            return Err(ImportError::Transform {
                record: record_hint(record),
                reason: format!("required field '{}' is missing", name),
            });
        }

        let resolved = match (resolved, self.slug) {
            (Some(value), true) => Some(Value::String(slugify(&render_string(&value)))),
            (other, _) => other,
        };

        Ok(resolved)
    }
}

/// Declarative transform: id, body, and metadata entries each come from a
/// [`FieldRule`] applied to the raw record.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldTransform {
    pub id: FieldRule,
    #[serde(default)]
    pub body: Option<FieldRule>,
    #[serde(default)]
    pub metadata: BTreeMap<String, FieldRule>,
}

impl Transform for FieldTransform {
    fn transform(&self, collection: &str, record: &RawRecord) -> Result<Document> {
        let id_value = self
            .id
            .resolve(record, "id")?
            .ok_or_else(|| ImportError::Transform {
                record: record_hint(record),
                reason: "id rule resolved to nothing".to_string(),
            })?;
        let id = render_id(&id_value).ok_or_else(|| ImportError::Transform {
            record: record_hint(record),
            reason: format!("id must be a non-empty scalar, got {}", id_value),
        })?;

        let body = match &self.body {
            Some(rule) => rule
                .resolve(record, "body")?
                .map(|v| render_string(&v))
                .unwrap_or_default(),
            None => String::new(),
        };

        let mut metadata = Metadata::new();
        for (name, rule) in &self.metadata {
            if let Some(value) = rule.resolve(record, name)? {
                metadata.insert(name.clone(), value);
            }
        }

        Ok(Document {
            id,
            collection: collection.to_string(),
            metadata,
            body,
        })
    }
}

/// Render a scalar as a document id. Objects, arrays, and empty strings are
/// not valid ids.
fn render_id(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

/// Render any JSON value as text for body fields.
fn render_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Short identifying snippet of a record for error messages.
fn record_hint(record: &RawRecord) -> String {
    if let Some(id) = record.get("id") {
        return render_string(id);
    }
    if let Some(title) = record.get("title").and_then(Value::as_str) {
        return title.to_string();
    }
    let raw = record.to_string();
    raw.chars().take(60).collect()
}
