//! Payload template expansion.
//!
//! A template is a JSON-like tree whose string leaves may embed
//! `${expression}` markers. Expansion builds a new tree of identical
//! shape with every marker replaced by its evaluated expression; the
//! configured template itself is never modified.
//!
//! Expansion is lenient: a marker whose expression fails is left in
//! place as literal text and the failure is reported alongside the
//! payload, so one bad expression never prevents a report from going out.

use crate::expr::{self, ExprError};
use crate::models::Facts;
use serde_json::{Map, Value};
use thiserror::Error;

const MARKER_OPEN: &str = "${";
const MARKER_CLOSE: char = '}';

/// Structural problems with a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template root must be a mapping.
    #[error("payload template must be a mapping, found {kind}")]
    RootNotMapping { kind: &'static str },

    /// Lists may only contain mappings.
    #[error("list element at {path} must be a mapping, found {kind}")]
    NonMappingListItem { path: String, kind: &'static str },

    /// Only strings, numbers, mappings and lists are supported.
    #[error("unsupported {kind} value at {path}")]
    UnsupportedValue { path: String, kind: &'static str },
}

/// One embedded expression that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionFailure {
    /// Location of the string in the template, e.g. `$.disks[0].free`.
    pub path: String,
    /// Text between `${` and `}`.
    pub expression: String,
    pub error: ExprError,
}

/// Result of expanding a template.
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Expanded payload, same shape as the template.
    pub payload: Value,
    /// Expressions that were left unresolved.
    pub failures: Vec<SubstitutionFailure>,
}

/// Check that a template only uses supported shapes.
pub fn validate(template: &Value) -> Result<(), TemplateError> {
    match template {
        Value::Object(map) => validate_map(map, "$"),
        other => Err(TemplateError::RootNotMapping {
            kind: kind_of(other),
        }),
    }
}

fn validate_map(map: &Map<String, Value>, path: &str) -> Result<(), TemplateError> {
    for (key, value) in map {
        validate_value(value, &format!("{path}.{key}"))?;
    }
    Ok(())
}

fn validate_value(value: &Value, path: &str) -> Result<(), TemplateError> {
    match value {
        Value::String(_) | Value::Number(_) => Ok(()),
        Value::Object(map) => validate_map(map, path),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                match item {
                    Value::Object(map) => validate_map(map, &item_path)?,
                    other => {
                        return Err(TemplateError::NonMappingListItem {
                            path: item_path,
                            kind: kind_of(other),
                        })
                    }
                }
            }
            Ok(())
        }
        other => Err(TemplateError::UnsupportedValue {
            path: path.to_string(),
            kind: kind_of(other),
        }),
    }
}

/// Expand a template against a fact table.
///
/// Structural errors abort the expansion; expression errors are
/// collected in [`Expansion::failures`].
pub fn expand(template: &Value, facts: &Facts) -> Result<Expansion, TemplateError> {
    let Value::Object(map) = template else {
        return Err(TemplateError::RootNotMapping {
            kind: kind_of(template),
        });
    };

    let mut failures = Vec::new();
    let payload = Value::Object(expand_map(map, facts, "$", &mut failures)?);

    Ok(Expansion { payload, failures })
}

fn expand_map(
    map: &Map<String, Value>,
    facts: &Facts,
    path: &str,
    failures: &mut Vec<SubstitutionFailure>,
) -> Result<Map<String, Value>, TemplateError> {
    let mut expanded = Map::new();
    for (key, value) in map {
        let value_path = format!("{path}.{key}");
        expanded.insert(
            key.clone(),
            expand_value(value, facts, &value_path, failures)?,
        );
    }
    Ok(expanded)
}

fn expand_value(
    value: &Value,
    facts: &Facts,
    path: &str,
    failures: &mut Vec<SubstitutionFailure>,
) -> Result<Value, TemplateError> {
    match value {
        Value::String(text) => Ok(Value::String(expand_string(text, facts, path, failures))),
        Value::Number(_) => Ok(value.clone()),
        Value::Object(map) => Ok(Value::Object(expand_map(map, facts, path, failures)?)),
        Value::Array(items) => {
            let mut expanded = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                match item {
                    Value::Object(map) => {
                        expanded.push(Value::Object(expand_map(map, facts, &item_path, failures)?))
                    }
                    other => {
                        return Err(TemplateError::NonMappingListItem {
                            path: item_path,
                            kind: kind_of(other),
                        })
                    }
                }
            }
            Ok(Value::Array(expanded))
        }
        other => Err(TemplateError::UnsupportedValue {
            path: path.to_string(),
            kind: kind_of(other),
        }),
    }
}

/// Replace every `${...}` marker in `text`.
///
/// Markers do not nest: the first `}` closes the marker. A `${` without
/// a closing brace, or whose body spans a line break, stays literal.
pub fn expand_string(
    text: &str,
    facts: &Facts,
    path: &str,
    failures: &mut Vec<SubstitutionFailure>,
) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(MARKER_OPEN) {
        let body_start = start + MARKER_OPEN.len();
        let Some(body_len) = rest[body_start..].find(MARKER_CLOSE) else {
            break;
        };
        let body = &rest[body_start..body_start + body_len];
        let marker_end = body_start + body_len + 1;

        if body.contains('\n') {
            // Not a marker; resume right after the `$`.
            output.push_str(&rest[..start + 1]);
            rest = &rest[start + 1..];
            continue;
        }

        output.push_str(&rest[..start]);
        match expr::evaluate(body, facts) {
            Ok(value) => output.push_str(&value),
            Err(error) => {
                output.push_str(&rest[start..marker_end]);
                failures.push(SubstitutionFailure {
                    path: path.to_string(),
                    expression: body.to_string(),
                    error,
                });
            }
        }
        rest = &rest[marker_end..];
    }

    output.push_str(rest);
    output
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
