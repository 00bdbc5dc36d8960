//! crates/bank_core/src/validation.rs
//!
//! Turns `validator` rule failures into a flat list of field violations that
//! the HTTP layer can hand straight back to the client.

use serde::Serialize;
use validator::Validate;

pub const INVALID_PAYLOAD: &str = "invalid_payload";

/// A single broken rule on a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    /// The rule that failed (`length`, `range`, ...).
    #[serde(rename = "error")]
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self {
            message: INVALID_PAYLOAD.to_string(),
            violations,
        }
    }
}

/// Runs the `#[validate(...)]` rules declared on `value`.
///
/// Violations are sorted by field name so responses are stable.
pub fn validate<T: Validate>(value: &T) -> Result<(), ValidationError> {
    let Err(errors) = value.validate() else {
        return Ok(());
    };

    let mut violations: Vec<Violation> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            let field = field.to_string();
            field_errors.iter().map(move |e| Violation {
                field: field.clone(),
                tag: e.code.to_string(),
                value: e.params.get("value").cloned(),
            })
        })
        .collect();
    violations.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.tag.cmp(&b.tag)));

    Err(ValidationError::new(violations))
}
