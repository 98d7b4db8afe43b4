//! Registration forms attached to events.
//!
//! A club describes the questions students answer when registering for an
//! event as a JSON array of [`FormField`]s. Students answer with a JSON object
//! keyed by field label.

use serde::{Deserialize, Serialize};

pub const MAX_FORM_FIELDS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Number,
    Select,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FormField {
    pub label: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

const fn default_kind() -> FieldKind {
    FieldKind::Text
}

/// Parse the `registrationForm` field submitted with a new event.
///
/// Blank input yields an empty form.
///
/// # Errors
///
/// Returns a human-readable error if the JSON is malformed, a label is blank
/// or duplicated, a `select` field has no options, or there are more than
/// [`MAX_FORM_FIELDS`] fields.
pub fn parse_form(raw: &str) -> Result<Vec<FormField>, String> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let fields: Vec<FormField> =
        serde_json::from_str(raw).map_err(|e| format!("invalid registrationForm: {e}"))?;
    if fields.len() > MAX_FORM_FIELDS {
        return Err(format!(
            "registrationForm must not exceed {MAX_FORM_FIELDS} fields"
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for (i, field) in fields.iter().enumerate() {
        let label = field.label.trim();
        if label.is_empty() {
            return Err(format!("registrationForm[{i}]: label must be non-empty"));
        }
        if !seen.insert(label) {
            return Err(format!("registrationForm: duplicate label {label:?}"));
        }
        if field.kind == FieldKind::Select && field.options.is_empty() {
            return Err(format!(
                "registrationForm[{i}]: select field {label:?} needs at least one option"
            ));
        }
    }
    Ok(fields)
}

/// Check a student's answers against the event's form.
///
/// # Errors
///
/// Returns the first problem found: an unknown label, a missing required
/// answer, or a value of the wrong shape for its field.
pub fn validate_responses(
    fields: &[FormField],
    responses: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), String> {
    use serde_json::Value;

    for key in responses.keys() {
        if !fields.iter().any(|f| f.label.trim() == key) {
            return Err(format!("unknown form field {key:?}"));
        }
    }

    for field in fields {
        let label = field.label.trim();
        let value = responses.get(label).filter(|v| !is_blank(v));
        let Some(value) = value else {
            if field.required {
                return Err(format!("{label:?} is required"));
            }
            continue;
        };
        match field.kind {
            FieldKind::Text | FieldKind::Textarea => {
                let Value::String(s) = value else {
                    return Err(format!("{label:?} must be text"));
                };
                if s.chars().count() > crate::validation::MAX_TEXT_LEN {
                    return Err(format!("{label:?} is too long"));
                }
            }
            FieldKind::Email => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("{label:?} must be an email"))?;
                crate::validation::validate_email(s.trim())
                    .map_err(|_| format!("{label:?} must be a valid email"))?;
            }
            FieldKind::Number => {
                let numeric = match value {
                    Value::Number(_) => true,
                    Value::String(s) => s.trim().parse::<f64>().is_ok(),
                    _ => false,
                };
                if !numeric {
                    return Err(format!("{label:?} must be a number"));
                }
            }
            FieldKind::Select => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("{label:?} must be one of the options"))?;
                if !field.options.iter().any(|o| o == s) {
                    return Err(format!("{label:?} must be one of {:?}", field.options));
                }
            }
            FieldKind::Checkbox => {
                if !value.is_boolean() {
                    return Err(format!("{label:?} must be true or false"));
                }
            }
        }
    }
    Ok(())
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
