//! Schema-driven validation of submitted form payloads.
//!
//! The validator is pure: it performs no I/O and never writes a response.
//! The form handler owns logging and the mapping to HTTP status codes.

use serde_json::{Map, Value};

use crate::config::schema::{FieldType, Form};

/// A violation found in a submitted payload.
///
/// Every variant except [`PayloadError::Invariant`] is a client error. An
/// `Invariant` means a value's dynamic type contradicted a check that
/// already passed, which indicates a bug in the validator itself; callers
/// map it to an internal error instead of blaming the client.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("unknown field {field:?}")]
    UnknownField { field: String },

    #[error("field {field:?} has invalid type {actual}, expected {expected}")]
    InvalidType {
        field: String,
        actual: &'static str,
        expected: FieldType,
    },

    #[error("missing required field {field:?}")]
    MissingRequired { field: String },

    #[error("field {field:?} is required but its value is false")]
    RequiredFalse { field: String },

    #[error("field {field:?} is required but its value is empty")]
    RequiredEmpty { field: String },

    #[error("field {field:?} must be between {min} and {max} but it is {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("field {field:?} must be between {min} and {max} characters but it is {actual} characters")]
    LengthOutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("element of field {field:?} is not an object")]
    ElementNotObject { field: String },

    #[error("unknown value {name:?} in field {field:?}")]
    UnknownShapeKey { field: String, name: String },

    #[error("value {name:?} in field {field:?} should be {expected} but it is {actual}")]
    InvalidShapeType {
        field: String,
        name: String,
        expected: FieldType,
        actual: &'static str,
    },

    #[error("value {name:?} in field {field:?} missing")]
    MissingShapeKey { field: String, name: String },

    #[error("field {field:?} violates a checked invariant: {detail}")]
    Invariant { field: String, detail: String },
}

impl PayloadError {
    /// The payload key the violation refers to, for structured logging.
    pub fn field(&self) -> &str {
        match self {
            Self::UnknownField { field }
            | Self::InvalidType { field, .. }
            | Self::MissingRequired { field }
            | Self::RequiredFalse { field }
            | Self::RequiredEmpty { field }
            | Self::OutOfRange { field, .. }
            | Self::LengthOutOfRange { field, .. }
            | Self::ElementNotObject { field }
            | Self::UnknownShapeKey { field, .. }
            | Self::InvalidShapeType { field, .. }
            | Self::MissingShapeKey { field, .. }
            | Self::Invariant { field, .. } => field,
        }
    }

    /// Whether the violation indicates a validator bug rather than bad input.
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant { .. })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate `payload` against the form's field schemas.
///
/// Fail-fast: the first violation found is returned. Integer fields are
/// normalized in place from JSON numbers to integers (truncated toward
/// zero) so that later rendering sees whole values.
pub fn validate_payload(form: &Form, payload: &mut Map<String, Value>) -> Result<(), PayloadError> {
    // Pass 1: every submitted key must be declared with a matching type.
    for (key, value) in payload.iter() {
        let schema = form
            .fields
            .get(key)
            .ok_or_else(|| PayloadError::UnknownField { field: key.clone() })?;

        let expected = schema.kind;
        let matches = matches!(
            (value, expected),
            (Value::Bool(_), FieldType::Bool)
                | (Value::Number(_), FieldType::Int)
                | (Value::String(_), FieldType::String)
                | (Value::Array(_), FieldType::Objects)
        );

        if !matches {
            return Err(PayloadError::InvalidType {
                field: key.clone(),
                actual: type_name(value),
                expected,
            });
        }
    }

    // Pass 2: required presence and type-specific constraints.
    for (key, schema) in &form.fields {
        let Some(value) = payload.get(key) else {
            if schema.required {
                return Err(PayloadError::MissingRequired { field: key.clone() });
            }

            continue;
        };

        let mut normalized_int = None;

        match schema.kind {
            FieldType::Bool => {
                let Value::Bool(b) = value else {
                    return Err(invariant(key, value, "bool"));
                };

                if schema.required && !b {
                    return Err(PayloadError::RequiredFalse { field: key.clone() });
                }
            }
            FieldType::Int => {
                let Value::Number(n) = value else {
                    return Err(invariant(key, value, "number"));
                };

                let i = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).ok_or_else(|| {
                    PayloadError::Invariant {
                        field: key.clone(),
                        detail: format!("number {n} is not representable as an integer"),
                    }
                })?;

                if i < schema.min || i > schema.max {
                    return Err(PayloadError::OutOfRange {
                        field: key.clone(),
                        min: schema.min,
                        max: schema.max,
                        actual: i,
                    });
                }

                normalized_int = Some(i);
            }
            FieldType::String => {
                let Value::String(s) = value else {
                    return Err(invariant(key, value, "string"));
                };

                if schema.required && s.is_empty() {
                    return Err(PayloadError::RequiredEmpty { field: key.clone() });
                }

                let chars = s.chars().count() as i64;

                if (chars < schema.min || chars > schema.max) && schema.max != 0 {
                    return Err(PayloadError::LengthOutOfRange {
                        field: key.clone(),
                        min: schema.min,
                        max: schema.max,
                        actual: chars,
                    });
                }
            }
            FieldType::Objects => {
                let Value::Array(elements) = value else {
                    return Err(invariant(key, value, "array"));
                };

                if schema.required && elements.is_empty() {
                    return Err(PayloadError::RequiredEmpty { field: key.clone() });
                }

                for element in elements {
                    validate_element(key, schema, element)?;
                }
            }
        }

        if let Some(i) = normalized_int {
            payload.insert(key.clone(), Value::from(i));
        }
    }

    Ok(())
}

/// Check one element of an object-array field against the declared shape.
fn validate_element(
    key: &str,
    schema: &crate::config::schema::FieldSchema,
    element: &Value,
) -> Result<(), PayloadError> {
    let Value::Object(obj) = element else {
        return Err(PayloadError::ElementNotObject {
            field: key.to_string(),
        });
    };

    for (name, value) in obj {
        let expected = *schema
            .shape
            .get(name)
            .ok_or_else(|| PayloadError::UnknownShapeKey {
                field: key.to_string(),
                name: name.clone(),
            })?;

        let ok = matches!(
            (value, expected),
            (Value::Bool(_), FieldType::Bool)
                | (Value::Number(_), FieldType::Int)
                | (Value::String(_), FieldType::String)
        );

        if !ok {
            // Config validation forbids nested objects in shapes, so an
            // Objects entry here is a configuration invariant failure.
            if expected == FieldType::Objects {
                return Err(PayloadError::Invariant {
                    field: key.to_string(),
                    detail: format!("shape value {name:?} has a non-primitive configured type"),
                });
            }

            return Err(PayloadError::InvalidShapeType {
                field: key.to_string(),
                name: name.clone(),
                expected,
                actual: type_name(value),
            });
        }
    }

    for name in schema.shape.keys() {
        if !obj.contains_key(name) {
            return Err(PayloadError::MissingShapeKey {
                field: key.to_string(),
                name: name.clone(),
            });
        }
    }

    Ok(())
}

fn invariant(key: &str, value: &Value, expected: &str) -> PayloadError {
    PayloadError::Invariant {
        field: key.to_string(),
        detail: format!(
            "value should have been {expected} but it is {}",
            type_name(value)
        ),
    }
}
