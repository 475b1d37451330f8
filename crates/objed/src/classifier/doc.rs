//! Helpers for reading classifier and detector documents.

use serde_json::Value;

use crate::error::ModelError;

/// Returns the `type` discriminator of a document node.
pub fn type_name(doc: &Value) -> Result<&str, ModelError> {
    match doc.get("type") {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ModelError::invalid("type", "expected a string")),
        None => Err(ModelError::MissingField("type".into())),
    }
}

/// Returns `true` if `width x height` is a valid classifier size.
#[inline]
pub fn is_valid_size(width: i32, height: i32) -> bool {
    width > 0 && height > 0 && width % 2 == 1 && height % 2 == 1
}

pub fn check_size(width: i32, height: i32) -> Result<(), ModelError> {
    if is_valid_size(width, height) {
        Ok(())
    } else {
        Err(ModelError::InvalidSize { width, height })
    }
}

/// Panics if `width x height` is not a valid classifier size.
#[track_caller]
pub fn assert_size(width: i32, height: i32) {
    assert!(
        is_valid_size(width, height),
        "invalid classifier size {width}x{height} (must be positive and odd)"
    );
}

/// Reads and validates the `width` and `height` fields of a classifier node.
pub fn size(doc: &Value) -> Result<(i32, i32), ModelError> {
    let width = int(doc, "width")?;
    let height = int(doc, "height")?;
    check_size(width, height)?;
    Ok((width, height))
}

pub fn field<'a>(doc: &'a Value, key: &str) -> Result<&'a Value, ModelError> {
    doc.get(key)
        .ok_or_else(|| ModelError::MissingField(key.to_string()))
}

/// Returns the field `key`, treating `null` like a missing field.
pub fn optional<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    doc.get(key).filter(|v| !v.is_null())
}

pub fn int(doc: &Value, key: &str) -> Result<i32, ModelError> {
    let value = field(doc, key)?;
    value
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| ModelError::invalid(key, format!("expected an integer, got {value}")))
}

pub fn array<'a>(doc: &'a Value, key: &str) -> Result<&'a [Value], ModelError> {
    match field(doc, key)? {
        Value::Array(items) => Ok(items),
        other => Err(ModelError::invalid(key, format!("expected an array, got {other}"))),
    }
}

pub fn f64_or(doc: &Value, key: &str, default: f64) -> Result<f64, ModelError> {
    match optional(doc, key) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| ModelError::invalid(key, format!("expected a number, got {v}"))),
    }
}

pub fn bool_or(doc: &Value, key: &str, default: bool) -> Result<bool, ModelError> {
    match optional(doc, key) {
        None => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| ModelError::invalid(key, format!("expected a boolean, got {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(size(&json!({"width": 3, "height": 5})).unwrap(), (3, 5));
        assert!(matches!(
            size(&json!({"width": 4, "height": 5})),
            Err(ModelError::InvalidSize { width: 4, height: 5 })
        ));
        assert!(matches!(
            size(&json!({"width": -1, "height": 5})),
            Err(ModelError::InvalidSize { .. })
        ));
        assert!(matches!(
            size(&json!({"height": 5})),
            Err(ModelError::MissingField(f)) if f == "width"
        ));
        assert!(matches!(
            size(&json!({"width": "3", "height": 5})),
            Err(ModelError::InvalidField { .. })
        ));
    }

    #[test]
    fn defaults() {
        let doc = json!({"a": 0.25, "b": null, "c": true});
        assert_eq!(f64_or(&doc, "a", 1.0).unwrap(), 0.25);
        assert_eq!(f64_or(&doc, "b", 1.0).unwrap(), 1.0);
        assert_eq!(f64_or(&doc, "missing", 1.5).unwrap(), 1.5);
        assert!(f64_or(&doc, "c", 1.0).is_err());
        assert!(bool_or(&doc, "c", false).unwrap());
        assert!(bool_or(&doc, "b", true).unwrap());
        assert!(optional(&doc, "b").is_none());
    }
}
