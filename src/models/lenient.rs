//! Tolerant scalar decoding for hand-written JSON-lines records.
//!
//! Form fields are always submitted as text, but record authors write
//! `"pulse": 72` as often as `"pulse": "72"`. Every scalar field in the
//! record model goes through [`text`] so both spellings load.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize any JSON scalar into its form-field text.
///
/// - strings pass through unchanged
/// - numbers use their JSON spelling (`98.6`, `120`)
/// - `true` becomes `"1"`, `false` and `null` become `""`
/// - arrays and objects are kept as compact JSON
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(value_to_text).unwrap_or_default())
}

/// Like [`text`], but keeps "absent or blank" distinguishable from a value.
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = text(deserializer)?;
    if value.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

/// A list that may be written as `null`; both `null` and absence read as empty.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}
