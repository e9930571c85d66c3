//! Output formatting and control utilities.
//!
//! CHANGELOG:
//! - 10/18/2026 - Errors carry the taxonomy code
//! - 10/18/2026 - Initial implementation

use evoapi_core::EvolutionError;
use serde::Serialize;
use serde_json::{json, Value};

/// Output control settings from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct OutputControls {
    pub compact: bool,
    pub fields: Option<String>,
    pub max_text_chars: Option<u32>,
}

impl OutputControls {
    /// Render data according to output controls.
    pub fn emit<T: Serialize>(&self, data: &T) -> String {
        let value = serde_json::to_value(data).unwrap_or(Value::Null);

        let filtered = match self.fields {
            Some(ref fields) => filter_fields(&value, fields),
            None => value,
        };

        let truncated = match self.max_text_chars {
            Some(max_chars) => truncate_text_fields(&filtered, max_chars as usize),
            None => filtered,
        };

        if self.compact {
            serde_json::to_string(&truncated).unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::to_string_pretty(&truncated).unwrap_or_else(|_| "{}".to_string())
        }
    }

    /// Print data to stdout according to output controls.
    pub fn print<T: Serialize>(&self, data: &T) {
        println!("{}", self.emit(data));
    }
}

/// Keep only the listed fields of objects (recursing into arrays).
fn filter_fields(value: &Value, fields: &str) -> Value {
    let field_list: Vec<&str> = fields.split(',').map(|s| s.trim()).collect();

    match value {
        Value::Array(arr) => Value::Array(arr.iter().map(|v| filter_fields(v, fields)).collect()),
        Value::Object(map) => {
            let mut filtered = serde_json::Map::new();
            for field in &field_list {
                if let Some(v) = map.get(*field) {
                    filtered.insert(field.to_string(), v.clone());
                }
            }
            Value::Object(filtered)
        }
        _ => value.clone(),
    }
}

/// Truncate string fields to `max_chars` characters.
fn truncate_text_fields(value: &Value, max_chars: usize) -> Value {
    match value {
        Value::String(s) if s.chars().count() > max_chars => {
            let head: String = s.chars().take(max_chars).collect();
            Value::String(format!("{}...", head))
        }
        Value::Array(arr) => {
            Value::Array(arr.iter().map(|v| truncate_text_fields(v, max_chars)).collect())
        }
        Value::Object(map) => {
            let mut truncated = serde_json::Map::new();
            for (k, v) in map {
                truncated.insert(k.clone(), truncate_text_fields(v, max_chars));
            }
            Value::Object(truncated)
        }
        _ => value.clone(),
    }
}

/// Format a core error as JSON.
pub fn format_error(error: &EvolutionError) -> String {
    let mut out = json!({
        "error": error.to_string(),
        "code": error.code(),
        "success": false
    });
    if let Some(status) = error.status() {
        out["status"] = json!(status);
    }
    out.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_fields_in_array() {
        let value = json!([{"remoteJid": "a", "pushName": "Ana", "unreadCount": 1}]);
        assert_eq!(
            filter_fields(&value, "remoteJid, pushName"),
            json!([{"remoteJid": "a", "pushName": "Ana"}])
        );
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let value = json!({"text": "ããããã"});
        assert_eq!(truncate_text_fields(&value, 2), json!({"text": "ãã..."}));
    }

    #[test]
    fn test_format_error_includes_code_and_status() {
        let err = EvolutionError::Api {
            status: Some(502),
            body: "bad gateway".to_string(),
        };
        let out: Value = serde_json::from_str(&format_error(&err)).unwrap();
        assert_eq!(out["code"], "API_ERROR");
        assert_eq!(out["status"], 502);
        assert_eq!(out["success"], false);
    }
}
