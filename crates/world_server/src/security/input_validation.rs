//! Structural validation of incoming JSON messages.
//!
//! Sheets and the world description are free text, so content is not
//! filtered for markup; only the shape and size of a message are checked.

use super::SecurityError;
use crate::config::SecurityConfig;
use serde_json::Value;

/// Most control characters a single string may carry (tabs and newlines
/// excluded).
const MAX_CONTROL_CHARS: usize = 5;

/// Validates a JSON message against the configured limits
pub fn validate_json_message(message: &[u8], config: &SecurityConfig) -> Result<(), SecurityError> {
    if message.len() > config.max_message_size {
        return Err(SecurityError::MessageTooLarge(message.len()));
    }

    let json: Value = serde_json::from_slice(message)
        .map_err(|e| SecurityError::InvalidMessageFormat(e.to_string()))?;

    validate_json_value(&json, 0, config)
}

/// Recursively validates a JSON value
fn validate_json_value(value: &Value, depth: usize, config: &SecurityConfig) -> Result<(), SecurityError> {
    if depth > config.max_json_depth {
        return Err(SecurityError::InvalidMessageFormat(
            "JSON nesting too deep".to_string(),
        ));
    }

    match value {
        Value::String(s) => validate_string(s, config)?,
        Value::Array(arr) => {
            if arr.len() > config.max_collection_size {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "Array too large: {} elements",
                    arr.len()
                )));
            }
            for item in arr {
                validate_json_value(item, depth + 1, config)?;
            }
        }
        Value::Object(obj) => {
            if obj.len() > config.max_collection_size {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "Object too large: {} keys",
                    obj.len()
                )));
            }
            for (key, val) in obj {
                validate_string(key, config)?;
                validate_json_value(val, depth + 1, config)?;
            }
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }

    Ok(())
}

fn validate_string(s: &str, config: &SecurityConfig) -> Result<(), SecurityError> {
    if s.len() > config.max_string_length {
        return Err(SecurityError::InvalidMessageFormat(format!(
            "String too long: {} bytes",
            s.len()
        )));
    }
    if s.contains('\0') {
        return Err(SecurityError::MaliciousContent);
    }
    let control_chars = s
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        .count();
    if control_chars > MAX_CONTROL_CHARS {
        return Err(SecurityError::MaliciousContent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_messages() {
        let config = SecurityConfig::default();
        let msg = br#"{"namespace":"characters","event":"update","data":{"id":"c1","talents":"<b>Bold</b>\nLine two"}}"#;
        assert!(validate_json_message(msg, &config).is_ok());
    }

    #[test]
    fn rejects_malformed_and_oversized_input() {
        let config = SecurityConfig {
            max_message_size: 64,
            max_string_length: 8,
            max_json_depth: 2,
            ..SecurityConfig::default()
        };

        assert!(matches!(
            validate_json_message(b"{not json", &config),
            Err(SecurityError::InvalidMessageFormat(_))
        ));
        assert!(matches!(
            validate_json_message(&[b' '; 65], &config),
            Err(SecurityError::MessageTooLarge(65))
        ));
        assert!(validate_json_message(br#"{"a":"123456789"}"#, &config).is_err());
        assert!(validate_json_message(br#"{"a":{"b":{"c":{"d":1}}}}"#, &config).is_err());
    }

    #[test]
    fn rejects_null_bytes() {
        let config = SecurityConfig::default();
        assert!(matches!(
            validate_json_message(br#"{"name":"a\u0000b"}"#, &config),
            Err(SecurityError::MaliciousContent)
        ));
    }
}
