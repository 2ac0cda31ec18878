//! Failure diagnostics
//!
//! Reduces a failure of any shape to one bounded string that can go straight
//! into a log line or an API error payload. Failures are described as JSON
//! values: an object with `name`, `message`, `cause` and arbitrary extra
//! properties, a bare string, or anything else. Typed errors are converted to
//! that shape with [`error_value`] first.
//!
//! Rules, first match wins:
//! 1. falsy values (`null`, `false`, `0`, `""`) give [`UNKNOWN_ERROR`]
//! 2. strings are returned unchanged
//! 3. objects with a `name` and/or `message` give `name: message`, followed by
//!    `cause=...` when a cause is present and `props={...}` for any other
//!    properties except `stack`
//! 4. everything else is serialized as JSON

use std::error::Error;

use serde_json::{Map, Value};

/// Returned for failures that carry no information at all
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Upper bound on the length of a diagnostic, in characters
pub const MAX_DIAGNOSTIC_LEN: usize = 1000;

const RESERVED_KEYS: [&str; 4] = ["name", "message", "cause", "stack"];

/// Normalizes a failure description into a bounded string.
pub fn normalize(value: &Value) -> String {
    truncate(describe(value))
}

/// Normalizes a typed error, walking its [`Error::source`] chain as causes.
pub fn normalize_error(err: &(dyn Error + 'static)) -> String {
    normalize(&error_value(err))
}

/// Describes a typed error as a diagnostic value.
pub fn error_value(err: &(dyn Error + 'static)) -> Value {
    let mut fields = Map::new();

    let message = err.to_string();
    if !message.is_empty() {
        fields.insert("message".to_string(), Value::String(message));
    }

    if let Some(source) = err.source() {
        fields.insert("cause".to_string(), error_value(source));
    }

    if fields.is_empty() {
        Value::Null
    } else {
        Value::Object(fields)
    }
}

fn describe(value: &Value) -> String {
    if is_falsy(value) {
        return UNKNOWN_ERROR.to_string();
    }

    match value {
        Value::String(s) => s.clone(),
        Value::Object(fields) => describe_object(fields).unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn describe_object(fields: &Map<String, Value>) -> Option<String> {
    let name = text_field(fields, "name");
    let message = text_field(fields, "message");

    if name.is_none() && message.is_none() {
        return None;
    }

    let mut parts: Vec<String> = name.into_iter().chain(message).collect();

    if let Some(cause) = fields.get("cause").filter(|cause| !cause.is_null()) {
        parts.push(format!("cause={}", describe(cause)));
    }

    let props: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if !props.is_empty() {
        parts.push(format!("props={}", Value::Object(props)));
    }

    Some(parts.join(": "))
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn truncate(mut diagnostic: String) -> String {
    if let Some((index, _)) = diagnostic.char_indices().nth(MAX_DIAGNOSTIC_LEN) {
        diagnostic.truncate(index);
    }

    diagnostic
}

#[cfg(test)]
mod tests {
    use std::{fmt, io};

    use serde_json::json;

    use super::*;

    #[test]
    fn test_name_and_message() {
        let value = json!({ "name": "TimeoutError", "message": "took too long" });

        assert_eq!(normalize(&value), "TimeoutError: took too long");
    }

    #[test]
    fn test_plain_string_is_returned_as_is() {
        assert_eq!(normalize(&json!("relay unavailable")), "relay unavailable");
    }

    #[test]
    fn test_falsy_values() {
        for value in [json!(null), json!(false), json!(0), json!("")] {
            assert_eq!(normalize(&value), UNKNOWN_ERROR, "{value} should be unknown");
        }
    }

    #[test]
    fn test_message_only() {
        assert_eq!(normalize(&json!({ "message": "boom" })), "boom");
    }

    #[test]
    fn test_cause_and_props() {
        let value = json!({
            "name": "SendError",
            "message": "relay refused",
            "cause": { "message": "connection reset" },
            "code": 421,
            "stack": "at send (worker.js:10)",
        });

        assert_eq!(
            normalize(&value),
            r#"SendError: relay refused: cause=connection reset: props={"code":421}"#
        );
    }

    #[test]
    fn test_string_cause() {
        let value = json!({ "message": "failed", "cause": "dns" });

        assert_eq!(normalize(&value), "failed: cause=dns");
    }

    #[test]
    fn test_object_without_name_or_message_is_serialized() {
        assert_eq!(normalize(&json!({ "status": 503 })), r#"{"status":503}"#);
        assert_eq!(normalize(&json!([1, 2])), "[1,2]");
        assert_eq!(normalize(&json!(true)), "true");
    }

    #[test]
    fn test_deeply_nested_causes_do_not_panic() {
        let mut value = json!({ "message": "root" });
        for depth in 0..100 {
            value = json!({ "message": format!("level {depth}"), "cause": value });
        }

        let diagnostic = normalize(&value);

        assert!(diagnostic.starts_with("level 99: cause=level 98"));
        assert!(diagnostic.chars().count() <= MAX_DIAGNOSTIC_LEN);
    }

    #[test]
    fn test_output_is_capped() {
        let value = json!("é".repeat(MAX_DIAGNOSTIC_LEN * 2));

        assert_eq!(normalize(&value).chars().count(), MAX_DIAGNOSTIC_LEN);
    }

    #[derive(Debug)]
    struct Outer(io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("could not reach relay")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_chain() {
        let err = Outer(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));

        assert_eq!(normalize_error(&err), "could not reach relay: cause=refused");
    }

    #[derive(Debug)]
    struct Silent;

    impl fmt::Display for Silent {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Ok(())
        }
    }

    impl Error for Silent {}

    #[test]
    fn test_silent_error_is_unknown() {
        assert_eq!(normalize_error(&Silent), UNKNOWN_ERROR);
    }
}
