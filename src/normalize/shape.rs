//! Structural shape detection for raw entry documents.
//!
//! Detection only looks at which keys are present and what type they hold;
//! the file name plays no part.

use serde_json::{Map, Value};

use super::{ErrorKind, NormalizationError};

/// Keys that mark a container document, in preference order.
const CONTAINER_KEYS: &[&str] = &["servers", "entries"];

/// One of the three accepted document shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawShape {
    /// Array of independent entry objects.
    Container(Vec<Value>),
    /// Entry with an explicit `versions` array.
    Versioned(Map<String, Value>),
    /// Entry whose top level is itself the only version.
    Flat(Map<String, Value>),
}

/// Decode raw bytes into a JSON value.  JSON is tried first, then YAML; the
/// file extension is not consulted.
pub fn parse_document(path: &str, content: &[u8]) -> Result<Value, NormalizationError> {
    let json_err = match serde_json::from_slice::<Value>(content) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    serde_yaml::from_slice::<Value>(content).map_err(|yaml_err| {
        NormalizationError::new(
            path,
            ErrorKind::Parse,
            format!("invalid document: not JSON ({json_err}) and not YAML ({yaml_err})"),
        )
    })
}

/// Classify a top-level document.
pub fn detect(value: Value) -> Result<RawShape, String> {
    let Value::Object(mut map) = value else {
        return Err("document is not an object".to_string());
    };

    for key in CONTAINER_KEYS {
        if matches!(map.get(*key), Some(Value::Array(_))) {
            if let Some(Value::Array(elements)) = map.remove(*key) {
                return Ok(RawShape::Container(elements));
            }
        }
    }

    classify_entry(map)
}

/// Classify one container element.  Elements may carry the
/// `{"server": {...}, "_meta": {...}}` wrapper emitted by the compat list
/// endpoint; nested containers are rejected.
pub fn detect_element(value: Value) -> Result<RawShape, String> {
    let Value::Object(mut map) = value else {
        return Err("element is not an object".to_string());
    };
    if let Some(Value::Object(inner)) = map.get("server") {
        if !inner.is_empty() && !map.contains_key("name") {
            if let Some(Value::Object(inner)) = map.remove("server") {
                map = inner;
            }
        }
    }
    if CONTAINER_KEYS
        .iter()
        .any(|key| matches!(map.get(*key), Some(Value::Array(_))))
    {
        return Err("nested container is not allowed".to_string());
    }
    classify_entry(map)
}

fn classify_entry(map: Map<String, Value>) -> Result<RawShape, String> {
    match map.get("versions") {
        Some(Value::Array(_)) => return Ok(RawShape::Versioned(map)),
        Some(_) => return Err("`versions` must be an array".to_string()),
        None => {}
    }
    if map.contains_key("version") {
        return Ok(RawShape::Flat(map));
    }
    Err("expected a `servers` array, a `versions` array, or a top-level `version`".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn container_wins_over_entry_keys() {
        let shape = detect(json!({"servers": [], "version": "1.0.0"})).unwrap();
        assert_eq!(shape, RawShape::Container(vec![]));
    }

    #[test]
    fn versions_array_means_versioned() {
        let shape = detect(json!({"name": "a.b/c", "versions": [], "version": "1"})).unwrap();
        assert!(matches!(shape, RawShape::Versioned(_)));
    }

    #[test]
    fn top_level_version_means_flat() {
        let shape = detect(json!({"name": "a.b/c", "version": "1"})).unwrap();
        assert!(matches!(shape, RawShape::Flat(_)));
    }

    #[test]
    fn no_recognised_keys_is_an_error() {
        assert!(detect(json!({"name": "a.b/c"})).is_err());
        assert!(detect(json!(["x"])).is_err());
        assert!(detect(json!({"versions": "1.0.0"})).is_err());
    }

    #[test]
    fn element_wrapper_is_unwrapped() {
        let shape = detect_element(json!({
            "server": {"name": "a.b/c", "version": "1.0.0"},
            "_meta": {}
        }))
        .unwrap();
        match shape {
            RawShape::Flat(map) => assert_eq!(map.get("name"), Some(&json!("a.b/c"))),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn nested_container_is_rejected() {
        assert!(detect_element(json!({"servers": []})).is_err());
    }

    #[test]
    fn decoding_ignores_the_extension() {
        let value = parse_document("x.json", b"version: '1'\n").unwrap();
        assert_eq!(value, json!({"version": "1"}));
        let value = parse_document("x.yml", br#"{"version": "1"}"#).unwrap();
        assert_eq!(value, json!({"version": "1"}));
    }

    #[test]
    fn undecodable_bytes_are_a_parse_error() {
        let err = parse_document("x.json", b"{\"version\": [1,").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.reason.contains("not YAML"));
    }
}
