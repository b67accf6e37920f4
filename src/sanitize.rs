//! Result payload hygiene.
//!
//! Before a payload is dumped to the console it is stripped of runtime
//! bookkeeping: keys modules and connection plugins use to talk to the
//! engine, not to the operator. Stripping is recursive and idempotent, and
//! never touches the fields an operator reads (`msg`, `diff`, `warnings`,
//! `results`, failure details).

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::types::truthy;

/// Strip runtime-internal keys from a result payload.
///
/// Removes every key with a `_` prefix (recursively, through nested maps
/// and arrays) plus the module `invocation` echo. The input is not
/// mutated; applying the function to its own output is a no-op.
#[must_use]
pub fn sanitize_result(payload: &JsonMap<String, JsonValue>) -> JsonMap<String, JsonValue> {
    payload
        .iter()
        .filter(|(key, _)| !is_internal_key(key))
        .map(|(key, value)| (key.clone(), sanitize_value(value)))
        .collect()
}

fn is_internal_key(key: &str) -> bool {
    key.starts_with('_') || key == "invocation"
}

fn sanitize_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(sanitize_result(map)),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sanitize_value).collect()),
        other => other.clone(),
    }
}

/// Render a payload as the JSON dump appended to result lines.
///
/// The payload is sanitized first. `exception` is always withheld (the
/// exception rule renders it separately) and `diff` is withheld below
/// verbosity 3 (the diff hook renders it). The dump is pretty-printed when
/// the run is verbose (`verbosity > 2`) or the payload asks for it via
/// `_verbose_always`; compact otherwise. `serde_json` keeps map keys
/// sorted, so dumps are deterministic.
#[must_use]
pub fn dump_result(payload: &JsonMap<String, JsonValue>, verbosity: u8) -> String {
    let pretty = verbosity > 2 || truthy(payload.get("_verbose_always"));

    let mut clean = sanitize_result(payload);
    clean.remove("exception");
    if verbosity < 3 {
        clean.remove("diff");
    }

    let value = JsonValue::Object(clean);
    if pretty {
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

/// Extract the display label of a loop item from its payload.
///
/// Prefers the runtime-computed `_item_label`, falling back to the raw
/// `item`. Items marked `_no_log` are censored. Strings render bare, other
/// values as compact JSON, and a label-less item renders `null`.
#[must_use]
pub fn item_label(payload: &JsonMap<String, JsonValue>) -> String {
    if truthy(payload.get("_no_log")) {
        return "(censored due to no_log)".to_string();
    }

    let label = payload.get("_item_label").or_else(|| payload.get("item"));
    match label {
        Some(JsonValue::String(s)) => s.clone(),
        Some(value) => value.to_string(),
        None => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn payload(value: JsonValue) -> JsonMap<String, JsonValue> {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn strips_internal_keys_recursively() {
        let raw = payload(json!({
            "changed": true,
            "msg": "installed",
            "_internal": "noise",
            "invocation": {"module_args": {"name": "nginx"}},
            "results": [
                {"item": "a", "_connection_detail": "tcp"},
                {"item": "b", "nested": {"_hidden": 1, "kept": 2}}
            ]
        }));

        let clean = sanitize_result(&raw);
        assert_eq!(
            JsonValue::Object(clean),
            json!({
                "changed": true,
                "msg": "installed",
                "results": [
                    {"item": "a"},
                    {"item": "b", "nested": {"kept": 2}}
                ]
            })
        );
    }

    #[test]
    fn sanitize_is_idempotent() {
        let raw = payload(json!({
            "changed": true,
            "_runtime_internal": 1,
            "warnings": ["careful"],
            "diff": {"before": "a", "after": "b"},
            "results": [{"_x": 1, "item": "a"}]
        }));

        let once = sanitize_result(&raw);
        let twice = sanitize_result(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_keeps_operator_fields() {
        let raw = payload(json!({
            "msg": "boom",
            "diff": {"before": "x", "after": "y"},
            "warnings": ["w"],
            "stderr": "trace",
            "rc": 2
        }));

        let clean = sanitize_result(&raw);
        for key in ["msg", "diff", "warnings", "stderr", "rc"] {
            assert!(clean.contains_key(key), "lost operator field {key}");
        }
    }

    #[test]
    fn dump_hides_exception_and_low_verbosity_diff() {
        let raw = payload(json!({
            "changed": true,
            "exception": "Traceback ...",
            "diff": {"before": "a", "after": "b"},
            "msg": "done"
        }));

        let quiet = dump_result(&raw, 0);
        assert!(!quiet.contains("exception"));
        assert!(!quiet.contains("diff"));
        assert!(quiet.contains("\"msg\":\"done\""));

        let verbose = dump_result(&raw, 3);
        assert!(!verbose.contains("exception"));
        assert!(verbose.contains("diff"));
        // verbose dumps are pretty-printed
        assert!(verbose.contains('\n'));
    }

    #[test]
    fn dump_honors_verbose_always_marker() {
        let raw = payload(json!({"msg": "hi", "_verbose_always": true}));
        let dump = dump_result(&raw, 0);
        assert!(dump.contains('\n'));
        // the marker itself is internal and never dumped
        assert!(!dump.contains("_verbose_always"));
    }

    #[test]
    fn item_label_prefers_computed_label() {
        assert_eq!(
            item_label(&payload(json!({"_item_label": "nginx", "item": "raw"}))),
            "nginx"
        );
        assert_eq!(item_label(&payload(json!({"item": "raw"}))), "raw");
        assert_eq!(
            item_label(&payload(json!({"item": {"name": "nginx"}}))),
            r#"{"name":"nginx"}"#
        );
        assert_eq!(item_label(&payload(json!({}))), "null");
    }

    #[test]
    fn item_label_censors_no_log_items() {
        let label = item_label(&payload(json!({"item": "secret", "_no_log": true})));
        assert_eq!(label, "(censored due to no_log)");
    }
}
