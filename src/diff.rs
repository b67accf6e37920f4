//! Diff payload formatting.
//!
//! A result's `diff` key carries either one diff object or a list of them.
//! Each object is one of three shapes: a `before`/`after` pair (diffed
//! here as a unified diff), a `prepared` string a module already rendered
//! (passed through verbatim), or binary markers (rendered as skip
//! notices). Change-free payloads produce nothing.

use colored::Colorize;
use serde_json::Value as JsonValue;
use similar::TextDiff;

use crate::display::{COLOR_DIFF_ADD, COLOR_DIFF_META, COLOR_DIFF_REMOVE};
use crate::types::truthy;

/// Number of unchanged context lines shown around each change.
const CONTEXT_LINES: usize = 3;

/// Format a diff payload for display.
///
/// Returns `None` when the payload holds no visible change.
#[must_use]
pub fn format_diff(diff: &JsonValue, use_color: bool) -> Option<String> {
    let output = match diff {
        JsonValue::Array(entries) => entries
            .iter()
            .filter_map(|entry| format_diff(entry, use_color))
            .collect::<Vec<_>>()
            .join(""),
        JsonValue::Object(map) => {
            let mut output = String::new();

            if truthy(map.get("src_binary")) {
                output.push_str("diff skipped: source file appears to be binary\n");
            }
            if truthy(map.get("dst_binary")) {
                output.push_str("diff skipped: destination file appears to be binary\n");
            }

            if map.contains_key("before") && map.contains_key("after") {
                let before = diffable_text(map.get("before"));
                let after = diffable_text(map.get("after"));
                if before != after {
                    let before_label = header_label("before", map.get("before_header"));
                    let after_label = header_label("after", map.get("after_header"));
                    output.push_str(&unified_diff(
                        &before,
                        &after,
                        &before_label,
                        &after_label,
                        use_color,
                    ));
                }
            } else if let Some(JsonValue::String(prepared)) = map.get("prepared") {
                // Pre-rendered by the module; shown as-is.
                output.push_str(prepared);
            }

            output
        }
        _ => String::new(),
    };

    if output.is_empty() {
        None
    } else {
        Some(output)
    }
}

/// Turn a `before`/`after` value into diffable text.
///
/// Structured values are pretty-printed JSON so the diff is line-oriented;
/// an absent or null side reads as empty (file created or removed).
fn diffable_text(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => {
            let mut text =
                serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
            text.push('\n');
            text
        }
    }
}

fn header_label(side: &str, header: Option<&JsonValue>) -> String {
    match header {
        Some(JsonValue::String(h)) if !h.is_empty() => format!("{side}: {h}"),
        _ => side.to_string(),
    }
}

fn unified_diff(
    before: &str,
    after: &str,
    before_label: &str,
    after_label: &str,
    use_color: bool,
) -> String {
    let text_diff = TextDiff::from_lines(before, after);
    let unified = text_diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(before_label, after_label)
        .to_string();

    if !use_color {
        return unified;
    }

    let mut colored_output = String::new();
    for line in unified.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        let painted = if body.starts_with("@@") {
            body.color(COLOR_DIFF_META).to_string()
        } else if body.starts_with('+') {
            body.color(COLOR_DIFF_ADD).to_string()
        } else if body.starts_with('-') {
            body.color(COLOR_DIFF_REMOVE).to_string()
        } else {
            body.to_string()
        };
        colored_output.push_str(&painted);
        colored_output.push_str(newline);
    }
    colored_output
}
