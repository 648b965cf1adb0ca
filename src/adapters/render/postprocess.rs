//! Post-processing of rendered JSON
//!
//! Templates emit JSON text with gaps wherever the source message had no
//! value. The output is tidied before it leaves the converter: trailing commas
//! left by loops are dropped, empty values are removed recursively and the
//! result is pretty-printed.

use crate::domain::ConverterError;
use serde_json::Value;

/// Turns raw template output into the final JSON document
pub fn finalize_output(rendered: &str) -> Result<String, ConverterError> {
    let cleaned = strip_trailing_commas(rendered);
    let mut value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        ConverterError::Render(format!("Template output is not valid JSON: {e}"))
    })?;

    prune_empty(&mut value);

    serde_json::to_string_pretty(&value)
        .map_err(|e| ConverterError::Render(format!("Failed to serialize output: {e}")))
}

/// Removes commas that directly precede a closing `]` or `}`
///
/// String literals are left untouched.
pub fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_comma: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            ',' => {
                if pending_comma.is_none() {
                    pending_comma = Some(out.len());
                    out.push(c);
                }
                // A second comma in a row means an empty element: drop it.
            }
            ']' | '}' => {
                if let Some(pos) = pending_comma.take() {
                    out.remove(pos);
                }
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            '"' => {
                pending_comma = None;
                in_string = true;
                out.push(c);
            }
            _ => {
                pending_comma = None;
                out.push(c);
            }
        }
    }

    leading_comma_free(&out)
}

/// Drops commas that directly follow an opening `[` or `{`
fn leading_comma_free(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut after_open = false;
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '[' | '{' => {
                after_open = true;
                out.push(c);
            }
            ',' if after_open => {}
            c if c.is_whitespace() => out.push(c),
            '"' => {
                after_open = false;
                in_string = true;
                out.push(c);
            }
            _ => {
                after_open = false;
                out.push(c);
            }
        }
    }

    out
}

/// Recursively removes nulls, empty strings, empty arrays and empty objects
///
/// Returns whether `value` itself ended up empty.
pub fn prune_empty(value: &mut Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => {
            items.retain_mut(|item| !prune_empty(item));
            items.is_empty()
        }
        Value::Object(map) => {
            let empty: Vec<String> = map
                .iter_mut()
                .filter_map(|(key, v)| prune_empty(v).then(|| key.clone()))
                .collect();
            for key in empty {
                map.remove(&key);
            }
            map.is_empty()
        }
        Value::Bool(_) | Value::Number(_) => false,
    }
}
