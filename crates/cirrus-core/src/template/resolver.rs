//! PathResolver - テンプレート文字列を message に対して解決する
//!
//! 解決に失敗しても error にはしない。マッチしない `{{…}}` は null、
//! `{[…]}` は空配列、`{…}` の埋め込みは元の文字列のまま残る。

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::jsonpath::JsonPath;

static INTERPOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^{}]+)\}").expect("interpolation pattern is a valid regex")
});

/// Resolve one template string against `doc`.
pub fn resolve_path_str(doc: &Value, template: &str) -> Value {
    if let Some(path) = strip_wrapper(template, "{{", "}}") {
        return matches(doc, path)
            .into_iter()
            .next()
            .cloned()
            .unwrap_or(Value::Null);
    }

    if let Some(path) = strip_wrapper(template, "{[", "]}") {
        return Value::Array(matches(doc, path).into_iter().cloned().collect());
    }

    let interpolated = INTERPOLATION.replace_all(template, |caps: &Captures<'_>| {
        match matches(doc, &caps[1]).into_iter().next() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        }
    });
    Value::String(interpolated.into_owned())
}

/// Resolve every string leaf of `template`; other scalars pass through.
pub fn resolve_object(doc: &Value, template: &Value) -> Value {
    match template {
        Value::String(s) => resolve_path_str(doc, s),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_object(doc, item))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_object(doc, v)))
                .collect(),
        ),
        _ => template.clone(),
    }
}

fn strip_wrapper<'a>(s: &'a str, open: &str, close: &str) -> Option<&'a str> {
    if s.len() < open.len() + close.len() {
        return None;
    }
    s.strip_prefix(open)?.strip_suffix(close)
}

/// Empty or unparseable paths count as "no match".
fn matches<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    if path.trim().is_empty() {
        return Vec::new();
    }
    JsonPath::parse(path)
        .map(|p| p.find(doc))
        .unwrap_or_default()
}
