//! Instruction Templating
//!
//! Agent instructions reference session state with `{key}` placeholders.
//! Before each model call the placeholders are replaced with the current
//! state values, which is how one agent's output becomes part of the next
//! agent's prompt.
//!
//! Rules:
//! - `{key}` - replaced with the value; a missing key is an error
//! - `{key?}` - optional; a missing key becomes the empty string
//! - `{app:key}`, `{user:key}`, `{temp:key}` - scoped keys, same rules
//! - anything that is not a valid key name (e.g. `{ "a": 1 }`) is left as-is

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::state::{StateMap, APP_PREFIX, TEMP_PREFIX, USER_PREFIX};

// Runs of braces around brace-free content: {x}, {{x}}, {x?}
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{+[^{}]*\}+").unwrap());

/// Render an instruction template against session state.
pub fn inject_state(template: &str, state: &StateMap) -> CoreResult<String> {
    let mut missing: Option<String> = None;

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let whole = &caps[0];
        let inner = whole.trim_start_matches('{').trim_end_matches('}').trim();

        let (name, optional) = match inner.strip_suffix('?') {
            Some(stripped) => (stripped.trim(), true),
            None => (inner, false),
        };

        if !is_valid_state_name(name) {
            return whole.to_string();
        }

        match state.get(name) {
            Some(value) => value_to_text(value),
            None if optional => String::new(),
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                whole.to_string()
            }
        }
    });

    match missing {
        Some(name) => Err(CoreError::template(format!(
            "Context variable not found: `{}`",
            name
        ))),
        None => Ok(rendered.into_owned()),
    }
}

/// List the required placeholders of a template (optional ones excluded).
pub fn required_keys(template: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for m in PLACEHOLDER.find_iter(template) {
        let inner = m
            .as_str()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .trim();
        if inner.ends_with('?') || !is_valid_state_name(inner) {
            continue;
        }
        if !keys.iter().any(|k| k == inner) {
            keys.push(inner.to_string());
        }
    }
    keys
}

/// Whether `name` is an identifier, optionally behind a scope prefix.
pub fn is_valid_state_name(name: &str) -> bool {
    let bare = [APP_PREFIX, USER_PREFIX, TEMP_PREFIX]
        .iter()
        .find_map(|p| name.strip_prefix(p))
        .unwrap_or(name);
    is_identifier(bare)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
