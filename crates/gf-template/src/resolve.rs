//! Variable resolution and `{{token}}` substitution.
//!
//! Tokens take the form `{{name}}` or `{{name|default}}`. Substitution is a
//! single pass: inserted values are never re-scanned, and a token with no
//! value and no default stays in the text verbatim.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::{Params, Template, Value, VariableMap};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("token pattern is valid"));

/// Result of substituting one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    /// Names of tokens left in `text` because nothing resolved them.
    pub unresolved: Vec<String>,
}

impl Substitution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Build the resolved variable map for one invocation.
///
/// Precedence, lowest first:
/// 1. the named preset's overrides (ignored if the preset does not exist),
/// 2. declared defaults for names not yet set,
/// 3. every caller-supplied variable, unconditionally.
pub fn resolve_variables(
    template: &Template,
    user_vars: &VariableMap,
    preset: Option<&str>,
) -> VariableMap {
    let mut resolved = VariableMap::new();

    if let Some(name) = preset {
        match template.get_preset(name) {
            Some(p) => resolved.extend(p.values.clone()),
            None => tracing::debug!(template = %template.name, preset = name, "Preset not found"),
        }
    }

    for (name, spec) in &template.variables {
        if let Some(default) = &spec.default {
            if !resolved.contains_key(name) {
                resolved.insert(name.clone(), default.clone());
            }
        }
    }

    resolved.extend(user_vars.clone());
    resolved
}

impl Template {
    /// See [`resolve_variables`].
    pub fn resolve_variables(&self, user_vars: &VariableMap, preset: Option<&str>) -> VariableMap {
        resolve_variables(self, user_vars, preset)
    }
}

/// Substitute tokens in `text`, reporting which ones stayed unresolved.
pub fn substitute_tracked(text: &str, vars: &VariableMap) -> Substitution {
    let mut unresolved = Vec::new();
    let text = TOKEN
        .replace_all(text, |caps: &Captures<'_>| {
            let expr = &caps[1];
            match expr.split_once('|') {
                Some((name, default)) => match vars.get(name.trim()) {
                    Some(v) => render_value(v),
                    None => default.trim().to_string(),
                },
                None => match vars.get(expr.trim()) {
                    Some(v) => render_value(v),
                    None => {
                        unresolved.push(expr.trim().to_string());
                        caps[0].to_string()
                    }
                },
            }
        })
        .into_owned();
    Substitution { text, unresolved }
}

/// Substitute tokens in `text`.
pub fn substitute(text: &str, vars: &VariableMap) -> String {
    substitute_tracked(text, vars).text
}

/// Substitute tokens in every string leaf of a parameter tree.
///
/// Mappings are walked recursively; every other value passes through as is.
pub fn substitute_params(params: &Params, vars: &VariableMap) -> Params {
    let mut unresolved = Vec::new();
    substitute_params_tracked(params, vars, &mut unresolved)
}

/// Like [`substitute_params`], appending unresolved token names to `unresolved`.
pub fn substitute_params_tracked(
    params: &Params,
    vars: &VariableMap,
    unresolved: &mut Vec<String>,
) -> Params {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => {
                    let sub = substitute_tracked(s, vars);
                    unresolved.extend(sub.unresolved);
                    Value::String(sub.text)
                }
                Value::Object(nested) => {
                    Value::Object(substitute_params_tracked(nested, vars, unresolved))
                }
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Render a variable value for insertion into a string.
///
/// Strings are inserted without quotes, null as nothing, and lists or
/// mappings as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
