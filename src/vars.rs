use anyhow::{bail, Result};
use gf_template::{Value, VariableMap};

/// Parse a `key=value` pair. The value is read as a YAML scalar, so
/// `width=640` yields an integer and `loop=true` a boolean.
pub fn parse_var(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("invalid variable '{raw}': expected KEY=VALUE");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid variable '{raw}': empty name");
    }
    Ok((key.to_string(), parse_scalar(value)))
}

fn parse_scalar(value: &str) -> Value {
    if value.is_empty() {
        return Value::String(String::new());
    }
    match serde_yaml::from_str::<Value>(value) {
        Ok(v @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => v,
        _ => Value::String(value.to_string()),
    }
}

/// Collect repeated `--var` flags; later flags win.
pub fn parse_vars(raw: &[String]) -> Result<VariableMap> {
    let mut vars = VariableMap::new();
    for item in raw {
        let (key, value) = parse_var(item)?;
        vars.insert(key, value);
    }
    Ok(vars)
}
