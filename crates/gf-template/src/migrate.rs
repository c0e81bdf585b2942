//! Legacy step migration.
//!
//! Older templates describe a step as a tool plus an unstructured config map.
//! [`RawStep::classify`] decides which wire shape a step uses and
//! [`normalize`] turns either shape into a canonical [`Step`]. Normalization
//! is pure: the same raw step at the same position always yields the same
//! canonical step.

use crate::model::{LegacyShape, Params, Provenance, Step, Value};

/// Variable holding the caller-supplied source artifact.
pub const SOURCE_VARIABLE: &str = "video_path";

/// Variable holding the caller-supplied destination artifact.
pub const OUTPUT_VARIABLE: &str = "output_path";

/// Sentinel that resolves to the preceding step's produced artifact.
pub const PREVIOUS_OUTPUT: &str = "previous_output";

/// A step exactly as the document spelled it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawStep {
    /// Carries `operation`, `input` and `params`.
    Canonical {
        tool: String,
        operation: String,
        input: String,
        output: Option<String>,
        params: Params,
    },
    /// Carries `tool` plus a config map somewhere.
    Legacy {
        tool: String,
        config: Params,
        shape: LegacyShape,
        operation: Option<String>,
        input: Option<String>,
        output: Option<String>,
    },
}

impl RawStep {
    /// Decide the wire shape of one pipeline entry.
    ///
    /// `index` is zero-based and only used for error messages.
    pub fn classify(index: usize, value: &Value) -> gf_core::Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            gf_core::Error::schema(format!("step {} must be a mapping", index + 1))
        })?;

        let tool = string_field(map, "tool", index)?.ok_or_else(|| {
            gf_core::Error::schema(format!("step {} missing required field: tool", index + 1))
        })?;
        let operation = string_field(map, "operation", index)?;
        let input = string_field(map, "input", index)?;
        let output = string_field(map, "output", index)?;
        let params = match map.get("params") {
            None | Some(Value::Null) => None,
            Some(Value::Object(p)) => Some(p.clone()),
            Some(_) => {
                return Err(gf_core::Error::schema(format!(
                    "step {} params must be a mapping",
                    index + 1
                )))
            }
        };

        match (operation, input, params) {
            (Some(operation), Some(input), Some(params)) => Ok(RawStep::Canonical {
                tool,
                operation,
                input,
                output,
                params,
            }),
            (operation, input, params) => {
                let (config, shape) = match (map.get("config"), params) {
                    (Some(Value::Object(c)), _) => (c.clone(), LegacyShape::ConfigMap),
                    (Some(Value::Null) | None, Some(p)) => (p, LegacyShape::ParamsMap),
                    (Some(Value::Null) | None, None) => (Params::new(), LegacyShape::Bare),
                    (Some(_), _) => {
                        return Err(gf_core::Error::schema(format!(
                            "step {} config must be a mapping",
                            index + 1
                        )))
                    }
                };
                Ok(RawStep::Legacy {
                    tool,
                    config,
                    shape,
                    operation,
                    input,
                    output,
                })
            }
        }
    }
}

fn string_field(
    map: &serde_json::Map<String, Value>,
    key: &str,
    index: usize,
) -> gf_core::Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(gf_core::Error::schema(format!(
            "step {} field '{key}' must be a string",
            index + 1
        ))),
    }
}

/// Turn a raw step at position `index` of `total` into canonical form.
///
/// Canonical steps keep their fields; a missing output is filled the same way
/// a legacy step's would be. Legacy steps get an inferred operation, input and
/// output wherever the document did not spell one out.
pub fn normalize(raw: RawStep, index: usize, total: usize) -> Step {
    match raw {
        RawStep::Canonical {
            tool,
            operation,
            input,
            output,
            params,
        } => Step {
            tool,
            operation,
            input,
            output: output.unwrap_or_else(|| infer_output(index, total)),
            params,
            provenance: Provenance::Canonical,
        },
        RawStep::Legacy {
            tool,
            config,
            shape,
            operation,
            input,
            output,
        } => Step {
            operation: operation.unwrap_or_else(|| infer_operation(&tool, &config).to_string()),
            input: input.unwrap_or_else(|| infer_input(index)),
            output: output.unwrap_or_else(|| infer_output(index, total)),
            tool,
            params: config,
            provenance: Provenance::Migrated { original: shape },
        },
    }
}

/// Classify and normalize a whole pipeline.
pub fn normalize_pipeline(steps: &[Value]) -> gf_core::Result<Vec<Step>> {
    let total = steps.len();
    steps
        .iter()
        .enumerate()
        .map(|(i, v)| RawStep::classify(i, v).map(|raw| normalize(raw, i, total)))
        .collect()
}

/// Infer the operation a legacy step performs from its tool and config.
pub fn infer_operation(tool: &str, config: &Params) -> &'static str {
    match tool {
        "gifcurry" => {
            if config.get("text_overlay").is_some_and(is_truthy) {
                "create_gif_with_text"
            } else {
                "create_gif"
            }
        }
        "gifsicle" => "optimize",
        "liveportrait" => "animate_portrait",
        "first-order-model" => "transfer_motion",
        "backgroundremover" => "remove_background",
        "neural-style" => "apply_style",
        "ffmpeg" | "imagemagick" => {
            if config.contains_key("filter") {
                "apply_filter"
            } else {
                "convert"
            }
        }
        _ => "process",
    }
}

/// First step reads the caller's source; later steps chain.
pub fn infer_input(index: usize) -> String {
    if index == 0 {
        format!("{{{{{SOURCE_VARIABLE}}}}}")
    } else {
        format!("{{{{{PREVIOUS_OUTPUT}}}}}")
    }
}

/// Last step writes the caller's destination; others a per-index temp name.
pub fn infer_output(index: usize, total: usize) -> String {
    if index + 1 == total {
        format!("{{{{{OUTPUT_VARIABLE}}}}}")
    } else {
        format!("temp_step_{index}.gif")
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
