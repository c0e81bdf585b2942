//! Placeholder substitution for command-line argument templates.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use gf_template::{resolve::render_value, Params, Value};
use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").expect("placeholder pattern is valid"));

/// Variable context for one command invocation.
///
/// Placeholders take the form `{name}`. Unknown placeholders are left as is,
/// so literal braces in arguments survive.
///
/// # Example
///
/// ```
/// use gf_tools::ArgContext;
/// use std::path::Path;
///
/// let ctx = ArgContext::new()
///     .with_paths(Path::new("/in/clip.mp4"), Path::new("/tmp/clip.gif"))
///     .with_var("colors", "128");
///
/// assert_eq!(ctx.substitute("{filestem}-{colors}.gif"), "clip-128.gif");
/// assert_eq!(ctx.substitute("--out={output}"), "--out=/tmp/clip.gif");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArgContext {
    vars: BTreeMap<String, String>,
}

impl ArgContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set path-related variables.
    ///
    /// - `{input}`, `{output}`: full paths
    /// - `{filename}`, `{filestem}`, `{extension}`, `{dirname}`: input components
    /// - `{output_dir}`: parent directory of the output
    pub fn with_paths(mut self, input: &Path, output: &Path) -> Self {
        self.set("input", input.display().to_string());
        self.set("output", output.display().to_string());

        if let Some(name) = input.file_name() {
            self.set("filename", name.to_string_lossy());
        }
        if let Some(stem) = input.file_stem() {
            self.set("filestem", stem.to_string_lossy());
        }
        if let Some(ext) = input.extension() {
            self.set("extension", ext.to_string_lossy());
        }
        if let Some(parent) = input.parent() {
            self.set("dirname", parent.display().to_string());
        }
        if let Some(parent) = output.parent() {
            self.set("output_dir", parent.display().to_string());
        }

        self
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.set("operation", operation);
        self
    }

    /// Flatten a parameter tree into variables: `{key}` for top-level values
    /// and `{outer.inner}` for nested mappings.
    pub fn with_params(mut self, params: &Params) -> Self {
        self.flatten("", params);
        self
    }

    fn flatten(&mut self, prefix: &str, params: &Params) {
        for (key, value) in params {
            let name = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                Value::Object(nested) => self.flatten(&name, nested),
                other => self.set(&name, render_value(other)),
            }
        }
    }

    /// Add a custom variable.
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    /// Set a variable.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    /// Get a variable value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Substitute placeholders in a string. Single pass: substituted values
    /// are not scanned again.
    pub fn substitute(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures<'_>| match self.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Substitute placeholders in a list of strings.
    pub fn substitute_all(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.substitute(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn path_variables() {
        let ctx = ArgContext::new().with_paths(
            &PathBuf::from("/input/clip.mp4"),
            &PathBuf::from("/tmp/run/job-step0.gif"),
        );

        assert_eq!(ctx.substitute("{input}"), "/input/clip.mp4");
        assert_eq!(ctx.substitute("{filestem}.gif"), "clip.gif");
        assert_eq!(ctx.substitute("{extension}"), "mp4");
        assert_eq!(ctx.substitute("{output_dir}/palette.png"), "/tmp/run/palette.png");
    }

    #[test]
    fn params_flattened() {
        let params = json!({
            "fps": 15,
            "lossy": true,
            "text_overlay": {"text": "Hello", "font_size": 24}
        });
        let ctx = ArgContext::new().with_params(params.as_object().unwrap());

        assert_eq!(ctx.substitute("-r {fps}"), "-r 15");
        assert_eq!(ctx.substitute("{lossy}"), "true");
        assert_eq!(
            ctx.substitute("{text_overlay.text}@{text_overlay.font_size}"),
            "Hello@24"
        );
    }

    #[test]
    fn unknown_placeholder_kept() {
        let ctx = ArgContext::new().with_var("a", "1");
        assert_eq!(ctx.substitute("{a} {b}"), "1 {b}");
        assert_eq!(ctx.substitute("scale=iw*{a}:-1"), "scale=iw*1:-1");
    }

    #[test]
    fn substitution_is_single_pass() {
        let ctx = ArgContext::new().with_var("a", "{b}").with_var("b", "no");
        assert_eq!(ctx.substitute("{a}"), "{b}");
    }

    #[test]
    fn substitute_all_and_operation() {
        let ctx = ArgContext::new().with_operation("optimize").with_var("level", "3");
        let templates = vec!["--{operation}".to_string(), "-O{level}".to_string()];
        assert_eq!(ctx.substitute_all(&templates), vec!["--optimize", "-O3"]);
    }
}
