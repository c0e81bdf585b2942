//! Unified error type for gifforge.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for the CLI to derive a process exit code via [`Error::exit_code`].

/// Unified error type covering all failure modes in gifforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A template document is missing or malformed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Variables could not be resolved (missing required value, wrong type,
    /// dangling `previous_output` reference).
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// A step references a tool that is not registered or not installed.
    #[error("Tool unavailable: {tool}")]
    ToolUnavailable {
        /// Identifier of the missing tool.
        tool: String,
    },

    /// An external tool returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A pipeline step failed; wraps the tool's diagnostic text.
    #[error("Step {step} failed [{tool}]: {message}")]
    StepFailed {
        /// Zero-based index of the failing step.
        step: usize,
        /// Tool the step invoked.
        tool: String,
        /// Diagnostic text of the underlying failure.
        message: String,
    },

    /// Configuration or manifest data is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to a process exit code (sysexits-style).
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Schema(_) => 65,
            Error::Resolution(_) => 64,
            Error::ToolUnavailable { .. } => 69,
            Error::Tool { .. } => 70,
            Error::StepFailed { .. } => 70,
            Error::Config(_) => 78,
            Error::Io { .. } => 74,
            Error::Internal(_) => 1,
        }
    }

    /// Convenience constructor for [`Error::Schema`].
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    /// Convenience constructor for [`Error::Resolution`].
    pub fn resolution(message: impl Into<String>) -> Self {
        Error::Resolution(message.into())
    }

    /// Convenience constructor for [`Error::ToolUnavailable`].
    pub fn tool_unavailable(tool: impl Into<String>) -> Self {
        Error::ToolUnavailable { tool: tool.into() }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::StepFailed`].
    pub fn step_failed(step: usize, tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StepFailed {
            step,
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_display() {
        let err = Error::schema("missing field: pipeline");
        assert_eq!(err.to_string(), "Schema error: missing field: pipeline");
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn resolution_display() {
        let err = Error::resolution("Required variable missing: video_path");
        assert_eq!(
            err.to_string(),
            "Resolution error: Required variable missing: video_path"
        );
        assert_eq!(err.exit_code(), 64);
    }

    #[test]
    fn tool_unavailable_display() {
        let err = Error::tool_unavailable("gifsicle");
        assert_eq!(err.to_string(), "Tool unavailable: gifsicle");
        assert_eq!(err.exit_code(), 69);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn step_failed_display() {
        let err = Error::step_failed(1, "gifsicle", "bad palette");
        assert_eq!(err.to_string(), "Step 1 failed [gifsicle]: bad palette");
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.exit_code(), 74);
    }

    #[test]
    fn config_display() {
        let err = Error::Config("manifest has no jobs".into());
        assert_eq!(err.to_string(), "Config error: manifest has no jobs");
        assert_eq!(err.exit_code(), 78);
    }
}
