//! The [`Tool`] trait: one external capability a pipeline step can invoke.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gf_template::Params;

/// An external tool addressed by a step's `tool` id.
///
/// Implementors wrap whatever actually does the media work (a CLI, a model
/// server, an in-process library). The orchestrator only ever calls
/// [`available`](Tool::available) and [`execute`](Tool::execute).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Identifier steps use to refer to this tool (e.g. `"gifsicle"`).
    fn id(&self) -> &str;

    /// Whether the tool can be invoked right now.
    fn available(&self) -> bool;

    /// Run `operation` reading `input` and writing `output`.
    ///
    /// Returns the path of the produced artifact, normally `output`.
    ///
    /// # Errors
    ///
    /// [`gf_core::Error::ToolUnavailable`] if the tool vanished since the
    /// availability check, or [`gf_core::Error::Tool`] carrying the tool's
    /// diagnostic text on any execution failure.
    async fn execute(
        &self,
        operation: &str,
        input: &Path,
        output: &Path,
        params: &Params,
    ) -> gf_core::Result<PathBuf>;
}
