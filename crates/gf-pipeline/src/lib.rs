//! Pipeline execution for gifforge: single runs and batches.

pub mod batch;
pub mod manifest;
pub mod orchestrator;

pub use batch::{
    jobs_from_directory, BatchJob, BatchMode, BatchOutcome, BatchProcessor, BatchResult, JobRecord,
};
pub use manifest::{Manifest, ManifestJob};
pub use orchestrator::{ExecutionResult, PipelineOrchestrator};

/// Serialize a `Duration` as fractional seconds.
pub(crate) mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}
