//! gf-core: shared error type and application configuration.
//!
//! This crate is the foundational dependency for all other gf-* crates,
//! providing the unified [`Error`] that every pipeline stage reports through
//! and the [`config::Config`] value that is built once at process start and
//! threaded explicitly into constructors.

pub mod config;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use config::Config;
pub use error::{Error, Result};
