//! Tool capabilities for gifforge pipelines.
//!
//! A step names a tool by id; the [`ToolRegistry`] maps that id to a [`Tool`]
//! implementation. [`CommandTool`] covers the common case of an external CLI
//! described in configuration, executed through [`ToolCommand`].

pub mod args;
pub mod command;
pub mod exec;
pub mod registry;
pub mod tool;
pub mod workspace;

pub use args::ArgContext;
pub use command::{ToolCommand, ToolOutput};
pub use exec::CommandTool;
pub use registry::{ToolInfo, ToolRegistry};
pub use tool::Tool;
pub use workspace::Workspace;
