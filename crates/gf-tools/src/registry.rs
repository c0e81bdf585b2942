//! Tool lookup by id.
//!
//! The [`ToolRegistry`] is built once, before any run starts, and shared
//! read-only (behind an `Arc`) by every concurrent pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use gf_core::config::CommandToolConfig;
use serde::Serialize;

use crate::exec::CommandTool;
use crate::tool::Tool;

/// Availability of one tool, as reported by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    pub id: String,
    pub registered: bool,
    pub available: bool,
}

/// Registry of tools keyed by id.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one [`CommandTool`] per configured entry.
    pub fn from_config(tools: &BTreeMap<String, CommandToolConfig>) -> Self {
        let mut registry = Self::new();
        for (id, config) in tools {
            registry.register(Arc::new(CommandTool::new(id.clone(), config.clone())));
        }
        tracing::debug!(tools = ?registry.ids(), "Tool registry built");
        registry
    }

    /// Add a tool, replacing any previous tool with the same id.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let id = tool.id().to_string();
        if self.tools.insert(id.clone(), tool).is_some() {
            tracing::debug!(tool = %id, "Replaced registered tool");
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).cloned()
    }

    /// Return the tool registered under `id` if it is available.
    ///
    /// # Errors
    ///
    /// [`gf_core::Error::ToolUnavailable`] when no tool is registered under
    /// `id` or the registered tool reports itself unavailable.
    pub fn require(&self, id: &str) -> gf_core::Result<Arc<dyn Tool>> {
        match self.tools.get(id) {
            Some(tool) if tool.available() => Ok(Arc::clone(tool)),
            _ => Err(gf_core::Error::tool_unavailable(id)),
        }
    }

    /// Availability of each id in `ids`. Unregistered ids map to `false`.
    pub fn check<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, bool> {
        ids.into_iter()
            .map(|id| {
                let available = self.tools.get(id).is_some_and(|t| t.available());
                (id.to_string(), available)
            })
            .collect()
    }

    /// Availability details for `ids`, or every registered tool when `ids`
    /// is empty.
    pub fn check_all(&self, ids: &[&str]) -> Vec<ToolInfo> {
        let ids: Vec<&str> = if ids.is_empty() {
            self.tools.keys().map(String::as_str).collect()
        } else {
            ids.to_vec()
        };
        ids.into_iter()
            .map(|id| match self.tools.get(id) {
                Some(tool) => ToolInfo {
                    id: id.to_string(),
                    registered: true,
                    available: tool.available(),
                },
                None => ToolInfo {
                    id: id.to_string(),
                    registered: false,
                    available: false,
                },
            })
            .collect()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
