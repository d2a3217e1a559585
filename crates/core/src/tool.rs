//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the agent act: search the web, run commands, look up
//! the weather, or end the run. The registry resolves names, decodes
//! arguments, and folds every failure into a [`ToolResult`] so one broken
//! tool never aborts the control loop.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output text, or the error description on failure
    pub output: String,

    /// Optional base64-encoded image produced by the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            base64_image: None,
            data: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: error.into(),
            base64_image: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_image(mut self, base64_image: impl Into<String>) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }
}

/// Tool arguments as they arrive from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    /// JSON text, decoded by the registry before dispatch
    Raw(String),
    /// Already-decoded arguments
    Structured(serde_json::Value),
}

impl From<String> for ToolInput {
    fn from(raw: String) -> Self {
        ToolInput::Raw(raw)
    }
}

impl From<&str> for ToolInput {
    fn from(raw: &str) -> Self {
        ToolInput::Raw(raw.to_string())
    }
}

impl From<serde_json::Value> for ToolInput {
    fn from(value: serde_json::Value) -> Self {
        ToolInput::Structured(value)
    }
}

impl ToolInput {
    /// Decode into a JSON object.
    ///
    /// Empty text and `null` become `{}`; anything that is not a JSON
    /// object is rejected with the original input in the message.
    pub fn decode(self) -> Result<serde_json::Value, String> {
        let value = match self {
            ToolInput::Raw(raw) if raw.trim().is_empty() => serde_json::Value::Null,
            ToolInput::Raw(raw) => serde_json::from_str(&raw)
                .map_err(|_| format!("Invalid tool input format: {raw}"))?,
            ToolInput::Structured(value) => value,
        };

        match value {
            serde_json::Value::Null => Ok(serde_json::json!({})),
            obj @ serde_json::Value::Object(_) => Ok(obj),
            other => Err(format!("Invalid tool input format: {other}")),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (terminate, web_search, shell, ...) implements this trait and is
/// registered in the [`ToolRegistry`] the step executor dispatches through.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "web_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the backend).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the backend.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// An ordered collection of tools, addressable by name.
///
/// Declaration order is kept for the catalog sent to the backend and for
/// [`ToolRegistry::execute_all`].
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Builder-style [`ToolRegistry::register`].
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&pos| self.tools[pos].as_ref())
    }

    /// Tool definitions in declaration order (for sending to the backend).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Registered tool names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name.
    ///
    /// Never fails: unknown names, undecodable arguments, tool errors and
    /// tool panics all come back as a failed [`ToolResult`].
    pub async fn execute(&self, name: &str, input: impl Into<ToolInput>) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "Requested tool is not registered");
            return ToolResult::failure(ToolError::NotFound(name.to_string()).to_string());
        };

        let arguments = match input.into().decode() {
            Ok(arguments) => arguments,
            Err(message) => {
                warn!(tool = %name, "Could not decode tool arguments");
                return ToolResult::failure(message);
            }
        };

        debug!(tool = %name, "Dispatching tool");
        run_guarded(tool, arguments).await
    }

    /// Execute every tool with no arguments, in declaration order.
    pub async fn execute_all(&self) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            results.push(run_guarded(tool.as_ref(), serde_json::json!({})).await);
        }
        results
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_guarded(tool: &dyn Tool, arguments: serde_json::Value) -> ToolResult {
    match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(tool = %tool.name(), error = %e, "Tool returned an error");
            ToolResult::failure(e.to_string())
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(tool = %tool.name(), reason = %reason, "Tool panicked");
            ToolResult::failure(format!("Tool '{}' panicked: {reason}", tool.name()))
        }
    }
}
