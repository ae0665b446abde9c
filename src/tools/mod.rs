//! Tool registry and category definitions.
//!
//! Provides the infrastructure for registering and dispatching MCP tools.

pub mod capsule;
pub mod search;
pub mod stats;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::error::{McpError, Result};
use crate::session::McpSession;

/// Signature shared by every tool handler.
pub type ToolHandler = fn(&McpSession, &Map<String, JsonValue>) -> Result<ToolOutput>;

/// What a tool hands back: text for the MCP client, raw data for library callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Rendered markdown sent as the single text content block.
    pub text: String,
    /// Structured result behind the text.
    pub data: JsonValue,
}

impl ToolOutput {
    /// Create a tool output.
    pub fn new(text: String, data: JsonValue) -> Self {
        Self { text, data }
    }
}

/// A tool definition for the MCP tools/list response.
#[derive(Clone, Serialize)]
pub struct ToolDef {
    /// Tool name (e.g., "search_capsules_by_tags")
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonValue,
    /// Function invoked by tools/call
    #[serde(skip)]
    pub handler: ToolHandler,
}

impl ToolDef {
    /// Create a new tool definition.
    pub fn new(name: &str, description: &str, input_schema: JsonValue, handler: ToolHandler) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            handler,
        }
    }
}

impl fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDef")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// Registry of all available tools, in advertised order.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl ToolRegistry {
    /// Create a new registry with all tools registered.
    pub fn new() -> Self {
        let mut tools = Vec::new();

        // Register all tool categories
        tools.extend(search::tools());
        tools.extend(capsule::tools());
        tools.extend(stats::tools());

        Self { tools }
    }

    /// Get all tool definitions.
    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Dispatch a tool call to its handler.
    pub fn dispatch(
        &self,
        session: &McpSession,
        name: &str,
        args: &Map<String, JsonValue>,
    ) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?;
        (tool.handler)(session, args)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper macro for creating JSON Schema for tool input parameters.
///
/// Optional properties may carry a default: `"page": number = 1`.
#[macro_export]
macro_rules! schema {
    // Object with required and optional properties
    (object {
        required: { $($req_name:literal : $req_type:tt),* $(,)? },
        optional: { $($opt_name:literal : $opt_type:tt $(= $opt_default:expr)?),* $(,)? }
    }) => {{
        let mut required: Vec<&str> = Vec::new();
        $(required.push($req_name);)*

        let mut props = serde_json::Map::new();
        $(props.insert($req_name.to_string(), $crate::schema!(@type $req_type));)*
        $(props.insert($opt_name.to_string(), $crate::schema!(@type $opt_type $(, default = $opt_default)?));)*

        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }};

    // Object with only required properties
    (object {
        required: { $($req_name:literal : $req_type:tt),* $(,)? }
    }) => {{
        let mut required: Vec<&str> = Vec::new();
        $(required.push($req_name);)*

        let mut props = serde_json::Map::new();
        $(props.insert($req_name.to_string(), $crate::schema!(@type $req_type));)*

        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }};

    // Object with only optional properties
    (object {
        optional: { $($opt_name:literal : $opt_type:tt $(= $opt_default:expr)?),* $(,)? }
    }) => {{
        let mut props = serde_json::Map::new();
        $(props.insert($opt_name.to_string(), $crate::schema!(@type $opt_type $(, default = $opt_default)?));)*

        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": []
        })
    }};

    // Empty object (no parameters)
    (object {}) => {{
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }};

    // Type with a declared default
    (@type $t:tt, default = $default:expr) => {{
        let mut prop = $crate::schema!(@type $t);
        prop["default"] = serde_json::json!($default);
        prop
    }};

    // Type mappings
    (@type string) => { serde_json::json!({"type": "string"}) };
    (@type number) => { serde_json::json!({"type": "number"}) };
    (@type boolean) => { serde_json::json!({"type": "boolean"}) };
    (@type array_string) => { serde_json::json!({"type": "array", "items": {"type": "string"}}) };
}
