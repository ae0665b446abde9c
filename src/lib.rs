//! # capsule-mcp
//!
//! MCP (Model Context Protocol) server for a personal knowledge-capsule collection.
//!
//! A capsule is a timestamped text note with free-form tags. This crate exposes
//! capsule search, capture and statistics as MCP tools for AI agents, speaking
//! JSON-RPC 2.0 over stdin/stdout or HTTP.
//!
//! ## Features
//!
//! - **10 tools**: combined search, tag and content search with pagination, recent capsules, tag
//!   matching (any/all), capture, update, delete, statistics and a tag cloud
//! - **Two stores**: SQLite file (`--db`) or in-memory (`--cache`)
//! - **Two transports**: stdio (default) or HTTP with permissive CORS (`--http`)
//!
//! ## Usage
//!
//! The server is typically run as an executable and configured in AI tools like Claude Desktop:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "capsules": {
//!       "command": "/path/to/capsule-mcp",
//!       "args": ["--db", "/path/to/capsules.db"]
//!     }
//!   }
//! }
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use capsule_mcp::{McpServer, McpSession, StoreConfig};
//!
//! let session = McpSession::new(StoreConfig::Memory);
//! let server = McpServer::new(session);
//!
//! let response = server.handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#);
//! assert!(response.is_some());
//! ```

#![warn(missing_docs)]

pub mod capsules;
mod convert;
mod error;
#[cfg(feature = "http")]
pub mod http;
mod render;
mod server;
mod session;
pub mod store;
mod tools;

pub use error::{rpc_codes, McpError, Result};
pub use server::{JsonRpcRequest, JsonRpcResponse, McpServer};
pub use session::McpSession;
pub use store::{Capsule, CapsuleStore, MemoryStore, SqliteStore, StoreConfig};
pub use tools::{ToolDef, ToolOutput, ToolRegistry};
