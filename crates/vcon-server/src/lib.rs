//! # MCP Surface
//!
//! The named-operation surface of the store: tool router, URI-addressable
//! resources, canned prompts, and the dispatcher glue that turns domain
//! errors into stable client payloads.

/// Error payload mapping and result conversion
pub mod dispatch;
/// Canned prompt templates
pub mod prompts;
/// Tool argument types
pub mod requests;
/// `vcon://` resource handling
pub mod resources;
/// Tool response shapes
pub mod responses;
/// The MCP server and its tool router
pub mod server;

pub use server::VconMcpServer;
