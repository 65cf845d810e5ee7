//! Model Context Protocol client used to run assistant queries through an
//! external tool process.

pub mod client;
pub mod executor;
pub mod protocol;

#[cfg(test)]
mod tests;

pub use client::{McpClient, McpError};
pub use executor::McpQueryExecutor;
pub use protocol::{ContentBlock, ToolCallResult, ToolDescriptor};
