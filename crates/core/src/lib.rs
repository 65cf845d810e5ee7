//! Core business logic for Invora.
//!
//! This crate contains pure business logic with no web or database
//! dependencies. Outbound calls (language models, the MCP tool process) sit
//! behind traits so the database and API crates can plug in their own
//! implementations.
//!
//! # Modules
//!
//! - `invoice` - Invoice validation, amounts and status lifecycle
//! - `spreadsheet` - CSV import and export of invoices
//! - `analytics` - Aggregations over invoice facts
//! - `assistant` - Natural-language questions answered with generated SQL
//! - `mcp` - Model Context Protocol client for external query tools

pub mod analytics;
pub mod assistant;
pub mod invoice;
pub mod mcp;
pub mod spreadsheet;
