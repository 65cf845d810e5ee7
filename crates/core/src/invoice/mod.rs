//! Invoice rules.
//!
//! Pure validation, amount calculation and the status lifecycle:
//! - `draft -> sent | void`
//! - `sent -> paid | void`
//! - `paid` and `void` are final

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::InvoiceError;
pub use service::InvoiceService;
pub use types::*;
