//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod analytics;
pub mod invoice;
pub mod query;
pub mod schema;
pub mod tenant;
pub mod user;

pub use analytics::AnalyticsRepository;
pub use invoice::{DateRange, InvoiceFilter, InvoiceRepoError, InvoiceRepository, InvoiceWithItems};
pub use query::DbQueryExecutor;
pub use schema::SchemaRepository;
pub use tenant::TenantRepository;
pub use user::UserRepository;
