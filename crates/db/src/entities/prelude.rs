//! Entity aliases.

pub use super::invoice_items::Entity as InvoiceItems;
pub use super::invoices::Entity as Invoices;
pub use super::tenants::Entity as Tenants;
pub use super::user_roles::Entity as UserRoles;
pub use super::users::Entity as Users;
