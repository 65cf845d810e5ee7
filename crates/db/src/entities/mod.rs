//! `SeaORM` entity definitions.

pub mod prelude;

pub mod invoice_items;
pub mod invoices;
pub mod sea_orm_active_enums;
pub mod tenants;
pub mod user_roles;
pub mod users;
