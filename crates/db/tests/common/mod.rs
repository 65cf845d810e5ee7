//! Helpers for database integration tests.
//!
//! Tests run only when `DATABASE_URL` (superuser, used for setup) and
//! `APP_DATABASE_URL` (application role, subject to RLS) are set and the
//! migrations have been applied.

#![allow(dead_code)]

use chrono::NaiveDate;
use invora_core::invoice::{InvoiceDraft, InvoiceService, InvoiceStatus, NewInvoice, NewInvoiceItem};
use invora_db::entities::{sea_orm_active_enums::UserRole, tenants, user_roles, users};
use invora_shared::{TenantId, UserId};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

/// Connections for one test, or `None` when the database is not configured.
pub async fn connections() -> Option<(DatabaseConnection, DatabaseConnection)> {
    let (Ok(admin_url), Ok(app_url)) = (
        std::env::var("DATABASE_URL"),
        std::env::var("APP_DATABASE_URL"),
    ) else {
        eprintln!("DATABASE_URL / APP_DATABASE_URL not set, skipping");
        return None;
    };

    let admin = Database::connect(&admin_url)
        .await
        .expect("Failed to connect as admin");
    let app = Database::connect(&app_url)
        .await
        .expect("Failed to connect as app user");
    Some((admin, app))
}

/// Creates an active tenant.
pub async fn create_tenant(admin: &DatabaseConnection, name: &str) -> TenantId {
    let id = Uuid::now_v7();
    let now = chrono::Utc::now().into();
    tenants::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        alias: Set(format!("{}-{id}", name.to_lowercase())),
        billing_email: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(admin)
    .await
    .expect("Failed to create tenant");
    TenantId::from_uuid(id)
}

/// Creates a user with the given roles.
pub async fn create_user(
    admin: &DatabaseConnection,
    tenant_id: TenantId,
    roles: &[UserRole],
) -> (UserId, String) {
    let id = Uuid::now_v7();
    let subject = format!("idp|{id}");
    let now = chrono::Utc::now().into();
    users::ActiveModel {
        id: Set(id),
        tenant_id: Set(tenant_id.into_inner()),
        email: Set(format!("user-{id}@example.com")),
        external_subject: Set(subject.clone()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(admin)
    .await
    .expect("Failed to create user");

    for role in roles {
        user_roles::ActiveModel {
            user_id: Set(id),
            role: Set(*role),
            created_at: Set(now),
        }
        .insert(admin)
        .await
        .expect("Failed to grant role");
    }
    (UserId::from_uuid(id), subject)
}

/// Deletes a tenant and everything that cascades from it.
pub async fn cleanup_tenant(admin: &DatabaseConnection, tenant_id: TenantId) {
    tenants::Entity::delete_by_id(tenant_id.into_inner())
        .exec(admin)
        .await
        .ok();
}

/// Builds a validated single-line invoice.
pub fn draft(number: &str, vendor: &str, issue_date: NaiveDate, amount: Decimal) -> InvoiceDraft {
    InvoiceService::prepare(NewInvoice {
        invoice_number: number.to_string(),
        vendor_name: vendor.to_string(),
        vendor_tax_id: None,
        vendor_address: None,
        customer_name: "Globex".to_string(),
        customer_tax_id: None,
        customer_address: None,
        currency: "USD".to_string(),
        issue_date,
        due_date: None,
        status: Some(InvoiceStatus::Draft),
        tax_amount: Decimal::ZERO,
        notes: None,
        items: vec![NewInvoiceItem {
            line_number: None,
            description: "Services".to_string(),
            quantity: Decimal::ONE,
            unit_price: amount,
        }],
    })
    .expect("valid draft")
}

/// Shorthand for a date.
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
