//! Database seeder for Invora development and testing.
//!
//! Seeds a demo tenant, an administrator and a handful of invoices, then
//! prints a bearer token for the administrator when a JWT secret is
//! configured.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use invora_core::invoice::{InvoiceService, InvoiceStatus, NewInvoice, NewInvoiceItem};
use invora_db::entities::{sea_orm_active_enums::UserRole, tenants, user_roles, users};
use invora_db::{InvoiceRepoError, InvoiceRepository};
use invora_shared::{AppConfig, JwtService, Role, TenantId};

/// Demo tenant ID (consistent for all seeds)
const DEMO_TENANT_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);
/// Demo admin ID (consistent for all seeds)
const DEMO_ADMIN_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0002);
/// Identity-provider subject of the demo admin.
const DEMO_ADMIN_SUBJECT: &str = "dev|admin";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    println!("Connecting to database...");
    let db = invora_db::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    println!("Seeding demo tenant...");
    seed_tenant(&db).await?;

    println!("Seeding demo admin...");
    seed_admin(&db).await?;

    println!("Seeding invoices...");
    seed_invoices(&db).await?;

    print_token();

    println!("Seeding complete!");
    Ok(())
}

async fn seed_tenant(db: &DatabaseConnection) -> anyhow::Result<()> {
    if tenants::Entity::find_by_id(DEMO_TENANT_ID)
        .one(db)
        .await?
        .is_some()
    {
        println!("  Demo tenant already exists, skipping...");
        return Ok(());
    }

    let now = Utc::now().into();
    tenants::ActiveModel {
        id: Set(DEMO_TENANT_ID),
        name: Set("Demo Company".to_string()),
        alias: Set("demo".to_string()),
        billing_email: Set(Some("billing@demo.invora.dev".to_string())),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    println!("  Created tenant: Demo Company (demo)");
    Ok(())
}

async fn seed_admin(db: &DatabaseConnection) -> anyhow::Result<()> {
    if users::Entity::find_by_id(DEMO_ADMIN_ID)
        .one(db)
        .await?
        .is_some()
    {
        println!("  Demo admin already exists, skipping...");
        return Ok(());
    }

    let now = Utc::now().into();
    users::ActiveModel {
        id: Set(DEMO_ADMIN_ID),
        tenant_id: Set(DEMO_TENANT_ID),
        email: Set("admin@demo.invora.dev".to_string()),
        external_subject: Set(DEMO_ADMIN_SUBJECT.to_string()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    for role in [UserRole::User, UserRole::Admin] {
        user_roles::ActiveModel {
            user_id: Set(DEMO_ADMIN_ID),
            role: Set(role),
            created_at: Set(now),
        }
        .insert(db)
        .await?;
    }

    println!("  Created admin: {DEMO_ADMIN_SUBJECT} (USER, ADMIN)");
    Ok(())
}

/// (number, vendor, issue date, due in days, status, [(description, qty, unit price)])
type SeedInvoice = (
    &'static str,
    &'static str,
    (i32, u32, u32),
    Option<i64>,
    InvoiceStatus,
    &'static [(&'static str, i64, i64)],
);

const INVOICES: &[SeedInvoice] = &[
    (
        "INV-2026-001",
        "Acme Supplies",
        (2026, 1, 5),
        Some(30),
        InvoiceStatus::Paid,
        &[("Printer paper", 20, 450), ("Toner cartridge", 2, 8900)],
    ),
    (
        "INV-2026-002",
        "Globex Cloud",
        (2026, 1, 31),
        Some(15),
        InvoiceStatus::Sent,
        &[("Compute hours", 720, 12), ("Object storage", 1, 4500)],
    ),
    (
        "INV-2026-003",
        "Initech Consulting",
        (2026, 2, 14),
        Some(45),
        InvoiceStatus::Sent,
        &[("Advisory", 16, 18_000)],
    ),
    (
        "INV-2026-004",
        "Acme Supplies",
        (2026, 3, 2),
        None,
        InvoiceStatus::Draft,
        &[("Office chairs", 4, 24_900)],
    ),
    (
        "INV-2026-005",
        "Umbrella Logistics",
        (2026, 3, 20),
        Some(30),
        InvoiceStatus::Void,
        &[("Freight", 1, 125_000)],
    ),
];

async fn seed_invoices(db: &DatabaseConnection) -> anyhow::Result<()> {
    let repo = InvoiceRepository::new(db.clone());
    let tenant_id = TenantId::from_uuid(DEMO_TENANT_ID);

    for &(number, vendor, (y, m, d), due_in, status, lines) in INVOICES {
        let issue_date = NaiveDate::from_ymd_opt(y, m, d).context("invalid seed date")?;
        let draft = InvoiceService::prepare(NewInvoice {
            invoice_number: number.to_string(),
            vendor_name: vendor.to_string(),
            vendor_tax_id: None,
            vendor_address: None,
            customer_name: "Demo Company".to_string(),
            customer_tax_id: None,
            customer_address: None,
            currency: "USD".to_string(),
            issue_date,
            due_date: due_in.map(|days| issue_date + chrono::Duration::days(days)),
            status: Some(status),
            tax_amount: Decimal::ZERO,
            notes: None,
            items: lines
                .iter()
                .map(|&(description, quantity, cents)| NewInvoiceItem {
                    line_number: None,
                    description: description.to_string(),
                    quantity: Decimal::from(quantity),
                    unit_price: Decimal::new(cents, 2),
                })
                .collect(),
        })?;

        match repo.create(tenant_id, &draft).await {
            Ok(created) => println!(
                "  Created invoice: {number} ({} {})",
                created.invoice.total_amount, created.invoice.currency
            ),
            Err(InvoiceRepoError::DuplicateNumber(_)) => {
                println!("  Invoice {number} already exists, skipping...");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn print_token() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("Skipping dev token, configuration not loaded: {e}");
            return;
        }
    };

    let jwt = JwtService::from_settings(&config.jwt);
    match jwt.issue_token(
        DEMO_ADMIN_SUBJECT,
        TenantId::from_uuid(DEMO_TENANT_ID),
        vec![Role::User, Role::Admin],
    ) {
        Ok(token) => println!("Dev bearer token for {DEMO_ADMIN_SUBJECT}:\n  {token}"),
        Err(e) => println!("Failed to issue dev token: {e}"),
    }
}
