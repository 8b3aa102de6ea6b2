//! # Seed Data Generator
//!
//! Populates the database with a small clothing store for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by STOKTAKIP_DB_PATH (default ./stoktakip.db)
//! cargo run -p stoktakip-db --bin seed
//!
//! # Specify database path
//! cargo run -p stoktakip-db --bin seed -- --db ./data/magaza.db
//! ```
//!
//! ## Generated Data
//! - Categories, brands, colors and sizes
//! - Variant products (every color × size, random opening stock)
//! - Non-variant accessories with base stock
//! - Customers with open-account debts and a few collections
//! - A handful of cash and open-account sales

use rand::Rng;
use std::env;
use stoktakip_core::commands::{
    AttributeInput, CustomerInput, NamedInput, NewPayment, NewProduct, NewSale, NewSaleItem,
};
use stoktakip_core::ledger::CollectionRequest;
use stoktakip_core::{
    AttributeKind, CollectionType, Gender, Money, PaymentMethod, ProductUnit, DEFAULT_MARKUP_BPS,
    SYSTEM_USER,
};
use stoktakip_db::{AppConfig, Database, ProductFilter};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CATEGORIES: &[&str] = &["Elbise", "Pantolon", "Gömlek", "Aksesuar"];

const BRANDS: &[&str] = &["Mavi", "Koton", "LC Waikiki"];

const COLORS: &[&str] = &["Siyah", "Beyaz", "Lacivert", "Kırmızı"];

const SIZES: &[&str] = &["S", "M", "L", "XL"];

/// (category index, name, cost in cents, markup bps)
const VARIANT_PRODUCTS: &[(usize, &str, i64, u32)] = &[
    (0, "Triko Elbise", 4500, 5000),
    (0, "Saten Elbise", 8000, 6000),
    (1, "Kot Pantolon", 6000, 5000),
    (1, "Kumaş Pantolon", 5500, 4500),
    (2, "Oxford Gömlek", 3500, 7000),
];

/// (name, cost in cents, opening stock)
const ACCESSORIES: &[(&str, i64, i64)] = &[
    ("Deri Kemer", 10000, 12),
    ("İpek Eşarp", 7500, 4),
    ("Yün Bere", 2500, 0),
];

const CUSTOMERS: &[(&str, &str, &str)] = &[
    ("Ayşe", "Yılmaz", "0532 123 45 67"),
    ("Mehmet", "Demir", "0541 222 33 44"),
    ("Zeynep", "Kaya", "0555 987 65 43"),
    ("Ali", "Çelik", "0530 111 22 33"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stoktakip_db=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config = AppConfig::load()?;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stoktakip Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: STOKTAKIP_DB_PATH)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(path = %config.database_path, "Seeding database");
    let db = Database::new(config.db_config()).await?;

    let existing = db
        .products()
        .list(&ProductFilter {
            active_only: false,
            limit: 1,
            ..ProductFilter::default()
        })
        .await?;
    if !existing.is_empty() {
        warn!("Database already has products, skipping seed (delete the file to regenerate)");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let mut category_ids = Vec::new();
    for name in CATEGORIES {
        let category = db.catalog().create_category(named(name)).await?;
        category_ids.push(category.id);
    }
    let mut brand_ids = Vec::new();
    for name in BRANDS {
        let brand = db.catalog().create_brand(named(name)).await?;
        brand_ids.push(brand.id);
    }

    let color_ids = attributes(&db, AttributeKind::Color, COLORS).await?;
    let size_ids = attributes(&db, AttributeKind::Size, SIZES).await?;

    // Variant products: full color × size grid, then random opening stock
    let mut sellable = Vec::new();
    for (idx, (category, name, cost_cents, markup_bps)) in VARIANT_PRODUCTS.iter().enumerate() {
        let product = db
            .products()
            .create(NewProduct {
                sku: None,
                name: name.to_string(),
                description: None,
                category_id: category_ids[*category].clone(),
                brand_id: Some(brand_ids[idx % brand_ids.len()].clone()),
                unit: ProductUnit::Piece,
                gender: Gender::Women,
                cost_cents: *cost_cents,
                markup_bps: *markup_bps,
                has_variants: true,
                base_stock: 0,
                critical_stock: 3,
                track_stock: true,
                created_by: SYSTEM_USER.to_string(),
            })
            .await?;

        let variants = db
            .variants()
            .generate_variants(&product.id, &color_ids, &size_ids, SYSTEM_USER)
            .await?;
        for variant in &variants {
            let quantity = rand::thread_rng().gen_range(0..=15);
            if quantity > 0 {
                db.stock()
                    .adjust_stock(&variant.id, quantity, "opening count", SYSTEM_USER)
                    .await?;
                sellable.push((product.id.clone(), Some(variant.id.clone()), variant.sell_price_cents));
            }
        }
        info!(sku = %product.sku, variants = variants.len(), "Created variant product");
    }

    for (name, cost_cents, stock) in ACCESSORIES {
        let product = db
            .products()
            .create(NewProduct {
                sku: None,
                name: name.to_string(),
                description: None,
                category_id: category_ids[3].clone(),
                brand_id: None,
                unit: ProductUnit::Piece,
                gender: Gender::Unisex,
                cost_cents: *cost_cents,
                markup_bps: DEFAULT_MARKUP_BPS,
                has_variants: false,
                base_stock: *stock,
                critical_stock: 5,
                track_stock: true,
                created_by: SYSTEM_USER.to_string(),
            })
            .await?;
        if *stock > 0 {
            sellable.push((product.id.clone(), None, product.sell_price_cents));
        }
        info!(sku = %product.sku, stock, "Created accessory");
    }

    // Customers with open-account history
    let mut customer_ids = Vec::new();
    for (first, last, phone) in CUSTOMERS {
        let customer = db
            .customers()
            .create(CustomerInput {
                first_name: first.to_string(),
                last_name: last.to_string(),
                company_name: None,
                phone: phone.to_string(),
                email: None,
                address: None,
            })
            .await?;
        customer_ids.push(customer.id);
    }

    for (idx, customer_id) in customer_ids.iter().enumerate() {
        let debt = Money::from_cents(25_000 * (idx as i64 + 1));
        db.ledger()
            .record_debt(customer_id, debt, "Devir bakiyesi", SYSTEM_USER)
            .await?;
    }

    db.ledger()
        .issue_collection(collection(&customer_ids[0], 10_000, CollectionType::Cash))
        .await?;
    db.ledger()
        .issue_collection(CollectionRequest {
            bank: Some("Ziraat Bankası".to_string()),
            instrument_no: Some("CK-100245".to_string()),
            due_date: Some(chrono::Utc::now().date_naive() + chrono::Days::new(30)),
            ..collection(&customer_ids[1], 40_000, CollectionType::Check)
        })
        .await?;

    // A few sales, alternating cash and open account
    let mut sales = 0;
    for (idx, (product_id, variant_id, price_cents)) in sellable.iter().take(6).enumerate() {
        let customer_id = customer_ids.get(idx % customer_ids.len()).cloned();
        let method = if idx % 2 == 0 {
            PaymentMethod::Cash
        } else {
            PaymentMethod::OpenAccount
        };
        let result = db
            .sales()
            .record_sale(NewSale {
                customer_id,
                items: vec![NewSaleItem {
                    product_id: product_id.clone(),
                    variant_id: variant_id.clone(),
                    quantity: 1,
                }],
                payments: vec![NewPayment {
                    method,
                    amount_cents: *price_cents,
                    reference: None,
                }],
                discount_cents: 0,
                user_id: SYSTEM_USER.to_string(),
                notes: None,
            })
            .await;
        match result {
            Ok(sale) => {
                sales += 1;
                info!(receipt = %sale.receipt_number, total = sale.total_cents, "Recorded sale");
            }
            Err(e) => warn!(error = %e, "Failed to record sale"),
        }
    }

    let summary = db.reports().receivables_summary().await?;
    info!(
        products = VARIANT_PRODUCTS.len() + ACCESSORIES.len(),
        customers = customer_ids.len(),
        sales,
        receivable = %Money::from_cents(summary.receivable_cents),
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    Ok(())
}

fn named(name: &str) -> NamedInput {
    NamedInput {
        name: name.to_string(),
        description: None,
    }
}

async fn attributes(
    db: &Database,
    kind: AttributeKind,
    values: &[&str],
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut ids = Vec::new();
    for (sort_order, value) in values.iter().enumerate() {
        let attribute = db
            .catalog()
            .create_attribute(AttributeInput {
                kind,
                value: value.to_string(),
                sort_order: sort_order as i64,
            })
            .await?;
        ids.push(attribute.id);
    }
    Ok(ids)
}

fn collection(customer_id: &str, amount_cents: i64, collection_type: CollectionType) -> CollectionRequest {
    CollectionRequest {
        customer_id: customer_id.to_string(),
        amount_cents,
        collection_type,
        due_date: None,
        instrument_no: None,
        bank: None,
        reference_no: None,
        description: Some("Tahsilat".to_string()),
        created_by: SYSTEM_USER.to_string(),
    }
}
