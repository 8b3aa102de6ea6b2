//! # Product Repository
//!
//! Database operations for products: creation with derived prices and
//! generated SKUs, lookups, repricing, aggregate stock and guarded
//! deletion.
//!
//! ## Saving a Product
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create(NewProduct)                                   │
//! │                                                                         │
//! │  cost 45.00, markup 50%                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  apply_pricing ──► sell price 67.50 (stored, never entered)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SKU blank? ──► URN483920 ──► INSERT                                   │
//! │                    ▲              │                                     │
//! │                    └── collision ─┘ (bounded retries)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  opening stock > 0 ──► IN movement "opening stock"                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::{DbError, DbResult};
use crate::repository::stock::{apply_base_change, StockContext};
use crate::repository::{like_pattern, new_id};
use stoktakip_core::commands::{NewProduct, ProductUpdate};
use stoktakip_core::pricing::{apply_pricing, derive_sell_price, generate_sku, PriceDerivation};
use stoktakip_core::stock::{
    aggregate_stock, check_deletion, DeletionCheck, DeletionFacts, StockChange, VariantStock,
};
use stoktakip_core::validation::validate_search_query;
use stoktakip_core::{Product, ProductVariant, MAX_IDENTIFIER_ATTEMPTS};

/// A scanned or typed code resolved to a product and, for variant
/// barcodes, the variant.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct CodeLookup {
    pub product: Product,
    pub variant: Option<ProductVariant>,
}

/// Filters for listing products.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    /// Matches name, SKU or any variant barcode.
    pub search: String,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub active_only: bool,
    pub limit: u32,
}

impl Default for ProductFilter {
    fn default() -> Self {
        ProductFilter {
            search: String::new(),
            category_id: None,
            brand_id: None,
            active_only: true,
            limit: 100,
        }
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.create(new_product).await?;
/// let check = repo.can_delete(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product.
    ///
    /// ## What This Does
    /// 1. Validates the input
    /// 2. Derives the sell price from cost and markup
    /// 3. Uses the given SKU, or generates `URN` + 6 digits
    /// 4. Records the opening base stock as an IN movement
    ///
    /// ## Errors
    /// - `UniqueViolation { field: "sku" }` if a supplied SKU is taken
    /// - `ForeignKeyViolation` if the category or brand does not exist
    pub async fn create(&self, input: NewProduct) -> DbResult<Product> {
        self.create_with(input, || generate_sku(&mut rand::thread_rng()))
            .await
    }

    /// [`create`](Self::create) with a custom SKU candidate source.
    pub(crate) async fn create_with<F>(&self, input: NewProduct, mut next_sku: F) -> DbResult<Product>
    where
        F: FnMut() -> String + Send,
    {
        input.validate()?;
        let now = Utc::now();
        let mut product = Product {
            id: new_id(),
            sku: String::new(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            category_id: input.category_id.clone(),
            brand_id: input.brand_id.clone(),
            unit: input.unit,
            gender: input.gender,
            cost_cents: input.cost_cents,
            markup_bps: input.markup_bps,
            sell_price_cents: 0,
            has_variants: input.has_variants,
            // opening stock is added through a movement below
            base_stock: 0,
            critical_stock: input.critical_stock,
            track_stock: input.track_stock,
            is_active: true,
            created_by: Some(input.created_by.clone()),
            created_at: now,
            updated_at: now,
        };

        let derivation = apply_pricing(&mut product);
        if let Some(reason) = &derivation.degraded {
            warn!(name = %product.name, reason = %reason, "Sell price derivation degraded");
        }

        debug!(name = %product.name, sell_price = %derivation.sell_price, "Creating product");

        let mut tx = self.pool.begin().await?;

        match input.explicit_sku() {
            Some(sku) => {
                product.sku = sku.to_string();
                insert_product(&mut tx, &product).await.map_err(|err| {
                    if err.is_unique_violation_on("products.sku") {
                        DbError::duplicate("sku", sku)
                    } else {
                        err
                    }
                })?;
            }
            None => {
                let mut attempt = 0;
                loop {
                    product.sku = next_sku();
                    match insert_product(&mut tx, &product).await {
                        Ok(()) => break,
                        Err(err)
                            if err.is_unique_violation_on("products.sku")
                                && attempt + 1 < MAX_IDENTIFIER_ATTEMPTS =>
                        {
                            debug!(sku = %product.sku, "Generated SKU taken, retrying");
                            attempt += 1;
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        if !input.has_variants && input.base_stock > 0 {
            let (stocked, _) = apply_base_change(
                &mut tx,
                &product.id,
                StockChange::from_delta(input.base_stock)?,
                StockContext {
                    user_id: &input.created_by,
                    description: "opening stock",
                    reference_id: None,
                },
            )
            .await?;
            product = stocked;
        }

        tx.commit().await?;

        info!(
            id = %product.id,
            sku = %product.sku,
            sell_price = %product.sell_price(),
            "Product created"
        );
        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Gets a product by ID, failing with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Resolves a scanned code: a variant barcode first, then a SKU.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<CodeLookup>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        debug!(code = %code, "Resolving code");

        let variant =
            sqlx::query_as::<_, ProductVariant>("SELECT * FROM product_variants WHERE barcode = ?1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

        if let Some(variant) = variant {
            let product = self.get(&variant.product_id).await?;
            return Ok(Some(CodeLookup {
                product,
                variant: Some(variant),
            }));
        }

        Ok(self.get_by_sku(code).await?.map(|product| CodeLookup {
            product,
            variant: None,
        }))
    }

    /// Lists products by name.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let search = validate_search_query(&filter.search)?;
        debug!(search = %search, limit = filter.limit, "Listing products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT p.* FROM products p
            WHERE (?1 = 0 OR p.is_active = 1)
              AND (?2 IS NULL OR p.category_id = ?2)
              AND (?3 IS NULL OR p.brand_id = ?3)
              AND (?4 = ''
                   OR p.name LIKE ?5 ESCAPE '\'
                   OR p.sku LIKE ?5 ESCAPE '\'
                   OR EXISTS (
                       SELECT 1 FROM product_variants v
                       WHERE v.product_id = p.id AND v.barcode LIKE ?5 ESCAPE '\'
                   ))
            ORDER BY p.name
            LIMIT ?6
            "#,
        )
        .bind(filter.active_only)
        .bind(&filter.category_id)
        .bind(&filter.brand_id)
        .bind(&search)
        .bind(like_pattern(&search))
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates a product and re-derives its sell price.
    ///
    /// Stock is not editable here; use the stock engine.
    pub async fn update(&self, id: &str, input: ProductUpdate) -> DbResult<Product> {
        input.validate()?;
        let mut product = self.get(id).await?;

        product.name = input.name.trim().to_string();
        product.description = input.description;
        product.category_id = input.category_id;
        product.brand_id = input.brand_id;
        product.unit = input.unit;
        product.gender = input.gender;
        product.cost_cents = input.cost_cents;
        product.markup_bps = input.markup_bps;
        product.critical_stock = input.critical_stock;
        product.track_stock = input.track_stock;
        product.is_active = input.is_active;
        product.updated_at = Utc::now();

        let derivation = apply_pricing(&mut product);
        if let Some(reason) = &derivation.degraded {
            warn!(id = %id, reason = %reason, "Sell price derivation degraded");
        }

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                category_id = ?4,
                brand_id = ?5,
                unit = ?6,
                gender = ?7,
                cost_cents = ?8,
                markup_bps = ?9,
                sell_price_cents = ?10,
                critical_stock = ?11,
                track_stock = ?12,
                is_active = ?13,
                updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category_id)
        .bind(&product.brand_id)
        .bind(product.unit)
        .bind(product.gender)
        .bind(product.cost_cents)
        .bind(product.markup_bps)
        .bind(product.sell_price_cents)
        .bind(product.critical_stock)
        .bind(product.track_stock)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, sell_price = %product.sell_price(), "Product updated");
        Ok(product)
    }

    /// Reprices a product from raw form strings ("45,00", "50").
    ///
    /// Unparseable input never fails the save: the derivation falls back
    /// (see [`derive_sell_price`]) and the fallback is logged and returned.
    pub async fn update_pricing_from_form(
        &self,
        id: &str,
        raw_cost: &str,
        raw_markup: &str,
    ) -> DbResult<PriceDerivation> {
        let derivation = derive_sell_price(raw_cost, raw_markup);
        if let Some(reason) = &derivation.degraded {
            warn!(
                id = %id,
                raw_cost = %raw_cost,
                raw_markup = %raw_markup,
                reason = %reason,
                "Sell price derivation degraded"
            );
        }

        let result = sqlx::query(
            r#"
            UPDATE products
               SET cost_cents = ?2, markup_bps = ?3, sell_price_cents = ?4, updated_at = ?5
             WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(derivation.cost.cents())
        .bind(derivation.markup.bps())
        .bind(derivation.sell_price.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(derivation)
    }

    /// Aggregate stock: the sum of active variants, or the base stock.
    pub async fn aggregate_stock(&self, id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let facts = load_deletion_facts(&mut conn, id).await?;
        let has_variants: bool = sqlx::query_scalar("SELECT has_variants FROM products WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(aggregate_stock(has_variants, facts.base_stock, &facts.variants))
    }

    /// Whether the product can be deleted right now, with the reason if not.
    pub async fn can_delete(&self, id: &str) -> DbResult<DeletionCheck> {
        let mut conn = self.pool.acquire().await?;
        let facts = load_deletion_facts(&mut conn, id).await?;
        Ok(check_deletion(&facts))
    }

    /// Deletes a product and its variants.
    ///
    /// The deletion check runs again inside the delete transaction, so
    /// stock received after a `can_delete` call still blocks it.
    ///
    /// ## Errors
    /// `IntegrityViolation` naming what blocks the delete, e.g.
    /// "cannot delete product: variant 'Siyah - M' has 3 units in stock".
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE products SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        let facts = load_deletion_facts(&mut tx, id).await?;
        check_deletion(&facts).into_result()?;

        // variants and stock movements cascade
        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = %id, variants = facts.variants.len(), "Product deleted");
        Ok(())
    }
}

async fn insert_product(conn: &mut SqliteConnection, p: &Product) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO products (
            id, sku, name, description, category_id, brand_id, unit, gender,
            cost_cents, markup_bps, sell_price_cents, has_variants, base_stock,
            critical_stock, track_stock, is_active, created_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
    )
    .bind(&p.id)
    .bind(&p.sku)
    .bind(&p.name)
    .bind(&p.description)
    .bind(&p.category_id)
    .bind(&p.brand_id)
    .bind(p.unit)
    .bind(p.gender)
    .bind(p.cost_cents)
    .bind(p.markup_bps)
    .bind(p.sell_price_cents)
    .bind(p.has_variants)
    .bind(p.base_stock)
    .bind(p.critical_stock)
    .bind(p.track_stock)
    .bind(p.is_active)
    .bind(&p.created_by)
    .bind(p.created_at)
    .bind(p.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Everything [`check_deletion`] needs, read on the given connection.
async fn load_deletion_facts(conn: &mut SqliteConnection, id: &str) -> DbResult<DeletionFacts> {
    let base_stock: i64 = sqlx::query_scalar("SELECT base_stock FROM products WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))?;

    let variants: Vec<(String, i64, bool)> = sqlx::query_as(
        r#"
        SELECT label, stock_quantity, is_active
        FROM product_variants
        WHERE product_id = ?1
        ORDER BY created_at, rowid
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let sale_references: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM sale_items
        WHERE product_id = ?1
           OR variant_id IN (SELECT id FROM product_variants WHERE product_id = ?1)
        "#,
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(DeletionFacts {
        base_stock,
        variants: variants
            .into_iter()
            .map(|(label, stock_quantity, is_active)| VariantStock {
                label,
                stock_quantity,
                is_active,
            })
            .collect(),
        sale_references,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog::tests::{attribute, named};
    use stoktakip_core::commands::NewVariant;
    use stoktakip_core::{
        AttributeKind, CoreError, Gender, ProductUnit, StockDirection, ValidationError,
        MAX_AMOUNT_CENTS,
    };

    const SIZES: [&str; 5] = ["S", "M", "L", "XL", "XXL"];

    /// The "Elbise" category, created on first use.
    pub(crate) async fn category_id(db: &Database) -> String {
        let existing = db.catalog().list_categories(false).await.unwrap();
        match existing.into_iter().find(|c| c.name == "Elbise") {
            Some(category) => category.id,
            None => db.catalog().create_category(named("Elbise")).await.unwrap().id,
        }
    }

    /// An attribute value, created on first use.
    pub(crate) async fn attribute_id(db: &Database, kind: AttributeKind, value: &str) -> String {
        let existing = db.catalog().list_attributes(kind).await.unwrap();
        match existing.into_iter().find(|a| a.value == value) {
            Some(attr) => attr.id,
            None => db
                .catalog()
                .create_attribute(attribute(kind, value, 0))
                .await
                .unwrap()
                .id,
        }
    }

    pub(crate) fn new_product(category_id: &str, name: &str, cost_cents: i64, markup_bps: u32) -> NewProduct {
        NewProduct {
            sku: None,
            name: name.to_string(),
            description: None,
            category_id: category_id.to_string(),
            brand_id: None,
            unit: ProductUnit::Piece,
            gender: Gender::Women,
            cost_cents,
            markup_bps,
            has_variants: false,
            base_stock: 0,
            critical_stock: 5,
            track_stock: true,
            created_by: "admin".to_string(),
        }
    }

    /// A non-variant product: cost 100.00, markup 50%.
    pub(crate) async fn simple_product(db: &Database, base_stock: i64) -> Product {
        let category = category_id(db).await;
        let input = NewProduct {
            base_stock,
            ..new_product(&category, "Deri Kemer", 10000, 5000)
        };
        db.products().create(input).await.unwrap()
    }

    /// A variant product (cost 45.00, markup 50%) with one black variant per
    /// entry of `stocks`, sized S, M, L...
    pub(crate) async fn product_with_variants(
        db: &Database,
        stocks: &[i64],
    ) -> (Product, Vec<ProductVariant>) {
        let category = category_id(db).await;
        let input = NewProduct {
            has_variants: true,
            ..new_product(&category, "Triko Elbise", 4500, 5000)
        };
        let product = db.products().create(input).await.unwrap();
        let color = attribute_id(db, AttributeKind::Color, "Siyah").await;

        let mut variants = Vec::new();
        for (stock, size) in stocks.iter().zip(SIZES) {
            let size = attribute_id(db, AttributeKind::Size, size).await;
            let variant = db
                .variants()
                .create(
                    &product.id,
                    NewVariant {
                        color_id: Some(color.clone()),
                        size_id: Some(size),
                        initial_stock: *stock,
                        ..NewVariant::default()
                    },
                    "admin",
                )
                .await
                .unwrap();
            variants.push(variant);
        }
        (product, variants)
    }

    fn update_from(product: &Product, markup_bps: u32) -> ProductUpdate {
        ProductUpdate {
            name: product.name.clone(),
            description: product.description.clone(),
            category_id: product.category_id.clone(),
            brand_id: product.brand_id.clone(),
            unit: product.unit,
            gender: product.gender,
            cost_cents: product.cost_cents,
            markup_bps,
            critical_stock: product.critical_stock,
            track_stock: product.track_stock,
            is_active: product.is_active,
        }
    }

    #[tokio::test]
    async fn test_sell_price_is_derived_on_save() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = category_id(&db).await;
        let product = db
            .products()
            .create(new_product(&category, "Triko", 4500, 5000))
            .await
            .unwrap();
        assert_eq!(product.sell_price_cents, 6750);

        let updated = db
            .products()
            .update(&product.id, update_from(&product, 2000))
            .await
            .unwrap();
        assert_eq!(updated.sell_price_cents, 5400);

        let stored = db.products().get(&product.id).await.unwrap();
        assert_eq!(stored.sell_price_cents, 5400);
        assert_eq!(stored.markup_bps, 2000);
    }

    #[tokio::test]
    async fn test_zero_cost_and_zero_markup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = category_id(&db).await;
        let free = db
            .products()
            .create(new_product(&category, "Hediye Poşeti", 0, 5000))
            .await
            .unwrap();
        assert_eq!(free.sell_price_cents, 0);

        let at_cost = db
            .products()
            .create(new_product(&category, "Askı", 1250, 0))
            .await
            .unwrap();
        assert_eq!(at_cost.sell_price_cents, 1250);
    }

    #[tokio::test]
    async fn test_cost_above_amount_cap_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = category_id(&db).await;
        let err = db
            .products()
            .create(new_product(&category, "Kürk Manto", MAX_AMOUNT_CENTS + 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let top = db
            .products()
            .create(new_product(&category, "Kürk Manto", MAX_AMOUNT_CENTS, 0))
            .await
            .unwrap();
        assert_eq!(top.sell_price_cents, MAX_AMOUNT_CENTS);
    }

    #[tokio::test]
    async fn test_generated_sku_format() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = simple_product(&db, 0).await;
        assert!(product.sku.starts_with("URN"));
        assert_eq!(product.sku.len(), 9);
        assert!(product.sku[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_generated_sku_retries_on_collision() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = category_id(&db).await;
        let taken = db
            .products()
            .create(NewProduct {
                sku: Some("URN000001".to_string()),
                ..new_product(&category, "İlk", 100, 0)
            })
            .await
            .unwrap();

        let mut candidates = vec!["URN000002", "URN000001", "URN000001"];
        let product = db
            .products()
            .create_with(new_product(&category, "İkinci", 100, 0), move || {
                candidates.pop().unwrap_or("URN999999").to_string()
            })
            .await
            .unwrap();

        assert_ne!(product.sku, taken.sku);
        assert_eq!(product.sku, "URN000002");
    }

    #[tokio::test]
    async fn test_duplicate_explicit_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = category_id(&db).await;
        let input = NewProduct {
            sku: Some("ELB-001".to_string()),
            ..new_product(&category, "Elbise", 100, 0)
        };
        db.products().create(input.clone()).await.unwrap();

        let err = db.products().create(input).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "sku");
                assert_eq!(value, "ELB-001");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .products()
            .create(new_product("550e8400-e29b-41d4-a716-446655440000", "Yetim", 100, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(db.products().list(&ProductFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_opening_stock_is_a_movement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = simple_product(&db, 12).await;
        assert_eq!(product.base_stock, 12);

        let trail = db
            .stock()
            .movements(&crate::repository::stock::StockMovementFilter {
                product_id: Some(product.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].direction, StockDirection::In);
        assert_eq!(trail[0].quantity, 12);
        assert_eq!(trail[0].description, "opening stock");
    }

    #[tokio::test]
    async fn test_pricing_from_form_degrades() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = simple_product(&db, 0).await;

        let exact = db
            .products()
            .update_pricing_from_form(&product.id, "45,00", "50")
            .await
            .unwrap();
        assert!(exact.is_exact());
        assert_eq!(exact.sell_price.cents(), 6750);

        let degraded = db
            .products()
            .update_pricing_from_form(&product.id, "45,00", "elli")
            .await
            .unwrap();
        assert!(!degraded.is_exact());
        assert_eq!(degraded.sell_price.cents(), 4500);

        let stored = db.products().get(&product.id).await.unwrap();
        assert_eq!(stored.sell_price_cents, 4500);
        assert_eq!(stored.markup_bps, 0);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_variant_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[0, 3]).await;

        let check = db.products().can_delete(&product.id).await.unwrap();
        assert!(!check.allowed);
        let reason = check.reason.unwrap();
        assert!(reason.contains("Siyah - M"), "reason was: {reason}");
        assert!(reason.contains('3'));

        let err = db.products().delete(&product.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::IntegrityViolation { .. })
        ));
        assert!(db.products().get_by_id(&product.id).await.unwrap().is_some());

        db.stock()
            .set_stock(&variants[1].id, 0, "admin")
            .await
            .unwrap();
        assert!(db.products().can_delete(&product.id).await.unwrap().allowed);
        db.products().delete(&product.id).await.unwrap();

        assert!(db.products().get_by_id(&product.id).await.unwrap().is_none());
        assert!(db.variants().get_by_id(&variants[0].id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_blocked_by_base_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = simple_product(&db, 2).await;
        let check = db.products().can_delete(&product.id).await.unwrap();
        assert!(!check.allowed);
    }

    #[tokio::test]
    async fn test_aggregate_stock_skips_inactive_variants() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[4, 3, 9]).await;
        assert_eq!(db.products().aggregate_stock(&product.id).await.unwrap(), 16);

        db.variants()
            .update(
                &variants[2].id,
                stoktakip_core::commands::VariantUpdate {
                    cost_cents: variants[2].cost_cents,
                    markup_bps: variants[2].markup_bps,
                    note: None,
                    is_active: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(db.products().aggregate_stock(&product.id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_find_by_code_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[1]).await;
        let belt = simple_product(&db, 1).await;

        let by_barcode = db
            .products()
            .find_by_code(&variants[0].barcode)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_barcode.product.id, product.id);
        assert_eq!(by_barcode.variant.unwrap().id, variants[0].id);

        let by_sku = db.products().find_by_code(&belt.sku).await.unwrap().unwrap();
        assert_eq!(by_sku.product.id, belt.id);
        assert!(by_sku.variant.is_none());

        assert!(db.products().find_by_code("YOK").await.unwrap().is_none());

        let found = db
            .products()
            .list(&ProductFilter {
                search: "kemer".to_string(),
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, belt.id);

        let by_barcode = db
            .products()
            .list(&ProductFilter {
                search: variants[0].barcode.clone(),
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_barcode.len(), 1);
        assert_eq!(by_barcode[0].id, product.id);
    }
}
