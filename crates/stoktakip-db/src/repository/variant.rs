//! # Variant Repository
//!
//! Color / size / other combinations of a product. Each variant carries its
//! own barcode, price and stock.
//!
//! ## Variant Generation
//! ```text
//! colors [Siyah, Beyaz] × sizes [S, M, L]
//!      │
//!      ▼
//! Siyah - S   Siyah - M   Siyah - L      ← existing combinations skipped
//! Beyaz - S   Beyaz - M   Beyaz - L
//!      │
//!      ▼
//! cost / markup inherited from the product, stock 0,
//! barcode <SKU>V0042 (retried on collision)
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use crate::repository::stock::{apply_variant_change, StockContext};
use stoktakip_core::commands::{NewVariant, VariantUpdate};
use stoktakip_core::pricing::{apply_pricing, generate_barcode, variant_label};
use stoktakip_core::stock::{check_variant_deletion, StockChange, VariantStock};
use stoktakip_core::{
    AttributeKind, CoreError, Product, ProductVariant, ValidationError, VariantAttribute,
    MAX_IDENTIFIER_ATTEMPTS,
};

/// Repository for product variants.
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    /// Creates a new VariantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    /// Adds a variant to a product that uses variants.
    ///
    /// Cost and markup default to the product's; the barcode is generated
    /// when blank. Opening stock is recorded as an IN movement.
    ///
    /// ## Errors
    /// - `IntegrityViolation` if the product does not use variants
    /// - `UniqueViolation { field: "barcode" }` for a taken barcode
    /// - `UniqueViolation { field: "variant" }` for an existing combination
    pub async fn create(
        &self,
        product_id: &str,
        input: NewVariant,
        user_id: &str,
    ) -> DbResult<ProductVariant> {
        self.create_with(product_id, input, user_id, |sku| {
            generate_barcode(sku, &mut rand::thread_rng())
        })
        .await
    }

    /// [`create`](Self::create) with a custom barcode candidate source.
    pub(crate) async fn create_with<F>(
        &self,
        product_id: &str,
        input: NewVariant,
        user_id: &str,
        mut next_barcode: F,
    ) -> DbResult<ProductVariant>
    where
        F: FnMut(&str) -> String + Send,
    {
        input.validate()?;
        stoktakip_core::validation::validate_required("user_id", user_id)?;

        let mut tx = self.pool.begin().await?;
        let product = lock_variant_product(&mut tx, product_id).await?;
        let variant = insert_new_variant(&mut tx, &product, &input, user_id, &mut next_barcode).await?;
        tx.commit().await?;

        info!(
            id = %variant.id,
            barcode = %variant.barcode,
            label = %variant.label,
            "Variant created"
        );
        Ok(variant)
    }

    /// Creates every missing color × size combination of a product.
    ///
    /// An empty list on either side means "no attribute of that kind".
    /// Returns only the variants that were created.
    pub async fn generate_variants(
        &self,
        product_id: &str,
        color_ids: &[String],
        size_ids: &[String],
        user_id: &str,
    ) -> DbResult<Vec<ProductVariant>> {
        stoktakip_core::validation::validate_required("user_id", user_id)?;
        if color_ids.is_empty() && size_ids.is_empty() {
            return Ok(Vec::new());
        }

        let colors: Vec<Option<&String>> = if color_ids.is_empty() {
            vec![None]
        } else {
            color_ids.iter().map(Some).collect()
        };
        let sizes: Vec<Option<&String>> = if size_ids.is_empty() {
            vec![None]
        } else {
            size_ids.iter().map(Some).collect()
        };

        debug!(
            product_id = %product_id,
            colors = color_ids.len(),
            sizes = size_ids.len(),
            "Generating variants"
        );

        let mut tx = self.pool.begin().await?;
        let product = lock_variant_product(&mut tx, product_id).await?;
        let mut next_barcode = |sku: &str| generate_barcode(sku, &mut rand::thread_rng());

        let mut created = Vec::new();
        let mut skipped = 0usize;
        for color in &colors {
            for size in &sizes {
                let exists: i64 = sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM product_variants
                    WHERE product_id = ?1
                      AND IFNULL(color_id, '') = IFNULL(?2, '')
                      AND IFNULL(size_id, '') = IFNULL(?3, '')
                      AND other_id IS NULL
                    "#,
                )
                .bind(&product.id)
                .bind(*color)
                .bind(*size)
                .fetch_one(&mut *tx)
                .await?;

                if exists > 0 {
                    skipped += 1;
                    continue;
                }

                let input = NewVariant {
                    color_id: (*color).cloned(),
                    size_id: (*size).cloned(),
                    ..NewVariant::default()
                };
                input.validate()?;
                let variant =
                    insert_new_variant(&mut tx, &product, &input, user_id, &mut next_barcode).await?;
                created.push(variant);
            }
        }

        tx.commit().await?;

        info!(
            product_id = %product.id,
            created = created.len(),
            skipped,
            "Variants generated"
        );
        Ok(created)
    }

    /// Gets a variant by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let variant =
            sqlx::query_as::<_, ProductVariant>("SELECT * FROM product_variants WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(variant)
    }

    /// Gets a variant by ID, failing with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<ProductVariant> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Variant", id))
    }

    /// Gets a variant by barcode.
    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<ProductVariant>> {
        let variant =
            sqlx::query_as::<_, ProductVariant>("SELECT * FROM product_variants WHERE barcode = ?1")
                .bind(barcode.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(variant)
    }

    /// Variants of a product in creation order.
    pub async fn list_for_product(
        &self,
        product_id: &str,
        active_only: bool,
    ) -> DbResult<Vec<ProductVariant>> {
        let variants = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT * FROM product_variants
            WHERE product_id = ?1 AND (?2 = 0 OR is_active = 1)
            ORDER BY created_at, rowid
            "#,
        )
        .bind(product_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(variants)
    }

    /// Updates price inputs, note and active flag; the sell price is
    /// re-derived.
    pub async fn update(&self, id: &str, input: VariantUpdate) -> DbResult<ProductVariant> {
        input.validate()?;
        let mut variant = self.get(id).await?;

        variant.cost_cents = input.cost_cents;
        variant.markup_bps = input.markup_bps;
        variant.note = input.note;
        variant.is_active = input.is_active;
        variant.updated_at = Utc::now();

        let derivation = apply_pricing(&mut variant);
        if let Some(reason) = &derivation.degraded {
            warn!(id = %id, reason = %reason, "Sell price derivation degraded");
        }

        let result = sqlx::query(
            r#"
            UPDATE product_variants SET
                cost_cents = ?2,
                markup_bps = ?3,
                sell_price_cents = ?4,
                note = ?5,
                is_active = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(variant.cost_cents)
        .bind(variant.markup_bps)
        .bind(variant.sell_price_cents)
        .bind(&variant.note)
        .bind(variant.is_active)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        info!(id = %id, sell_price = %variant.sell_price(), "Variant updated");
        Ok(variant)
    }

    /// Deletes a variant that holds no stock and was never sold.
    ///
    /// Its stock movements go with it; sold variants are deactivated
    /// through [`VariantRepository::update`] instead.
    ///
    /// ## Errors
    /// `IntegrityViolation` naming what blocks the delete, e.g.
    /// "cannot delete variant: variant 'Siyah - M' has 3 units in stock".
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting variant");
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE product_variants SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        let variant = sqlx::query_as::<_, ProductVariant>("SELECT * FROM product_variants WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let sale_references: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_items WHERE variant_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let stock = VariantStock {
            label: variant.label.clone(),
            stock_quantity: variant.stock_quantity,
            is_active: variant.is_active,
        };
        check_variant_deletion(&stock, sale_references).into_result_for("delete variant")?;

        // stock movements cascade
        sqlx::query("DELETE FROM product_variants WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = %id, label = %variant.label, product_id = %variant.product_id, "Variant deleted");
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Locks the product row and checks that it uses variants.
async fn lock_variant_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Product> {
    let result = sqlx::query("UPDATE products SET updated_at = ?2 WHERE id = ?1")
        .bind(product_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }

    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

    if !product.has_variants {
        return Err(CoreError::blocked(
            "add variant",
            format!("product '{}' does not use variants", product.name),
        )
        .into());
    }
    Ok(product)
}

/// Loads an attribute and checks its kind.
async fn resolve_attribute(
    conn: &mut SqliteConnection,
    field: &str,
    id: Option<&String>,
    kind: AttributeKind,
) -> DbResult<Option<VariantAttribute>> {
    let Some(id) = id else {
        return Ok(None);
    };

    let attribute =
        sqlx::query_as::<_, VariantAttribute>("SELECT * FROM variant_attributes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Attribute", id.as_str()))?;

    if attribute.kind != kind {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!(
                "'{}' is not a {} value",
                attribute.value,
                field.trim_end_matches("_id")
            ),
        }
        .into());
    }
    Ok(Some(attribute))
}

/// Builds, prices, numbers and inserts one variant, then records its
/// opening stock. Runs inside the caller's transaction.
async fn insert_new_variant<F>(
    conn: &mut SqliteConnection,
    product: &Product,
    input: &NewVariant,
    user_id: &str,
    next_barcode: &mut F,
) -> DbResult<ProductVariant>
where
    F: FnMut(&str) -> String + Send,
{
    let color = resolve_attribute(conn, "color_id", input.color_id.as_ref(), AttributeKind::Color).await?;
    let size = resolve_attribute(conn, "size_id", input.size_id.as_ref(), AttributeKind::Size).await?;
    let other = resolve_attribute(conn, "other_id", input.other_id.as_ref(), AttributeKind::Other).await?;

    let label = variant_label(
        color.as_ref().map(|a| a.value.as_str()),
        size.as_ref().map(|a| a.value.as_str()),
        other.as_ref().map(|a| a.value.as_str()),
    );

    let now = Utc::now();
    let mut variant = ProductVariant {
        id: new_id(),
        product_id: product.id.clone(),
        barcode: String::new(),
        color_id: input.color_id.clone(),
        size_id: input.size_id.clone(),
        other_id: input.other_id.clone(),
        label,
        cost_cents: input.cost_cents.unwrap_or(product.cost_cents),
        markup_bps: input.markup_bps.unwrap_or(product.markup_bps),
        sell_price_cents: 0,
        stock_quantity: 0,
        note: input.note.clone(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let derivation = apply_pricing(&mut variant);
    if let Some(reason) = &derivation.degraded {
        warn!(label = %variant.label, reason = %reason, "Sell price derivation degraded");
    }

    let mut attempt = 0;
    loop {
        variant.barcode = match input.explicit_barcode() {
            Some(barcode) => barcode.to_string(),
            None => next_barcode(&product.sku),
        };
        match insert_variant(conn, &variant).await {
            Ok(()) => break,
            Err(err) if err.is_unique_violation_on("idx_variants_combination") => {
                return Err(DbError::duplicate("variant", &variant.label));
            }
            Err(err) if err.is_unique_violation_on("product_variants.barcode") => {
                if input.explicit_barcode().is_some() {
                    return Err(DbError::duplicate("barcode", &variant.barcode));
                }
                if attempt + 1 >= MAX_IDENTIFIER_ATTEMPTS {
                    return Err(err);
                }
                debug!(barcode = %variant.barcode, "Generated barcode taken, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }

    if input.initial_stock > 0 {
        let (stocked, _) = apply_variant_change(
            conn,
            &variant.id,
            StockChange::from_delta(input.initial_stock)?,
            StockContext {
                user_id,
                description: "opening stock",
                reference_id: None,
            },
        )
        .await?;
        variant = stocked;
    }

    Ok(variant)
}

async fn insert_variant(conn: &mut SqliteConnection, v: &ProductVariant) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO product_variants (
            id, product_id, barcode, color_id, size_id, other_id, label,
            cost_cents, markup_bps, sell_price_cents, stock_quantity, note,
            is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&v.id)
    .bind(&v.product_id)
    .bind(&v.barcode)
    .bind(&v.color_id)
    .bind(&v.size_id)
    .bind(&v.other_id)
    .bind(&v.label)
    .bind(v.cost_cents)
    .bind(v.markup_bps)
    .bind(v.sell_price_cents)
    .bind(v.stock_quantity)
    .bind(&v.note)
    .bind(v.is_active)
    .bind(v.created_at)
    .bind(v.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::tests::{
        attribute_id, category_id, new_product, product_with_variants, simple_product,
    };
    use crate::repository::sale::tests::{line, new_sale, pay};
    use crate::repository::stock::StockMovementFilter;
    use stoktakip_core::commands::NewProduct;
    use stoktakip_core::PaymentMethod;

    async fn variant_product(db: &Database) -> Product {
        let category = category_id(db).await;
        db.products()
            .create(NewProduct {
                has_variants: true,
                ..new_product(&category, "Gömlek", 4500, 5000)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_variant_inherits_pricing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[2, 0]).await;

        let variant = &variants[1];
        assert_eq!(variant.label, "Siyah - M");
        assert_eq!(variant.cost_cents, 4500);
        assert_eq!(variant.sell_price_cents, 6750);
        assert!(variant.barcode.starts_with(&format!("{}V", product.sku)));
        assert_eq!(variant.barcode.len(), product.sku.len() + 5);
        assert_eq!(variants[0].stock_quantity, 2);
    }

    #[tokio::test]
    async fn test_variant_price_override() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = variant_product(&db).await;
        let variant = db
            .variants()
            .create(
                &product.id,
                NewVariant {
                    cost_cents: Some(5000),
                    markup_bps: Some(4000),
                    ..NewVariant::default()
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(variant.label, "Standart");
        assert_eq!(variant.sell_price_cents, 7000);

        let updated = db
            .variants()
            .update(
                &variant.id,
                VariantUpdate {
                    cost_cents: 5000,
                    markup_bps: 0,
                    note: Some("indirim".to_string()),
                    is_active: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.sell_price_cents, 5000);
    }

    #[tokio::test]
    async fn test_duplicate_combination() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[0]).await;

        let err = db
            .variants()
            .create(
                &product.id,
                NewVariant {
                    color_id: variants[0].color_id.clone(),
                    size_id: variants[0].size_id.clone(),
                    ..NewVariant::default()
                },
                "admin",
            )
            .await
            .unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "variant");
                assert_eq!(value, "Siyah - S");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_product_without_variants() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = simple_product(&db, 0).await;
        let err = db
            .variants()
            .create(&product.id, NewVariant::default(), "admin")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::IntegrityViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_attribute_kind_is_checked() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = variant_product(&db).await;
        let size = attribute_id(&db, AttributeKind::Size, "M").await;

        let err = db
            .variants()
            .create(
                &product.id,
                NewVariant {
                    color_id: Some(size),
                    ..NewVariant::default()
                },
                "admin",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_generated_barcode_retries_on_collision() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = variant_product(&db).await;
        let first = db
            .variants()
            .create(
                &product.id,
                NewVariant {
                    barcode: Some("TEST0001".to_string()),
                    other_id: Some(attribute_id(&db, AttributeKind::Other, "Uzun Kol").await),
                    ..NewVariant::default()
                },
                "admin",
            )
            .await
            .unwrap();

        let mut candidates = vec!["TEST0002", "TEST0001"];
        let second = db
            .variants()
            .create_with(&product.id, NewVariant::default(), "admin", move |_| {
                candidates.pop().unwrap_or("TEST9999").to_string()
            })
            .await
            .unwrap();
        assert_eq!(first.barcode, "TEST0001");
        assert_eq!(second.barcode, "TEST0002");

        let err = db
            .variants()
            .create(
                &product.id,
                NewVariant {
                    barcode: Some("TEST0002".to_string()),
                    size_id: Some(attribute_id(&db, AttributeKind::Size, "XL").await),
                    ..NewVariant::default()
                },
                "admin",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "barcode"));
    }

    #[tokio::test]
    async fn test_generate_variants_skips_existing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = variant_product(&db).await;
        let colors = vec![
            attribute_id(&db, AttributeKind::Color, "Siyah").await,
            attribute_id(&db, AttributeKind::Color, "Beyaz").await,
        ];
        let mut sizes = vec![
            attribute_id(&db, AttributeKind::Size, "S").await,
            attribute_id(&db, AttributeKind::Size, "M").await,
            attribute_id(&db, AttributeKind::Size, "L").await,
        ];

        let created = db
            .variants()
            .generate_variants(&product.id, &colors, &sizes, "admin")
            .await
            .unwrap();
        assert_eq!(created.len(), 6);
        assert!(created.iter().all(|v| v.stock_quantity == 0));
        assert!(created.iter().all(|v| v.sell_price_cents == 6750));

        sizes.push(attribute_id(&db, AttributeKind::Size, "XL").await);
        let created = db
            .variants()
            .generate_variants(&product.id, &colors, &sizes, "admin")
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|v| v.label.ends_with("XL")));

        assert_eq!(
            db.variants()
                .list_for_product(&product.id, true)
                .await
                .unwrap()
                .len(),
            8
        );
    }

    #[tokio::test]
    async fn test_opening_stock_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[5]).await;

        let found = db
            .variants()
            .find_by_barcode(&variants[0].barcode)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, variants[0].id);
        assert_eq!(found.stock_quantity, 5);

        let trail = db
            .stock()
            .movements(&StockMovementFilter {
                product_id: Some(product.id.clone()),
                ..StockMovementFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].variant_id.as_deref(), Some(variants[0].id.as_str()));
    }

    #[tokio::test]
    async fn test_delete_blocked_by_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, variants) = product_with_variants(&db, &[3]).await;

        let err = db.variants().delete(&variants[0].id).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::IntegrityViolation { action, reason }) => {
                assert_eq!(action, "delete variant");
                assert_eq!(reason, "variant 'Siyah - S' has 3 units in stock");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(db.variants().get_by_id(&variants[0].id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_blocked_by_sales_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[1]).await;
        db.sales()
            .record_sale(new_sale(
                None,
                vec![line(&product.id, Some(&variants[0].id), 1)],
                vec![pay(PaymentMethod::Cash, 6750)],
            ))
            .await
            .unwrap();

        // sold out, but the sale line still points at it
        let err = db.variants().delete(&variants[0].id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::IntegrityViolation { ref reason, .. })
                if reason == "variant 'Siyah - S' appears in 1 sale line(s)"
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_variant_and_its_trail() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[2, 0]).await;
        db.stock()
            .adjust_stock(&variants[0].id, -2, "fire", "admin")
            .await
            .unwrap();

        db.variants().delete(&variants[0].id).await.unwrap();
        db.variants().delete(&variants[1].id).await.unwrap();

        assert!(db.variants().get_by_id(&variants[0].id).await.unwrap().is_none());
        assert!(db
            .variants()
            .list_for_product(&product.id, false)
            .await
            .unwrap()
            .is_empty());
        let trail = db
            .stock()
            .movements(&StockMovementFilter {
                product_id: Some(product.id.clone()),
                ..StockMovementFilter::default()
            })
            .await
            .unwrap();
        assert!(trail.is_empty());

        let err = db.variants().delete(&variants[0].id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
