//! # Stock Repository
//!
//! The stock engine: every change to `product_variants.stock_quantity` or
//! `products.base_stock` goes through here, paired with a `stock_movements`
//! row in the same transaction.
//!
//! ## Guarded Update
//! ```text
//! UPDATE product_variants
//!    SET stock_quantity = stock_quantity + :delta
//!  WHERE id = :id AND stock_quantity + :delta >= 0
//!
//!   1 row  ──► insert movement (direction from the sign of delta)
//!   0 rows ──► variant missing?  NotFound
//!              otherwise         NegativeStock { item: "Siyah - M", .. }
//! ```
//!
//! The guard lives in the statement itself, so two concurrent sales of the
//! last unit cannot both succeed.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{new_id, DateRange};
use stoktakip_core::stock::StockChange;
use stoktakip_core::validation::validate_stock_level;
use stoktakip_core::{CoreError, Product, ProductVariant, StockDirection, StockMovement};

// =============================================================================
// Movement Posting
// =============================================================================

/// Why and by whom a stock change is made.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StockContext<'a> {
    pub user_id: &'a str,
    pub description: &'a str,
    /// Sale or other document that caused the change.
    pub reference_id: Option<&'a str>,
}

/// Applies a change to a variant and records the movement.
///
/// Must run inside the caller's transaction.
pub(crate) async fn apply_variant_change(
    conn: &mut SqliteConnection,
    variant_id: &str,
    change: StockChange,
    ctx: StockContext<'_>,
) -> DbResult<(ProductVariant, StockMovement)> {
    let updated = sqlx::query_as::<_, ProductVariant>(
        r#"
        UPDATE product_variants
           SET stock_quantity = stock_quantity + ?1, updated_at = ?2
         WHERE id = ?3 AND stock_quantity + ?1 >= 0
        RETURNING *
        "#,
    )
    .bind(change.delta())
    .bind(Utc::now())
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?;

    let variant = match updated {
        Some(variant) => variant,
        None => {
            let current = sqlx::query_as::<_, ProductVariant>(
                "SELECT * FROM product_variants WHERE id = ?1",
            )
            .bind(variant_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Variant", variant_id))?;
            return Err(rejected_change(change, &current.label, current.stock_quantity));
        }
    };

    let movement = insert_movement(conn, &variant.product_id, Some(&variant.id), change, ctx).await?;

    debug!(
        variant_id = %variant.id,
        delta = change.delta(),
        stock = variant.stock_quantity,
        "Variant stock changed"
    );
    Ok((variant, movement))
}

/// Applies a change to the base stock of a product without variants and
/// records the movement.
pub(crate) async fn apply_base_change(
    conn: &mut SqliteConnection,
    product_id: &str,
    change: StockChange,
    ctx: StockContext<'_>,
) -> DbResult<(Product, StockMovement)> {
    let updated = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
           SET base_stock = base_stock + ?1, updated_at = ?2
         WHERE id = ?3 AND has_variants = 0 AND base_stock + ?1 >= 0
        RETURNING *
        "#,
    )
    .bind(change.delta())
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    let product = match updated {
        Some(product) => product,
        None => {
            let current = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| DbError::not_found("Product", product_id))?;
            if current.has_variants {
                return Err(CoreError::blocked(
                    "adjust base stock",
                    format!("product '{}' keeps its stock on variants", current.name),
                )
                .into());
            }
            return Err(rejected_change(change, &current.name, current.base_stock));
        }
    };

    let movement = insert_movement(conn, &product.id, None, change, ctx).await?;

    debug!(
        product_id = %product.id,
        delta = change.delta(),
        stock = product.base_stock,
        "Base stock changed"
    );
    Ok((product, movement))
}

/// The error for a change the guarded update refused.
fn rejected_change(change: StockChange, item: &str, current: i64) -> DbError {
    match change.apply(item, current) {
        Err(err) => err.into(),
        // The guard and StockChange::apply agree; reaching this means the
        // row changed under an open transaction.
        Ok(_) => DbError::Internal(format!("stock update for {} was not applied", item)),
    }
}

async fn insert_movement(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_id: Option<&str>,
    change: StockChange,
    ctx: StockContext<'_>,
) -> DbResult<StockMovement> {
    let movement = StockMovement {
        id: new_id(),
        product_id: product_id.to_string(),
        variant_id: variant_id.map(str::to_string),
        direction: change.direction,
        quantity: change.quantity,
        user_id: ctx.user_id.to_string(),
        description: ctx.description.trim().to_string(),
        reference_id: ctx.reference_id.map(str::to_string),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, variant_id, direction, quantity,
            user_id, description, reference_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(&movement.variant_id)
    .bind(movement.direction)
    .bind(movement.quantity)
    .bind(&movement.user_id)
    .bind(&movement.description)
    .bind(&movement.reference_id)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(movement)
}

// =============================================================================
// Repository
// =============================================================================

/// Filters for the stock audit trail.
#[derive(Debug, Clone)]
pub struct StockMovementFilter {
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub range: DateRange,
    pub limit: u32,
}

impl Default for StockMovementFilter {
    fn default() -> Self {
        StockMovementFilter {
            product_id: None,
            variant_id: None,
            range: DateRange::all(),
            limit: 200,
        }
    }
}

/// Repository for stock adjustments and the stock audit trail.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Adds (positive delta) or removes (negative delta) variant stock.
    ///
    /// ## Errors
    /// - `Validation` if `delta` is zero or the reason is blank
    /// - `NegativeStock` if the stock would drop below zero
    /// - `NotFound` if the variant does not exist
    pub async fn adjust_stock(
        &self,
        variant_id: &str,
        delta: i64,
        reason: &str,
        user_id: &str,
    ) -> DbResult<StockMovement> {
        let change = StockChange::from_delta(delta)?;
        check_context(reason, user_id)?;
        debug!(variant_id = %variant_id, delta, "Adjusting variant stock");

        let mut tx = self.pool.begin().await?;
        let (variant, movement) = apply_variant_change(
            &mut tx,
            variant_id,
            change,
            StockContext {
                user_id,
                description: reason,
                reference_id: None,
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            variant_id = %variant.id,
            delta,
            stock = variant.stock_quantity,
            "Variant stock adjusted"
        );
        Ok(movement)
    }

    /// Sets a variant's stock to an exact count (manual edit).
    ///
    /// Records the difference as a movement. Returns `None` when the count
    /// is unchanged.
    pub async fn set_stock(
        &self,
        variant_id: &str,
        new_quantity: i64,
        user_id: &str,
    ) -> DbResult<Option<StockMovement>> {
        validate_stock_level("stock_quantity", new_quantity)?;
        check_context("manual stock edit", user_id)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE product_variants SET updated_at = updated_at WHERE id = ?1")
            .bind(variant_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", variant_id));
        }

        let current: i64 =
            sqlx::query_scalar("SELECT stock_quantity FROM product_variants WHERE id = ?1")
                .bind(variant_id)
                .fetch_one(&mut *tx)
                .await?;

        let delta = new_quantity - current;
        if delta == 0 {
            debug!(variant_id = %variant_id, "Stock unchanged, nothing recorded");
            return Ok(None);
        }

        let description = format!("manual edit: {} -> {}", current, new_quantity);
        let (_, movement) = apply_variant_change(
            &mut tx,
            variant_id,
            StockChange::from_delta(delta)?,
            StockContext {
                user_id,
                description: &description,
                reference_id: None,
            },
        )
        .await?;
        tx.commit().await?;

        info!(variant_id = %variant_id, from = current, to = new_quantity, "Variant stock set");
        Ok(Some(movement))
    }

    /// Records opening stock for several variants of one product at once.
    ///
    /// Each `(variant_id, quantity)` with a positive quantity becomes one
    /// `In` movement. Variants that already have stock movements keep
    /// their count and are skipped, as are zero quantities. All entries
    /// commit together or not at all.
    ///
    /// ## Errors
    /// - `Validation` if a quantity is negative
    /// - `NotFound` if the product or a variant does not exist
    /// - `IntegrityViolation` if a variant belongs to another product
    pub async fn set_initial_stock(
        &self,
        product_id: &str,
        entries: &[(String, i64)],
        user_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        check_context("opening stock", user_id)?;
        for (_, quantity) in entries {
            validate_stock_level("initial_stock", *quantity)?;
        }
        debug!(product_id = %product_id, entries = entries.len(), "Recording opening stock");

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE products SET updated_at = ?2 WHERE id = ?1")
            .bind(product_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        let mut movements = Vec::new();
        let mut skipped = 0;
        for (variant_id, quantity) in entries {
            let variant = sqlx::query_as::<_, ProductVariant>(
                "SELECT * FROM product_variants WHERE id = ?1",
            )
            .bind(variant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Variant", variant_id))?;
            if variant.product_id != product_id {
                return Err(CoreError::blocked(
                    "record opening stock",
                    format!("variant '{}' belongs to another product", variant.label),
                )
                .into());
            }

            let recorded: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements WHERE variant_id = ?1")
                    .bind(variant_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if recorded > 0 {
                debug!(variant_id = %variant_id, "Stock already recorded, skipping");
                skipped += 1;
                continue;
            }
            if *quantity == 0 {
                continue;
            }

            let description = format!("opening stock: {}", variant.label);
            let (_, movement) = apply_variant_change(
                &mut tx,
                variant_id,
                StockChange {
                    direction: StockDirection::In,
                    quantity: *quantity,
                },
                StockContext {
                    user_id,
                    description: &description,
                    reference_id: None,
                },
            )
            .await?;
            movements.push(movement);
        }
        tx.commit().await?;

        info!(
            product_id = %product_id,
            recorded = movements.len(),
            skipped,
            "Opening stock recorded"
        );
        Ok(movements)
    }

    /// Adds or removes base stock of a product without variants.
    pub async fn adjust_base_stock(
        &self,
        product_id: &str,
        delta: i64,
        reason: &str,
        user_id: &str,
    ) -> DbResult<StockMovement> {
        let change = StockChange::from_delta(delta)?;
        check_context(reason, user_id)?;
        debug!(product_id = %product_id, delta, "Adjusting base stock");

        let mut tx = self.pool.begin().await?;
        let (product, movement) = apply_base_change(
            &mut tx,
            product_id,
            change,
            StockContext {
                user_id,
                description: reason,
                reference_id: None,
            },
        )
        .await?;
        tx.commit().await?;

        info!(product_id = %product.id, delta, stock = product.base_stock, "Base stock adjusted");
        Ok(movement)
    }

    /// The stock audit trail, newest first.
    pub async fn movements(&self, filter: &StockMovementFilter) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR variant_id = ?2)
              AND created_at >= ?3 AND created_at < ?4
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?5
            "#,
        )
        .bind(&filter.product_id)
        .bind(&filter.variant_id)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }
}

fn check_context(reason: &str, user_id: &str) -> DbResult<()> {
    stoktakip_core::validation::validate_required("reason", reason)?;
    stoktakip_core::validation::validate_max_len("reason", reason, 500)?;
    stoktakip_core::validation::validate_required("user_id", user_id)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::tests::{product_with_variants, simple_product};

    #[tokio::test]
    async fn test_adjust_records_movement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[0]).await;
        let variant = &variants[0];

        let movement = db
            .stock()
            .adjust_stock(&variant.id, 7, "purchase", "depo")
            .await
            .unwrap();
        assert_eq!(movement.direction, StockDirection::In);
        assert_eq!(movement.quantity, 7);
        assert_eq!(movement.product_id, product.id);

        let movement = db
            .stock()
            .adjust_stock(&variant.id, -2, "damaged", "depo")
            .await
            .unwrap();
        assert_eq!(movement.direction, StockDirection::Out);
        assert_eq!(movement.signed_quantity(), -2);

        let stored = db.variants().get(&variant.id).await.unwrap();
        assert_eq!(stored.stock_quantity, 5);

        let trail = db
            .stock()
            .movements(&StockMovementFilter {
                variant_id: Some(variant.id.clone()),
                ..StockMovementFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.iter().map(|m| m.signed_quantity()).sum::<i64>(), 5);
    }

    #[tokio::test]
    async fn test_negative_stock_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, variants) = product_with_variants(&db, &[3]).await;
        let variant = &variants[0];

        let err = db
            .stock()
            .adjust_stock(&variant.id, -5, "sale", "kasiyer")
            .await
            .unwrap_err();
        match err {
            DbError::Domain(CoreError::NegativeStock {
                item,
                available,
                requested,
            }) => {
                assert_eq!(item, variant.label);
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(db.variants().get(&variant.id).await.unwrap().stock_quantity, 3);
        let trail = db
            .stock()
            .movements(&StockMovementFilter {
                variant_id: Some(variant.id.clone()),
                ..StockMovementFilter::default()
            })
            .await
            .unwrap();
        // only the opening stock
        assert_eq!(trail.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_delta_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, variants) = product_with_variants(&db, &[1]).await;
        let err = db
            .stock()
            .adjust_stock(&variants[0].id, 0, "nothing", "depo")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_set_stock_derives_delta() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[4, 2]).await;

        let movement = db
            .stock()
            .set_stock(&variants[0].id, 10, "depo")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(movement.quantity, 6);
        assert_eq!(movement.direction, StockDirection::In);

        assert!(db
            .stock()
            .set_stock(&variants[0].id, 10, "depo")
            .await
            .unwrap()
            .is_none());

        // aggregate reflects the delta
        assert_eq!(db.products().aggregate_stock(&product.id).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_base_stock_of_simple_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = simple_product(&db, 4).await;

        db.stock()
            .adjust_base_stock(&product.id, -4, "count correction", "depo")
            .await
            .unwrap();
        assert_eq!(db.products().aggregate_stock(&product.id).await.unwrap(), 0);

        let err = db
            .stock()
            .adjust_base_stock(&product.id, -1, "sale", "kasiyer")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NegativeStock { .. })));
    }

    #[tokio::test]
    async fn test_base_stock_rejected_for_variant_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, _) = product_with_variants(&db, &[1]).await;
        let err = db
            .stock()
            .adjust_base_stock(&product.id, 1, "purchase", "depo")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::IntegrityViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_initial_stock_for_many_variants() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[0, 0, 0, 2]).await;

        let movements = db
            .stock()
            .set_initial_stock(
                &product.id,
                &[
                    (variants[0].id.clone(), 6),
                    (variants[1].id.clone(), 0),
                    (variants[2].id.clone(), 4),
                    // already counted at creation
                    (variants[3].id.clone(), 9),
                ],
                "depo",
            )
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.direction == StockDirection::In));
        assert_eq!(movements[0].description, format!("opening stock: {}", variants[0].label));

        assert_eq!(db.variants().get(&variants[0].id).await.unwrap().stock_quantity, 6);
        assert_eq!(db.variants().get(&variants[3].id).await.unwrap().stock_quantity, 2);
        assert_eq!(db.products().aggregate_stock(&product.id).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_initial_stock_is_all_or_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, variants) = product_with_variants(&db, &[0]).await;
        let (_, foreign) = product_with_variants(&db, &[0]).await;

        let err = db
            .stock()
            .set_initial_stock(
                &product.id,
                &[(variants[0].id.clone(), 5), (foreign[0].id.clone(), 3)],
                "depo",
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::IntegrityViolation { .. })
        ));
        assert_eq!(db.variants().get(&variants[0].id).await.unwrap().stock_quantity, 0);

        let err = db
            .stock()
            .set_initial_stock(&product.id, &[(variants[0].id.clone(), -1)], "depo")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_removals_never_oversell() {
        let path = std::env::temp_dir().join(format!("stoktakip-test-{}.db", new_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let (_, variants) = product_with_variants(&db, &[3]).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let stock = db.stock();
            let variant_id = variants[0].id.clone();
            handles.push(tokio::spawn(async move {
                stock.adjust_stock(&variant_id, -1, "sale", "kasiyer").await
            }));
        }

        let mut taken = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => taken += 1,
                Err(DbError::Domain(CoreError::NegativeStock { .. })) => refused += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(taken, 3);
        assert_eq!(refused, 7);
        assert_eq!(db.variants().get(&variants[0].id).await.unwrap().stock_quantity, 0);

        let trail = db
            .stock()
            .movements(&StockMovementFilter {
                variant_id: Some(variants[0].id.clone()),
                ..StockMovementFilter::default()
            })
            .await
            .unwrap();
        // opening stock plus the three removals
        assert_eq!(trail.len(), 4);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_unknown_variant() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .stock()
            .adjust_stock("550e8400-e29b-41d4-a716-446655440000", 1, "purchase", "depo")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
