//! # Sale Repository
//!
//! Records completed sales and voids them. A sale is the main producer of
//! stock OUT movements and open-account debt.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. RECORD (one transaction)                                           │
//! │     ├── insert sale S-YYYYMMDD-NNNN with zero totals                   │
//! │     ├── per line: snapshot price/cost, stock OUT through the engine    │
//! │     │            (NegativeStock here rolls the whole sale back)        │
//! │     ├── totals, payments must match the total                          │
//! │     ├── update_totals                                                  │
//! │     └── open-account part ──► debt movement on the customer            │
//! │                                                                         │
//! │  2. (OPTIONAL) VOID (one transaction)                                  │
//! │     ├── completed → voided                                             │
//! │     ├── every OUT movement of the sale reversed with an IN             │
//! │     └── open-account part ──► credit movement                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::post_movement;
use crate::repository::stock::{apply_base_change, apply_variant_change, StockContext};
use crate::repository::{count_with_prefix, new_id, DateRange};
use stoktakip_core::commands::{format_receipt_number, NewSale, SaleTotals, RECEIPT_PREFIX};
use stoktakip_core::ledger::LedgerEntry;
use stoktakip_core::stock::StockChange;
use stoktakip_core::{
    CoreError, Money, Payment, PaymentMethod, Product, ProductVariant, Sale, SaleItem, SaleStatus,
    StockDirection, StockMovement, ValidationError, MAX_IDENTIFIER_ATTEMPTS,
};

/// Filters for listing sales.
#[derive(Debug, Clone)]
pub struct SaleFilter {
    pub customer_id: Option<String>,
    pub status: Option<SaleStatus>,
    pub range: DateRange,
    pub limit: u32,
}

impl Default for SaleFilter {
    fn default() -> Self {
        SaleFilter {
            customer_id: None,
            status: None,
            range: DateRange::all(),
            limit: 100,
        }
    }
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a completed sale.
    ///
    /// ## Errors
    /// - `Validation` for malformed items or payments
    /// - `NegativeStock` if a line sells more than is in stock
    /// - `InvalidAmount` if the discount exceeds the subtotal
    /// - `IntegrityViolation` if the payments do not add up to the total
    /// - `NotFound` for an unknown customer, product or variant
    ///
    /// Any error leaves no trace: sale, stock and balance roll back together.
    pub async fn record_sale(&self, input: NewSale) -> DbResult<Sale> {
        input.validate()?;
        debug!(items = input.items.len(), customer_id = ?input.customer_id, "Recording sale");

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let id = new_id();
        let mut sale = Sale {
            // a draft number until the daily sequence is assigned below
            receipt_number: id.clone(),
            id,
            customer_id: input.customer_id.clone(),
            status: SaleStatus::Completed,
            subtotal_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            user_id: input.user_id.clone(),
            notes: input.notes.clone(),
            created_at: now,
            voided_at: None,
        };

        // The insert is the first statement, so this transaction holds the
        // write lock before it reads today's count.
        match insert_sale(&mut tx, &sale).await {
            Ok(()) => {}
            Err(DbError::ForeignKeyViolation { .. }) => {
                let customer = sale.customer_id.as_deref().unwrap_or_default();
                return Err(DbError::not_found("Customer", customer));
            }
            Err(err) => return Err(err),
        }

        let prefix = format!("{}-{}-", RECEIPT_PREFIX, now.format("%Y%m%d"));
        let recorded_today = count_with_prefix(
            &mut tx,
            "SELECT COUNT(*) FROM sales WHERE receipt_number LIKE ?1",
            &prefix,
        )
        .await?;

        let mut attempt = 0;
        loop {
            sale.receipt_number = format_receipt_number(now, recorded_today + 1 + attempt);
            let numbered = sqlx::query("UPDATE sales SET receipt_number = ?2 WHERE id = ?1")
                .bind(&sale.id)
                .bind(&sale.receipt_number)
                .execute(&mut *tx)
                .await
                .map_err(DbError::from);
            match numbered {
                Ok(_) => break,
                Err(err)
                    if err.is_unique_violation_on("sales.receipt_number")
                        && attempt + 1 < MAX_IDENTIFIER_ATTEMPTS =>
                {
                    debug!(receipt_number = %sale.receipt_number, "Receipt number taken, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }

        let stock_description = format!("sale: {}", sale.receipt_number);
        let mut line_totals = Vec::with_capacity(input.items.len());

        for line in &input.items {
            let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
                .bind(&line.product_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &line.product_id))?;
            if !product.is_active {
                return Err(CoreError::blocked(
                    "record sale",
                    format!("product '{}' is not active", product.name),
                )
                .into());
            }

            let variant = resolve_line_variant(&mut tx, &product, line.variant_id.as_deref()).await?;
            let change = StockChange {
                direction: StockDirection::Out,
                quantity: line.quantity,
            };
            let ctx = StockContext {
                user_id: &input.user_id,
                description: &stock_description,
                reference_id: Some(sale.id.as_str()),
            };

            if product.track_stock {
                match &variant {
                    Some(variant) => {
                        apply_variant_change(&mut tx, &variant.id, change, ctx).await?;
                    }
                    None => {
                        apply_base_change(&mut tx, &product.id, change, ctx).await?;
                    }
                }
            }

            let (unit_price, unit_cost, name) = match &variant {
                Some(v) => (
                    v.sell_price(),
                    v.cost(),
                    format!("{} ({})", product.name, v.label),
                ),
                None => (product.sell_price(), product.cost(), product.name.clone()),
            };
            let line_total = unit_price
                .checked_mul(line.quantity)
                .ok_or_else(|| CoreError::amount_overflow("line total", unit_price.cents()))?;

            let item = SaleItem {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: product.id.clone(),
                variant_id: variant.as_ref().map(|v| v.id.clone()),
                sku_snapshot: product.sku.clone(),
                name_snapshot: name,
                unit_price_cents: unit_price.cents(),
                unit_cost_cents: unit_cost.cents(),
                quantity: line.quantity,
                line_total_cents: line_total.cents(),
                created_at: now,
            };
            insert_item(&mut tx, &item).await?;
            line_totals.push(line_total);
        }

        let totals = SaleTotals::compute(line_totals, Money::from_cents(input.discount_cents))?;
        totals.check_payments(&input.payments)?;

        for tender in &input.payments {
            let payment = Payment {
                id: new_id(),
                sale_id: sale.id.clone(),
                method: tender.method,
                amount_cents: tender.amount_cents,
                reference: tender.reference.clone(),
                created_at: now,
            };
            insert_payment(&mut tx, &payment).await?;
        }

        sqlx::query(
            "UPDATE sales SET subtotal_cents = ?2, discount_cents = ?3, total_cents = ?4 WHERE id = ?1",
        )
        .bind(&sale.id)
        .bind(totals.subtotal.cents())
        .bind(totals.discount.cents())
        .bind(totals.total.cents())
        .execute(&mut *tx)
        .await?;
        sale.subtotal_cents = totals.subtotal.cents();
        sale.discount_cents = totals.discount.cents();
        sale.total_cents = totals.total.cents();

        let open_account = input.open_account_amount()?;
        if let (true, Some(customer_id)) = (open_account.is_positive(), &sale.customer_id) {
            let entry = LedgerEntry::debt(
                customer_id,
                open_account,
                format!("sale: {}", sale.receipt_number),
                &sale.user_id,
            )
            .for_sale(&sale.id);
            post_movement(&mut tx, &entry).await?;
        }

        tx.commit().await?;

        info!(
            receipt_number = %sale.receipt_number,
            total = %totals.total,
            open_account = %open_account,
            "Sale recorded"
        );
        Ok(sale)
    }

    /// Voids a completed sale, returning its stock and reversing its
    /// open-account debt.
    ///
    /// ## Errors
    /// `InvalidStatus` if the sale is already voided.
    pub async fn void_sale(&self, id: &str, user_id: &str) -> DbResult<Sale> {
        stoktakip_core::validation::validate_required("user_id", user_id)?;
        debug!(id = %id, "Voiding sale");

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE sales SET status = status WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        let mut sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if sale.status != SaleStatus::Completed {
            return Err(CoreError::InvalidStatus {
                entity: "Sale".to_string(),
                id: sale.receipt_number.clone(),
                current: "voided".to_string(),
                action: "void".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        sqlx::query("UPDATE sales SET status = 'voided', voided_at = ?2 WHERE id = ?1 AND status = 'completed'")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sale.status = SaleStatus::Voided;
        sale.voided_at = Some(now);

        // Reverse exactly what the sale took out
        let taken = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE reference_id = ?1 AND direction = 'out' ORDER BY rowid",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let description = format!("void: {}", sale.receipt_number);
        for movement in &taken {
            let change = StockChange {
                direction: StockDirection::In,
                quantity: movement.quantity,
            };
            let ctx = StockContext {
                user_id,
                description: &description,
                reference_id: Some(id),
            };
            match &movement.variant_id {
                Some(variant_id) => {
                    apply_variant_change(&mut tx, variant_id, change, ctx).await?;
                }
                None => {
                    apply_base_change(&mut tx, &movement.product_id, change, ctx).await?;
                }
            }
        }

        let open_account: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE sale_id = ?1 AND method = 'open_account'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let open_account = Money::from_cents(open_account);

        if let (true, Some(customer_id)) = (open_account.is_positive(), &sale.customer_id) {
            let entry = LedgerEntry::credit(customer_id, open_account, description.clone(), user_id)
                .for_sale(id);
            post_movement(&mut tx, &entry).await?;
        }

        tx.commit().await?;

        info!(
            receipt_number = %sale.receipt_number,
            returned_lines = taken.len(),
            credited = %open_account,
            "Sale voided"
        );
        Ok(sale)
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// Gets a sale by ID, failing with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Sale> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Gets all items of a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Gets all payments of a sale.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE sale_id = ?1 ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    /// Lists sales, newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE (?1 IS NULL OR customer_id = ?1)
              AND (?2 IS NULL OR status = ?2)
              AND created_at >= ?3 AND created_at < ?4
            ORDER BY created_at DESC
            LIMIT ?5
            "#,
        )
        .bind(&filter.customer_id)
        .bind(filter.status)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Resolves and checks the variant of a sale line.
async fn resolve_line_variant(
    conn: &mut SqliteConnection,
    product: &Product,
    variant_id: Option<&str>,
) -> DbResult<Option<ProductVariant>> {
    match (product.has_variants, variant_id) {
        (false, None) => Ok(None),
        (false, Some(_)) => Err(ValidationError::InvalidFormat {
            field: "variant_id".to_string(),
            reason: format!("product '{}' has no variants", product.name),
        }
        .into()),
        (true, None) => Err(ValidationError::Required {
            field: "variant_id".to_string(),
        }
        .into()),
        (true, Some(variant_id)) => {
            let variant =
                sqlx::query_as::<_, ProductVariant>("SELECT * FROM product_variants WHERE id = ?1")
                    .bind(variant_id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or_else(|| DbError::not_found("Variant", variant_id))?;
            if variant.product_id != product.id {
                return Err(ValidationError::InvalidFormat {
                    field: "variant_id".to_string(),
                    reason: format!("variant does not belong to '{}'", product.name),
                }
                .into());
            }
            if !variant.is_active {
                return Err(CoreError::blocked(
                    "record sale",
                    format!("variant '{}' is not active", variant.label),
                )
                .into());
            }
            Ok(Some(variant))
        }
    }
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, receipt_number, customer_id, status,
            subtotal_cents, discount_cents, total_cents,
            user_id, notes, created_at, voided_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.receipt_number)
    .bind(&sale.customer_id)
    .bind(sale.status)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(&sale.user_id)
    .bind(&sale.notes)
    .bind(sale.created_at)
    .bind(sale.voided_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, variant_id, sku_snapshot, name_snapshot,
            unit_price_cents, unit_cost_cents, quantity, line_total_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.variant_id)
    .bind(&item.sku_snapshot)
    .bind(&item.name_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.unit_cost_cents)
    .bind(item.quantity)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    debug!(method = ?payment.method, amount = payment.amount_cents, "Adding payment");
    sqlx::query(
        r#"
        INSERT INTO payments (id, sale_id, method, amount_cents, reference, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(payment.method)
    .bind(payment.amount_cents)
    .bind(&payment.reference)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Sum of a sale's payments by method, for receipts.
pub fn paid_by(payments: &[Payment], method: PaymentMethod) -> Money {
    payments
        .iter()
        .filter(|p| p.method == method)
        .map(|p| Money::from_cents(p.amount_cents))
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
