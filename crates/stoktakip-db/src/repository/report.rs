//! # Report Repository
//!
//! Read-only queries behind the back office report screens. Nothing here
//! writes; every figure counts completed sales only, so a voided sale
//! drops out of every report.

use chrono::NaiveDate;
use rust_decimal::prelude::*;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use ts_rs::TS;

use crate::error::DbResult;
use crate::repository::DateRange;
use stoktakip_core::stock::{aggregate_stock, stock_status, VariantStock};
use stoktakip_core::{PaymentMethod, StockStatus};

// =============================================================================
// Report Rows
// =============================================================================

/// Takings of one calendar day.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct DailySales {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub sale_count: i64,
    pub total_cents: i64,
    pub discount_cents: i64,
    pub by_method: Vec<MethodTotal>,
}

/// Payments of one method.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

/// One row of the best sellers list.
#[derive(Debug, Clone, Serialize, TS, sqlx::FromRow)]
#[ts(export)]
pub struct TopSeller {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

/// Revenue against cost of goods sold for a period.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ProfitLoss {
    pub sale_count: i64,
    /// Sum of line totals (before sale-level discounts).
    pub revenue_cents: i64,
    pub discount_cents: i64,
    /// Sum of snapshotted unit cost × quantity.
    pub cost_cents: i64,
    pub profit_cents: i64,
    /// Profit over revenue in percent, 2 decimals; absent without revenue.
    #[ts(as = "Option<String>")]
    pub margin_percent: Option<Decimal>,
    /// Per-product breakdown, most profitable first.
    pub by_product: Vec<ProductProfit>,
}

/// Revenue against cost of one product within a period.
#[derive(Debug, Clone, Serialize, TS, sqlx::FromRow)]
#[ts(export)]
pub struct ProductProfit {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub profit_cents: i64,
}

/// Filters for the stock report.
#[derive(Debug, Clone, Default)]
pub struct StockReportFilter {
    pub status: Option<StockStatus>,
    pub category_id: Option<String>,
}

/// Stock position of one product.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct StockReportRow {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub critical_stock: i64,
    pub status: StockStatus,
    /// Active variants at or below the critical level ("Siyah - M").
    pub low_variants: Vec<String>,
}

/// Open-account totals across all customers.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ReceivablesSummary {
    pub debtor_count: i64,
    /// What customers owe the store.
    pub receivable_cents: i64,
    pub creditor_count: i64,
    /// What the store owes customers (overpayments).
    pub credit_cents: i64,
    pub pending_collection_count: i64,
    pub pending_collection_cents: i64,
}

/// Sales totals of one customer.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct CustomerReportRow {
    pub customer_id: String,
    pub name: String,
    pub sale_count: i64,
    pub total_cents: i64,
    pub average_cents: i64,
    pub balance_cents: i64,
}

#[derive(sqlx::FromRow)]
struct CustomerTotals {
    customer_id: String,
    name: String,
    sale_count: i64,
    total_cents: i64,
    balance_cents: i64,
}

#[derive(sqlx::FromRow)]
struct StockProduct {
    id: String,
    sku: String,
    name: String,
    has_variants: bool,
    base_stock: i64,
    critical_stock: i64,
}

#[derive(sqlx::FromRow)]
struct StockVariant {
    product_id: String,
    label: String,
    stock_quantity: i64,
    is_active: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Read-only report queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Completed sales of one day with a per-method breakdown.
    pub async fn daily_sales(&self, date: NaiveDate) -> DbResult<DailySales> {
        let range = DateRange::day(date);
        debug!(%date, "Daily sales report");

        let (sale_count, total_cents, discount_cents): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(total_cents), 0), COALESCE(SUM(discount_cents), 0)
            FROM sales
            WHERE status = 'completed' AND created_at >= ?1 AND created_at < ?2
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await?;

        let by_method: Vec<(PaymentMethod, i64)> = sqlx::query_as(
            r#"
            SELECT p.method, SUM(p.amount_cents)
            FROM payments p
            JOIN sales s ON s.id = p.sale_id
            WHERE s.status = 'completed' AND s.created_at >= ?1 AND s.created_at < ?2
            GROUP BY p.method
            ORDER BY p.method
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(DailySales {
            date,
            sale_count,
            total_cents,
            discount_cents,
            by_method: by_method
                .into_iter()
                .map(|(method, amount_cents)| MethodTotal {
                    method,
                    amount_cents,
                })
                .collect(),
        })
    }

    /// Best sellers by quantity within a period.
    pub async fn top_sellers(&self, range: DateRange, limit: u32) -> DbResult<Vec<TopSeller>> {
        let rows = sqlx::query_as::<_, TopSeller>(
            r#"
            SELECT
                si.product_id,
                p.sku,
                p.name,
                SUM(si.quantity) AS quantity,
                SUM(si.line_total_cents) AS revenue_cents
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE s.status = 'completed' AND s.created_at >= ?1 AND s.created_at < ?2
            GROUP BY si.product_id, p.sku, p.name
            ORDER BY quantity DESC, revenue_cents DESC
            LIMIT ?3
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Revenue, cost of goods sold and margin within a period.
    pub async fn profit_loss(&self, range: DateRange) -> DbResult<ProfitLoss> {
        let (revenue_cents, cost_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(si.line_total_cents), 0),
                COALESCE(SUM(si.unit_cost_cents * si.quantity), 0)
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            WHERE s.status = 'completed' AND s.created_at >= ?1 AND s.created_at < ?2
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await?;

        let (sale_count, discount_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(discount_cents), 0)
            FROM sales
            WHERE status = 'completed' AND created_at >= ?1 AND created_at < ?2
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await?;

        let by_product = sqlx::query_as::<_, ProductProfit>(
            r#"
            SELECT
                p.id AS product_id,
                p.sku,
                p.name,
                SUM(si.quantity) AS quantity,
                SUM(si.line_total_cents) AS revenue_cents,
                SUM(si.unit_cost_cents * si.quantity) AS cost_cents,
                SUM(si.line_total_cents) - SUM(si.unit_cost_cents * si.quantity) AS profit_cents
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE s.status = 'completed' AND s.created_at >= ?1 AND s.created_at < ?2
            GROUP BY p.id
            ORDER BY profit_cents DESC, p.name
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        let profit_cents = revenue_cents - cost_cents;
        debug!(sale_count, products = by_product.len(), profit_cents, "Profit and loss computed");
        Ok(ProfitLoss {
            sale_count,
            revenue_cents,
            discount_cents,
            cost_cents,
            profit_cents,
            margin_percent: margin_percent(profit_cents, revenue_cents),
            by_product,
        })
    }

    /// Aggregate stock of active, stock-tracked products, lowest first.
    pub async fn stock_report(&self, filter: &StockReportFilter) -> DbResult<Vec<StockReportRow>> {
        let products = sqlx::query_as::<_, StockProduct>(
            r#"
            SELECT id, sku, name, has_variants, base_stock, critical_stock
            FROM products
            WHERE is_active = 1 AND track_stock = 1
              AND (?1 IS NULL OR category_id = ?1)
            ORDER BY name
            "#,
        )
        .bind(&filter.category_id)
        .fetch_all(&self.pool)
        .await?;

        let variants = sqlx::query_as::<_, StockVariant>(
            r#"
            SELECT v.product_id, v.label, v.stock_quantity, v.is_active
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE p.is_active = 1 AND p.track_stock = 1
            ORDER BY v.created_at, v.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rows: Vec<StockReportRow> = products
            .into_iter()
            .map(|p| {
                let own: Vec<VariantStock> = variants
                    .iter()
                    .filter(|v| v.product_id == p.id)
                    .map(|v| VariantStock {
                        label: v.label.clone(),
                        stock_quantity: v.stock_quantity,
                        is_active: v.is_active,
                    })
                    .collect();
                let quantity = aggregate_stock(p.has_variants, p.base_stock, &own);
                let low_variants = own
                    .iter()
                    .filter(|v| v.is_active && v.stock_quantity <= p.critical_stock)
                    .map(|v| v.label.clone())
                    .collect();
                StockReportRow {
                    status: stock_status(quantity, p.critical_stock),
                    product_id: p.id,
                    sku: p.sku,
                    name: p.name,
                    quantity,
                    critical_stock: p.critical_stock,
                    low_variants,
                }
            })
            .filter(|row| filter.status.map_or(true, |status| row.status == status))
            .collect();

        rows.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    /// Totals of open-account balances and pending collections.
    pub async fn receivables_summary(&self) -> DbResult<ReceivablesSummary> {
        let (debtor_count, receivable_cents, creditor_count, credit_cents): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN balance_cents > 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN balance_cents > 0 THEN balance_cents ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN balance_cents < 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN balance_cents < 0 THEN -balance_cents ELSE 0 END), 0)
                FROM customers
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let (pending_collection_count, pending_collection_cents): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount_cents), 0) FROM collections WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ReceivablesSummary {
            debtor_count,
            receivable_cents,
            creditor_count,
            credit_cents,
            pending_collection_count,
            pending_collection_cents,
        })
    }

    /// Active customers ranked by completed sales within a period.
    pub async fn customer_report(
        &self,
        range: DateRange,
        limit: u32,
    ) -> DbResult<Vec<CustomerReportRow>> {
        let rows = sqlx::query_as::<_, CustomerTotals>(
            r#"
            SELECT
                c.id AS customer_id,
                c.first_name || ' ' || c.last_name AS name,
                COUNT(s.id) AS sale_count,
                SUM(s.total_cents) AS total_cents,
                c.balance_cents AS balance_cents
            FROM customers c
            JOIN sales s ON s.customer_id = c.id
            WHERE c.is_active = 1
              AND s.status = 'completed'
              AND s.created_at >= ?1 AND s.created_at < ?2
            GROUP BY c.id, c.first_name, c.last_name, c.balance_cents
            ORDER BY total_cents DESC
            LIMIT ?3
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CustomerReportRow {
                average_cents: if r.sale_count > 0 {
                    r.total_cents / r.sale_count
                } else {
                    0
                },
                customer_id: r.customer_id,
                name: r.name,
                sale_count: r.sale_count,
                total_cents: r.total_cents,
                balance_cents: r.balance_cents,
            })
            .collect())
    }
}

/// `profit / revenue × 100`, rounded to 2 decimals.
fn margin_percent(profit_cents: i64, revenue_cents: i64) -> Option<Decimal> {
    if revenue_cents == 0 {
        return None;
    }
    let ratio = Decimal::from(profit_cents).checked_div(Decimal::from(revenue_cents))?;
    Some(
        (ratio * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
