//! # Domain Types
//!
//! Core domain types used throughout Stoktakip.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Open account                       Catalog & stock                     │
//! │  ┌─────────────────┐                ┌─────────────────┐                 │
//! │  │    Customer     │                │     Product     │                 │
//! │  │  balance_cents  │◄─┐             │  sku, markup    │◄─┐              │
//! │  └─────────────────┘  │             │  has_variants   │  │              │
//! │  ┌─────────────────┐  │             └─────────────────┘  │              │
//! │  │ LedgerMovement  │──┤             ┌─────────────────┐  │              │
//! │  │ debt / credit   │  │             │ ProductVariant  │──┤              │
//! │  └─────────────────┘  │             │ barcode, stock  │  │              │
//! │  ┌─────────────────┐  │             └─────────────────┘  │              │
//! │  │   Collection    │──┘             ┌─────────────────┐  │              │
//! │  │ pending/collect │                │  StockMovement  │──┘              │
//! │  └─────────────────┘                │    in / out     │                 │
//! │                                     └─────────────────┘                 │
//! │  Sale ── SaleItem (price + cost snapshots) ── Payment                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage conventions
//! - Money columns end in `_cents` and hold minor units (i64)
//! - Markup columns end in `_bps` (50.00% = 5000)
//! - Movement rows are append-only; aggregates fold them

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Markup Rate
// =============================================================================

/// Markup percentage in basis points (1 bps = 0.01%).
///
/// `MarkupRate::from_bps(5000)` is 50.00%: a cost of ₺45.00 sells for
/// ₺67.50.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MarkupRate(u32);

impl MarkupRate {
    /// Creates a markup rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        MarkupRate(bps)
    }

    /// Creates a markup rate from an exact percentage ("50.00" -> 5000 bps).
    ///
    /// Extra fractional digits are rounded (midpoint away from zero).
    /// Returns `None` for negative values or values outside the `u32` range.
    pub fn from_percent(percent: Decimal) -> Option<Self> {
        if percent.is_sign_negative() && !percent.is_zero() {
            return None;
        }
        percent
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .map(MarkupRate)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as an exact percentage (5000 bps -> 50.00).
    #[inline]
    pub fn percent(&self) -> Decimal {
        Decimal::new(self.0 as i64, 2)
    }

    /// Zero markup: sell price equals cost.
    #[inline]
    pub const fn zero() -> Self {
        MarkupRate(0)
    }
}

impl Default for MarkupRate {
    fn default() -> Self {
        MarkupRate(crate::DEFAULT_MARKUP_BPS)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer who may buy on open account.
///
/// `balance_cents` is denormalized: it always equals the signed sum of the
/// customer's ledger movements. Only the ledger engine writes it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Positive: customer owes the store. Negative: customer has credit.
    pub balance_cents: i64,
    /// Soft delete flag; customers with movements are never removed.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Returns the open-account balance.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    /// Full name as shown on receipts and lists.
    pub fn display_name(&self) -> String {
        match &self.company_name {
            Some(company) if !company.trim().is_empty() => {
                format!("{} {} ({})", self.first_name, self.last_name, company)
            }
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

// =============================================================================
// Ledger Movement
// =============================================================================

/// Direction of an open-account movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Customer owes more (open-account sale, cancelled collection).
    Debt,
    /// Customer owes less (collection, voided sale).
    Credit,
}

impl MovementKind {
    /// The opposite kind, used for offsetting entries.
    pub const fn reversed(self) -> Self {
        match self {
            MovementKind::Debt => MovementKind::Credit,
            MovementKind::Credit => MovementKind::Debt,
        }
    }
}

/// One immutable row of a customer's open-account log.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerMovement {
    pub id: String,
    pub customer_id: String,
    pub kind: MovementKind,
    /// Always positive; the sign comes from `kind`.
    pub amount_cents: i64,
    pub description: String,
    pub sale_id: Option<String>,
    pub collection_id: Option<String>,
    /// Acting user who caused the movement.
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerMovement {
    /// Signed effect on the balance: +amount for debt, -amount for credit.
    pub fn signed_amount(&self) -> Money {
        crate::ledger::signed(self.kind, Money::from_cents(self.amount_cents))
    }
}

// =============================================================================
// Collection
// =============================================================================

/// How a collection was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    Cash,
    Card,
    /// Bank check (çek); settles on its due date.
    Check,
    /// Promissory note (senet); settles on its due date.
    PromissoryNote,
    /// Bank wire / EFT (havale).
    WireTransfer,
}

impl CollectionType {
    /// Check and promissory note are paid later; the rest settle at once.
    pub const fn is_deferred(self) -> bool {
        matches!(self, CollectionType::Check | CollectionType::PromissoryNote)
    }
}

/// Collection lifecycle.
///
/// ```text
/// pending ──settle──► collected
///    │                    │
///    └──cancel──► cancelled ◄──cancel──┘   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Pending,
    Collected,
    Cancelled,
}

impl CollectionStatus {
    /// Lowercase name as stored in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            CollectionStatus::Pending => "pending",
            CollectionStatus::Collected => "collected",
            CollectionStatus::Cancelled => "cancelled",
        }
    }
}

/// A payment received against a customer's open-account debt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Collection {
    pub id: String,
    /// Human-readable number, e.g. `THS-20261019-0003`.
    pub collection_no: String,
    pub customer_id: String,
    pub amount_cents: i64,
    pub collection_type: CollectionType,
    pub status: CollectionStatus,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    /// Check or promissory note number.
    pub instrument_no: Option<String>,
    pub bank: Option<String>,
    /// Wire transfer reference.
    pub reference_no: Option<String>,
    pub description: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub settled_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Collection {
    /// Returns the collected amount.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Catalog Support
// =============================================================================

/// Product category.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Product brand.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Which axis a variant attribute belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Color,
    Size,
    Other,
}

/// A selectable variant value such as "Siyah" (color) or "XL" (size).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct VariantAttribute {
    pub id: String,
    pub kind: AttributeKind,
    pub value: String,
    pub sort_order: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// Selling unit of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductUnit {
    Piece,
    Set,
    Pair,
    Kg,
    #[serde(rename = "g")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "g"))]
    Gram,
    #[serde(rename = "l")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "l"))]
    Liter,
    #[serde(rename = "ml")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ml"))]
    Milliliter,
    #[serde(rename = "m")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "m"))]
    Meter,
    #[serde(rename = "cm")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "cm"))]
    Centimeter,
}

impl Default for ProductUnit {
    fn default() -> Self {
        ProductUnit::Piece
    }
}

/// Target customer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Women,
    Men,
    Unisex,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Women
    }
}

/// A catalog product.
///
/// When `has_variants` is true, price and stock live on the variants and
/// `base_stock` is ignored; otherwise the product itself is the sellable
/// unit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Stock Keeping Unit, `URN` + 6 digits when generated.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub brand_id: Option<String>,
    pub unit: ProductUnit,
    pub gender: Gender,
    pub cost_cents: i64,
    pub markup_bps: u32,
    /// Derived from cost and markup on every save. Read-only to users.
    pub sell_price_cents: i64,
    pub has_variants: bool,
    /// Stock of a non-variant product.
    pub base_stock: i64,
    /// At or below this level the product is reported as critical.
    pub critical_stock: i64,
    pub track_stock: bool,
    pub is_active: bool,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the cost price.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the markup rate.
    #[inline]
    pub fn markup(&self) -> MarkupRate {
        MarkupRate::from_bps(self.markup_bps)
    }

    /// Returns the derived sell price.
    #[inline]
    pub fn sell_price(&self) -> Money {
        Money::from_cents(self.sell_price_cents)
    }
}

// =============================================================================
// Product Variant
// =============================================================================

/// One color/size/other combination of a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    /// `<SKU>V` + 4 digits when generated.
    pub barcode: String,
    pub color_id: Option<String>,
    pub size_id: Option<String>,
    pub other_id: Option<String>,
    /// Attribute values joined for display ("Siyah - M", "Standart").
    pub label: String,
    pub cost_cents: i64,
    pub markup_bps: u32,
    pub sell_price_cents: i64,
    pub stock_quantity: i64,
    pub note: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Returns the cost price.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the markup rate.
    #[inline]
    pub fn markup(&self) -> MarkupRate {
        MarkupRate::from_bps(self.markup_bps)
    }

    /// Returns the derived sell price.
    #[inline]
    pub fn sell_price(&self) -> Money {
        Money::from_cents(self.sell_price_cents)
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    In,
    Out,
}

/// Append-only stock audit row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// Absent for base-stock movements of non-variant products.
    pub variant_id: Option<String>,
    pub direction: StockDirection,
    /// Always positive; the sign comes from `direction`.
    pub quantity: i64,
    pub user_id: String,
    pub description: String,
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Signed change in stock: +quantity for in, -quantity for out.
    pub fn signed_quantity(&self) -> i64 {
        match self.direction {
            StockDirection::In => self.quantity,
            StockDirection::Out => -self.quantity,
        }
    }
}

/// Stock level classification used by lists and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    Critical,
    Normal,
}

// =============================================================================
// Sale
// =============================================================================

/// The status of a recorded sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been paid and finalized.
    Completed,
    /// Sale was cancelled; stock and open-account effects reversed.
    Voided,
}

/// How (part of) a sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Charged to the customer's open account (veresiye).
    OpenAccount,
    WireTransfer,
}

/// A completed or voided sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub customer_id: Option<String>,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub user_id: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
}

impl Sale {
    /// Returns the sale total.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    /// SKU or barcode at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product and variant name at time of sale (frozen).
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    /// Cost at time of sale, for profit reports.
    pub unit_cost_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A payment towards a sale. Split tender produces several rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_markup_from_percent() {
        assert_eq!(MarkupRate::from_percent(dec!(50)).unwrap().bps(), 5000);
        assert_eq!(MarkupRate::from_percent(dec!(20.00)).unwrap().bps(), 2000);
        assert_eq!(MarkupRate::from_percent(dec!(12.345)).unwrap().bps(), 1235);
        assert_eq!(MarkupRate::from_percent(dec!(0)).unwrap().bps(), 0);
        assert!(MarkupRate::from_percent(dec!(-5)).is_none());
    }

    #[test]
    fn test_markup_percent_is_exact() {
        assert_eq!(MarkupRate::from_bps(1250).percent(), dec!(12.50));
        assert_eq!(MarkupRate::default().bps(), crate::DEFAULT_MARKUP_BPS);
    }

    #[test]
    fn test_collection_type_deferral() {
        assert!(CollectionType::Check.is_deferred());
        assert!(CollectionType::PromissoryNote.is_deferred());
        assert!(!CollectionType::Cash.is_deferred());
        assert!(!CollectionType::Card.is_deferred());
        assert!(!CollectionType::WireTransfer.is_deferred());
    }

    #[test]
    fn test_enum_serialization() {
        let json = serde_json::to_string(&CollectionType::PromissoryNote).unwrap();
        assert_eq!(json, "\"promissory_note\"");
        let json = serde_json::to_string(&PaymentMethod::OpenAccount).unwrap();
        assert_eq!(json, "\"open_account\"");
    }

    #[test]
    fn test_movement_kind_reversed() {
        assert_eq!(MovementKind::Debt.reversed(), MovementKind::Credit);
        assert_eq!(MovementKind::Credit.reversed(), MovementKind::Debt);
    }
}
