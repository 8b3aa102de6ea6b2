//! # Repository Module
//!
//! Database repository implementations for Stoktakip.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Web handler                                                           │
//! │       │  db.ledger().cancel_collection(id, user)                       │
//! │       ▼                                                                 │
//! │  LedgerRepository                                                      │
//! │  ├── begin transaction                                                 │
//! │  ├── lock the row (first statement is a write)                         │
//! │  ├── stoktakip-core decides (ensure_can_cancel, StockChange::apply)    │
//! │  ├── write movement + aggregate together                               │
//! │  └── commit (any `?` before this rolls everything back)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`customer::CustomerRepository`] - Customer records
//! - [`ledger::LedgerRepository`] - Open-account movements and collections
//! - [`catalog::CatalogRepository`] - Categories, brands, variant attributes
//! - [`product::ProductRepository`] - Products, pricing, deletion
//! - [`variant::VariantRepository`] - Variants and variant generation
//! - [`stock::StockRepository`] - Stock adjustments and audit trail
//! - [`sale::SaleRepository`] - Sale recording and voiding
//! - [`report::ReportRepository`] - Read-only reports

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::DbResult;

pub mod catalog;
pub mod customer;
pub mod ledger;
pub mod product;
pub mod report;
pub mod sale;
pub mod stock;
pub mod variant;

// =============================================================================
// Shared Helpers
// =============================================================================

/// Half-open UTC time range `[from, to)` used by every date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// The whole of one calendar day.
    pub fn day(date: NaiveDate) -> Self {
        DateRange::days(date, date)
    }

    /// From the start of `first` to the end of `last`, both inclusive.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        let end = last.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
        DateRange {
            from: first.and_time(NaiveTime::MIN).and_utc(),
            to: end.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Everything (no date filter).
    ///
    /// Bounded to four-digit years: timestamps are compared as RFC 3339
    /// text, which only orders correctly within that range.
    pub fn all() -> Self {
        DateRange {
            from: DateTime::<Utc>::default(),
            to: DateTime::from_timestamp(253_402_300_799, 0).unwrap_or_default(),
        }
    }
}

/// Generates a new entity id.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Counts rows whose daily number starts with `prefix`.
///
/// `sql` must be a `SELECT COUNT(*) ... LIKE ?1` query on a fixed column.
pub(crate) async fn count_with_prefix(
    conn: &mut SqliteConnection,
    sql: &'static str,
    prefix: &str,
) -> DbResult<u32> {
    let count: i64 = sqlx::query_scalar(sql)
        .bind(format!("{}%", prefix))
        .fetch_one(&mut *conn)
        .await?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Escapes a user search term for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
