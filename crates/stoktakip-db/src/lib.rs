//! # stoktakip-db: Database Layer for Stoktakip
//!
//! This crate runs the back office rules of `stoktakip-core` against SQLite.
//! It uses sqlx for async operations; every mutation is one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stoktakip Data Flow                              │
//! │                                                                         │
//! │  Web handler (collection form submit)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stoktakip-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ LedgerRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ProductRepo   │    │ 001_initial  │  │   │
//! │  │   │ AppConfig     │    │ SaleRepo      │    │ _schema.sql  │  │   │
//! │  │   │               │    │ ReportRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  SQLite Database (WAL)                          │   │
//! │  │                  STOKTAKIP_DB_PATH                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (ledger, product, sale, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stoktakip_db::{AppConfig, Database};
//!
//! let db = Database::new(AppConfig::load()?.db_config()).await?;
//!
//! let movement = db
//!     .ledger()
//!     .record_debt(&customer_id, Money::from_cents(25000), "Veresiye satış", "kasiyer")
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::DateRange;

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::customer::CustomerRepository;
pub use repository::ledger::{CollectionFilter, CollectionReceipt, LedgerRepository};
pub use repository::product::{CodeLookup, ProductFilter, ProductRepository};
pub use repository::report::{ReportRepository, StockReportFilter};
pub use repository::sale::{SaleFilter, SaleRepository};
pub use repository::stock::{StockMovementFilter, StockRepository};
pub use repository::variant::VariantRepository;
