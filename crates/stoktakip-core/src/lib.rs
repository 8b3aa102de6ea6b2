//! # stoktakip-core: Pure Business Logic for Stoktakip
//!
//! This crate contains the rules of the back office as pure functions with
//! zero I/O dependencies. The database crate (`stoktakip-db`) calls into it
//! inside its transactions; nothing here knows a database exists.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Stoktakip Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Web layer (outside this repository)                  │   │
//! │  │    product forms ── collection form ── sale screen ── reports   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   stoktakip-db (transactions)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stoktakip-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐  │   │
//! │  │  │  types  │ │  money  │ │ pricing │ │ ledger  │ │  stock   │  │   │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Customer, Product, Collection, Sale, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Sell price derivation and identifier generation
//! - [`ledger`] - Open-account sign rules, collection requests and states
//! - [`stock`] - Stock deltas, aggregate stock and deletion checks
//! - [`commands`] - Typed, self-validating inputs for every mutation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use stoktakip_core::money::Money;
//! use stoktakip_core::pricing::compute_sell_price;
//! use stoktakip_core::types::MarkupRate;
//!
//! let cost = Money::from_cents(4500); // 45.00
//! let markup = MarkupRate::from_bps(5000); // 50.00%
//!
//! assert_eq!(compute_sell_price(cost, markup).cents(), 6750);
//! ```

pub mod commands;
pub mod error;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod stock;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default markup applied to new products and variants (50.00%).
pub const DEFAULT_MARKUP_BPS: u32 = 5000;

/// Upper bound accepted for a markup percentage (1000.00%).
pub const MAX_MARKUP_BPS: u32 = 100_000;

/// Largest price, cost or payment amount accepted (99,999,999.99, ten
/// digits with two decimals).
pub const MAX_AMOUNT_CENTS: i64 = 9_999_999_999;

/// Maximum quantity of a single sale line.
pub const MAX_SALE_QUANTITY: i64 = 9_999;

/// Default critical stock threshold for new products.
pub const DEFAULT_CRITICAL_STOCK: i64 = 5;

/// How many times a generated SKU, barcode or collection number is retried
/// after a unique-constraint collision before giving up.
pub const MAX_IDENTIFIER_ATTEMPTS: u32 = 8;

/// Acting user recorded when a caller does not supply one (seed data, jobs).
pub const SYSTEM_USER: &str = "system";
