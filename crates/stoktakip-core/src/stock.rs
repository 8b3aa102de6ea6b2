//! # Stock Rules
//!
//! Stock deltas, aggregate stock and the product deletion check.
//!
//! ## Stock Edit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  manual edit 3 ──► 8            sale of 2               void of sale    │
//! │        │                           │                        │           │
//! │        ▼                           ▼                        ▼           │
//! │  StockChange::from_delta(+5)  from_delta(-2)          from_delta(+2)    │
//! │        │                           │                        │           │
//! │        ▼                           ▼                        ▼           │
//! │  movement IN 5               movement OUT 2           movement IN 2     │
//! │  stock += 5                  stock -= 2 (never < 0)   stock += 2        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Aggregate product stock is never stored: it is folded from the active
//! variants on read.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{StockDirection, StockStatus};

// =============================================================================
// Stock Change
// =============================================================================

/// A non-zero stock delta split into direction and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockChange {
    pub direction: StockDirection,
    /// Always positive.
    pub quantity: i64,
}

impl StockChange {
    /// Splits a signed delta. A zero delta is rejected.
    pub fn from_delta(delta: i64) -> CoreResult<Self> {
        if delta == 0 {
            return Err(ValidationError::MustBePositive {
                field: "stock delta".to_string(),
            }
            .into());
        }
        let direction = if delta > 0 {
            StockDirection::In
        } else {
            StockDirection::Out
        };
        Ok(StockChange {
            direction,
            quantity: delta.saturating_abs(),
        })
    }

    /// The opposite change, used when voiding a sale.
    pub fn reversed(self) -> Self {
        StockChange {
            direction: match self.direction {
                StockDirection::In => StockDirection::Out,
                StockDirection::Out => StockDirection::In,
            },
            quantity: self.quantity,
        }
    }

    /// Signed delta.
    pub fn delta(&self) -> i64 {
        match self.direction {
            StockDirection::In => self.quantity,
            StockDirection::Out => -self.quantity,
        }
    }

    /// Applies the change to a current quantity.
    ///
    /// ## Errors
    /// `NegativeStock` if the result would be below zero; `item` names the
    /// variant or product in the message.
    pub fn apply(&self, item: &str, current: i64) -> CoreResult<i64> {
        match current.checked_add(self.delta()) {
            Some(next) if next >= 0 => Ok(next),
            _ => Err(CoreError::NegativeStock {
                item: item.to_string(),
                available: current,
                requested: self.quantity,
            }),
        }
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// The stock-relevant facts of one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantStock {
    pub label: String,
    pub stock_quantity: i64,
    pub is_active: bool,
}

/// Aggregate stock of a product.
///
/// Variant-based products sum their active variants; the rest report their
/// base stock.
///
/// ```rust
/// use stoktakip_core::stock::{aggregate_stock, VariantStock};
///
/// let variants = vec![
///     VariantStock { label: "Siyah - S".into(), stock_quantity: 4, is_active: true },
///     VariantStock { label: "Siyah - M".into(), stock_quantity: 3, is_active: true },
///     VariantStock { label: "Beyaz - M".into(), stock_quantity: 9, is_active: false },
/// ];
/// assert_eq!(aggregate_stock(true, 0, &variants), 7);
/// assert_eq!(aggregate_stock(false, 12, &[]), 12);
/// ```
pub fn aggregate_stock(has_variants: bool, base_stock: i64, variants: &[VariantStock]) -> i64 {
    if has_variants {
        variants
            .iter()
            .filter(|v| v.is_active)
            .map(|v| v.stock_quantity)
            .sum()
    } else {
        base_stock
    }
}

/// Classifies a stock level against its critical threshold.
pub fn stock_status(quantity: i64, critical: i64) -> StockStatus {
    if quantity <= 0 {
        StockStatus::OutOfStock
    } else if quantity <= critical {
        StockStatus::Critical
    } else {
        StockStatus::Normal
    }
}

// =============================================================================
// Deletion Check
// =============================================================================

/// Everything that can block deleting a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionFacts {
    pub base_stock: i64,
    pub variants: Vec<VariantStock>,
    /// Number of sale lines referencing the product or its variants.
    pub sale_references: i64,
}

/// Result of a deletion check: allowed, or blocked with a readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeletionCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl DeletionCheck {
    /// Converts a blocked check into an `IntegrityViolation`.
    pub fn into_result(self) -> CoreResult<()> {
        self.into_result_for("delete product")
    }

    /// Like [`DeletionCheck::into_result`], naming `action` in the error.
    pub fn into_result_for(self, action: &str) -> CoreResult<()> {
        match (self.allowed, self.reason) {
            (true, _) => Ok(()),
            (false, reason) => Err(CoreError::blocked(
                action,
                reason.unwrap_or_else(|| "still in use".to_string()),
            )),
        }
    }
}

/// Decides whether a product can be deleted.
///
/// ## Blocking conditions (first match wins)
/// 1. any variant holds stock (the reason names the variant)
/// 2. the product's own base stock is nonzero
/// 3. any sale line references the product or its variants
pub fn check_deletion(facts: &DeletionFacts) -> DeletionCheck {
    let blocked = |reason: String| DeletionCheck {
        allowed: false,
        reason: Some(reason),
    };

    if let Some(variant) = facts.variants.iter().find(|v| v.stock_quantity != 0) {
        return blocked(format!(
            "variant '{}' has {} units in stock",
            variant.label, variant.stock_quantity
        ));
    }

    if facts.base_stock != 0 {
        return blocked(format!("product has {} units in stock", facts.base_stock));
    }

    if facts.sale_references > 0 {
        return blocked(format!(
            "product appears in {} sale line(s)",
            facts.sale_references
        ));
    }

    DeletionCheck {
        allowed: true,
        reason: None,
    }
}

/// Decides whether a single variant can be deleted: it must hold no stock
/// and no sale line may reference it.
///
/// ```rust
/// use stoktakip_core::stock::{check_variant_deletion, VariantStock};
///
/// let variant = VariantStock { label: "Siyah - M".into(), stock_quantity: 0, is_active: true };
/// assert!(check_variant_deletion(&variant, 0).allowed);
/// assert_eq!(
///     check_variant_deletion(&variant, 2).reason.as_deref(),
///     Some("variant 'Siyah - M' appears in 2 sale line(s)")
/// );
/// ```
pub fn check_variant_deletion(variant: &VariantStock, sale_references: i64) -> DeletionCheck {
    let reason = if variant.stock_quantity != 0 {
        Some(format!(
            "variant '{}' has {} units in stock",
            variant.label, variant.stock_quantity
        ))
    } else if sale_references > 0 {
        Some(format!(
            "variant '{}' appears in {} sale line(s)",
            variant.label, sale_references
        ))
    } else {
        None
    };

    DeletionCheck {
        allowed: reason.is_none(),
        reason,
    }
}
