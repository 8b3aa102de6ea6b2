//! # Pricing
//!
//! Sell price derivation and generated identifiers.
//!
//! ## Price Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sell_price = round2( cost × (1 + markup / 100) )                       │
//! │                                                                         │
//! │  cost 45.00, markup 50.00%  ──►  67.50                                  │
//! │  cost 45.00, markup 20.00%  ──►  54.00                                  │
//! │  cost 45.00, markup  0.00%  ──►  45.00                                  │
//! │                                                                         │
//! │  Rounding: 2 fractional digits, midpoint away from zero                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The price is never entered by hand. Every save of a product or variant
//! runs [`apply_pricing`], so the stored price can never drift from its cost
//! and markup.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{parse_decimal, Money};
use crate::types::{MarkupRate, Product, ProductVariant};
use crate::MAX_AMOUNT_CENTS;

/// Prefix of generated SKUs.
pub const SKU_PREFIX: &str = "URN";

// =============================================================================
// Price Computation
// =============================================================================

/// Computes the sell price, or `None` if the result overflows.
pub fn try_compute_sell_price(cost: Money, markup: MarkupRate) -> Option<Money> {
    let factor = Decimal::ONE + markup.percent() / Decimal::ONE_HUNDRED;
    let price = cost.to_decimal().checked_mul(factor)?;
    Money::from_decimal(price)
}

/// Computes the sell price from cost and markup.
///
/// Falls back to the cost itself if the multiplication overflows; use
/// [`derive_sell_price`] when the caller needs to know a fallback happened.
///
/// ```rust
/// use stoktakip_core::money::Money;
/// use stoktakip_core::pricing::compute_sell_price;
/// use stoktakip_core::types::MarkupRate;
///
/// let price = compute_sell_price(Money::from_cents(10000), MarkupRate::from_bps(5000));
/// assert_eq!(price.cents(), 15000);
/// ```
pub fn compute_sell_price(cost: Money, markup: MarkupRate) -> Money {
    try_compute_sell_price(cost, markup).unwrap_or(cost)
}

// =============================================================================
// Price Derivation
// =============================================================================

/// Why a derivation fell back instead of applying the markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum DegradedReason {
    /// Cost could not be parsed; cost and price are both zero.
    InvalidCost(String),
    /// Markup could not be parsed; price equals cost.
    InvalidMarkup(String),
    /// The markup multiplication overflowed; price equals cost.
    Overflow,
}

impl std::fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradedReason::InvalidCost(detail) => write!(f, "invalid cost: {}", detail),
            DegradedReason::InvalidMarkup(detail) => write!(f, "invalid markup: {}", detail),
            DegradedReason::Overflow => write!(f, "sell price overflow"),
        }
    }
}

/// Outcome of deriving a sell price from form input.
///
/// A degraded derivation still satisfies `price = cost × (1 + markup)`:
/// the unusable input is replaced by zero, so the stored row stays
/// consistent and the fallback is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceDerivation {
    pub cost: Money,
    pub markup: MarkupRate,
    pub sell_price: Money,
    pub degraded: Option<DegradedReason>,
}

impl PriceDerivation {
    /// Derivation from already typed values.
    pub fn from_typed(cost: Money, markup: MarkupRate) -> Self {
        match try_compute_sell_price(cost, markup) {
            Some(sell_price) => PriceDerivation {
                cost,
                markup,
                sell_price,
                degraded: None,
            },
            None => PriceDerivation {
                cost,
                markup: MarkupRate::zero(),
                sell_price: cost,
                degraded: Some(DegradedReason::Overflow),
            },
        }
    }

    /// True when the markup was applied as entered.
    pub fn is_exact(&self) -> bool {
        self.degraded.is_none()
    }
}

/// Derives a sell price from raw form strings ("45,00", "50").
///
/// ## Fallbacks
/// ```text
/// cost ok,  markup ok   ──► exact
/// cost ok,  markup bad  ──► markup 0, price = cost
/// cost bad, markup any  ──► cost 0, markup 0, price 0
/// ```
pub fn derive_sell_price(raw_cost: &str, raw_markup: &str) -> PriceDerivation {
    let cost = match Money::parse("cost", raw_cost) {
        Ok(cost) if cost.is_negative() => {
            return degraded_to_zero(DegradedReason::InvalidCost(format!(
                "{} is negative",
                cost
            )))
        }
        Ok(cost) if cost.cents() > MAX_AMOUNT_CENTS => {
            return degraded_to_zero(DegradedReason::InvalidCost(format!(
                "{} exceeds the largest supported amount",
                cost
            )))
        }
        Ok(cost) => cost,
        Err(err) => return degraded_to_zero(DegradedReason::InvalidCost(err.to_string())),
    };

    let markup = parse_decimal("markup", raw_markup)
        .map_err(|err| err.to_string())
        .and_then(|percent| {
            MarkupRate::from_percent(percent)
                .filter(|m| m.bps() <= crate::MAX_MARKUP_BPS)
                .ok_or_else(|| format!("{}% is out of range", percent))
        });

    match markup {
        Ok(markup) => PriceDerivation::from_typed(cost, markup),
        Err(detail) => PriceDerivation {
            cost,
            markup: MarkupRate::zero(),
            sell_price: cost,
            degraded: Some(DegradedReason::InvalidMarkup(detail)),
        },
    }
}

fn degraded_to_zero(reason: DegradedReason) -> PriceDerivation {
    PriceDerivation {
        cost: Money::zero(),
        markup: MarkupRate::zero(),
        sell_price: Money::zero(),
        degraded: Some(reason),
    }
}

// =============================================================================
// Priced Rows
// =============================================================================

/// A row whose sell price is derived from its own cost and markup.
pub trait Priced {
    fn cost(&self) -> Money;
    fn markup(&self) -> MarkupRate;
    /// Stores the derivation on the row (cost, markup and price together).
    fn set_pricing(&mut self, derivation: &PriceDerivation);
}

impl Priced for Product {
    fn cost(&self) -> Money {
        Product::cost(self)
    }

    fn markup(&self) -> MarkupRate {
        Product::markup(self)
    }

    fn set_pricing(&mut self, derivation: &PriceDerivation) {
        self.cost_cents = derivation.cost.cents();
        self.markup_bps = derivation.markup.bps();
        self.sell_price_cents = derivation.sell_price.cents();
    }
}

impl Priced for ProductVariant {
    fn cost(&self) -> Money {
        ProductVariant::cost(self)
    }

    fn markup(&self) -> MarkupRate {
        ProductVariant::markup(self)
    }

    fn set_pricing(&mut self, derivation: &PriceDerivation) {
        self.cost_cents = derivation.cost.cents();
        self.markup_bps = derivation.markup.bps();
        self.sell_price_cents = derivation.sell_price.cents();
    }
}

/// Recomputes the sell price of a product or variant before it is saved.
pub fn apply_pricing<P: Priced>(row: &mut P) -> PriceDerivation {
    let derivation = PriceDerivation::from_typed(row.cost(), row.markup());
    row.set_pricing(&derivation);
    derivation
}

// =============================================================================
// Generated Identifiers
// =============================================================================

/// Generates a SKU candidate: `URN` + 6 random digits.
///
/// Candidates may collide; the caller retries on a unique violation.
pub fn generate_sku<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}{:06}", SKU_PREFIX, rng.gen_range(0..1_000_000u32))
}

/// Generates a variant barcode candidate: `<SKU>V` + 4 random digits.
pub fn generate_barcode<R: Rng + ?Sized>(sku: &str, rng: &mut R) -> String {
    format!("{}V{:04}", sku, rng.gen_range(0..10_000u32))
}

/// Display label of a variant from its attribute values.
///
/// ```rust
/// use stoktakip_core::pricing::variant_label;
///
/// assert_eq!(variant_label(Some("Siyah"), Some("M"), None), "Siyah - M");
/// assert_eq!(variant_label(None, None, None), "Standart");
/// ```
pub fn variant_label(color: Option<&str>, size: Option<&str>, other: Option<&str>) -> String {
    let parts: Vec<&str> = [color, size, other]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        "Standart".to_string()
    } else {
        parts.join(" - ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn price(cost: i64, bps: u32) -> i64 {
        compute_sell_price(Money::from_cents(cost), MarkupRate::from_bps(bps)).cents()
    }

    #[test]
    fn test_compute_sell_price() {
        assert_eq!(price(10000, 5000), 15000);
        assert_eq!(price(4500, 5000), 6750);
        assert_eq!(price(4500, 2000), 5400);
    }

    #[test]
    fn test_zero_markup_and_zero_cost() {
        assert_eq!(price(4500, 0), 4500);
        assert_eq!(price(0, 5000), 0);
    }

    #[test]
    fn test_rounds_midpoint_away_from_zero() {
        // 0.33 × 1.15 = 0.3795 -> 0.38
        assert_eq!(price(33, 1500), 38);
        // 0.05 × 1.50 = 0.075 -> 0.08
        assert_eq!(price(5, 5000), 8);
        // 0.01 × 1.125 = 0.01125 -> 0.01
        assert_eq!(price(1, 1250), 1);
    }

    #[test]
    fn test_overflow_falls_back_to_cost() {
        let cost = Money::from_cents(i64::MAX);
        let derivation = PriceDerivation::from_typed(cost, MarkupRate::from_bps(5000));
        assert_eq!(derivation.sell_price, cost);
        assert_eq!(derivation.degraded, Some(DegradedReason::Overflow));
    }

    #[test]
    fn test_derive_exact() {
        let d = derive_sell_price("45.00", "50");
        assert!(d.is_exact());
        assert_eq!(d.sell_price.cents(), 6750);

        let d = derive_sell_price("45,00", "20,00");
        assert!(d.is_exact());
        assert_eq!(d.sell_price.cents(), 5400);
    }

    #[test]
    fn test_derive_bad_markup_prices_at_cost() {
        let d = derive_sell_price("45.00", "elli");
        assert_eq!(d.sell_price.cents(), 4500);
        assert_eq!(d.markup, MarkupRate::zero());
        assert!(matches!(d.degraded, Some(DegradedReason::InvalidMarkup(_))));

        let d = derive_sell_price("45.00", "-10");
        assert_eq!(d.sell_price.cents(), 4500);
        assert!(!d.is_exact());
    }

    #[test]
    fn test_derive_bad_cost_prices_at_zero() {
        let d = derive_sell_price("", "50");
        assert_eq!(d.sell_price, Money::zero());
        assert_eq!(d.cost, Money::zero());
        assert!(matches!(d.degraded, Some(DegradedReason::InvalidCost(_))));

        let d = derive_sell_price("-5", "50");
        assert_eq!(d.sell_price, Money::zero());

        let d = derive_sell_price("100000000", "50");
        assert_eq!(d.sell_price, Money::zero());
        assert!(matches!(d.degraded, Some(DegradedReason::InvalidCost(_))));
        assert!(derive_sell_price("99999999,99", "0").is_exact());
    }

    #[test]
    fn test_derive_is_deterministic() {
        assert_eq!(derive_sell_price("x", "y"), derive_sell_price("x", "y"));
    }

    #[test]
    fn test_generated_identifiers() {
        let mut rng = StdRng::seed_from_u64(7);
        let sku = generate_sku(&mut rng);
        assert_eq!(sku.len(), 9);
        assert!(sku.starts_with("URN"));
        assert!(sku[3..].chars().all(|c| c.is_ascii_digit()));

        let barcode = generate_barcode(&sku, &mut rng);
        assert_eq!(barcode.len(), sku.len() + 5);
        assert!(barcode.starts_with(&format!("{}V", sku)));
    }

    #[test]
    fn test_variant_label() {
        assert_eq!(variant_label(Some("Siyah"), Some("M"), None), "Siyah - M");
        assert_eq!(variant_label(None, Some("XL"), Some("Uzun Kol")), "XL - Uzun Kol");
        assert_eq!(variant_label(Some(" "), None, None), "Standart");
    }
}
