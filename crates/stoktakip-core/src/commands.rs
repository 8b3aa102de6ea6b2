//! # Commands
//!
//! Typed inputs for every mutation. Each command validates itself before
//! the database layer opens a transaction, so a rejected request never
//! leaves a partial write behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{AttributeKind, Gender, PaymentMethod, ProductUnit};
use crate::validation::{
    validate_code, validate_email, validate_markup_bps, validate_max_len, validate_name,
    validate_phone, validate_positive_amount, validate_price_cents, validate_quantity,
    validate_required, validate_stock_level, validate_uuid, ValidationResult,
};

// =============================================================================
// Customers & Catalog
// =============================================================================

/// Fields of a customer, used for both create and update.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInput {
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl CustomerInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("first_name", &self.first_name)?;
        validate_name("last_name", &self.last_name)?;
        if let Some(company) = &self.company_name {
            validate_max_len("company_name", company, 200)?;
        }
        validate_phone(&self.phone)?;
        validate_email(self.email.as_deref())?;
        if let Some(address) = &self.address {
            validate_max_len("address", address, 1000)?;
        }
        Ok(())
    }
}

/// Name and description of a category or brand.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NamedInput {
    pub name: String,
    pub description: Option<String>,
}

impl NamedInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        if let Some(description) = &self.description {
            validate_max_len("description", description, 1000)?;
        }
        Ok(())
    }
}

/// A new variant attribute value.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AttributeInput {
    pub kind: AttributeKind,
    pub value: String,
    pub sort_order: i64,
}

impl AttributeInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("value", &self.value)?;
        validate_max_len("value", self.value.trim(), 50)
    }
}

// =============================================================================
// Products & Variants
// =============================================================================

/// A new product. The sell price is derived, never supplied.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    /// Blank or absent: a `URN` SKU is generated.
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub brand_id: Option<String>,
    pub unit: ProductUnit,
    pub gender: Gender,
    pub cost_cents: i64,
    pub markup_bps: u32,
    pub has_variants: bool,
    /// Opening stock of a non-variant product; recorded as an IN movement.
    pub base_stock: i64,
    pub critical_stock: i64,
    pub track_stock: bool,
    pub created_by: String,
}

impl NewProduct {
    /// The supplied SKU, if it is not blank.
    pub fn explicit_sku(&self) -> Option<&str> {
        self.sku.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn validate(&self) -> CoreResult<()> {
        if let Some(sku) = self.explicit_sku() {
            validate_code("sku", sku)?;
        }
        validate_name("name", &self.name)?;
        validate_uuid("category_id", &self.category_id)?;
        if let Some(brand_id) = &self.brand_id {
            validate_uuid("brand_id", brand_id)?;
        }
        validate_price_cents("cost", self.cost_cents)?;
        validate_markup_bps(self.markup_bps)?;
        validate_stock_level("base_stock", self.base_stock)?;
        validate_stock_level("critical_stock", self.critical_stock)?;
        validate_required("created_by", &self.created_by)?;
        if self.has_variants && self.base_stock != 0 {
            return Err(CoreError::Validation(ValidationError::InvalidFormat {
                field: "base_stock".to_string(),
                reason: "variant products keep stock on their variants".to_string(),
            }));
        }
        Ok(())
    }
}

/// Editable product fields. Stock goes through the stock engine instead.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub brand_id: Option<String>,
    pub unit: ProductUnit,
    pub gender: Gender,
    pub cost_cents: i64,
    pub markup_bps: u32,
    pub critical_stock: i64,
    pub track_stock: bool,
    pub is_active: bool,
}

impl ProductUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        validate_uuid("category_id", &self.category_id)?;
        if let Some(brand_id) = &self.brand_id {
            validate_uuid("brand_id", brand_id)?;
        }
        validate_price_cents("cost", self.cost_cents)?;
        validate_markup_bps(self.markup_bps)?;
        validate_stock_level("critical_stock", self.critical_stock)
    }
}

/// A new variant of a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewVariant {
    /// Blank or absent: `<SKU>V` + 4 digits is generated.
    pub barcode: Option<String>,
    pub color_id: Option<String>,
    pub size_id: Option<String>,
    pub other_id: Option<String>,
    /// Absent: inherited from the product.
    pub cost_cents: Option<i64>,
    /// Absent: inherited from the product.
    pub markup_bps: Option<u32>,
    /// Opening stock; recorded as an IN movement.
    pub initial_stock: i64,
    pub note: Option<String>,
}

impl NewVariant {
    /// The supplied barcode, if it is not blank.
    pub fn explicit_barcode(&self) -> Option<&str> {
        self.barcode.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(barcode) = self.explicit_barcode() {
            validate_code("barcode", barcode)?;
        }
        for (field, id) in [
            ("color_id", &self.color_id),
            ("size_id", &self.size_id),
            ("other_id", &self.other_id),
        ] {
            if let Some(id) = id {
                validate_uuid(field, id)?;
            }
        }
        if let Some(cost) = self.cost_cents {
            validate_price_cents("cost", cost)?;
        }
        if let Some(markup) = self.markup_bps {
            validate_markup_bps(markup)?;
        }
        validate_stock_level("initial_stock", self.initial_stock)?;
        if let Some(note) = &self.note {
            validate_max_len("note", note, 500)?;
        }
        Ok(())
    }
}

/// Editable variant fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantUpdate {
    pub cost_cents: i64,
    pub markup_bps: u32,
    pub note: Option<String>,
    pub is_active: bool,
}

impl VariantUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_price_cents("cost", self.cost_cents)?;
        validate_markup_bps(self.markup_bps)?;
        if let Some(note) = &self.note {
            validate_max_len("note", note, 500)?;
        }
        Ok(())
    }
}

// =============================================================================
// Sales
// =============================================================================

/// One line of a new sale. Price and cost come from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSaleItem {
    pub product_id: String,
    /// Required when the product has variants.
    pub variant_id: Option<String>,
    pub quantity: i64,
}

/// One tender of a new sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<String>,
}

/// A sale as submitted by the sale screen.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub customer_id: Option<String>,
    pub items: Vec<NewSaleItem>,
    pub payments: Vec<NewPayment>,
    pub discount_cents: i64,
    pub user_id: String,
    pub notes: Option<String>,
}

impl NewSale {
    /// Validates the shape of the sale. Totals are checked once prices are
    /// known, see [`SaleTotals::check_payments`].
    pub fn validate(&self) -> CoreResult<()> {
        validate_required("user_id", &self.user_id)?;
        if self.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }
        for item in &self.items {
            validate_uuid("product_id", &item.product_id)?;
            if let Some(variant_id) = &item.variant_id {
                validate_uuid("variant_id", variant_id)?;
            }
            validate_quantity(item.quantity)?;
        }
        if self.payments.is_empty() {
            return Err(ValidationError::Required {
                field: "payments".to_string(),
            }
            .into());
        }
        for payment in &self.payments {
            validate_positive_amount("payment amount", payment.amount_cents)?;
        }
        validate_price_cents("discount", self.discount_cents)?;

        let open_account = self
            .payments
            .iter()
            .any(|p| p.method == PaymentMethod::OpenAccount);
        if open_account && self.customer_id.is_none() {
            return Err(ValidationError::Required {
                field: "customer_id".to_string(),
            }
            .into());
        }
        if let Some(customer_id) = &self.customer_id {
            validate_uuid("customer_id", customer_id)?;
        }
        Ok(())
    }

    /// Sum of the open-account tenders.
    pub fn open_account_amount(&self) -> CoreResult<Money> {
        Money::checked_sum(
            self.payments
                .iter()
                .filter(|p| p.method == PaymentMethod::OpenAccount)
                .map(|p| Money::from_cents(p.amount_cents)),
        )
        .ok_or_else(|| CoreError::amount_overflow("open account amount", i64::MAX))
    }
}

/// Totals of a priced sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

impl SaleTotals {
    /// Computes totals from priced line totals.
    ///
    /// ## Errors
    /// `InvalidAmount` when the subtotal overflows or the discount exceeds
    /// the subtotal.
    pub fn compute<I>(line_totals: I, discount: Money) -> CoreResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        let subtotal = Money::checked_sum(line_totals)
            .ok_or_else(|| CoreError::amount_overflow("subtotal", i64::MAX))?;
        if discount > subtotal {
            return Err(CoreError::InvalidAmount {
                field: "discount".to_string(),
                cents: discount.cents(),
                reason: format!("exceeds the subtotal {}", subtotal),
            });
        }
        Ok(SaleTotals {
            subtotal,
            discount,
            total: subtotal - discount,
        })
    }

    /// Checks that the tenders pay the total exactly.
    pub fn check_payments(&self, payments: &[NewPayment]) -> CoreResult<()> {
        let paid = Money::checked_sum(payments.iter().map(|p| Money::from_cents(p.amount_cents)))
            .ok_or_else(|| CoreError::amount_overflow("payments", i64::MAX))?;
        if paid != self.total {
            return Err(CoreError::blocked(
                "record sale",
                format!("payments total {} but the sale total is {}", paid, self.total),
            ));
        }
        Ok(())
    }
}

/// Prefix of sale receipt numbers.
pub const RECEIPT_PREFIX: &str = "S";

/// Formats a receipt number: `S-YYYYMMDD-NNNN`.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use stoktakip_core::commands::format_receipt_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 10, 19, 14, 5, 0).unwrap();
/// assert_eq!(format_receipt_number(at, 12), "S-20261019-0012");
/// ```
pub fn format_receipt_number(at: DateTime<Utc>, sequence: u32) -> String {
    format!("{}-{}-{:04}", RECEIPT_PREFIX, at.format("%Y%m%d"), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_AMOUNT_CENTS;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn sale(payments: Vec<NewPayment>, customer: Option<&str>) -> NewSale {
        NewSale {
            customer_id: customer.map(str::to_string),
            items: vec![NewSaleItem {
                product_id: ID.to_string(),
                variant_id: None,
                quantity: 2,
            }],
            payments,
            discount_cents: 0,
            user_id: "kasiyer".to_string(),
            notes: None,
        }
    }

    fn pay(method: PaymentMethod, cents: i64) -> NewPayment {
        NewPayment {
            method,
            amount_cents: cents,
            reference: None,
        }
    }

    #[test]
    fn test_customer_input() {
        let mut input = CustomerInput {
            first_name: "Ayşe".to_string(),
            last_name: "Yılmaz".to_string(),
            company_name: None,
            phone: "0532 123 45 67".to_string(),
            email: Some("ayse@example.com".to_string()),
            address: None,
        };
        assert!(input.validate().is_ok());
        input.last_name = " ".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_new_product_sku_blank_means_generated() {
        let product = NewProduct {
            sku: Some("  ".to_string()),
            name: "Yün Kazak".to_string(),
            description: None,
            category_id: ID.to_string(),
            brand_id: None,
            unit: ProductUnit::Piece,
            gender: Gender::Women,
            cost_cents: 4500,
            markup_bps: 5000,
            has_variants: true,
            base_stock: 0,
            critical_stock: 5,
            track_stock: true,
            created_by: "admin".to_string(),
        };
        assert_eq!(product.explicit_sku(), None);
        assert!(product.validate().is_ok());

        let with_stock = NewProduct {
            base_stock: 3,
            ..product
        };
        assert!(with_stock.validate().is_err());
    }

    #[test]
    fn test_open_account_requires_customer() {
        let no_customer = sale(vec![pay(PaymentMethod::OpenAccount, 1000)], None);
        assert!(matches!(
            no_customer.validate(),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));

        let with_customer = sale(
            vec![pay(PaymentMethod::Cash, 400), pay(PaymentMethod::OpenAccount, 600)],
            Some(ID),
        );
        assert!(with_customer.validate().is_ok());
        assert_eq!(with_customer.open_account_amount().unwrap().cents(), 600);
    }

    #[test]
    fn test_sale_rejects_bad_lines() {
        let mut bad = sale(vec![pay(PaymentMethod::Cash, 100)], None);
        bad.items[0].quantity = 0;
        assert!(bad.validate().is_err());

        let mut empty = sale(vec![pay(PaymentMethod::Cash, 100)], None);
        empty.items.clear();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_totals_and_payment_check() {
        let totals = SaleTotals::compute(
            [Money::from_cents(13500), Money::from_cents(6750)],
            Money::from_cents(250),
        )
        .unwrap();
        assert_eq!(totals.subtotal.cents(), 20250);
        assert_eq!(totals.total.cents(), 20000);

        assert!(totals
            .check_payments(&[pay(PaymentMethod::Cash, 5000), pay(PaymentMethod::Card, 15000)])
            .is_ok());
        assert!(matches!(
            totals.check_payments(&[pay(PaymentMethod::Cash, 5000)]),
            Err(CoreError::IntegrityViolation { .. })
        ));

        assert!(SaleTotals::compute([Money::from_cents(100)], Money::from_cents(101)).is_err());
    }

    #[test]
    fn test_totals_reject_overflowing_subtotal() {
        let huge = Money::from_cents(4_000_000_000_000_000_000);
        let err = SaleTotals::compute([huge, huge, huge], Money::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidAmount { ref field, .. } if field == "subtotal"
        ));
    }

    #[test]
    fn test_sale_rejects_amounts_over_the_cap() {
        let mut too_large = sale(vec![pay(PaymentMethod::Cash, MAX_AMOUNT_CENTS + 1)], None);
        assert!(matches!(
            too_large.validate(),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        too_large.payments = vec![pay(PaymentMethod::Cash, 100)];
        too_large.discount_cents = MAX_AMOUNT_CENTS + 1;
        assert!(too_large.validate().is_err());
    }
}
