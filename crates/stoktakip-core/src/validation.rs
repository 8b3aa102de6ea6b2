//! # Validation Module
//!
//! Input validation utilities for Stoktakip.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web forms (outside this repository)                          │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Typed commands (commands.rs)                                 │
//! │  ├── Raw strings parsed into Money / MarkupRate                        │
//! │  └── THIS MODULE: field rules, before any mutation begins              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints (sku, barcode, collection_no)                  │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stoktakip_core::validation::{validate_code, validate_quantity};
//!
//! validate_code("sku", "URN004512").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_AMOUNT_CENTS, MAX_MARKUP_BPS, MAX_SALE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Checks that a field is present and returns it trimmed.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Checks a length limit (in characters, not bytes).
pub fn validate_max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a SKU or barcode.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only letters, digits, hyphens and underscores
///
/// ## Example
/// ```rust
/// use stoktakip_core::validation::validate_code;
///
/// assert!(validate_code("barcode", "URN004512V0042").is_ok());
/// assert!(validate_code("sku", "").is_err());
/// assert!(validate_code("sku", "has space").is_err());
/// ```
pub fn validate_code(field: &str, code: &str) -> ValidationResult<()> {
    let code = validate_required(field, code)?;
    validate_max_len(field, &code, 50)?;

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, category, brand, person).
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = validate_required(field, name)?;
    validate_max_len(field, &name, 200)
}

/// Validates a phone number.
///
/// Digits, spaces and `+ ( ) -` are accepted; 7 to 15 digits in total.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = validate_required("phone", phone)?;

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '(' | ')' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces and + ( ) -".to_string(),
        });
    }

    let digits = phone.chars().filter(char::is_ascii_digit).count() as i64;
    if !(7..=15).contains(&digits) {
        return Err(ValidationError::OutOfRange {
            field: "phone digits".to_string(),
            min: 7,
            max: 15,
        });
    }

    Ok(())
}

/// Validates an optional e-mail address. Blank counts as absent.
pub fn validate_email(email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(());
    };

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    validate_max_len("email", email, 254)
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns all/default results)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();
    validate_max_len("query", query, 100)?;
    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_SALE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_SALE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_SALE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level or threshold (non-negative).
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a price or cost in cents.
///
/// ## Rules
/// - Between 0 and MAX_AMOUNT_CENTS
/// - Zero is allowed (giveaways, missing cost)
///
/// ## Example
/// ```rust
/// use stoktakip_core::validation::validate_price_cents;
/// use stoktakip_core::MAX_AMOUNT_CENTS;
///
/// assert!(validate_price_cents("cost", 4500).is_ok());
/// assert!(validate_price_cents("cost", 0).is_ok());
/// assert!(validate_price_cents("cost", -100).is_err());
/// assert!(validate_price_cents("cost", MAX_AMOUNT_CENTS + 1).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_AMOUNT_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates an amount that must be strictly positive (payments,
/// collections, ledger movements).
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates a markup rate in basis points.
///
/// ## Rules
/// - Between 0 and MAX_MARKUP_BPS (0% to 1000%)
pub fn validate_markup_bps(bps: u32) -> ValidationResult<()> {
    if bps > MAX_MARKUP_BPS {
        return Err(ValidationError::OutOfRange {
            field: "markup".to_string(),
            min: 0,
            max: MAX_MARKUP_BPS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use stoktakip_core::validation::validate_uuid;
///
/// assert!(validate_uuid("customer_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("customer_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    let id = validate_required(field, id)?;

    uuid::Uuid::parse_str(&id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert!(validate_code("sku", "URN004512").is_ok());
        assert!(validate_code("sku", "KAZAK-01").is_ok());
        assert!(validate_code("barcode", "URN004512V0042").is_ok());

        assert!(validate_code("sku", "").is_err());
        assert!(validate_code("sku", "   ").is_err());
        assert!(validate_code("sku", "has space").is_err());
        assert!(validate_code("sku", &"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Yün Kazak").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
        // 200 multi-byte characters are still 200 characters
        assert!(validate_name("name", &"ş".repeat(200)).is_ok());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("0532 123 45 67").is_ok());
        assert!(validate_phone("+90 (532) 123-4567").is_ok());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("0532-ABC").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email(None).is_ok());
        assert!(validate_email(Some("  ")).is_ok());
        assert!(validate_email(Some("ayse@example.com")).is_ok());
        assert!(validate_email(Some("ayse@")).is_err());
        assert!(validate_email(Some("ayse.example.com")).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_SALE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_SALE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price_cents("cost", 0).is_ok());
        assert!(validate_price_cents("cost", -1).is_err());
        assert!(validate_price_cents("cost", MAX_AMOUNT_CENTS).is_ok());
        assert!(matches!(
            validate_price_cents("cost", 4_000_000_000_000_000_000),
            Err(ValidationError::OutOfRange { max: MAX_AMOUNT_CENTS, .. })
        ));
        assert!(validate_positive_amount("amount", 1).is_ok());
        assert!(validate_positive_amount("amount", MAX_AMOUNT_CENTS).is_ok());
        assert!(matches!(
            validate_positive_amount("amount", 0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_positive_amount("amount", MAX_AMOUNT_CENTS + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_markup_bps() {
        assert!(validate_markup_bps(0).is_ok());
        assert!(validate_markup_bps(5000).is_ok());
        assert!(validate_markup_bps(MAX_MARKUP_BPS).is_ok());
        assert!(validate_markup_bps(MAX_MARKUP_BPS + 1).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }
}
