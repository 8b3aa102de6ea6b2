//! # Error Types
//!
//! Domain-specific error types for stoktakip-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stoktakip-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stoktakip-db errors (separate crate)                                  │
//! │  └── DbError          - Persistence failures, wraps CoreError          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant renders a message a cashier can act on, e.g.
//! "cannot delete: variant 'Siyah - M' has 3 units in stock".

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An amount is zero or negative where it must be positive, or too
    /// large to be represented.
    #[error("Invalid amount for {field}: {cents} ({reason})")]
    InvalidAmount {
        field: String,
        cents: i64,
        reason: String,
    },

    /// A stock change would drive the quantity below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Stock edit: "Siyah - M" from 3 to -2
    ///      │
    ///      ▼
    /// NegativeStock { item: "Siyah - M", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 units of Siyah - M in stock"
    /// ```
    #[error("Insufficient stock for {item}: available {available}, requested {requested}")]
    NegativeStock {
        item: String,
        available: i64,
        requested: i64,
    },

    /// The collection was already cancelled; cancellation is one-way.
    #[error("Collection {collection_no} is already cancelled")]
    AlreadyCancelled { collection_no: String },

    /// The entity is not in a state that allows the requested transition.
    #[error("{entity} {id} is {current}, cannot {action}")]
    InvalidStatus {
        entity: String,
        id: String,
        current: String,
        action: String,
    },

    /// An operation is blocked by existing stock or history.
    #[error("cannot {action}: {reason}")]
    IntegrityViolation { action: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidAmount error for an amount that must be positive.
    pub fn invalid_amount(field: impl Into<String>, cents: i64) -> Self {
        CoreError::InvalidAmount {
            field: field.into(),
            cents,
            reason: "must be greater than zero".to_string(),
        }
    }

    /// Creates an InvalidAmount error for arithmetic that would overflow.
    pub fn amount_overflow(field: impl Into<String>, cents: i64) -> Self {
        CoreError::InvalidAmount {
            field: field.into(),
            cents,
            reason: "exceeds the largest supported amount".to_string(),
        }
    }

    /// Creates an IntegrityViolation error.
    pub fn blocked(action: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::IntegrityViolation {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised while turning raw form input into typed commands, before any
/// mutation begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, unparsable decimal).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
