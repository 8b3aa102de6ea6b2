//! # Ledger Rules
//!
//! Sign conventions, movement commands and the collection state machine of
//! the customer open account (veresiye).
//!
//! ## Balance Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Customer Open Account                                │
//! │                                                                         │
//! │  movements (append-only)                     balance (denormalized)     │
//! │  ┌───────────────────────────────┐                                      │
//! │  │ debt    500.00  sale R-0001   │  +500.00                             │
//! │  │ credit  200.00  THS-...-0001  │  -200.00   ──fold──►   300.00        │
//! │  │ debt    200.00  cancellation  │  +200.00   ──fold──►   500.00        │
//! │  └───────────────────────────────┘                                      │
//! │                                                                         │
//! │  Invariant: balance == Σ signed(movement)                               │
//! │  Only `post_movement` (stoktakip-db) writes either side.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Collection Lifecycle
//! ```text
//!   cash / card / wire ──► collected ──cancel──► cancelled
//!                              ▲                    ▲
//!   check / note ──► pending ──┴──settle            │
//!                       └──────────cancel───────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Collection, CollectionStatus, CollectionType, MovementKind};
use crate::MAX_AMOUNT_CENTS;
use crate::validation::{validate_max_len, validate_required, validate_uuid, ValidationResult};

/// Prefix of generated collection numbers.
pub const COLLECTION_NO_PREFIX: &str = "THS";

// =============================================================================
// Sign Rules
// =============================================================================

/// Signed effect of a movement: debt raises the balance, credit lowers it.
#[inline]
pub fn signed(kind: MovementKind, amount: Money) -> Money {
    match kind {
        MovementKind::Debt => amount,
        MovementKind::Credit => -amount,
    }
}

/// Folds movements into a balance.
///
/// ```rust
/// use stoktakip_core::ledger::fold_balance;
/// use stoktakip_core::money::Money;
/// use stoktakip_core::types::MovementKind;
///
/// let balance = fold_balance([
///     (MovementKind::Debt, Money::from_cents(50000)),
///     (MovementKind::Credit, Money::from_cents(20000)),
/// ]);
/// assert_eq!(balance.cents(), 30000);
/// ```
pub fn fold_balance<I>(movements: I) -> Money
where
    I: IntoIterator<Item = (MovementKind, Money)>,
{
    movements
        .into_iter()
        .map(|(kind, amount)| signed(kind, amount))
        .sum()
}

fn check_amount(cents: i64) -> CoreResult<()> {
    if cents <= 0 {
        return Err(CoreError::invalid_amount("amount", cents));
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(CoreError::amount_overflow("amount", cents));
    }
    Ok(())
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// A validated request to append one movement to a customer's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    pub customer_id: String,
    pub kind: MovementKind,
    pub amount: Money,
    pub description: String,
    pub sale_id: Option<String>,
    pub collection_id: Option<String>,
    pub user_id: String,
}

impl LedgerEntry {
    /// A debt entry (customer owes more).
    pub fn debt(
        customer_id: impl Into<String>,
        amount: Money,
        description: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        LedgerEntry {
            customer_id: customer_id.into(),
            kind: MovementKind::Debt,
            amount,
            description: description.into(),
            sale_id: None,
            collection_id: None,
            user_id: user_id.into(),
        }
    }

    /// A credit entry (customer owes less).
    pub fn credit(
        customer_id: impl Into<String>,
        amount: Money,
        description: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        LedgerEntry {
            kind: MovementKind::Credit,
            ..LedgerEntry::debt(customer_id, amount, description, user_id)
        }
    }

    /// Links the entry to the sale that caused it.
    pub fn for_sale(mut self, sale_id: impl Into<String>) -> Self {
        self.sale_id = Some(sale_id.into());
        self
    }

    /// Links the entry to the collection that caused it.
    pub fn for_collection(mut self, collection_id: impl Into<String>) -> Self {
        self.collection_id = Some(collection_id.into());
        self
    }

    /// Checks the entry before anything is written.
    ///
    /// ## Errors
    /// - `InvalidAmount` when the amount is zero or negative, or above
    ///   `MAX_AMOUNT_CENTS`
    /// - `Validation` when the description or acting user is missing
    pub fn validate(&self) -> CoreResult<()> {
        check_amount(self.amount.cents())?;
        validate_required("description", &self.description)?;
        validate_max_len("description", &self.description, 500)?;
        validate_required("user_id", &self.user_id)?;
        Ok(())
    }

    /// Signed effect on the balance.
    pub fn signed_amount(&self) -> Money {
        signed(self.kind, self.amount)
    }
}

/// Stored balance compared with the fold of the movement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BalanceCheck {
    pub stored: Money,
    pub computed: Money,
}

impl BalanceCheck {
    /// True when the denormalized balance matches the log.
    pub fn is_consistent(&self) -> bool {
        self.stored == self.computed
    }

    /// Stored minus computed.
    pub fn drift(&self) -> Money {
        self.stored - self.computed
    }
}

/// Movement descriptions written by the ledger itself.
pub fn collection_description(collection_no: &str) -> String {
    format!("collection: {}", collection_no)
}

/// Description of the debt that reverses a cancelled collection.
pub fn cancellation_description(collection_no: &str) -> String {
    format!("cancellation: {}", collection_no)
}

// =============================================================================
// Collection Requests
// =============================================================================

/// A collection as entered on the collection form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CollectionRequest {
    pub customer_id: String,
    pub amount_cents: i64,
    pub collection_type: CollectionType,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub instrument_no: Option<String>,
    pub bank: Option<String>,
    pub reference_no: Option<String>,
    pub description: Option<String>,
    pub created_by: String,
}

impl CollectionRequest {
    /// Returns the requested amount.
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Validates the request.
    ///
    /// ## Rules
    /// - 0 < amount <= MAX_AMOUNT_CENTS
    /// - check and promissory note need due date, instrument number and bank
    pub fn validate(&self) -> CoreResult<()> {
        validate_uuid("customer_id", &self.customer_id)?;
        check_amount(self.amount_cents)?;
        validate_required("created_by", &self.created_by)?;

        if self.collection_type.is_deferred() {
            if self.due_date.is_none() {
                return Err(ValidationError::Required {
                    field: "due_date".to_string(),
                }
                .into());
            }
            require_text("instrument_no", self.instrument_no.as_deref())?;
            require_text("bank", self.bank.as_deref())?;
        }

        for (field, value) in [
            ("instrument_no", &self.instrument_no),
            ("bank", &self.bank),
            ("reference_no", &self.reference_no),
        ] {
            if let Some(value) = value {
                validate_max_len(field, value, 100)?;
            }
        }
        if let Some(description) = &self.description {
            validate_max_len("description", description, 500)?;
        }

        Ok(())
    }
}

fn require_text(field: &str, value: Option<&str>) -> ValidationResult<String> {
    validate_required(field, value.unwrap_or_default())
}

/// Status a new collection starts in.
///
/// Deferred instruments (check, promissory note) wait for settlement; the
/// others are collected on the spot.
pub fn initial_status(collection_type: CollectionType) -> CollectionStatus {
    if collection_type.is_deferred() {
        CollectionStatus::Pending
    } else {
        CollectionStatus::Collected
    }
}

/// Amount by which a collection exceeds the current balance, if any.
///
/// Overpayment is allowed (the customer ends up with credit) but reported.
pub fn overpayment(balance: Money, amount: Money) -> Option<Money> {
    if amount > balance {
        Some(amount - balance.max(Money::zero()))
    } else {
        None
    }
}

/// Formats a collection number: `THS-YYYYMMDD-NNNN`.
///
/// `sequence` is the 1-based count of collections issued that day.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use stoktakip_core::ledger::format_collection_no;
///
/// let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
/// assert_eq!(format_collection_no(at, 3), "THS-20261019-0003");
/// ```
pub fn format_collection_no(at: DateTime<Utc>, sequence: u32) -> String {
    format!(
        "{}-{}-{:04}",
        COLLECTION_NO_PREFIX,
        at.format("%Y%m%d"),
        sequence
    )
}

// =============================================================================
// Collection Transitions
// =============================================================================

/// What cancelling a collection does to the customer's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelEffect {
    /// The collection was credited; post a debt of the same amount.
    ReverseCredit(Money),
    /// The collection never touched the balance.
    NoBalanceEffect,
}

/// Checks that a collection can be settled (`pending -> collected`).
pub fn ensure_can_settle(collection: &Collection) -> CoreResult<()> {
    match collection.status {
        CollectionStatus::Pending => Ok(()),
        CollectionStatus::Cancelled => Err(CoreError::AlreadyCancelled {
            collection_no: collection.collection_no.clone(),
        }),
        current => Err(CoreError::InvalidStatus {
            entity: "Collection".to_string(),
            id: collection.collection_no.clone(),
            current: current.as_str().to_string(),
            action: "settle".to_string(),
        }),
    }
}

/// Checks that a collection can be cancelled and says what to reverse.
pub fn ensure_can_cancel(collection: &Collection) -> CoreResult<CancelEffect> {
    match collection.status {
        CollectionStatus::Cancelled => Err(CoreError::AlreadyCancelled {
            collection_no: collection.collection_no.clone(),
        }),
        CollectionStatus::Collected => Ok(CancelEffect::ReverseCredit(collection.amount())),
        CollectionStatus::Pending => Ok(CancelEffect::NoBalanceEffect),
    }
}

// =============================================================================
// Debt Positions
// =============================================================================

/// A completed sale still carried on a customer's open account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DebtPosition {
    pub sale_id: String,
    pub receipt_number: String,
    pub total_cents: i64,
    /// Portion of the sale paid with the open-account method.
    pub open_account_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}
