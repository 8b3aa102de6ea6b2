//! # Ledger Repository
//!
//! The open-account engine: debt and credit movements, collections and
//! their lifecycle, all against the customer's running balance.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  issue_collection(cash 200.00)                                         │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │   ├── UPDATE customers SET updated_at      ← locks, NotFound if absent  │
//! │   ├── SELECT balance                       ← overpayment warning        │
//! │   ├── INSERT collections (THS-...-NNNN)    ← retried on collision       │
//! │   └── post_movement(credit 200.00)                                      │
//! │         ├── UPDATE customers SET balance_cents = balance_cents - 20000 │
//! │         └── INSERT ledger_movements                                     │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `post_movement` is the only code that touches `balance_cents`, and it
//! always writes the movement row in the same transaction.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::{DbError, DbResult};
use crate::repository::{count_with_prefix, like_pattern, new_id, DateRange};
use stoktakip_core::ledger::{
    cancellation_description, collection_description, ensure_can_cancel, ensure_can_settle,
    format_collection_no, initial_status, overpayment, BalanceCheck, CancelEffect,
    CollectionRequest, DebtPosition, LedgerEntry, COLLECTION_NO_PREFIX,
};
use stoktakip_core::validation::validate_search_query;
use stoktakip_core::{
    Collection, CollectionStatus, CoreError, LedgerMovement, Money, MovementKind,
    MAX_IDENTIFIER_ATTEMPTS,
};

// =============================================================================
// Results & Filters
// =============================================================================

/// Outcome of issuing a collection.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct CollectionReceipt {
    pub collection: Collection,
    /// The credit movement; absent while a check or note is pending.
    pub movement: Option<LedgerMovement>,
    /// Set when the amount exceeded the balance at the time of issue.
    pub overpayment: Option<Money>,
}

/// Filters for listing collections. Every field is optional.
#[derive(Debug, Clone)]
pub struct CollectionFilter {
    pub customer_id: Option<String>,
    pub status: Option<CollectionStatus>,
    pub range: DateRange,
    /// Matches collection number, instrument number, customer name or phone.
    pub search: String,
    pub limit: u32,
}

impl Default for CollectionFilter {
    fn default() -> Self {
        CollectionFilter {
            customer_id: None,
            status: None,
            range: DateRange::all(),
            search: String::new(),
            limit: 100,
        }
    }
}

// =============================================================================
// Movement Posting
// =============================================================================

/// Appends a movement and applies it to the customer's balance.
///
/// Must run inside the caller's transaction. This is the only writer of
/// `customers.balance_cents`.
pub(crate) async fn post_movement(
    conn: &mut SqliteConnection,
    entry: &LedgerEntry,
) -> DbResult<LedgerMovement> {
    entry.validate()?;
    let now = Utc::now();

    // SQLite turns an overflowing integer sum into a REAL, so only balances
    // that stay inside i64 after the delta are updated.
    let delta = entry.signed_amount().cents();
    let (low, high) = if delta < 0 {
        (i64::MIN - delta, i64::MAX)
    } else {
        (i64::MIN, i64::MAX - delta)
    };

    let result = sqlx::query(
        r#"
        UPDATE customers SET balance_cents = balance_cents + ?2, updated_at = ?3
        WHERE id = ?1 AND balance_cents BETWEEN ?4 AND ?5
        "#,
    )
    .bind(&entry.customer_id)
    .bind(delta)
    .bind(now)
    .bind(low)
    .bind(high)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance_cents FROM customers WHERE id = ?1")
                .bind(&entry.customer_id)
                .fetch_optional(&mut *conn)
                .await?;
        return Err(match balance {
            Some(balance) => {
                warn!(customer_id = %entry.customer_id, balance, delta, "Balance would overflow");
                CoreError::amount_overflow("balance", balance).into()
            }
            None => DbError::not_found("Customer", &entry.customer_id),
        });
    }

    let movement = LedgerMovement {
        id: new_id(),
        customer_id: entry.customer_id.clone(),
        kind: entry.kind,
        amount_cents: entry.amount.cents(),
        description: entry.description.trim().to_string(),
        sale_id: entry.sale_id.clone(),
        collection_id: entry.collection_id.clone(),
        user_id: entry.user_id.clone(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO ledger_movements (
            id, customer_id, kind, amount_cents, description,
            sale_id, collection_id, user_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.customer_id)
    .bind(movement.kind)
    .bind(movement.amount_cents)
    .bind(&movement.description)
    .bind(&movement.sale_id)
    .bind(&movement.collection_id)
    .bind(&movement.user_id)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        customer_id = %movement.customer_id,
        kind = ?movement.kind,
        amount = %entry.amount,
        "Ledger movement posted"
    );

    Ok(movement)
}

/// Takes the write lock on a customer row and returns the current balance.
async fn lock_customer(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<Money> {
    let result = sqlx::query("UPDATE customers SET updated_at = ?2 WHERE id = ?1")
        .bind(customer_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", customer_id));
    }

    let balance: i64 = sqlx::query_scalar("SELECT balance_cents FROM customers WHERE id = ?1")
        .bind(customer_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(Money::from_cents(balance))
}

/// Takes the write lock on a collection row and returns it.
async fn lock_collection(conn: &mut SqliteConnection, id: &str) -> DbResult<Collection> {
    let result = sqlx::query("UPDATE collections SET status = status WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Collection", id));
    }

    let collection = sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = ?1")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(collection)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the open-account ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Records one movement in its own transaction.
    pub async fn record(&self, entry: LedgerEntry) -> DbResult<LedgerMovement> {
        entry.validate()?;
        let mut tx = self.pool.begin().await?;
        let movement = post_movement(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(
            customer_id = %movement.customer_id,
            kind = ?movement.kind,
            amount = %entry.amount,
            "Ledger movement recorded"
        );
        Ok(movement)
    }

    /// Increases what the customer owes.
    ///
    /// ## Errors
    /// - `InvalidAmount` if `amount <= 0`, above `MAX_AMOUNT_CENTS`, or if
    ///   the balance would overflow (nothing is written)
    /// - `NotFound` if the customer does not exist
    pub async fn record_debt(
        &self,
        customer_id: &str,
        amount: Money,
        description: &str,
        user_id: &str,
    ) -> DbResult<LedgerMovement> {
        self.record(LedgerEntry::debt(customer_id, amount, description, user_id))
            .await
    }

    /// Decreases what the customer owes.
    pub async fn record_credit(
        &self,
        customer_id: &str,
        amount: Money,
        description: &str,
        user_id: &str,
    ) -> DbResult<LedgerMovement> {
        self.record(LedgerEntry::credit(customer_id, amount, description, user_id))
            .await
    }

    /// Issues a collection against a customer's debt.
    ///
    /// ## What This Does
    /// 1. Validates the request (amount, check / note details)
    /// 2. Warns if the amount exceeds the current balance (not blocked)
    /// 3. Numbers it `THS-YYYYMMDD-NNNN`, retrying on collision
    /// 4. Cash, card and wire are collected at once and credited; check and
    ///    promissory note stay pending with no balance effect
    pub async fn issue_collection(&self, request: CollectionRequest) -> DbResult<CollectionReceipt> {
        request.validate()?;
        debug!(
            customer_id = %request.customer_id,
            amount = %request.amount(),
            collection_type = ?request.collection_type,
            "Issuing collection"
        );

        let mut tx = self.pool.begin().await?;
        let balance = lock_customer(&mut tx, &request.customer_id).await?;

        let excess = overpayment(balance, request.amount());
        if let Some(excess) = excess {
            warn!(
                customer_id = %request.customer_id,
                balance = %balance,
                amount = %request.amount(),
                excess = %excess,
                "Collection exceeds open balance"
            );
        }

        let now = Utc::now();
        let status = initial_status(request.collection_type);
        let mut collection = Collection {
            id: new_id(),
            collection_no: String::new(),
            customer_id: request.customer_id.clone(),
            amount_cents: request.amount_cents,
            collection_type: request.collection_type,
            status,
            due_date: request.due_date,
            instrument_no: trimmed(request.instrument_no),
            bank: trimmed(request.bank),
            reference_no: trimmed(request.reference_no),
            description: trimmed(request.description),
            created_by: request.created_by.clone(),
            created_at: now,
            settled_at: (status == CollectionStatus::Collected).then_some(now),
            cancelled_at: None,
        };

        let prefix = format!("{}-{}-", COLLECTION_NO_PREFIX, now.format("%Y%m%d"));
        let issued_today = count_with_prefix(
            &mut tx,
            "SELECT COUNT(*) FROM collections WHERE collection_no LIKE ?1",
            &prefix,
        )
        .await?;

        let mut attempt = 0;
        loop {
            collection.collection_no = format_collection_no(now, issued_today + 1 + attempt);
            match insert_collection(&mut tx, &collection).await {
                Ok(()) => break,
                Err(err)
                    if err.is_unique_violation_on("collections.collection_no")
                        && attempt + 1 < MAX_IDENTIFIER_ATTEMPTS =>
                {
                    debug!(collection_no = %collection.collection_no, "Collection number taken, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }

        let movement = if status == CollectionStatus::Collected {
            let entry = LedgerEntry::credit(
                &collection.customer_id,
                collection.amount(),
                collection_description(&collection.collection_no),
                &collection.created_by,
            )
            .for_collection(&collection.id);
            Some(post_movement(&mut tx, &entry).await?)
        } else {
            None
        };

        tx.commit().await?;

        info!(
            collection_no = %collection.collection_no,
            status = collection.status.as_str(),
            amount = %collection.amount(),
            "Collection issued"
        );

        Ok(CollectionReceipt {
            collection,
            movement,
            overpayment: excess,
        })
    }

    /// Settles a pending check or promissory note (`pending -> collected`)
    /// and credits the customer.
    ///
    /// ## Errors
    /// - `InvalidStatus` if the collection is already collected
    /// - `AlreadyCancelled` if it was cancelled
    pub async fn settle_collection(&self, id: &str, user_id: &str) -> DbResult<Collection> {
        debug!(id = %id, "Settling collection");
        let mut tx = self.pool.begin().await?;
        let collection = lock_collection(&mut tx, id).await?;
        ensure_can_settle(&collection)?;

        sqlx::query(
            "UPDATE collections SET status = 'collected', settled_at = ?2 WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let entry = LedgerEntry::credit(
            &collection.customer_id,
            collection.amount(),
            collection_description(&collection.collection_no),
            user_id,
        )
        .for_collection(&collection.id);
        post_movement(&mut tx, &entry).await?;

        let settled = fetch_collection(&mut tx, id).await?;
        tx.commit().await?;

        info!(collection_no = %settled.collection_no, "Collection settled");
        Ok(settled)
    }

    /// Cancels a collection.
    ///
    /// A collected collection is reversed with a debt of the same amount
    /// ("cancellation: THS-..."); a pending one never touched the balance.
    /// Cancelling twice fails with `AlreadyCancelled` and reverses nothing.
    pub async fn cancel_collection(&self, id: &str, user_id: &str) -> DbResult<Collection> {
        debug!(id = %id, "Cancelling collection");
        let mut tx = self.pool.begin().await?;
        let collection = lock_collection(&mut tx, id).await?;
        let effect = ensure_can_cancel(&collection)?;

        let result = sqlx::query(
            "UPDATE collections SET status = 'cancelled', cancelled_at = ?2 WHERE id = ?1 AND status <> 'cancelled'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::AlreadyCancelled {
                collection_no: collection.collection_no.clone(),
            }
            .into());
        }

        if let CancelEffect::ReverseCredit(amount) = effect {
            let entry = LedgerEntry::debt(
                &collection.customer_id,
                amount,
                cancellation_description(&collection.collection_no),
                user_id,
            )
            .for_collection(&collection.id);
            post_movement(&mut tx, &entry).await?;
        }

        let cancelled = fetch_collection(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            collection_no = %cancelled.collection_no,
            reversed = matches!(effect, CancelEffect::ReverseCredit(_)),
            "Collection cancelled"
        );
        Ok(cancelled)
    }

    /// Gets a collection by ID.
    pub async fn get_collection(&self, id: &str) -> DbResult<Option<Collection>> {
        let collection = sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(collection)
    }

    /// Lists collections, newest first.
    pub async fn collections(&self, filter: &CollectionFilter) -> DbResult<Vec<Collection>> {
        let search = validate_search_query(&filter.search)?;

        let collections = sqlx::query_as::<_, Collection>(
            r#"
            SELECT c.* FROM collections c
            JOIN customers cu ON cu.id = c.customer_id
            WHERE (?1 IS NULL OR c.customer_id = ?1)
              AND (?2 IS NULL OR c.status = ?2)
              AND c.created_at >= ?3 AND c.created_at < ?4
              AND (?5 = ''
                   OR c.collection_no LIKE ?6 ESCAPE '\'
                   OR IFNULL(c.instrument_no, '') LIKE ?6 ESCAPE '\'
                   OR cu.first_name || ' ' || cu.last_name LIKE ?6 ESCAPE '\'
                   OR cu.phone LIKE ?6 ESCAPE '\')
            ORDER BY c.created_at DESC
            LIMIT ?7
            "#,
        )
        .bind(&filter.customer_id)
        .bind(filter.status)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .bind(&search)
        .bind(like_pattern(&search))
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(collections)
    }

    /// Total amount of the collections matching `filter`, ignoring its
    /// limit. Cancelled collections are left out unless the status filter
    /// asks for them.
    pub async fn collections_total(&self, filter: &CollectionFilter) -> DbResult<Money> {
        let search = validate_search_query(&filter.search)?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT IFNULL(SUM(c.amount_cents), 0) FROM collections c
            JOIN customers cu ON cu.id = c.customer_id
            WHERE (?1 IS NULL OR c.customer_id = ?1)
              AND ((?2 IS NULL AND c.status != 'cancelled') OR c.status = ?2)
              AND c.created_at >= ?3 AND c.created_at < ?4
              AND (?5 = ''
                   OR c.collection_no LIKE ?6 ESCAPE '\'
                   OR IFNULL(c.instrument_no, '') LIKE ?6 ESCAPE '\'
                   OR cu.first_name || ' ' || cu.last_name LIKE ?6 ESCAPE '\'
                   OR cu.phone LIKE ?6 ESCAPE '\')
            "#,
        )
        .bind(&filter.customer_id)
        .bind(filter.status)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .bind(&search)
        .bind(like_pattern(&search))
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(total))
    }

    /// Movements of a customer within a date range, oldest first.
    pub async fn movements(&self, customer_id: &str, range: DateRange) -> DbResult<Vec<LedgerMovement>> {
        let movements = sqlx::query_as::<_, LedgerMovement>(
            r#"
            SELECT * FROM ledger_movements
            WHERE customer_id = ?1 AND created_at >= ?2 AND created_at < ?3
            ORDER BY created_at, rowid
            "#,
        )
        .bind(customer_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Completed sales of a customer that were (partly) paid on open
    /// account, newest first.
    pub async fn list_debt_positions(&self, customer_id: &str) -> DbResult<Vec<DebtPosition>> {
        let positions = sqlx::query_as::<_, DebtPosition>(
            r#"
            SELECT
                s.id AS sale_id,
                s.receipt_number,
                s.total_cents,
                SUM(p.amount_cents) AS open_account_cents,
                s.created_at
            FROM sales s
            JOIN payments p ON p.sale_id = s.id
            WHERE s.customer_id = ?1
              AND s.status = 'completed'
              AND p.method = 'open_account'
            GROUP BY s.id, s.receipt_number, s.total_cents, s.created_at
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }

    /// Compares the stored balance with the fold of the movement log.
    pub async fn verify_balance(&self, customer_id: &str) -> DbResult<BalanceCheck> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                c.balance_cents,
                COALESCE((
                    SELECT SUM(CASE m.kind WHEN 'debt' THEN m.amount_cents ELSE -m.amount_cents END)
                    FROM ledger_movements m
                    WHERE m.customer_id = c.id
                ), 0)
            FROM customers c
            WHERE c.id = ?1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        let (stored, computed) = row.ok_or_else(|| DbError::not_found("Customer", customer_id))?;
        let check = BalanceCheck {
            stored: Money::from_cents(stored),
            computed: Money::from_cents(computed),
        };
        if !check.is_consistent() {
            warn!(customer_id = %customer_id, drift = %check.drift(), "Balance drift detected");
        }
        Ok(check)
    }

    /// Signed sum of all movements of one kind, for a customer.
    pub async fn total_by_kind(&self, customer_id: &str, kind: MovementKind) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM ledger_movements WHERE customer_id = ?1 AND kind = ?2",
        )
        .bind(customer_id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_cents(total))
    }
}

async fn insert_collection(conn: &mut SqliteConnection, c: &Collection) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO collections (
            id, collection_no, customer_id, amount_cents, collection_type, status,
            due_date, instrument_no, bank, reference_no, description,
            created_by, created_at, settled_at, cancelled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&c.id)
    .bind(&c.collection_no)
    .bind(&c.customer_id)
    .bind(c.amount_cents)
    .bind(c.collection_type)
    .bind(c.status)
    .bind(c.due_date)
    .bind(&c.instrument_no)
    .bind(&c.bank)
    .bind(&c.reference_no)
    .bind(&c.description)
    .bind(&c.created_by)
    .bind(c.created_at)
    .bind(c.settled_at)
    .bind(c.cancelled_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_collection(conn: &mut SqliteConnection, id: &str) -> DbResult<Collection> {
    let collection = sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = ?1")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(collection)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================
