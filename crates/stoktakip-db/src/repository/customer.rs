//! # Customer Repository
//!
//! Customer records. The balance column is read here but only ever written
//! by the ledger engine.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{like_pattern, new_id};
use stoktakip_core::commands::CustomerInput;
use stoktakip_core::validation::validate_search_query;
use stoktakip_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a customer with a zero balance.
    pub async fn create(&self, input: CustomerInput) -> DbResult<Customer> {
        input.validate()?;
        let now = Utc::now();
        let customer = Customer {
            id: new_id(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            company_name: non_blank(input.company_name),
            phone: input.phone.trim().to_string(),
            email: non_blank(input.email),
            address: non_blank(input.address),
            balance_cents: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %customer.id, "Creating customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, first_name, last_name, company_name, phone, email, address,
                balance_cents, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.company_name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.balance_cents)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %customer.id, name = %customer.display_name(), "Customer created");
        Ok(customer)
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Gets a customer by ID, failing with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Updates contact details. The balance is untouched.
    pub async fn update(&self, id: &str, input: CustomerInput) -> DbResult<Customer> {
        input.validate()?;
        debug!(id = %id, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                first_name = ?2,
                last_name = ?3,
                company_name = ?4,
                phone = ?5,
                email = ?6,
                address = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(non_blank(input.company_name))
        .bind(input.phone.trim())
        .bind(non_blank(input.email))
        .bind(non_blank(input.address))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get(id).await
    }

    /// Activates or deactivates a customer. Customers are never deleted:
    /// their movements must stay attributable.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting customer active flag");

        let result = sqlx::query("UPDATE customers SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }

    /// Searches customers by name, company or phone.
    ///
    /// ## Arguments
    /// * `query` - Search text; empty lists everyone
    /// * `active_only` - Skip deactivated customers
    /// * `limit` - Maximum number of rows
    pub async fn search(&self, query: &str, active_only: bool, limit: u32) -> DbResult<Vec<Customer>> {
        let query = validate_search_query(query)?;
        debug!(query = %query, limit, "Searching customers");

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE (?1 = 0 OR is_active = 1)
              AND (?2 = ''
                   OR first_name || ' ' || last_name LIKE ?3 ESCAPE '\'
                   OR IFNULL(company_name, '') LIKE ?3 ESCAPE '\'
                   OR phone LIKE ?3 ESCAPE '\')
            ORDER BY last_name, first_name
            LIMIT ?4
            "#,
        )
        .bind(active_only)
        .bind(&query)
        .bind(like_pattern(&query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Customers who owe the store, largest balance first.
    pub async fn debtors(&self, limit: u32) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE balance_cents > 0 ORDER BY balance_cents DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    pub(crate) fn customer_input(first: &str, last: &str) -> CustomerInput {
        CustomerInput {
            first_name: first.to_string(),
            last_name: last.to_string(),
            company_name: None,
            phone: "0532 123 45 67".to_string(),
            email: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db
            .customers()
            .create(customer_input("Ayşe", "Yılmaz"))
            .await
            .unwrap();

        let fetched = db.customers().get(&created.id).await.unwrap();
        assert_eq!(fetched.first_name, "Ayşe");
        assert_eq!(fetched.balance_cents, 0);
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = customer_input("Ayşe", "Yılmaz");
        input.phone = "abc".to_string();
        let err = db.customers().create(input).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }

    #[tokio::test]
    async fn test_search_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();
        let ayse = repo.create(customer_input("Ayşe", "Yılmaz")).await.unwrap();
        repo.create(customer_input("Mehmet", "Demir")).await.unwrap();

        let found = repo.search("yıl", true, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ayse.id);

        assert_eq!(repo.search("", true, 10).await.unwrap().len(), 2);

        repo.set_active(&ayse.id, false).await.unwrap();
        assert_eq!(repo.search("", true, 10).await.unwrap().len(), 1);
        assert_eq!(repo.search("", false, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .customers()
            .update("550e8400-e29b-41d4-a716-446655440000", customer_input("A", "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
