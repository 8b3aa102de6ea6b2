//! # Catalog Repository
//!
//! Lookup tables behind products: categories, brands and the variant
//! attribute vocabulary (colors, sizes, other).

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use stoktakip_core::commands::{AttributeInput, NamedInput};
use stoktakip_core::{AttributeKind, Brand, Category, VariantAttribute};

/// Repository for categories, brands and variant attributes.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    /// Creates a category. Names are unique.
    pub async fn create_category(&self, input: NamedInput) -> DbResult<Category> {
        input.validate()?;
        let category = Category {
            id: new_id(),
            name: input.name.trim().to_string(),
            description: input.description,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO categories (id, name, description, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_active)
        .bind(category.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| named_conflict(e.into(), "category", &category.name))?;

        info!(id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Gets a category by ID.
    pub async fn get_category(&self, id: &str) -> DbResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Lists categories by name.
    pub async fn list_categories(&self, active_only: bool) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE (?1 = 0 OR is_active = 1) ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    /// Renames or re-describes a category.
    pub async fn update_category(&self, id: &str, input: NamedInput) -> DbResult<Category> {
        input.validate()?;
        let name = input.name.trim().to_string();
        let result = sqlx::query("UPDATE categories SET name = ?2, description = ?3 WHERE id = ?1")
            .bind(id)
            .bind(&name)
            .bind(&input.description)
            .execute(&self.pool)
            .await
            .map_err(|e| named_conflict(e.into(), "category", &name))?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        self.get_category(id).await
    }

    /// Activates or deactivates a category.
    pub async fn set_category_active(&self, id: &str, active: bool) -> DbResult<()> {
        set_active(&self.pool, "categories", "Category", id, active).await
    }

    // -------------------------------------------------------------------------
    // Brands
    // -------------------------------------------------------------------------

    /// Creates a brand. Names are unique.
    pub async fn create_brand(&self, input: NamedInput) -> DbResult<Brand> {
        input.validate()?;
        let brand = Brand {
            id: new_id(),
            name: input.name.trim().to_string(),
            description: input.description,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO brands (id, name, description, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&brand.id)
        .bind(&brand.name)
        .bind(&brand.description)
        .bind(brand.is_active)
        .bind(brand.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| named_conflict(e.into(), "brand", &brand.name))?;

        info!(id = %brand.id, name = %brand.name, "Brand created");
        Ok(brand)
    }

    /// Gets a brand by ID.
    pub async fn get_brand(&self, id: &str) -> DbResult<Brand> {
        sqlx::query_as::<_, Brand>("SELECT * FROM brands WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Brand", id))
    }

    /// Lists brands by name.
    pub async fn list_brands(&self, active_only: bool) -> DbResult<Vec<Brand>> {
        let brands = sqlx::query_as::<_, Brand>(
            "SELECT * FROM brands WHERE (?1 = 0 OR is_active = 1) ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(brands)
    }

    /// Renames or re-describes a brand.
    pub async fn update_brand(&self, id: &str, input: NamedInput) -> DbResult<Brand> {
        input.validate()?;
        let name = input.name.trim().to_string();
        let result = sqlx::query("UPDATE brands SET name = ?2, description = ?3 WHERE id = ?1")
            .bind(id)
            .bind(&name)
            .bind(&input.description)
            .execute(&self.pool)
            .await
            .map_err(|e| named_conflict(e.into(), "brand", &name))?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Brand", id));
        }
        self.get_brand(id).await
    }

    /// Activates or deactivates a brand.
    pub async fn set_brand_active(&self, id: &str, active: bool) -> DbResult<()> {
        set_active(&self.pool, "brands", "Brand", id, active).await
    }

    // -------------------------------------------------------------------------
    // Variant attributes
    // -------------------------------------------------------------------------

    /// Creates a color, size or other attribute value. `(kind, value)` is
    /// unique.
    pub async fn create_attribute(&self, input: AttributeInput) -> DbResult<VariantAttribute> {
        input.validate()?;
        let attribute = VariantAttribute {
            id: new_id(),
            kind: input.kind,
            value: input.value.trim().to_string(),
            sort_order: input.sort_order,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(kind = ?attribute.kind, value = %attribute.value, "Creating variant attribute");

        sqlx::query(
            r#"
            INSERT INTO variant_attributes (id, kind, value, sort_order, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&attribute.id)
        .bind(attribute.kind)
        .bind(&attribute.value)
        .bind(attribute.sort_order)
        .bind(attribute.is_active)
        .bind(attribute.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| named_conflict(e.into(), "attribute", &attribute.value))?;

        Ok(attribute)
    }

    /// Gets an attribute by ID.
    pub async fn get_attribute(&self, id: &str) -> DbResult<VariantAttribute> {
        sqlx::query_as::<_, VariantAttribute>("SELECT * FROM variant_attributes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Attribute", id))
    }

    /// Lists active attributes of one kind in display order.
    pub async fn list_attributes(&self, kind: AttributeKind) -> DbResult<Vec<VariantAttribute>> {
        let attributes = sqlx::query_as::<_, VariantAttribute>(
            r#"
            SELECT * FROM variant_attributes
            WHERE kind = ?1 AND is_active = 1
            ORDER BY sort_order, value
            "#,
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(attributes)
    }

    /// Activates or deactivates an attribute value.
    pub async fn set_attribute_active(&self, id: &str, active: bool) -> DbResult<()> {
        set_active(&self.pool, "variant_attributes", "Attribute", id, active).await
    }
}

/// Attaches the offending name to a UNIQUE violation.
fn named_conflict(err: DbError, field: &str, value: &str) -> DbError {
    match err {
        DbError::UniqueViolation { .. } => DbError::duplicate(field, value),
        other => other,
    }
}

async fn set_active(
    pool: &SqlitePool,
    table: &'static str,
    entity: &str,
    id: &str,
    active: bool,
) -> DbResult<()> {
    let sql = format!("UPDATE {} SET is_active = ?2 WHERE id = ?1", table);
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(active)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found(entity, id));
    }
    debug!(table, id = %id, active, "Active flag updated");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    pub(crate) fn named(name: &str) -> NamedInput {
        NamedInput {
            name: name.to_string(),
            description: None,
        }
    }

    pub(crate) fn attribute(kind: AttributeKind, value: &str, sort_order: i64) -> AttributeInput {
        AttributeInput {
            kind,
            value: value.to_string(),
            sort_order,
        }
    }

    #[tokio::test]
    async fn test_category_names_are_unique() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        catalog.create_category(named("Elbise")).await.unwrap();

        let err = catalog.create_category(named("Elbise")).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "category");
                assert_eq!(value, "Elbise");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_brand_update_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let brand = catalog.create_brand(named("Koton")).await.unwrap();

        let renamed = catalog
            .update_brand(&brand.id, named("Koton Kids"))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Koton Kids");

        catalog.set_brand_active(&brand.id, false).await.unwrap();
        assert!(catalog.list_brands(true).await.unwrap().is_empty());
        assert_eq!(catalog.list_brands(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_attributes_sorted_by_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        catalog
            .create_attribute(attribute(AttributeKind::Size, "L", 3))
            .await
            .unwrap();
        catalog
            .create_attribute(attribute(AttributeKind::Size, "S", 1))
            .await
            .unwrap();
        catalog
            .create_attribute(attribute(AttributeKind::Color, "Siyah", 0))
            .await
            .unwrap();

        let sizes: Vec<String> = catalog
            .list_attributes(AttributeKind::Size)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.value)
            .collect();
        assert_eq!(sizes, vec!["S", "L"]);

        let err = catalog
            .create_attribute(attribute(AttributeKind::Size, "S", 9))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_missing_category() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .catalog()
            .set_category_active("550e8400-e29b-41d4-a716-446655440000", false)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
