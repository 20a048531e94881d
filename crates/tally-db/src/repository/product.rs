//! # Product Repository
//!
//! Database operations for per-tenant product catalogs.
//!
//! ## Scoping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every read and write takes the owner id and puts it in the WHERE      │
//! │  clause. There is no unscoped accessor: another tenant's product is    │
//! │  indistinguishable from a product that does not exist.                 │
//! │                                                                         │
//! │  find_owned(owner, [p1, p2, p9])                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT … WHERE owner_user_id = ? AND id IN (?, ?, ?)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  [p1, p2]   ← p9 is foreign or absent; caller compares counts          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Search
//! `search` is a case-insensitive substring match over name and brand
//! (`LIKE` with escaped wildcards); `brand` is an exact filter.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::Product;

const PRODUCT_COLUMNS: &str = "id, owner_user_id, name, brand, price, unit_cost, bulk_cost, created_at, updated_at";

/// Optional narrowing of a catalog listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub brand: Option<String>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let page = repo.list_owned(&actor.id, &ProductFilter::default(), 15, 0).await?;
/// let product = repo.get_owned(&actor.id, "uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, owner = %product.owner_user_id, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, owner_user_id, name, brand,
                price, unit_cost, bulk_cost,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.owner_user_id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.price)
        .bind(product.unit_cost)
        .bind(product.bulk_cost)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets one of `owner`'s products.
    pub async fn get_owned(&self, owner: &str, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND owner_user_id = ?2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Bulk ownership lookup: the subset of `ids` that `owner` owns, in one
    /// query.
    pub async fn find_owned(&self, owner: &str, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_user_id = "
        ));
        qb.push_bind(owner.to_string());
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;

        debug!(
            owner = %owner,
            requested = ids.len(),
            owned = products.len(),
            "Bulk ownership lookup"
        );
        Ok(products)
    }

    /// Lists `owner`'s products, newest first.
    ///
    /// An `offset` past what SQLite can address yields an empty page; SQLite
    /// itself would read a negative OFFSET as 0.
    pub async fn list_owned(
        &self,
        owner: &str,
        filter: &ProductFilter,
        limit: usize,
        offset: usize,
    ) -> DbResult<Vec<Product>> {
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_scope(&mut qb, owner, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Counts `owner`'s products matching `filter`.
    pub async fn count_owned(&self, owner: &str, filter: &ProductFilter) -> DbResult<usize> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_scope(&mut qb, owner, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as usize)
    }

    /// Writes every mutable column of `product`, scoped to its owner.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?3,
                brand = ?4,
                price = ?5,
                unit_cost = ?6,
                bulk_cost = ?7,
                updated_at = ?8
            WHERE id = ?1 AND owner_user_id = ?2
            "#,
        )
        .bind(&product.id)
        .bind(&product.owner_user_id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.price)
        .bind(product.unit_cost)
        .bind(product.bulk_cost)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Deletes one of `owner`'s products. Sale lines referencing it stay.
    pub async fn delete_owned(&self, owner: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1 AND owner_user_id = ?2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, "Product deleted");
        Ok(())
    }
}

/// Appends the owner scope and the optional filters as a WHERE clause.
fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, owner: &str, filter: &ProductFilter) {
    qb.push(" WHERE owner_user_id = ");
    qb.push_bind(owner.to_string());

    if let Some(search) = filter.search.as_deref() {
        let pattern = like_pattern(search);
        qb.push(" AND (LOWER(name) LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR LOWER(COALESCE(brand, '')) LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }

    if let Some(brand) = filter.brand.as_deref() {
        qb.push(" AND brand = ");
        qb.push_bind(brand.to_string());
    }
}

/// `%term%`, lowercased, with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use tally_core::Money;
    use uuid::Uuid;

    fn product(owner: &str, name: &str, brand: Option<&str>, minutes_ago: i64) -> Product {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        Product {
            id: Uuid::new_v4().to_string(),
            owner_user_id: owner.to_string(),
            name: name.to_string(),
            brand: brand.map(str::to_string),
            price: Money::from_cents(2999),
            unit_cost: Some(Money::from_cents(1500)),
            bulk_cost: None,
            created_at: at,
            updated_at: at,
        }
    }

    async fn setup() -> ProductRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().products()
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Mug"), "%mug%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_insert_and_get_is_owner_scoped() {
        let repo = setup().await;
        let p = product("u1", "Mug", None, 0);
        repo.insert(&p).await.unwrap();

        let found = repo.get_owned("u1", &p.id).await.unwrap().unwrap();
        assert_eq!(found.price, Money::from_cents(2999));
        assert_eq!(found.unit_cost, Some(Money::from_cents(1500)));

        assert!(repo.get_owned("u2", &p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_owned_returns_only_owned_subset() {
        let repo = setup().await;
        let mine = product("u1", "Mug", None, 0);
        let theirs = product("u2", "Cup", None, 0);
        repo.insert(&mine).await.unwrap();
        repo.insert(&theirs).await.unwrap();

        let ids = vec![mine.id.clone(), theirs.id.clone(), Uuid::new_v4().to_string()];
        let owned = repo.find_owned("u1", &ids).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, mine.id);

        assert!(repo.find_owned("u1", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_search_and_brand() {
        let repo = setup().await;
        repo.insert(&product("u1", "Espresso Beans", Some("Lavazza"), 3)).await.unwrap();
        repo.insert(&product("u1", "Filter Paper", Some("Melitta"), 2)).await.unwrap();
        repo.insert(&product("u1", "Mug", Some("Lavazza"), 1)).await.unwrap();
        repo.insert(&product("u2", "Lavazza Crema", Some("Lavazza"), 0)).await.unwrap();

        let all = repo.list_owned("u1", &ProductFilter::default(), 15, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "Mug");

        let filter = ProductFilter {
            search: Some("lavazza".into()),
            brand: None,
        };
        assert_eq!(repo.count_owned("u1", &filter).await.unwrap(), 2);

        let filter = ProductFilter {
            search: Some("BEAN".into()),
            brand: Some("Lavazza".into()),
        };
        let found = repo.list_owned("u1", &filter, 15, 0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Espresso Beans");

        let second_page = repo.list_owned("u1", &ProductFilter::default(), 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].name, "Espresso Beans");
    }

    #[tokio::test]
    async fn test_offset_past_the_end_is_empty() {
        let repo = setup().await;
        repo.insert(&product("u1", "Mug", None, 0)).await.unwrap();

        let filter = ProductFilter::default();
        assert!(repo.list_owned("u1", &filter, 15, 1).await.unwrap().is_empty());
        assert!(repo.list_owned("u1", &filter, 15, usize::MAX).await.unwrap().is_empty());
        assert!(repo
            .list_owned("u1", &filter, usize::MAX, usize::MAX - 14)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(repo.list_owned("u1", &filter, usize::MAX, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_are_owner_scoped() {
        let repo = setup().await;
        let mut p = product("u1", "Mug", None, 0);
        repo.insert(&p).await.unwrap();

        let mut foreign = p.clone();
        foreign.owner_user_id = "u2".into();
        assert!(matches!(
            repo.update(&foreign).await,
            Err(DbError::NotFound { .. })
        ));

        p.price = Money::from_cents(1999);
        repo.update(&p).await.unwrap();
        let found = repo.get_owned("u1", &p.id).await.unwrap().unwrap();
        assert_eq!(found.price, Money::from_cents(1999));

        assert!(repo.delete_owned("u2", &p.id).await.is_err());
        repo.delete_owned("u1", &p.id).await.unwrap();
        assert!(repo.get_owned("u1", &p.id).await.unwrap().is_none());
    }
}
