//! # Sale Repository
//!
//! Database operations for sale lines, the only persisted unit of the ledger.
//!
//! ## Transaction Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Transaction Lifecycle                             │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── insert_transaction(lines) → N rows, one SQL transaction        │
//! │         (transaction_id, line_no) UNIQUE: a reused id fails on line 0  │
//! │                                                                         │
//! │  2. READ                                                               │
//! │     └── ledger_rows(user, filter)   → rows for grouping                │
//! │     └── transaction_rows(user, id)  → rows of one transaction          │
//! │                                                                         │
//! │  3. AMEND                                                              │
//! │     └── find_line(user, id, product) → update_line(line)               │
//! │                                                                         │
//! │  4. DELETE                                                             │
//! │     └── take_transaction(user, id)  → read + delete, one SQL txn       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every read and write except the id-existence check is scoped by `user_id`.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::ledger::LedgerRow;
use tally_core::SaleLine;

const SALE_COLUMNS: &str = "id, user_id, transaction_id, line_no, product_id, quantity, \
     unit_price, unit_cost, total, utility, created_at, updated_at";

const LEDGER_SELECT: &str = r#"
    SELECT
        s.id, s.user_id, s.transaction_id, s.line_no, s.product_id, s.quantity,
        s.unit_price, s.unit_cost, s.total, s.utility, s.created_at, s.updated_at,
        p.name AS product_name,
        p.brand AS product_brand,
        u.display_name AS user_name
    FROM sales s
    LEFT JOIN products p ON p.id = s.product_id
    LEFT JOIN users u ON u.id = s.user_id
"#;

/// Narrowing of a ledger read. Bounds are half-open: `from <= created_at <
/// until`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaleFilter {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub product_id: Option<String>,
}

/// Repository for sale line database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Whether any line, of any tenant, already uses `transaction_id`.
    pub async fn transaction_id_exists(&self, transaction_id: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sales WHERE transaction_id = ?1)")
                .bind(transaction_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    /// Inserts every line of one transaction atomically.
    ///
    /// ## Errors
    /// - `DbError::UniqueViolation` when `(transaction_id, line_no)` is taken;
    ///   nothing is written.
    /// - Any other failure also rolls back.
    pub async fn insert_transaction(&self, lines: &[SaleLine]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO sales (
                    id, user_id, transaction_id, line_no, product_id, quantity,
                    unit_price, unit_cost, total, utility,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&line.id)
            .bind(&line.user_id)
            .bind(&line.transaction_id)
            .bind(line.line_no)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.unit_cost)
            .bind(line.total)
            .bind(line.utility)
            .bind(line.created_at)
            .bind(line.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            transaction_id = lines.first().map(|l| l.transaction_id.as_str()).unwrap_or(""),
            lines = lines.len(),
            "Transaction inserted"
        );
        Ok(())
    }

    /// First line (lowest `line_no`) of `user`'s transaction selling
    /// `product_id`.
    pub async fn find_line(
        &self,
        user_id: &str,
        transaction_id: &str,
        product_id: &str,
    ) -> DbResult<Option<SaleLine>> {
        let line = sqlx::query_as::<_, SaleLine>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE user_id = ?1 AND transaction_id = ?2 AND product_id = ?3
            ORDER BY line_no
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(transaction_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(line)
    }

    /// Persists a repriced line: quantity, cost snapshot, total, utility.
    pub async fn update_line(&self, line: &SaleLine) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                quantity = ?3,
                unit_cost = ?4,
                total = ?5,
                utility = ?6,
                updated_at = ?7
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(&line.id)
        .bind(&line.user_id)
        .bind(line.quantity)
        .bind(line.unit_cost)
        .bind(line.total)
        .bind(line.utility)
        .bind(line.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", &line.id));
        }

        Ok(())
    }

    /// `user`'s lines matching `filter`, joined with product and user names.
    /// Unordered: grouping decides the order.
    pub async fn ledger_rows(&self, user_id: &str, filter: &SaleFilter) -> DbResult<Vec<LedgerRow>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(LEDGER_SELECT);
        qb.push(" WHERE s.user_id = ");
        qb.push_bind(user_id.to_string());

        if let Some(from) = filter.from {
            qb.push(" AND s.created_at >= ");
            qb.push_bind(from);
        }
        if let Some(until) = filter.until {
            qb.push(" AND s.created_at < ");
            qb.push_bind(until);
        }
        if let Some(product_id) = filter.product_id.as_deref() {
            qb.push(" AND s.product_id = ");
            qb.push_bind(product_id.to_string());
        }

        let rows = qb.build_query_as::<LedgerRow>().fetch_all(&self.pool).await?;

        debug!(user_id = %user_id, rows = rows.len(), "Ledger rows fetched");
        Ok(rows)
    }

    /// Every line of one of `user`'s transactions.
    pub async fn transaction_rows(&self, user_id: &str, transaction_id: &str) -> DbResult<Vec<LedgerRow>> {
        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            "{LEDGER_SELECT} WHERE s.user_id = ?1 AND s.transaction_id = ?2 ORDER BY s.line_no"
        ))
        .bind(user_id)
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Removes all of `user`'s lines of one transaction and returns them as
    /// they were when deleted.
    ///
    /// The read, `check` and the delete share one SQL transaction: an `Err`
    /// from `check` rolls back, and a concurrent amend cannot slip between
    /// the returned rows and what was removed.
    ///
    /// ## Errors
    /// - `DbError::NotFound` when the transaction has no lines for `user`.
    pub async fn take_transaction<E, F>(
        &self,
        user_id: &str,
        transaction_id: &str,
        check: F,
    ) -> Result<Vec<LedgerRow>, E>
    where
        E: From<DbError>,
        F: FnOnce(&[LedgerRow]) -> Result<(), E>,
    {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            "{LEDGER_SELECT} WHERE s.user_id = ?1 AND s.transaction_id = ?2 ORDER BY s.line_no"
        ))
        .bind(user_id)
        .bind(transaction_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if rows.is_empty() {
            return Err(DbError::not_found("Transaction", transaction_id).into());
        }
        check(&rows)?;

        let result = sqlx::query("DELETE FROM sales WHERE user_id = ?1 AND transaction_id = ?2")
            .bind(user_id)
            .bind(transaction_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction", transaction_id).into());
        }

        tx.commit().await.map_err(DbError::from)?;

        debug!(
            transaction_id = %transaction_id,
            lines = result.rows_affected(),
            "Transaction deleted"
        );
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
