//! # User Repository
//!
//! The administrative user directory: display names for ledger views and the
//! role each user holds.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{Role, User};

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, role = %user.role, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, display_name, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, display_name, role, created_at, updated_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// All users, oldest first.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, display_name, role, created_at, updated_at
            FROM users
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn update_role(&self, id: &str, role: Role, now: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(role)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        debug!(id = %id, role = %role, "User role changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn user(id: &str, role: Role) -> User {
        let now = Utc::now();
        User {
            id: id.into(),
            display_name: format!("User {id}"),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_list_and_change_role() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        repo.insert(&user("u1", Role::Admin)).await.unwrap();
        repo.insert(&user("u2", Role::Regular)).await.unwrap();
        assert_eq!(repo.list().await.unwrap().len(), 2);

        repo.update_role("u2", Role::Moderator, Utc::now()).await.unwrap();
        let u2 = repo.get("u2").await.unwrap().unwrap();
        assert_eq!(u2.role, Role::Moderator);

        assert!(matches!(
            repo.update_role("missing", Role::Admin, Utc::now()).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_unique_violation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        repo.insert(&user("u1", Role::Regular)).await.unwrap();
        let err = repo.insert(&user("u1", Role::Regular)).await.unwrap_err();
        assert!(err.is_unique_violation());
    }
}
