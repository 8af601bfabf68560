//! Database repository for dashboard admin accounts.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{errors::Result, models::admin_users::AdminUserDBResponse};
use crate::types::AdminUserId;

pub struct AdminUsers<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> AdminUsers<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Create the admin, or replace its password hash if it already exists
    #[instrument(skip(self, password_hash), err)]
    pub async fn upsert(&mut self, email: &str, password_hash: Option<&str>) -> Result<AdminUserDBResponse> {
        let admin = sqlx::query_as::<_, AdminUserDBResponse>(
            r#"
            INSERT INTO admin_users (email, password_hash, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (email) DO UPDATE SET password_hash = COALESCE(excluded.password_hash, password_hash)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(admin)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: AdminUserId) -> Result<Option<AdminUserDBResponse>> {
        let admin = sqlx::query_as::<_, AdminUserDBResponse>("SELECT * FROM admin_users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(admin)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<AdminUserDBResponse>> {
        let admin = sqlx::query_as::<_, AdminUserDBResponse>("SELECT * FROM admin_users WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(admin)
    }

    #[instrument(skip(self), err)]
    pub async fn record_login(&mut self, id: AdminUserId) -> Result<()> {
        sqlx::query("UPDATE admin_users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_upsert_keeps_id_and_updates_hash(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = AdminUsers::new(&mut conn);

        let first = repo.upsert("admin@example.com", Some("hash-1")).await.unwrap();
        let second = repo.upsert("admin@example.com", Some("hash-2")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.password_hash.as_deref(), Some("hash-2"));

        let unchanged = repo.upsert("admin@example.com", None).await.unwrap();
        assert_eq!(unchanged.password_hash.as_deref(), Some("hash-2"));

        repo.record_login(first.id).await.unwrap();
        let fetched = repo.get_by_email("admin@example.com").await.unwrap().unwrap();
        assert!(fetched.last_login_at.is_some());
        assert_eq!(repo.get_by_id(first.id).await.unwrap().unwrap().email, "admin@example.com");
    }
}
