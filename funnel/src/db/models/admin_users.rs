//! Database models for dashboard admin accounts.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::AdminUserId;

/// Database response for an admin user
#[derive(Debug, Clone, FromRow)]
pub struct AdminUserDBResponse {
    pub id: AdminUserId,
    pub email: String,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}
