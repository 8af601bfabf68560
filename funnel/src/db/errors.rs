use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        table: Option<String>,
        /// First column named in the violated constraint
        column: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation { message: String },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation { message: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using sqlx error categorization.
///
/// SQLite reports no constraint/table metadata, so the table and column are recovered from the
/// message (`UNIQUE constraint failed: leads.email`).
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                if db_err.is_unique_violation() {
                    let (table, column) = parse_unique_target(&message);
                    DbError::UniqueViolation { table, column, message }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation { message }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation { message }
                } else {
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

impl DbError {
    /// True when this is a unique violation on `table.column`.
    pub fn is_unique_on(&self, table: &str, column: &str) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { table: Some(t), column: Some(c), .. } if t == table && c == column
        )
    }
}

/// Extract `(table, column)` from "UNIQUE constraint failed: table.col[, table.col2]"
fn parse_unique_target(message: &str) -> (Option<String>, Option<String>) {
    let Some((_, targets)) = message.split_once(':') else {
        return (None, None);
    };
    let first = targets.split(',').next().unwrap_or("").trim();
    match first.split_once('.') {
        Some((table, column)) => (Some(table.to_string()), Some(column.to_string())),
        None => (None, None),
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unique_target_single_column() {
        let (table, column) = parse_unique_target("UNIQUE constraint failed: leads.email");
        assert_eq!(table.as_deref(), Some("leads"));
        assert_eq!(column.as_deref(), Some("email"));
    }

    #[test]
    fn test_parse_unique_target_composite() {
        let (table, column) = parse_unique_target("UNIQUE constraint failed: video_views.lead_id, video_views.video_id");
        assert_eq!(table.as_deref(), Some("video_views"));
        assert_eq!(column.as_deref(), Some("lead_id"));
    }

    #[test]
    fn test_parse_unique_target_garbage() {
        assert_eq!(parse_unique_target("something else"), (None, None));
    }

    #[test]
    fn test_is_unique_on() {
        let err = DbError::UniqueViolation {
            table: Some("leads".into()),
            column: Some("email".into()),
            message: String::new(),
        };
        assert!(err.is_unique_on("leads", "email"));
        assert!(!err.is_unique_on("invoices", "payment_id"));
        assert!(!DbError::NotFound.is_unique_on("leads", "email"));
    }
}
