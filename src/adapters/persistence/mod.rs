use sqlx::PgPool;

use crate::app_error::AppError;

pub mod plan;
pub mod subscription;

/// Partial unique index guaranteeing at most one active subscription per user.
pub const ONE_ACTIVE_PER_USER_INDEX: &str = "subscriptions_one_active_per_user";

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.constraint() == Some(ONE_ACTIVE_PER_USER_INDEX) {
                    AppError::Conflict("User already has an active subscription".into())
                } else if db_err.is_unique_violation() {
                    AppError::InvalidInput("A record with this value already exists".into())
                } else if db_err.is_foreign_key_violation() {
                    AppError::InvalidInput("Referenced record not found".into())
                } else if db_err.is_check_violation() {
                    AppError::InvalidInput("Subscription violates a table constraint".into())
                } else {
                    // Log the actual error, but don't expose details
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            }
            sqlx::Error::PoolTimedOut => {
                tracing::error!("Timed out waiting for a database connection");
                AppError::Database("Database unavailable".into())
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}
