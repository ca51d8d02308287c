use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid fallback subscription: {0}")]
    FallbackInvalid(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Store failures are transient; callers may retry them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::StoreTimeout(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::FallbackInvalid(_) => ErrorCode::FallbackInvalid,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::StoreTimeout(_) => ErrorCode::StoreTimeout,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    Conflict,
    FallbackInvalid,
    DatabaseError,
    StoreTimeout,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::FallbackInvalid => "FALLBACK_INVALID",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::StoreTimeout => "STORE_TIMEOUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
