use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::app_error::{AppError, AppResult};

/// Bound a store call so a slow database cannot stall the caller.
///
/// A dropped sqlx transaction rolls back, so a timed-out write leaves no partial state.
pub async fn with_store_timeout<T, F>(limit: Duration, operation: &'static str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(AppError::StoreTimeout(limit))
        }
    }
}
