use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::shared::AppError;

/// Timeout and retry budget applied to every persistence call
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound for a single store round-trip
    pub timeout: Duration,
    /// Extra attempts after a transient failure
    pub retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries: 1,
        }
    }
}

/// Runs a store call under the configured timeout, retrying transient
/// failures. Once the retry budget is spent the failure surfaces as
/// `StoreUnavailable`. Non-transient errors are returned untouched.
pub async fn with_retry<T, F, Fut>(
    config: &StoreConfig,
    operation: &'static str,
    mut call: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let outcome = match tokio::time::timeout(config.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::DatabaseError(format!(
                "{} timed out after {}ms",
                operation,
                config.timeout.as_millis()
            ))),
        };

        match outcome {
            Err(err) if err.is_transient() => {
                if attempt >= config.retries {
                    error!(operation, attempt, error = %err, "Store call failed, giving up");
                    return Err(AppError::StoreUnavailable(format!("{}: {}", operation, err)));
                }
                attempt += 1;
                warn!(operation, attempt, error = %err, "Transient store failure, retrying");
            }
            other => return other,
        }
    }
}

/// Maps a sqlx failure onto the error taxonomy.
/// Unique violations are conflicts; everything else is treated as transient.
pub fn map_sqlx_error(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            return AppError::Conflict(db_err.message().to_string());
        }
    }
    AppError::DatabaseError(err.to_string())
}
