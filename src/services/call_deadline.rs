//! Optional per-call deadline for external calls.

use std::future::Future;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};

/// Await `fut`, failing with [`DomainError::Timeout`] if `limit` elapses
/// first. Without a limit the future runs to completion.
pub async fn with_deadline<T, F>(
    limit: Option<Duration>,
    operation: &str,
    fut: F,
) -> DomainResult<T>
where
    F: Future<Output = DomainResult<T>>,
{
    let Some(limit) = limit else {
        return fut.await;
    };

    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(operation, limit_ms, "call deadline expired");
        Err(DomainError::Timeout {
            operation: operation.to_string(),
            limit_ms,
        })
    })
}
