//! Timeout helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::RondoError;

/// Wrap a fallible future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, RondoError>>,
) -> Result<T, RondoError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(RondoError::Timeout(duration.as_millis() as u64)),
    }
}

/// Await `future`, bounded by `limit` when one is set.
pub async fn maybe_timeout<T>(
    limit: Option<Duration>,
    future: impl Future<Output = T>,
) -> Result<T, RondoError> {
    match limit {
        Some(duration) => tokio::time::timeout(duration, future)
            .await
            .map_err(|_| RondoError::Timeout(duration.as_millis() as u64)),
        None => Ok(future.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_limit_is_a_timeout_error() {
        let err = maybe_timeout(
            Some(Duration::from_millis(100)),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RondoError::Timeout(100)));
    }

    #[tokio::test]
    async fn no_limit_waits_for_completion() {
        assert_eq!(maybe_timeout(None, async { 7 }).await.unwrap(), 7);
        let value = with_timeout(Duration::from_secs(1), async { Ok::<_, RondoError>(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }
}
