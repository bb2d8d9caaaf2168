//! Remote record source.
//!
//! The engine only needs two capabilities from the remote side: fetch the
//! whole remote replica and post a single record. Neither retries; retry is
//! the offline queue's job. Repeated posts of the same logical record are not
//! assumed to be deduplicated remotely.

mod http;

pub use http::{check_server, HttpGateway, REMOTE_CATEGORY};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::models::Record;

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetches every record the remote currently holds.
    async fn fetch_all(&self) -> Result<Vec<Record>, NetworkError>;

    /// Posts one record and returns it as stored remotely, with the
    /// remote-assigned id and modification time.
    async fn post_one(&self, record: &Record) -> Result<Record, NetworkError>;
}

/// Bounds a gateway call by `limit`. Elapsing counts as a network failure.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, NetworkError>
where
    F: Future<Output = Result<T, NetworkError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout(limit.as_millis())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let result: Result<(), NetworkError> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(NetworkError::Timeout(50))));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout(Duration::from_secs(1), async {
            Err::<(), _>(NetworkError::Status(500))
        })
        .await;
        assert!(matches!(result, Err(NetworkError::Status(500))));
    }
}
