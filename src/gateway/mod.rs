//! Gateway implementations and call helpers

pub mod paper;

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::common::errors::{EngineError, Result};

pub use paper::PaperGateway;

/// Run a gateway call with a deadline
///
/// Expiry maps to [`EngineError::Timeout`] naming the operation.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "Gateway call timed out");
            Err(EngineError::Timeout(operation.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, EngineError>(1)
        };
        let err = with_timeout(Duration::from_secs(1), "get_price", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout(op) if op == "get_price"));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let value = with_timeout(Duration::from_secs(1), "get_balance", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
