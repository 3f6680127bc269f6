//! Caller-side Deadlines
//!
//! The routing core imposes no timeout of its own. Front-ends that want a
//! deadline on a whole turn wrap the call with these helpers.
//!
//! ## Usage
//!
//! ```ignore
//! use chatroute::ai::timeout::{TimeoutConfig, with_timeout_map};
//!
//! let config = TimeoutConfig::default();
//! let reply = with_timeout_map(config.turn, orchestrator.send_message(text), "chat turn").await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::constants::network as net_constants;
use crate::types::{ChatError, Result};

/// Deadlines applied by front-ends
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Whole chat turn, including any tool rounds (default: 5 minutes)
    pub turn: Duration,
    /// Backend health probe (default: 10 seconds)
    pub health_check: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            turn: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
            health_check: Duration::from_secs(10),
        }
    }
}

impl TimeoutConfig {
    /// Deadline for a whole turn given in seconds
    pub fn with_turn_secs(secs: u64) -> Self {
        Self {
            turn: Duration::from_secs(secs),
            ..Self::default()
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ChatError::timeout(operation_name, timeout)),
    }
}

/// Execute an async operation with a timeout, mapping the inner result
///
/// This variant accepts futures that return non-Result types and wraps them.
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(ChatError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.turn.as_secs(), 300);
        assert_eq!(config.health_check.as_secs(), 10);
        assert_eq!(TimeoutConfig::with_turn_secs(30).turn.as_secs(), 30);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, ChatError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_map_expires() {
        let result = with_timeout_map(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                "late"
            },
            "slow turn",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ChatError::Timeout { .. }));
        assert!(err.to_string().contains("slow turn"));
    }
}
