//! Retry logic for LLM provider requests
//!
//! Exponential backoff for transient failures of the initial HTTP send
//! (connection resets, 5xx, overload). Once a stream is established it is
//! never retried; the caller must issue a fresh query.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: usize,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

/// Classify an error message as retriable (transient) or not (permanent)
pub fn is_retriable_error(error_message: &str) -> bool {
    let lower = error_message.to_lowercase();

    let transient_patterns = [
        // HTTP 5xx server errors
        "500",
        "502",
        "503",
        "504",
        "internal server error",
        "service unavailable",
        "gateway timeout",
        // Connection issues
        "timeout",
        "timed out",
        "connection reset",
        "connection closed",
        "network error",
        // Model still loading into memory
        "loading model",
        "temporarily unavailable",
    ];

    transient_patterns
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Build an exponential backoff strategy from configuration
pub fn build_backoff(config: &RetryConfig) -> ExponentialBuilder {
    let mut builder = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_max_times(config.max_retries);

    if config.jitter {
        builder = builder.with_jitter();
    }

    builder
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_server_errors() {
        assert!(is_retriable_error("HTTP 500 Internal Server Error"));
        assert!(is_retriable_error("503 service unavailable"));
        assert!(is_retriable_error("gateway timeout"));
    }

    #[test]
    fn test_retriable_connection() {
        assert!(is_retriable_error("connection reset by peer"));
        assert!(is_retriable_error("operation timed out"));
    }

    #[test]
    fn test_retriable_model_loading() {
        assert!(is_retriable_error("loading model into memory"));
    }

    #[test]
    fn test_non_retriable_connection_refused() {
        // nothing is listening; retrying will not make Ollama appear
        assert!(!is_retriable_error("connection refused"));
    }

    #[test]
    fn test_non_retriable_bad_request() {
        assert!(!is_retriable_error("400 Bad Request"));
        assert!(!is_retriable_error("model 'wizard' not found"));
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.jitter);
    }
}
