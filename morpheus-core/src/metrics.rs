//! Metrics tracking for tool calls and token usage

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Token usage counters
#[derive(Debug, Default)]
pub struct TokenCounter {
    pub input: AtomicU64,
    pub output: AtomicU64,
}

impl TokenCounter {
    /// Add input tokens
    pub fn add_input(&self, count: u64) {
        self.input.fetch_add(count, Ordering::Relaxed);
    }

    /// Add output tokens
    pub fn add_output(&self, count: u64) {
        self.output.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current counts
    pub fn get(&self) -> TokenCounts {
        TokenCounts {
            input: self.input.load(Ordering::Relaxed),
            output: self.output.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of token counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
}

/// Session metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub tool_calls: u64,
    pub tokens: TokenCounts,
}

/// Thread-safe metrics tracker
#[derive(Debug, Clone, Default)]
pub struct MetricsTracker {
    tool_calls: Arc<AtomicU64>,
    tokens: Arc<TokenCounter>,
}

impl MetricsTracker {
    /// Create a new metrics tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tool call
    pub fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record token usage
    pub fn record_tokens(&self, input: u64, output: u64) {
        self.tokens.add_input(input);
        self.tokens.add_output(output);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> Metrics {
        Metrics {
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tokens: self.tokens.get(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_tracker() {
        let tracker = MetricsTracker::new();

        tracker.record_tool_call();
        tracker.record_tool_call();
        tracker.record_tokens(100, 50);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.tool_calls, 2);
        assert_eq!(snapshot.tokens.input, 100);
        assert_eq!(snapshot.tokens.output, 50);
    }

    #[test]
    fn test_metrics_tracker_shared_across_clones() {
        let tracker = MetricsTracker::new();
        let clone = tracker.clone();

        clone.record_tokens(10, 5);
        tracker.record_tokens(10, 5);

        assert_eq!(tracker.snapshot().tokens.input, 20);
        assert_eq!(clone.snapshot().tokens.output, 10);
    }

    #[test]
    fn test_metrics_tracker_thread_safe() {
        use std::thread;

        let tracker = MetricsTracker::new();
        let tracker2 = tracker.clone();

        let handle = thread::spawn(move || {
            for _ in 0..100 {
                tracker2.record_tool_call();
            }
        });

        for _ in 0..100 {
            tracker.record_tool_call();
        }

        handle.join().expect("thread should complete");

        assert_eq!(tracker.snapshot().tool_calls, 200);
    }
}
