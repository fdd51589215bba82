use std::time::Duration;

/// Configures when and how often a failed operation is re-attempted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base backoff in milliseconds; attempt `k` waits `base * 2^k`.
    pub base_delay_ms: u64,
    /// Status codes treated as transient and worth retrying.
    pub retry_on: Vec<u16>,
}

impl RetryPolicy {
    /// Policy retrying the usual transient statuses with a short backoff.
    pub fn transient() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 250,
            retry_on: vec![429, 500, 502, 503, 504],
        }
    }

    pub fn is_retriable(&self, status: u16) -> bool {
        self.retry_on.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 250,
            retry_on: Vec::new(),
        }
    }
}

/// Configures HTTP timeout and retry behavior for [`crate::ApiClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HarnessOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retry policy applied to every request issued by the client.
    pub retry: RetryPolicy,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Configures a [`crate::poll_until`] loop.
#[derive(Clone, Debug)]
pub struct PollOptions {
    /// Wall-clock budget measured from invocation start.
    pub timeout: Duration,
    /// Pause between consecutive attempts.
    pub interval: Duration,
    /// Context carried by the timeout error when the budget runs out.
    pub message: String,
}

impl PollOptions {
    pub fn new(timeout: Duration, interval: Duration, message: impl Into<String>) -> Self {
        Self {
            timeout,
            interval,
            message: message.into(),
        }
    }
}
