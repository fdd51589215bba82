use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{HarnessError, HasStatus, Result, RetryPolicy};

/// Computes the backoff before retry `attempt` (0-indexed).
///
/// The first retry waits exactly `base_ms`; each further retry doubles the
/// wait. The exponent is clamped and the multiplication saturates so large
/// attempt counts cannot overflow.
pub fn backoff_delay(attempt: usize, base_ms: u64) -> Duration {
    let exp = attempt.min(16) as u32;
    let multiplier = 1u64 << exp;
    Duration::from_millis(base_ms.saturating_mul(multiplier))
}

/// Executes `op`, retrying on transient failure per `policy`.
///
/// The operation receives the 0-indexed attempt number and must produce a
/// value with an observable status code. An `Err` is retried while
/// attempts remain; an `Ok` is retried only when its status is in the
/// policy's retriable set. The final outcome (success, terminal status,
/// or the last error once attempts are exhausted) is returned unmodified.
///
/// There is no wall-clock deadline here: an operation that hangs is
/// bounded only by its own timeout.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    T: HasStatus,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(policy, &mut op, None).await
}

/// Like [`retry`], but the backoff waits race `cancel`.
///
/// Cancellation during a wait surfaces as [`HarnessError::Cancelled`]; an
/// attempt already in flight is not interrupted.
pub async fn retry_cancellable<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
    cancel: &CancellationToken,
) -> Result<T>
where
    T: HasStatus,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(policy, &mut op, Some(cancel)).await
}

async fn run<T, F, Fut>(
    policy: &RetryPolicy,
    op: &mut F,
    cancel: Option<&CancellationToken>,
) -> Result<T>
where
    T: HasStatus,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match op(attempt).await {
            Ok(value) => {
                let status = value.status_code();
                if policy.is_retriable(status) && attempt < policy.max_retries {
                    tracing::debug!(attempt, status, "retrying on transient status");
                    wait_before_retry(policy, attempt, cancel).await?;
                    attempt += 1;
                    continue;
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt < policy.max_retries {
                    tracing::debug!(attempt, error = %err, "retrying after error");
                    wait_before_retry(policy, attempt, cancel).await?;
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

async fn wait_before_retry(
    policy: &RetryPolicy,
    attempt: usize,
    cancel: Option<&CancellationToken>,
) -> Result<()> {
    let delay = backoff_delay(attempt, policy.base_delay_ms);
    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");

    match cancel {
        Some(token) => {
            tokio::select! {
                () = token.cancelled() => Err(HarnessError::Cancelled),
                () = sleep(delay) => Ok(()),
            }
        }
        None => {
            sleep(delay).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::{backoff_delay, retry, retry_cancellable};
    use crate::{HarnessError, HasStatus, RetryPolicy};

    #[derive(Debug)]
    struct StatusOnly(u16);

    impl HasStatus for StatusOnly {
        fn status_code(&self) -> u16 {
            self.0
        }
    }

    fn policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 1,
            retry_on: vec![429, 500, 502, 503, 504],
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(0, 250), Duration::from_millis(250));
        assert_eq!(backoff_delay(1, 250), Duration::from_millis(500));
        assert_eq!(backoff_delay(2, 250), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(3, 250), Duration::from_millis(2_000));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let delay = backoff_delay(usize::MAX, u64::MAX);
        assert_eq!(delay, Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn recovers_after_transient_statuses() {
        let calls = AtomicUsize::new(0);
        let statuses = [503u16, 503, 200];

        let result = retry(&policy(2), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            let status = statuses[attempt];
            async move { Ok(StatusOnly(status)) }
        })
        .await
        .expect("must succeed on the third attempt");

        assert_eq!(result.status_code(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicUsize::new(0);

        let result = retry(&policy(0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(StatusOnly(503)) }
        })
        .await
        .expect("terminal status is still Ok");

        assert_eq!(result.status_code(), 503);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retriable_status_returns_immediately() {
        let calls = AtomicUsize::new(0);

        let result = retry(&policy(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(StatusOnly(404)) }
        })
        .await
        .expect("non-retriable status is still Ok");

        assert_eq!(result.status_code(), 404);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_error_surfaces_after_exhaustion() {
        let calls = AtomicUsize::new(0);

        let err = retry(&policy(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<StatusOnly, _>(HarnessError::Decode("boom".to_owned())) }
        })
        .await
        .expect_err("must exhaust retries");

        assert!(matches!(err, HarnessError::Decode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_backoff_wait() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = AtomicUsize::new(0);

        let slow_policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 60_000,
            retry_on: vec![503],
        };

        let err = retry_cancellable(
            &slow_policy,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(StatusOnly(503)) }
            },
            &token,
        )
        .await
        .expect_err("must abort during the first backoff");

        assert!(matches!(err, HarnessError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
