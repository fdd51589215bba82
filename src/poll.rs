use std::future::Future;
use std::time::Instant;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{HarnessError, PollOptions, Result};

/// Repeatedly invokes `op` until `predicate` accepts its result.
///
/// The deadline is measured from invocation start, and elapsed time is
/// checked before each attempt, so the loop never starts an attempt past
/// the deadline: wall-clock overshoot is bounded by one interval plus one
/// operation. Attempts are strictly sequential. Operation errors propagate
/// unmodified; exceeding the deadline yields [`HarnessError::Timeout`]
/// carrying the options' message and the measured elapsed time.
pub async fn poll_until<T, F, Fut, P>(options: &PollOptions, mut op: F, mut predicate: P) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    run(options, &mut op, &mut predicate, None).await
}

/// Like [`poll_until`], but the interval waits race `cancel`.
pub async fn poll_until_cancellable<T, F, Fut, P>(
    options: &PollOptions,
    mut op: F,
    mut predicate: P,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    run(options, &mut op, &mut predicate, Some(cancel)).await
}

async fn run<T, F, Fut, P>(
    options: &PollOptions,
    op: &mut F,
    predicate: &mut P,
    cancel: Option<&CancellationToken>,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    let started = Instant::now();
    let mut attempt = 0usize;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= options.timeout {
            return Err(HarnessError::Timeout {
                message: options.message.clone(),
                elapsed,
            });
        }

        let value = op().await?;
        if predicate(&value) {
            return Ok(value);
        }

        attempt += 1;
        tracing::debug!(attempt, elapsed_ms = elapsed.as_millis() as u64, "predicate not yet satisfied");

        match cancel {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => return Err(HarnessError::Cancelled),
                    () = sleep(options.interval) => {}
                }
            }
            None => sleep(options.interval).await,
        }
    }
}
