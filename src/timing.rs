use std::future::Future;
use std::time::{Duration, Instant};

use crate::Result;

/// A value paired with the wall-clock time it took to produce.
#[derive(Clone, Debug)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

/// Times a single asynchronous operation.
///
/// No retries and no side effects beyond measurement; errors propagate
/// unmodified. This is the timing primitive used by [`crate::ApiClient`]
/// to stamp response durations and by ad-hoc performance probes.
pub async fn measure<T, F, Fut>(op: F) -> Result<Timed<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let value = op().await?;
    Ok(Timed {
        value,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::measure;
    use crate::HarnessError;

    #[tokio::test]
    async fn reports_value_and_elapsed() {
        let timed = measure(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(7u32)
        })
        .await
        .expect("operation succeeds");

        assert_eq!(timed.value, 7);
        assert!(timed.elapsed >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn errors_propagate() {
        let err = measure(|| async { Err::<u32, _>(HarnessError::Decode("nope".to_owned())) })
            .await
            .expect_err("operation fails");

        assert!(matches!(err, HarnessError::Decode(_)));
    }
}
