use std::future::Future;

use futures::stream::{self, StreamExt};

use crate::Result;

/// Runs `ops` with at most `limit` operations in flight at once.
///
/// Rust futures are lazy, so each element of `ops` is a not-yet-started
/// operation; a completion immediately admits the next pending one. The
/// output order follows completion, NOT input order. Failures are isolated
/// per task: each operation's error is captured in its own slot, one
/// failing operation never aborts the batch, and the result count always
/// equals the input count. A `limit` of 0 is clamped to 1.
pub async fn dispatch<I, Fut, T>(ops: I, limit: usize) -> Vec<Result<T>>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T>>,
{
    let limit = limit.max(1);
    stream::iter(ops)
        .buffer_unordered(limit)
        .collect::<Vec<_>>()
        .await
}
