//! Bounded-concurrency fan-out of per-identifier fetches.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use reader_core::{ReaderError, Result};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs `fetch_one` for every identifier with at most `concurrency` in flight.
///
/// Each unique identifier gets its own task. A per-call semaphore admits at
/// most `min(concurrency, ids.len())` of them into `fetch_one` at once (a
/// concurrency of zero is treated as one). Duplicate identifiers are fetched
/// once.
///
/// The first failure wins: it is returned as [`ReaderError::Fetch`] naming the
/// identifier, and the token handed to the remaining tasks is cancelled so
/// they stop promptly. Cancelling `ctx` reaches every `fetch_one` call and
/// every task still waiting for admission. A panic inside `fetch_one` becomes
/// [`ReaderError::TaskFailed`] for that identifier.
///
/// # Errors
/// Returns [`ReaderError::Canceled`] if `ctx` is already cancelled, otherwise
/// the first per-identifier failure wrapped in [`ReaderError::Fetch`].
pub async fn fetch_all<S, T, F, Fut>(
    ctx: &CancellationToken,
    ids: &[S],
    concurrency: usize,
    fetch_one: F,
) -> Result<HashMap<String, T>>
where
    S: AsRef<str>,
    T: Send + 'static,
    F: Fn(CancellationToken, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let ids = unique_ids(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    if ctx.is_cancelled() {
        return Err(ReaderError::Canceled);
    }

    let limit = concurrency.clamp(1, ids.len());
    debug!(ids = ids.len(), concurrency = limit, "Fanning out fetches");

    let call_ctx = ctx.child_token();
    // Stragglers are cancelled however this call ends, including being dropped.
    let _cancel_on_exit = call_ctx.clone().drop_guard();

    let admission = Arc::new(Semaphore::new(limit));
    let fetch_one = Arc::new(fetch_one);
    let (tx, mut rx) = mpsc::channel(ids.len());

    for id in &ids {
        let id = id.clone();
        let tx = tx.clone();
        let ctx = call_ctx.clone();
        let admission = Arc::clone(&admission);
        let fetch_one = Arc::clone(&fetch_one);
        tokio::spawn(async move {
            let result = run_one(&ctx, &admission, fetch_one.as_ref(), id.clone()).await;
            // Capacity covers every task, so this never waits. The receiver may
            // already be gone after an earlier failure.
            let _ = tx.send((id, result)).await;
        });
    }
    drop(tx);

    let mut results = HashMap::with_capacity(ids.len());
    while results.len() < ids.len() {
        match rx.recv().await {
            Some((id, Ok(value))) => {
                results.insert(id, value);
            }
            Some((id, Err(e))) => {
                if !e.is_canceled() {
                    warn!(%id, error = %e, "Fetch failed, cancelling remaining work");
                }
                return Err(ReaderError::for_id(id, e));
            }
            None => {
                let missing = ids
                    .iter()
                    .find(|id| !results.contains_key(*id))
                    .cloned()
                    .unwrap_or_default();
                return Err(ReaderError::for_id(
                    missing,
                    ReaderError::TaskFailed("task ended without reporting".into()),
                ));
            }
        }
    }

    debug!(fetched = results.len(), "All fetches completed");
    Ok(results)
}

/// Waits for admission, then runs one fetch with panics caught.
async fn run_one<T, F, Fut>(
    ctx: &CancellationToken,
    admission: &Arc<Semaphore>,
    fetch_one: &F,
    id: String,
) -> Result<T>
where
    F: Fn(CancellationToken, String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let _permit = tokio::select! {
        biased;
        () = ctx.cancelled() => return Err(ReaderError::Canceled),
        permit = Arc::clone(admission).acquire_owned() => permit
            .map_err(|_| ReaderError::TaskFailed("admission closed".into()))?,
    };
    if ctx.is_cancelled() {
        return Err(ReaderError::Canceled);
    }

    AssertUnwindSafe(async { fetch_one(ctx.clone(), id).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ReaderError::TaskFailed(panic_message(panic.as_ref()))))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

/// Identifiers in first-seen order with duplicates removed.
fn unique_ids<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .map(AsRef::as_ref)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}
