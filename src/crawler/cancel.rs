//! Run cancellation
//!
//! One `CancellationToken` is shared by every worker and every rate-limited
//! fetcher of a run. Workers check it before each dispatch and fetchers race
//! their throttling and backoff sleeps against it, so nothing new goes out
//! once it trips. Requests already in flight finish or hit their own timeout.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Trips `token` once `after` has elapsed
///
/// The timer ends early, without cancelling, if the token is tripped by
/// someone else first.
pub fn cancel_after(token: &CancellationToken, after: Duration) -> JoinHandle<()> {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(after) => {
                tracing::warn!("Run timeout of {:?} reached, no new fetches will be dispatched", after);
                token.cancel();
            }
        }
    })
}
