//! Cancellable delays
//!
//! Backoff and pacing waits go through [`pause`] so that a shutdown request
//! interrupts them instead of waiting out the full delay.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wait for `duration` unless cancelled first
///
/// Returns `true` when the full delay elapsed, `false` when the token was
/// (or already is) cancelled.
pub async fn pause(duration: Duration, cancel_token: &CancellationToken) -> bool {
    if cancel_token.is_cancelled() {
        return false;
    }
    if duration.is_zero() {
        return true;
    }

    tokio::select! {
        _ = cancel_token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
