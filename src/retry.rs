//! Retry classification and cancellable delays
//!
//! Batch retries use a fixed delay (`BatchConfig::retry_delay`) and a bounded count
//! (`BatchConfig::max_retries`). This module separates batch failures from run-state errors and
//! provides the delay primitive every suspension point of a run goes through.

use crate::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Every failure a collaborator can raise for a batch is retried up to `max_retries`. Only errors
/// describing the run itself (a rejected operation, bad configuration, cancellation) are final.
pub trait IsRetryable {
    /// Returns true if the batch that raised this error should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch(_) | Error::Package(_) => true,
            Error::Network(_) | Error::Io(_) | Error::Zip(_) => true,
            // Collaborators may report anything else through Other
            Error::Other(_) => true,
            Error::Config { .. } => false,
            Error::ConcurrentRun | Error::NoActiveRun { .. } => false,
            Error::RetryExhausted { .. } => false,
            Error::NoSuccessfulItems | Error::NothingToRetry => false,
            Error::Cancelled => false,
        }
    }
}

/// Sleep for `delay` unless `token` is cancelled first.
///
/// Returns `true` when the full delay elapsed and the token is still live.
pub(crate) async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(delay) => !token.is_cancelled(),
        _ = token.cancelled() => false,
    }
}
