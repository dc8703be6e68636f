//! Deadline enforcement for storage and transport calls.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the timed-out future is dropped, which abandons
//!   the in-flight work
//! - An elapsed deadline is an ordinary unclassified failure, so it surfaces as
//!   `internal`; cancellation is not a code of its own

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::domain::error::BoxError;

/// A call did not finish before its deadline.
#[derive(Debug, Clone, Copy, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut`, giving up after `limit`.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, BoxError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Box::new(DeadlineExceeded(limit))),
    }
}
