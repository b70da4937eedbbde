//! Request-scoped cancellation.
//!
//! A transport layer hands each request a [`CancellationToken`] and cancels
//! it when the client goes away. Wrapping a service call in [`cancellable`]
//! drops the in-flight future at its next await point. Booking mutations
//! are a single store write, so dropping them leaves either the old or the
//! new document. Flows that write several documents and compensate on
//! failure run their write phase through [`detached`], which keeps going
//! once the caller has stopped waiting.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::errors::{DomainError, DomainResult};

pub async fn cancellable<T, F>(token: &CancellationToken, operation: F) -> DomainResult<T>
where
    F: Future<Output = DomainResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("Request cancelled by caller");
            Err(DomainError::Cancelled)
        }
        result = operation => result,
    }
}

/// Run `operation` on its own task and wait for it. Dropping the returned
/// future does not stop the task, so multi-write flows always reach their
/// compensation step.
pub async fn detached<T, F>(operation: F) -> DomainResult<T>
where
    F: Future<Output = DomainResult<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(operation).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(DomainError::Cancelled),
    }
}
