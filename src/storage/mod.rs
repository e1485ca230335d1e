//! Storage layer abstraction.
//!
//! The engine never talks to a concrete database: everything goes through
//! the [`MemoryStore`] adapter trait, injected per component. No ambient
//! singletons, no shared global handles.

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{MemoryStore, ScopeLock};

use crate::models::{Memory, MemoryId};
use crate::{Error, Result};

/// Retries an operation on transient store failures, with linear backoff.
///
/// Only [`Error::TransientStore`] is retried here; version conflicts need a
/// re-read first (see [`update_with_retry`]) and everything else is final.
/// After `max_attempts` the last error surfaces to the caller, which
/// typically reports it as deferred work rather than failing the batch.
pub(crate) async fn retry_transient<T, F, Fut>(
    max_attempts: u32,
    backoff_ms: u64,
    op: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e @ Error::TransientStore { .. }) if attempt < max_attempts => {
                tracing::debug!(error = %e, attempt, "transient store failure, backing off");
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms * u64::from(attempt)))
                    .await;
            },
            Err(e) => return Err(e),
        }
    }
}

/// Re-read-and-retry update for optimistic version conflicts.
///
/// Reads the record, applies `mutate`, and writes it back. A concurrent
/// writer on the same record triggers a fresh read and another attempt, up
/// to `max_attempts`. Disjoint-field races (a tier update vs. an
/// access-count bump) therefore reconcile to both writes landing.
///
/// Returns the stored record, or `None` if it no longer exists.
pub(crate) async fn update_with_retry<F>(
    store: &dyn MemoryStore,
    id: &MemoryId,
    max_attempts: u32,
    mutate: F,
) -> Result<Option<Memory>>
where
    F: Fn(&mut Memory) + Send + Sync,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(mut memory) = store.get(id).await? else {
            return Ok(None);
        };
        mutate(&mut memory);
        match store.put(&memory).await {
            Ok(version) => {
                memory.version = version;
                return Ok(Some(memory));
            },
            Err(Error::MergeConflict { .. }) if attempt < max_attempts => {},
            Err(Error::MergeConflict { .. }) => {
                return Err(Error::MergeConflict {
                    id: id.to_string(),
                    attempts: attempt,
                });
            },
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_transient_recovers() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = tokio_test::block_on(retry_transient(3, 1, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::TransientStore {
                        operation: "put_batch".to_string(),
                        cause: "flaky".to_string(),
                    })
                } else {
                    Ok(42)
                }
            }
        }));
        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_transient_gives_up_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = tokio_test::block_on(retry_transient(2, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::TransientStore {
                    operation: "put_batch".to_string(),
                    cause: "down".to_string(),
                })
            }
        }));
        assert!(matches!(result, Err(Error::TransientStore { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retry_transient_does_not_retry_conflicts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = tokio_test::block_on(retry_transient(5, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::MergeConflict {
                    id: "m1".to_string(),
                    attempts: 1,
                })
            }
        }));
        assert!(matches!(result, Err(Error::MergeConflict { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "conflicts need a re-read, not a blind retry");
    }
}
