use std::future::Future;
use std::time::Instant;

use super::r#trait::EventStoreError;

/// Run a store operation, aborting it once `deadline` has passed.
///
/// Dropping the inner future is how the operation is cancelled; an elapsed
/// deadline surfaces as [`EventStoreError::DeadlineExceeded`]. An operation is
/// never started once its deadline has already passed.
pub async fn with_deadline<T, F>(deadline: Option<Instant>, operation: F) -> Result<T, EventStoreError>
where
    F: Future<Output = Result<T, EventStoreError>>,
{
    match deadline {
        None => operation.await,
        Some(deadline) if Instant::now() >= deadline => Err(EventStoreError::DeadlineExceeded),
        Some(deadline) => tokio::time::timeout_at(deadline.into(), operation)
            .await
            .map_err(|_| EventStoreError::DeadlineExceeded)?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn no_deadline_passes_result_through() {
        let result = with_deadline(None, async { Ok::<_, EventStoreError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn past_deadline_never_starts_operation() {
        let started = std::sync::atomic::AtomicBool::new(false);
        let result = with_deadline(Some(Instant::now()), async {
            started.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, EventStoreError>(())
        })
        .await;
        assert_eq!(result, Err(EventStoreError::DeadlineExceeded));
        assert!(!started.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn elapsed_deadline_aborts_operation() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let result = with_deadline(Some(deadline), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, EventStoreError>(())
        })
        .await;
        assert_eq!(result, Err(EventStoreError::DeadlineExceeded));
    }
}
