use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use tracing::warn;

use crate::models::errors::TransportError;

/// Выполняет вызов транспорта и при ошибке повторяет его ровно один раз с теми же аргументами.
///
/// A "payload too large" error is returned immediately: resending the same
/// payload cannot succeed.
pub async fn retry_once<T, F, Fut>(label: &str, op: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    op.retry(
        ConstantBuilder::default()
            .with_delay(Duration::ZERO)
            .with_max_times(1),
    )
    .sleep(tokio::time::sleep)
    .when(|e: &TransportError| !e.is_too_large())
    .notify(|err: &TransportError, _dur: Duration| {
        warn!(call = %label, error = %err, "delivery failed, retrying once");
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_attempt_succeeds() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let res = retry_once("test", || async move {
            if calls_ref.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TransportError::Http("boom".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(res.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_two_failures() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let res: Result<(), _> = retry_once("test", || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Api { code: 400, description: "bad".into() })
        })
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn too_large_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let res: Result<(), _> = retry_once("test", || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::TooLarge("file is too big".into()))
        })
        .await;
        assert!(res.unwrap_err().is_too_large());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
