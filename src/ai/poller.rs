//! Опрос длительной операции генерации видео

use log::{debug, info, warn};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::ai::{GenerativeService, OperationHandle};
use crate::config::PollPolicy;
use crate::error::{ClipSyncError, Result};

/// Опрашивать операцию до завершения и вернуть URI результата.
///
/// Перед каждым запросом ждет `policy.delay_for(attempt)`. После каждого
/// незавершенного ответа вызывает `on_tick` с номером попытки.
/// Ошибки: `Cancelled` по токену, `TimedOut` по лимиту попыток или времени,
/// `Upstream`/`MissingCredential`, если операция завершилась с ошибкой.
pub async fn poll_until_done<S, F>(
    service: &S,
    handle: &OperationHandle,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut on_tick: F,
) -> Result<String>
where
    S: GenerativeService + ?Sized,
    F: FnMut(u32) + Send,
{
    let polling = async {
        for attempt in 0..policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Polling of {} cancelled", handle.name);
                    return Err(ClipSyncError::Cancelled);
                }
                _ = sleep(policy.delay_for(attempt)) => {}
            }

            let status = service.poll_operation(handle).await?;
            if let Some(message) = status.error {
                warn!("Operation {} failed: {}", handle.name, message);
                return Err(ClipSyncError::from_upstream(message));
            }
            if status.done {
                debug!("Operation {} finished after {} polls", handle.name, attempt + 1);
                return status.result_uri.ok_or_else(|| {
                    ClipSyncError::Upstream("Video generation finished without a video".to_string())
                });
            }
            on_tick(attempt + 1);
        }
        Err(ClipSyncError::TimedOut(format!(
            "operation {} still running after {} polls",
            handle.name, policy.max_attempts
        )))
    };

    match timeout(policy.timeout(), polling).await {
        Ok(result) => result,
        Err(_) => Err(ClipSyncError::TimedOut(format!(
            "operation {} exceeded {:?}",
            handle.name,
            policy.timeout()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedService;
    use crate::ai::OperationStatus;

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            interval_ms: 1,
            backoff_factor: 1.0,
            max_interval_ms: 1,
            max_attempts: 10,
            timeout_ms: 5_000,
        }
    }

    fn handle() -> OperationHandle {
        OperationHandle {
            name: "operations/test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ticks_until_done() {
        let service = ScriptedService::new().with_polls(vec![
            OperationStatus::pending(),
            OperationStatus::pending(),
            OperationStatus::finished("https://example.com/v.mp4"),
        ]);
        let mut ticks = Vec::new();
        let uri = poll_until_done(&service, &handle(), &fast_policy(), &CancellationToken::new(), |n| {
            ticks.push(n)
        })
        .await
        .unwrap();

        assert_eq!(uri, "https://example.com/v.mp4");
        assert_eq!(ticks, vec![1, 2]);
        assert_eq!(service.poll_calls(), 3);
    }

    #[tokio::test]
    async fn test_operation_error_is_classified() {
        let service = ScriptedService::new().with_polls(vec![OperationStatus::failed(
            "Requested entity was not found.",
        )]);
        let err = poll_until_done(&service, &handle(), &fast_policy(), &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(err.is_missing_credential());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let service = ScriptedService::new();
        let policy = PollPolicy {
            max_attempts: 3,
            ..fast_policy()
        };
        let err = poll_until_done(&service, &handle(), &policy, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ClipSyncError::TimedOut(_)));
        assert_eq!(service.poll_calls(), 3);
    }

    #[tokio::test]
    async fn test_hard_timeout() {
        let service = ScriptedService::new();
        let policy = PollPolicy {
            interval_ms: 50,
            max_interval_ms: 50,
            max_attempts: 1_000,
            timeout_ms: 120,
            ..fast_policy()
        };
        let err = poll_until_done(&service, &handle(), &policy, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ClipSyncError::TimedOut(_)));
        assert!(service.poll_calls() < 5);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let service = ScriptedService::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let policy = PollPolicy {
            interval_ms: 10_000,
            max_interval_ms: 10_000,
            ..fast_policy()
        };
        let err = poll_until_done(&service, &handle(), &policy, &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(service.poll_calls(), 0);
    }

    #[tokio::test]
    async fn test_done_without_uri() {
        let service = ScriptedService::new().with_polls(vec![OperationStatus {
            done: true,
            error: None,
            result_uri: None,
        }]);
        let err = poll_until_done(&service, &handle(), &fast_policy(), &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ClipSyncError::Upstream(_)));
    }
}
