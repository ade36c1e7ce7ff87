//! Deadline helpers with cancellation awareness.

use crate::concurrency::cancelled_error;
use crate::{CorrelationId, ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::Duration;

/// Apply a timeout to a future, honoring request cancellation.
async fn timeout_with_context<T, F>(
    ctx: &RequestContext,
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ctx.ensure_not_cancelled(operation)?;
    tokio::select! {
        () = ctx.cancelled() => Err(cancelled_error(operation)),
        res = tokio::time::timeout(timeout, fut) => {
            res.unwrap_or_else(|_| Err(timeout_error(operation, timeout)))
        }
    }
}

/// Run `work` under a child context that is cancelled when `deadline` elapses.
///
/// The child token is cancelled before the timeout error is returned so that
/// any task spawned with it stops as well.
pub async fn with_deadline<T, W, F>(
    ctx: &RequestContext,
    correlation_id: CorrelationId,
    deadline: Duration,
    operation: &'static str,
    work: W,
) -> Result<T>
where
    W: FnOnce(RequestContext) -> F,
    F: Future<Output = Result<T>>,
{
    let child = ctx.child(correlation_id);
    let guard = child.cancellation_token();
    let outcome = timeout_with_context(ctx, deadline, operation, work(child)).await;
    if outcome.as_ref().is_err_and(ErrorEnvelope::is_timeout) {
        guard.cancel();
    }
    outcome
}

fn timeout_error(operation: &'static str, timeout: Duration) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::timeout(),
        format!("operation timed out: {operation}"),
        ErrorClass::Retriable,
    )
    .with_metadata("operation", operation)
    .with_metadata("timeoutMs", timeout.as_millis().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_triggers() {
        let ctx = RequestContext::new_request();
        let result = timeout_with_context(&ctx, Duration::from_millis(5), "test", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ErrorEnvelope>(())
        })
        .await;

        assert!(matches!(result, Err(error) if error.is_timeout()));
    }

    #[tokio::test]
    async fn deadline_cancels_child_context() -> Result<()> {
        let ctx = RequestContext::new_request();
        let (child_tx, child_rx) = tokio::sync::oneshot::channel();

        let result = with_deadline(
            &ctx,
            CorrelationId::parse("job-1")?,
            Duration::from_millis(5),
            "test.deadline",
            |child| async move {
                let _ = child_tx.send(child.clone());
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(error) if error.is_timeout()));
        let child = child_rx
            .await
            .map_err(|_| ErrorEnvelope::expected(ErrorCode::internal(), "child not sent"))?;
        assert!(child.is_cancelled());
        assert!(!ctx.is_cancelled());
        Ok(())
    }
}
