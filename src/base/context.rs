use crate::base::error::WatchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline for one pipeline operation.
///
/// Every network call and backoff wait in the pipeline runs through this
/// context so that a stop signal is observed promptly. The two ways out are
/// deliberately distinct: [`WatchError::DeadlineExceeded`] is retryable and
/// still allows best-effort cleanup, [`WatchError::Cancelled`] aborts
/// everything including cleanup network I/O.
#[derive(Debug, Clone)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Derived context bounded by `timeout`. An earlier inherited deadline
    /// wins.
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = Some(match self.deadline {
            Some(inherited) if inherited < candidate => inherited,
            _ => candidate,
        });
        Self {
            cancel: self.cancel.clone(),
            deadline,
        }
    }

    /// Derived context with its own deadline, discarding the inherited one.
    /// Used for cleanup that must still run after the attempt deadline fired.
    pub fn with_fresh_deadline(&self, timeout: Duration) -> Self {
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline_expired(&self) -> bool {
        self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Race `fut` against cancellation and the deadline.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, WatchError>
    where
        F: Future<Output = Result<T, WatchError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(WatchError::Cancelled),
            () = deadline => Err(WatchError::DeadlineExceeded),
            out = fut => out,
        }
    }

    /// Cancellation-aware sleep. The deadline does not apply here: backoff
    /// waits run on the slot context, which carries none.
    pub async fn sleep(&self, duration: Duration) -> Result<(), WatchError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(WatchError::Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_output_through() {
        let ctx = OpContext::new(CancellationToken::new());
        let out = ctx.run(async { Ok::<_, WatchError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_run_observes_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OpContext::new(token);
        let err = ctx
            .run(async { Ok::<_, WatchError>(()) })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_observes_deadline() {
        let ctx = OpContext::new(CancellationToken::new()).with_deadline(Duration::from_secs(1));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, WatchError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inherited_deadline_wins_when_earlier() {
        let outer = OpContext::new(CancellationToken::new()).with_deadline(Duration::from_secs(1));
        let inner = outer.with_deadline(Duration::from_secs(300));
        let err = inner
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, WatchError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_deadline_outlives_expired_parent() {
        let outer = OpContext::new(CancellationToken::new()).with_deadline(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(outer.deadline_expired());
        let cleanup = outer.with_fresh_deadline(Duration::from_secs(5));
        assert!(!cleanup.deadline_expired());
        let out = cleanup.run(async { Ok::<_, WatchError>(1) }).await;
        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn test_sleep_cancelled() {
        let token = CancellationToken::new();
        let ctx = OpContext::new(token.clone());
        let waiter = tokio::spawn(async move { ctx.sleep(Duration::from_secs(600)).await });
        token.cancel();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }
}
