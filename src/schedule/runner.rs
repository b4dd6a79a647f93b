use crate::base::context::OpContext;
use crate::base::error::WatchError;
use crate::base::PORTAL_UTC_OFFSET;
use crate::client::PortalClient;
use crate::config::Account;
use crate::report::record::{distinct_groups, retain_groups, sort_records};
use crate::schedule::timetable::{next_fire, ScheduleEntry};
use crate::snapshot::{Notifier, Snapshot, SnapshotSink};
use std::time::Duration;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Budget for one full login, fetch, and store attempt.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(50);

/// Fixed wait between failed attempts.
const RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

/// Drives the fetch pipeline once per entry of the daily time table, with
/// bounded retries per slot.
pub struct Scheduler {
    account: Account,
    table: Vec<ScheduleEntry>,
    max_attempts: u32,
    retry_delay: Duration,
    sink: Box<dyn SnapshotSink>,
    notifier: Box<dyn Notifier>,
}

impl Scheduler {
    pub fn new(
        account: Account,
        table: Vec<ScheduleEntry>,
        max_attempts: u32,
        sink: Box<dyn SnapshotSink>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            account,
            table,
            max_attempts: max_attempts.max(1),
            retry_delay: RETRY_DELAY,
            sink,
            notifier,
        }
    }

    /// Override the inter-attempt delay. Tests use this; production keeps
    /// the default.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sleep-and-fire loop. Returns when cancelled, or on a configuration
    /// problem that makes scheduling impossible.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), WatchError> {
        let ctx = OpContext::new(cancel);
        loop {
            let now = OffsetDateTime::now_utc().to_offset(PORTAL_UTC_OFFSET);
            let (wait, notify) = next_fire(now, &self.table)
                .ok_or_else(|| WatchError::Config("time table is empty".into()))?;
            info!(wait_secs = wait.as_secs(), notify, "sleeping until next scheduled run");
            ctx.sleep(wait).await?;

            match self.run_with_retry(&ctx, notify).await {
                Ok(()) => {}
                Err(WatchError::Cancelled) => return Err(WatchError::Cancelled),
                // terminal for this slot only; the next slot starts clean
                Err(err) => error!(error = %err, "scheduled run abandoned"),
            }
        }
    }

    /// Retry `run_once` up to the attempt budget with a fixed delay between
    /// attempts. Explicit cancellation aborts between (and during) attempts;
    /// exhaustion escalates to the notifier and returns the wrapped error.
    pub async fn run_with_retry(&self, ctx: &OpContext, notify: bool) -> Result<(), WatchError> {
        let mut attempt: u32 = 0;
        let last = loop {
            attempt += 1;
            let attempt_ctx = ctx.with_deadline(ATTEMPT_TIMEOUT);
            let err = match self.run_once(&attempt_ctx, notify).await {
                Ok(()) => {
                    info!(attempt, "report fetch finished");
                    return Ok(());
                }
                Err(WatchError::Cancelled) => return Err(WatchError::Cancelled),
                Err(err) => err,
            };
            warn!(attempt, error = %err, "report fetch attempt failed");
            if attempt >= self.max_attempts {
                break err;
            }
            info!(delay_secs = self.retry_delay.as_secs(), "waiting before retry");
            ctx.sleep(self.retry_delay).await?;
        };

        let err = WatchError::MaxAttemptsExceeded {
            attempts: self.max_attempts,
            cause: Box::new(last),
        };
        if let Err(notify_err) = self
            .notifier
            .notify("report watcher", &format!("report fetch failed: {err}"))
        {
            warn!(error = %notify_err, "failure notice could not be delivered");
        }
        Err(err)
    }

    /// One full pipeline pass: login, fetch, order, persist, notify.
    pub async fn run_once(&self, ctx: &OpContext, notify: bool) -> Result<(), WatchError> {
        let mut client = PortalClient::new(self.account.portal.clone());
        client.login(ctx, &self.account).await?;

        let outcome = self.capture_snapshot(ctx, &mut client).await;
        if let Err(err) = client.logout(ctx).await {
            debug!(error = %err, "logout failed");
        }
        let empty = outcome?;

        if notify && !empty {
            let body = format!("unreported list updated: {}", self.account.portal.report_base);
            match self.notifier.notify("report watcher", &body) {
                Ok(()) => info!("unreported-list notice sent"),
                Err(err) => warn!(error = %err, "notice could not be delivered"),
            }
        }
        Ok(())
    }

    async fn capture_snapshot(
        &self,
        ctx: &OpContext,
        client: &mut PortalClient,
    ) -> Result<bool, WatchError> {
        client.establish_report_session(ctx).await?;
        let mut records = client
            .fetch_report(ctx, &self.account.wid, &self.account.key)
            .await?;

        retain_groups(&mut records, &self.account.class);
        sort_records(&mut records);
        let groups = distinct_groups(&records);
        let empty = records.is_empty();

        let snapshot = Snapshot {
            groups,
            records,
            taken_at: OffsetDateTime::now_utc().unix_timestamp(),
        };
        self.sink.write(&snapshot)?;
        info!(
            records = snapshot.records.len(),
            groups = snapshot.groups.len(),
            "snapshot stored"
        );
        Ok(empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    struct NullSink;

    impl SnapshotSink for NullSink {
        fn write(&self, _snapshot: &Snapshot) -> Result<(), WatchError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectNotifier {
        notices: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Notifier for CollectNotifier {
        fn notify(&self, subject: &str, body: &str) -> Result<(), WatchError> {
            self.notices
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    /// Accepts connections and drops them immediately, so every attempt
    /// fails with a transport error. Returns the base URL and a connection
    /// counter.
    async fn failing_portal() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });
        (format!("http://{addr}"), count)
    }

    fn account_for(base: &str) -> Account {
        let portal = crate::config::PortalConfig {
            auth_base: base.to_string(),
            report_base: base.to_string(),
            insecure_skip_verify: false,
        };
        Account {
            username: "u1".into(),
            password: "p1".into(),
            class: vec![],
            wid: "w1".into(),
            key: "k1".into(),
            file: "unused.json".into(),
            portal,
        }
    }

    #[tokio::test]
    async fn test_retry_exhaustion_counts_attempts_and_notifies() {
        let (base, connections) = failing_portal().await;
        let notifier = CollectNotifier::default();
        let notices = notifier.notices.clone();
        let scheduler = Scheduler::new(
            account_for(&base),
            vec![],
            3,
            Box::new(NullSink),
            Box::new(notifier),
        )
        .retry_delay(Duration::from_millis(10));

        let ctx = OpContext::new(CancellationToken::new());
        let err = scheduler.run_with_retry(&ctx, false).await.unwrap_err();

        match err {
            WatchError::MaxAttemptsExceeded { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(connections.load(Ordering::SeqCst), 3);
        let notices = notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].1.contains("maximum attempts"));
    }

    #[tokio::test]
    async fn test_cancellation_between_attempts_stops_retrying() {
        let (base, connections) = failing_portal().await;
        let notifier = CollectNotifier::default();
        let notices = notifier.notices.clone();
        let scheduler = Arc::new(
            Scheduler::new(
                account_for(&base),
                vec![],
                3,
                Box::new(NullSink),
                Box::new(notifier),
            )
            .retry_delay(Duration::from_secs(60)),
        );

        let token = CancellationToken::new();
        let ctx = OpContext::new(token.clone());
        let handle = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_with_retry(&ctx, false).await })
        };

        // let attempt 1 fail and the backoff wait begin, then cancel
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        let err = handle.await.unwrap().unwrap_err();

        assert!(err.is_cancelled());
        // attempt 1 only; cancellation must prevent attempts 2 and 3
        assert!(connections.load(Ordering::SeqCst) <= 1);
        assert!(notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_already_cancelled_context_skips_all_attempts() {
        let (base, connections) = failing_portal().await;
        let scheduler = Scheduler::new(
            account_for(&base),
            vec![],
            3,
            Box::new(NullSink),
            Box::new(CollectNotifier::default()),
        );

        let token = CancellationToken::new();
        token.cancel();
        let ctx = OpContext::new(token);
        let err = scheduler.run_with_retry(&ctx, false).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(connections.load(Ordering::SeqCst), 0);
    }
}
