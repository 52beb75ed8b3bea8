//! Poll completion watcher.
//!
//! Two tasks share one watch. The poller fetches the poll every interval
//! until it leaves the active state and reports the tally. The canceller
//! waits for an external trigger, asks the platform to end the poll and
//! reports whether that worked. Only the poller's outcome ends the watch, so
//! the tally always comes from observed remote state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use streamctl_helix::HelixError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{WatchError, WatchResult};
use crate::source::PollSource;
use crate::tally::PollTally;

/// Timing and retry policy of a watch.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Pause between fetches.
    pub interval: Duration,
    /// Consecutive fetch failures tolerated; one more aborts the watch.
    pub failure_budget: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            failure_budget: 2,
        }
    }
}

impl WatchConfig {
    /// Create the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pause between fetches.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how many consecutive failures are tolerated.
    #[must_use]
    pub fn with_failure_budget(mut self, budget: u32) -> Self {
        self.failure_budget = budget;
        self
    }
}

/// Aborts the watch tasks when the watch returns or is dropped.
struct TaskGuard(Vec<JoinHandle<()>>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Watches one poll until it finishes.
#[derive(Clone)]
pub struct PollWatcher {
    source: Arc<dyn PollSource>,
    config: WatchConfig,
}

impl PollWatcher {
    /// Create a watcher with the default policy.
    pub fn new(source: Arc<dyn PollSource>) -> Self {
        Self {
            source,
            config: WatchConfig::default(),
        }
    }

    /// Set the watch policy.
    #[must_use]
    pub fn with_config(mut self, config: WatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Wait for `poll_id` to finish and tally it.
    ///
    /// When `trigger` completes the poll is terminated remotely; the watch
    /// still ends only once a fetch observes the poll is no longer active.
    pub async fn watch<F>(
        &self,
        broadcaster_id: &str,
        poll_id: &str,
        trigger: F,
    ) -> WatchResult<PollTally>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (result_tx, mut result_rx) = oneshot::channel();
        let (terminated_tx, mut terminated_rx) = oneshot::channel();

        let poller = {
            let source = Arc::clone(&self.source);
            let config = self.config.clone();
            let broadcaster_id = broadcaster_id.to_string();
            let poll_id = poll_id.to_string();
            tokio::spawn(async move {
                let outcome =
                    poll_until_done(source.as_ref(), &config, &broadcaster_id, &poll_id).await;
                let _ = result_tx.send(outcome);
            })
        };

        let canceller = {
            let source = Arc::clone(&self.source);
            let broadcaster_id = broadcaster_id.to_string();
            let poll_id = poll_id.to_string();
            tokio::spawn(async move {
                trigger.await;
                info!(poll_id = %poll_id, "Terminating poll");
                let failure = source.end_poll(&broadcaster_id, &poll_id).await.err();
                let _ = terminated_tx.send(failure);
            })
        };

        let _tasks = TaskGuard(vec![poller, canceller]);
        let mut terminated = false;

        loop {
            tokio::select! {
                outcome = &mut result_rx => {
                    return outcome.unwrap_or(Err(WatchError::WatcherStopped));
                }
                failure = &mut terminated_rx, if !terminated => {
                    terminated = true;
                    match failure {
                        Ok(None) => info!(poll_id = %poll_id, "Poll terminated, waiting for final results"),
                        Ok(Some(e)) => warn!(
                            poll_id = %poll_id,
                            error = %e,
                            "Failed to terminate poll; waiting for it to finish on its own"
                        ),
                        Err(_) => debug!("Termination task ended without reporting"),
                    }
                }
            }
        }
    }
}

async fn poll_until_done(
    source: &dyn PollSource,
    config: &WatchConfig,
    broadcaster_id: &str,
    poll_id: &str,
) -> WatchResult<PollTally> {
    let mut failures = 0u32;

    loop {
        match source.fetch_poll(broadcaster_id, poll_id).await {
            Ok(poll) if !poll.status.is_active() => {
                info!(poll_id = %poll_id, status = ?poll.status, "Poll completed");
                return Ok(PollTally::from_poll(&poll));
            }
            Ok(_) => {
                failures = 0;
                debug!(poll_id = %poll_id, "Poll still active");
            }
            Err(HelixError::PollNotFound(_)) => {
                failures = 0;
                info!(poll_id = %poll_id, "Poll not found yet");
            }
            Err(e) => {
                failures += 1;
                if failures > config.failure_budget {
                    return Err(WatchError::WatchAborted {
                        failures,
                        source: e,
                    });
                }
                warn!(
                    poll_id = %poll_id,
                    attempt = failures,
                    error = %e,
                    "Failed to fetch poll, trying again"
                );
            }
        }

        tokio::time::sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use streamctl_helix::{HelixResult, Poll, PollChoice, PollStatus};

    fn poll(status: PollStatus, votes: &[(&str, u64)]) -> Poll {
        Poll {
            id: "p1".into(),
            broadcaster_id: "b1".into(),
            title: "q".into(),
            choices: votes
                .iter()
                .map(|(title, votes)| PollChoice {
                    id: String::new(),
                    title: title.to_string(),
                    votes: *votes,
                })
                .collect(),
            status,
            duration: 60,
        }
    }

    fn unavailable() -> HelixError {
        HelixError::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }

    /// Plays back scripted fetch results, then reports the poll active
    /// until `end_poll` has been called (plus `linger` more fetches), and
    /// terminated afterwards.
    struct FakeSource {
        script: Mutex<VecDeque<HelixResult<Poll>>>,
        ended: AtomicBool,
        end_fails: bool,
        linger: AtomicUsize,
        fetches: AtomicUsize,
        ends: AtomicUsize,
    }

    impl FakeSource {
        fn new(script: Vec<HelixResult<Poll>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ended: AtomicBool::new(false),
                end_fails: false,
                linger: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
                ends: AtomicUsize::new(0),
            }
        }

        fn failing_end(mut self) -> Self {
            self.end_fails = true;
            self
        }

        fn lingering(self, fetches: usize) -> Self {
            self.linger.store(fetches, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl PollSource for FakeSource {
        async fn fetch_poll(&self, _: &str, _: &str) -> HelixResult<Poll> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(next) = self.script.lock().pop_front() {
                return next;
            }
            let ended = self.ended.load(Ordering::SeqCst)
                && self
                    .linger
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_err();
            if ended {
                Ok(poll(PollStatus::Terminated, &[("A", 1), ("B", 4)]))
            } else {
                Ok(poll(PollStatus::Active, &[("A", 1), ("B", 2)]))
            }
        }

        async fn end_poll(&self, _: &str, _: &str) -> HelixResult<()> {
            self.ends.fetch_add(1, Ordering::SeqCst);
            if self.end_fails {
                return Err(unavailable());
            }
            self.ended.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn watcher(source: Arc<FakeSource>) -> PollWatcher {
        PollWatcher::new(source)
            .with_config(WatchConfig::new().with_interval(Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn test_completes_when_poll_leaves_active() {
        let source = Arc::new(FakeSource::new(vec![
            Ok(poll(PollStatus::Active, &[("A", 1), ("B", 1), ("C", 1)])),
            Ok(poll(PollStatus::Active, &[("A", 2), ("B", 3), ("C", 3)])),
            Ok(poll(PollStatus::Completed, &[("A", 3), ("B", 5), ("C", 5)])),
        ]));

        let tally = watcher(source.clone())
            .watch("b1", "p1", std::future::pending())
            .await
            .unwrap();

        assert_eq!(tally.winners, vec!["B", "C"]);
        assert_eq!(tally.max_votes, 5);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(source.ends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_three_consecutive_failures_abort() {
        let source = Arc::new(FakeSource::new(vec![
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Ok(poll(PollStatus::Completed, &[("A", 1)])),
        ]));

        let err = watcher(source.clone())
            .watch("b1", "p1", std::future::pending())
            .await
            .unwrap_err();

        match err {
            WatchError::WatchAborted { failures, source } => {
                assert_eq!(failures, 3);
                assert!(matches!(source, HelixError::Status { status: 503, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let source = Arc::new(FakeSource::new(vec![
            Err(unavailable()),
            Err(unavailable()),
            Ok(poll(PollStatus::Active, &[("A", 0)])),
            Err(unavailable()),
            Err(unavailable()),
            Ok(poll(PollStatus::Completed, &[("A", 2)])),
        ]));

        let tally = watcher(source)
            .watch("b1", "p1", std::future::pending())
            .await
            .unwrap();
        assert_eq!(tally.to_string(), "The winning option (at 2 votes) is: A");
    }

    #[tokio::test]
    async fn test_not_found_is_retried() {
        let source = Arc::new(FakeSource::new(vec![
            Err(HelixError::PollNotFound("p1".into())),
            Err(HelixError::PollNotFound("p1".into())),
            Err(HelixError::PollNotFound("p1".into())),
            Err(HelixError::PollNotFound("p1".into())),
            Ok(poll(PollStatus::Completed, &[("A", 0)])),
        ]));

        let tally = watcher(source.clone())
            .watch("b1", "p1", std::future::pending())
            .await
            .unwrap();
        assert_eq!(tally.to_string(), "The winning option (at 0 votes) is: A");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_cancellation_returns_observed_tally() {
        let source = Arc::new(FakeSource::new(vec![]));

        let tally = watcher(source.clone())
            .watch("b1", "p1", std::future::ready(()))
            .await
            .unwrap();

        // Votes come from the fetch after termination, not the trigger.
        assert_eq!(tally.winners, vec!["B"]);
        assert_eq!(tally.max_votes, 4);
        assert_eq!(source.ends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_termination_waits_for_observed_end() {
        let source = Arc::new(FakeSource::new(vec![]).lingering(3));
        let (fire, trigger) = oneshot::channel::<()>();

        let watch = {
            let source = source.clone();
            tokio::spawn(async move {
                watcher(source)
                    .watch("b1", "p1", async move {
                        let _ = trigger.await;
                    })
                    .await
            })
        };

        // Let a few active fetches through, then end the poll.
        tokio::time::sleep(Duration::from_millis(20)).await;
        fire.send(()).unwrap();

        let tally = watch.await.unwrap().unwrap();
        assert_eq!(tally.max_votes, 4);
        assert_eq!(source.ends.load(Ordering::SeqCst), 1);
        // Every lingering ACTIVE report was fetched before the watch ended.
        assert_eq!(source.linger.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_termination_does_not_end_watch() {
        let source = Arc::new(
            FakeSource::new(vec![
                Ok(poll(PollStatus::Active, &[("A", 1)])),
                Ok(poll(PollStatus::Active, &[("A", 1)])),
                Ok(poll(PollStatus::Active, &[("A", 1)])),
                Ok(poll(PollStatus::Completed, &[("A", 2), ("B", 2)])),
            ])
            .failing_end(),
        );

        let tally = watcher(source.clone())
            .watch("b1", "p1", std::future::ready(()))
            .await
            .unwrap();

        assert_eq!(tally.to_string(), "The top tie options (at 2 votes) are: A; B");
        assert_eq!(source.ends.load(Ordering::SeqCst), 1);
    }

    /// A real connection failure; nothing listens on port 1.
    async fn transport_error() -> HelixError {
        let client = streamctl_helix::HelixClient::new(
            "cid",
            "tok",
            streamctl_helix::HelixConfig::new().with_base_url("http://127.0.0.1:1"),
        )
        .unwrap();
        client.get_poll("b1", "p1").await.unwrap_err()
    }

    #[tokio::test]
    async fn test_transport_failures_are_reported_unreachable() {
        let source = Arc::new(FakeSource::new(vec![
            Err(transport_error().await),
            Err(transport_error().await),
            Err(transport_error().await),
        ]));

        let err = watcher(source)
            .watch("b1", "p1", std::future::pending())
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
        assert!(err.to_string().contains("Could not reach"));
    }
}
