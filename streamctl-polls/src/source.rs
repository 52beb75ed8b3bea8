//! Remote poll operations the watcher depends on.

use async_trait::async_trait;
use streamctl_helix::{HelixClient, HelixResult, Poll};

/// Fetch and terminate polls.
#[async_trait]
pub trait PollSource: Send + Sync {
    /// Current state of a poll. `PollNotFound` means it is not visible yet.
    async fn fetch_poll(&self, broadcaster_id: &str, poll_id: &str) -> HelixResult<Poll>;

    /// Ask the platform to end a poll early.
    async fn end_poll(&self, broadcaster_id: &str, poll_id: &str) -> HelixResult<()>;
}

#[async_trait]
impl PollSource for HelixClient {
    async fn fetch_poll(&self, broadcaster_id: &str, poll_id: &str) -> HelixResult<Poll> {
        self.get_poll(broadcaster_id, poll_id).await
    }

    async fn end_poll(&self, broadcaster_id: &str, poll_id: &str) -> HelixResult<()> {
        HelixClient::end_poll(self, broadcaster_id, poll_id).await
    }
}
