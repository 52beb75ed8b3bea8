//! Session-bound Helix client.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use streamctl_auth::Session;
use tracing::{debug, warn};

use crate::config::HelixConfig;
use crate::error::{HelixError, HelixResult};
use crate::types::{
    AnnouncementBody, AnnouncementColor, ChoiceParam, CreatePoll, CreatePollBody, DataEnvelope,
    EndPollBody, Poll, PollStatus, User, MAX_CHOICES, MAX_CHOICE_TITLE, MIN_CHOICES,
};

/// Helix client bound to one access token.
///
/// Built from a freshly acquired [`Session`] for each command.
#[derive(Clone)]
pub struct HelixClient {
    http: Client,
    config: HelixConfig,
    client_id: String,
    access_token: String,
    user_id: Option<String>,
}

impl std::fmt::Debug for HelixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelixClient")
            .field("base_url", &self.config.base_url)
            .field("client_id", &self.client_id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl HelixClient {
    /// Create a client from raw credentials.
    pub fn new(
        client_id: impl Into<String>,
        access_token: impl Into<String>,
        config: HelixConfig,
    ) -> HelixResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            client_id: client_id.into(),
            access_token: access_token.into(),
            user_id: None,
        })
    }

    /// Create a client from a validated session.
    pub fn from_session(session: &Session, config: HelixConfig) -> HelixResult<Self> {
        let mut client = Self::new(session.client_id(), session.access_token(), config)?;
        client.user_id = session.user_id().map(str::to_string);
        Ok(client)
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.url(endpoint))
            .header("Client-Id", &self.client_id)
            .bearer_auth(&self.access_token)
    }

    async fn check(response: Response) -> HelixResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(HelixError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> HelixResult<Vec<T>> {
        let response = Self::check(request.send().await?).await?;
        let envelope: DataEnvelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    /// Fetch one poll of a channel.
    ///
    /// Returns [`HelixError::PollNotFound`] while the poll is not visible.
    pub async fn get_poll(&self, broadcaster_id: &str, poll_id: &str) -> HelixResult<Poll> {
        let polls: Vec<Poll> = self
            .fetch(
                self.request(Method::GET, "polls")
                    .query(&[("broadcaster_id", broadcaster_id), ("id", poll_id)]),
            )
            .await?;

        polls
            .into_iter()
            .find(|poll| poll.id == poll_id)
            .ok_or_else(|| HelixError::PollNotFound(poll_id.to_string()))
    }

    /// End a running poll early, keeping its results visible.
    pub async fn end_poll(&self, broadcaster_id: &str, poll_id: &str) -> HelixResult<()> {
        let body = EndPollBody {
            broadcaster_id,
            id: poll_id,
            status: PollStatus::Terminated,
        };
        let response = self
            .request(Method::PATCH, "polls")
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        debug!(poll_id = %poll_id, "Poll terminated");
        Ok(())
    }

    /// Start a poll.
    ///
    /// Needs 2 to 5 choices; titles longer than 25 characters are truncated.
    pub async fn create_poll(&self, params: &CreatePoll) -> HelixResult<Poll> {
        let count = params.choices.len();
        if !(MIN_CHOICES..=MAX_CHOICES).contains(&count) {
            return Err(HelixError::InvalidRequest(format!(
                "a poll needs between {} and {} options, got {}",
                MIN_CHOICES, MAX_CHOICES, count
            )));
        }

        let choices = params
            .choices
            .iter()
            .map(|title| ChoiceParam {
                title: truncate_choice(title),
            })
            .collect();
        let body = CreatePollBody {
            broadcaster_id: &params.broadcaster_id,
            title: &params.title,
            choices,
            duration: params.duration,
        };

        let polls: Vec<Poll> = self
            .fetch(self.request(Method::POST, "polls").json(&body))
            .await?;
        let poll = polls
            .into_iter()
            .next()
            .ok_or(HelixError::EmptyResponse("poll creation"))?;
        debug!(poll_id = %poll.id, "Poll created");
        Ok(poll)
    }

    /// Look up a user id by login name.
    pub async fn get_user_id(&self, login: &str) -> HelixResult<String> {
        let users: Vec<User> = self
            .fetch(self.request(Method::GET, "users").query(&[("login", login)]))
            .await?;
        users
            .into_iter()
            .next()
            .map(|user| user.id)
            .ok_or_else(|| HelixError::UserNotFound(login.to_string()))
    }

    /// Id of the user the access token belongs to.
    pub async fn get_my_user_id(&self) -> HelixResult<String> {
        if let Some(id) = &self.user_id {
            return Ok(id.clone());
        }
        let users: Vec<User> = self.fetch(self.request(Method::GET, "users")).await?;
        users
            .into_iter()
            .next()
            .map(|user| user.id)
            .ok_or(HelixError::EmptyResponse("current user"))
    }

    /// Send a chat announcement as `moderator_id` in `broadcaster_id`'s channel.
    pub async fn send_announcement(
        &self,
        broadcaster_id: &str,
        moderator_id: &str,
        color: AnnouncementColor,
        message: &str,
    ) -> HelixResult<()> {
        let response = self
            .request(Method::POST, "chat/announcements")
            .query(&[
                ("broadcaster_id", broadcaster_id),
                ("moderator_id", moderator_id),
            ])
            .json(&AnnouncementBody { message, color })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

fn truncate_choice(title: &str) -> String {
    if title.chars().count() <= MAX_CHOICE_TITLE {
        return title.to_string();
    }
    warn!(
        option = %title,
        max = MAX_CHOICE_TITLE,
        "Poll option is too long, truncating"
    );
    title.chars().take(MAX_CHOICE_TITLE).collect()
}
