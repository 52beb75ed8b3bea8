//! Command-level operations.
//!
//! [`App`] wires the stores and clients together. Every operation that talks
//! to the platform acquires a fresh session first.

use std::future::Future;
use std::sync::Arc;
use streamctl_auth::{
    AuthConfig, AuthOutcome, Authenticator, FlowKind, HttpTokenEndpoint, KeyringStore, SecretKey,
    SecretStore, Session, SessionFactory, TokenEndpoint,
};
use streamctl_helix::{AnnouncementColor, CreatePoll, HelixClient, HelixConfig, Poll};
use streamctl_polls::{PollTally, PollWatcher, WatchConfig};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Parameters of the `poll` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    /// Login of the channel to run the poll on.
    pub channel: String,
    /// Poll question.
    pub title: String,
    /// Duration in seconds.
    pub duration: u64,
    /// Option titles.
    pub options: Vec<String>,
    /// Announce the poll in chat when it starts.
    pub announce_start: bool,
    /// Announce the result in chat when it ends.
    pub announce_result: bool,
    /// Wait for the poll to finish.
    pub watch: bool,
}

/// How a `poll` command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Created and not watched.
    Started(Poll),
    /// Created, watched to the end and tallied.
    Finished {
        /// The poll as created.
        poll: Poll,
        /// Final result.
        tally: PollTally,
    },
}

/// Stores, clients and configuration shared by all commands.
#[derive(Clone)]
pub struct App {
    auth: AuthConfig,
    helix: HelixConfig,
    watch: WatchConfig,
    secrets: Arc<dyn SecretStore>,
    tokens: Arc<dyn TokenEndpoint>,
}

impl App {
    /// Create an app over explicit stores.
    pub fn new(
        auth: AuthConfig,
        secrets: Arc<dyn SecretStore>,
        tokens: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            auth,
            helix: HelixConfig::default(),
            watch: WatchConfig::default(),
            secrets,
            tokens,
        }
    }

    /// Create an app backed by the OS keychain and the real identity server.
    pub fn with_keyring(auth: AuthConfig) -> Self {
        let tokens = Arc::new(HttpTokenEndpoint::new(&auth));
        Self::new(auth, Arc::new(KeyringStore::default()), tokens)
    }

    /// Set the Helix configuration.
    #[must_use]
    pub fn with_helix_config(mut self, config: HelixConfig) -> Self {
        self.helix = config;
        self
    }

    /// Set the poll watch policy.
    #[must_use]
    pub fn with_watch_config(mut self, config: WatchConfig) -> Self {
        self.watch = config;
        self
    }

    /// Store the application credentials.
    pub fn setup(&self, client_id: &str, client_secret: Option<&str>) -> Result<()> {
        self.secrets.set(SecretKey::ClientId, client_id)?;
        if let Some(secret) = client_secret {
            self.secrets.set(SecretKey::ClientSecret, secret)?;
        }
        info!(with_secret = client_secret.is_some(), "Client credentials stored");
        Ok(())
    }

    /// The flow `authenticate` will use: code flow when a secret is stored.
    pub fn flow(&self) -> Result<FlowKind> {
        let has_secret = self.secrets.get(SecretKey::ClientSecret)?.is_some();
        Ok(FlowKind::for_secret(has_secret))
    }

    /// Run the browser authorization, handing the URL to `present`.
    pub async fn authenticate<F>(&self, present: F) -> Result<AuthOutcome>
    where
        F: FnOnce(&str),
    {
        let flow = self.flow()?;
        let authenticator = Authenticator::new(
            self.auth.clone(),
            Arc::clone(&self.secrets),
            Arc::clone(&self.tokens),
        );
        Ok(authenticator.authenticate(flow, present).await?)
    }

    /// Acquire a validated session.
    pub async fn session(&self) -> Result<Session> {
        let factory =
            SessionFactory::new(&self.auth, Arc::clone(&self.secrets), Arc::clone(&self.tokens));
        Ok(factory.session().await?)
    }

    /// A Helix client bound to a fresh session.
    pub async fn helix(&self) -> Result<HelixClient> {
        let session = self.session().await?;
        debug!(login = ?session.login(), "Session acquired");
        Ok(HelixClient::from_session(&session, self.helix.clone())?)
    }

    /// Id of `login`, or of the authorized user when `None`.
    pub async fn user_id(&self, login: Option<&str>) -> Result<String> {
        let helix = self.helix().await?;
        let id = match login {
            Some(login) => helix.get_user_id(login).await?,
            None => helix.get_my_user_id().await?,
        };
        Ok(id)
    }

    /// Create a poll and, unless disabled, watch it to the end.
    ///
    /// `created` sees the poll before watching starts. `trigger` ends the
    /// poll early when it completes. Announcement failures only warn.
    pub async fn run_poll<C, T>(
        &self,
        request: &PollRequest,
        created: C,
        trigger: T,
    ) -> Result<PollOutcome>
    where
        C: FnOnce(&Poll),
        T: Future<Output = ()> + Send + 'static,
    {
        let helix = self.helix().await?;
        let channel_id = helix.get_user_id(&request.channel).await?;

        let poll = helix
            .create_poll(&CreatePoll {
                broadcaster_id: channel_id.clone(),
                title: request.title.clone(),
                choices: request.options.clone(),
                duration: request.duration,
            })
            .await?;
        created(&poll);

        let moderator_id = if request.announce_start || request.announce_result {
            match helix.get_my_user_id().await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "Could not look up the current user, skipping announcements");
                    None
                }
            }
        } else {
            None
        };

        if let (true, Some(moderator_id)) = (request.announce_start, moderator_id.as_deref()) {
            let message = format!(
                "New poll for {} seconds! \"{}\"",
                request.duration, request.title
            );
            announce(&helix, &channel_id, moderator_id, &message).await;
        }

        if !request.watch {
            return Ok(PollOutcome::Started(poll));
        }

        let watcher =
            PollWatcher::new(Arc::new(helix.clone())).with_config(self.watch.clone());
        let tally = watcher.watch(&channel_id, &poll.id, trigger).await?;

        if let (true, Some(moderator_id)) = (request.announce_result, moderator_id.as_deref()) {
            let message = format!("Poll \"{}\" finished: {}", request.title, tally);
            announce(&helix, &channel_id, moderator_id, &message).await;
        }

        Ok(PollOutcome::Finished { poll, tally })
    }
}

async fn announce(helix: &HelixClient, channel_id: &str, moderator_id: &str, message: &str) {
    if let Err(e) = helix
        .send_announcement(channel_id, moderator_id, AnnouncementColor::Primary, message)
        .await
    {
        warn!(error = %e, "Announcement failed, continuing");
    }
}
