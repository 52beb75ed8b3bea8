//! # streamctl-helix
//!
//! A small, session-bound client for the parts of the Twitch Helix API that
//! streamctl drives: polls, user lookup and chat announcements.
//!
//! ```ignore
//! use streamctl_helix::{HelixClient, HelixConfig};
//!
//! let session = factory.session().await?;
//! let helix = HelixClient::from_session(&session, HelixConfig::default())?;
//! let channel = helix.get_user_id("somechannel").await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::HelixClient;
pub use config::{HelixConfig, HELIX_BASE_URL};
pub use error::{HelixError, HelixResult};
pub use types::{
    AnnouncementColor, CreatePoll, Poll, PollChoice, PollStatus, User, MAX_CHOICES,
    MAX_CHOICE_TITLE, MIN_CHOICES,
};
