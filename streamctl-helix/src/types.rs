//! Helix request and response models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a poll choice title.
pub const MAX_CHOICE_TITLE: usize = 25;

/// Minimum number of poll choices.
pub const MIN_CHOICES: usize = 2;

/// Maximum number of poll choices.
pub const MAX_CHOICES: usize = 5;

/// Every Helix response wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Lifecycle status of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    /// Running and accepting votes.
    Active,
    /// Ended on its own.
    Completed,
    /// Ended early by the broadcaster.
    Terminated,
    /// Ended and hidden.
    Archived,
    /// Deleted by moderation.
    Moderated,
    /// Rejected by the platform.
    Invalid,
    /// A status this client does not know. Treated as not running.
    #[serde(other)]
    Unknown,
}

impl PollStatus {
    /// Whether the poll is still running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// One option of a poll and its votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollChoice {
    /// Choice id.
    #[serde(default)]
    pub id: String,
    /// Text shown to viewers.
    pub title: String,
    /// Total votes, including channel point votes.
    #[serde(default)]
    pub votes: u64,
}

/// A poll as reported by Helix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    /// Poll id.
    pub id: String,
    /// Channel the poll runs on.
    #[serde(default)]
    pub broadcaster_id: String,
    /// Poll question.
    pub title: String,
    /// Options in the order they were created.
    #[serde(default)]
    pub choices: Vec<PollChoice>,
    /// Current status.
    pub status: PollStatus,
    /// Configured duration in seconds.
    #[serde(default)]
    pub duration: u64,
}

/// Parameters for a new poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePoll {
    /// Channel to run the poll on.
    pub broadcaster_id: String,
    /// Poll question.
    pub title: String,
    /// Option titles.
    pub choices: Vec<String>,
    /// Duration in seconds.
    pub duration: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePollBody<'a> {
    pub broadcaster_id: &'a str,
    pub title: &'a str,
    pub choices: Vec<ChoiceParam>,
    pub duration: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChoiceParam {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct EndPollBody<'a> {
    pub broadcaster_id: &'a str,
    pub id: &'a str,
    pub status: PollStatus,
}

/// A Helix user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    /// User id.
    pub id: String,
    /// Login name.
    pub login: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
}

/// Accent color of a chat announcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementColor {
    /// The channel's accent color.
    #[default]
    Primary,
    /// Blue.
    Blue,
    /// Green.
    Green,
    /// Orange.
    Orange,
    /// Purple.
    Purple,
}

impl AnnouncementColor {
    /// The value Helix expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Purple => "purple",
        }
    }
}

impl fmt::Display for AnnouncementColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnnouncementBody<'a> {
    pub message: &'a str,
    pub color: AnnouncementColor,
}
