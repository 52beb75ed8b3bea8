//! Poll result tallying.

use std::fmt;
use streamctl_helix::{Poll, PollChoice};

/// Winner(s) of a finished poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTally {
    /// Poll question.
    pub title: String,
    /// Every option with its final votes, in listed order.
    pub choices: Vec<PollChoice>,
    /// Highest vote count.
    pub max_votes: u64,
    /// Options reaching `max_votes`, in listed order.
    pub winners: Vec<String>,
}

impl PollTally {
    /// Tally a poll's final votes.
    pub fn from_poll(poll: &Poll) -> Self {
        Self::from_choices(&poll.title, &poll.choices)
    }

    /// Tally a list of options.
    pub fn from_choices(title: &str, choices: &[PollChoice]) -> Self {
        let max_votes = choices.iter().map(|c| c.votes).max().unwrap_or(0);
        let winners = choices
            .iter()
            .filter(|c| c.votes == max_votes)
            .map(|c| c.title.clone())
            .collect();

        Self {
            title: title.to_string(),
            choices: choices.to_vec(),
            max_votes,
            winners,
        }
    }

    /// Whether more than one option shares the top count.
    pub fn is_tie(&self) -> bool {
        self.winners.len() > 1
    }
}

impl fmt::Display for PollTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.winners.as_slice() {
            [] => write!(f, "The poll had no options"),
            [winner] => write!(
                f,
                "The winning option (at {} votes) is: {}",
                self.max_votes, winner
            ),
            tied => write!(
                f,
                "The top tie options (at {} votes) are: {}",
                self.max_votes,
                tied.join("; ")
            ),
        }
    }
}
