//! # streamctl-polls
//!
//! Watching a running poll until it finishes, and tallying the result.
//!
//! - **[`PollWatcher`]**: races periodic fetches against an operator
//!   cancellation trigger and returns exactly one [`PollTally`] or
//!   [`WatchError`].
//! - **[`PollSource`]**: the remote operations the watcher needs, implemented
//!   for [`streamctl_helix::HelixClient`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use streamctl_polls::PollWatcher;
//!
//! let watcher = PollWatcher::new(Arc::new(helix));
//! let tally = watcher
//!     .watch(&channel_id, &poll.id, async { let _ = tokio::signal::ctrl_c().await; })
//!     .await?;
//! println!("{tally}");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod source;
pub mod tally;
pub mod watcher;

pub use error::{WatchError, WatchResult};
pub use source::PollSource;
pub use tally::PollTally;
pub use watcher::{PollWatcher, WatchConfig};
