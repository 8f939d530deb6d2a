mod extract;
mod poll;

pub use crate::extract::{EntitySelector, ExtractError, extract_affected};
pub use crate::poll::{PollError, PollOptions, poll_task};
