//! The conversation: modes, message history and the rules that move between them.

mod request;
mod session;
mod sources;
pub mod texts;

pub use request::{PendingRequest, Reply, Request};
pub use session::{Rejected, Session};
pub use sources::{with_sources, SOURCES_HEADING};

use chrono::{DateTime, Utc};

pub type MessageId = u64;

/// How the next piece of user text will be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Greeting,
    AwaitingChoice,
    SubjectSelection,
    QuizActive,
    TutorActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    /// Set on placeholders until their content arrives.
    pub is_loading: bool,
}
