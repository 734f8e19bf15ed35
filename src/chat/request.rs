use super::MessageId;
use crate::quiz::ai_helper::{ContentService, Explanation};
use crate::quiz::Question;

/// What the content service is being asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Question { subject: String },
    Explanation { query: String },
}

/// A request the session has committed to: its placeholder is on screen and
/// the session stays busy until [`Session::complete`](super::Session::complete)
/// is called with the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub placeholder: MessageId,
    pub request: Request,
    /// Shown instead of the result when the service comes back empty.
    pub fallback: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Question(Option<Question>),
    Explanation(Explanation),
}

impl PendingRequest {
    pub async fn fulfil(&self, content: &dyn ContentService) -> Reply {
        match &self.request {
            Request::Question { subject } => Reply::Question(content.request_question(subject).await),
            Request::Explanation { query } => {
                Reply::Explanation(content.request_explanation(query).await)
            }
        }
    }
}
