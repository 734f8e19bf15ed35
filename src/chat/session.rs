use chrono::Utc;
use thiserror::Error;

use super::texts::{self, find_subject};
use super::{with_sources, Message, MessageId, Mode, PendingRequest, Reply, Request, Sender};
use crate::quiz::Question;

/// Older messages are dropped past this many. Only the newest ones and the
/// live placeholder are ever read back.
pub const MAX_HISTORY: usize = 100;

/// Why an event was turned away without touching the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejected {
    #[error("still waiting for the previous answer")]
    Busy,
    #[error("nothing to send")]
    Empty,
    #[error("unknown subject {0:?}")]
    UnknownSubject(String),
}

/// One conversation.
///
/// Every event goes through here. Events that need the content service are
/// split in two: the first half appends a loading placeholder, marks the
/// session busy and hands back a [`PendingRequest`]; [`Session::complete`]
/// folds the reply in once it arrives. While busy, new text and subject picks
/// are rejected and option picks ignored.
#[derive(Debug, Clone, Default)]
pub struct Session {
    mode: Mode,
    messages: Vec<Message>,
    current_quiz: Option<Question>,
    /// The placeholder the current question was resolved into. Option picks
    /// name it so that buttons of earlier questions stay inert.
    quiz_message: Option<MessageId>,
    selected_subject: Option<String>,
    is_busy: bool,
    next_id: MessageId,
}

impl Session {
    /// A fresh session, already past the greeting.
    pub fn started() -> Self {
        let mut session = Self::default();
        session.enter();
        session
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Id of the newest message, or 0 before anything was said.
    pub fn last_message_id(&self) -> MessageId {
        self.messages.last().map_or(0, |m| m.id)
    }

    pub fn current_quiz(&self) -> Option<&Question> {
        self.current_quiz.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.is_busy
    }

    /// What the input box should say right now.
    pub fn input_hint(&self) -> &'static str {
        if self.is_busy {
            texts::HINT_BUSY
        } else if self.mode == Mode::SubjectSelection {
            texts::HINT_PICK_SUBJECT
        } else if self.current_quiz.as_ref().is_some_and(|q| !q.is_answered) {
            texts::HINT_PICK_OPTION
        } else {
            texts::HINT_DEFAULT
        }
    }

    /// Greets on entry. Does nothing outside of [`Mode::Greeting`].
    pub fn enter(&mut self) {
        if self.mode == Mode::Greeting {
            self.push(Sender::Bot, texts::greeting(), false);
            self.mode = Mode::AwaitingChoice;
        }
    }

    pub fn submit_text(&mut self, input: &str) -> Result<Option<PendingRequest>, Rejected> {
        if self.is_busy {
            return Err(Rejected::Busy);
        }
        let input = input.trim();
        if input.is_empty() {
            return Err(Rejected::Empty);
        }
        let command = input.to_lowercase();

        self.enter();
        self.push(Sender::User, input.to_string(), false);

        let pending = match self.mode {
            Mode::Greeting | Mode::AwaitingChoice => {
                if command.contains("quiz") {
                    self.mode = Mode::SubjectSelection;
                    self.push(Sender::Bot, texts::PICK_SUBJECT.to_string(), false);
                    None
                } else {
                    Some(self.begin_explanation(input, texts::FIRST_QUERY_FAILED))
                }
            }
            Mode::SubjectSelection => match find_subject(&command) {
                Some(subject) => Some(self.begin_quiz(subject)),
                None => {
                    self.push(Sender::Bot, texts::not_a_subject(input), false);
                    Some(self.begin_explanation(input, texts::SUBJECT_QUERY_FAILED))
                }
            },
            Mode::QuizActive => match (command.as_str(), self.selected_subject.clone()) {
                ("next", Some(subject)) => Some(self.begin_request(
                    texts::fetching_next_question(&subject),
                    Request::Question { subject },
                    texts::NEXT_QUESTION_FAILED.to_string(),
                )),
                ("subjects", _) => {
                    self.mode = Mode::SubjectSelection;
                    self.clear_quiz();
                    self.push(Sender::Bot, texts::PICK_ANOTHER_SUBJECT.to_string(), false);
                    None
                }
                _ => {
                    self.clear_quiz();
                    Some(self.begin_explanation(input, texts::QUIZ_QUERY_FAILED))
                }
            },
            Mode::TutorActive => Some(self.begin_explanation(input, texts::TUTOR_QUERY_FAILED)),
        };
        Ok(pending)
    }

    /// A pick from the subject picker. Skips text parsing but otherwise acts
    /// like typing the subject's name during subject selection.
    pub fn select_subject(&mut self, subject: &str) -> Result<PendingRequest, Rejected> {
        if self.is_busy {
            return Err(Rejected::Busy);
        }
        let subject = find_subject(&subject.to_lowercase())
            .ok_or_else(|| Rejected::UnknownSubject(subject.to_string()))?;

        self.enter();
        Ok(self.begin_quiz(subject))
    }

    /// Answers the question shown in message `question`. Returns the feedback
    /// message, or `None` when there is nothing to answer: no question, an
    /// answered one, or a pick made on an earlier question's buttons.
    pub fn select_option(&mut self, question: MessageId, option_id: &str) -> Option<MessageId> {
        if self.is_busy || self.quiz_message != Some(question) {
            return None;
        }
        let quiz = self.current_quiz.as_mut()?;
        let is_correct = quiz.answer(option_id)?;
        let feedback = texts::feedback(is_correct, &quiz.correct_answer_id, &quiz.explanation);

        self.mode = Mode::QuizActive;
        Some(self.push(Sender::Bot, feedback, false))
    }

    /// Folds a reply into the placeholder it was requested for and clears
    /// the busy flag.
    pub fn complete(&mut self, pending: PendingRequest, reply: Reply) {
        let text = match reply {
            Reply::Question(Some(question)) => {
                let text = question.question_text.clone();
                self.current_quiz = Some(question);
                self.quiz_message = Some(pending.placeholder);
                text
            }
            Reply::Question(None) => {
                self.clear_quiz();
                self.mode = Mode::AwaitingChoice;
                pending.fallback
            }
            Reply::Explanation(explanation) => match explanation.text {
                Some(text) => with_sources(&text, &explanation.sources),
                None => pending.fallback,
            },
        };

        match self.messages.iter_mut().find(|m| m.id == pending.placeholder) {
            Some(message) => {
                message.text = text;
                message.is_loading = false;
                message.timestamp = Utc::now();
            }
            None => log::warn!("Placeholder {} is gone, dropping reply", pending.placeholder),
        }
        self.is_busy = false;
    }

    fn clear_quiz(&mut self) {
        self.current_quiz = None;
        self.quiz_message = None;
    }

    fn begin_quiz(&mut self, subject: &str) -> PendingRequest {
        self.selected_subject = Some(subject.to_string());
        self.mode = Mode::QuizActive;
        self.begin_request(
            texts::generating_question(subject),
            Request::Question {
                subject: subject.to_string(),
            },
            texts::question_failed(subject),
        )
    }

    fn begin_explanation(&mut self, query: &str, fallback: &str) -> PendingRequest {
        self.mode = Mode::TutorActive;
        self.begin_request(
            texts::THINKING.to_string(),
            Request::Explanation {
                query: query.to_string(),
            },
            fallback.to_string(),
        )
    }

    fn begin_request(
        &mut self,
        placeholder_text: String,
        request: Request,
        fallback: String,
    ) -> PendingRequest {
        let placeholder = self.push(Sender::Bot, placeholder_text, true);
        self.is_busy = true;
        PendingRequest {
            placeholder,
            request,
            fallback,
        }
    }

    fn push(&mut self, sender: Sender, text: String, is_loading: bool) -> MessageId {
        self.next_id += 1;
        let id = self.next_id;
        self.messages.push(Message {
            id,
            text,
            sender,
            timestamp: Utc::now(),
            is_loading,
        });
        if self.messages.len() > MAX_HISTORY {
            let excess = self.messages.len() - MAX_HISTORY;
            self.messages.drain(..excess);
        }
        id
    }
}
