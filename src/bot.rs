//! Telegram front end.
//!
//! Text messages and inline keyboard presses are turned into session events;
//! whatever the session appended is then sent to the chat. Placeholders are
//! sent as-is and edited in place once the content service answers.

use std::{collections::HashMap, error::Error, sync::Arc};

use teloxide::{
    dispatching::UpdateHandler,
    prelude::*,
    types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    utils::{command::BotCommands, html},
};
use tokio::sync::Mutex;

use crate::chat::{self, texts, MessageId, Mode, PendingRequest, Rejected, Request, Session};
use crate::quiz::{ai_helper::ContentService, Question};

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// One session per chat. The lock is only held while the session is being
/// read or changed, never while waiting on the content service.
pub type Sessions = Arc<Mutex<HashMap<ChatId, Session>>>;

/// Telegram refuses longer messages.
const MAX_MESSAGE_CHARS: usize = 4096;

const OPTION_PREFIX: &str = "option:";
const SUBJECT_PREFIX: &str = "subject:";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start a new conversation.")]
    Start,
    #[command(description = "show what I can do.")]
    Help,
}

pub fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    let command_handler = teloxide::filter_command::<Command, _>().endpoint(on_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::endpoint(on_text));

    let callback_handler = Update::filter_callback_query().endpoint(on_callback);

    dptree::entry()
        .branch(message_handler)
        .branch(callback_handler)
}

/// Session changes the chat has not seen yet.
struct Outcome {
    fresh: Vec<chat::Message>,
    pending: Option<PendingRequest>,
    show_subject_picker: bool,
}

impl Outcome {
    /// Everything the bot said after message `seen`.
    fn collect(session: &Session, seen: MessageId, pending: Option<PendingRequest>) -> Self {
        Self {
            // The user's own messages are already on screen.
            fresh: session
                .messages()
                .iter()
                .filter(|m| m.id > seen && m.sender == chat::Sender::Bot)
                .cloned()
                .collect(),
            show_subject_picker: pending.is_none() && session.mode() == Mode::SubjectSelection,
            pending,
        }
    }
}

enum Callback<'a> {
    /// A pick on the buttons of the question held in session message
    /// `question`.
    Option { question: MessageId, label: &'a str },
    Subject(&'static str),
}

fn parse_callback(data: &str) -> Option<Callback<'_>> {
    if let Some(rest) = data.strip_prefix(OPTION_PREFIX) {
        let (question, label) = rest.split_once(':')?;
        let question = question.parse().ok()?;
        return Some(Callback::Option { question, label });
    }
    let index: usize = data.strip_prefix(SUBJECT_PREFIX)?.parse().ok()?;
    texts::SUBJECTS.get(index).copied().map(Callback::Subject)
}

async fn on_command(bot: Bot, msg: Message, cmd: Command, sessions: Sessions) -> HandlerResult {
    match cmd {
        Command::Start => {
            let hint = {
                let mut sessions = sessions.lock().await;
                let busy_hint = sessions
                    .get(&msg.chat.id)
                    .filter(|session| session.is_busy())
                    .map(Session::input_hint);
                if busy_hint.is_none() {
                    sessions.insert(msg.chat.id, Session::started());
                }
                busy_hint
            };
            match hint {
                Some(hint) => bot.send_message(msg.chat.id, hint).await?,
                None => send_text(&bot, msg.chat.id, &texts::greeting()).await?,
            };
        }
        Command::Help => {
            send_text(&bot, msg.chat.id, &texts::greeting()).await?;
        }
    }
    Ok(())
}

async fn on_text(
    bot: Bot,
    msg: Message,
    sessions: Sessions,
    content: Arc<dyn ContentService>,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please send your question as text.")
            .await?;
        return Ok(());
    };
    let chat_id = msg.chat.id;

    let outcome = {
        let mut sessions = sessions.lock().await;
        let seen = sessions.get(&chat_id).map_or(0, Session::last_message_id);
        let session = sessions.entry(chat_id).or_insert_with(Session::started);

        match session.submit_text(text) {
            Ok(pending) => Outcome::collect(session, seen, pending),
            Err(Rejected::Busy) => {
                let hint = session.input_hint();
                drop(sessions);
                bot.send_message(chat_id, hint).await?;
                return Ok(());
            }
            Err(err) => {
                log::debug!("Ignoring text in chat {chat_id}: {err}");
                return Ok(());
            }
        }
    };

    deliver(&bot, chat_id, outcome, &sessions, content.as_ref()).await
}

async fn on_callback(
    bot: Bot,
    q: CallbackQuery,
    sessions: Sessions,
    content: Arc<dyn ContentService>,
) -> HandlerResult {
    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let chat_id = message.chat.id;

    match parse_callback(data) {
        Some(Callback::Option { question, label }) => {
            let answered = {
                let mut sessions = sessions.lock().await;
                sessions.get_mut(&chat_id).and_then(|session| {
                    let feedback = session.select_option(question, label)?;
                    let text = session.message(feedback)?.text.clone();
                    let quiz = session.current_quiz()?.clone();
                    Some((text, quiz))
                })
            };
            bot.answer_callback_query(q.id.clone()).await?;

            if let Some((feedback, quiz)) = answered {
                bot.edit_message_reply_markup(chat_id, message.id)
                    .reply_markup(options_keyboard(&quiz, question))
                    .await?;
                send_text(&bot, chat_id, &feedback).await?;
            }
        }
        Some(Callback::Subject(subject)) => {
            let picked = {
                let mut sessions = sessions.lock().await;
                let seen = sessions.get(&chat_id).map_or(0, Session::last_message_id);
                let session = sessions.entry(chat_id).or_insert_with(Session::started);
                session
                    .select_subject(subject)
                    .map(|pending| Outcome::collect(session, seen, Some(pending)))
                    .map_err(|err| (err, session.input_hint()))
            };

            match picked {
                Ok(outcome) => {
                    bot.answer_callback_query(q.id.clone()).await?;
                    deliver(&bot, chat_id, outcome, &sessions, content.as_ref()).await?;
                }
                Err((err, hint)) => {
                    log::debug!("Subject pick rejected in chat {chat_id}: {err}");
                    bot.answer_callback_query(q.id.clone()).text(hint).await?;
                }
            }
        }
        None => {
            log::warn!("Unexpected callback data {data:?}");
            bot.answer_callback_query(q.id.clone()).await?;
        }
    }
    Ok(())
}

/// Sends the fresh messages, then, if a request is pending, waits for the
/// content service and edits the placeholder with the result.
///
/// The reply is folded into the session even when sending fails, so a
/// Telegram hiccup cannot leave the session busy.
async fn deliver(
    bot: &Bot,
    chat_id: ChatId,
    outcome: Outcome,
    sessions: &Sessions,
    content: &dyn ContentService,
) -> HandlerResult {
    let mut placeholder_message = None;
    let mut rendered: HandlerResult = Ok(());

    for message in &outcome.fresh {
        match send_text(bot, chat_id, &message.text).await {
            Ok(sent) if message.is_loading => placeholder_message = Some(sent.id),
            Ok(_) => {}
            Err(err) => {
                rendered = Err(err);
                break;
            }
        }
    }
    if rendered.is_ok() && outcome.show_subject_picker {
        if let Err(err) = bot
            .send_message(chat_id, texts::SUBJECT_PICKER_TITLE)
            .reply_markup(subject_keyboard())
            .await
        {
            rendered = Err(err.into());
        }
    }

    let Some(pending) = outcome.pending else {
        return rendered;
    };

    // Nice to have; losing it costs nothing.
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let reply = pending.fulfil(content).await;
    let asked_for_question = matches!(pending.request, Request::Question { .. });
    let placeholder = pending.placeholder;

    let resolved = {
        let mut sessions = sessions.lock().await;
        sessions.get_mut(&chat_id).map(|session| {
            session.complete(pending, reply);
            let text = match session.message(placeholder) {
                Some(message) => {
                    log::debug!("Placeholder {placeholder} resolved at {}", message.timestamp);
                    message.text.clone()
                }
                None => String::new(),
            };
            let quiz = session
                .current_quiz()
                .filter(|q| asked_for_question && !q.is_answered)
                .cloned();
            (text, quiz)
        })
    };
    rendered?;

    let Some((text, quiz)) = resolved else {
        log::warn!("Session for chat {chat_id} vanished while waiting for content");
        return Ok(());
    };
    let keyboard = quiz.as_ref().map(|quiz| options_keyboard(quiz, placeholder));
    let mut chunks = split_message(&to_html(&text)).into_iter();
    let first = chunks.next().unwrap_or_default();

    match placeholder_message {
        Some(message_id) => {
            let edit = bot
                .edit_message_text(chat_id, message_id, first)
                .parse_mode(ParseMode::Html);
            match keyboard {
                Some(keyboard) => edit.reply_markup(keyboard).await?,
                None => edit.await?,
            };
        }
        None => {
            let send = bot.send_message(chat_id, first).parse_mode(ParseMode::Html);
            match keyboard {
                Some(keyboard) => send.reply_markup(keyboard).await?,
                None => send.await?,
            };
        }
    }
    for chunk in chunks {
        bot.send_message(chat_id, chunk)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}

/// Sends `text` as HTML, split as needed. Returns the last message sent.
async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) -> Result<Message, Box<dyn Error + Send + Sync>> {
    let mut last = None;
    for chunk in split_message(&to_html(text)) {
        last = Some(
            bot.send_message(chat_id, chunk)
                .parse_mode(ParseMode::Html)
                .await?,
        );
    }
    last.ok_or_else(|| "nothing to send".into())
}

/// Escapes session text for Telegram's HTML mode and turns a trailing
/// sources list into links.
fn to_html(text: &str) -> String {
    let Some((body, list)) = text.rsplit_once(chat::SOURCES_HEADING) else {
        return html::escape(text);
    };
    let links: Option<Vec<String>> = list.lines().map(source_link).collect();
    match links {
        Some(links) => format!(
            "{}\n\n{}\n{}",
            html::escape(body),
            html::bold("Sources:"),
            links.join("\n")
        ),
        None => html::escape(text),
    }
}

/// `N. [title](uri)` as an HTML list line.
fn source_link(line: &str) -> Option<String> {
    let (number, rest) = line.split_once(". [")?;
    number.parse::<usize>().ok()?;
    let (title, uri) = rest.strip_suffix(')')?.rsplit_once("](")?;
    Some(format!(
        "{number}. <a href=\"{}\">{}</a>",
        html::escape(uri).replace('"', "&quot;"),
        html::escape(title)
    ))
}

/// Cuts `text` into messages Telegram accepts, at a line break where one
/// is close enough so that HTML tags stay whole.
fn split_message(text: &str) -> Vec<String> {
    let all: Vec<char> = text.chars().collect();
    if all.is_empty() {
        return vec![String::new()];
    }
    let mut chars = all.as_slice();
    let mut chunks = Vec::new();
    while chars.len() > MAX_MESSAGE_CHARS {
        match chars[..MAX_MESSAGE_CHARS]
            .iter()
            .rposition(|&c| c == '\n')
            .filter(|&at| at > 0)
        {
            Some(newline) => {
                chunks.push(chars[..newline].iter().collect());
                chars = &chars[newline + 1..];
            }
            None => {
                chunks.push(chars[..MAX_MESSAGE_CHARS].iter().collect());
                chars = &chars[MAX_MESSAGE_CHARS..];
            }
        }
    }
    chunks.push(chars.iter().collect());
    chunks
}

fn options_keyboard(quiz: &Question, question: MessageId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(quiz.options.iter().map(|option| {
        let mark = if !quiz.is_answered {
            ""
        } else if option.id == quiz.correct_answer_id {
            "✅ "
        } else if quiz.selected_option_id.as_deref() == Some(option.id.as_str()) {
            "❌ "
        } else {
            ""
        };
        vec![InlineKeyboardButton::callback(
            format!("{mark}{}. {}", option.id, option.text),
            format!("{OPTION_PREFIX}{question}:{}", option.id),
        )]
    }))
}

fn subject_keyboard() -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = texts::SUBJECTS
        .iter()
        .enumerate()
        .map(|(index, subject)| {
            InlineKeyboardButton::callback(*subject, format!("{SUBJECT_PREFIX}{index}"))
        })
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(2).map(|row| row.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Source;
    use crate::quiz::sample_question;
    use teloxide::types::InlineKeyboardButtonKind;

    fn labels(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .map(|button| button.text.clone())
            .collect()
    }

    fn button_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn long_text_is_split_on_chars() {
        let text = "é".repeat(MAX_MESSAGE_CHARS + 10);
        let chunks = split_message(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(chunks[1].chars().count(), 10);
        assert_eq!(split_message("short"), vec!["short".to_string()]);
    }

    #[test]
    fn long_text_prefers_line_breaks() {
        let first = "a".repeat(MAX_MESSAGE_CHARS - 5);
        let text = format!("{first}\n<a href=\"x\">link</a>");
        let chunks = split_message(&text);

        assert_eq!(chunks, vec![first, "<a href=\"x\">link</a>".to_string()]);
    }

    #[test]
    fn html_escapes_model_text() {
        assert_eq!(to_html("1 < 2 & 3 > 2"), "1 &lt; 2 &amp; 3 &gt; 2");
    }

    #[test]
    fn sources_become_links() {
        let text = chat::with_sources(
            "Use <b>care</b>.",
            &[
                Source::new("https://a.example/?q=1&r=2", "A & B"),
                Source::new("https://b.example", "[Draft] notes"),
            ],
        );

        assert_eq!(
            to_html(&text),
            "Use &lt;b&gt;care&lt;/b&gt;.\n\n<b>Sources:</b>\n\
             1. <a href=\"https://a.example/?q=1&amp;r=2\">A &amp; B</a>\n\
             2. <a href=\"https://b.example\">[Draft] notes</a>"
        );
    }

    #[test]
    fn unparsable_sources_are_left_as_text() {
        let text = "Answer.\n\n**Sources:**\nsee the textbook";
        assert_eq!(to_html(text), text);
    }

    #[test]
    fn callback_data() {
        assert!(matches!(
            parse_callback("option:12:B"),
            Some(Callback::Option { question: 12, label: "B" })
        ));
        assert!(parse_callback("option:B").is_none());
        assert!(parse_callback("option:x:B").is_none());
        assert!(matches!(
            parse_callback("subject:2"),
            Some(Callback::Subject("Physics"))
        ));
        assert!(parse_callback("subject:99").is_none());
        assert!(parse_callback("subject:x").is_none());
        assert!(parse_callback("something").is_none());
    }

    #[test]
    fn option_buttons_mark_the_outcome() {
        let mut quiz = sample_question();
        assert_eq!(
            labels(&options_keyboard(&quiz, 7)),
            vec!["A. 3", "B. 5", "C. 4", "D. 22"]
        );

        quiz.answer("B");
        assert_eq!(
            labels(&options_keyboard(&quiz, 7)),
            vec!["A. 3", "❌ B. 5", "✅ C. 4", "D. 22"]
        );
    }

    #[test]
    fn option_buttons_name_their_question() {
        let keyboard = options_keyboard(&sample_question(), 7);
        let data: Vec<_> = button_data(&keyboard);

        assert_eq!(data, vec!["option:7:A", "option:7:B", "option:7:C", "option:7:D"]);
        assert!(data.iter().all(|d| d.len() <= 64));
    }

    #[test]
    fn subject_picker_covers_every_subject() {
        let keyboard = subject_keyboard();
        assert_eq!(labels(&keyboard), texts::SUBJECTS.to_vec());
        assert!(keyboard.inline_keyboard.iter().all(|row| row.len() <= 2));

        let data = button_data(&keyboard);
        assert_eq!(data[0], "subject:0");
        assert_eq!(data[9], "subject:9");
    }

    #[test]
    fn outcome_skips_user_messages_and_offers_picker() {
        let mut session = Session::started();
        let seen = session.last_message_id();
        let pending = session.submit_text("quiz").unwrap();

        let outcome = Outcome::collect(&session, seen, pending);

        assert_eq!(outcome.fresh.len(), 1);
        assert_eq!(outcome.fresh[0].text, texts::PICK_SUBJECT);
        assert!(outcome.show_subject_picker);
        assert!(outcome.pending.is_none());
    }

    #[test]
    fn new_session_outcome_includes_greeting() {
        let mut session = Session::started();
        let pending = session.submit_text("what is a verb").unwrap();

        let outcome = Outcome::collect(&session, 0, pending);

        assert_eq!(outcome.fresh.len(), 2);
        assert_eq!(outcome.fresh[0].text, texts::greeting());
        assert!(outcome.fresh[1].is_loading);
        assert!(!outcome.show_subject_picker);
        assert_eq!(
            outcome.pending.map(|p| p.placeholder),
            Some(outcome.fresh[1].id)
        );
    }
}
