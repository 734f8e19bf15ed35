//! Fixed bot texts and the subject list.

pub const BOT_NAME: &str = "Exam Revision Bot";

pub const SUBJECTS: [&str; 10] = [
    "Mathematics",
    "English Language",
    "Physics",
    "Chemistry",
    "Biology",
    "Economics",
    "Government",
    "Literature in English",
    "CRK (Christian Religious Knowledge)",
    "IRS (Islamic Studies)",
];

/// Case-insensitive exact lookup. Partial names do not count.
pub fn find_subject(lower_input: &str) -> Option<&'static str> {
    SUBJECTS
        .iter()
        .copied()
        .find(|subject| subject.to_lowercase() == lower_input)
}

pub fn greeting() -> String {
    format!(
        "Hello! I'm {BOT_NAME}. I'm here to help you prepare for your WAEC/NECO exams.
You can ask me to:
1. Start a quiz with multiple-choice questions (type \"quiz\" or \"start quiz\").
2. Explain a topic or answer a question you have (just type your question).

What would you like to do?"
    )
}

pub const QUIZ_PROMPT_OPTIONS: &str = "Type 'next' for another question, 'subjects' to pick a new subject, or ask any other question to switch to tutor mode.";

pub const PICK_SUBJECT: &str =
    "Great! Let's start with a quiz. Which subject would you like to focus on?";
pub const PICK_ANOTHER_SUBJECT: &str = "Okay, let's pick a different subject.";
pub const SUBJECT_PICKER_TITLE: &str = "Choose a subject for your quiz:";

pub const THINKING: &str = "Thinking...";

pub fn generating_question(subject: &str) -> String {
    format!("Okay, generating a question about {subject}...")
}

pub fn fetching_next_question(subject: &str) -> String {
    format!("Fetching next question for {subject}...")
}

pub fn not_a_subject(input: &str) -> String {
    format!(
        "I didn't recognize \"{input}\" as a subject. Let me see if I can help with that as a general question."
    )
}

pub fn feedback(is_correct: bool, correct_answer_id: &str, explanation: &str) -> String {
    let verdict = if is_correct {
        "Correct! Well done.".to_string()
    } else {
        format!("Not quite. The correct answer was {correct_answer_id}.")
    };
    format!("{verdict} \n\nExplanation: {explanation}\n\n{QUIZ_PROMPT_OPTIONS}")
}

// Apologies, one per place a request can come back empty.

pub fn question_failed(subject: &str) -> String {
    format!(
        "Sorry, I couldn't generate a question for {subject} right now. Please try another subject or ask me a question."
    )
}
pub const NEXT_QUESTION_FAILED: &str =
    "Sorry, I couldn't generate another question. Try a different subject or ask me something.";
pub const FIRST_QUERY_FAILED: &str =
    "Sorry, I encountered an issue trying to understand that. Could you try rephrasing?";
pub const SUBJECT_QUERY_FAILED: &str = "I couldn't process that as a subject or a question. Please pick a subject from the list, or ask a clear question.";
pub const QUIZ_QUERY_FAILED: &str =
    "Sorry, I couldn't process that. Try 'next', 'subjects', or ask another question.";
pub const TUTOR_QUERY_FAILED: &str =
    "Sorry, I had trouble with that request. Could you try again or ask something else?";

// Input hints

pub const HINT_BUSY: &str = "Bot is thinking...";
pub const HINT_PICK_SUBJECT: &str = "Select a subject above or type...";
pub const HINT_PICK_OPTION: &str = "Select an option above or type...";
pub const HINT_DEFAULT: &str = "Type your message or command...";
