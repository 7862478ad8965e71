//! Conversation log and the transcript rendering policy.
//!
//! An AI message is highlighted with the keywords of the closest user message
//! before it. User messages, and AI messages with no question before them,
//! render as plain text.

use serde::{Deserialize, Serialize};

use crate::highlight::{highlight_text, Segment};
use crate::keywords::extract_keywords;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
        }
    }
}

/// One entry of the conversation. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Ai,
            text: text.into(),
        }
    }
}

/// Append-only, chronologically ordered message history of one session.
///
/// Senders are not forced to alternate: a failed answer is followed by an AI
/// apology, and the next answer may follow it directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Message::user(text));
    }

    pub fn push_ai(&mut self, text: impl Into<String>) {
        self.push(Message::ai(text));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned snapshot, for handing to code that outlives the borrow.
    pub fn history(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages (new upload or explicit reset).
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Render the whole log with highlighting applied.
    pub fn render(&self) -> Vec<RenderedMessage> {
        render_transcript(&self.messages)
    }
}

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub sender: Sender,
    pub text: String,
    pub segments: Vec<Segment>,
}

/// Text of the nearest user message strictly before `index`, if any.
pub fn last_user_question_before(messages: &[Message], index: usize) -> Option<&str> {
    messages[..index.min(messages.len())]
        .iter()
        .rev()
        .find(|m| m.sender == Sender::User)
        .map(|m| m.text.as_str())
}

/// Apply the rendering policy to every message of a conversation snapshot.
pub fn render_transcript(messages: &[Message]) -> Vec<RenderedMessage> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let segments = match message.sender {
                Sender::User => vec![Segment::plain(&message.text)],
                Sender::Ai => match last_user_question_before(messages, index) {
                    Some(question) => highlight_text(&message.text, &extract_keywords(question)),
                    None => vec![Segment::plain(&message.text)],
                },
            };
            RenderedMessage {
                sender: message.sender,
                text: message.text.clone(),
                segments,
            }
        })
        .collect()
}
