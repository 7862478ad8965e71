//! Licita Highlight — keyword extraction, whole-word highlighting, transcript rendering.
//!
//! Every AI answer in a conversation is annotated with the significant terms of
//! the user question that preceded it. All functions here are pure and cheap
//! enough to run on every render.

pub mod highlight;
pub mod keywords;
pub mod transcript;

pub use highlight::{highlight_text, Highlighter, Segment};
pub use keywords::{extract_keywords, is_stop_word, KeywordSet, STOP_WORDS};
pub use transcript::{
    last_user_question_before, render_transcript, ConversationLog, Message, RenderedMessage,
    Sender,
};
