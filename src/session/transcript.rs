//! Conversation transcript types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Canned apology appended when a voice turn fails
pub const VOICE_APOLOGY: &str = "I'm having trouble understanding. Could you try again?";

/// Canned apology appended when a text turn fails
pub const TEXT_APOLOGY: &str = "I'm having trouble responding right now. Please try again.";

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The journaling user
    User,
    /// The assistant
    Assistant,
}

/// One utterance in chronological conversation order
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    /// Who spoke
    pub speaker: Speaker,
    /// What was said
    pub text: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Record a turn at the current instant
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
