//! Voice session management
//!
//! The session controller sequences one open-to-close conversation: welcome,
//! listening windows, backend round-trips, spoken replies, and bounded
//! recovery when anything in that chain fails.

mod controller;
mod retry;
mod state;
mod transcript;

pub use controller::{SessionController, SessionOptions, REARM_DELAY};
pub use retry::RecoveryPolicy;
pub use state::{transition, SessionEvent, SessionState};
pub use transcript::{ConversationTurn, Speaker, TEXT_APOLOGY, VOICE_APOLOGY};
