//! Session state machine
//!
//! The transition function is pure and total: every (state, event) pair maps
//! to exactly one next state, with unmatched pairs keeping the current state.
//! The controller owns the side effects; this module owns the shape of the
//! conversation loop.

use serde::Serialize;

/// UI-observable state of an assistant session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No activity; the session may be closed or between turns
    Idle,
    /// Playing the per-session welcome utterance
    Welcoming,
    /// Recording window open, waiting for the user to speak
    Listening,
    /// A backend round-trip is in flight
    Thinking,
    /// Playing the assistant's reply
    Speaking,
    /// A turn failed; recovery is scheduled
    Error,
}

/// Everything that can advance a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session opened; `welcome` says whether a welcome utterance is configured
    Opened {
        /// Welcome utterance configured for this session
        welcome: bool,
    },
    /// Welcome playback ended (or was skipped)
    WelcomeFinished,
    /// Recording window closed with usable audio
    ClipCaptured,
    /// Recording window closed with nothing usable; silence is not an error
    ClipEmpty,
    /// Re-open the recording window after an idle pause
    Rearm,
    /// Typed text accepted for a turn
    TextSubmitted,
    /// Backend reply arrived
    ReplyReceived,
    /// Reply playback ended (or was skipped while muted)
    PlaybackFinished,
    /// Backend or transport failure
    ServiceFailed,
    /// Recovery delay elapsed
    Recovered,
    /// Close requested
    Closed,
}

/// Compute the next state for an event
///
/// `voice_mode` selects the continuous-loop targets (back to `Listening`)
/// over the single-shot targets (back to `Idle`).
#[must_use]
pub const fn transition(state: SessionState, event: SessionEvent, voice_mode: bool) -> SessionState {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (S::Idle, E::Opened { welcome: true }) => S::Welcoming,
        (S::Idle, E::Opened { welcome: false }) | (S::Welcoming, E::WelcomeFinished) => {
            if voice_mode {
                S::Listening
            } else {
                S::Idle
            }
        }
        (S::Listening, E::ClipCaptured) | (S::Idle | S::Error, E::TextSubmitted) => S::Thinking,
        (S::Listening, E::ClipEmpty) | (S::Error, E::Recovered) => S::Idle,
        (S::Idle, E::Rearm) => S::Listening,
        (S::Thinking, E::ReplyReceived) => S::Speaking,
        (S::Speaking, E::PlaybackFinished) => {
            if voice_mode {
                S::Listening
            } else {
                S::Idle
            }
        }
        (_, E::ServiceFailed) => S::Error,
        (_, E::Closed) => S::Idle,
        // Anything else is a stale or out-of-order event; hold position
        _ => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [SessionState; 6] = [
        SessionState::Idle,
        SessionState::Welcoming,
        SessionState::Listening,
        SessionState::Thinking,
        SessionState::Speaking,
        SessionState::Error,
    ];

    #[test]
    fn open_with_welcome_goes_through_welcoming() {
        let s = transition(SessionState::Idle, SessionEvent::Opened { welcome: true }, true);
        assert_eq!(s, SessionState::Welcoming);
        assert_eq!(
            transition(s, SessionEvent::WelcomeFinished, true),
            SessionState::Listening
        );
    }

    #[test]
    fn open_without_welcome_listens_directly() {
        assert_eq!(
            transition(SessionState::Idle, SessionEvent::Opened { welcome: false }, true),
            SessionState::Listening
        );
    }

    #[test]
    fn text_mode_settles_in_idle_after_welcome() {
        let s = transition(SessionState::Idle, SessionEvent::Opened { welcome: true }, false);
        assert_eq!(
            transition(s, SessionEvent::WelcomeFinished, false),
            SessionState::Idle
        );
    }

    #[test]
    fn voice_turn_cycle() {
        let mut s = SessionState::Listening;
        s = transition(s, SessionEvent::ClipCaptured, true);
        assert_eq!(s, SessionState::Thinking);
        s = transition(s, SessionEvent::ReplyReceived, true);
        assert_eq!(s, SessionState::Speaking);
        s = transition(s, SessionEvent::PlaybackFinished, true);
        assert_eq!(s, SessionState::Listening);
    }

    #[test]
    fn single_shot_turn_returns_to_idle() {
        let mut s = transition(SessionState::Idle, SessionEvent::TextSubmitted, false);
        assert_eq!(s, SessionState::Thinking);
        s = transition(s, SessionEvent::ReplyReceived, false);
        s = transition(s, SessionEvent::PlaybackFinished, false);
        assert_eq!(s, SessionState::Idle);
    }

    #[test]
    fn empty_clip_rearms_through_idle() {
        let s = transition(SessionState::Listening, SessionEvent::ClipEmpty, true);
        assert_eq!(s, SessionState::Idle);
        assert_eq!(transition(s, SessionEvent::Rearm, true), SessionState::Listening);
    }

    #[test]
    fn failure_recovers_through_idle() {
        let s = transition(SessionState::Thinking, SessionEvent::ServiceFailed, true);
        assert_eq!(s, SessionState::Error);
        let s = transition(s, SessionEvent::Recovered, true);
        assert_eq!(s, SessionState::Idle);
        assert_eq!(transition(s, SessionEvent::Rearm, true), SessionState::Listening);
    }

    #[test]
    fn close_reaches_idle_from_everywhere() {
        for state in ALL_STATES {
            for voice_mode in [false, true] {
                assert_eq!(
                    transition(state, SessionEvent::Closed, voice_mode),
                    SessionState::Idle
                );
            }
        }
    }

    #[test]
    fn error_state_is_never_a_dead_end() {
        // From Error, either recovery or close must make progress
        for voice_mode in [false, true] {
            assert_ne!(
                transition(SessionState::Error, SessionEvent::Recovered, voice_mode),
                SessionState::Error
            );
            assert_eq!(
                transition(SessionState::Error, SessionEvent::Closed, voice_mode),
                SessionState::Idle
            );
        }
    }

    #[test]
    fn out_of_order_events_hold_position() {
        // A reply landing outside Thinking must not move the machine
        assert_eq!(
            transition(SessionState::Idle, SessionEvent::ReplyReceived, true),
            SessionState::Idle
        );
        assert_eq!(
            transition(SessionState::Listening, SessionEvent::PlaybackFinished, true),
            SessionState::Listening
        );
    }
}
