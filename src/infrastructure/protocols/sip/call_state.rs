//! Dialog State Machine
//!
//! State of one outbound call attempt, from the first INVITE to the end of
//! playout. `Terminated` and `Failed` are terminal: once there, every event
//! is rejected and a new call needs a new session.

use std::fmt;
use thiserror::Error;

/// Dialog State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogState {
    /// Nothing sent yet
    #[default]
    Idle,
    /// INVITE on the wire, waiting for a response
    InviteSent,
    /// 401/407 received, building the authenticated retry
    Authenticating,
    /// 1xx received
    Ringing,
    /// 2xx received and ACKed
    Answered,
    /// RTP flowing
    Streaming,
    /// Call ended normally
    Terminated,
    /// Call never connected, or signaling broke
    Failed,
}

impl DialogState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DialogState::Terminated | DialogState::Failed)
    }

    /// Whether media may be sent in this state
    pub fn is_answered(&self) -> bool {
        matches!(self, DialogState::Answered | DialogState::Streaming)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DialogState::Idle => "Idle",
            DialogState::InviteSent => "InviteSent",
            DialogState::Authenticating => "Authenticating",
            DialogState::Ringing => "Ringing",
            DialogState::Answered => "Answered",
            DialogState::Streaming => "Streaming",
            DialogState::Terminated => "Terminated",
            DialogState::Failed => "Failed",
        }
    }

    /// Next state for `event`, or an error if the event makes no sense here
    pub fn transition(self, event: DialogEvent) -> Result<DialogState, InvalidTransition> {
        use DialogEvent as E;
        use DialogState as S;

        let next = match (self, event) {
            (S::Idle | S::Authenticating, E::InviteSent) => S::InviteSent,

            (S::InviteSent | S::Ringing, E::Challenged) => S::Authenticating,
            (S::InviteSent | S::Ringing, E::Provisional) => S::Ringing,
            (S::InviteSent | S::Ringing, E::Answered) => S::Answered,

            (S::Answered, E::MediaStarted) => S::Streaming,
            (S::Answered | S::Streaming, E::Ended) => S::Terminated,

            (from, E::Failed) if !from.is_terminal() => S::Failed,

            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dialog State Machine Event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogEvent {
    /// INVITE (initial or authenticated) sent
    InviteSent,
    /// 401 or 407
    Challenged,
    /// 100/180/183
    Provisional,
    /// 2xx with a usable answer
    Answered,
    /// Streamer started
    MediaStarted,
    /// Playout finished or BYE exchanged
    Ended,
    /// Any failure outcome
    Failed,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid dialog transition from {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: DialogState,
    pub event: DialogEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: &[DialogEvent]) -> Result<DialogState, InvalidTransition> {
        events
            .iter()
            .try_fold(DialogState::Idle, |state, &event| state.transition(event))
    }

    #[test]
    fn test_authenticated_call_flow() {
        use DialogEvent::*;
        let state = run(&[
            InviteSent,
            Challenged,
            InviteSent,
            Provisional,
            Provisional,
            Answered,
            MediaStarted,
            Ended,
        ])
        .unwrap();
        assert_eq!(state, DialogState::Terminated);
    }

    #[test]
    fn test_answer_without_provisional() {
        use DialogEvent::*;
        assert_eq!(run(&[InviteSent, Answered]).unwrap(), DialogState::Answered);
    }

    #[test]
    fn test_failure_from_any_live_state() {
        use DialogEvent::*;
        assert_eq!(run(&[InviteSent, Failed]).unwrap(), DialogState::Failed);
        assert_eq!(run(&[InviteSent, Provisional, Failed]).unwrap(), DialogState::Failed);
        assert_eq!(run(&[InviteSent, Answered, Failed]).unwrap(), DialogState::Failed);
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        for terminal in [DialogState::Terminated, DialogState::Failed] {
            for event in [
                DialogEvent::InviteSent,
                DialogEvent::Challenged,
                DialogEvent::Provisional,
                DialogEvent::Answered,
                DialogEvent::MediaStarted,
                DialogEvent::Ended,
                DialogEvent::Failed,
            ] {
                assert!(terminal.transition(event).is_err(), "{} accepted {:?}", terminal, event);
            }
        }
    }

    #[test]
    fn test_no_media_before_answer() {
        use DialogEvent::*;
        let err = run(&[InviteSent, Provisional, MediaStarted]).unwrap_err();
        assert_eq!(err.from, DialogState::Ringing);
        assert!(run(&[MediaStarted]).is_err());
    }
}
