use std::time::{Duration, SystemTime, UNIX_EPOCH};

use wren_llm::StreamSessionId;

/// Greeting shown in a draft chat before any row exists.
pub const WELCOME_MESSAGE: &str =
    "Hello! I am your professional AI assistant. How can I help you today?";

/// Stable identifier for one on-screen message.
///
/// Local to the view: persisted rows are re-keyed when a history loads, and
/// synthetic bubbles (welcome, in-flight, errors) never had a row id at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Bot,
}

/// Lifecycle status for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Streaming(StreamSessionId),
    Done,
    Error(String),
    Cancelled,
}

/// Core on-screen message model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp_unix_seconds: u64,
    pub status: MessageStatus,
}

impl Message {
    /// Creates a message with explicit status.
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        timestamp_unix_seconds: u64,
        status: MessageStatus,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp_unix_seconds,
            status,
        }
    }

    /// Creates a user message awaiting row persistence.
    pub fn user_pending(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content, unix_now_seconds(), MessageStatus::Pending)
    }

    /// Creates the bot placeholder for an in-flight streamed response.
    pub fn bot_streaming(id: MessageId, session_id: StreamSessionId) -> Self {
        Self::new(
            id,
            Role::Bot,
            String::new(),
            unix_now_seconds(),
            MessageStatus::Streaming(session_id),
        )
    }

    /// Creates the bot placeholder rendered as a typing indicator while a
    /// single-shot generate call is in flight.
    pub fn bot_pending(id: MessageId) -> Self {
        Self::new(id, Role::Bot, String::new(), unix_now_seconds(), MessageStatus::Pending)
    }

    /// Creates the draft-state greeting bubble.
    pub fn welcome(id: MessageId) -> Self {
        Self::new(
            id,
            Role::Bot,
            WELCOME_MESSAGE,
            unix_now_seconds(),
            MessageStatus::Done,
        )
    }
}

pub fn unix_now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Stream state boundary for send orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming(StreamSessionId),
    Done(StreamSessionId),
    Error {
        session_id: StreamSessionId,
        message: String,
    },
    Cancelled(StreamSessionId),
}

/// State transition input for the send lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Start(StreamSessionId),
    Complete(StreamSessionId),
    Fail {
        session_id: StreamSessionId,
        message: String,
    },
    Cancel(StreamSessionId),
    ResetToIdle,
}

/// Rejection reason for illegal stream transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyStreaming {
        active: StreamSessionId,
        attempted: StreamSessionId,
    },
    NoActiveStream,
    SessionMismatch {
        active: StreamSessionId,
        attempted: StreamSessionId,
    },
}

/// Result type for stream transition application.
pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    /// Returns the active session if and only if state is `Streaming`.
    pub fn active_session(&self) -> Option<StreamSessionId> {
        match self {
            Self::Streaming(session_id) => Some(*session_id),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => None,
        }
    }

    /// Returns true when incoming stream data matches the active session.
    pub fn accepts_stream_event(&self, session_id: StreamSessionId) -> bool {
        matches!(self, Self::Streaming(active) if *active == session_id)
    }

    /// Applies one transition deterministically.
    ///
    /// Non-streaming states may start a new session directly. Any terminal
    /// transition (`Complete`/`Fail`/`Cancel`) must match the currently
    /// active session exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Start(session_id) => self.apply_start(session_id),
            StreamTransition::Complete(session_id) => self.apply_complete(session_id),
            StreamTransition::Fail {
                session_id,
                message,
            } => self.apply_fail(session_id, message),
            StreamTransition::Cancel(session_id) => self.apply_cancel(session_id),
            StreamTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn apply_start(&self, session_id: StreamSessionId) -> StreamTransitionResult {
        match self {
            Self::Streaming(active) if *active != session_id => {
                Err(StreamTransitionRejection::AlreadyStreaming {
                    active: *active,
                    attempted: session_id,
                })
            }
            Self::Streaming(_) => Ok(self.clone()),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => {
                Ok(Self::Streaming(session_id))
            }
        }
    }

    fn apply_complete(&self, session_id: StreamSessionId) -> StreamTransitionResult {
        match self {
            Self::Streaming(active) if *active == session_id => Ok(Self::Done(session_id)),
            Self::Streaming(active) => Err(StreamTransitionRejection::SessionMismatch {
                active: *active,
                attempted: session_id,
            }),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => {
                Err(StreamTransitionRejection::NoActiveStream)
            }
        }
    }

    fn apply_fail(&self, session_id: StreamSessionId, message: String) -> StreamTransitionResult {
        match self {
            Self::Streaming(active) if *active == session_id => Ok(Self::Error {
                session_id,
                message,
            }),
            Self::Streaming(active) => Err(StreamTransitionRejection::SessionMismatch {
                active: *active,
                attempted: session_id,
            }),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => {
                Err(StreamTransitionRejection::NoActiveStream)
            }
        }
    }

    fn apply_cancel(&self, session_id: StreamSessionId) -> StreamTransitionResult {
        match self {
            Self::Streaming(active) if *active == session_id => Ok(Self::Cancelled(session_id)),
            Self::Streaming(active) => Err(StreamTransitionRejection::SessionMismatch {
                active: *active,
                attempted: session_id,
            }),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => {
                Err(StreamTransitionRejection::NoActiveStream)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(raw: u64) -> StreamSessionId {
        StreamSessionId::new(raw)
    }

    #[test]
    fn idle_accepts_start_and_streaming_accepts_matching_terminals() {
        let state = StreamState::Idle;
        let streaming = state.apply(StreamTransition::Start(session(1))).unwrap();
        assert_eq!(streaming, StreamState::Streaming(session(1)));
        assert!(streaming.accepts_stream_event(session(1)));
        assert!(!streaming.accepts_stream_event(session(2)));

        let done = streaming
            .apply(StreamTransition::Complete(session(1)))
            .unwrap();
        assert_eq!(done, StreamState::Done(session(1)));
        assert_eq!(done.active_session(), None);
    }

    #[test]
    fn terminal_transitions_require_an_active_stream() {
        let rejection = StreamState::Idle
            .apply(StreamTransition::Complete(session(1)))
            .unwrap_err();
        assert_eq!(rejection, StreamTransitionRejection::NoActiveStream);

        let rejection = StreamState::Done(session(1))
            .apply(StreamTransition::Cancel(session(1)))
            .unwrap_err();
        assert_eq!(rejection, StreamTransitionRejection::NoActiveStream);
    }

    #[test]
    fn mismatched_sessions_are_rejected() {
        let streaming = StreamState::Streaming(session(1));

        let rejection = streaming
            .apply(StreamTransition::Complete(session(2)))
            .unwrap_err();
        assert_eq!(
            rejection,
            StreamTransitionRejection::SessionMismatch {
                active: session(1),
                attempted: session(2),
            }
        );

        let rejection = streaming
            .apply(StreamTransition::Start(session(2)))
            .unwrap_err();
        assert_eq!(
            rejection,
            StreamTransitionRejection::AlreadyStreaming {
                active: session(1),
                attempted: session(2),
            }
        );
    }

    #[test]
    fn restart_with_the_same_session_is_idempotent() {
        let streaming = StreamState::Streaming(session(3));
        assert_eq!(
            streaming.apply(StreamTransition::Start(session(3))).unwrap(),
            streaming
        );
    }

    #[test]
    fn failed_streams_can_start_again() {
        let failed = StreamState::Error {
            session_id: session(4),
            message: "boom".to_string(),
        };
        assert_eq!(
            failed.apply(StreamTransition::Start(session(5))).unwrap(),
            StreamState::Streaming(session(5))
        );
    }
}
