//! Session struct definition
//!
//! Represents one connected client's server-side state and its
//! outbound communication channel.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::SessionId;

/// Lifecycle state of a session
///
/// A session starts `Connected` (transport open, no name yet) and moves to
/// `Joined` once when the client announces a display name. The disconnected
/// state is represented by removal from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected but not yet announced to other clients
    Connected,
    /// Announced with a display name
    Joined { username: String },
}

/// Connected client information
///
/// Holds the session's unique ID, its lifecycle state, and the bounded
/// sender feeding that client's write task.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Lifecycle state (connected vs joined)
    pub state: SessionState,
    /// Server → Client message channel
    pub sender: mpsc::Sender<ServerMessage>,
}

impl Session {
    /// Create a new session with the given ID and sender channel
    pub fn new(id: SessionId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            state: SessionState::Connected,
            sender,
        }
    }

    /// Queue a message for this session without blocking
    ///
    /// Returns an error if the channel is closed (client disconnected) or
    /// full (client not draining its buffer). Either way the caller should
    /// treat this session as gone.
    pub fn try_send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Closed(_) => SendError::Closed,
            TrySendError::Full(_) => SendError::Full,
        })
    }

    /// Get the display name, if the session has joined
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Connected => None,
            SessionState::Joined { username } => Some(username),
        }
    }

    /// Check if this session has announced a display name
    pub fn has_joined(&self) -> bool {
        matches!(self.state, SessionState::Joined { .. })
    }

    /// Transition to the joined state with the given display name
    pub fn join(&mut self, username: String) {
        self.state = SessionState::Joined { username };
    }
}
