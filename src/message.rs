//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. Event tags are kebab-case
//! and payload fields camelCase on the wire.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with kebab-case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Announce a display name (required before messaging)
    Join { username: String },
    /// Send a chat message to everyone
    Message { message: String },
    /// Indicate typing started
    Typing,
    /// Indicate typing stopped
    StopTyping,
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with kebab-case naming.
/// Timestamps are generated by the hub, never taken from the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Connection successful, session ID issued
    Connected { session_id: String },
    /// A user announced their name
    UserJoined {
        username: String,
        user_id: String,
        timestamp: String,
    },
    /// Snapshot of everyone currently joined, sent to the joiner only
    UserList { users: Vec<String> },
    /// Chat message, echoed to all sessions including the sender
    Message {
        username: String,
        message: String,
        user_id: String,
        timestamp: String,
    },
    /// Another user is typing
    UserTyping { username: String },
    /// Another user stopped typing
    UserStopTyping,
    /// A user disconnected
    UserLeft {
        username: String,
        user_id: String,
        timestamp: String,
    },
}

/// Current time as an RFC 3339 UTC string with millisecond precision
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
