//! Error types for the chat relay
//!
//! Defines transport-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.
//!
//! There are no business-error variants: events referencing an unknown
//! session or arriving before a join are silent no-ops, never surfaced
//! to any client.

use thiserror::Error;

/// Transport-level errors for the connection handler path
///
/// All of these are fatal for the affected connection only; the hub
/// and every other connection keep running.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Per-session delivery errors
///
/// Either outcome means the recipient is treated as disconnected.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    Closed,

    /// The session's outbound buffer is full (slow or stuck client)
    #[error("Channel full")]
    Full,
}
