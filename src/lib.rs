//! Broadcast WebSocket Chat Relay Library
//!
//! A chat relay built with tokio-tungstenite using the Actor pattern
//! for state management. Every connected client shares a single global
//! broadcast domain: there are no rooms, no persistence, and no history.
//!
//! # Features
//! - WebSocket connection handling
//! - Display name announcement (join)
//! - Real-time chat messaging, echoed to all clients including the sender
//! - User list snapshot for newly joined clients
//! - Typing indicators, sent to everyone except the typist
//! - Disconnection handling with departure announcements
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` is the central actor owning the session registry
//! - Each connection has a `handler` task communicating with the hub
//! - No locks needed - all state access goes through message passing
//! - Fan-out never blocks on a recipient: a session whose outbound buffer
//!   is full is treated as disconnected
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_relay::{Hub, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(Hub::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use hub::{Hub, HubCommand};
pub use message::{ClientMessage, ServerMessage};
pub use session::{Session, SessionState};
pub use types::SessionId;
