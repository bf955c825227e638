//! Hub actor implementation
//!
//! The central actor that owns the session registry and implements event
//! fan-out. Uses the Actor pattern with mpsc channels for message passing:
//! every registry mutation happens on this task, so no locks are needed.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::message::{iso_timestamp, ServerMessage};
use crate::session::{Session, SessionState};
use crate::types::SessionId;

/// Commands sent from connection handlers to the Hub actor
#[derive(Debug)]
pub enum HubCommand {
    /// New client connected
    Connect {
        session_id: SessionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Client announced a display name
    Join {
        session_id: SessionId,
        username: String,
    },
    /// Client sent a chat message
    Message {
        session_id: SessionId,
        message: String,
    },
    /// Client started typing
    Typing { session_id: SessionId },
    /// Client stopped typing
    StopTyping { session_id: SessionId },
    /// Client disconnected
    Disconnect { session_id: SessionId },
}

/// The Hub actor
///
/// Owns the registry, the single source of truth for who is online, and
/// processes commands from connection handlers one at a time. Events from
/// the same session are therefore delivered to every recipient in the
/// order the hub processed them.
pub struct Hub {
    /// All connected sessions: SessionId -> Session
    registry: HashMap<SessionId, Session>,
    /// Command receiver channel
    receiver: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Create a new Hub with the given command receiver
    pub fn new(receiver: mpsc::Receiver<HubCommand>) -> Self {
        Self {
            registry: HashMap::new(),
            receiver,
        }
    }

    /// Run the Hub event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Hub shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Connect { session_id, sender } => {
                self.handle_connect(session_id, sender);
            }
            HubCommand::Join { session_id, username } => {
                self.handle_join(session_id, username);
            }
            HubCommand::Message { session_id, message } => {
                self.handle_message(session_id, message);
            }
            HubCommand::Typing { session_id } => {
                self.handle_typing(session_id);
            }
            HubCommand::StopTyping { session_id } => {
                self.handle_stop_typing(session_id);
            }
            HubCommand::Disconnect { session_id } => {
                self.handle_disconnect(session_id);
            }
        }
    }

    /// Handle new client connection
    ///
    /// The session is not announced to anyone until it joins.
    fn handle_connect(&mut self, session_id: SessionId, sender: mpsc::Sender<ServerMessage>) {
        info!("Session {} connected", session_id);
        let session = Session::new(session_id, sender);
        self.registry.insert(session_id, session);
        debug!("Total sessions: {}", self.registry.len());
    }

    /// Handle a join event
    ///
    /// Announces the new user to everyone (joiner included), then sends the
    /// joiner a snapshot of all current display names. A join referencing an
    /// unknown session raced with its disconnect and is dropped.
    fn handle_join(&mut self, session_id: SessionId, username: String) {
        let Some(session) = self.registry.get_mut(&session_id) else {
            return;
        };

        session.join(username.clone());
        info!("{} joined the chat", username);

        self.broadcast_all(ServerMessage::UserJoined {
            username,
            user_id: session_id.to_string(),
            timestamp: iso_timestamp(),
        });

        // Snapshot taken after the name is set, so the list includes the joiner
        let users = self.joined_usernames();
        if let Some(session) = self.registry.get(&session_id) {
            if session.try_send(ServerMessage::UserList { users }).is_err() {
                self.remove_stale(vec![session_id]);
            }
        }
    }

    /// Handle a chat message
    ///
    /// Broadcast to all sessions including the sender: every client renders
    /// from the hub echo, never from a local copy. Messages from unknown or
    /// not-yet-joined sessions are dropped.
    fn handle_message(&mut self, session_id: SessionId, message: String) {
        let Some(session) = self.registry.get(&session_id) else {
            return;
        };
        let Some(username) = session.username() else {
            return;
        };
        let username = username.to_string();

        debug!("{}: {}", username, message);

        self.broadcast_all(ServerMessage::Message {
            username,
            message,
            user_id: session_id.to_string(),
            timestamp: iso_timestamp(),
        });
    }

    /// Handle typing indicator start
    ///
    /// Goes to everyone except the sender; a sender does not need to be
    /// told it is typing. Requires a joined session.
    fn handle_typing(&mut self, session_id: SessionId) {
        let Some(session) = self.registry.get(&session_id) else {
            return;
        };
        let Some(username) = session.username() else {
            return;
        };
        let username = username.to_string();

        self.broadcast_others(session_id, ServerMessage::UserTyping { username });
    }

    /// Handle typing indicator stop
    ///
    /// Unlike typing, this carries no name and has no join precondition.
    fn handle_stop_typing(&mut self, session_id: SessionId) {
        if !self.registry.contains_key(&session_id) {
            return;
        }

        self.broadcast_others(session_id, ServerMessage::UserStopTyping);
    }

    /// Handle client disconnection
    ///
    /// A joined session is announced as left; a session that never joined
    /// is removed silently. A duplicate disconnect is a no-op.
    fn handle_disconnect(&mut self, session_id: SessionId) {
        let Some(session) = self.registry.remove(&session_id) else {
            return;
        };

        match session.state {
            SessionState::Joined { username } => {
                info!("{} left the chat", username);
                self.broadcast_all(ServerMessage::UserLeft {
                    username,
                    user_id: session_id.to_string(),
                    timestamp: iso_timestamp(),
                });
            }
            SessionState::Connected => {
                debug!("Session {} disconnected before joining", session_id);
            }
        }

        debug!("Total sessions: {}", self.registry.len());
    }

    /// Broadcast a message to every session
    fn broadcast_all(&mut self, msg: ServerMessage) {
        let stale = self.fan_out(&msg, None);
        self.remove_stale(stale);
    }

    /// Broadcast a message to every session except the sender
    fn broadcast_others(&mut self, sender_id: SessionId, msg: ServerMessage) {
        let stale = self.fan_out(&msg, Some(sender_id));
        self.remove_stale(stale);
    }

    /// Queue a message on every session's outbound channel without blocking
    ///
    /// Returns the sessions whose channel was closed or full; a slow
    /// recipient never delays delivery to the rest.
    fn fan_out(&self, msg: &ServerMessage, skip: Option<SessionId>) -> Vec<SessionId> {
        let mut stale = Vec::new();
        for (id, session) in &self.registry {
            if Some(*id) == skip {
                continue;
            }
            if let Err(e) = session.try_send(msg.clone()) {
                warn!("Dropping session {}: {}", id, e);
                stale.push(*id);
            }
        }
        stale
    }

    /// Remove sessions that failed delivery, announcing each joined one
    ///
    /// Announcing a departure can itself surface more stale sessions, so
    /// this drains to a fixed point. Each id is removed from the registry
    /// before its departure is broadcast, which bounds the loop.
    fn remove_stale(&mut self, mut stale: Vec<SessionId>) {
        while let Some(id) = stale.pop() {
            let Some(session) = self.registry.remove(&id) else {
                continue;
            };
            warn!("Session {} reaped (unresponsive or gone)", id);

            if let SessionState::Joined { username } = session.state {
                let left = ServerMessage::UserLeft {
                    username,
                    user_id: id.to_string(),
                    timestamp: iso_timestamp(),
                };
                stale.extend(self.fan_out(&left, None));
            }
        }
    }

    /// Display names of all currently joined sessions
    fn joined_usernames(&self) -> Vec<String> {
        self.registry
            .values()
            .filter_map(|s| s.username().map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hub with a dead command channel, for driving handlers directly
    fn test_hub() -> Hub {
        let (_tx, rx) = mpsc::channel(1);
        Hub::new(rx)
    }

    /// Connect a session with the given outbound buffer capacity
    fn connect(hub: &mut Hub, capacity: usize) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(capacity);
        hub.handle_connect(id, tx);
        (id, rx)
    }

    /// Connect and join a session in one step
    fn join(
        hub: &mut Hub,
        username: &str,
        capacity: usize,
    ) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let (id, rx) = connect(hub, capacity);
        hub.handle_join(id, username.to_string());
        (id, rx)
    }

    /// Pull every queued message off a session's channel
    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_registry_accounting() {
        let mut hub = test_hub();

        let (a, _rx_a) = connect(&mut hub, 32);
        let (b, _rx_b) = join(&mut hub, "Bob", 32);
        let (_c, _rx_c) = connect(&mut hub, 32);
        assert_eq!(hub.registry.len(), 3);

        hub.handle_disconnect(a);
        hub.handle_disconnect(b);
        assert_eq!(hub.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_join_broadcasts_to_all_including_joiner() {
        let mut hub = test_hub();
        let (_a, mut rx_a) = join(&mut hub, "Alice", 32);
        drain(&mut rx_a);

        let (b, mut rx_b) = join(&mut hub, "Bob", 32);

        // Alice sees Bob arrive
        let events = drain(&mut rx_a);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerMessage::UserJoined { username, user_id, timestamp } => {
                assert_eq!(username, "Bob");
                assert_eq!(user_id, &b.to_string());
                assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
            }
            other => panic!("Expected UserJoined, got {:?}", other),
        }

        // Bob sees his own join echo, then the user list with himself in it
        let events = drain(&mut rx_b);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ServerMessage::UserJoined { username, .. } if username == "Bob"));
        match &events[1] {
            ServerMessage::UserList { users } => {
                let mut users = users.clone();
                users.sort();
                assert_eq!(users, vec!["Alice".to_string(), "Bob".to_string()]);
            }
            other => panic!("Expected UserList, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_message_echoed_to_all_with_server_timestamp() {
        let mut hub = test_hub();
        let (a, mut rx_a) = join(&mut hub, "Alice", 32);
        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.handle_message(a, "hi".to_string());

        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            match &events[0] {
                ServerMessage::Message { username, message, user_id, timestamp } => {
                    assert_eq!(username, "Alice");
                    assert_eq!(message, "hi");
                    assert_eq!(user_id, &a.to_string());
                    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
                }
                other => panic!("Expected Message, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_message_before_join_is_dropped() {
        let mut hub = test_hub();
        let (a, mut rx_a) = connect(&mut hub, 32);
        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.handle_message(a, "too early".to_string());

        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_message_from_unknown_session_is_dropped() {
        let mut hub = test_hub();
        let (_a, mut rx_a) = join(&mut hub, "Alice", 32);
        drain(&mut rx_a);

        hub.handle_message(SessionId::new(), "ghost".to_string());
        hub.handle_join(SessionId::new(), "Ghost".to_string());

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(hub.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_user_list_omits_disconnected_sessions() {
        let mut hub = test_hub();
        let (a, _rx_a) = join(&mut hub, "Alice", 32);
        hub.handle_disconnect(a);

        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);

        let events = drain(&mut rx_b);
        let users = events
            .iter()
            .find_map(|e| match e {
                ServerMessage::UserList { users } => Some(users.clone()),
                _ => None,
            })
            .expect("joiner should receive a user list");
        assert_eq!(users, vec!["Bob".to_string()]);
    }

    #[tokio::test]
    async fn test_typing_not_echoed_to_sender() {
        let mut hub = test_hub();
        let (a, mut rx_a) = join(&mut hub, "Alice", 32);
        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);
        let (_c, mut rx_c) = join(&mut hub, "Carol", 32);
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        hub.handle_typing(a);

        assert!(drain(&mut rx_a).is_empty());
        for rx in [&mut rx_b, &mut rx_c] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert!(matches!(&events[0], ServerMessage::UserTyping { username } if username == "Alice"));
        }
    }

    #[tokio::test]
    async fn test_typing_before_join_is_dropped() {
        let mut hub = test_hub();
        let (a, mut rx_a) = connect(&mut hub, 32);
        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.handle_typing(a);

        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_stop_typing_needs_no_join() {
        let mut hub = test_hub();
        let (a, mut rx_a) = connect(&mut hub, 32);
        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.handle_stop_typing(a);

        assert!(drain(&mut rx_a).is_empty());
        let events = drain(&mut rx_b);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerMessage::UserStopTyping));
    }

    #[tokio::test]
    async fn test_duplicate_disconnect_is_noop() {
        let mut hub = test_hub();
        let (a, _rx_a) = join(&mut hub, "Alice", 32);
        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);
        drain(&mut rx_b);

        hub.handle_disconnect(a);
        hub.handle_disconnect(a);

        let left: Vec<_> = drain(&mut rx_b)
            .into_iter()
            .filter(|e| matches!(e, ServerMessage::UserLeft { .. }))
            .collect();
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn test_unjoined_disconnect_is_silent() {
        let mut hub = test_hub();
        let (a, _rx_a) = connect(&mut hub, 32);
        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);
        drain(&mut rx_b);

        hub.handle_disconnect(a);

        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(hub.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_stuck_session_does_not_block_others() {
        let mut hub = test_hub();
        let (a, mut rx_a) = join(&mut hub, "Alice", 32);
        let (_b, mut rx_b) = join(&mut hub, "Bob", 32);
        // Carol's buffer holds two events and she never drains it
        let (_c, mut rx_c) = join(&mut hub, "Carol", 2);
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        hub.handle_message(a, "one".to_string());
        hub.handle_message(a, "two".to_string());
        // Third message overflows Carol; she is reaped and announced as left
        hub.handle_message(a, "three".to_string());

        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            let messages: Vec<_> = events
                .iter()
                .filter_map(|e| match e {
                    ServerMessage::Message { message, .. } => Some(message.clone()),
                    _ => None,
                })
                .collect();
            assert_eq!(messages, vec!["one", "two", "three"]);
            let left: Vec<_> = events
                .iter()
                .filter(|e| matches!(e, ServerMessage::UserLeft { username, .. } if username == "Carol"))
                .collect();
            assert_eq!(left.len(), 1);
        }

        // Carol only ever saw the first two messages
        let events = drain(&mut rx_c);
        assert_eq!(events.len(), 2);
        assert_eq!(hub.registry.len(), 2);
    }

    #[tokio::test]
    async fn test_run_loop_processes_commands() {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        tokio::spawn(Hub::new(cmd_rx).run());

        let session_id = SessionId::new();
        let (tx, mut rx) = mpsc::channel(32);
        cmd_tx
            .send(HubCommand::Connect { session_id, sender: tx })
            .await
            .unwrap();
        cmd_tx
            .send(HubCommand::Join {
                session_id,
                username: "Alice".to_string(),
            })
            .await
            .unwrap();

        let first = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("hub should respond")
            .expect("channel open");
        assert!(matches!(first, ServerMessage::UserJoined { ref username, .. } if username == "Alice"));
    }
}
