//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! message parsing, and bidirectional communication with the Hub.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::hub::HubCommand;
use crate::message::{ClientMessage, ServerMessage};
use crate::types::SessionId;

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, sets up bidirectional communication,
/// and manages the connection lifecycle.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<HubCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Generate session ID
    let session_id = SessionId::new();
    info!("Session {} connected from {}", session_id, peer_addr);

    // Create channel for hub -> client messages.
    // Bounded: the hub drops this session if the buffer ever fills.
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(32);

    // Register with the Hub
    if cmd_tx
        .send(HubCommand::Connect {
            session_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register session {} - hub closed", session_id);
        return Err(AppError::ChannelSend);
    }

    // Tell the client its session id so it can recognize itself in broadcasts
    let connected_msg = ServerMessage::Connected {
        session_id: session_id.to_string(),
    };
    let json = serde_json::to_string(&connected_msg)?;
    ws_sender.send(Message::Text(json.into())).await?;

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> HubCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            let cmd = client_message_to_command(session_id, client_msg);
                            if cmd_tx_read.send(cmd).await.is_err() {
                                debug!("Hub closed, ending read task for {}", session_id);
                                break;
                            }
                        }
                        Err(e) => {
                            // Malformed payloads are ignored; no error goes back
                            // to this or any other client
                            warn!("Invalid JSON from {}: {}", session_id, e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Session {} sent close frame", session_id);
                    break;
                }
                Ok(Message::Ping(data)) => {
                    debug!("Ping from {}", session_id);
                    // Pong is handled automatically by tungstenite
                    let _ = data; // Suppress unused warning
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", session_id);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", session_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", session_id);
    });

    // Spawn write task (ServerMessage -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for session");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", session_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", session_id);
        }
    }

    // Send disconnect command; a duplicate is a no-op at the hub
    let _ = cmd_tx
        .send(HubCommand::Disconnect { session_id })
        .await;

    info!("Session {} disconnected", session_id);

    Ok(())
}

/// Convert a ClientMessage to a HubCommand
fn client_message_to_command(session_id: SessionId, msg: ClientMessage) -> HubCommand {
    match msg {
        ClientMessage::Join { username } => HubCommand::Join { session_id, username },
        ClientMessage::Message { message } => HubCommand::Message { session_id, message },
        ClientMessage::Typing => HubCommand::Typing { session_id },
        ClientMessage::StopTyping => HubCommand::StopTyping { session_id },
    }
}
