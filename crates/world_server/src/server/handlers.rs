//! Connection handling logic for WebSocket clients.
//!
//! This module contains the logic that manages the lifecycle of individual
//! client connections: WebSocket handshaking, message processing, and
//! cleanup of the room the connection joined.

use crate::{
    error::ServerError,
    messaging::{route_client_message, router::leave_room, ServerMessage},
    security::SecurityManager,
    server::ServerContext,
};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, trace, warn};

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Register connection with the connection manager
/// 3. Start message handling tasks (incoming and outgoing)
/// 4. Handle connection termination
/// 5. Remove the connection's presence from its room and tell the room
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `ctx` - Shared server state
/// * `security` - Message validation and rate limiting
/// * `idle_timeout` - Close the connection after this long without a message
///
/// # Message Handling
///
/// * **Incoming Task**: Validates client messages and routes them to the room
/// * **Outgoing Task**: Delivers queued messages addressed to this connection
///
/// These tasks run until the connection is closed or an error occurs.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: Arc<ServerContext>,
    security: Arc<SecurityManager>,
    idle_timeout: Option<Duration>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let connection_id = ctx.connections.add_connection(addr).await;
    ctx.connections
        .register_ws_sender(connection_id, ws_sender.clone())
        .await;

    let mut message_receiver = ctx.connections.subscribe();
    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    // Incoming message task
    let incoming_task = {
        let ctx = ctx.clone();

        async move {
            loop {
                let next = match idle_timeout {
                    Some(limit) => match tokio::time::timeout(limit, ws_receiver.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            debug!("⏱️ Connection {} idle for {:?}, closing", connection_id, limit);
                            break;
                        }
                    },
                    None => ws_receiver.next().await,
                };
                let Some(msg) = next else { break };

                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = security.validate_message(addr.ip(), text.as_bytes()).await {
                            warn!("🛡️ Rejected message from connection {}: {}", connection_id, e);
                            let err = ServerError::from(e);
                            let _ = ctx
                                .send(connection_id, &ServerMessage::error("invalid", &err))
                                .await;
                            continue;
                        }
                        if let Err(e) = route_client_message(&text, connection_id, &ctx).await {
                            trace!("❌ Message routing error: {}", e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut ws_sender = ws_sender_incoming.lock().await;
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Err(e) => {
                        error!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    // Outgoing message task
    let outgoing_task = {
        let ws_sender = ws_sender_outgoing;
        async move {
            loop {
                match message_receiver.recv().await {
                    Ok((target_connection_id, message)) if target_connection_id == connection_id => {
                        let message_text = String::from_utf8_lossy(&message);
                        let mut ws_sender = ws_sender.lock().await;
                        if let Err(e) = ws_sender
                            .send(Message::Text(message_text.to_string().into()))
                            .await
                        {
                            error!("Failed to send message: {}", e);
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("🐢 Connection {} fell behind, {} message(s) dropped", connection_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    };

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    ctx.connections.remove_ws_sender(connection_id).await;
    if let Some(connection) = ctx.connections.remove_connection(connection_id).await {
        if let Some(session) = connection.session {
            leave_room(connection_id, &session, &ctx).await?;
        }
    }
    Ok(())
}
