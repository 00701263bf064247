//! Message routing logic for dispatching client messages to rooms.
//!
//! This module parses incoming client messages, admits connections to worlds
//! through the membership gate, applies world-scoped operations to the
//! joined room and fans the results out to the room.

use crate::{
    connection::{ConnectionId, ConnectionSession},
    error::ServerError,
    messaging::{ClientMessage, ServerMessage},
    server::ServerContext,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, trace, warn};
use world_core::characters::{is_known_action, visible_characters, MAX_ACTION_LEVEL};
use world_core::dice::RECENT_LOG_LIMIT;
use world_core::{
    CharacterUpdate, ClockState, ClockUpdate, Cursor, Presence, RollRequest, SessionUser, User,
    WorldId, WorldUpdate,
};

/// Routes a raw client message.
///
/// # Arguments
///
/// * `text` - The raw message text from the client (expected to be JSON)
/// * `connection_id` - The unique identifier for the client connection
/// * `ctx` - Shared server state
///
/// # Returns
///
/// `Ok(())` if the message was handled. On failure the client has already
/// been sent an `error` envelope and the error is returned for logging.
///
/// # Message Flow
///
/// 1. Parse the raw text as a `ClientMessage` JSON structure
/// 2. `session:join` and `worlds:list` are served to anyone
/// 3. Everything else requires a joined session (401 otherwise)
/// 4. Apply the operation to the session's room and broadcast the result
pub async fn route_client_message(
    text: &str,
    connection_id: ConnectionId,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            let err = ServerError::bad_request(format!("Invalid message format: {e}"));
            ctx.send(connection_id, &ServerMessage::error("invalid", &err))
                .await?;
            return Err(err);
        }
    };

    let route = message.route();
    trace!("📨 {} from connection {}", route, connection_id);

    match dispatch(&message, connection_id, ctx).await {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!("⚠️ {} failed for connection {}: {}", route, connection_id, err);
            ctx.send(connection_id, &ServerMessage::error(&route, &err))
                .await?;
            Err(err)
        }
    }
}

/// Removes a departing connection from its room and tells the others.
pub async fn leave_room(
    connection_id: ConnectionId,
    session: &ConnectionSession,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    if let Ok(room) = ctx.rooms.room(session.world_id) {
        room.write().await.remove_presence(connection_id);
    }
    ctx.broadcast(
        session.world_id,
        &ServerMessage::new("presence", "left", json!({ "connectionId": connection_id })),
        Some(connection_id),
    )
    .await?;
    debug!(
        "👋 {} left world {} (connection {})",
        session.user.discord_id, session.world_id, connection_id
    );
    Ok(())
}

async fn dispatch(
    message: &ClientMessage,
    connection_id: ConnectionId,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    match (message.namespace.as_str(), message.event.as_str()) {
        ("session", "join") => return join_world(&message.data, connection_id, ctx).await,
        ("worlds", "list") => return list_worlds(connection_id, ctx).await,
        _ => {}
    }

    let session = ctx
        .connections
        .session(connection_id)
        .await
        .ok_or_else(ServerError::unauthorized)?;
    let data = &message.data;

    match (message.namespace.as_str(), message.event.as_str()) {
        ("session", "leave") => {
            ctx.connections.clear_session(connection_id).await;
            leave_room(connection_id, &session, ctx).await?;
            ctx.send(connection_id, &ServerMessage::new("session", "left", Value::Null))
                .await
        }
        ("world", "update") => update_world(data, &session, ctx).await,
        ("clocks", event) => clocks(event, data, &session, ctx).await,
        ("characters", event) => characters(event, data, connection_id, &session, ctx).await,
        ("dice", "roll") => {
            let request = RollRequest::from_value(data, ctx.max_dice)?;
            roll(request, &session, ctx).await
        }
        ("presence", event) => presence(event, data, connection_id, &session, ctx).await,
        _ => Err(ServerError::not_found(format!(
            "Unknown event {}",
            message.route()
        ))),
    }
}

fn parse<T: DeserializeOwned>(data: &Value) -> Result<T, ServerError> {
    T::deserialize(data).map_err(|e| ServerError::bad_request(format!("Invalid payload: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    discord_id: String,
    name: String,
    world_id: WorldId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresenceEntry {
    connection_id: ConnectionId,
    presence: Presence,
}

/// Runs the membership gate and attaches the connection to the world.
async fn join_world(
    data: &Value,
    connection_id: ConnectionId,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    let request: JoinRequest = parse(data)?;
    if request.discord_id.trim().is_empty() {
        return Err(ServerError::bad_request("discordId must not be empty"));
    }
    let world = ctx
        .rooms
        .world(request.world_id)
        .ok_or_else(|| ServerError::not_found(format!("world {} not found", request.world_id)))?;
    let user = User::new(request.discord_id, request.name);

    if let Some(previous) = ctx.connections.clear_session(connection_id).await {
        leave_room(connection_id, &previous, ctx).await?;
    }

    let outcome = ctx.gate.require_membership(&user, &world).await;
    let session_user = SessionUser::from_gate(&user, &outcome);
    let membership = match outcome {
        Ok(membership) => membership,
        Err(err) => {
            warn!("🚫 {} was refused entry to world {}: {}", user.discord_id, world.id, err);
            return Err(err.into());
        }
    };

    // The session is registered and the reply queued while the room is
    // locked, so every later change to the room also reaches this connection
    // and arrives after the storage it was given here.
    let room_lock = ctx.rooms.room(world.id)?;
    let mut room = room_lock.write().await;
    room.set_presence(connection_id, Presence::default());
    let mut others: Vec<PresenceEntry> = room
        .presences()
        .iter()
        .filter(|(key, _)| **key != connection_id)
        .map(|(key, presence)| PresenceEntry {
            connection_id: *key,
            presence: presence.clone(),
        })
        .collect();
    others.sort_by_key(|entry| entry.connection_id);
    let storage = room.view_for(session_user.is_admin);

    ctx.connections
        .set_session(
            connection_id,
            ConnectionSession {
                user: user.clone(),
                world_id: world.id,
                session_user: session_user.clone(),
            },
        )
        .await;

    let dice_logs = ctx.dice.recent(world.id, RECENT_LOG_LIMIT).await;
    ctx.send(
        connection_id,
        &ServerMessage::new(
            "session",
            "joined",
            json!({
                "connectionId": connection_id,
                "user": session_user,
                "membership": membership,
                "storage": storage,
                "diceLogs": dice_logs,
                "presence": others,
            }),
        ),
    )
    .await?;
    drop(room);

    ctx.broadcast(
        world.id,
        &presence_message(connection_id, &Presence::default()),
        Some(connection_id),
    )
    .await?;

    info!(
        "🚪 {} joined world '{}' as {} (connection {})",
        user.discord_id, world.name, membership.role, connection_id
    );
    Ok(())
}

async fn list_worlds(connection_id: ConnectionId, ctx: &ServerContext) -> Result<(), ServerError> {
    let worlds = ctx.rooms.worlds();
    ctx.send(
        connection_id,
        &ServerMessage::new("worlds", "list", json!({ "worlds": worlds })),
    )
    .await
}

async fn update_world(
    data: &Value,
    session: &ConnectionSession,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    let update: WorldUpdate = parse(data)?;
    let room = ctx.rooms.room(session.world_id)?;
    let world = room.write().await.update_world(update);
    ctx.rooms.rename_world(session.world_id, &world);

    ctx.broadcast(
        session.world_id,
        &ServerMessage::new("world", "updated", json!({ "world": world })),
        None,
    )
    .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct IdRequest {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ClockUpdateRequest {
    id: String,
    #[serde(flatten)]
    update: ClockUpdate,
}

#[derive(Debug, Deserialize)]
struct SetClocksRequest {
    clocks: Vec<ClockState>,
}

async fn clocks(
    event: &str,
    data: &Value,
    session: &ConnectionSession,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    let room = ctx.rooms.room(session.world_id)?;
    let clocks = {
        let mut room = room.write().await;
        match event {
            "add" => {
                room.add_clock();
            }
            "update" => {
                let request: ClockUpdateRequest = parse(data)?;
                room.update_clock(&request.id, request.update)?;
            }
            "remove" => {
                let request: IdRequest = parse(data)?;
                room.remove_clock(&request.id)?;
            }
            "set" => {
                let request: SetClocksRequest = parse(data)?;
                room.set_clocks(request.clocks);
            }
            _ => return Err(ServerError::not_found(format!("Unknown event clocks:{event}"))),
        }
        room.storage().clocks.clone()
    };

    debug!("🕐 clocks:{} in world {}", event, session.world_id);
    ctx.broadcast(
        session.world_id,
        &ServerMessage::new("clocks", "updated", json!({ "clocks": clocks })),
        None,
    )
    .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CharacterUpdateRequest {
    id: String,
    #[serde(flatten)]
    update: CharacterUpdate,
}

#[derive(Debug, Deserialize)]
struct ActionRollRequest {
    id: String,
    action: String,
}

async fn characters(
    event: &str,
    data: &Value,
    connection_id: ConnectionId,
    session: &ConnectionSession,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    let is_admin = session.is_admin();
    let room = ctx.rooms.room(session.world_id)?;

    match event {
        "add" => {
            let character = room.write().await.add_character();
            ctx.send(
                connection_id,
                &ServerMessage::new("characters", "added", json!({ "character": character })),
            )
            .await?;
        }
        "update" => {
            let request: CharacterUpdateRequest = parse(data)?;
            room.write()
                .await
                .update_character(&request.id, request.update, is_admin)?;
        }
        "delete" => {
            let request: IdRequest = parse(data)?;
            room.write().await.delete_character(&request.id, is_admin)?;
        }
        "roll" => {
            let request: ActionRollRequest = parse(data)?;
            if !is_known_action(&request.action) {
                return Err(ServerError::bad_request(format!(
                    "unknown action {}",
                    request.action
                )));
            }
            let (count, intent) = {
                let room = room.read().await;
                room.character(&request.id)
                    .filter(|c| is_admin || !c.hidden)
                    .map(|c| c.action_roll(&request.action))
                    .ok_or_else(|| {
                        ServerError::not_found(format!("character {} not found", request.id))
                    })?
            };
            let roll_request = RollRequest::new(count, intent, ctx.max_dice.max(MAX_ACTION_LEVEL + 1))?;
            // Rolling does not change the sheet.
            return roll(roll_request, session, ctx).await;
        }
        _ => {
            return Err(ServerError::not_found(format!(
                "Unknown event characters:{event}"
            )))
        }
    }

    debug!("🧑 characters:{} in world {}", event, session.world_id);
    broadcast_characters(session.world_id, ctx).await
}

/// Sends every member of a room the character list they are allowed to see.
async fn broadcast_characters(world_id: WorldId, ctx: &ServerContext) -> Result<(), ServerError> {
    let characters = {
        let room = ctx.rooms.room(world_id)?;
        let room = room.read().await;
        room.storage().characters.clone()
    };

    for (member, is_admin) in ctx.connections.members_of(world_id).await {
        let visible = visible_characters(&characters, is_admin);
        ctx.send(
            member,
            &ServerMessage::new("characters", "updated", json!({ "characters": visible })),
        )
        .await?;
    }
    Ok(())
}

async fn roll(
    request: RollRequest,
    session: &ConnectionSession,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    let entry = ctx
        .dice
        .roll(
            session.world_id,
            &session.user.discord_id,
            &session.user.name,
            request,
        )
        .await;

    let results: Vec<u32> = entry.dice.iter().map(|d| d.result).collect();
    debug!("🎲 {} rolled {:?} for '{}'", session.user.name, results, entry.intent);
    ctx.broadcast(
        session.world_id,
        &ServerMessage::new("dice", "rolled", json!({ "log": entry })),
        None,
    )
    .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CursorRequest {
    x: f64,
    y: f64,
    #[serde(default)]
    route: String,
}

fn presence_message(connection_id: ConnectionId, presence: &Presence) -> ServerMessage {
    ServerMessage::new(
        "presence",
        "updated",
        json!({ "connectionId": connection_id, "presence": presence }),
    )
}

async fn presence(
    event: &str,
    data: &Value,
    connection_id: ConnectionId,
    session: &ConnectionSession,
    ctx: &ServerContext,
) -> Result<(), ServerError> {
    let presence = match event {
        "cursor" => {
            let request: CursorRequest = parse(data)?;
            let cursor = Cursor {
                name: session.user.name.clone(),
                x: request.x,
                y: request.y,
                route: request.route,
            };
            if !cursor.is_finite() {
                return Err(ServerError::bad_request("cursor position must be finite"));
            }
            Presence {
                cursor: Some(cursor),
            }
        }
        "clear" => Presence::default(),
        _ => return Err(ServerError::not_found(format!("Unknown event presence:{event}"))),
    };

    let room = ctx.rooms.room(session.world_id)?;
    room.write()
        .await
        .set_presence(connection_id, presence.clone());
    ctx.broadcast(
        session.world_id,
        &presence_message(connection_id, &presence),
        Some(connection_id),
    )
    .await?;
    Ok(())
}
