use std::convert::Infallible;

use futures_util::stream::StreamExt;
use log::{debug, error, info};
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::ws::{WebSocket, Ws};

use crate::core::room_name::RoomName;
use crate::core::server::SharedServerState;
use crate::core::subscriber::{inbound_loop, outbound_loop, InboundOptions, Subscriber};
use crate::error::{Result, RustyRoomsError};
use crate::handlers::decode_segment;
use crate::handlers::errors::error_reply;

/// Validate an upgrade request for `/ws/{room}` and switch protocols
///
/// Name and origin are checked before the handshake, so a rejected request
/// never joins a room.
pub async fn upgrade_room(
    raw_room: String,
    origin: Option<String>,
    ws: Ws,
    state: SharedServerState,
) -> std::result::Result<Response, Infallible> {
    let room_name = match parse_room(&raw_room) {
        Ok(name) => name,
        Err(e) => return Ok(error_reply(&e)),
    };

    if let Err(e) = state.config.origin_policy.check(origin.as_deref()) {
        return Ok(error_reply(&e));
    }

    debug!("Upgrading connection for room '{}'", room_name);
    let limit = state.config.max_frame_size;
    Ok(ws
        .max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_ws_client(socket, room_name, state))
        .into_response())
}

/// `/ws` without a room segment
pub fn missing_room() -> Response {
    warp::reply::with_status("Room name is required", StatusCode::BAD_REQUEST).into_response()
}

// Handle a WebSocket connection for its whole lifetime
pub async fn handle_ws_client(ws: WebSocket, room_name: RoomName, state: SharedServerState) {
    let (subscriber, queue) = Subscriber::channel(state.config.outbound_queue_capacity);
    let id = subscriber.id();

    let room = match state.hub.join(&room_name, subscriber).await {
        Ok(room) => room,
        Err(e) => {
            error!("Failed to join room '{}': {}", room_name, e);
            return;
        }
    };
    info!("Client {} joined room '{}'", id, room_name);

    let (ws_tx, ws_rx) = ws.split();
    let mut outbound = tokio::task::spawn(outbound_loop(ws_tx, queue, id));

    let options = InboundOptions {
        idle_timeout: state.config.idle_timeout,
    };
    let exit = inbound_loop(ws_rx, &room, id, options, &mut outbound).await;
    debug!("Client {} stopped reading: {:?}", id, exit);

    // No-op if the room already evicted this client
    room.leave(id);
    if room.is_empty() {
        state.hub.room_idle(&room).await;
    }
}

fn parse_room(raw: &str) -> Result<RoomName> {
    let decoded = decode_segment(raw).ok_or_else(|| {
        RustyRoomsError::InvalidRoomName("Room name is not valid UTF-8".to_string())
    })?;
    RoomName::parse(&decoded)
}
