//! Server information endpoints and the generated front end config

use std::convert::Infallible;

use serde::Serialize;
use warp::reply::{Reply, Response};

use crate::core::server::SharedServerState;
use crate::handlers::errors::into_response;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub instance_id: String,
}

// GET /api/info
pub async fn server_info(state: SharedServerState) -> Result<Response, Infallible> {
    let info = ServerInfo {
        instance_id: state.instance_id.clone(),
    };
    Ok(warp::reply::json(&info).into_response())
}

// GET /api/rooms
pub async fn list_rooms(state: SharedServerState) -> Result<Response, Infallible> {
    let rooms = state.hub.rooms().await;
    into_response(rooms.map(|rooms| warp::reply::json(&rooms)))
}

// GET /config.js
pub async fn config_js(
    host: Option<String>,
    state: SharedServerState,
) -> Result<Response, Infallible> {
    let host = host
        .as_deref()
        .map(strip_port)
        .filter(|h| is_plain_host(h))
        .unwrap_or("localhost");
    let body = render_config_js(host, state.config.port, state.config.enable_tls);
    Ok(warp::reply::with_header(body, "Content-Type", "application/javascript").into_response())
}

/// Module the front end evaluates to find the relay and the API
pub fn render_config_js(host: &str, port: u16, tls: bool) -> String {
    let (ws_scheme, http_scheme) = if tls { ("wss", "https") } else { ("ws", "http") };
    format!(
        "export const config = {{\n    wsUrl: \"{ws}://{host}:{port}/ws\",\n    httpUrl: \"{http}://{host}:{port}/api\"\n}};\n",
        ws = ws_scheme,
        http = http_scheme,
        host = host,
        port = port,
    )
}

/// Host header without its port, keeping IPv6 brackets
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

/// Hostnames, IPv4 and bracketed IPv6 only; the value ends up in a JS string
fn is_plain_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '[' | ']'))
}
