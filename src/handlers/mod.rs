//! Request handlers for different server endpoints

pub mod errors;
pub mod files;
pub mod info;
pub mod websocket;

// Re-export the websocket handler
pub use websocket::handle_ws_client;

/// Percent-decode one path segment, `None` if it is not valid UTF-8
pub fn decode_segment(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(|decoded| decoded.into_owned())
}
