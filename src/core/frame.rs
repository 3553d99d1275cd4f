//! Relay frames
//!
//! A frame is one message unit exchanged with a peer, tagged with the kind of
//! WebSocket frame it arrived in. Payloads are reference counted so fanning a
//! frame out to every member of a room never copies it.

use std::fmt;
use std::sync::Arc;

use warp::ws::Message as WsMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Non-empty, valid UTF-8 text
    Text(Arc<str>),
    /// Opaque bytes, relayed verbatim
    Binary(Arc<[u8]>),
}

/// Reasons a text payload is dropped instead of relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    Empty,
    InvalidUtf8,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty text frame"),
            Self::InvalidUtf8 => write!(f, "text frame is not valid UTF-8"),
        }
    }
}

impl std::error::Error for FrameError {}

impl Frame {
    /// Validate a text payload
    pub fn text(payload: Vec<u8>) -> Result<Self, FrameError> {
        if payload.is_empty() {
            return Err(FrameError::Empty);
        }
        let text = String::from_utf8(payload).map_err(|_| FrameError::InvalidUtf8)?;
        Ok(Frame::Text(Arc::from(text)))
    }

    pub fn binary(payload: Vec<u8>) -> Self {
        Frame::Binary(Arc::from(payload))
    }

    /// Convert an inbound message, `None` for control frames
    pub fn from_message(message: WsMessage) -> Option<Result<Self, FrameError>> {
        if message.is_text() {
            Some(Frame::text(message.into_bytes()))
        } else if message.is_binary() {
            Some(Ok(Frame::binary(message.into_bytes())))
        } else {
            None
        }
    }

    pub fn to_message(&self) -> WsMessage {
        match self {
            Frame::Text(text) => WsMessage::text(text.as_ref()),
            Frame::Binary(bytes) => WsMessage::binary(bytes.as_ref()),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Frame::Text(_))
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }
}
