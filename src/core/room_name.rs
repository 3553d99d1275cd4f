use std::fmt;

use serde::Serialize;

use crate::constants::MAX_ROOM_NAME_LENGTH;
use crate::error::{Result, RustyRoomsError};

/// Validated room identifier taken from the `/ws/{room}` path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(RustyRoomsError::InvalidRoomName(
                "Room name is required".to_string(),
            ));
        }
        if raw.len() > MAX_ROOM_NAME_LENGTH {
            return Err(RustyRoomsError::InvalidRoomName(format!(
                "Room name longer than {} bytes",
                MAX_ROOM_NAME_LENGTH
            )));
        }
        if raw.contains('/') {
            return Err(RustyRoomsError::InvalidRoomName(
                "Room name must not contain '/'".to_string(),
            ));
        }
        Ok(RoomName(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
