use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum RustyRoomsError {
    // Connection errors
    OriginRejected(String),

    // Room errors
    InvalidRoomName(String),
    HubUnavailable,

    // Storage errors
    InvalidFilename(String),
    DocumentNotFound(String),
    DocumentExists(String),
    StorageError(String),

    // Request errors
    InvalidRequestBody(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for RustyRoomsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OriginRejected(origin) => write!(f, "Origin not allowed: {}", origin),
            Self::InvalidRoomName(msg) => write!(f, "Invalid room name: {}", msg),
            Self::HubUnavailable => write!(f, "Room hub is not running"),
            Self::InvalidFilename(name) => write!(f, "Invalid filename: {}", name),
            Self::DocumentNotFound(name) => write!(f, "File not found: {}", name),
            Self::DocumentExists(name) => write!(f, "File already exists: {}", name),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::InvalidRequestBody(msg) => write!(f, "Invalid request body: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RustyRoomsError {}

// Lets storage and API errors travel through warp's rejection chain
impl warp::reject::Reject for RustyRoomsError {}

impl From<io::Error> for RustyRoomsError {
    fn from(err: io::Error) -> Self {
        RustyRoomsError::StorageError(err.to_string())
    }
}

// Generic result type for RustyRooms
pub type Result<T> = std::result::Result<T, RustyRoomsError>;
