// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const WS_PATH: &str = "ws";
pub const API_PATH: &str = "api";
pub const STATIC_PATH: &str = "static";

// Relay limits
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024;
pub const MAX_ROOM_NAME_LENGTH: usize = 255;

// Hub configuration constants
pub const HUB_COMMAND_QUEUE_SIZE: usize = 1024;
pub const DEFAULT_ROOM_GRACE_PERIOD_SECS: u64 = 60;

// Collaborator defaults
pub const DEFAULT_STORAGE_DIR: &str = "./storage";
pub const DEFAULT_STATIC_DIR: &str = "./web/build";
pub const FALLBACK_STATIC_DIR: &str = "./web/public";
pub const DOCUMENT_EXTENSION: &str = ".md";
pub const MAX_DOCUMENT_BODY_SIZE: u64 = 16 * 1024 * 1024;
pub const DEV_SERVER_PORT: u16 = 5173;
