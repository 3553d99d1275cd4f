//! Rusty Rooms - a room-scoped WebSocket relay
//!
//! Clients connect to `/ws/{room}` and every frame one of them sends is
//! relayed, untouched, to everyone in the same room. The relay is the sync
//! transport of a collaborative editor; the small document API and static
//! file serving the editor needs live on the same listener.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod security;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
