//! Core functionality for the room relay

pub mod frame;
pub mod hub;
pub mod room;
pub mod room_name;
pub mod server;
pub mod subscriber;

// Re-export main components for convenience
pub use frame::{Frame, FrameError};
pub use hub::{Hub, HubHandle};
pub use room::{BroadcastReport, Room, RoomSummary};
pub use room_name::RoomName;
pub use server::{ServerState, SharedServerState};
pub use subscriber::{Delivery, InboundExit, InboundOptions, OutboundExit, Subscriber, SubscriberId};
