//! Process-wide room directory
//!
//! The directory map is owned by a single task. Every lookup, creation, join
//! and reap is a command processed in order by that task, so resolving a name
//! is atomic with respect to concurrent callers and no lock guards the map.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::RoomRetention;
use crate::constants::HUB_COMMAND_QUEUE_SIZE;
use crate::core::room::{Room, RoomSummary};
use crate::core::room_name::RoomName;
use crate::core::subscriber::Subscriber;
use crate::error::{Result, RustyRoomsError};

enum HubCommand {
    Resolve {
        name: RoomName,
        reply: oneshot::Sender<Arc<Room>>,
    },
    Join {
        name: RoomName,
        subscriber: Subscriber,
        reply: oneshot::Sender<Arc<Room>>,
    },
    RoomIdle {
        room: Weak<Room>,
    },
    Reap {
        room: Weak<Room>,
    },
    List {
        reply: oneshot::Sender<Vec<RoomSummary>>,
    },
}

/// The coordination task's state
pub struct Hub {
    rooms: HashMap<RoomName, Arc<Room>>,
    retention: RoomRetention,
    commands: mpsc::Receiver<HubCommand>,
    // Weak so that timers never keep the hub alive on their own
    timers: mpsc::WeakSender<HubCommand>,
}

impl Hub {
    /// Start the hub task and return a handle to it
    pub fn spawn(retention: RoomRetention) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(HUB_COMMAND_QUEUE_SIZE);
        let hub = Hub {
            rooms: HashMap::new(),
            retention,
            commands: rx,
            timers: tx.downgrade(),
        };
        let task = tokio::spawn(hub.run());
        (HubHandle { commands: tx }, task)
    }

    /// Process commands until every handle is dropped
    async fn run(mut self) {
        info!("Room hub started with retention policy {:?}", self.retention);
        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Resolve { name, reply } => {
                    let room = self.resolve(name);
                    let _ = reply.send(room);
                }
                HubCommand::Join {
                    name,
                    subscriber,
                    reply,
                } => {
                    let room = self.resolve(name);
                    let id = subscriber.id();
                    room.join(subscriber);
                    if let Err(room) = reply.send(room) {
                        debug!("Join caller for room '{}' disappeared", room.name());
                        room.leave(id);
                    }
                }
                HubCommand::RoomIdle { room } => self.schedule_reap(room),
                HubCommand::Reap { room } => self.reap(room),
                HubCommand::List { reply } => {
                    let mut rooms: Vec<RoomSummary> =
                        self.rooms.values().map(|room| room.summary()).collect();
                    rooms.sort_by(|a, b| a.name.cmp(&b.name));
                    let _ = reply.send(rooms);
                }
            }
        }
        info!("Room hub stopped with {} rooms", self.rooms.len());
    }

    fn resolve(&mut self, name: RoomName) -> Arc<Room> {
        if let Some(room) = self.rooms.get(&name) {
            return Arc::clone(room);
        }

        let room = Arc::new(Room::new(name.clone()));
        self.rooms.insert(name, Arc::clone(&room));
        info!("Created room '{}'. Total rooms: {}", room.name(), self.rooms.len());
        room
    }

    fn schedule_reap(&mut self, room: Weak<Room>) {
        let grace = match self.retention {
            RoomRetention::Retain => return,
            RoomRetention::ReapWhenEmpty { grace } => grace,
        };

        if grace.is_zero() {
            self.reap(room);
            return;
        }

        let timers = self.timers.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(commands) = timers.upgrade() {
                let _ = commands.send(HubCommand::Reap { room }).await;
            }
        });
    }

    /// Remove a room that is still registered and still empty
    ///
    /// Joins are processed by this task too, so nobody can join between the
    /// emptiness check and the removal.
    fn reap(&mut self, room: Weak<Room>) {
        let Some(room) = room.upgrade() else {
            return;
        };
        let registered = self
            .rooms
            .get(room.name())
            .is_some_and(|current| Arc::ptr_eq(current, &room));

        if registered && room.is_empty() {
            self.rooms.remove(room.name());
            info!(
                "Reaped idle room '{}'. Total rooms: {}",
                room.name(),
                self.rooms.len()
            );
        }
    }
}

/// Cloneable handle used by connection handlers to reach the hub
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Return the room registered under `name`, creating it if needed
    pub async fn resolve_or_create_room(&self, name: &RoomName) -> Result<Arc<Room>> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Resolve {
            name: name.clone(),
            reply,
        })
        .await?;
        response.await.map_err(|_| RustyRoomsError::HubUnavailable)
    }

    /// Resolve `name` and add `subscriber` to it in one step
    pub async fn join(&self, name: &RoomName, subscriber: Subscriber) -> Result<Arc<Room>> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Join {
            name: name.clone(),
            subscriber,
            reply,
        })
        .await?;
        response.await.map_err(|_| RustyRoomsError::HubUnavailable)
    }

    /// Tell the hub a room may have become empty
    pub async fn room_idle(&self, room: &Arc<Room>) {
        let command = HubCommand::RoomIdle {
            room: Arc::downgrade(room),
        };
        if self.send(command).await.is_err() {
            debug!("Hub gone, idle notice for '{}' dropped", room.name());
        }
    }

    /// Summaries of every registered room, sorted by name
    pub async fn rooms(&self) -> Result<Vec<RoomSummary>> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::List { reply }).await?;
        response.await.map_err(|_| RustyRoomsError::HubUnavailable)
    }

    async fn send(&self, command: HubCommand) -> Result<()> {
        self.commands.send(command).await.map_err(|_| {
            error!("Room hub is not running");
            RustyRoomsError::HubUnavailable
        })
    }
}
