use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::core::frame::Frame;
use crate::core::room_name::RoomName;
use crate::core::subscriber::{Delivery, Subscriber, SubscriberId};

/// Result of one fan-out pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: Vec<SubscriberId>,
}

/// Public view of a room
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub name: RoomName,
    pub members: usize,
    pub created_at: DateTime<Utc>,
}

/// A named broadcast scope
///
/// The room owns the subscriber handles (and therefore their outbound queues)
/// but not the connections behind them. Removing a handle from `members` is
/// the one place a queue gets closed.
#[derive(Debug)]
pub struct Room {
    name: RoomName,
    members: RwLock<HashMap<SubscriberId, Subscriber>>,
    created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            members: RwLock::new(HashMap::new()),
            created_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Adds a subscriber to the room
    pub fn join(&self, subscriber: Subscriber) {
        let mut members = self.write_members();
        members.insert(subscriber.id(), subscriber);
        info!(
            "Client connected to room '{}'. Total clients: {}",
            self.name,
            members.len()
        );
    }

    /// Removes a subscriber and closes its outbound queue
    ///
    /// Returns false when the subscriber was not a member, which makes repeated
    /// calls harmless.
    pub fn leave(&self, id: SubscriberId) -> bool {
        let mut members = self.write_members();
        match members.remove(&id) {
            Some(subscriber) => {
                info!(
                    "Client disconnected from room '{}' after {:?}. Total clients: {}",
                    self.name,
                    subscriber.connection_duration(),
                    members.len()
                );
                true
            }
            None => false,
        }
    }

    /// Fan a frame out to every member without blocking
    ///
    /// Members whose queue is full (or already closed) are evicted once the
    /// read pass is over.
    pub fn broadcast(&self, frame: &Frame) -> BroadcastReport {
        self.fan_out(None, frame).unwrap_or_default()
    }

    /// Broadcast a frame sent by `sender`
    ///
    /// Returns `None` without delivering anything when `sender` is no longer a
    /// member, so an evicted connection cannot keep publishing.
    pub fn publish(&self, sender: SubscriberId, frame: &Frame) -> Option<BroadcastReport> {
        self.fan_out(Some(sender), frame)
    }

    fn fan_out(&self, sender: Option<SubscriberId>, frame: &Frame) -> Option<BroadcastReport> {
        let mut report = BroadcastReport::default();

        {
            let members = self.read_members();
            if sender.is_some_and(|id| !members.contains_key(&id)) {
                return None;
            }
            for (id, subscriber) in members.iter() {
                match subscriber.enqueue(frame) {
                    Delivery::Delivered => report.delivered += 1,
                    Delivery::Full | Delivery::Closed => report.evicted.push(*id),
                }
            }
        }

        if !report.evicted.is_empty() {
            let mut members = self.write_members();
            for id in &report.evicted {
                if members.remove(id).is_some() {
                    warn!(
                        "Evicted slow client {} from room '{}'. Total clients: {}",
                        id,
                        self.name,
                        members.len()
                    );
                }
            }
        }

        Some(report)
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.read_members().contains_key(&id)
    }

    pub fn member_count(&self) -> usize {
        self.read_members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_members().is_empty()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            name: self.name.clone(),
            members: self.member_count(),
            created_at: self.created_at,
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read_members(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.members.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_members(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.members.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn room(name: &str) -> Room {
        Room::new(RoomName::parse(name).unwrap())
    }

    #[test]
    fn test_broadcast_to_empty_room_is_noop() {
        let room = room("empty");
        let report = room.broadcast(&Frame::Text("hello".into()));
        assert_eq!(report, BroadcastReport::default());
    }

    #[test]
    fn test_broadcast_reaches_every_member_including_sender() {
        let room = room("doc1");
        let (a, mut a_queue) = Subscriber::channel(4);
        let (b, mut b_queue) = Subscriber::channel(4);
        room.join(a);
        room.join(b);

        let report = room.broadcast(&Frame::Text("hello".into()));

        assert_eq!(report.delivered, 2);
        assert_eq!(a_queue.try_recv().unwrap(), Frame::Text("hello".into()));
        assert_eq!(b_queue.try_recv().unwrap(), Frame::Text("hello".into()));
    }

    #[test]
    fn test_leave_closes_queue_once() {
        let room = room("doc1");
        let (subscriber, mut queue) = Subscriber::channel(4);
        let id = subscriber.id();
        room.join(subscriber);

        assert!(room.leave(id));
        assert!(!room.leave(id));
        assert_eq!(queue.try_recv(), Err(TryRecvError::Disconnected));
        assert!(room.is_empty());
    }

    #[test]
    fn test_full_queue_evicts_only_slow_subscriber() {
        let room = room("doc1");
        let (slow, mut slow_queue) = Subscriber::channel(2);
        let (fast, mut fast_queue) = Subscriber::channel(16);
        let slow_id = slow.id();
        room.join(slow);
        room.join(fast);

        for i in 0..3 {
            let report = room.broadcast(&Frame::Text(format!("frame {}", i).into()));
            if i == 2 {
                assert_eq!(report.evicted, vec![slow_id]);
            }
            assert!(fast_queue.try_recv().is_ok());
        }

        assert!(!room.contains(slow_id));
        assert_eq!(room.member_count(), 1);

        // Frames queued before eviction are still drained, then the queue ends
        assert!(slow_queue.try_recv().is_ok());
        assert!(slow_queue.try_recv().is_ok());
        assert_eq!(slow_queue.try_recv(), Err(TryRecvError::Disconnected));

        room.broadcast(&Frame::Text("after".into()));
        assert_eq!(fast_queue.try_recv().unwrap(), Frame::Text("after".into()));
    }

    #[test]
    fn test_publish_requires_membership() {
        let room = room("doc1");
        let (sender, mut sender_queue) = Subscriber::channel(4);
        let (peer, mut peer_queue) = Subscriber::channel(4);
        let sender_id = sender.id();
        room.join(sender);
        room.join(peer);

        let report = room.publish(sender_id, &Frame::Text("first".into()));
        assert_eq!(report.map(|r| r.delivered), Some(2));
        assert_eq!(peer_queue.try_recv().unwrap(), Frame::Text("first".into()));
        assert!(sender_queue.try_recv().is_ok());

        room.leave(sender_id);
        assert_eq!(room.publish(sender_id, &Frame::Text("ghost".into())), None);
        assert!(peer_queue.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue_is_evicted() {
        let room = room("doc1");
        let (subscriber, queue) = Subscriber::channel(4);
        room.join(subscriber);
        drop(queue);

        let report = room.broadcast(&Frame::binary(vec![1, 2]));
        assert_eq!(report.evicted.len(), 1);
        assert!(room.is_empty());
    }

    #[test]
    fn test_summary_reports_members() {
        let room = room("doc1");
        let (subscriber, _queue) = Subscriber::channel(4);
        room.join(subscriber);

        let summary = room.summary();
        assert_eq!(summary.name.as_str(), "doc1");
        assert_eq!(summary.members, 1);
    }
}
