//! Subscriber handles and the two per-connection loops
//!
//! A `Subscriber` is what a room stores for one connection: an id and the
//! sending half of a bounded outbound queue. The connection itself is owned by
//! the two loops in this module:
//!
//! - [`inbound_loop`] reads frames from the peer and hands them to the room.
//! - [`outbound_loop`] drains the queue into the peer, in order.
//!
//! The loops share nothing but the queue. Removing the subscriber from its
//! room drops the only `Sender`, which closes the queue and ends the outbound
//! loop. The inbound loop publishes through [`Room::publish`], which refuses
//! frames from non-members, so an evicted peer stops publishing immediately
//! even while its outbound loop is still draining.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use futures_util::sink::{Sink, SinkExt};
use futures_util::stream::{Stream, StreamExt};
use log::{debug, trace, warn};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Error as ProtocolError;
use uuid::Uuid;
use warp::ws::Message as WsMessage;

use crate::core::frame::Frame;
use crate::core::room::Room;

pub type SubscriberId = Uuid;

/// Outcome of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The queue is at capacity, the subscriber must be evicted
    Full,
    /// The outbound loop is gone
    Closed,
}

/// Room-side handle of one connection
///
/// Not `Clone`: the handle owns the only sender of the outbound queue, so
/// dropping it is what closes the queue.
pub struct Subscriber {
    id: SubscriberId,
    outbound: mpsc::Sender<Frame>,
    connected_at: Instant,
}

impl Subscriber {
    /// Create a subscriber and the receiving end of its outbound queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (outbound, queue) = mpsc::channel(capacity.max(1));
        let subscriber = Self {
            id: Uuid::new_v4(),
            outbound,
            connected_at: Instant::now(),
        };
        (subscriber, queue)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queue a frame without waiting for room in the queue
    pub fn enqueue(&self, frame: &Frame) -> Delivery {
        match self.outbound.try_send(frame.clone()) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("pending", &(self.outbound.max_capacity() - self.outbound.capacity()))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InboundOptions {
    /// Give up on a peer that sends nothing for this long
    pub idle_timeout: Option<Duration>,
}

/// Why the inbound loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundExit {
    StreamEnded,
    PeerClosed,
    ReadError,
    IdleTimeout,
    /// The room dropped this subscriber while it was still sending
    Evicted,
    /// The outbound loop finished first (eviction or write failure)
    OutboundFinished,
}

/// Why the outbound loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundExit {
    QueueClosed,
    WriteError,
}

enum Next<E> {
    Message(Option<Result<WsMessage, E>>),
    Idle,
}

async fn next_message<S, E>(stream: &mut S, idle_timeout: Option<Duration>) -> Next<E>
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
{
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
            Ok(next) => Next::Message(next),
            Err(_) => Next::Idle,
        },
        None => Next::Message(stream.next().await),
    }
}

/// True when a read failed only because a text frame was not valid UTF-8
fn is_invalid_utf8(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if matches!(err.downcast_ref::<ProtocolError>(), Some(ProtocolError::Utf8)) {
            return true;
        }
        current = err.source();
    }
    false
}

/// Read frames from the peer and broadcast them to `room`
///
/// Invalid or empty text frames are dropped and the loop continues. Control
/// frames are handled by the transport and never relayed. The caller is
/// responsible for leaving the room once this returns.
pub async fn inbound_loop<S, E, F>(
    mut stream: S,
    room: &Room,
    id: SubscriberId,
    options: InboundOptions,
    outbound: &mut F,
) -> InboundExit
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: StdError + 'static,
    F: Future + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = &mut *outbound => return InboundExit::OutboundFinished,
            next = next_message(&mut stream, options.idle_timeout) => next,
        };

        let message = match next {
            Next::Idle => {
                debug!("Subscriber {} idle for too long in room '{}'", id, room.name());
                return InboundExit::IdleTimeout;
            }
            Next::Message(None) => return InboundExit::StreamEnded,
            Next::Message(Some(Err(e))) if is_invalid_utf8(&e) => {
                warn!("Dropped frame from subscriber {}: {}", id, e);
                continue;
            }
            Next::Message(Some(Err(e))) => {
                warn!("WebSocket read error for subscriber {}: {}", id, e);
                return InboundExit::ReadError;
            }
            Next::Message(Some(Ok(message))) => message,
        };

        if message.is_close() {
            return InboundExit::PeerClosed;
        }

        match Frame::from_message(message) {
            None => continue,
            Some(Err(e)) => {
                warn!("Dropped frame from subscriber {}: {}", id, e);
            }
            Some(Ok(frame)) => match room.publish(id, &frame) {
                Some(report) => trace!(
                    "Relayed {} byte frame from {} to {} subscribers in '{}'",
                    frame.len(),
                    id,
                    report.delivered,
                    room.name()
                ),
                None => {
                    debug!("Subscriber {} is no longer in room '{}'", id, room.name());
                    return InboundExit::Evicted;
                }
            },
        }
    }
}

/// Write queued frames to the peer until the queue closes or a write fails
pub async fn outbound_loop<Si>(
    mut sink: Si,
    mut queue: mpsc::Receiver<Frame>,
    id: SubscriberId,
) -> OutboundExit
where
    Si: Sink<WsMessage> + Unpin,
    Si::Error: fmt::Display,
{
    while let Some(frame) = queue.recv().await {
        if let Err(e) = sink.send(frame.to_message()).await {
            warn!("Failed to send WebSocket message to {}: {}", id, e);
            return OutboundExit::WriteError;
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Error closing WebSocket for {}: {}", id, e);
    }
    OutboundExit::QueueClosed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::room_name::RoomName;
    use futures_util::stream;
    use std::convert::Infallible;

    fn room(name: &str) -> Room {
        Room::new(RoomName::parse(name).unwrap())
    }

    #[test]
    fn test_enqueue_reports_full_queue() {
        let (subscriber, _queue) = Subscriber::channel(2);
        let frame = Frame::binary(vec![1]);

        assert_eq!(subscriber.enqueue(&frame), Delivery::Delivered);
        assert_eq!(subscriber.enqueue(&frame), Delivery::Delivered);
        assert_eq!(subscriber.enqueue(&frame), Delivery::Full);
    }

    #[test]
    fn test_enqueue_reports_closed_queue() {
        let (subscriber, queue) = Subscriber::channel(2);
        drop(queue);
        assert_eq!(subscriber.enqueue(&Frame::binary(vec![1])), Delivery::Closed);
    }

    #[tokio::test]
    async fn test_inbound_loop_broadcasts_and_drops_empty_text() {
        let room = room("doc1");
        let (sender, mut queue) = Subscriber::channel(8);
        let sender_id = sender.id();
        room.join(sender);

        let incoming = stream::iter(vec![
            Ok::<_, Infallible>(WsMessage::text("")),
            Ok(WsMessage::text("hello")),
            Ok(WsMessage::binary(vec![0xff, 0x00])),
        ]);
        let mut outbound = std::future::pending::<()>();

        let exit = inbound_loop(
            incoming,
            &room,
            sender_id,
            InboundOptions::default(),
            &mut outbound,
        )
        .await;

        assert_eq!(exit, InboundExit::StreamEnded);
        assert_eq!(queue.try_recv().unwrap(), Frame::Text("hello".into()));
        assert_eq!(queue.try_recv().unwrap(), Frame::binary(vec![0xff, 0x00]));
        assert!(queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_inbound_loop_survives_invalid_utf8() {
        let room = room("doc1");
        let (sender, mut queue) = Subscriber::channel(8);
        let sender_id = sender.id();
        room.join(sender);

        let incoming = stream::iter(vec![
            Err(ProtocolError::Utf8),
            Ok(WsMessage::text("after")),
        ]);
        let mut outbound = std::future::pending::<()>();

        let exit = inbound_loop(
            incoming,
            &room,
            sender_id,
            InboundOptions::default(),
            &mut outbound,
        )
        .await;

        assert_eq!(exit, InboundExit::StreamEnded);
        assert!(room.contains(sender_id));
        assert_eq!(queue.try_recv().unwrap(), Frame::Text("after".into()));
    }

    #[tokio::test]
    async fn test_inbound_loop_stops_on_other_read_errors() {
        let room = room("doc1");
        let (sender, mut queue) = Subscriber::channel(8);
        let sender_id = sender.id();
        room.join(sender);

        let incoming = stream::iter(vec![
            Err(ProtocolError::ConnectionClosed),
            Ok(WsMessage::text("after")),
        ]);
        let mut outbound = std::future::pending::<()>();

        let exit = inbound_loop(
            incoming,
            &room,
            sender_id,
            InboundOptions::default(),
            &mut outbound,
        )
        .await;

        assert_eq!(exit, InboundExit::ReadError);
        assert!(queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_evicted_subscriber_stops_publishing() {
        let room = room("doc1");
        let (stalled, _stalled_queue) = Subscriber::channel(1);
        let (peer, mut peer_queue) = Subscriber::channel(8);
        let stalled_id = stalled.id();
        room.join(stalled);
        room.join(peer);

        // The stalled reader never drains, the second frame overflows it
        room.broadcast(&Frame::binary(vec![1]));
        room.broadcast(&Frame::binary(vec![2]));
        assert!(!room.contains(stalled_id));
        while peer_queue.try_recv().is_ok() {}

        // Its outbound loop is still busy, only membership stops it
        let incoming = stream::iter(vec![
            Ok::<_, Infallible>(WsMessage::text("ghost")),
            Ok(WsMessage::text("ghost again")),
        ]);
        let mut outbound = std::future::pending::<()>();

        let exit = inbound_loop(
            incoming,
            &room,
            stalled_id,
            InboundOptions::default(),
            &mut outbound,
        )
        .await;

        assert_eq!(exit, InboundExit::Evicted);
        assert!(peer_queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_inbound_loop_stops_on_close_frame() {
        let room = room("doc1");
        let (listener, mut queue) = Subscriber::channel(8);
        room.join(listener);

        let incoming = stream::iter(vec![
            Ok::<_, Infallible>(WsMessage::close()),
            Ok(WsMessage::text("after close")),
        ]);
        let mut outbound = std::future::pending::<()>();

        let exit = inbound_loop(
            incoming,
            &room,
            Uuid::new_v4(),
            InboundOptions::default(),
            &mut outbound,
        )
        .await;

        assert_eq!(exit, InboundExit::PeerClosed);
        assert!(queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_inbound_loop_stops_when_outbound_finished() {
        let room = room("doc1");
        let incoming = stream::pending::<Result<WsMessage, Infallible>>();
        let mut outbound = std::future::ready(());

        let exit = inbound_loop(
            incoming,
            &room,
            Uuid::new_v4(),
            InboundOptions::default(),
            &mut outbound,
        )
        .await;

        assert_eq!(exit, InboundExit::OutboundFinished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_loop_idle_timeout() {
        let room = room("doc1");
        let incoming = stream::pending::<Result<WsMessage, Infallible>>();
        let mut outbound = std::future::pending::<()>();
        let options = InboundOptions {
            idle_timeout: Some(Duration::from_secs(30)),
        };

        let exit = inbound_loop(incoming, &room, Uuid::new_v4(), options, &mut outbound).await;

        assert_eq!(exit, InboundExit::IdleTimeout);
    }

    #[tokio::test]
    async fn test_outbound_loop_preserves_order() {
        let (subscriber, queue) = Subscriber::channel(8);
        for text in ["one", "two", "three"] {
            subscriber.enqueue(&Frame::Text(text.into()));
        }
        drop(subscriber);

        let mut written: Vec<WsMessage> = Vec::new();
        let exit = outbound_loop(&mut written, queue, Uuid::new_v4()).await;

        assert_eq!(exit, OutboundExit::QueueClosed);
        let texts: Vec<&str> = written.iter().map(|m| m.to_str().unwrap()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_outbound_loop_stops_on_write_error() {
        let (subscriber, queue) = Subscriber::channel(8);
        subscriber.enqueue(&Frame::Text("lost".into()));

        let failing = Box::pin(futures_util::sink::unfold((), |_, _msg: WsMessage| async {
            Err::<(), _>("broken pipe")
        }));
        let exit = outbound_loop(failing, queue, subscriber.id()).await;

        assert_eq!(exit, OutboundExit::WriteError);
    }
}
