use std::sync::Arc;

use rusty_rooms::config::RoomRetention;
use rusty_rooms::core::frame::Frame;
use rusty_rooms::core::hub::Hub;
use rusty_rooms::core::room::Room;
use rusty_rooms::core::room_name::RoomName;
use rusty_rooms::core::subscriber::Subscriber;

fn room_name(name: &str) -> RoomName {
    RoomName::parse(name).expect("valid room name")
}

#[test]
fn test_room_name_rules() {
    assert!(RoomName::parse("doc1").is_ok());
    assert!(RoomName::parse("notes about rust.md").is_ok());
    assert!(RoomName::parse(&"r".repeat(255)).is_ok());

    assert!(RoomName::parse("").is_err());
    assert!(RoomName::parse(&"r".repeat(256)).is_err());
    assert!(RoomName::parse("a/b").is_err());
}

#[test]
fn test_slow_subscriber_does_not_hold_back_the_room() {
    let room = Room::new(room_name("busy"));

    let (fast, mut fast_queue) = Subscriber::channel(16);
    let (slow, slow_queue) = Subscriber::channel(2);
    let slow_id = slow.id();
    room.join(fast);
    room.join(slow);

    // Nobody drains the slow queue; the third frame overflows it
    for i in 0..3 {
        let frame = Frame::text(format!("edit {}", i).into_bytes()).expect("valid frame");
        room.broadcast(&frame);
    }

    assert!(!room.contains(slow_id));
    assert_eq!(room.member_count(), 1);

    for i in 0..3 {
        let frame = fast_queue.try_recv().expect("fast subscriber keeps up");
        assert_eq!(frame, Frame::text(format!("edit {}", i).into_bytes()).unwrap());
    }

    // The evicted queue holds what was accepted before it overflowed, then closes
    let mut slow_queue = slow_queue;
    assert!(slow_queue.try_recv().is_ok());
    assert!(slow_queue.try_recv().is_ok());
    assert!(matches!(
        slow_queue.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
    ));
}

#[tokio::test]
async fn test_hub_hands_out_one_room_per_name() {
    let (hub, _task) = Hub::spawn(RoomRetention::Retain);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            hub.resolve_or_create_room(&room_name("doc1")).await
        }));
    }

    let mut rooms = Vec::new();
    for task in tasks {
        rooms.push(task.await.expect("task").expect("hub is running"));
    }
    assert!(rooms.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));

    let other = hub
        .resolve_or_create_room(&room_name("doc2"))
        .await
        .expect("hub is running");
    assert!(!Arc::ptr_eq(&rooms[0], &other));

    let summaries = hub.rooms().await.expect("hub is running");
    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["doc1", "doc2"]);
}

#[tokio::test]
async fn test_joined_subscribers_receive_broadcasts() {
    let (hub, _task) = Hub::spawn(RoomRetention::Retain);

    let (x, mut x_queue) = Subscriber::channel(8);
    let (y, mut y_queue) = Subscriber::channel(8);
    let (z, mut z_queue) = Subscriber::channel(8);

    let doc1 = hub.join(&room_name("doc1"), x).await.expect("join");
    hub.join(&room_name("doc1"), y).await.expect("join");
    hub.join(&room_name("doc2"), z).await.expect("join");

    let report = doc1.broadcast(&Frame::text(b"hello".to_vec()).expect("valid frame"));
    assert_eq!(report.delivered, 2);
    assert!(report.evicted.is_empty());

    assert_eq!(x_queue.recv().await, Some(Frame::text(b"hello".to_vec()).unwrap()));
    assert_eq!(y_queue.recv().await, Some(Frame::text(b"hello".to_vec()).unwrap()));
    assert!(z_queue.try_recv().is_err());
}
