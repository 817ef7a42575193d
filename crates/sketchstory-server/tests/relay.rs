use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use sketchstory_core::sync::protocol::{ClientMessage, ServerMessage};
use sketchstory_core::{
    CanvasCommand, Collaborator, CollaborativeCanvas, EventPayload, GestureEvent, PathBuilder,
    Point, SessionConfig, SyncEvent, Tool, WebSocketTransport,
};
use sketchstory_server::{AppState, ServerConfig, router};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(max_history: usize) -> SocketAddr {
    let config = ServerConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        max_history,
        ..ServerConfig::default()
    };
    let listener = tokio::net::TcpListener::bind(config.addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::new(AppState::new(config)));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

async fn send(client: &mut Client, msg: &ClientMessage) {
    let json = msg.to_json().unwrap();
    client.send(Message::text(json)).await.unwrap();
}

async fn recv(client: &mut Client) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for server")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn join(client: &mut Client, session: &str) -> ServerMessage {
    send(
        client,
        &ClientMessage::Join {
            session: session.to_string(),
        },
    )
    .await;
    recv(client).await
}

fn stroke_event(x: f64, author: &str) -> SyncEvent {
    let mut builder = PathBuilder::new();
    builder.start_path(Point::new(x, 0.0), Tool::Pencil, "#000000", 2.0);
    builder.add_point(Point::new(x, 5.0));
    SyncEvent::stroke(builder.end_path().unwrap(), author, 1)
}

#[tokio::test]
async fn test_health() {
    let addr = spawn_server(10).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut body = String::new();
    stream.read_to_string(&mut body).await.unwrap();
    assert!(body.starts_with("HTTP/1.1 200"));
    assert!(body.ends_with("ok"));
}

#[tokio::test]
async fn test_publish_is_relayed_without_echo() {
    let addr = spawn_server(10).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    join(&mut alice, "story").await;
    match join(&mut bob, "story").await {
        ServerMessage::Joined { peer_count, .. } => assert_eq!(peer_count, 2),
        other => panic!("unexpected {:?}", other),
    }

    let event = stroke_event(1.0, "alice");
    send(&mut alice, &ClientMessage::Publish { event: event.clone() }).await;

    match recv(&mut bob).await {
        ServerMessage::Event { session, event: received } => {
            assert_eq!(session, "story");
            assert_eq!(received, event);
        }
        other => panic!("unexpected {:?}", other),
    }

    // Alice gets nothing back: the next thing she sees is Bob's publish.
    send(&mut bob, &ClientMessage::Publish { event: stroke_event(2.0, "bob") }).await;
    match recv(&mut alice).await {
        ServerMessage::Event { event, .. } => assert_eq!(event.author_id, "bob"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_history_replayed_to_late_joiner() {
    let addr = spawn_server(10).await;
    let mut alice = connect(addr).await;
    join(&mut alice, "story").await;

    for x in [1.0, 2.0, 3.0] {
        send(&mut alice, &ClientMessage::Publish { event: stroke_event(x, "alice") }).await;
    }
    send(
        &mut alice,
        &ClientMessage::Publish {
            event: SyncEvent::joined(Collaborator::new("alice", "Alice"), 0),
        },
    )
    .await;

    // Messages from one connection are handled in order, so once this error
    // comes back every publish above has been recorded.
    alice.send(Message::text("{not json")).await.unwrap();
    assert!(matches!(recv(&mut alice).await, ServerMessage::Error { .. }));

    let mut bob = connect(addr).await;
    match join(&mut bob, "story").await {
        ServerMessage::Joined { history, .. } => {
            let xs: Vec<f64> = history
                .iter()
                .filter_map(|e| match &e.payload {
                    EventPayload::Stroke { path } => Some(path.points()[0].x),
                    _ => None,
                })
                .collect();
            assert_eq!(xs, vec![1.0, 2.0, 3.0]);
            assert_eq!(history.len(), 3);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_disconnect_announces_left() {
    let addr = spawn_server(10).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    join(&mut alice, "story").await;
    join(&mut bob, "story").await;

    send(
        &mut alice,
        &ClientMessage::Publish {
            event: SyncEvent::joined(Collaborator::new("alice", "Alice"), 0),
        },
    )
    .await;
    assert!(matches!(recv(&mut bob).await, ServerMessage::Event { .. }));

    drop(alice);

    match recv(&mut bob).await {
        ServerMessage::Event { event, .. } => {
            assert_eq!(
                event.payload,
                EventPayload::Left {
                    collaborator_id: "alice".to_string()
                }
            );
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_without_session_is_error() {
    let addr = spawn_server(10).await;
    let mut alice = connect(addr).await;

    send(&mut alice, &ClientMessage::Publish { event: stroke_event(1.0, "alice") }).await;
    match recv(&mut alice).await {
        ServerMessage::Error { message } => assert_eq!(message, "Not in a session"),
        other => panic!("unexpected {:?}", other),
    }

    alice.send(Message::text("{not json")).await.unwrap();
    assert!(matches!(recv(&mut alice).await, ServerMessage::Error { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_canvases_share_strokes_over_websocket() {
    let addr = spawn_server(10).await;
    let url = format!("ws://{}/ws", addr);

    let mut alice = CollaborativeCanvas::new(Collaborator::new("alice", "Alice"), SessionConfig::default());
    let mut bob = CollaborativeCanvas::new(Collaborator::new("bob", "Bob"), SessionConfig::default());

    alice
        .start_collaboration("story", Arc::new(WebSocketTransport::connect(&url).unwrap()))
        .unwrap();
    bob.start_collaboration("story", Arc::new(WebSocketTransport::connect(&url).unwrap()))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    alice.handle(CanvasCommand::Gesture(GestureEvent::start(0.0, 0.0)));
    alice.handle(CanvasCommand::Gesture(GestureEvent::move_to(8.0, 6.0)));
    alice.handle(CanvasCommand::Gesture(GestureEvent::End));

    let mut waited = Duration::ZERO;
    while bob.drawing().is_empty() && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
        bob.handle(CanvasCommand::PumpRemote);
    }

    assert_eq!(bob.drawing().len(), 1);
    assert_eq!(bob.drawing().committed_paths()[0].rendered_form(), "M0 0 L8 6");
    assert!(alice.take_failures().is_empty());
}
