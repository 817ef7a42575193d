use std::collections::{HashSet, VecDeque};

use dashmap::DashMap;
use sketchstory_core::sync::protocol::ServerMessage;
use sketchstory_core::sync::{EventPayload, SyncEvent};
use tokio::sync::broadcast;

use crate::config::ServerConfig;

/// A message on a session's broadcast channel, tagged with the sending peer.
pub type RoomMessage = (String, ServerMessage);

/// Session state
pub struct Room {
    /// Broadcast channel for this session
    tx: broadcast::Sender<RoomMessage>,
    /// Connected peer IDs
    peers: HashSet<String>,
    /// Stroke events, oldest first, replayed to new joiners
    history: VecDeque<SyncEvent>,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            peers: HashSet::new(),
            history: VecDeque::new(),
        }
    }
}

/// What a peer gets back when joining a session.
pub struct Joined {
    pub rx: broadcast::Receiver<RoomMessage>,
    pub history: Vec<SyncEvent>,
    pub peer_count: usize,
}

/// Shared application state
pub struct AppState {
    config: ServerConfig,
    /// Active sessions
    rooms: DashMap<String, Room>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Add peer to session
    pub fn join_room(&self, room_id: &str, peer_id: &str) -> Joined {
        let capacity = self.config.channel_capacity;
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(capacity));
        room.peers.insert(peer_id.to_string());
        Joined {
            rx: room.tx.subscribe(),
            history: room.history.iter().cloned().collect(),
            peer_count: room.peers.len(),
        }
    }

    /// Remove peer from session
    pub fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
            // Clean up empty sessions
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove(room_id);
            }
        }
    }

    /// Keep a stroke event for late joiners. Other events are not replayed.
    pub fn record(&self, room_id: &str, event: &SyncEvent) {
        if self.config.max_history == 0 || !matches!(event.payload, EventPayload::Stroke { .. }) {
            return;
        }
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.history.push_back(event.clone());
            while room.history.len() > self.config.max_history {
                room.history.pop_front();
            }
        }
    }

    /// Broadcast message to session
    pub fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peers.len())
    }

    pub fn history_len(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.history.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchstory_core::{Collaborator, PathBuilder, Point, Tool};

    fn state(max_history: usize) -> AppState {
        AppState::new(ServerConfig {
            max_history,
            ..ServerConfig::default()
        })
    }

    fn stroke_event(x: f64) -> SyncEvent {
        let mut builder = PathBuilder::new();
        builder.start_path(Point::new(x, 0.0), Tool::Crayon, "#00AA00", 3.0);
        SyncEvent::stroke(builder.end_path().unwrap(), "alice", 1)
    }

    #[test]
    fn test_join_and_leave() {
        let state = state(10);
        let joined = state.join_room("story", "p1");
        assert_eq!(joined.peer_count, 1);
        assert_eq!(state.join_room("story", "p2").peer_count, 2);

        state.leave_room("story", "p1");
        assert_eq!(state.peer_count("story"), 1);
        state.leave_room("story", "p2");
        assert_eq!(state.room_count(), 0);
    }

    fn xs(history: &[SyncEvent]) -> Vec<f64> {
        history
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::Stroke { path } => Some(path.points()[0].x),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_history_replayed_to_joiners() {
        let state = state(10);
        state.join_room("story", "p1");
        state.record("story", &stroke_event(1.0));
        state.record("story", &stroke_event(2.0));
        state.record("story", &SyncEvent::joined(Collaborator::new("a", "A"), 0));

        let joined = state.join_room("story", "p2");
        assert_eq!(joined.history.len(), 2);
        assert_eq!(xs(&joined.history), vec![1.0, 2.0]);
    }

    #[test]
    fn test_history_is_bounded() {
        let state = state(2);
        state.join_room("story", "p1");
        for x in 0..5 {
            state.record("story", &stroke_event(x as f64));
        }
        assert_eq!(state.history_len("story"), 2);

        let joined = state.join_room("story", "p2");
        assert_eq!(xs(&joined.history), vec![3.0, 4.0]);
    }

    #[test]
    fn test_history_disabled() {
        let state = state(0);
        state.join_room("story", "p1");
        state.record("story", &stroke_event(1.0));
        assert_eq!(state.history_len("story"), 0);
    }

    #[tokio::test]
    async fn test_broadcast_tags_sender() {
        let state = state(10);
        let mut joined = state.join_room("story", "p1");
        state.broadcast(
            "story",
            "p2",
            ServerMessage::Error {
                message: "hello".to_string(),
            },
        );

        let (from, msg) = joined.rx.recv().await.unwrap();
        assert_eq!(from, "p2");
        assert!(matches!(msg, ServerMessage::Error { .. }));
    }
}
