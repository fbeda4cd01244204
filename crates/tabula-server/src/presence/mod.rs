//! Transient cursor presence
//!
//! Room-keyed fan-out of cursor positions. Nothing is persisted, there is no
//! ordering across senders and no deduplication: each receiver keeps whatever
//! position arrived last. Independent of the ingestion pipeline.

pub mod routes;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

/// Per-room buffer; slow receivers skip ahead rather than block senders
const ROOM_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub room_id: String,
    pub user_id: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
}

/// Messages accepted from a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    CursorMove(CursorPosition),
}

/// Messages sent to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    CursorUpdate(CursorPosition),
}

pub type ConnectionId = u64;

#[derive(Debug, Clone)]
pub struct Envelope {
    sender: ConnectionId,
    position: CursorPosition,
}

struct Room {
    tx: broadcast::Sender<Envelope>,
    members: usize,
}

/// All live rooms
#[derive(Default)]
pub struct PresenceHub {
    rooms: RwLock<HashMap<String, Room>>,
    next_connection: AtomicU64,
}

impl PresenceHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to a room, creating it on first join
    pub async fn join(&self, room_id: &str) -> broadcast::Receiver<Envelope> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_insert_with(|| Room {
            tx: broadcast::channel(ROOM_CAPACITY).0,
            members: 0,
        });
        room.members += 1;
        room.tx.subscribe()
    }

    /// Drop one membership; the room disappears with its last member
    pub async fn leave(&self, room_id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(room_id) {
            room.members = room.members.saturating_sub(1);
            if room.members == 0 {
                rooms.remove(room_id);
                tracing::debug!(room_id, "Presence room closed");
            }
        }
    }

    /// Fan a position out to the room; returns how many subscribers got it
    pub async fn publish(&self, sender: ConnectionId, position: CursorPosition) -> usize {
        let rooms = self.rooms.read().await;
        match rooms.get(&position.room_id) {
            Some(room) => room.tx.send(Envelope { sender, position }).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn members(&self, room_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map_or(0, |room| room.members)
    }
}

/// One client connection's view of the hub
pub struct PresenceSession {
    hub: Arc<PresenceHub>,
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    rooms: HashMap<String, JoinHandle<()>>,
}

impl PresenceSession {
    pub fn new(hub: Arc<PresenceHub>, outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        let id = hub.connection_id();
        Self {
            hub,
            id,
            outbound,
            rooms: HashMap::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn handle(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::JoinRoom { room_id } => self.join(room_id).await,
            ClientMessage::LeaveRoom { room_id } => self.leave(&room_id).await,
            ClientMessage::CursorMove(position) => {
                self.hub.publish(self.id, position).await;
            },
        }
    }

    async fn join(&mut self, room_id: String) {
        if self.rooms.contains_key(&room_id) {
            return;
        }

        let mut rx = self.hub.join(&room_id).await;
        let outbound = self.outbound.clone();
        let me = self.id;

        let forward = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) if envelope.sender == me => {},
                    Ok(envelope) => {
                        if outbound
                            .send(ServerMessage::CursorUpdate(envelope.position))
                            .is_err()
                        {
                            break;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(connection = me, skipped, "Presence receiver lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        tracing::debug!(connection = self.id, %room_id, "Joined presence room");
        self.rooms.insert(room_id, forward);
    }

    async fn leave(&mut self, room_id: &str) {
        if let Some(forward) = self.rooms.remove(room_id) {
            forward.abort();
            self.hub.leave(room_id).await;
            tracing::debug!(connection = self.id, room_id, "Left presence room");
        }
    }

    /// Leave every joined room
    pub async fn close(mut self) {
        let rooms: Vec<String> = self.rooms.keys().cloned().collect();
        for room_id in rooms {
            self.leave(&room_id).await;
        }
    }
}
