/// Realtime Fan-out Hub
///
/// Routes server events to connected clients through rooms:
/// - One room per chat the client participates in
/// - One room per user id, shared by all of that user's devices
///
/// Room membership is the only addressing mechanism. A connection that
/// disconnects is removed from every room it joined.
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

use super::messages::{events, ClientSignal, Handshake, ServerEvent};
use crate::metrics;

/// Unique identifier for one realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Addressable group of connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {
    User(Uuid),
    Chat(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Joined,
    Disconnected,
}

/// Per-connection handle owned by the transport session
#[derive(Debug)]
pub struct RealtimeConnection {
    pub id: ConnectionId,
    pub user: Uuid,
    state: ConnectionState,
    rooms: BTreeSet<Room>,
    sender: UnboundedSender<ServerEvent>,
}

impl RealtimeConnection {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn rooms(&self) -> &BTreeSet<Room> {
        &self.rooms
    }
}

struct Subscriber {
    id: ConnectionId,
    sender: UnboundedSender<ServerEvent>,
}

#[derive(Clone, Default)]
pub struct RealtimeHub {
    // room -> connections currently in it
    rooms: Arc<RwLock<HashMap<Room, Vec<Subscriber>>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and join its user room plus one room per chat
    ///
    /// # Returns
    ///
    /// The connection handle and the receiver the session forwards to its socket
    pub async fn connect(
        &self,
        handshake: &Handshake,
    ) -> (RealtimeConnection, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = unbounded_channel();
        let mut connection = RealtimeConnection {
            id: ConnectionId::new(),
            user: handshake.user,
            state: ConnectionState::Connecting,
            rooms: BTreeSet::new(),
            sender: tx,
        };

        let rooms: Vec<Room> = std::iter::once(Room::User(handshake.user))
            .chain(handshake.chats.iter().map(|chat| Room::Chat(*chat)))
            .collect();
        self.join_rooms(&mut connection, rooms).await;
        connection.state = ConnectionState::Joined;
        metrics::realtime_connection_opened();

        tracing::debug!(
            connection_id = ?connection.id,
            user_id = %connection.user,
            rooms = connection.rooms.len(),
            "Realtime connection joined"
        );

        (connection, rx)
    }

    /// Subscribe an open connection to additional chat rooms
    pub async fn join(&self, connection: &mut RealtimeConnection, chats: &[Uuid]) {
        if connection.state == ConnectionState::Disconnected {
            return;
        }
        let rooms = chats.iter().map(|chat| Room::Chat(*chat)).collect();
        self.join_rooms(connection, rooms).await;
    }

    async fn join_rooms(&self, connection: &mut RealtimeConnection, rooms: Vec<Room>) {
        let mut guard = self.rooms.write().await;
        for room in rooms {
            if connection.rooms.insert(room) {
                guard.entry(room).or_default().push(Subscriber {
                    id: connection.id,
                    sender: connection.sender.clone(),
                });
            }
        }
    }

    /// Remove a connection from every room it joined
    pub async fn disconnect(&self, connection: &mut RealtimeConnection) {
        if connection.state == ConnectionState::Disconnected {
            return;
        }

        let mut guard = self.rooms.write().await;
        for room in &connection.rooms {
            if let Some(subscribers) = guard.get_mut(room) {
                subscribers.retain(|s| s.id != connection.id);
                if subscribers.is_empty() {
                    guard.remove(room);
                }
            }
        }
        drop(guard);

        connection.rooms.clear();
        connection.state = ConnectionState::Disconnected;
        metrics::realtime_connection_closed();

        tracing::debug!(
            connection_id = ?connection.id,
            user_id = %connection.user,
            "Realtime connection removed"
        );
    }

    /// Send an event to every connection in a room
    ///
    /// Dead senders found along the way are pruned.
    ///
    /// # Returns
    ///
    /// The number of connections the event was handed to
    pub async fn emit(&self, room: Room, event: ServerEvent) -> usize {
        metrics::record_realtime_emit(&event.event);

        let mut guard = self.rooms.write().await;
        let Some(subscribers) = guard.get_mut(&room) else {
            return 0;
        };

        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.sender.send(event.clone()).is_ok());
        let delivered = subscribers.len();

        if before != delivered {
            tracing::debug!(
                room = ?room,
                pruned = before - delivered,
                active = delivered,
                "Pruned dead realtime senders"
            );
        }
        if subscribers.is_empty() {
            guard.remove(&room);
        }

        delivered
    }

    /// Bare signal to every device of a user, e.g. `friendChange`
    pub async fn send_user_event(&self, user: Uuid, event: &str) -> usize {
        self.emit(Room::User(user), ServerEvent::bare(event)).await
    }

    /// Signal carrying a payload to every device of a user
    pub async fn send_data_event(&self, user: Uuid, payload: Value, event: &str) -> usize {
        self.emit(Room::User(user), ServerEvent::with_data(event, payload))
            .await
    }

    /// Apply a client signal on behalf of its connection
    ///
    /// User-addressed signals naming someone other than the connection's own
    /// user are ignored.
    pub async fn handle_signal(&self, connection: &mut RealtimeConnection, signal: ClientSignal) {
        match signal {
            ClientSignal::MessageSent { chat } => {
                self.emit(
                    Room::Chat(chat),
                    ServerEvent::with_data(events::MESSAGE_SENT, json!(chat)),
                )
                .await;
            }
            ClientSignal::JoinRooms(chats) => {
                self.join(connection, &chats).await;
            }
            ClientSignal::AppOpened { user } => {
                if self.owns(connection, user) {
                    self.send_user_event(user, events::EVENTS_UPDATED).await;
                }
            }
            ClientSignal::NotificationsUpdated { user } => {
                if self.owns(connection, user) {
                    self.send_user_event(user, events::NOTIFICATIONS_UPDATED)
                        .await;
                }
            }
        }
    }

    fn owns(&self, connection: &RealtimeConnection, user: Uuid) -> bool {
        if connection.user == user {
            return true;
        }
        tracing::warn!(
            connection_id = ?connection.id,
            user_id = %connection.user,
            target = %user,
            "Ignoring signal addressed to another user"
        );
        false
    }

    /// Number of connections currently in a room
    pub async fn room_size(&self, room: Room) -> usize {
        let guard = self.rooms.read().await;
        guard.get(&room).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(user: Uuid, chats: &[Uuid]) -> Handshake {
        Handshake {
            user,
            chats: chats.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_connect_joins_user_and_chat_rooms() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let chat = Uuid::new_v4();

        let (conn, _rx) = hub.connect(&handshake(user, &[chat])).await;

        assert_eq!(conn.state(), ConnectionState::Joined);
        assert_eq!(hub.room_size(Room::User(user)).await, 1);
        assert_eq!(hub.room_size(Room::Chat(chat)).await, 1);
    }

    #[tokio::test]
    async fn test_user_event_reaches_every_device() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();

        let (_phone, mut phone_rx) = hub.connect(&handshake(user, &[])).await;
        let (_tablet, mut tablet_rx) = hub.connect(&handshake(user, &[])).await;

        let delivered = hub.send_user_event(user, events::FRIEND_CHANGE).await;
        assert_eq!(delivered, 2);

        assert_eq!(phone_rx.recv().await.unwrap().event, "friendChange");
        assert_eq!(tablet_rx.recv().await.unwrap().event, "friendChange");
    }

    #[tokio::test]
    async fn test_disconnect_leaves_all_rooms() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let chat = Uuid::new_v4();

        let (mut conn, _rx) = hub.connect(&handshake(user, &[chat])).await;
        hub.disconnect(&mut conn).await;

        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.rooms().is_empty());
        assert_eq!(hub.room_size(Room::User(user)).await, 0);
        assert_eq!(hub.room_size(Room::Chat(chat)).await, 0);
        assert_eq!(hub.send_user_event(user, "eventsUpdated").await, 0);
    }

    #[tokio::test]
    async fn test_dead_senders_pruned_on_emit() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();

        let (_gone, gone_rx) = hub.connect(&handshake(user, &[])).await;
        let (_live, mut live_rx) = hub.connect(&handshake(user, &[])).await;
        drop(gone_rx);

        let delivered = hub
            .send_data_event(user, json!({ "event": "e1" }), events::NEW_STORY_UPDATE)
            .await;
        assert_eq!(delivered, 1);
        assert_eq!(hub.room_size(Room::User(user)).await, 1);

        let received = live_rx.recv().await.unwrap();
        assert_eq!(received.data, Some(json!({ "event": "e1" })));
    }

    #[tokio::test]
    async fn test_message_sent_goes_to_chat_room() {
        let hub = RealtimeHub::new();
        let chat = Uuid::new_v4();
        let (mut sender, mut sender_rx) = hub.connect(&handshake(Uuid::new_v4(), &[chat])).await;
        let (_other, mut other_rx) = hub.connect(&handshake(Uuid::new_v4(), &[chat])).await;
        let (_outsider, mut outsider_rx) = hub.connect(&handshake(Uuid::new_v4(), &[])).await;

        hub.handle_signal(&mut sender, ClientSignal::MessageSent { chat })
            .await;

        let expected = ServerEvent::with_data("messageSent", json!(chat));
        assert_eq!(sender_rx.recv().await.unwrap(), expected);
        assert_eq!(other_rx.recv().await.unwrap(), expected);
        assert!(outsider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_rooms_signal_adds_chat() {
        let hub = RealtimeHub::new();
        let chat = Uuid::new_v4();
        let (mut conn, _rx) = hub.connect(&handshake(Uuid::new_v4(), &[])).await;

        hub.handle_signal(&mut conn, ClientSignal::JoinRooms(vec![chat, chat]))
            .await;

        assert!(conn.rooms().contains(&Room::Chat(chat)));
        assert_eq!(hub.room_size(Room::Chat(chat)).await, 1);
    }

    #[tokio::test]
    async fn test_app_opened_for_other_user_ignored() {
        let hub = RealtimeHub::new();
        let me = Uuid::new_v4();
        let victim = Uuid::new_v4();
        let (mut conn, mut my_rx) = hub.connect(&handshake(me, &[])).await;
        let (_theirs, mut victim_rx) = hub.connect(&handshake(victim, &[])).await;

        hub.handle_signal(&mut conn, ClientSignal::AppOpened { user: victim })
            .await;
        assert!(victim_rx.try_recv().is_err());

        hub.handle_signal(&mut conn, ClientSignal::AppOpened { user: me })
            .await;
        assert_eq!(my_rx.recv().await.unwrap().event, "eventsUpdated");
    }
}
