//! Registry: the directory of live connections and rooms.
//!
//! The registry decides *who is where*. It owns every connection's
//! [`ClientHandle`] and every [`Room`], and it is the only place rooms
//! are created or destroyed. Gameplay never goes through it: once a
//! connection knows its room, it talks to the room directly.
//!
//! # Locking
//!
//! One `RwLock` guards the whole directory. Operations that change
//! membership hold it for their entire duration, including the call
//! into the room, so "join" and "last member leaves" can't race. The
//! lock order is always registry → room; a room never calls back into
//! the registry.
//!
//! The cost is that membership changes are not independent of play. A
//! membership change that touches a room waits for any move that room
//! is applying, and other directory operations queue behind it. Room critical sections do no I/O (broadcasts only enqueue), so
//! the wait is bounded by one move. Lookups such as
//! [`Registry::current_room`] take the read lock and release it before
//! touching the room, so gameplay itself never waits on the directory.

use std::collections::HashMap;
use std::sync::Arc;

use gridforge_game::{AcceptAnyAnswer, AnswerChecker, UserId};
use gridforge_protocol::{ClientId, RoomId, ServerMessage};
use gridforge_session::ClientHandle;
use rand::Rng;
use tokio::sync::RwLock;

use crate::{GameRecorder, NoopRecorder, RegistryError, Room, RoomConfig, RoomInfo};

struct ClientEntry {
    handle: Arc<ClientHandle>,
    /// The room this client is a member of, if any.
    room: Option<RoomId>,
}

#[derive(Default)]
struct RegistryInner {
    clients: HashMap<ClientId, ClientEntry>,
    rooms: HashMap<RoomId, Arc<Room>>,
}

/// Tracks every live connection and every room.
///
/// Constructed once per server and shared by `Arc`.
pub struct Registry {
    config: RoomConfig,
    checker: Arc<dyn AnswerChecker>,
    recorder: Arc<dyn GameRecorder>,
    inner: RwLock<RegistryInner>,
}

impl Registry {
    /// Creates an empty registry. Every room it creates uses `checker`
    /// to judge answers and reports to `recorder`.
    pub fn new(
        config: RoomConfig,
        checker: Arc<dyn AnswerChecker>,
        recorder: Arc<dyn GameRecorder>,
    ) -> Self {
        Self {
            config,
            checker,
            recorder,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    // -----------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------

    /// Adds a connection to the live set and sends it `connected`.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateClient`] if the id is already live.
    /// Ids are minted by the server, so this means a bug upstream.
    pub async fn register(&self, client: Arc<ClientHandle>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        let client_id = client.id();

        if inner.clients.contains_key(&client_id) {
            tracing::error!(%client_id, "client registered twice");
            return Err(RegistryError::DuplicateClient(client_id));
        }

        if let Err(e) = client.send(&ServerMessage::Connected { client_id }) {
            tracing::debug!(%client_id, error = %e, "welcome not delivered");
        }
        tracing::info!(
            %client_id,
            user_id = %client.identity().user_id,
            clients = inner.clients.len() + 1,
            "client registered"
        );
        inner.clients.insert(
            client_id,
            ClientEntry {
                handle: client,
                room: None,
            },
        );
        Ok(())
    }

    /// Removes a connection: closes it, takes it out of its room, and
    /// destroys the room if it's now empty.
    ///
    /// Idempotent: returns `false` if the client was already gone.
    pub async fn unregister(&self, client_id: ClientId) -> bool {
        let mut inner = self.inner.write().await;

        let Some(entry) = inner.clients.remove(&client_id) else {
            return false;
        };
        entry.handle.close();

        if let Some(room_id) = entry.room {
            inner.detach(client_id, &room_id).await;
        }

        tracing::info!(%client_id, clients = inner.clients.len(), "client unregistered");
        true
    }

    // -----------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------

    /// Creates an empty room with a fresh random id.
    ///
    /// Most callers want [`open_room`](Self::open_room) instead, which
    /// also seats the creator.
    pub async fn create_room(
        &self,
        creator: UserId,
        capacity: Option<usize>,
    ) -> Result<Arc<Room>, RegistryError> {
        self.create_room_with_id(generate_room_id(), creator, capacity)
            .await
    }

    /// Creates an empty room with a caller-chosen id.
    pub async fn create_room_with_id(
        &self,
        room_id: RoomId,
        creator: UserId,
        capacity: Option<usize>,
    ) -> Result<Arc<Room>, RegistryError> {
        let mut inner = self.inner.write().await;
        self.insert_room(&mut inner, room_id, creator, capacity)
    }

    /// Creates a room and seats `client_id` in it, as one step.
    ///
    /// The room is never visible to others while empty.
    pub async fn open_room(
        &self,
        client_id: ClientId,
        capacity: Option<usize>,
    ) -> Result<RoomId, RegistryError> {
        self.open_room_with_id(generate_room_id(), client_id, capacity)
            .await
    }

    /// Like [`open_room`](Self::open_room), with a caller-chosen id.
    pub async fn open_room_with_id(
        &self,
        room_id: RoomId,
        client_id: ClientId,
        capacity: Option<usize>,
    ) -> Result<RoomId, RegistryError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        if inner.rooms.contains_key(&room_id) {
            return Err(RegistryError::RoomAlreadyExists(room_id));
        }
        let entry = inner
            .clients
            .get(&client_id)
            .ok_or(RegistryError::ClientNotFound(client_id))?;
        if let Some(current) = &entry.room {
            return Err(RegistryError::AlreadyInAnotherRoom(current.clone()));
        }
        let handle = Arc::clone(&entry.handle);

        let capacity = self.config.resolve_capacity(capacity)?;
        let room = self.build_room(room_id.clone(), handle.identity().user_id, capacity);
        room.add_player(&handle).await?;

        inner.rooms.insert(room_id.clone(), room);
        if let Some(entry) = inner.clients.get_mut(&client_id) {
            entry.room = Some(room_id.clone());
        }

        tracing::info!(%room_id, %client_id, capacity, rooms = inner.rooms.len(), "room created");
        Ok(room_id)
    }

    /// Seats a client in an existing room. Returns the new member count.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        client_id: ClientId,
    ) -> Result<usize, RegistryError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let room = inner
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;
        let entry = inner
            .clients
            .get_mut(&client_id)
            .ok_or(RegistryError::ClientNotFound(client_id))?;

        match &entry.room {
            // Same room: let the room report it as a duplicate member.
            Some(current) if current != room_id => {
                return Err(RegistryError::AlreadyInAnotherRoom(current.clone()));
            }
            _ => {}
        }

        let count = room.add_player(&entry.handle).await?;
        entry.room = Some(room_id.clone());
        Ok(count)
    }

    /// Takes a client out of its room without closing its connection.
    /// Returns the room it left.
    pub async fn leave_room(&self, client_id: ClientId) -> Result<RoomId, RegistryError> {
        let mut inner = self.inner.write().await;

        let room_id = inner
            .clients
            .get_mut(&client_id)
            .ok_or(RegistryError::ClientNotFound(client_id))?
            .room
            .take()
            .ok_or(RegistryError::NotInRoom(client_id))?;

        inner.detach(client_id, &room_id).await;
        Ok(room_id)
    }

    pub async fn get_room(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.inner.read().await.rooms.get(room_id).cloned()
    }

    /// The room a client is currently seated in.
    pub async fn current_room(&self, client_id: ClientId) -> Option<Arc<Room>> {
        let inner = self.inner.read().await;
        let room_id = inner.clients.get(&client_id)?.room.as_ref()?;
        inner.rooms.get(room_id).cloned()
    }

    pub async fn client_count(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Metadata of every room, sorted by id.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let inner = self.inner.read().await;
        let mut infos = Vec::with_capacity(inner.rooms.len());
        for room in inner.rooms.values() {
            infos.push(room.info().await);
        }
        infos.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        infos
    }

    /// Closes every connection and drops every room.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        for entry in inner.clients.values() {
            entry.handle.close();
        }
        tracing::info!(
            clients = inner.clients.len(),
            rooms = inner.rooms.len(),
            "registry shut down"
        );
        inner.clients.clear();
        inner.rooms.clear();
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn build_room(&self, room_id: RoomId, creator: UserId, capacity: usize) -> Arc<Room> {
        Arc::new(Room::new(
            room_id,
            creator,
            capacity,
            &self.config,
            Arc::clone(&self.checker),
            Arc::clone(&self.recorder),
        ))
    }

    fn insert_room(
        &self,
        inner: &mut RegistryInner,
        room_id: RoomId,
        creator: UserId,
        capacity: Option<usize>,
    ) -> Result<Arc<Room>, RegistryError> {
        if inner.rooms.contains_key(&room_id) {
            return Err(RegistryError::RoomAlreadyExists(room_id));
        }
        let capacity = self.config.resolve_capacity(capacity)?;
        let room = self.build_room(room_id.clone(), creator, capacity);
        inner.rooms.insert(room_id.clone(), Arc::clone(&room));
        tracing::info!(%room_id, %creator, capacity, "room created");
        Ok(room)
    }
}

impl Default for Registry {
    /// Default room settings, every answer accepted, nothing recorded.
    fn default() -> Self {
        Self::new(
            RoomConfig::default(),
            Arc::new(AcceptAnyAnswer),
            Arc::new(NoopRecorder),
        )
    }
}

impl RegistryInner {
    /// Removes `client_id` from `room_id` and destroys the room if that
    /// left it empty. The client's own `room` field is the caller's job.
    async fn detach(&mut self, client_id: ClientId, room_id: &RoomId) {
        let Some(room) = self.rooms.get(room_id).cloned() else {
            return;
        };
        room.remove_player(client_id).await;
        if room.is_empty().await {
            self.rooms.remove(room_id);
            tracing::info!(%room_id, rooms = self.rooms.len(), "room destroyed");
        }
    }
}

/// Generates a random 32-character hex room id (128 bits of entropy).
fn generate_room_id() -> RoomId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    RoomId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoomError;
    use gridforge_session::{Identity, OutboundQueue};

    fn client(id: u64) -> (Arc<ClientHandle>, OutboundQueue) {
        ClientHandle::new(ClientId(id), Identity::new(id * 10, format!("user-{id}")), 16)
    }

    #[test]
    fn test_generate_room_id_is_32_hex_chars() {
        let id = generate_room_id();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_room_id(), id);
    }

    #[tokio::test]
    async fn test_register_sends_welcome() {
        let registry = Registry::default();
        let (a, mut rx) = client(1);
        registry.register(a).await.unwrap();

        let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "connected");
        assert_eq!(frame["payload"]["client_id"], 1);
        assert_eq!(registry.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_fails() {
        let registry = Registry::default();
        let (a, _rx) = client(1);
        registry.register(Arc::clone(&a)).await.unwrap();

        let err = registry.register(a).await.unwrap_err();
        assert_eq!(err, RegistryError::DuplicateClient(ClientId(1)));
        assert_eq!(registry.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent_and_closes() {
        let registry = Registry::default();
        let (a, _rx) = client(1);
        registry.register(Arc::clone(&a)).await.unwrap();

        assert!(registry.unregister(ClientId(1)).await);
        assert!(!registry.unregister(ClientId(1)).await);
        assert!(a.is_closed());
        assert_eq!(registry.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_room_with_id_collision() {
        let registry = Registry::default();
        let id = RoomId::from("fixed");
        registry
            .create_room_with_id(id.clone(), UserId(1), None)
            .await
            .unwrap();

        let err = registry
            .create_room_with_id(id.clone(), UserId(2), None)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::RoomAlreadyExists(id));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_room_uses_default_capacity() {
        let registry = Registry::default();
        let room = registry.create_room(UserId(1), None).await.unwrap();
        assert_eq!(room.capacity(), 2);
        assert_eq!(room.status().await, gridforge_game::GameStatus::Waiting);

        let err = registry.create_room(UserId(1), Some(0)).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Room(RoomError::InvalidCapacity { requested: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_open_room_seats_creator() {
        let registry = Registry::default();
        let (a, _rx) = client(1);
        registry.register(a).await.unwrap();

        let room_id = registry.open_room(ClientId(1), Some(3)).await.unwrap();

        let room = registry.current_room(ClientId(1)).await.unwrap();
        assert_eq!(room.id(), &room_id);
        assert_eq!(room.capacity(), 3);
        assert_eq!(room.creator(), UserId(10));
        assert!(room.has_member(ClientId(1)).await);

        let err = registry.open_room(ClientId(1), None).await.unwrap_err();
        assert_eq!(err, RegistryError::AlreadyInAnotherRoom(room_id));
    }

    #[tokio::test]
    async fn test_open_room_with_id_collision() {
        let registry = Registry::default();
        let (a, _rx) = client(1);
        registry.register(a).await.unwrap();
        let id = RoomId::from("taken");
        registry
            .create_room_with_id(id.clone(), UserId(2), None)
            .await
            .unwrap();

        let err = registry
            .open_room_with_id(id.clone(), ClientId(1), None)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::RoomAlreadyExists(id));
        assert!(registry.current_room(ClientId(1)).await.is_none());
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_open_room_requires_registration() {
        let registry = Registry::default();
        let err = registry.open_room(ClientId(9), None).await.unwrap_err();
        assert_eq!(err, RegistryError::ClientNotFound(ClientId(9)));
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_room_errors() {
        let registry = Registry::default();
        let (a, _ra) = client(1);
        let (b, _rb) = client(2);
        let (c, _rc) = client(3);
        registry.register(a).await.unwrap();
        registry.register(b).await.unwrap();
        registry.register(c).await.unwrap();

        let missing = RoomId::from("nope");
        assert_eq!(
            registry.join_room(&missing, ClientId(2)).await.unwrap_err(),
            RegistryError::RoomNotFound(missing)
        );

        let room_id = registry.open_room(ClientId(1), None).await.unwrap();
        assert!(matches!(
            registry.join_room(&room_id, ClientId(1)).await,
            Err(RegistryError::Room(RoomError::PlayerAlreadyInRoom(..)))
        ));

        assert_eq!(registry.join_room(&room_id, ClientId(2)).await.unwrap(), 2);
        assert!(matches!(
            registry.join_room(&room_id, ClientId(3)).await,
            Err(RegistryError::Room(RoomError::RoomFull(_)))
        ));
        assert!(registry.current_room(ClientId(3)).await.is_none());

        let other = registry.open_room(ClientId(3), None).await.unwrap();
        assert_eq!(
            registry.join_room(&room_id, ClientId(3)).await.unwrap_err(),
            RegistryError::AlreadyInAnotherRoom(other)
        );
    }

    #[tokio::test]
    async fn test_last_leave_destroys_room() {
        let registry = Registry::default();
        let (a, _ra) = client(1);
        let (b, mut rb) = client(2);
        registry.register(a).await.unwrap();
        registry.register(b).await.unwrap();
        let room_id = registry.open_room(ClientId(1), None).await.unwrap();
        registry.join_room(&room_id, ClientId(2)).await.unwrap();
        while rb.try_recv().is_ok() {}

        assert_eq!(registry.leave_room(ClientId(1)).await.unwrap(), room_id);
        assert_eq!(registry.room_count().await, 1);

        let frame: serde_json::Value = serde_json::from_str(&rb.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "player_left");
        assert_eq!(frame["payload"]["player_id"], 1);

        registry.unregister(ClientId(2)).await;
        assert_eq!(registry.room_count().await, 0);
        assert!(registry.get_room(&room_id).await.is_none());
    }

    #[tokio::test]
    async fn test_leave_room_when_not_in_one() {
        let registry = Registry::default();
        let (a, _ra) = client(1);
        registry.register(a).await.unwrap();
        assert_eq!(
            registry.leave_room(ClientId(1)).await.unwrap_err(),
            RegistryError::NotInRoom(ClientId(1))
        );
    }

    #[tokio::test]
    async fn test_list_rooms_reports_each_room() {
        let registry = Registry::default();
        registry
            .create_room_with_id(RoomId::from("b"), UserId(1), Some(4))
            .await
            .unwrap();
        registry
            .create_room_with_id(RoomId::from("a"), UserId(2), None)
            .await
            .unwrap();

        let rooms = registry.list_rooms().await;
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].room_id, RoomId::from("a"));
        assert_eq!(rooms[1].capacity, 4);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let registry = Registry::default();
        let (a, _ra) = client(1);
        registry.register(Arc::clone(&a)).await.unwrap();
        registry.open_room(ClientId(1), None).await.unwrap();

        registry.shutdown().await;

        assert!(a.is_closed());
        assert_eq!(registry.client_count().await, 0);
        assert_eq!(registry.room_count().await, 0);
    }
}
