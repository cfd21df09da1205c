//! A room: membership plus the authoritative game, behind its own lock.
//!
//! Every mutation takes the room's write lock, runs to completion, and
//! enqueues the resulting broadcasts before the lock is released. All
//! members therefore see room events in the same order, and two moves
//! in the same room can never interleave. Rooms don't share locks, so
//! activity in one room never waits on another.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use gridforge_game::{
    AnswerChecker, GameState, GameStatus, Move, MoveOutcome, MoveRequest,
    Player, UserId,
};
use gridforge_protocol::{ClientId, GameSnapshot, JsonCodec, RoomId, ServerMessage};
use gridforge_session::ClientHandle;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{GameRecord, GameRecorder, RoomConfig, RoomError};

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub creator: UserId,
    pub status: GameStatus,
    pub player_count: usize,
    pub capacity: usize,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// One member of a room.
///
/// The room only holds a `Weak` handle: the registry owns the
/// connection, and a member whose connection is gone is simply skipped
/// by broadcasts until it is removed.
#[derive(Debug)]
struct Member {
    client: Weak<ClientHandle>,
    user_id: UserId,
    username: String,
    /// Admission order. Only used to derive turn order on start.
    seq: u64,
}

#[derive(Debug, Default)]
struct RoomInner {
    members: HashMap<ClientId, Member>,
    next_seq: u64,
    game: GameState,
}

pub struct Room {
    id: RoomId,
    creator: UserId,
    capacity: usize,
    min_players: usize,
    created_at: u64,
    checker: Arc<dyn AnswerChecker>,
    recorder: Arc<dyn GameRecorder>,
    inner: RwLock<RoomInner>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("creator", &self.creator)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Room {
    /// Creates an empty room in the Waiting status.
    pub fn new(
        id: RoomId,
        creator: UserId,
        capacity: usize,
        config: &RoomConfig,
        checker: Arc<dyn AnswerChecker>,
        recorder: Arc<dyn GameRecorder>,
    ) -> Self {
        Self {
            id,
            creator,
            capacity,
            min_players: config.min_players,
            created_at: now_millis(),
            checker,
            recorder,
            inner: RwLock::new(RoomInner::default()),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn creator(&self) -> UserId {
        self.creator
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Admits a connection and broadcasts `player_joined` to every
    /// member, the new one included. Returns the new member count.
    pub async fn add_player(&self, client: &Arc<ClientHandle>) -> Result<usize, RoomError> {
        let mut inner = self.inner.write().await;

        if inner.members.len() >= self.capacity {
            return Err(RoomError::RoomFull(self.id.clone()));
        }
        if inner.members.contains_key(&client.id()) {
            return Err(RoomError::PlayerAlreadyInRoom(client.id(), self.id.clone()));
        }
        if inner.game.status != GameStatus::Waiting {
            return Err(RoomError::RoomNotWaiting(self.id.clone(), inner.game.status));
        }

        let identity = client.identity();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.members.insert(
            client.id(),
            Member {
                client: Arc::downgrade(client),
                user_id: identity.user_id,
                username: identity.username.clone(),
                seq,
            },
        );
        let player_count = inner.members.len();

        tracing::info!(
            room_id = %self.id,
            client_id = %client.id(),
            user_id = %identity.user_id,
            player_count,
            "player joined room"
        );
        inner.broadcast(&ServerMessage::PlayerJoined {
            room_id: self.id.clone(),
            player_id: client.id(),
            user_id: identity.user_id,
            username: identity.username.clone(),
            player_count,
        });

        Ok(player_count)
    }

    /// Removes a member. Returns `false` if it wasn't one.
    ///
    /// Remaining members get `player_left`. If the leaver was playing
    /// an Active game, the game is abandoned and a final `game_state`
    /// follows. The room itself is never destroyed here; that's the
    /// registry's call.
    pub async fn remove_player(&self, client_id: ClientId) -> bool {
        let mut inner = self.inner.write().await;

        let Some(member) = inner.members.remove(&client_id) else {
            return false;
        };

        tracing::info!(
            room_id = %self.id,
            %client_id,
            user_id = %member.user_id,
            remaining = inner.members.len(),
            "player left room"
        );
        inner.broadcast(&ServerMessage::PlayerLeft {
            room_id: self.id.clone(),
            player_id: client_id,
            user_id: member.user_id,
        });

        // The same user may still be seated through another connection.
        let still_seated = inner.members.values().any(|m| m.user_id == member.user_id);
        if inner.game.status == GameStatus::Active
            && inner.game.has_player(member.user_id)
            && !still_seated
            && inner.game.abandon().is_ok()
        {
            tracing::info!(room_id = %self.id, user_id = %member.user_id, "game abandoned");
            self.recorder.record(GameRecord::Finished {
                room_id: self.id.clone(),
                game_id: inner.game.game_id,
                status: GameStatus::Abandoned,
                winner: None,
            });
            let snapshot = inner.snapshot(&self.id);
            inner.broadcast(&snapshot);
        }

        true
    }

    // -----------------------------------------------------------------
    // Game lifecycle
    // -----------------------------------------------------------------

    /// Starts the game with an explicit turn order.
    pub async fn start_game(&self, players: Vec<Player>) -> Result<(), RoomError> {
        let mut inner = self.inner.write().await;
        self.begin(&mut inner, players)
    }

    /// Starts the game with the current members, in join order.
    pub async fn start(&self) -> Result<(), RoomError> {
        let mut inner = self.inner.write().await;

        if inner.game.status != GameStatus::Waiting {
            return Err(RoomError::RoomNotWaiting(self.id.clone(), inner.game.status));
        }
        let have = inner.members.len();
        if have < self.min_players {
            return Err(RoomError::NotEnoughPlayers {
                have,
                need: self.min_players,
            });
        }

        let players = inner.players_in_join_order();
        self.begin(&mut inner, players)
    }

    fn begin(&self, inner: &mut RoomInner, players: Vec<Player>) -> Result<(), RoomError> {
        inner
            .game
            .begin(players)
            .map_err(|e| RoomError::RoomNotWaiting(self.id.clone(), e.from))?;
        inner.game.game_id = self.recorder.game_started(&self.id, &inner.game.players);

        tracing::info!(
            room_id = %self.id,
            game_id = ?inner.game.game_id,
            players = inner.game.players.len(),
            "game started"
        );
        let snapshot = inner.snapshot(&self.id);
        inner.broadcast(&snapshot);
        Ok(())
    }

    /// Runs one move through the engine.
    ///
    /// On success every member receives `game_state` followed by
    /// `move_made`. On failure nothing changes and nothing is sent; the
    /// caller reports the error to the requester alone.
    pub async fn apply_move(
        &self,
        user_id: UserId,
        row: i64,
        col: i64,
        answer: String,
    ) -> Result<Move, RoomError> {
        let mut inner = self.inner.write().await;

        let request = MoveRequest {
            user_id,
            row,
            col,
            answer,
        };
        let (mv, outcome) = inner
            .game
            .apply_move(request, self.checker.as_ref(), now_millis())?;

        let snapshot = inner.snapshot(&self.id);
        inner.broadcast(&snapshot);
        inner.broadcast(&ServerMessage::MoveMade {
            room_id: self.id.clone(),
            mv: mv.clone(),
        });

        let game_id = inner.game.game_id;
        self.recorder.record(GameRecord::Move {
            room_id: self.id.clone(),
            game_id,
            mv: mv.clone(),
        });

        match outcome {
            MoveOutcome::Continue { next_turn } => {
                tracing::debug!(room_id = %self.id, %user_id, row, col, next_turn, "move applied");
            }
            MoveOutcome::Won { winner, line } => {
                tracing::info!(room_id = %self.id, %winner, ?line, "game won");
                self.recorder.record(GameRecord::Finished {
                    room_id: self.id.clone(),
                    game_id,
                    status: GameStatus::Completed,
                    winner: Some(winner),
                });
            }
            MoveOutcome::Draw => {
                tracing::info!(room_id = %self.id, "game drawn");
                self.recorder.record(GameRecord::Finished {
                    room_id: self.id.clone(),
                    game_id,
                    status: GameStatus::Completed,
                    winner: None,
                });
            }
        }

        Ok(mv)
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// Sends `msg` to every member.
    pub async fn broadcast(&self, msg: &ServerMessage) {
        self.inner.read().await.broadcast(msg);
    }

    /// A copy of the current game state.
    pub async fn snapshot(&self) -> GameState {
        self.inner.read().await.game.clone()
    }

    pub async fn status(&self) -> GameStatus {
        self.inner.read().await.game.status
    }

    pub async fn member_count(&self) -> usize {
        self.inner.read().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.members.is_empty()
    }

    pub async fn has_member(&self, client_id: ClientId) -> bool {
        self.inner.read().await.members.contains_key(&client_id)
    }

    pub async fn info(&self) -> RoomInfo {
        let inner = self.inner.read().await;
        RoomInfo {
            room_id: self.id.clone(),
            creator: self.creator,
            status: inner.game.status,
            player_count: inner.members.len(),
            capacity: self.capacity,
            created_at: self.created_at,
        }
    }
}

impl RoomInner {
    /// Encodes once, then enqueues on every live member without waiting.
    ///
    /// A member whose queue is full or closed misses this message; the
    /// others are unaffected.
    fn broadcast(&self, msg: &ServerMessage) {
        let frame: Arc<str> = match JsonCodec.encode_server(msg) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast");
                return;
            }
        };

        for (client_id, member) in &self.members {
            let Some(client) = member.client.upgrade() else {
                tracing::debug!(%client_id, "skipping member with dropped connection");
                continue;
            };
            if let Err(e) = client.send_raw(Arc::clone(&frame)) {
                tracing::debug!(%client_id, error = %e, "broadcast not delivered");
            }
        }
    }

    fn snapshot(&self, room_id: &RoomId) -> ServerMessage {
        ServerMessage::GameState(GameSnapshot {
            room_id: room_id.clone(),
            state: self.game.clone(),
        })
    }

    fn players_in_join_order(&self) -> Vec<Player> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|m| m.seq);
        members
            .into_iter()
            .map(|m| Player {
                user_id: m.user_id,
                username: m.username.clone(),
            })
            .collect()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryRecorder, NoopRecorder};
    use gridforge_game::{AcceptAnyAnswer, CellRef, MoveError};
    use gridforge_session::{Identity, OutboundQueue};

    fn room_with(capacity: usize, recorder: Arc<dyn GameRecorder>) -> Room {
        Room::new(
            RoomId::from("r1"),
            UserId(1),
            capacity,
            &RoomConfig::default(),
            Arc::new(AcceptAnyAnswer),
            recorder,
        )
    }

    fn room(capacity: usize) -> Room {
        room_with(capacity, Arc::new(NoopRecorder))
    }

    fn client(id: u64, user: u64) -> (Arc<ClientHandle>, OutboundQueue) {
        ClientHandle::new(ClientId(id), Identity::new(user, format!("user-{user}")), 16)
    }

    /// Drains every queued frame as JSON.
    fn drain(rx: &mut OutboundQueue) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    fn types(frames: &[serde_json::Value]) -> Vec<String> {
        frames
            .iter()
            .map(|f| f["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_add_player_broadcasts_to_everyone() {
        let room = room(2);
        let (a, mut rx_a) = client(1, 10);
        let (b, mut rx_b) = client(2, 20);

        assert_eq!(room.add_player(&a).await.unwrap(), 1);
        assert_eq!(room.add_player(&b).await.unwrap(), 2);

        let frames_a = drain(&mut rx_a);
        assert_eq!(types(&frames_a), ["player_joined", "player_joined"]);
        assert_eq!(frames_a[1]["payload"]["player_id"], 2);
        assert_eq!(frames_a[1]["payload"]["player_count"], 2);

        let frames_b = drain(&mut rx_b);
        assert_eq!(types(&frames_b), ["player_joined"]);
    }

    #[tokio::test]
    async fn test_add_player_full_room() {
        let room = room(1);
        let (a, _rx_a) = client(1, 10);
        let (b, _rx_b) = client(2, 20);
        room.add_player(&a).await.unwrap();

        let err = room.add_player(&b).await.unwrap_err();
        assert_eq!(err, RoomError::RoomFull(RoomId::from("r1")));
        assert_eq!(room.member_count().await, 1);
    }

    #[tokio::test]
    async fn test_add_player_twice() {
        let room = room(2);
        let (a, _rx) = client(1, 10);
        room.add_player(&a).await.unwrap();

        let err = room.add_player(&a).await.unwrap_err();
        assert!(matches!(err, RoomError::PlayerAlreadyInRoom(ClientId(1), _)));
    }

    #[tokio::test]
    async fn test_add_player_after_start() {
        let room = room(3);
        let (a, _ra) = client(1, 10);
        let (b, _rb) = client(2, 20);
        let (c, _rc) = client(3, 30);
        room.add_player(&a).await.unwrap();
        room.add_player(&b).await.unwrap();
        room.start().await.unwrap();

        let err = room.add_player(&c).await.unwrap_err();
        assert!(matches!(err, RoomError::RoomNotWaiting(_, GameStatus::Active)));
    }

    #[tokio::test]
    async fn test_remove_player_notifies_remaining() {
        let room = room(2);
        let (a, mut rx_a) = client(1, 10);
        let (b, mut rx_b) = client(2, 20);
        room.add_player(&a).await.unwrap();
        room.add_player(&b).await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        assert!(room.remove_player(ClientId(2)).await);
        assert!(!room.remove_player(ClientId(2)).await);

        let frames = drain(&mut rx_a);
        assert_eq!(types(&frames), ["player_left"]);
        assert_eq!(frames[0]["payload"]["player_id"], 2);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(room.member_count().await, 1);
    }

    #[tokio::test]
    async fn test_start_requires_min_players() {
        let room = room(2);
        let (a, _rx) = client(1, 10);
        room.add_player(&a).await.unwrap();

        let err = room.start().await.unwrap_err();
        assert_eq!(err, RoomError::NotEnoughPlayers { have: 1, need: 2 });
        assert_eq!(room.status().await, GameStatus::Waiting);
    }

    #[tokio::test]
    async fn test_start_uses_join_order_and_broadcasts_state() {
        let recorder = Arc::new(MemoryRecorder::new());
        let room = room_with(2, recorder.clone());
        let (a, mut rx_a) = client(1, 10);
        let (b, _rx_b) = client(2, 20);
        room.add_player(&a).await.unwrap();
        room.add_player(&b).await.unwrap();
        drain(&mut rx_a);

        room.start().await.unwrap();

        let state = room.snapshot().await;
        assert_eq!(state.status, GameStatus::Active);
        assert_eq!(state.players[0].user_id, UserId(10));
        assert_eq!(state.players[1].user_id, UserId(20));
        assert_eq!(state.current_turn, 0);
        assert_eq!(state.game_id, Some(1));

        let frames = drain(&mut rx_a);
        assert_eq!(types(&frames), ["game_state"]);
        assert_eq!(frames[0]["payload"]["status"], "active");
        assert_eq!(frames[0]["payload"]["room_id"], "r1");

        assert!(matches!(
            room.start().await,
            Err(RoomError::RoomNotWaiting(_, GameStatus::Active))
        ));
    }

    #[tokio::test]
    async fn test_start_game_with_explicit_order() {
        let room = room(2);
        let players = vec![
            Player { user_id: UserId(20), username: "b".into() },
            Player { user_id: UserId(10), username: "a".into() },
        ];
        room.start_game(players.clone()).await.unwrap();
        assert_eq!(room.snapshot().await.players, players);
        assert!(room.start_game(players).await.is_err());
    }

    #[tokio::test]
    async fn test_apply_move_broadcasts_state_then_move() {
        let room = room(2);
        let (a, mut rx_a) = client(1, 10);
        let (b, mut rx_b) = client(2, 20);
        room.add_player(&a).await.unwrap();
        room.add_player(&b).await.unwrap();
        room.start().await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        let mv = room.apply_move(UserId(10), 1, 1, "x".into()).await.unwrap();
        assert_eq!((mv.row, mv.col), (1, 1));

        for rx in [&mut rx_a, &mut rx_b] {
            let frames = drain(rx);
            assert_eq!(types(&frames), ["game_state", "move_made"]);
            assert_eq!(frames[0]["payload"]["current_turn"], 1);
            assert_eq!(frames[1]["payload"]["move"]["user_id"], 10);
        }
    }

    #[tokio::test]
    async fn test_rejected_move_sends_nothing() {
        let room = room(2);
        let (a, mut rx_a) = client(1, 10);
        let (b, _rx_b) = client(2, 20);
        room.add_player(&a).await.unwrap();
        room.add_player(&b).await.unwrap();
        room.start().await.unwrap();
        room.apply_move(UserId(10), 0, 0, "x".into()).await.unwrap();
        drain(&mut rx_a);
        let before = room.snapshot().await;

        // A moves twice in a row.
        let err = room.apply_move(UserId(10), 0, 1, "x".into()).await.unwrap_err();
        assert_eq!(err, RoomError::Move(MoveError::NotYourTurn));
        assert_eq!(room.snapshot().await, before);
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn test_winning_move_completes_game_and_records() {
        let recorder = Arc::new(MemoryRecorder::new());
        let room = room_with(2, recorder.clone());
        let (a, _ra) = client(1, 10);
        let (b, _rb) = client(2, 20);
        room.add_player(&a).await.unwrap();
        room.add_player(&b).await.unwrap();
        room.start().await.unwrap();

        for (user, row, col) in [(10, 0, 0), (20, 1, 1), (10, 0, 1), (20, 1, 0), (10, 0, 2)] {
            room.apply_move(UserId(user), row, col, "x".into()).await.unwrap();
        }

        let state = room.snapshot().await;
        assert_eq!(state.status, GameStatus::Completed);
        assert_eq!(state.winner, Some(UserId(10)));
        assert!(state.grid.get(CellRef::new(0, 2).unwrap()).is_some());

        let records = recorder.records();
        assert_eq!(records.len(), 6);
        assert_eq!(
            records[5],
            GameRecord::Finished {
                room_id: RoomId::from("r1"),
                game_id: Some(1),
                status: GameStatus::Completed,
                winner: Some(UserId(10)),
            }
        );
    }

    #[tokio::test]
    async fn test_player_leaving_active_game_abandons_it() {
        let room = room(2);
        let (a, mut rx_a) = client(1, 10);
        let (b, _rx_b) = client(2, 20);
        room.add_player(&a).await.unwrap();
        room.add_player(&b).await.unwrap();
        room.start().await.unwrap();
        drain(&mut rx_a);

        room.remove_player(ClientId(2)).await;

        assert_eq!(room.status().await, GameStatus::Abandoned);
        let frames = drain(&mut rx_a);
        assert_eq!(types(&frames), ["player_left", "game_state"]);
        assert_eq!(frames[1]["payload"]["status"], "abandoned");
        assert!(frames[1]["payload"]["winner"].is_null());
    }

    #[tokio::test]
    async fn test_broadcast_skips_saturated_member() {
        let room = room(2);
        let (slow, mut rx_slow) =
            ClientHandle::new(ClientId(1), Identity::new(10, "slow"), 1);
        let (fast, mut rx_fast) = client(2, 20);
        room.add_player(&slow).await.unwrap();
        room.add_player(&fast).await.unwrap();

        // The slow client's single slot already holds its first
        // player_joined; nothing else fits.
        room.broadcast(&ServerMessage::error("ping")).await;

        let slow_frames = drain(&mut rx_slow);
        assert_eq!(types(&slow_frames), ["player_joined"]);
        let fast_frames = drain(&mut rx_fast);
        assert_eq!(types(&fast_frames), ["player_joined", "error"]);
    }

    #[tokio::test]
    async fn test_broadcast_skips_dropped_connection() {
        let room = room(2);
        let (a, _rx_a) = client(1, 10);
        let (b, mut rx_b) = client(2, 20);
        room.add_player(&a).await.unwrap();
        room.add_player(&b).await.unwrap();
        drain(&mut rx_b);

        drop(a);
        room.broadcast(&ServerMessage::error("still here")).await;

        assert_eq!(types(&drain(&mut rx_b)), ["error"]);
        // The dead member still counts until it is removed.
        assert_eq!(room.member_count().await, 2);
    }

    #[tokio::test]
    async fn test_info_reports_metadata() {
        let room = room(4);
        let (a, _rx) = client(1, 10);
        room.add_player(&a).await.unwrap();

        let info = room.info().await;
        assert_eq!(info.room_id, RoomId::from("r1"));
        assert_eq!(info.creator, UserId(1));
        assert_eq!(info.player_count, 1);
        assert_eq!(info.capacity, 4);
        assert_eq!(info.status, GameStatus::Waiting);
        assert!(info.created_at > 0);
    }
}
