//! Persistence hook for finished and in-progress games.
//!
//! Rooms report what happens to their game through a [`GameRecorder`].
//! Gridforge does not store anything durably itself; a deployment
//! plugs in a recorder that writes to its database. Calls are made
//! while the room's lock is held, so implementations must not block:
//! hand the record to a channel or a background task if the sink is slow.

use std::sync::{Mutex, PoisonError};

use gridforge_game::{GameStatus, Move, Player, UserId};
use gridforge_protocol::RoomId;

/// One thing worth persisting about a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRecord {
    /// A move was applied.
    Move {
        room_id: RoomId,
        game_id: Option<u64>,
        mv: Move,
    },
    /// The game reached a terminal status.
    Finished {
        room_id: RoomId,
        game_id: Option<u64>,
        status: GameStatus,
        winner: Option<UserId>,
    },
}

/// Write-only sink for game history.
pub trait GameRecorder: Send + Sync + 'static {
    /// Called once when a game starts. The returned id, if any, is
    /// stored as the game's `game_id` and echoed in later records.
    fn game_started(&self, room_id: &RoomId, players: &[Player]) -> Option<u64>;

    /// Called for every move and once when the game ends.
    fn record(&self, record: GameRecord);
}

/// Discards everything and assigns no ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl GameRecorder for NoopRecorder {
    fn game_started(&self, _room_id: &RoomId, _players: &[Player]) -> Option<u64> {
        None
    }

    fn record(&self, _record: GameRecord) {}
}

/// Keeps every record in memory and hands out sequential game ids
/// starting at 1. Intended for tests and single-process demos.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    inner: Mutex<MemoryLog>,
}

#[derive(Debug, Default)]
struct MemoryLog {
    started: Vec<(u64, RoomId, Vec<Player>)>,
    records: Vec<GameRecord>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Games started so far, as `(game_id, room_id, players)`.
    pub fn started(&self) -> Vec<(u64, RoomId, Vec<Player>)> {
        self.log().started.clone()
    }

    /// Every record received, in order.
    pub fn records(&self) -> Vec<GameRecord> {
        self.log().records.clone()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, MemoryLog> {
        // A panic elsewhere can't leave the log half-written: every
        // mutation is a single push.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GameRecorder for MemoryRecorder {
    fn game_started(&self, room_id: &RoomId, players: &[Player]) -> Option<u64> {
        let mut log = self.log();
        let id = log.started.len() as u64 + 1;
        log.started.push((id, room_id.clone(), players.to_vec()));
        Some(id)
    }

    fn record(&self, record: GameRecord) {
        self.log().records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<Player> {
        vec![Player {
            user_id: UserId(1),
            username: "alice".into(),
        }]
    }

    #[test]
    fn test_memory_recorder_assigns_sequential_ids() {
        let recorder = MemoryRecorder::new();
        let room = RoomId::from("r1");
        assert_eq!(recorder.game_started(&room, &players()), Some(1));
        assert_eq!(recorder.game_started(&room, &players()), Some(2));
        assert_eq!(recorder.started().len(), 2);
    }

    #[test]
    fn test_memory_recorder_keeps_records_in_order() {
        let recorder = MemoryRecorder::new();
        let finished = GameRecord::Finished {
            room_id: RoomId::from("r1"),
            game_id: Some(1),
            status: GameStatus::Completed,
            winner: Some(UserId(1)),
        };
        recorder.record(finished.clone());
        assert_eq!(recorder.records(), vec![finished]);
    }

    #[test]
    fn test_noop_recorder_assigns_nothing() {
        assert_eq!(NoopRecorder.game_started(&RoomId::from("r"), &players()), None);
    }
}
