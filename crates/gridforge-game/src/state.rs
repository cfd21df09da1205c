//! Game state and the move state transition.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AnswerChecker, CellRef, Grid, InvalidTransition, Line, MoveError};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The authenticated user behind a connection.
///
/// Issued by the authentication collaborator, not by this server, so it
/// identifies a person across connections. Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A participant in a started game. Index in the player list = turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: UserId,
    pub username: String,
}

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// The lifecycle of a match.
///
/// ```text
/// Waiting ──start──→ Active ──win/draw──→ Completed
///                      │
///                      └──player gone──→ Abandoned
/// ```
///
/// Transitions never go backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Waiting,
    Active,
    Completed,
    Abandoned,
}

impl GameStatus {
    /// Returns `true` if moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Abandoned)
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// One filled cell. Immutable once written to the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub user_id: UserId,
    pub username: String,
    pub row: usize,
    pub col: usize,
    pub answer: String,
    /// Always `true` for moves that reach the grid: wrong answers are
    /// rejected before they are applied. Kept on the wire for clients
    /// and persistence that expect the flag.
    pub is_valid: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// A move as proposed by a client, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub user_id: UserId,
    pub row: i64,
    pub col: i64,
    pub answer: String,
}

/// What a successful move did to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game goes on; `next_turn` is the new turn index.
    Continue { next_turn: usize },
    /// The move completed `line`; the game is over and the turn frozen.
    Won { winner: UserId, line: Line },
    /// The move filled the last cell without completing a line.
    Draw,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The authoritative state of one match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Id assigned by the persistence collaborator when the game starts.
    pub game_id: Option<u64>,
    pub status: GameStatus,
    /// Turn order. Fixed when the game starts.
    pub players: Vec<Player>,
    /// Index into `players` whose move is accepted next.
    pub current_turn: usize,
    pub winner: Option<UserId>,
    pub grid: Grid,
    /// Every applied move, in order. Append-only.
    pub moves: Vec<Move>,
}

impl GameState {
    /// A fresh game in the Waiting status with no players.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves Waiting → Active with `players` in the given turn order.
    pub fn begin(&mut self, players: Vec<Player>) -> Result<(), InvalidTransition> {
        self.transition(GameStatus::Active)?;
        self.players = players;
        self.current_turn = 0;
        Ok(())
    }

    /// Moves Active → Abandoned. The winner stays unset.
    pub fn abandon(&mut self) -> Result<(), InvalidTransition> {
        self.transition(GameStatus::Abandoned)
    }

    fn transition(&mut self, to: GameStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// The player whose turn it is, if the game has players.
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_turn)
    }

    /// Returns `true` if `user` is one of the game's players.
    pub fn has_player(&self, user: UserId) -> bool {
        self.players.iter().any(|p| p.user_id == user)
    }

    /// Runs every check of a move without touching the state.
    ///
    /// Returns the target cell on success. Check order matters: the
    /// first failing check is the one reported.
    pub fn validate_move(
        &self,
        request: &MoveRequest,
        checker: &dyn AnswerChecker,
    ) -> Result<CellRef, MoveError> {
        if self.status != GameStatus::Active {
            return Err(MoveError::GameNotActive);
        }

        let cell = CellRef::new(request.row, request.col).ok_or(
            MoveError::OutOfBounds {
                row: request.row,
                col: request.col,
            },
        )?;

        if !self.grid.is_empty_at(cell) {
            return Err(MoveError::CellOccupied {
                row: cell.row(),
                col: cell.col(),
            });
        }

        match self.current_player() {
            Some(player) if player.user_id == request.user_id => {}
            _ => return Err(MoveError::NotYourTurn),
        }

        if !checker.check(cell, &request.answer) {
            return Err(MoveError::WrongAnswer {
                row: cell.row(),
                col: cell.col(),
            });
        }

        Ok(cell)
    }

    /// Validates and applies one move.
    ///
    /// On `Err` the state is exactly as it was. On `Ok` the move has
    /// been appended to the history, written into its cell, and either
    /// the turn advanced or the game ended.
    pub fn apply_move(
        &mut self,
        request: MoveRequest,
        checker: &dyn AnswerChecker,
        timestamp: u64,
    ) -> Result<(Move, MoveOutcome), MoveError> {
        let cell = self.validate_move(&request, checker)?;

        // validate_move guarantees a current player exists.
        let username = self
            .current_player()
            .map(|p| p.username.clone())
            .unwrap_or_default();

        let mv = Move {
            user_id: request.user_id,
            username,
            row: cell.row(),
            col: cell.col(),
            answer: request.answer,
            is_valid: true,
            timestamp,
        };

        self.grid.place(cell, mv.clone());
        self.moves.push(mv.clone());

        let outcome = if let Some(line) = self.grid.winning_line(mv.user_id) {
            self.status = GameStatus::Completed;
            self.winner = Some(mv.user_id);
            MoveOutcome::Won {
                winner: mv.user_id,
                line,
            }
        } else {
            self.current_turn = (self.current_turn + 1) % self.players.len();
            if self.grid.is_full() {
                self.status = GameStatus::Completed;
                MoveOutcome::Draw
            } else {
                MoveOutcome::Continue {
                    next_turn: self.current_turn,
                }
            }
        };

        Ok((mv, outcome))
    }
}
