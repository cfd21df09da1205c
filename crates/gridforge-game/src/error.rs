//! Error types for the move engine.

use crate::GameStatus;

/// Why a proposed move was rejected.
///
/// Variants are listed in validation order: when several checks would
/// fail, the engine reports the first one. A rejected move never
/// changes the game state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// The game is not in the Active status.
    #[error("game is not active")]
    GameNotActive,

    /// The target (row, col) is outside the 3×3 grid.
    #[error("invalid grid position ({row}, {col})")]
    OutOfBounds { row: i64, col: i64 },

    /// The target cell already holds a move.
    #[error("cell ({row}, {col}) already filled")]
    CellOccupied { row: usize, col: usize },

    /// The acting user is not the player at the current turn index.
    #[error("not your turn")]
    NotYourTurn,

    /// The submitted answer does not satisfy the cell's criteria.
    #[error("wrong answer for cell ({row}, {col})")]
    WrongAnswer { row: usize, col: usize },
}

/// A status change that the game lifecycle does not allow.
///
/// The lifecycle only moves forward:
/// `Waiting → Active → {Completed, Abandoned}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move game from {from} to {to}")]
pub struct InvalidTransition {
    pub from: GameStatus,
    pub to: GameStatus,
}
