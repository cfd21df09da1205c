//! Move engine for the Gridforge trivia grid.
//!
//! This crate is pure game rules with no networking or concurrency.
//! Everything here is a plain state transition over a [`GameState`]:
//!
//! - **Grid** ([`Grid`], [`CellRef`], [`Line`]): the 3×3 board and
//!   row/column/diagonal win detection.
//! - **State** ([`GameState`], [`GameStatus`], [`Move`], [`Player`]):
//!   the authoritative record of one match.
//! - **Criteria** ([`AnswerChecker`]): the capability that decides
//!   whether a trivia answer satisfies a cell's rule. The engine calls
//!   it; it never implements trivia knowledge itself.
//!
//! # Move validation
//!
//! ```text
//! Active? → in bounds? → cell empty? → your turn? → answer correct?
//!    │          │             │             │              │
//!    ▼          ▼             ▼             ▼              ▼
//! GameNotActive OutOfBounds CellOccupied NotYourTurn   WrongAnswer
//! ```
//!
//! The first failing check wins and the state is left untouched.

mod criteria;
mod error;
mod grid;
mod state;

pub use criteria::{AcceptAnyAnswer, AnswerChecker, CategoryCell, CategoryGrid};
pub use error::{InvalidTransition, MoveError};
pub use grid::{CellRef, Grid, Line, GRID_SIZE};
pub use state::{
    GameState, GameStatus, Move, MoveOutcome, MoveRequest, Player, UserId,
};
