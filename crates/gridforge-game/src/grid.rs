//! The 3×3 board and line (win) detection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Move, UserId};

/// Width and height of the board.
pub const GRID_SIZE: usize = 3;

// ---------------------------------------------------------------------------
// CellRef
// ---------------------------------------------------------------------------

/// A bounds-checked (row, col) coordinate on the board.
///
/// The only way to build one is [`CellRef::new`], so holding a `CellRef`
/// means the coordinate is already known to be inside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    row: usize,
    col: usize,
}

impl CellRef {
    /// Returns `None` when either coordinate falls outside `[0, 3)`.
    ///
    /// Coordinates arrive from the wire as signed integers, so negative
    /// values are rejected here rather than at decode time.
    pub fn new(row: i64, col: i64) -> Option<Self> {
        let in_range = |v: i64| (0..GRID_SIZE as i64).contains(&v);
        if in_range(row) && in_range(col) {
            Some(Self {
                row: row as usize,
                col: col as usize,
            })
        } else {
            None
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

/// One of the eight lines that can win the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Line {
    Row(usize),
    Column(usize),
    /// Top-left to bottom-right.
    Diagonal,
    /// Top-right to bottom-left.
    AntiDiagonal,
}

impl Line {
    /// All eight lines, rows first, then columns, then both diagonals.
    pub const ALL: [Line; 8] = [
        Line::Row(0),
        Line::Row(1),
        Line::Row(2),
        Line::Column(0),
        Line::Column(1),
        Line::Column(2),
        Line::Diagonal,
        Line::AntiDiagonal,
    ];

    /// The three (row, col) positions covered by this line.
    pub fn cells(self) -> [(usize, usize); GRID_SIZE] {
        match self {
            Line::Row(r) => [(r, 0), (r, 1), (r, 2)],
            Line::Column(c) => [(0, c), (1, c), (2, c)],
            Line::Diagonal => [(0, 0), (1, 1), (2, 2)],
            Line::AntiDiagonal => [(0, 2), (1, 1), (2, 0)],
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// The board: a 3×3 array of optional moves.
///
/// Serialized as a plain nested array (`[[null, {...}, null], ...]`) so
/// clients can index it directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    cells: [[Option<Move>; GRID_SIZE]; GRID_SIZE],
}

impl Grid {
    /// Returns the move occupying `cell`, if any.
    pub fn get(&self, cell: CellRef) -> Option<&Move> {
        self.cells[cell.row][cell.col].as_ref()
    }

    pub fn is_empty_at(&self, cell: CellRef) -> bool {
        self.get(cell).is_none()
    }

    /// Writes a move into an empty cell.
    ///
    /// Returns `false` (and leaves the grid alone) if the cell is
    /// already occupied. Cells are never overwritten.
    pub(crate) fn place(&mut self, cell: CellRef, mv: Move) -> bool {
        let slot = &mut self.cells[cell.row][cell.col];
        if slot.is_some() {
            return false;
        }
        *slot = Some(mv);
        true
    }

    /// Returns the first line fully owned by `user`, scanning all eight.
    pub fn winning_line(&self, user: UserId) -> Option<Line> {
        Line::ALL.into_iter().find(|line| {
            line.cells().iter().all(|&(r, c)| {
                self.cells[r][c]
                    .as_ref()
                    .is_some_and(|mv| mv.user_id == user)
            })
        })
    }

    /// Returns `true` once every cell holds a move.
    pub fn is_full(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(Option::is_some))
    }

    /// Number of occupied cells.
    pub fn filled(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|slot| slot.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(user: u64, row: i64, col: i64) -> (CellRef, Move) {
        let cell = CellRef::new(row, col).unwrap();
        let mv = Move {
            user_id: UserId(user),
            username: format!("user-{user}"),
            row: cell.row(),
            col: cell.col(),
            answer: "x".into(),
            is_valid: true,
            timestamp: 0,
        };
        (cell, mv)
    }

    fn grid_with(marks: &[(u64, i64, i64)]) -> Grid {
        let mut grid = Grid::default();
        for &(user, row, col) in marks {
            let (cell, mv) = mark(user, row, col);
            assert!(grid.place(cell, mv));
        }
        grid
    }

    #[test]
    fn test_cell_ref_rejects_out_of_range() {
        assert!(CellRef::new(0, 0).is_some());
        assert!(CellRef::new(2, 2).is_some());
        assert!(CellRef::new(3, 0).is_none());
        assert!(CellRef::new(0, 3).is_none());
        assert!(CellRef::new(-1, 1).is_none());
    }

    #[test]
    fn test_place_never_overwrites() {
        let mut grid = Grid::default();
        let (cell, first) = mark(1, 1, 1);
        let (_, second) = mark(2, 1, 1);
        assert!(grid.place(cell, first));
        assert!(!grid.place(cell, second));
        assert_eq!(grid.get(cell).unwrap().user_id, UserId(1));
    }

    #[test]
    fn test_winning_line_detects_every_line() {
        for line in Line::ALL {
            let marks: Vec<(u64, i64, i64)> = line
                .cells()
                .iter()
                .map(|&(r, c)| (7, r as i64, c as i64))
                .collect();
            let grid = grid_with(&marks);
            assert_eq!(grid.winning_line(UserId(7)), Some(line), "{line:?}");
            assert_eq!(grid.winning_line(UserId(8)), None);
        }
    }

    #[test]
    fn test_winning_line_requires_same_owner() {
        let grid = grid_with(&[(1, 0, 0), (1, 0, 1), (2, 0, 2)]);
        assert_eq!(grid.winning_line(UserId(1)), None);
        assert_eq!(grid.winning_line(UserId(2)), None);
    }

    #[test]
    fn test_is_full_and_filled() {
        let mut marks = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                marks.push(((r * 3 + c) as u64, r, c));
            }
        }
        let grid = grid_with(&marks[..8]);
        assert!(!grid.is_full());
        assert_eq!(grid.filled(), 8);

        let grid = grid_with(&marks);
        assert!(grid.is_full());
    }

    #[test]
    fn test_grid_serializes_as_nested_array() {
        let grid = grid_with(&[(1, 0, 0)]);
        let json = serde_json::to_value(&grid).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0][0]["user_id"], 1);
        assert!(json[1][1].is_null());
    }
}
