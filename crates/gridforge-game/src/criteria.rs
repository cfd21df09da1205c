//! Answer criteria: the capability that decides if an answer fits a cell.
//!
//! Every cell of the grid sits at the crossing of a row category and a
//! column category ("played for Boston" × "won an MVP"). Knowing which
//! answers satisfy both is trivia content, which lives outside this
//! server. The engine only asks through [`AnswerChecker`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{CellRef, GRID_SIZE};

/// Decides whether `answer` satisfies the rule of `cell`.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one checker is shared by every room, and
///   rooms are driven from many Tokio tasks at once.
///
/// Implementations must be fast and must not block: the engine calls
/// `check` while the room's lock is held.
pub trait AnswerChecker: Send + Sync + 'static {
    fn check(&self, cell: CellRef, answer: &str) -> bool;
}

/// Accepts every answer. Useful for development and for tests that only
/// care about grid mechanics.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyAnswer;

impl AnswerChecker for AcceptAnyAnswer {
    fn check(&self, _cell: CellRef, _answer: &str) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// CategoryGrid
// ---------------------------------------------------------------------------

/// The rule for one cell: its two categories and the answers that fit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCell {
    pub row_category: String,
    pub col_category: String,
    /// Accepted answers. Matching ignores case and surrounding whitespace.
    #[serde(default)]
    pub accepted: Vec<String>,
}

/// A full 3×3 set of cell rules.
///
/// Loaded from JSON shaped like:
///
/// ```json
/// { "categories": [
///     [ { "row_category": "Red Sox", "col_category": "MVP",
///         "accepted": ["Ted Williams", "Mookie Betts"] }, ... ],
///     ...
/// ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CategoryGridFile", into = "CategoryGridFile")]
pub struct CategoryGrid {
    cells: [[CategoryCell; GRID_SIZE]; GRID_SIZE],
    /// Normalized accepted answers per cell, built once at load time.
    normalized: [[HashSet<String>; GRID_SIZE]; GRID_SIZE],
}

/// On-disk shape of a [`CategoryGrid`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryGridFile {
    categories: Vec<Vec<CategoryCell>>,
}

impl CategoryGrid {
    /// Builds a grid from exactly three rows of three cells each.
    pub fn new(
        cells: [[CategoryCell; GRID_SIZE]; GRID_SIZE],
    ) -> Self {
        let normalized = cells.clone().map(|row| {
            row.map(|cell| cell.accepted.iter().map(|a| normalize(a)).collect())
        });
        Self { cells, normalized }
    }

    /// Parses a grid from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The rule of one cell.
    pub fn cell(&self, cell: CellRef) -> &CategoryCell {
        &self.cells[cell.row()][cell.col()]
    }
}

impl AnswerChecker for CategoryGrid {
    fn check(&self, cell: CellRef, answer: &str) -> bool {
        self.normalized[cell.row()][cell.col()].contains(&normalize(answer))
    }
}

impl TryFrom<CategoryGridFile> for CategoryGrid {
    type Error = String;

    fn try_from(file: CategoryGridFile) -> Result<Self, Self::Error> {
        let rows: Vec<[CategoryCell; GRID_SIZE]> = file
            .categories
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let len = row.len();
                <[CategoryCell; GRID_SIZE]>::try_from(row).map_err(|_| {
                    format!("row {i} has {len} cells, expected {GRID_SIZE}")
                })
            })
            .collect::<Result<_, _>>()?;

        let count = rows.len();
        let cells = <[[CategoryCell; GRID_SIZE]; GRID_SIZE]>::try_from(rows)
            .map_err(|_| format!("grid has {count} rows, expected {GRID_SIZE}"))?;

        Ok(Self::new(cells))
    }
}

impl From<CategoryGrid> for CategoryGridFile {
    fn from(grid: CategoryGrid) -> Self {
        Self {
            categories: grid.cells.into_iter().map(Vec::from).collect(),
        }
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}
