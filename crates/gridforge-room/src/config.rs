//! Room configuration.

use serde::{Deserialize, Serialize};

use crate::RoomError;

/// Settings shared by every room the registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Capacity used when `create_room` doesn't name one.
    pub default_capacity: usize,

    /// Largest capacity a client may ask for.
    pub max_capacity: usize,

    /// Minimum members needed before `start_game` is accepted.
    pub min_players: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_capacity: 2,
            max_capacity: 8,
            min_players: 2,
        }
    }
}

impl RoomConfig {
    /// Turns a requested capacity into the one the room will use.
    ///
    /// `None` picks the default. Zero and anything above
    /// `max_capacity` are refused.
    pub fn resolve_capacity(&self, requested: Option<usize>) -> Result<usize, RoomError> {
        match requested {
            None => Ok(self.default_capacity),
            Some(n) if n == 0 || n > self.max_capacity => Err(RoomError::InvalidCapacity {
                requested: n,
                max: self.max_capacity,
            }),
            Some(n) => Ok(n),
        }
    }
}
