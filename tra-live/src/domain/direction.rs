//! Route direction.

use std::fmt;

/// Error returned for a direction code outside the feed's enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid direction code: {0}")]
pub struct InvalidDirection(pub i64);

/// Coarse orientation of a train around the network.
///
/// The feed encodes this as `0` (clockwise, 順行) and `1`
/// (counterclockwise, 逆行).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Clockwise,
    Counterclockwise,
}

impl Direction {
    /// Convert a feed direction code.
    pub fn from_code(code: i64) -> Result<Self, InvalidDirection> {
        match code {
            0 => Ok(Direction::Clockwise),
            1 => Ok(Direction::Counterclockwise),
            other => Err(InvalidDirection(other)),
        }
    }

    /// The feed code for this direction.
    pub fn code(self) -> u8 {
        match self {
            Direction::Clockwise => 0,
            Direction::Counterclockwise => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Clockwise => f.write_str("clockwise"),
            Direction::Counterclockwise => f.write_str("counterclockwise"),
        }
    }
}
