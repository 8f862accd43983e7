//! Error types.
//!
//! Local rule violations, wire decoding failures, connection failures, and
//! configuration or setup problems are kept apart so callers can tell a
//! rejected move (show it to the player) from a broken match (abandon it).

use std::io;

use crate::board::piece::PieceType;
use crate::board::tile::TileType;

/// A rejected local action. The message is meant to be shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RuleViolation(pub String);

impl RuleViolation {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Malformed frame or payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown message code {0}")]
    UnknownCode(u8),

    #[error("{what} payload too short: need {need} bytes, got {got}")]
    Truncated {
        what: &'static str,
        need: usize,
        got: usize,
    },

    #[error("payload of {0} bytes exceeds the frame limit")]
    Oversized(usize),

    #[error("invalid {field} value {value}")]
    InvalidValue { field: &'static str, value: u32 },
}

/// Connection-level failure. Always fatal to the current match.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("peer disconnected")]
    Disconnected,

    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Wire(#[from] WireError),

    #[error("unexpected message: {0}")]
    Unexpected(String),
}

/// Failure to load or save a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] io::Error),

    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A home arrangement that does not satisfy the configured quotas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("Position {x}|{y} is outside the home area")]
    OutOfHome { x: u16, y: u16 },

    #[error("Middle slot {0} is not available")]
    BadMiddleSlot(u16),

    #[error("Too many {0} tiles")]
    TooManyTiles(&'static str),

    #[error("Too many {0} pieces")]
    TooManyPieces(&'static str),

    #[error("Two pieces at {x}|{y}")]
    PieceCollision { x: u16, y: u16 },

    #[error("Fortress at {x}|{y} not allowed")]
    FortressNotAllowed { x: u16, y: u16 },

    #[error("{tile} missing in row {row}")]
    TileMissingInRow { tile: String, row: u16 },

    #[error("Not all tiles were placed")]
    TilesNotPlaced,

    #[error("{0} wasn't placed")]
    MiddleNotPlaced(String),

    #[error("{0} wasn't placed")]
    PieceNotPlaced(String),

    #[error("{0} piece picks left")]
    PicksLeft(u16),

    #[error("setup io error: {0}")]
    Io(String),
}

impl SetupError {
    pub(crate) fn middle_missing(kind: TileType) -> Self {
        SetupError::MiddleNotPlaced(first_upper(kind.name()))
    }

    pub(crate) fn piece_missing(kind: PieceType) -> Self {
        SetupError::PieceNotPlaced(first_upper(kind.name()))
    }
}

/// Failure to read or write a match recording.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("replay io error: {0}")]
    Io(#[from] io::Error),

    #[error("replay json error at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("replay file is empty")]
    Empty,

    #[error("replay board does not match its configuration")]
    BoardMismatch,
}

/// Error returned by the game's entry points.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Rule(#[from] RuleViolation),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("not allowed in the current phase: {0}")]
    Phase(&'static str),
}

impl GameError {
    /// Shorthand for a rule violation.
    pub fn rule(msg: impl Into<String>) -> Self {
        GameError::Rule(RuleViolation::new(msg))
    }

    /// True when the match cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GameError::Net(_))
    }
}

/// Upper-cases the first letter of a name for use at the start of a message.
pub fn first_upper(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_violation_displays_message() {
        let err = GameError::rule("Can't move there");
        assert_eq!(err.to_string(), "Can't move there");
        assert!(!err.is_fatal());
    }

    #[test]
    fn net_errors_are_fatal() {
        let err = GameError::from(NetError::Disconnected);
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "peer disconnected");
    }

    #[test]
    fn setup_messages_use_capitalized_names() {
        let err = SetupError::middle_missing(TileType::Water);
        assert_eq!(err.to_string(), "Water wasn't placed");
        let err = SetupError::piece_missing(PieceType::Dragon);
        assert_eq!(err.to_string(), "Dragon wasn't placed");
    }

    #[test]
    fn first_upper_handles_empty() {
        assert_eq!(first_upper("lancer"), "Lancer");
        assert_eq!(first_upper(""), "");
    }
}
