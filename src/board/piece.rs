//! Piece types and per-piece state.
//!
//! Pieces live in a fixed arena for the whole match. Capture moves a piece to
//! the off-board state (`tile == None`); it is never removed, so indices stay
//! valid as wire identifiers.

use serde::{Deserialize, Serialize};

use super::geometry::TileId;

/// Index into the board's piece arena.
pub type PieceId = u16;

/// Number of piece types.
pub const PIECE_LIM: usize = 10;

/// The kind of a piece. Each kind has its own movement and engagement rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PieceType {
    Ranger = 0,
    Spearman = 1,
    Crossbowman = 2,
    Catapult = 3,
    Trebuchet = 4,
    Lancer = 5,
    Warhorse = 6,
    Elephant = 7,
    Dragon = 8,
    Throne = 9,
}

/// All piece types in arena order.
pub const ALL_PIECE_TYPES: [PieceType; PIECE_LIM] = [
    PieceType::Ranger,
    PieceType::Spearman,
    PieceType::Crossbowman,
    PieceType::Catapult,
    PieceType::Trebuchet,
    PieceType::Lancer,
    PieceType::Warhorse,
    PieceType::Elephant,
    PieceType::Dragon,
    PieceType::Throne,
];

impl PieceType {
    pub const fn name(self) -> &'static str {
        match self {
            PieceType::Ranger => "ranger",
            PieceType::Spearman => "spearman",
            PieceType::Crossbowman => "crossbowman",
            PieceType::Catapult => "catapult",
            PieceType::Trebuchet => "trebuchet",
            PieceType::Lancer => "lancer",
            PieceType::Warhorse => "warhorse",
            PieceType::Elephant => "elephant",
            PieceType::Dragon => "dragon",
            PieceType::Throne => "throne",
        }
    }

    pub fn from_u8(v: u8) -> Option<PieceType> {
        ALL_PIECE_TYPES.get(usize::from(v)).copied()
    }

    pub fn from_name(s: &str) -> Option<PieceType> {
        ALL_PIECE_TYPES
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
    }

    /// The `(min, max)` firing band for ranged pieces, `None` for melee pieces.
    pub const fn firing_area(self) -> Option<(u16, u16)> {
        match self {
            PieceType::Crossbowman => Some((1, 1)),
            PieceType::Catapult => Some((1, 2)),
            PieceType::Trebuchet => Some((3, 3)),
            _ => None,
        }
    }

    pub const fn is_ranged(self) -> bool {
        self.firing_area().is_some()
    }

    /// Bit of this type in a capturer mask.
    pub const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// A single piece in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceType,
    /// Current tile, `None` while captured or not yet placed.
    pub tile: Option<TileId>,
    /// Last fortress a throne stood on; used to grant favor picks.
    pub last_fortress: Option<TileId>,
}

impl Piece {
    pub const fn new(kind: PieceType) -> Self {
        Self {
            kind,
            tile: None,
            last_fortress: None,
        }
    }

    pub const fn on_board(&self) -> bool {
        self.tile.is_some()
    }
}
