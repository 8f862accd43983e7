//! Tile types, tile tops, and per-tile state.

use serde::{Deserialize, Serialize};

/// Number of tile types that have placement quotas (everything below `Fortress`).
pub const TILE_LIM: usize = 4;

/// Terrain of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TileType {
    Plains = 0,
    Forest = 1,
    Mountain = 2,
    Water = 3,
    Fortress = 4,
    Empty = 5,
}

/// Tile types in quota order.
pub const QUOTA_TILE_TYPES: [TileType; TILE_LIM] = [
    TileType::Plains,
    TileType::Forest,
    TileType::Mountain,
    TileType::Water,
];

impl TileType {
    pub const fn name(self) -> &'static str {
        match self {
            TileType::Plains => "plains",
            TileType::Forest => "forest",
            TileType::Mountain => "mountain",
            TileType::Water => "water",
            TileType::Fortress => "fortress",
            TileType::Empty => "",
        }
    }

    /// Parses the 4-bit wire value.
    pub fn from_u8(v: u8) -> Option<TileType> {
        match v {
            0 => Some(TileType::Plains),
            1 => Some(TileType::Forest),
            2 => Some(TileType::Mountain),
            3 => Some(TileType::Water),
            4 => Some(TileType::Fortress),
            5 => Some(TileType::Empty),
            _ => None,
        }
    }

    pub fn from_name(s: &str) -> Option<TileType> {
        QUOTA_TILE_TYPES
            .into_iter()
            .chain([TileType::Fortress])
            .find(|t| t.name().eq_ignore_ascii_case(s))
    }

    /// Index into quota arrays, `None` for fortress and empty.
    pub fn quota_index(self) -> Option<usize> {
        let i = self as usize;
        (i < TILE_LIM).then_some(i)
    }
}

/// A farm or city marker placed on top of a tile by a throne.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileTop {
    OwnFarm = 0,
    OwnCity = 1,
    EneFarm = 2,
    EneCity = 3,
}

/// Wire nibble meaning "no tile top".
pub const TILE_TOP_NONE: u8 = 4;

pub const ALL_TILE_TOPS: [TileTop; 4] = [
    TileTop::OwnFarm,
    TileTop::OwnCity,
    TileTop::EneFarm,
    TileTop::EneCity,
];

impl TileTop {
    pub fn from_u8(v: u8) -> Option<TileTop> {
        ALL_TILE_TOPS.get(usize::from(v)).copied()
    }

    pub const fn is_farm(self) -> bool {
        matches!(self, TileTop::OwnFarm | TileTop::EneFarm)
    }

    pub const fn is_city(self) -> bool {
        matches!(self, TileTop::OwnCity | TileTop::EneCity)
    }

    pub const fn is_own(self) -> bool {
        matches!(self, TileTop::OwnFarm | TileTop::OwnCity)
    }

    /// The same marker as seen from the opponent's side.
    pub const fn invert(self) -> TileTop {
        match self {
            TileTop::OwnFarm => TileTop::EneFarm,
            TileTop::OwnCity => TileTop::EneCity,
            TileTop::EneFarm => TileTop::OwnFarm,
            TileTop::EneCity => TileTop::OwnCity,
        }
    }

    pub const fn name(self) -> &'static str {
        if self.is_farm() {
            "farm"
        } else {
            "city"
        }
    }
}

/// Per-tile state. The position is implied by the tile's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileType,
    pub breached: bool,
}

impl Tile {
    pub const fn new(kind: TileType) -> Self {
        Self { kind, breached: false }
    }

    pub fn is_unbreached_fortress(&self) -> bool {
        self.kind == TileType::Fortress && !self.breached
    }

    pub fn is_breached_fortress(&self) -> bool {
        self.kind == TileType::Fortress && self.breached
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::new(TileType::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_type_wire_values() {
        for v in 0..=5u8 {
            assert_eq!(TileType::from_u8(v).map(|t| t as u8), Some(v));
        }
        assert_eq!(TileType::from_u8(6), None);
    }

    #[test]
    fn quota_index_excludes_fortress() {
        assert_eq!(TileType::Water.quota_index(), Some(3));
        assert_eq!(TileType::Fortress.quota_index(), None);
        assert_eq!(TileType::Empty.quota_index(), None);
    }

    #[test]
    fn tile_top_inversion_swaps_owner() {
        assert_eq!(TileTop::OwnFarm.invert(), TileTop::EneFarm);
        assert_eq!(TileTop::EneCity.invert(), TileTop::OwnCity);
        assert!(TileTop::EneFarm.is_farm());
        assert!(!TileTop::EneFarm.is_own());
        assert_eq!(TileTop::from_u8(TILE_TOP_NONE), None);
    }

    #[test]
    fn names_parse_back() {
        assert_eq!(TileType::from_name("Mountain"), Some(TileType::Mountain));
        assert_eq!(TileType::from_name("fortress"), Some(TileType::Fortress));
        assert_eq!(TileType::from_name("lava"), None);
    }
}
