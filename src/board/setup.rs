//! Saved home arrangements.
//!
//! A `Setup` is a sparse list of placements relative to the player's own home
//! area: `y == 0` is the row facing the middle. Home tiles that are not listed
//! become fortresses when the setup is applied to a board.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::geometry::Pos;
use super::piece::{PieceType, ALL_PIECE_TYPES, PIECE_LIM};
use super::tile::{TileType, QUOTA_TILE_TYPES};
use crate::config::Config;
use crate::error::SetupError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    pub tiles: Vec<(Pos, TileType)>,
    /// Middle-row slot and tile type.
    pub mids: Vec<(u16, TileType)>,
    pub pieces: Vec<(Pos, PieceType)>,
}

impl Setup {
    pub fn load(path: impl AsRef<Path>) -> Result<Setup, SetupError> {
        let text = fs::read_to_string(path).map_err(|e| SetupError::Io(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| SetupError::Io(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SetupError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| SetupError::Io(e.to_string()))?;
        fs::write(path, text).map_err(|e| SetupError::Io(e.to_string()))
    }

    /// Builds a valid arrangement for `config` without any player input.
    ///
    /// Quota tiles fill the border first (column by column), the remaining
    /// interior cells are left as fortresses, middle tiles take the first free
    /// slots, and pieces line up from the front row in arena order. Row
    /// balancing is not attempted.
    pub fn generate(config: &Config) -> Setup {
        let (w, h) = (config.home_width, config.home_height);
        let mut setup = Setup::default();

        let mut amounts = config.tile_amounts;
        let mut forts = config.count_free_tiles();
        let mut t = 0;
        for x in 0..w {
            for y in 0..h {
                let border = x == 0 || x == w - 1 || y == h - 1;
                if forts == 0 || border {
                    while t < amounts.len() && amounts[t] == 0 {
                        t += 1;
                    }
                    if t == amounts.len() {
                        continue;
                    }
                    setup.tiles.push((Pos::new(x, y), QUOTA_TILE_TYPES[t]));
                    amounts[t] -= 1;
                } else {
                    forts -= 1;
                }
            }
        }

        let preset = config.middle_fortress_range();
        let mut slots = (0..w).filter(|i| !preset.as_ref().is_some_and(|r| r.contains(i)));
        for (t, &amt) in config.middle_amounts.iter().enumerate() {
            for _ in 0..amt {
                if let Some(slot) = slots.next() {
                    setup.mids.push((slot, QUOTA_TILE_TYPES[t]));
                }
            }
        }

        let (mut fielded, mut picks) = config.initial_piece_amounts();
        for i in 0..PIECE_LIM {
            let extra = (config.piece_amounts[i] - fielded[i]).min(picks);
            fielded[i] += extra;
            picks -= extra;
        }
        let mut i = 0u16;
        for (kind, &amt) in ALL_PIECE_TYPES.iter().zip(&fielded) {
            for _ in 0..amt {
                setup.pieces.push((Pos::new(i % w, i / w), *kind));
                i += 1;
            }
        }
        setup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_setup_meets_quotas() {
        let cfg = Config::default();
        let setup = Setup::generate(&cfg);
        assert_eq!(setup.tiles.len() as u16, cfg.count_tiles());
        assert_eq!(setup.mids.len() as u16, cfg.count_middles());
        assert_eq!(setup.pieces.len() as u16, cfg.count_pieces());
        // the single fortress sits in the first interior cell
        assert!(!setup.tiles.iter().any(|(p, _)| *p == Pos::new(1, 0)));
        assert!(setup.tiles.iter().any(|(p, _)| *p == Pos::new(0, 0)));
    }

    #[test]
    fn generated_setup_skips_preset_middles() {
        let mut cfg = Config::default();
        cfg.options |= crate::config::ConfigOptions::VICTORY_POINTS
            | crate::config::ConfigOptions::VICTORY_POINTS_EQUIDISTANT;
        let setup = Setup::generate(&cfg);
        assert!(setup.mids.iter().all(|(slot, _)| *slot != 4));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home.json");
        let setup = Setup::generate(&Config::default());
        setup.save(&path).unwrap();
        assert_eq!(Setup::load(&path).unwrap(), setup);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Setup::load(dir.path().join("nope.json")),
            Err(SetupError::Io(_))
        ));
    }
}
