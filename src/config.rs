//! Match configuration.
//!
//! A `Config` is edited and validated before a match, sent to the peer in the
//! `start` message, and never changed while the match runs.

use std::fs;
use std::ops::Range;
use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::board::piece::{PieceType, PIECE_LIM};
use crate::board::tile::TILE_LIM;
use crate::error::{ConfigError, WireError};
use crate::protocol::frame::{put_u16, WireReader};

/// Upper bound of a battle roll; `battle_pass` is a percentage of it.
pub const RANDOM_LIMIT: u8 = 100;

/// Smallest allowed home area (width, height).
pub const MIN_HOME_SIZE: (u16, u16) = (5, 2);

/// Largest allowed home area (width, height).
pub const MAX_HOME_SIZE: (u16, u16) = (101, 50);

pub const MAX_FAVOR_LIMIT: u16 = u16::MAX / 4;

bitflags! {
    /// Optional rule variants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ConfigOptions: u16 {
        const VICTORY_POINTS = 0x1;
        const VICTORY_POINTS_EQUIDISTANT = 0x2;
        const PORTS = 0x4;
        const ROW_BALANCING = 0x8;
        const HOMEFRONT = 0x10;
        const SET_PIECE_BATTLE = 0x20;
        const FAVOR_TOTAL = 0x40;
        const FIRST_TURN_ENGAGE = 0x80;
        const TERRAIN_RULES = 0x100;
        const DRAGON_LATE = 0x200;
        const DRAGON_STRAIGHT = 0x400;
    }
}

/// The ruleset of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub home_width: u16,
    pub home_height: u16,
    /// Percentage chance of breaching a fortress.
    pub battle_pass: u8,
    /// Write a replay file for the match.
    pub record: bool,
    pub options: ConfigOptions,
    pub victory_points_num: u16,
    pub set_piece_battle_num: u16,
    pub favor_limit: u16,
    pub tile_amounts: [u16; TILE_LIM],
    pub middle_amounts: [u16; TILE_LIM],
    pub piece_amounts: [u16; PIECE_LIM],
    pub win_throne: u16,
    pub win_fortress: u16,
    /// Bit set of piece types that capture fortresses, see [`PieceType::bit`].
    pub capturers: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_width: 9,
            home_height: 4,
            battle_pass: RANDOM_LIMIT / 2,
            record: false,
            options: ConfigOptions::FAVOR_TOTAL
                | ConfigOptions::TERRAIN_RULES
                | ConfigOptions::DRAGON_STRAIGHT,
            victory_points_num: 21,
            set_piece_battle_num: 10,
            favor_limit: 1,
            tile_amounts: [14, 9, 5, 7],
            middle_amounts: [1, 1, 1, 1],
            piece_amounts: [2, 2, 1, 1, 1, 2, 1, 1, 1, 1],
            win_throne: 1,
            win_fortress: 1,
            capturers: PieceType::Throne.bit(),
        }
    }
}

impl Config {
    /// Size of the fixed-width wire form.
    pub const WIRE_SIZE: usize = 2 + 2 + 1 + 2 + 2 + 2 + 2 * (TILE_LIM * 2 + PIECE_LIM) + 2 + 2 + 2;

    /// Loads a configuration from a JSON file and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(path)?;
        let mut cfg: Config = serde_json::from_str(&text)?;
        cfg.check_values();
        Ok(cfg)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn has(&self, opt: ConfigOptions) -> bool {
        self.options.contains(opt)
    }

    /// Number of tiles in one home area.
    pub fn home_area(&self) -> u16 {
        self.home_width * self.home_height
    }

    /// Full board height: both home areas plus the middle row.
    pub fn board_height(&self) -> u16 {
        self.home_height * 2 + 1
    }

    pub fn count_tiles(&self) -> u16 {
        self.tile_amounts.iter().sum()
    }

    pub fn count_middles(&self) -> u16 {
        self.middle_amounts.iter().sum()
    }

    pub fn count_pieces(&self) -> u16 {
        self.piece_amounts.iter().sum()
    }

    /// Home tiles left over for fortresses.
    pub fn count_free_tiles(&self) -> u16 {
        self.home_area().saturating_sub(self.count_tiles())
    }

    pub fn count_free_middles(&self) -> u16 {
        (self.home_width / 2).saturating_sub(self.count_middles())
    }

    pub fn count_free_pieces(&self) -> u16 {
        self.home_area().saturating_sub(self.count_pieces())
    }

    /// Pieces fielded by each side.
    pub fn pieces_per_side(&self) -> u16 {
        if self.has(ConfigOptions::SET_PIECE_BATTLE) {
            self.count_pieces().min(self.set_piece_battle_num)
        } else {
            self.count_pieces()
        }
    }

    /// Middle-row slots preset to fortresses when victory points are
    /// equidistant: the centre cells left over by the middle quotas.
    pub fn middle_fortress_range(&self) -> Option<Range<u16>> {
        let both = ConfigOptions::VICTORY_POINTS | ConfigOptions::VICTORY_POINTS_EQUIDISTANT;
        if !self.options.contains(both) {
            return None;
        }
        let forts = self.home_width.saturating_sub(self.count_middles() * 2);
        Some((self.home_width - forts) / 2..(self.home_width + forts) / 2)
    }

    pub fn is_capturer(&self, kind: PieceType) -> bool {
        self.capturers & kind.bit() != 0
    }

    /// Piece amounts a side starts with before any set-piece picks, and the
    /// number of picks still to be made.
    ///
    /// Without a set-piece battle every quota is fielded and no picks remain.
    /// Otherwise only the pieces needed to fulfil a win condition are
    /// preselected: the thrones, or else enough capturers.
    pub fn initial_piece_amounts(&self) -> ([u16; PIECE_LIM], u16) {
        if !self.has(ConfigOptions::SET_PIECE_BATTLE)
            || self.set_piece_battle_num >= self.count_pieces()
        {
            return (self.piece_amounts, 0);
        }

        let mut amounts = [0u16; PIECE_LIM];
        let mut picks = self.set_piece_battle_num;
        if self.win_throne > 0 {
            let thrones = self.win_throne.min(picks);
            amounts[PieceType::Throne as usize] = thrones;
            picks -= thrones;
        } else {
            let mut caps = self.win_fortress;
            for i in (0..PIECE_LIM).rev() {
                if caps == 0 {
                    break;
                }
                if self.capturers & (1 << i) != 0 {
                    let diff = caps.min(self.piece_amounts[i] - amounts[i]).min(picks);
                    amounts[i] += diff;
                    picks -= diff;
                    caps -= diff;
                }
            }
        }
        (amounts, picks)
    }

    /// Clamps and rebalances every value so that the ruleset is playable.
    pub fn check_values(&mut self) -> &mut Self {
        self.home_width = self.home_width.clamp(MIN_HOME_SIZE.0, MAX_HOME_SIZE.0);
        self.home_height = self.home_height.clamp(MIN_HOME_SIZE.1, MAX_HOME_SIZE.1);
        self.battle_pass = self.battle_pass.min(RANDOM_LIMIT);
        self.favor_limit = self.favor_limit.min(MAX_FAVOR_LIMIT);

        let (w, h) = (self.home_width, self.home_height);
        let hsize = self.home_area();
        let balanced = self.has(ConfigOptions::ROW_BALANCING);
        if balanced {
            for amt in &mut self.tile_amounts {
                *amt = (*amt).max(h);
            }
        }

        // fortresses may not touch the side columns or the back row
        let border = 2 * h + w - 2;
        let interior = (h - 1) * (w - 2);
        let tamt = floor_amounts(
            self.count_tiles(),
            &mut self.tile_amounts,
            hsize,
            if balanced { h } else { 0 },
        );
        let mut fort = hsize - ceil_amounts(tamt, border, &mut self.tile_amounts);
        let mut i = 0;
        while fort > interior {
            self.tile_amounts[i] += 1;
            fort -= 1;
            i = (i + 1) % TILE_LIM;
        }
        floor_amounts(self.count_middles(), &mut self.middle_amounts, w / 2, 0);

        let throne = PieceType::Throne as usize;
        let mut psize = floor_amounts(self.count_pieces(), &mut self.piece_amounts, hsize, 0);
        if psize == 0 {
            self.piece_amounts[throne] = 1;
            psize = 1;
        }

        if self.capturers & ((1 << PIECE_LIM) - 1) == 0 {
            self.capturers = (1 << PIECE_LIM) - 1;
        }
        let cap_count: u16 = (0..PIECE_LIM)
            .filter(|&i| self.capturers & (1 << i) != 0)
            .map(|i| self.piece_amounts[i])
            .sum();
        self.win_fortress = self.win_fortress.min(fort.min(cap_count));
        self.win_throne = self.win_throne.min(self.piece_amounts[throne]);
        if self.win_fortress == 0 && self.win_throne == 0 {
            self.win_throne = 1;
            if self.piece_amounts[throne] == 0 {
                if psize == hsize {
                    if let Some(amt) = self.piece_amounts.iter_mut().rev().find(|a| **a > 0) {
                        *amt -= 1;
                    }
                }
                self.piece_amounts[throne] += 1;
            }
        }
        self.set_piece_battle_num = self
            .set_piece_battle_num
            .max(self.win_fortress)
            .max(self.win_throne);
        self
    }

    /// Appends the fixed-width wire form.
    pub fn write_wire(&self, out: &mut Vec<u8>) {
        out.push(self.home_width as u8);
        out.push(self.home_height as u8);
        put_u16(out, self.options.bits());
        out.push(self.battle_pass);
        put_u16(out, self.victory_points_num);
        put_u16(out, self.set_piece_battle_num);
        put_u16(out, self.favor_limit);
        for amt in self
            .tile_amounts
            .iter()
            .chain(&self.middle_amounts)
            .chain(&self.piece_amounts)
        {
            put_u16(out, *amt);
        }
        put_u16(out, self.win_throne);
        put_u16(out, self.win_fortress);
        put_u16(out, self.capturers);
    }

    /// Reads the fixed-width wire form. The `record` flag is local and stays off.
    pub fn read_wire(reader: &mut WireReader<'_>) -> Result<Config, WireError> {
        let mut cfg = Config {
            home_width: u16::from(reader.u8()?),
            home_height: u16::from(reader.u8()?),
            ..Config::default()
        };
        let bits = reader.u16()?;
        cfg.options = ConfigOptions::from_bits(bits).ok_or(WireError::InvalidValue {
            field: "config options",
            value: u32::from(bits),
        })?;
        cfg.battle_pass = reader.u8()?;
        cfg.victory_points_num = reader.u16()?;
        cfg.set_piece_battle_num = reader.u16()?;
        cfg.favor_limit = reader.u16()?;
        for amt in &mut cfg.tile_amounts {
            *amt = reader.u16()?;
        }
        for amt in &mut cfg.middle_amounts {
            *amt = reader.u16()?;
        }
        for amt in &mut cfg.piece_amounts {
            *amt = reader.u16()?;
        }
        cfg.win_throne = reader.u16()?;
        cfg.win_fortress = reader.u16()?;
        cfg.capturers = reader.u16()?;
        cfg.record = false;
        Ok(cfg)
    }
}

/// Decrements amounts from the back while the total exceeds `limit`, never
/// taking an amount below `floor`. Returns the new total.
fn floor_amounts(mut total: u16, amts: &mut [u16], limit: u16, floor: u16) -> u16 {
    let mut i = amts.len() - 1;
    let mut idle = 0;
    while total > limit && idle < amts.len() {
        if amts[i] > floor {
            amts[i] -= 1;
            total -= 1;
            idle = 0;
        } else {
            idle += 1;
        }
        i = if i == 0 { amts.len() - 1 } else { i - 1 };
    }
    total
}

/// Increments amounts from the front until the total reaches `floor`.
fn ceil_amounts(mut total: u16, floor: u16, amts: &mut [u16]) -> u16 {
    let mut i = 0;
    while total < floor {
        amts[i] += 1;
        total += 1;
        i = (i + 1) % amts.len();
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_already_valid() {
        let mut cfg = Config::default();
        let before = cfg.clone();
        cfg.check_values();
        assert_eq!(cfg, before);
        assert_eq!(cfg.count_free_tiles(), 1);
        assert_eq!(cfg.pieces_per_side(), 13);
    }

    #[test]
    fn home_size_is_clamped() {
        let mut cfg = Config {
            home_width: 2,
            home_height: 90,
            ..Config::default()
        };
        cfg.check_values();
        assert_eq!((cfg.home_width, cfg.home_height), (5, 50));
    }

    #[test]
    fn battle_pass_is_capped() {
        let mut cfg = Config {
            battle_pass: 250,
            ..Config::default()
        };
        cfg.check_values();
        assert_eq!(cfg.battle_pass, RANDOM_LIMIT);
    }

    #[test]
    fn tile_quotas_shrink_to_fit_home() {
        let mut cfg = Config {
            tile_amounts: [30, 30, 30, 30],
            ..Config::default()
        };
        cfg.check_values();
        assert!(cfg.count_tiles() <= cfg.home_area());
        let interior = (cfg.home_height - 1) * (cfg.home_width - 2);
        assert!(cfg.count_free_tiles() <= interior);
    }

    #[test]
    fn fortress_count_fits_interior() {
        let mut cfg = Config {
            tile_amounts: [1, 1, 1, 1],
            ..Config::default()
        };
        cfg.check_values();
        let interior = (cfg.home_height - 1) * (cfg.home_width - 2);
        assert!(cfg.count_free_tiles() <= interior);
        assert!(cfg.count_tiles() >= 2 * cfg.home_height + cfg.home_width - 2);
    }

    #[test]
    fn middle_quotas_fit_half_width() {
        let mut cfg = Config {
            middle_amounts: [3, 3, 3, 3],
            ..Config::default()
        };
        cfg.check_values();
        assert_eq!(cfg.count_middles(), cfg.home_width / 2);
    }

    #[test]
    fn empty_capturers_become_all() {
        let mut cfg = Config {
            capturers: 0,
            ..Config::default()
        };
        cfg.check_values();
        assert!(cfg.is_capturer(PieceType::Ranger));
        assert!(cfg.is_capturer(PieceType::Throne));
    }

    #[test]
    fn some_win_condition_is_kept() {
        let mut cfg = Config {
            win_throne: 0,
            win_fortress: 0,
            ..Config::default()
        };
        cfg.check_values();
        assert_eq!(cfg.win_throne, 1);
    }

    #[test]
    fn missing_throne_is_added_when_needed() {
        let mut amounts = Config::default().piece_amounts;
        amounts[PieceType::Throne as usize] = 0;
        let mut cfg = Config {
            piece_amounts: amounts,
            win_throne: 0,
            win_fortress: 0,
            ..Config::default()
        };
        cfg.check_values();
        assert_eq!(cfg.piece_amounts[PieceType::Throne as usize], 1);
        assert_eq!(cfg.win_throne, 1);
    }

    #[test]
    fn set_piece_battle_preselects_thrones() {
        let cfg = Config {
            options: ConfigOptions::SET_PIECE_BATTLE,
            set_piece_battle_num: 5,
            ..Config::default()
        };
        let (amounts, picks) = cfg.initial_piece_amounts();
        assert_eq!(amounts[PieceType::Throne as usize], 1);
        assert_eq!(amounts.iter().sum::<u16>(), 1);
        assert_eq!(picks, 4);
        assert_eq!(cfg.pieces_per_side(), 5);
    }

    #[test]
    fn set_piece_battle_preselects_capturers_without_throne_win() {
        let cfg = Config {
            options: ConfigOptions::SET_PIECE_BATTLE,
            set_piece_battle_num: 4,
            win_throne: 0,
            win_fortress: 2,
            capturers: PieceType::Lancer.bit(),
            ..Config::default()
        };
        let (amounts, picks) = cfg.initial_piece_amounts();
        assert_eq!(amounts[PieceType::Lancer as usize], 2);
        assert_eq!(picks, 2);
    }

    #[test]
    fn equidistant_points_preset_centre_fortresses() {
        let mut cfg = Config::default();
        assert_eq!(cfg.middle_fortress_range(), None);
        cfg.options |= ConfigOptions::VICTORY_POINTS | ConfigOptions::VICTORY_POINTS_EQUIDISTANT;
        assert_eq!(cfg.middle_fortress_range(), Some(4..5));
    }

    #[test]
    fn wire_form_roundtrip() {
        let cfg = Config {
            home_width: 11,
            options: ConfigOptions::HOMEFRONT | ConfigOptions::PORTS,
            battle_pass: 70,
            record: true,
            ..Config::default()
        };
        let mut buf = Vec::new();
        cfg.write_wire(&mut buf);
        assert_eq!(buf.len(), Config::WIRE_SIZE);
        let back = Config::read_wire(&mut WireReader::new(&buf, "config")).unwrap();
        assert_eq!(back, Config { record: false, ..cfg });
    }

    #[test]
    fn json_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let cfg = Config {
            favor_limit: 3,
            options: ConfigOptions::VICTORY_POINTS | ConfigOptions::DRAGON_LATE,
            ..Config::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"battle_pass": 100}"#).unwrap();
        assert_eq!(cfg.battle_pass, 100);
        assert_eq!(cfg.home_width, 9);
    }
}
