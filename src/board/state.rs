//! Board model.
//!
//! The board is kept in the local player's frame: the enemy home rows come
//! first, then the shared middle row, then the own home rows. Tiles and
//! pieces live in fixed arenas for the whole match, so their indices double
//! as wire identifiers. Capture moves a piece off the board; it is never
//! removed from the arena.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::geometry::{distance, GridSize, Pos, TileId};
use super::piece::{Piece, PieceId, PieceType, ALL_PIECE_TYPES, PIECE_LIM};
use super::setup::Setup;
use super::tile::{Tile, TileTop, TileType, ALL_TILE_TOPS, QUOTA_TILE_TYPES, TILE_LIM};
use crate::config::{Config, ConfigOptions};
use crate::error::{first_upper, RuleViolation, SetupError, WireError};
use crate::protocol::message::SetupPayload;

/// Chebyshev distance below which a new farm or city may not be placed next
/// to a home fortress or another tile top.
const ESTABLISH_SPACING: u16 = 3;

/// Everything needed to rebuild a board mid-match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub tiles: Vec<Tile>,
    pub pieces: Vec<Piece>,
    pub own_amounts: [u16; PIECE_LIM],
    pub ene_amounts: [u16; PIECE_LIM],
    pub tops: [Option<TileId>; 4],
}

/// Tiles, pieces, and tile tops of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    config: Config,
    grid: GridSize,
    /// Tiles in one home area.
    home: u16,
    /// First tile of the own home area.
    extra: u16,
    tiles: Vec<Tile>,
    /// Own pieces `[0, num)` followed by enemy pieces `[num, 2 * num)`.
    pieces: Vec<Piece>,
    num: u16,
    own_amounts: [u16; PIECE_LIM],
    ene_amounts: [u16; PIECE_LIM],
    picks_left: u16,
    tops: [Option<TileId>; 4],
}

impl Board {
    /// Creates an empty board for `config`. Only the preset middle fortresses
    /// are placed.
    pub fn new(config: Config) -> Board {
        let grid = GridSize::new(config.home_width, config.board_height());
        let home = config.home_area();
        let extra = home + config.home_width;
        let num = config.pieces_per_side();
        let (own_amounts, picks_left) = config.initial_piece_amounts();

        let mut tiles = vec![Tile::default(); usize::from(grid.area())];
        if let Some(range) = config.middle_fortress_range() {
            for i in range {
                tiles[usize::from(home + i)].kind = TileType::Fortress;
            }
        }

        let mut pieces = arena(&own_amounts, num);
        pieces.extend(arena(&own_amounts, num));
        Board {
            config,
            grid,
            home,
            extra,
            tiles,
            pieces,
            num,
            own_amounts,
            ene_amounts: own_amounts,
            picks_left,
            tops: [None; 4],
        }
    }

    /// Rebuilds a board from a snapshot taken under the same configuration.
    /// Returns `None` when the arena sizes don't match `config`.
    pub fn from_snapshot(config: Config, snap: &BoardSnapshot) -> Option<Board> {
        let mut board = Board::new(config);
        if snap.tiles.len() != board.tiles.len() || snap.pieces.len() != board.pieces.len() {
            return None;
        }
        board.tiles.clone_from(&snap.tiles);
        board.pieces.clone_from(&snap.pieces);
        board.own_amounts = snap.own_amounts;
        board.ene_amounts = snap.ene_amounts;
        board.picks_left = 0;
        board.tops = snap.tops;
        Some(board)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            tiles: self.tiles.clone(),
            pieces: self.pieces.clone(),
            own_amounts: self.own_amounts,
            ene_amounts: self.ene_amounts,
            tops: self.tops,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Number of tiles in one home area.
    pub fn home_size(&self) -> u16 {
        self.home
    }

    pub fn enemy_home(&self) -> Range<TileId> {
        0..self.home
    }

    pub fn middle(&self) -> Range<TileId> {
        self.home..self.extra
    }

    pub fn own_home(&self) -> Range<TileId> {
        self.extra..self.grid.area()
    }

    pub fn is_own_home(&self, tile: TileId) -> bool {
        tile >= self.extra
    }

    pub fn is_enemy_home(&self, tile: TileId) -> bool {
        tile < self.home
    }

    pub fn tile_count(&self) -> u16 {
        self.grid.area()
    }

    pub fn tile(&self, id: TileId) -> &Tile {
        &self.tiles[usize::from(id)]
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn pos_of(&self, tile: TileId) -> Pos {
        self.grid.id_to_pos(tile)
    }

    pub fn tile_at(&self, pos: Pos) -> Option<TileId> {
        self.grid.contains(pos).then(|| self.grid.pos_to_id(pos))
    }

    /// Tile id of a position relative to the own home area (`y == 0` is the
    /// row facing the middle).
    pub fn own_home_tile(&self, rel: Pos) -> Option<TileId> {
        (rel.x < self.config.home_width && rel.y < self.config.home_height)
            .then(|| self.extra + rel.y * self.config.home_width + rel.x)
    }

    /// Pieces per side.
    pub fn piece_count(&self) -> u16 {
        self.num
    }

    /// Pieces of both sides; every valid piece id is below this.
    pub fn arena_len(&self) -> u16 {
        self.num * 2
    }

    pub fn piece(&self, id: PieceId) -> &Piece {
        &self.pieces[usize::from(id)]
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece_tile(&self, id: PieceId) -> Option<TileId> {
        self.pieces.get(usize::from(id)).and_then(|p| p.tile)
    }

    pub fn own_pieces(&self) -> Range<PieceId> {
        0..self.num
    }

    pub fn enemy_pieces(&self) -> Range<PieceId> {
        self.num..self.num * 2
    }

    pub fn is_own_piece(&self, id: PieceId) -> bool {
        id < self.num
    }

    /// Arena range of one side's pieces of a single type.
    pub fn pieces_of(&self, own: bool, kind: PieceType) -> Range<PieceId> {
        let (base, amounts) = if own {
            (0, &self.own_amounts)
        } else {
            (self.num, &self.ene_amounts)
        };
        let start = base + amounts[..kind as usize].iter().sum::<u16>();
        start..start + amounts[kind as usize]
    }

    pub fn own_amounts(&self) -> &[u16; PIECE_LIM] {
        &self.own_amounts
    }

    pub fn enemy_amounts(&self) -> &[u16; PIECE_LIM] {
        &self.ene_amounts
    }

    /// Set-piece picks still to be made before the setup can be applied.
    pub fn picks_left(&self) -> u16 {
        self.picks_left
    }

    /// The piece standing on `tile`, if any.
    pub fn piece_at(&self, tile: TileId) -> Option<PieceId> {
        self.pieces
            .iter()
            .position(|p| p.tile == Some(tile))
            .map(|i| i as PieceId)
    }

    /// Maps a piece to its id in the opponent's arena.
    pub fn inverse_piece_id(&self, id: PieceId) -> u16 {
        if self.is_own_piece(id) {
            id + self.num
        } else {
            id - self.num
        }
    }

    /// Maps a tile to its id in the opponent's frame.
    pub fn invert_tile(&self, tile: TileId) -> TileId {
        self.grid.invert_id(tile)
    }

    /// The tile a farm or city marker sits on.
    pub fn top_tile(&self, top: TileTop) -> Option<TileId> {
        self.tops[top as usize]
    }

    pub fn top_at(&self, tile: TileId) -> Option<TileTop> {
        ALL_TILE_TOPS
            .into_iter()
            .find(|&t| self.tops[t as usize] == Some(tile))
    }

    pub fn set_top(&mut self, top: TileTop, tile: Option<TileId>) {
        self.tops[top as usize] = tile;
    }

    /// Moves a piece onto `tile`. Returns true when a throne entered a
    /// fortress other than the last one it held.
    pub fn place_piece(&mut self, id: PieceId, tile: TileId) -> bool {
        let on_fortress = self.tiles[usize::from(tile)].kind == TileType::Fortress;
        let piece = &mut self.pieces[usize::from(id)];
        piece.tile = Some(tile);
        if piece.kind == PieceType::Throne && on_fortress && piece.last_fortress != Some(tile) {
            piece.last_fortress = Some(tile);
            return true;
        }
        false
    }

    /// Takes a piece off the board.
    pub fn remove_piece(&mut self, id: PieceId) {
        self.pieces[usize::from(id)].tile = None;
    }

    pub fn set_breached(&mut self, tile: TileId, breached: bool) {
        self.tiles[usize::from(tile)].breached = breached;
    }

    pub fn set_tile_kind(&mut self, tile: TileId, kind: TileType) {
        self.tiles[usize::from(tile)].kind = kind;
        if kind == TileType::Fortress {
            if let Some(id) = self.piece_at(tile) {
                let piece = &mut self.pieces[usize::from(id)];
                if piece.kind == PieceType::Throne {
                    piece.last_fortress = Some(tile);
                }
            }
        }
    }

    /// Adds one piece of `kind` to a set-piece battle selection.
    pub fn pick_piece(&mut self, kind: PieceType) -> Result<u16, RuleViolation> {
        if self.picks_left == 0 {
            return Err(RuleViolation::new("No piece picks left"));
        }
        let i = kind as usize;
        if self.own_amounts[i] >= self.config.piece_amounts[i] {
            return Err(RuleViolation::new(format!(
                "No {} left to pick",
                kind.name()
            )));
        }
        self.own_amounts[i] += 1;
        self.picks_left -= 1;
        self.rebuild_own_arena();
        Ok(self.picks_left)
    }

    fn rebuild_own_arena(&mut self) {
        let own = arena(&self.own_amounts, self.num);
        for (slot, piece) in self.pieces.iter_mut().zip(own) {
            *slot = piece;
        }
    }

    /// Lays out the own home area, the middle row, and the own pieces, and
    /// validates them against the configured quotas.
    ///
    /// Home tiles the setup leaves out become fortresses. Outstanding
    /// set-piece picks are taken from the setup's piece list.
    pub fn apply_setup(&mut self, setup: &Setup) -> Result<(), SetupError> {
        let w = self.config.home_width;

        for t in self.own_home() {
            self.tiles[usize::from(t)] = Tile::new(TileType::Empty);
        }
        let mut left = self.config.tile_amounts;
        for &(pos, kind) in &setup.tiles {
            let id = self
                .own_home_tile(pos)
                .ok_or(SetupError::OutOfHome { x: pos.x, y: pos.y })?;
            let q = kind.quota_index().ok_or(SetupError::TooManyTiles(kind.name()))?;
            if left[q] == 0 {
                return Err(SetupError::TooManyTiles(kind.name()));
            }
            left[q] -= 1;
            self.tiles[usize::from(id)].kind = kind;
        }
        for t in self.own_home() {
            let tile = &mut self.tiles[usize::from(t)];
            if tile.kind == TileType::Empty {
                tile.kind = TileType::Fortress;
            }
        }
        self.check_own_tiles()?;

        let preset = self.config.middle_fortress_range();
        for i in 0..w {
            if !preset.as_ref().is_some_and(|r| r.contains(&i)) {
                self.tiles[usize::from(self.home + i)] = Tile::new(TileType::Empty);
            }
        }
        let mut left = self.config.middle_amounts;
        for &(slot, kind) in &setup.mids {
            if slot >= w || self.tiles[usize::from(self.home + slot)].kind != TileType::Empty {
                return Err(SetupError::BadMiddleSlot(slot));
            }
            let q = kind.quota_index().ok_or(SetupError::TooManyTiles(kind.name()))?;
            if left[q] == 0 {
                return Err(SetupError::TooManyTiles(kind.name()));
            }
            left[q] -= 1;
            self.tiles[usize::from(self.home + slot)].kind = kind;
        }
        self.check_mid_tiles()?;

        // picks taken from a rejected setup are handed back
        let committed = (self.own_amounts, self.picks_left);
        if self.picks_left > 0 {
            self.pick_from(setup);
        }
        let placed = if self.picks_left > 0 {
            Err(SetupError::PicksLeft(self.picks_left))
        } else {
            self.rebuild_own_arena();
            self.place_own_pieces(setup).and_then(|()| self.check_own_pieces())
        };
        if placed.is_err() {
            (self.own_amounts, self.picks_left) = committed;
            self.rebuild_own_arena();
        }
        placed
    }

    fn place_own_pieces(&mut self, setup: &Setup) -> Result<(), SetupError> {
        for &(pos, kind) in &setup.pieces {
            let id = self
                .own_home_tile(pos)
                .ok_or(SetupError::OutOfHome { x: pos.x, y: pos.y })?;
            if self.piece_at(id).is_some() {
                return Err(SetupError::PieceCollision { x: pos.x, y: pos.y });
            }
            let slot = self
                .pieces_of(true, kind)
                .find(|&p| !self.pieces[usize::from(p)].on_board())
                .ok_or(SetupError::TooManyPieces(kind.name()))?;
            self.pieces[usize::from(slot)].tile = Some(id);
        }
        Ok(())
    }

    /// Spends outstanding picks on the pieces a setup places beyond the
    /// current selection, in arena order.
    fn pick_from(&mut self, setup: &Setup) {
        let mut wanted = [0u16; PIECE_LIM];
        for &(_, kind) in &setup.pieces {
            wanted[kind as usize] += 1;
        }
        for i in 0..PIECE_LIM {
            let room = self.config.piece_amounts[i].saturating_sub(self.own_amounts[i]);
            let extra = wanted[i]
                .saturating_sub(self.own_amounts[i])
                .min(room)
                .min(self.picks_left);
            self.own_amounts[i] += extra;
            self.picks_left -= extra;
        }
    }

    fn check_own_tiles(&self) -> Result<(), SetupError> {
        let (w, h) = (self.config.home_width, self.config.home_height);
        let balanced = self.config.has(ConfigOptions::ROW_BALANCING);
        let mut forts = 0;
        for y in 0..h {
            let mut cnt = [0u16; TILE_LIM];
            for x in 0..w {
                let kind = self.tiles[usize::from(self.extra + y * w + x)].kind;
                match kind.quota_index() {
                    Some(q) => cnt[q] += 1,
                    None => {
                        forts += 1;
                        if x == 0 || x == w - 1 || y == h - 1 {
                            return Err(SetupError::FortressNotAllowed { x, y });
                        }
                    }
                }
            }
            if balanced {
                if let Some(q) = (0..TILE_LIM).find(|&q| cnt[q] == 0 && self.config.tile_amounts[q] > 0) {
                    return Err(SetupError::TileMissingInRow {
                        tile: first_upper(QUOTA_TILE_TYPES[q].name()),
                        row: y,
                    });
                }
            }
        }
        if forts != self.config.count_free_tiles() {
            return Err(SetupError::TilesNotPlaced);
        }
        Ok(())
    }

    fn check_mid_tiles(&self) -> Result<(), SetupError> {
        let mut cnt = [0u16; TILE_LIM];
        for t in self.middle() {
            if let Some(q) = self.tiles[usize::from(t)].kind.quota_index() {
                cnt[q] += 1;
            }
        }
        match (0..TILE_LIM).find(|&q| cnt[q] < self.config.middle_amounts[q]) {
            Some(q) => Err(SetupError::middle_missing(QUOTA_TILE_TYPES[q])),
            None => Ok(()),
        }
    }

    fn check_own_pieces(&self) -> Result<(), SetupError> {
        let late_dragons =
            self.config.has(ConfigOptions::DRAGON_LATE) && self.config.count_free_tiles() > 0;
        for p in &self.pieces[..usize::from(self.num)] {
            if !p.on_board() && !(p.kind == PieceType::Dragon && late_dragons) {
                return Err(SetupError::piece_missing(p.kind));
            }
        }
        Ok(())
    }

    /// The current own arrangement as a reusable setup.
    pub fn own_setup(&self) -> Setup {
        let w = self.config.home_width;
        let rel = |t: TileId| Pos::new((t - self.extra) % w, (t - self.extra) / w);
        let mut setup = Setup::default();
        for t in self.own_home() {
            let kind = self.tiles[usize::from(t)].kind;
            if kind.quota_index().is_some() {
                setup.tiles.push((rel(t), kind));
            }
        }
        for i in 0..w {
            let kind = self.tiles[usize::from(self.home + i)].kind;
            if kind.quota_index().is_some() {
                setup.mids.push((i, kind));
            }
        }
        for p in &self.pieces[..usize::from(self.num)] {
            if let Some(t) = p.tile.filter(|&t| self.is_own_home(t)) {
                setup.pieces.push((rel(t), p.kind));
            }
        }
        setup
    }

    /// The `setup` message for the opponent: own home and middle row in
    /// inverted order, fielded amounts, and inverted piece positions.
    pub fn setup_payload(&self) -> SetupPayload {
        let last = self.grid.area() - 1;
        SetupPayload {
            tiles: (0..self.extra)
                .map(|i| self.tiles[usize::from(last - i)].kind)
                .collect(),
            amounts: self.own_amounts,
            positions: self.pieces[..usize::from(self.num)]
                .iter()
                .map(|p| p.tile.map(|t| self.grid.invert_id(t)))
                .collect(),
        }
    }

    /// Applies the opponent's `setup` message. Returns the opponent's middle
    /// row, which is merged later by [`Board::prepare_match`].
    pub fn apply_enemy_setup(&mut self, payload: &SetupPayload) -> Result<Vec<TileType>, WireError> {
        if payload.tiles.len() != usize::from(self.extra) {
            return Err(WireError::InvalidValue {
                field: "setup tile count",
                value: payload.tiles.len() as u32,
            });
        }
        let fielded: u16 = payload.amounts.iter().sum();
        if fielded != self.num || payload.positions.len() != usize::from(self.num) {
            return Err(WireError::InvalidValue {
                field: "setup piece count",
                value: u32::from(fielded),
            });
        }

        for (tile, &kind) in self.tiles.iter_mut().zip(&payload.tiles[..usize::from(self.home)]) {
            *tile = Tile::new(kind);
        }
        let buffer = payload.tiles[usize::from(self.home)..].to_vec();

        self.ene_amounts = payload.amounts;
        let enemy = arena(&self.ene_amounts, self.num);
        let start = usize::from(self.num);
        self.pieces.truncate(start);
        self.pieces.extend(enemy);
        for (i, pos) in payload.positions.iter().enumerate() {
            let tile = pos.filter(|&t| t < self.home);
            let piece = &mut self.pieces[start + i];
            piece.tile = tile;
            if piece.kind == PieceType::Throne {
                if let Some(t) = tile.filter(|&t| self.tiles[usize::from(t)].kind == TileType::Fortress) {
                    piece.last_fortress = Some(t);
                }
            }
        }
        Ok(buffer)
    }

    /// Merges the opponent's middle row into the own one and fills the gaps
    /// with fortresses.
    ///
    /// A slot claimed by both sides keeps neither tile in place: both are
    /// pushed to the nearest free slots on either side. The player moving
    /// first scans from the left and wins ties; the other player scans from
    /// the right, so both peers arrive at mirrored results.
    pub fn prepare_match(&mut self, my_turn: bool, buffer: &mut [TileType]) {
        let w = usize::from(self.config.home_width);
        let base = usize::from(self.home);
        let mut mid: Vec<TileType> = (0..w)
            .map(|i| {
                let own = self.tiles[base + i].kind;
                if own == TileType::Empty && buffer[i] != TileType::Empty {
                    std::mem::replace(&mut buffer[i], TileType::Empty)
                } else {
                    own
                }
            })
            .collect();

        let order: Vec<usize> = if my_turn {
            (0..w).collect()
        } else {
            (0..w).rev().collect()
        };
        for i in order {
            if mid[i] < TileType::Fortress && buffer[i] < TileType::Fortress {
                let val = std::mem::replace(&mut mid[i], TileType::Empty);
                let mut a = find_empty_middle(&mid, i, -1);
                let mut b = find_empty_middle(&mid, i, 1);
                if a == b {
                    if my_turn {
                        a = i;
                    } else {
                        b = i;
                    }
                }
                mid[a] = val;
                mid[b] = buffer[i];
            }
        }
        for (i, kind) in mid.into_iter().enumerate() {
            self.tiles[base + i] = Tile::new(if kind == TileType::Empty {
                TileType::Fortress
            } else {
                kind
            });
        }
        for top in &mut self.tops {
            *top = None;
        }
    }

    /// Records the fortress under each own throne and returns the number of
    /// favor picks granted at the start of a match.
    pub fn count_available_favors(&mut self) -> u16 {
        let limit = self.config.favor_limit * 4;
        let mut avail = 0;
        for id in self.pieces_of(true, PieceType::Throne) {
            let Some(t) = self.piece_tile(id) else { continue };
            if self.tiles[usize::from(t)].kind == TileType::Fortress {
                self.pieces[usize::from(id)].last_fortress = Some(t);
                if avail < limit {
                    avail += 1;
                }
            }
        }
        avail
    }

    /// Un-breaches every breached fortress nobody stands on. Returns the
    /// restored tiles.
    pub fn restore_fortresses(&mut self) -> Vec<TileId> {
        let mut restored = Vec::new();
        for t in 0..self.grid.area() {
            if self.tiles[usize::from(t)].is_breached_fortress() && self.piece_at(t).is_none() {
                self.tiles[usize::from(t)].breached = false;
                restored.push(t);
            }
        }
        restored
    }

    /// Whether one side has lost its thrones: the configured number of them
    /// is dead, or every piece is dead when no throne quota is set.
    pub fn thrones_lost(&self, own: bool) -> bool {
        let needed = usize::from(self.config.win_throne);
        if needed > 0 {
            self.pieces_of(own, PieceType::Throne)
                .filter(|&p| !self.piece(p).on_board())
                .count()
                >= needed
        } else {
            let side = if own { self.own_pieces() } else { self.enemy_pieces() };
            side.into_iter().all(|p| !self.piece(p).on_board())
        }
    }

    /// Whether enough fortresses of one home area are held by the other
    /// side's capturers.
    pub fn fortresses_captured(&self, own_home: bool) -> bool {
        let needed = self.config.win_fortress;
        if needed == 0 {
            return false;
        }
        let home = if own_home { self.own_home() } else { self.enemy_home() };
        let held = home
            .filter(|&t| self.tiles[usize::from(t)].kind == TileType::Fortress)
            .filter_map(|t| self.piece_at(t))
            .filter(|&p| {
                self.is_own_piece(p) != own_home && self.config.is_capturer(self.piece(p).kind)
            })
            .count();
        held >= usize::from(needed)
    }

    /// Middle fortresses held by (own, enemy) pieces.
    pub fn count_victory_points(&self) -> (u16, u16) {
        let mut own = 0;
        let mut ene = 0;
        for t in self.middle() {
            if self.tiles[usize::from(t)].kind != TileType::Fortress {
                continue;
            }
            match self.piece_at(t) {
                Some(p) if self.is_own_piece(p) => own += 1,
                Some(_) => ene += 1,
                None => {}
            }
        }
        (own, ene)
    }

    /// The tile and marker a throne would establish on.
    pub fn establish_target(&self, throne: PieceId) -> Result<(TileId, TileTop), RuleViolation> {
        let piece = self.piece(throne);
        let tile = match piece.tile {
            Some(t) if piece.kind == PieceType::Throne && self.is_own_piece(throne) => t,
            _ => return Err(RuleViolation::new("Only a throne can establish")),
        };
        if self.tops[TileTop::OwnCity as usize].is_some() {
            return Err(RuleViolation::new("Can't establish anymore"));
        }
        if self.config.has(ConfigOptions::TERRAIN_RULES) {
            let here = self.pos_of(tile);
            for t in 0..self.grid.area() {
                let top = self.top_at(t);
                let home_fortress = self.tiles[usize::from(t)].kind == TileType::Fortress
                    && (self.is_enemy_home(t) || self.is_own_home(t));
                if (home_fortress || top.is_some()) && distance(here, self.pos_of(t)) < ESTABLISH_SPACING {
                    let what = top.map_or(TileType::Fortress.name(), TileTop::name);
                    return Err(RuleViolation::new(format!("Tile is too close to a {what}")));
                }
            }
        }
        let top = if self.tops[TileTop::OwnFarm as usize].is_some() {
            TileTop::OwnCity
        } else {
            TileTop::OwnFarm
        };
        Ok((tile, top))
    }

    /// Whether a throne stands on a breached fortress or own farm.
    pub fn rebuildable(&self, throne: PieceId) -> bool {
        let piece = self.piece(throne);
        match piece.tile {
            Some(t) if piece.kind == PieceType::Throne => {
                let tile = self.tile(t);
                (tile.kind == TileType::Fortress || self.top_at(t) == Some(TileTop::OwnFarm))
                    && tile.breached
            }
            _ => false,
        }
    }

    /// Tiles a piece of `kind` may be spawned on.
    pub fn spawn_tiles(&self, kind: PieceType) -> Vec<TileId> {
        use PieceType::*;
        match kind {
            Ranger | Lancer => self
                .top_tile(TileTop::OwnFarm)
                .filter(|&t| !self.tile(t).breached && self.piece_at(t).is_none())
                .into_iter()
                .collect(),
            Spearman | Catapult | Elephant => self
                .top_tile(TileTop::OwnCity)
                .filter(|&t| self.piece_at(t).is_none())
                .into_iter()
                .collect(),
            Crossbowman | Trebuchet | Warhorse => self
                .own_home()
                .filter(|&t| self.tile(t).is_unbreached_fortress())
                .collect(),
            Dragon | Throne => Vec::new(),
        }
    }

    /// The first own piece of `kind` that is off the board.
    pub fn spawnable_piece(&self, kind: PieceType) -> Option<PieceId> {
        self.pieces_of(true, kind)
            .find(|&p| !self.piece(p).on_board())
    }

    /// Own dragons that are off the board.
    pub fn off_board_dragons(&self) -> u16 {
        self.pieces_of(true, PieceType::Dragon)
            .filter(|&p| !self.piece(p).on_board())
            .count() as u16
    }
}

/// Lays out `num` off-board pieces grouped by type. Slots past the amounts
/// stay unassigned until the selection is complete.
fn arena(amounts: &[u16; PIECE_LIM], num: u16) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = ALL_PIECE_TYPES
        .iter()
        .zip(amounts)
        .flat_map(|(&kind, &amt)| std::iter::repeat(Piece::new(kind)).take(usize::from(amt)))
        .take(usize::from(num))
        .collect();
    pieces.resize(usize::from(num), Piece::new(PieceType::Throne));
    pieces
}

/// Steps from `i` in direction `step` to the next empty middle slot, wrapping
/// around from the opposite end.
fn find_empty_middle(mid: &[TileType], i: usize, step: isize) -> usize {
    let len = mid.len() as isize;
    let mut j = i as isize + step;
    while (0..len).contains(&j) && mid[j as usize] != TileType::Empty {
        j += step;
    }
    if !(0..len).contains(&j) {
        j = if step > 0 { 0 } else { len - 1 };
        while (0..len).contains(&j) && mid[j as usize] != TileType::Empty {
            j += step;
        }
    }
    j.clamp(0, len - 1) as usize
}

fn tile_char(tile: &Tile) -> char {
    match tile.kind {
        TileType::Plains => '.',
        TileType::Forest => 'f',
        TileType::Mountain => 'm',
        TileType::Water => '~',
        TileType::Fortress if tile.breached => '%',
        TileType::Fortress => '#',
        TileType::Empty => ' ',
    }
}

fn piece_char(kind: PieceType, own: bool) -> char {
    let c = match kind {
        PieceType::Ranger => 'r',
        PieceType::Spearman => 's',
        PieceType::Crossbowman => 'x',
        PieceType::Catapult => 'c',
        PieceType::Trebuchet => 't',
        PieceType::Lancer => 'l',
        PieceType::Warhorse => 'w',
        PieceType::Elephant => 'e',
        PieceType::Dragon => 'd',
        PieceType::Throne => 'k',
    };
    if own {
        c.to_ascii_uppercase()
    } else {
        c
    }
}

/// Renders the board as text: one row per line, own pieces upper case.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = self.grid.width;
        for y in 0..self.grid.height {
            write!(f, "{y:>3} ")?;
            for x in 0..w {
                let t = y * w + x;
                let piece = self
                    .piece_at(t)
                    .map_or(' ', |p| piece_char(self.piece(p).kind, self.is_own_piece(p)));
                let top = match self.top_at(t) {
                    Some(top) if top.is_farm() => '^',
                    Some(_) => '*',
                    None => tile_char(self.tile(t)),
                };
                write!(f, "{top}{piece}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_board(cfg: Config) -> Board {
        let mut board = Board::new(cfg.clone());
        board.apply_setup(&Setup::generate(&cfg)).unwrap();
        board
    }

    #[test]
    fn layout_ranges() {
        let board = Board::new(Config::default());
        assert_eq!(board.tile_count(), 81);
        assert_eq!(board.enemy_home(), 0..36);
        assert_eq!(board.middle(), 36..45);
        assert_eq!(board.own_home(), 45..81);
        assert_eq!(board.own_home_tile(Pos::new(2, 1)), Some(56));
        assert_eq!(board.own_home_tile(Pos::new(9, 0)), None);
    }

    #[test]
    fn pieces_are_grouped_by_type() {
        let board = Board::new(Config::default());
        assert_eq!(board.piece_count(), 13);
        assert_eq!(board.arena_len(), 26);
        assert_eq!(board.pieces_of(true, PieceType::Ranger), 0..2);
        assert_eq!(board.pieces_of(true, PieceType::Throne), 12..13);
        assert_eq!(board.pieces_of(false, PieceType::Ranger), 13..15);
        assert_eq!(board.piece(12).kind, PieceType::Throne);
        assert!(board.is_own_piece(12));
        assert!(!board.is_own_piece(13));
    }

    #[test]
    fn inverse_ids_swap_sides() {
        let board = Board::new(Config::default());
        assert_eq!(board.inverse_piece_id(3), 16);
        assert_eq!(board.inverse_piece_id(16), 3);
        assert_eq!(board.invert_tile(17), 63);
    }

    #[test]
    fn generated_setup_is_accepted() {
        let board = ready_board(Config::default());
        let forts = board
            .own_home()
            .filter(|&t| board.tile(t).kind == TileType::Fortress)
            .count();
        assert_eq!(forts, 1);
        assert!(board.own_pieces().all(|p| board.piece(p).on_board()));
    }

    #[test]
    fn fortress_on_border_is_rejected() {
        let cfg = Config::default();
        let mut setup = Setup::generate(&cfg);
        // free the corner and take the interior cell instead
        let corner = setup.tiles.iter().position(|(p, _)| *p == Pos::new(0, 0)).unwrap();
        let (_, kind) = setup.tiles.remove(corner);
        setup.tiles.push((Pos::new(1, 0), kind));
        let mut board = Board::new(cfg);
        assert_eq!(
            board.apply_setup(&setup),
            Err(SetupError::FortressNotAllowed { x: 0, y: 0 })
        );
    }

    #[test]
    fn missing_middle_is_reported() {
        let cfg = Config::default();
        let mut setup = Setup::generate(&cfg);
        setup.mids.retain(|(_, k)| *k != TileType::Water);
        let err = Board::new(cfg).apply_setup(&setup).unwrap_err();
        assert_eq!(err.to_string(), "Water wasn't placed");
    }

    #[test]
    fn missing_piece_is_reported_unless_late_dragon() {
        let cfg = Config::default();
        let mut setup = Setup::generate(&cfg);
        setup.pieces.retain(|(_, k)| *k != PieceType::Dragon);
        let err = Board::new(cfg.clone()).apply_setup(&setup).unwrap_err();
        assert_eq!(err.to_string(), "Dragon wasn't placed");

        let late = Config {
            options: cfg.options | ConfigOptions::DRAGON_LATE,
            ..cfg
        };
        let mut board = Board::new(late);
        board.apply_setup(&setup).unwrap();
        assert_eq!(board.off_board_dragons(), 1);
    }

    #[test]
    fn piece_collision_is_rejected() {
        let cfg = Config::default();
        let mut setup = Setup::generate(&cfg);
        setup.pieces[1].0 = setup.pieces[0].0;
        assert!(matches!(
            Board::new(cfg).apply_setup(&setup),
            Err(SetupError::PieceCollision { .. })
        ));
    }

    #[test]
    fn row_balancing_requires_each_type_per_row() {
        let mut cfg = Config {
            options: ConfigOptions::ROW_BALANCING,
            ..Config::default()
        };
        cfg.check_values();
        let mut setup = Setup::generate(&cfg);
        Board::new(cfg.clone()).apply_setup(&setup).unwrap();

        // trade the only water of the front row for a plains of the next row
        let water = setup.tiles.iter().position(|(p, _)| *p == Pos::new(8, 0)).unwrap();
        let plains = setup.tiles.iter().position(|(p, _)| *p == Pos::new(0, 1)).unwrap();
        assert_eq!(setup.tiles[water].1, TileType::Water);
        setup.tiles[water].1 = TileType::Plains;
        setup.tiles[plains].1 = TileType::Water;
        let err = Board::new(cfg).apply_setup(&setup).unwrap_err();
        assert_eq!(err.to_string(), "Water missing in row 0");
    }

    #[test]
    fn set_piece_picks_come_from_setup() {
        let cfg = Config {
            options: ConfigOptions::SET_PIECE_BATTLE,
            set_piece_battle_num: 4,
            ..Config::default()
        };
        let setup = Setup {
            pieces: vec![
                (Pos::new(0, 0), PieceType::Throne),
                (Pos::new(1, 0), PieceType::Lancer),
                (Pos::new(2, 0), PieceType::Lancer),
                (Pos::new(3, 0), PieceType::Dragon),
            ],
            ..Setup::generate(&cfg)
        };
        let mut board = Board::new(cfg);
        assert_eq!(board.picks_left(), 3);
        board.pick_piece(PieceType::Dragon).unwrap();
        board.apply_setup(&setup).unwrap();
        assert_eq!(board.picks_left(), 0);
        assert_eq!(board.own_amounts()[PieceType::Lancer as usize], 2);
        assert_eq!(board.pieces_of(true, PieceType::Dragon), 2..3);
    }

    #[test]
    fn rejected_setup_returns_its_picks() {
        let cfg = Config {
            options: ConfigOptions::SET_PIECE_BATTLE,
            set_piece_battle_num: 4,
            ..Config::default()
        };
        let colliding = Setup {
            pieces: vec![
                (Pos::new(0, 0), PieceType::Throne),
                (Pos::new(1, 0), PieceType::Lancer),
                (Pos::new(1, 0), PieceType::Lancer),
                (Pos::new(3, 0), PieceType::Dragon),
            ],
            ..Setup::generate(&cfg)
        };
        let mut board = Board::new(cfg.clone());
        let err = board.apply_setup(&colliding).unwrap_err();
        assert_eq!(err, SetupError::PieceCollision { x: 1, y: 0 });
        assert_eq!(board.picks_left(), 3);
        assert_eq!(board.own_amounts()[PieceType::Lancer as usize], 0);

        let other = Setup {
            pieces: vec![
                (Pos::new(0, 0), PieceType::Throne),
                (Pos::new(1, 0), PieceType::Ranger),
                (Pos::new(2, 0), PieceType::Spearman),
                (Pos::new(3, 0), PieceType::Dragon),
            ],
            ..Setup::generate(&cfg)
        };
        board.apply_setup(&other).unwrap();
        assert_eq!(board.picks_left(), 0);
        assert_eq!(board.own_amounts()[PieceType::Lancer as usize], 0);
        assert_eq!(board.own_amounts()[PieceType::Ranger as usize], 1);
        assert_eq!(board.own_amounts()[PieceType::Spearman as usize], 1);
    }

    #[test]
    fn setup_payload_mirrors_own_side() {
        let cfg = Config::default();
        let a = ready_board(cfg.clone());
        let mut b = ready_board(cfg);
        let payload = a.setup_payload();
        let buffer = b.apply_enemy_setup(&payload).unwrap();
        assert_eq!(buffer.len(), 9);
        for t in a.own_home() {
            assert_eq!(b.tile(a.invert_tile(t)).kind, a.tile(t).kind);
        }
        for p in a.own_pieces() {
            let there = b.inverse_piece_id(p);
            assert_eq!(b.piece(there).kind, a.piece(p).kind);
            assert_eq!(b.piece_tile(there), a.piece_tile(p).map(|t| a.invert_tile(t)));
        }
    }

    #[test]
    fn middle_conflicts_are_pushed_aside() {
        let cfg = Config {
            middle_amounts: [1, 0, 0, 0],
            ..Config::default()
        };
        let mut board = Board::new(cfg);
        board.tiles[36 + 4] = Tile::new(TileType::Plains);
        let mut buf = vec![TileType::Empty; 9];
        buf[4] = TileType::Forest;
        board.prepare_match(true, &mut buf);
        let mid: Vec<TileType> = board.middle().map(|t| board.tile(t).kind).collect();
        assert_eq!(mid[3], TileType::Plains);
        assert_eq!(mid[5], TileType::Forest);
        assert_eq!(mid[4], TileType::Fortress);

        let mut other = Board::new(Config {
            middle_amounts: [1, 0, 0, 0],
            ..Config::default()
        });
        other.tiles[36 + 4] = Tile::new(TileType::Forest);
        let mut buf = vec![TileType::Empty; 9];
        buf[4] = TileType::Plains;
        other.prepare_match(false, &mut buf);
        // mirrored view of the same merge
        assert_eq!(other.tile(36 + 5).kind, TileType::Plains);
        assert_eq!(other.tile(36 + 3).kind, TileType::Forest);
    }

    #[test]
    fn free_middle_tiles_are_taken_over() {
        let mut board = Board::new(Config::default());
        let mut buf = vec![TileType::Empty; 9];
        buf[2] = TileType::Water;
        board.prepare_match(false, &mut buf);
        assert_eq!(board.tile(38).kind, TileType::Water);
        assert_eq!(buf[2], TileType::Empty);
        assert_eq!(board.tile(36).kind, TileType::Fortress);
    }

    #[test]
    fn throne_entering_new_fortress_is_reported() {
        let mut board = ready_board(Config::default());
        let fort = board
            .own_home()
            .find(|&t| board.tile(t).kind == TileType::Fortress)
            .unwrap();
        let throne = board.pieces_of(true, PieceType::Throne).start;
        assert!(board.place_piece(throne, fort));
        assert!(!board.place_piece(throne, fort));
        assert_eq!(board.piece(throne).last_fortress, Some(fort));
        assert!(!board.place_piece(0, fort + 1));
    }

    #[test]
    fn restore_skips_occupied_fortresses() {
        let mut board = ready_board(Config::default());
        let fort = board
            .own_home()
            .find(|&t| board.tile(t).kind == TileType::Fortress)
            .unwrap();
        let occupant = board.piece_at(fort).unwrap();
        board.set_breached(fort, true);
        assert!(board.restore_fortresses().is_empty());
        board.remove_piece(occupant);
        assert_eq!(board.restore_fortresses(), vec![fort]);
        assert!(!board.tile(fort).breached);
    }

    #[test]
    fn throne_loss_and_fortress_capture() {
        let mut board = ready_board(Config::default());
        let throne = board.pieces_of(true, PieceType::Throne).start;
        assert!(!board.thrones_lost(true));
        board.remove_piece(throne);
        assert!(board.thrones_lost(true));

        let fort = board
            .own_home()
            .find(|&t| board.tile(t).kind == TileType::Fortress)
            .unwrap();
        let enemy_throne = board.pieces_of(false, PieceType::Throne).start;
        assert!(!board.fortresses_captured(true));
        let occupant = board.piece_at(fort).unwrap();
        board.remove_piece(occupant);
        board.place_piece(enemy_throne, fort);
        assert!(board.fortresses_captured(true));
        // a non-capturer does not count
        board.remove_piece(enemy_throne);
        board.place_piece(board.num, fort);
        assert!(!board.fortresses_captured(true));
    }

    #[test]
    fn victory_points_count_middle_fortresses() {
        let mut board = Board::new(Config::default());
        board.prepare_match(true, &mut vec![TileType::Empty; 9]);
        board.place_piece(0, 36);
        board.place_piece(1, 37);
        board.place_piece(13, 44);
        assert_eq!(board.count_victory_points(), (2, 1));
    }

    #[test]
    fn establish_respects_spacing() {
        let mut board = ready_board(Config::default());
        let throne = board.pieces_of(true, PieceType::Throne).start;
        // far from every home fortress: the middle row centre
        board.prepare_match(true, &mut vec![TileType::Empty; 9]);
        board.tiles[40] = Tile::new(TileType::Plains);
        board.place_piece(throne, 40);
        for t in board.enemy_home() {
            board.tiles[usize::from(t)] = Tile::new(TileType::Plains);
        }
        for t in board.own_home() {
            board.tiles[usize::from(t)] = Tile::new(TileType::Plains);
        }
        assert_eq!(board.establish_target(throne), Ok((40, TileTop::OwnFarm)));
        board.set_top(TileTop::OwnFarm, Some(40));
        let err = board.establish_target(throne).unwrap_err();
        assert_eq!(err.message(), "Tile is too close to a farm");

        board.tiles[70] = Tile::new(TileType::Fortress);
        board.place_piece(throne, 71);
        let err = board.establish_target(throne).unwrap_err();
        assert_eq!(err.message(), "Tile is too close to a fortress");
    }

    #[test]
    fn spawn_targets_follow_tile_tops() {
        let mut board = ready_board(Config::default());
        assert!(board.spawn_tiles(PieceType::Ranger).is_empty());
        let free = board.own_home().find(|&t| board.piece_at(t).is_none()).unwrap();
        board.set_top(TileTop::OwnFarm, Some(free));
        assert_eq!(board.spawn_tiles(PieceType::Lancer), vec![free]);
        board.set_breached(free, true);
        assert!(board.spawn_tiles(PieceType::Lancer).is_empty());
        assert_eq!(board.spawn_tiles(PieceType::Crossbowman).len(), 1);
        assert_eq!(board.spawnable_piece(PieceType::Ranger), None);
        board.remove_piece(1);
        assert_eq!(board.spawnable_piece(PieceType::Ranger), Some(1));
    }

    #[test]
    fn rebuild_needs_breached_fortress_or_farm() {
        let mut board = ready_board(Config::default());
        let throne = board.pieces_of(true, PieceType::Throne).start;
        let fort = board
            .own_home()
            .find(|&t| board.tile(t).kind == TileType::Fortress)
            .unwrap();
        board.place_piece(throne, fort);
        assert!(!board.rebuildable(throne));
        board.set_breached(fort, true);
        assert!(board.rebuildable(throne));
    }

    #[test]
    fn own_setup_roundtrips() {
        let cfg = Config::default();
        let board = ready_board(cfg.clone());
        let mut again = Board::new(cfg);
        again.apply_setup(&board.own_setup()).unwrap();
        assert_eq!(again.tiles()[45..], board.tiles()[45..]);
    }

    #[test]
    fn snapshot_rebuilds_the_board() {
        let cfg = Config::default();
        let mut board = ready_board(cfg.clone());
        board.set_top(TileTop::OwnFarm, Some(50));
        let again = Board::from_snapshot(cfg, &board.snapshot()).unwrap();
        assert_eq!(again, board);

        let small = Config {
            home_width: 7,
            ..Config::default()
        };
        assert!(Board::from_snapshot(small, &board.snapshot()).is_none());
    }

    #[test]
    fn display_marks_own_pieces() {
        let board = ready_board(Config::default());
        let text = board.to_string();
        assert_eq!(text.lines().count(), 9);
        assert!(text.contains('K'));
    }
}
