//! Legal move and engagement sets.
//!
//! Both entry points are pure queries over a [`Board`]: they never mutate it
//! and always return a (possibly empty) set of tile ids. The caller rejects
//! any action whose destination is not a member. The acting piece's own tile
//! is never part of a result.

pub mod lines;
pub mod reach;

use std::collections::BTreeSet;

use crate::board::{Board, PieceId, PieceType, TileId, TileType};
use crate::config::ConfigOptions;
use crate::turn::{Favor, RecordInfo, TurnRecord};

/// Radius of a lancer's charge across open ground.
pub const LANCER_DIST: u16 = 3;

/// Flight range of a dragon.
pub const DRAGON_DIST: u16 = 4;

/// A set of tile ids.
pub type TileSet = BTreeSet<TileId>;

/// Tiles `piece` may move to.
///
/// `ene_rec` is the opponent's last turn record; after a lost battle every
/// move is a single step. `single` forces a single step too, which is how
/// swaps are checked.
pub fn collect_move_tiles(
    board: &Board,
    piece: PieceId,
    ene_rec: &TurnRecord,
    favor: Option<Favor>,
    single: bool,
) -> TileSet {
    let mut tiles = TileSet::new();
    let Some(pos) = board.piece_tile(piece) else {
        return tiles;
    };
    let kind = board.piece(piece).kind;
    let terrain = board.tile(pos).kind;

    reach::by_ports(board, pos, &mut tiles);
    if favor == Some(Favor::Hasten) || ene_rec.info == RecordInfo::BattleFail || single {
        lines::single(board, pos, &mut tiles);
    } else if kind == PieceType::Spearman && terrain == TileType::Water {
        reach::by_type(board, pos, &mut tiles, |_, _| true);
    } else if kind == PieceType::Lancer && terrain == TileType::Plains {
        reach::by_type(board, pos, &mut tiles, |_, _| true);
        reach::by_area(board, pos, LANCER_DIST, &mut tiles, ground_passable);
    } else if kind == PieceType::Dragon {
        let flier = dragon_passable(board.is_own_piece(piece));
        if board.config().has(ConfigOptions::DRAGON_STRAIGHT) {
            lines::straight(board, pos, DRAGON_DIST, &mut tiles, flier);
        } else {
            reach::by_area(board, pos, DRAGON_DIST, &mut tiles, flier);
        }
    } else {
        lines::single(board, pos, &mut tiles);
    }
    tiles.remove(&pos);
    tiles
}

/// Tiles `piece` may attack or fire at.
///
/// Ranged pieces reach a distance band along the eight compass rays, a
/// dragon strikes along its straight flight lines, everything else fights
/// its neighbours.
pub fn collect_engage_tiles(board: &Board, piece: PieceId) -> TileSet {
    let mut tiles = TileSet::new();
    let Some(pos) = board.piece_tile(piece) else {
        return tiles;
    };
    let kind = board.piece(piece).kind;
    if let Some(band) = kind.firing_area() {
        lines::by_distance(board, pos, band, &mut tiles);
    } else if kind == PieceType::Dragon {
        let flier = dragon_passable(board.is_own_piece(piece));
        lines::straight(board, pos, DRAGON_DIST, &mut tiles, flier);
    } else {
        lines::single(board, pos, &mut tiles);
    }
    tiles.remove(&pos);
    tiles
}

/// Anything but water.
pub fn ground_passable(board: &Board, tile: TileId) -> bool {
    board.tile(tile).kind != TileType::Water
}

/// A dragon flies over every piece except opposing dragons and ranged pieces.
pub fn dragon_passable(own: bool) -> impl Fn(&Board, TileId) -> bool {
    move |board: &Board, tile: TileId| match board.piece_at(tile) {
        None => true,
        Some(p) if board.is_own_piece(p) == own => true,
        Some(p) => {
            let kind = board.piece(p).kind;
            kind != PieceType::Dragon && !kind.is_ranged()
        }
    }
}
