//! Straight-line reach along the eight compass rays.

use crate::board::{Board, TileId, ALL_DIRECTIONS};

use super::TileSet;

/// Adds every neighbour of `pos`.
pub fn single(board: &Board, pos: TileId, tiles: &mut TileSet) {
    tiles.extend(board.grid().neighbors(pos));
}

/// Traces up to `dlim` steps along each ray. A tile that fails `passable` is
/// still reached but ends its ray.
pub fn straight<P>(board: &Board, pos: TileId, dlim: u16, tiles: &mut TileSet, passable: P)
where
    P: Fn(&Board, TileId) -> bool,
{
    let grid = board.grid();
    for dir in ALL_DIRECTIONS {
        let mut at = pos;
        for _ in 0..dlim {
            let Some(next) = grid.adjacent(at, dir) else { break };
            tiles.insert(next);
            if !passable(board, next) {
                break;
            }
            at = next;
        }
    }
}

/// Adds the tiles `min..=max` steps away along each ray, ignoring anything
/// in between.
pub fn by_distance(board: &Board, pos: TileId, (min, max): (u16, u16), tiles: &mut TileSet) {
    let grid = board.grid();
    let origin = grid.id_to_pos(pos);
    for dir in ALL_DIRECTIONS {
        let (dx, dy) = dir.delta();
        for i in i32::from(min)..=i32::from(max) {
            match grid.offset(origin, dx * i, dy * i) {
                Some(p) => {
                    tiles.insert(grid.pos_to_id(p));
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Pos;
    use crate::config::Config;

    fn at(board: &Board, x: u16, y: u16) -> TileId {
        board.tile_at(Pos::new(x, y)).unwrap()
    }

    #[test]
    fn straight_includes_blocking_tile() {
        let board = Board::new(Config::default());
        let pos = at(&board, 4, 4);
        let wall = at(&board, 4, 2);
        let mut tiles = TileSet::new();
        straight(&board, pos, 4, &mut tiles, |_, t| t != wall);
        assert!(tiles.contains(&wall));
        assert!(!tiles.contains(&at(&board, 4, 1)));
        assert!(tiles.contains(&at(&board, 4, 8)));
        assert!(tiles.contains(&at(&board, 0, 0)));
    }

    #[test]
    fn band_skips_near_tiles() {
        let board = Board::new(Config::default());
        let mut tiles = TileSet::new();
        by_distance(&board, at(&board, 4, 4), (3, 3), &mut tiles);
        assert_eq!(tiles.len(), 8);
        assert!(!tiles.contains(&at(&board, 4, 3)));
        assert!(tiles.contains(&at(&board, 1, 7)));
    }

    #[test]
    fn single_at_edge() {
        let board = Board::new(Config::default());
        let mut tiles = TileSet::new();
        single(&board, at(&board, 4, 0), &mut tiles);
        assert_eq!(tiles.len(), 5);
    }
}
