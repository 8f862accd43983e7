//! Area reach: shortest-path flood, same-terrain flood, and port links.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::board::{Board, TileId, TileType};
use crate::config::ConfigOptions;

use super::{lines, TileSet};

/// Step counts from `src` to every tile, walking only onto `passable` tiles.
///
/// The source is expanded even when it fails the predicate. Tiles further
/// than `dlim` are not expanded, unreachable tiles stay at `u16::MAX`.
pub fn travel_dist<P>(board: &Board, src: TileId, dlim: u16, passable: P) -> Vec<u16>
where
    P: Fn(&Board, TileId) -> bool,
{
    let grid = board.grid();
    let mut dist = vec![u16::MAX; usize::from(grid.area())];
    let mut done = vec![false; dist.len()];
    let mut queue = BinaryHeap::new();
    dist[usize::from(src)] = 0;
    queue.push(Reverse((0u16, src)));

    while let Some(Reverse((d, u))) = queue.pop() {
        let ui = usize::from(u);
        if done[ui] || d > dist[ui] {
            continue;
        }
        done[ui] = true;
        if d >= dlim {
            continue;
        }
        for v in grid.neighbors(u) {
            let vi = usize::from(v);
            if !done[vi] && d + 1 < dist[vi] && passable(board, v) {
                dist[vi] = d + 1;
                queue.push(Reverse((d + 1, v)));
            }
        }
    }
    dist
}

/// Adds every tile within `dlim` steps of `pos`.
pub fn by_area<P>(board: &Board, pos: TileId, dlim: u16, tiles: &mut TileSet, passable: P)
where
    P: Fn(&Board, TileId) -> bool,
{
    let dist = travel_dist(board, pos, dlim, passable);
    tiles.extend(
        (0..board.tile_count()).filter(|&t| dist[usize::from(t)] <= dlim),
    );
}

/// Adds the region of tiles sharing `pos`'s terrain that is connected to it,
/// plus the direct neighbours of `pos`.
pub fn by_type<P>(board: &Board, pos: TileId, tiles: &mut TileSet, passable: P)
where
    P: Fn(&Board, TileId) -> bool,
{
    let grid = board.grid();
    let kind = board.tile(pos).kind;
    let mut stack = vec![pos];
    tiles.insert(pos);
    while let Some(t) = stack.pop() {
        for n in grid.neighbors(t) {
            if board.tile(n).kind == kind && !tiles.contains(&n) && passable(board, n) {
                tiles.insert(n);
                stack.push(n);
            }
        }
    }
    lines::single(board, pos, tiles);
}

/// With ports enabled, a piece on water at the board's edge may sail to any
/// other water tile on the edge.
pub fn by_ports(board: &Board, pos: TileId, tiles: &mut TileSet) {
    let grid = board.grid();
    let p = grid.id_to_pos(pos);
    let on_edge = p.x == 0 || p.y == 0 || p.x == grid.width - 1 || p.y == grid.height - 1;
    if !board.config().has(ConfigOptions::PORTS)
        || board.tile(pos).kind != TileType::Water
        || !on_edge
    {
        return;
    }
    tiles.extend((0..grid.area()).filter(|&t| {
        let q = grid.id_to_pos(t);
        let edge = q.x == 0 || q.y == 0 || q.x == grid.width - 1 || q.y == grid.height - 1;
        edge && board.tile(t).kind == TileType::Water
    }));
}
