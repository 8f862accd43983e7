//! Grid geometry.
//!
//! Pure conversions between linear tile indices and 2D board coordinates,
//! the 8-neighbourhood, unit steps for straight-line tracing, and the point
//! inversion that maps a tile onto the opponent's mirrored frame.

use serde::{Deserialize, Serialize};

/// Linear tile index into the board's tile array.
pub type TileId = u16;

/// Dimensions of the full board in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub width: u16,
    pub height: u16,
}

/// A tile coordinate. `x` grows to the right, `y` grows towards the own home rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: u16,
    pub y: u16,
}

impl Pos {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// One of the eight compass directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    LeftUp,
    Up,
    RightUp,
    Left,
    Right,
    LeftDown,
    Down,
    RightDown,
}

/// All directions in scan order (row above, same row, row below).
pub const ALL_DIRECTIONS: [Direction; 8] = [
    Direction::LeftUp,
    Direction::Up,
    Direction::RightUp,
    Direction::Left,
    Direction::Right,
    Direction::LeftDown,
    Direction::Down,
    Direction::RightDown,
];

impl Direction {
    /// Returns the unit displacement `(dx, dy)` of this direction.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::LeftUp => (-1, -1),
            Direction::Up => (0, -1),
            Direction::RightUp => (1, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::LeftDown => (-1, 1),
            Direction::Down => (0, 1),
            Direction::RightDown => (1, 1),
        }
    }
}

impl GridSize {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Number of tiles on the board.
    pub const fn area(self) -> u16 {
        self.width * self.height
    }

    pub const fn contains(self, pos: Pos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    pub const fn pos_to_id(self, pos: Pos) -> TileId {
        pos.y * self.width + pos.x
    }

    pub const fn id_to_pos(self, id: TileId) -> Pos {
        Pos::new(id % self.width, id / self.width)
    }

    /// Maps a tile onto the opponent's frame (point inversion through the board centre).
    pub const fn invert_id(self, id: TileId) -> TileId {
        self.area() - id - 1
    }

    /// Returns the position displaced by `(dx, dy)`, or `None` when it leaves the board.
    pub fn offset(self, pos: Pos, dx: i32, dy: i32) -> Option<Pos> {
        let x = i32::from(pos.x) + dx;
        let y = i32::from(pos.y) + dy;
        if x < 0 || y < 0 || x >= i32::from(self.width) || y >= i32::from(self.height) {
            return None;
        }
        Some(Pos::new(x as u16, y as u16))
    }

    /// Returns the neighbour of `id` in direction `dir`, or `None` at the border.
    pub fn adjacent(self, id: TileId, dir: Direction) -> Option<TileId> {
        if id >= self.area() {
            return None;
        }
        let (dx, dy) = dir.delta();
        self.offset(self.id_to_pos(id), dx, dy)
            .map(|p| self.pos_to_id(p))
    }

    /// Iterates over the in-bounds neighbours of `id`.
    pub fn neighbors(self, id: TileId) -> impl Iterator<Item = TileId> {
        ALL_DIRECTIONS
            .into_iter()
            .filter_map(move |dir| self.adjacent(id, dir))
    }
}

/// Reduces an arbitrary displacement to a single compass step (each axis -1, 0 or 1).
pub fn delta_single(dx: i32, dy: i32) -> (i32, i32) {
    (dx.signum(), dy.signum())
}

/// Chebyshev distance between two positions.
pub fn distance(a: Pos, b: Pos) -> u16 {
    a.x.abs_diff(b.x).max(a.y.abs_diff(b.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: GridSize = GridSize::new(9, 9);

    #[test]
    fn id_pos_roundtrip() {
        for id in 0..SIZE.area() {
            assert_eq!(SIZE.pos_to_id(SIZE.id_to_pos(id)), id);
        }
        assert_eq!(SIZE.pos_to_id(Pos::new(3, 2)), 21);
        assert_eq!(SIZE.id_to_pos(21), Pos::new(3, 2));
    }

    #[test]
    fn corner_has_three_neighbors() {
        let ids: Vec<TileId> = SIZE.neighbors(0).collect();
        assert_eq!(ids, vec![1, 9, 10]);
        assert_eq!(SIZE.adjacent(0, Direction::Up), None);
        assert_eq!(SIZE.adjacent(0, Direction::LeftDown), None);
    }

    #[test]
    fn centre_has_eight_neighbors() {
        let centre = SIZE.pos_to_id(Pos::new(4, 4));
        assert_eq!(SIZE.neighbors(centre).count(), 8);
    }

    #[test]
    fn adjacent_does_not_wrap_rows() {
        let right_edge = SIZE.pos_to_id(Pos::new(8, 3));
        assert_eq!(SIZE.adjacent(right_edge, Direction::Right), None);
        assert_eq!(SIZE.adjacent(right_edge, Direction::RightDown), None);
        assert_eq!(SIZE.adjacent(SIZE.area(), Direction::Left), None);
    }

    #[test]
    fn invert_is_involution() {
        for id in 0..SIZE.area() {
            assert_eq!(SIZE.invert_id(SIZE.invert_id(id)), id);
        }
        assert_eq!(SIZE.invert_id(0), SIZE.area() - 1);
        let p = SIZE.id_to_pos(SIZE.invert_id(SIZE.pos_to_id(Pos::new(2, 1))));
        assert_eq!(p, Pos::new(6, 7));
    }

    #[test]
    fn delta_single_reduces_to_unit_step() {
        assert_eq!(delta_single(5, -3), (1, -1));
        assert_eq!(delta_single(0, 7), (0, 1));
        assert_eq!(delta_single(-2, 0), (-1, 0));
        assert_eq!(delta_single(0, 0), (0, 0));
    }

    #[test]
    fn chebyshev_distance() {
        assert_eq!(distance(Pos::new(1, 1), Pos::new(3, 2)), 2);
        assert_eq!(distance(Pos::new(4, 4), Pos::new(4, 4)), 0);
    }
}
