//! Board representation.
//!
//! Grid geometry, tile and piece types, saved setups, and the board model
//! that owns the tile and piece arenas of a match.

pub mod geometry;
pub mod piece;
pub mod setup;
pub mod state;
pub mod tile;

pub use geometry::{delta_single, distance, Direction, GridSize, Pos, TileId, ALL_DIRECTIONS};
pub use piece::{Piece, PieceId, PieceType, ALL_PIECE_TYPES, PIECE_LIM};
pub use setup::Setup;
pub use state::{Board, BoardSnapshot};
pub use tile::{Tile, TileTop, TileType, ALL_TILE_TOPS, QUOTA_TILE_TYPES, TILE_LIM};
