//! Thrones rules engine library.
//!
//! Exposes the board model, move generation, turn bookkeeping, the match
//! state machine, and the peer protocol for use by integration tests and the
//! binary entry point.

pub mod board;
pub mod config;
pub mod error;
pub mod game;
pub mod movegen;
pub mod net;
pub mod protocol;
pub mod replay;
pub mod turn;
