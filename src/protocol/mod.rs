//! Peer protocol and console handling.
//!
//! This module implements the binary framing and message payloads exchanged
//! between the two peers of a match, and the command parser for the console
//! driver's main loop.

pub mod frame;
pub mod message;
pub mod parser;

pub use frame::{encode_frame, Code, Frame, FrameDecoder};
pub use message::{Message, RecordPayload, SetupPayload};
pub use parser::{parse_command, parse_pos, Command};
