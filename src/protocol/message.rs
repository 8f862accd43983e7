//! Message payloads.
//!
//! Piece and tile indices in these payloads are already expressed in the
//! receiver's frame (see [`crate::board::Board::inverse_piece_id`] and
//! [`crate::board::geometry::GridSize::invert_id`]); the receiver indexes its
//! arrays with them directly.

use crate::board::piece::PIECE_LIM;
use crate::board::tile::{TileTop, TileType, TILE_TOP_NONE};
use crate::config::Config;
use crate::error::WireError;
use crate::turn::RecordInfo;

use super::frame::{encode_frame, put_u16, Code, Frame, WireReader};

/// Wire value meaning "no piece" or "off the board".
pub const NO_ID: u16 = u16::MAX;

/// Protect entries carry the strong flag in the top bit.
const STRONG_BIT: u16 = 0x8000;

/// A home arrangement sent once setup is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupPayload {
    /// Sender's home tiles followed by its middle row, in inverted order.
    pub tiles: Vec<TileType>,
    /// Sender's fielded piece amounts per type.
    pub amounts: [u16; PIECE_LIM],
    /// Inverted tile of each of the sender's pieces, `None` when unplaced.
    pub positions: Vec<Option<u16>>,
}

/// End-of-turn summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPayload {
    pub info: RecordInfo,
    pub last_actor: Option<u16>,
    /// `(piece, strong)` pairs.
    pub protects: Vec<(u16, bool)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Start { first_turn: bool, config: Config },
    Setup(SetupPayload),
    Move { piece: u16, tile: u16 },
    Kill { piece: u16 },
    Breach { tile: u16, breached: bool },
    Tile { tile: u16, kind: TileType, top: Option<TileTop> },
    Record(RecordPayload),
}

impl Message {
    pub fn code(&self) -> Code {
        match self {
            Message::Start { .. } => Code::Start,
            Message::Setup(_) => Code::Setup,
            Message::Move { .. } => Code::Move,
            Message::Kill { .. } => Code::Kill,
            Message::Breach { .. } => Code::Breach,
            Message::Tile { .. } => Code::Tile,
            Message::Record(_) => Code::Record,
        }
    }

    /// Serializes the payload without a frame header.
    pub fn payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Message::Start { first_turn, config } => {
                out.push(u8::from(*first_turn));
                config.write_wire(&mut out);
            }
            Message::Setup(setup) => {
                out.resize(packed_len(setup.tiles.len()), 0);
                for (i, kind) in setup.tiles.iter().enumerate() {
                    out[i / 2] |= (*kind as u8) << (i % 2 * 4);
                }
                for amt in setup.amounts {
                    put_u16(&mut out, amt);
                }
                for pos in &setup.positions {
                    put_u16(&mut out, pos.unwrap_or(NO_ID));
                }
            }
            Message::Move { piece, tile } => {
                put_u16(&mut out, *piece);
                put_u16(&mut out, *tile);
            }
            Message::Kill { piece } => put_u16(&mut out, *piece),
            Message::Breach { tile, breached } => {
                put_u16(&mut out, *tile);
                out.push(u8::from(*breached));
            }
            Message::Tile { tile, kind, top } => {
                put_u16(&mut out, *tile);
                let top = top.map_or(TILE_TOP_NONE, |t| t as u8);
                out.push(*kind as u8 | (top << 4));
            }
            Message::Record(rec) => {
                out.push(rec.info as u8);
                put_u16(&mut out, rec.last_actor.unwrap_or(NO_ID));
                put_u16(&mut out, rec.protects.len() as u16);
                for &(piece, strong) in &rec.protects {
                    let flag = if strong { STRONG_BIT } else { 0 };
                    put_u16(&mut out, (piece & !STRONG_BIT) | flag);
                }
            }
        }
        out
    }

    /// Serializes the message into a complete frame.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode_frame(self.code(), &self.payload())
    }

    /// Parses a received frame.
    ///
    /// `setup_tiles` is the number of tile nibbles in a `setup` payload, which
    /// depends on the board size; other messages ignore it.
    pub fn decode(frame: &Frame, setup_tiles: usize) -> Result<Message, WireError> {
        let bytes = frame.payload.as_slice();
        match frame.code {
            Code::Start => {
                let mut r = WireReader::new(bytes, "start");
                let first_turn = r.u8()? != 0;
                let config = Config::read_wire(&mut r)?;
                Ok(Message::Start { first_turn, config })
            }
            Code::Setup => {
                let mut r = WireReader::new(bytes, "setup");
                let packed = r.take(packed_len(setup_tiles))?;
                let tiles = (0..setup_tiles)
                    .map(|i| {
                        let nibble = (packed[i / 2] >> (i % 2 * 4)) & 0xF;
                        TileType::from_u8(nibble).ok_or(WireError::InvalidValue {
                            field: "tile type",
                            value: u32::from(nibble),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let mut amounts = [0u16; PIECE_LIM];
                for amt in &mut amounts {
                    *amt = r.u16()?;
                }
                let mut positions = Vec::with_capacity(r.remaining() / 2);
                while r.remaining() >= 2 {
                    let id = r.u16()?;
                    positions.push((id != NO_ID).then_some(id));
                }
                Ok(Message::Setup(SetupPayload {
                    tiles,
                    amounts,
                    positions,
                }))
            }
            Code::Move => {
                let mut r = WireReader::new(bytes, "move");
                Ok(Message::Move {
                    piece: r.u16()?,
                    tile: r.u16()?,
                })
            }
            Code::Kill => {
                let mut r = WireReader::new(bytes, "kill");
                Ok(Message::Kill { piece: r.u16()? })
            }
            Code::Breach => {
                let mut r = WireReader::new(bytes, "breach");
                Ok(Message::Breach {
                    tile: r.u16()?,
                    breached: r.u8()? != 0,
                })
            }
            Code::Tile => {
                let mut r = WireReader::new(bytes, "tile");
                let tile = r.u16()?;
                let packed = r.u8()?;
                let kind = TileType::from_u8(packed & 0xF).ok_or(WireError::InvalidValue {
                    field: "tile type",
                    value: u32::from(packed & 0xF),
                })?;
                let top = match packed >> 4 {
                    TILE_TOP_NONE => None,
                    v => Some(TileTop::from_u8(v).ok_or(WireError::InvalidValue {
                        field: "tile top",
                        value: u32::from(v),
                    })?),
                };
                Ok(Message::Tile { tile, kind, top })
            }
            Code::Record => {
                let mut r = WireReader::new(bytes, "record");
                let raw = r.u8()?;
                let info = RecordInfo::from_u8(raw).ok_or(WireError::InvalidValue {
                    field: "record info",
                    value: u32::from(raw),
                })?;
                let last = r.u16()?;
                let count = r.u16()?;
                let protects = (0..count)
                    .map(|_| r.u16().map(|v| (v & !STRONG_BIT, v & STRONG_BIT != 0)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Message::Record(RecordPayload {
                    info,
                    last_actor: (last != NO_ID).then_some(last),
                    protects,
                }))
            }
        }
    }
}

fn packed_len(tiles: usize) -> usize {
    tiles.div_ceil(2)
}
