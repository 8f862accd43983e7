//! Message framing.
//!
//! Every message on the wire is `[code: u8][length: u16][payload]`, with the
//! length counting payload bytes only. All integers are big-endian.

use crate::error::WireError;

/// Size of the frame header.
pub const HEADER_SIZE: usize = 3;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Code {
    Start = 0,
    Setup = 1,
    Move = 2,
    Kill = 3,
    Breach = 4,
    Tile = 5,
    Record = 6,
}

impl Code {
    pub fn from_u8(v: u8) -> Result<Code, WireError> {
        match v {
            0 => Ok(Code::Start),
            1 => Ok(Code::Setup),
            2 => Ok(Code::Move),
            3 => Ok(Code::Kill),
            4 => Ok(Code::Breach),
            5 => Ok(Code::Tile),
            6 => Ok(Code::Record),
            other => Err(WireError::UnknownCode(other)),
        }
    }
}

/// A complete received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: Code,
    pub payload: Vec<u8>,
}

/// Wraps a payload in a frame header.
pub fn encode_frame(code: Code, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(WireError::Oversized(payload.len()));
    }
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.push(code as u8);
    put_u16(&mut out, payload.len() as u16);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Incremental frame splitter for a byte stream.
///
/// Bytes are appended as they arrive; complete frames are handed out in
/// arrival order.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet consumed as a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete frame, or `None` if more bytes are needed.
    ///
    /// An unknown code is reported as soon as the header byte arrives.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, WireError> {
        let Some(&code) = self.buf.first() else {
            return Ok(None);
        };
        let code = Code::from_u8(code)?;
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let len = usize::from(u16::from_be_bytes([self.buf[1], self.buf[2]]));
        if self.buf.len() < HEADER_SIZE + len {
            return Ok(None);
        }
        let payload = self.buf[HEADER_SIZE..HEADER_SIZE + len].to_vec();
        self.buf.drain(..HEADER_SIZE + len);
        Ok(Some(Frame { code, payload }))
    }
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Bounds-checked cursor over a payload.
#[derive(Debug)]
pub struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> WireReader<'a> {
    /// `what` names the payload in truncation errors.
    pub fn new(bytes: &'a [u8], what: &'static str) -> Self {
        Self { bytes, pos: 0, what }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                what: self.what,
                need: self.pos + n,
                got: self.bytes.len(),
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
}
