//! Match recording and playback.
//!
//! A recording is a JSON-lines file: the first line holds the configuration
//! and the board as it stood when the match began, every following line is
//! one board mutation in the recording player's frame.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardSnapshot, PieceId, TileId, TileTop, TileType};
use crate::config::Config;
use crate::error::ReplayError;
use crate::turn::RecordInfo;

/// One recorded board mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    /// A piece moved, was placed, or left the board.
    Piece { piece: PieceId, tile: Option<TileId> },
    Tile { tile: TileId, kind: TileType },
    Breach { tile: TileId, breached: bool },
    Top { top: TileTop, tile: Option<TileId> },
    /// Final result from the recording player's point of view.
    Finish { outcome: RecordInfo },
}

#[derive(Serialize, Deserialize)]
struct Header {
    config: Config,
    board: BoardSnapshot,
}

/// Applies an event and returns the event that undoes it.
fn apply(board: &mut Board, event: ReplayEvent) -> ReplayEvent {
    match event {
        ReplayEvent::Piece { piece, tile } => {
            let undo = ReplayEvent::Piece {
                piece,
                tile: board.piece_tile(piece),
            };
            match tile {
                Some(t) => {
                    board.place_piece(piece, t);
                }
                None => board.remove_piece(piece),
            }
            undo
        }
        ReplayEvent::Tile { tile, kind } => {
            let undo = ReplayEvent::Tile {
                tile,
                kind: board.tile(tile).kind,
            };
            board.set_tile_kind(tile, kind);
            undo
        }
        ReplayEvent::Breach { tile, breached } => {
            let undo = ReplayEvent::Breach {
                tile,
                breached: board.tile(tile).breached,
            };
            board.set_breached(tile, breached);
            undo
        }
        ReplayEvent::Top { top, tile } => {
            let undo = ReplayEvent::Top {
                top,
                tile: board.top_tile(top),
            };
            board.set_top(top, tile);
            undo
        }
        ReplayEvent::Finish { .. } => event,
    }
}

/// Appends events to a recording file.
pub struct ReplayWriter {
    out: BufWriter<File>,
    lines: usize,
}

impl ReplayWriter {
    /// Creates the file and writes the header for `board`.
    pub fn create(path: impl AsRef<Path>, board: &Board) -> Result<ReplayWriter, ReplayError> {
        let mut writer = ReplayWriter {
            out: BufWriter::new(File::create(path)?),
            lines: 0,
        };
        let header = Header {
            config: board.config().clone(),
            board: board.snapshot(),
        };
        writer.write_line(&header)?;
        Ok(writer)
    }

    pub fn record(&mut self, event: ReplayEvent) -> Result<(), ReplayError> {
        self.write_line(&event)
    }

    fn write_line(&mut self, value: &impl Serialize) -> Result<(), ReplayError> {
        self.lines += 1;
        serde_json::to_writer(&mut self.out, value).map_err(|source| ReplayError::Json {
            line: self.lines,
            source,
        })?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Steps forwards and backwards through a recording.
pub struct ReplayReader {
    board: Board,
    events: Vec<ReplayEvent>,
    undo: Vec<ReplayEvent>,
}

impl ReplayReader {
    pub fn open(path: impl AsRef<Path>) -> Result<ReplayReader, ReplayError> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();
        let first = lines.next().ok_or(ReplayError::Empty)??;
        let header: Header =
            serde_json::from_str(&first).map_err(|source| ReplayError::Json { line: 1, source })?;
        let board =
            Board::from_snapshot(header.config, &header.board).ok_or(ReplayError::BoardMismatch)?;

        let mut events = Vec::new();
        for (i, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line)
                .map_err(|source| ReplayError::Json { line: i + 2, source })?;
            events.push(event);
        }
        Ok(ReplayReader {
            board,
            events,
            undo: Vec::new(),
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Number of events applied so far.
    pub fn position(&self) -> usize {
        self.undo.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Applies the next event. Returns `None` at the end of the recording.
    pub fn next_event(&mut self) -> Option<ReplayEvent> {
        let event = *self.events.get(self.undo.len())?;
        let undo = apply(&mut self.board, event);
        self.undo.push(undo);
        Some(event)
    }

    /// Reverts the last applied event. Returns `None` at the start.
    pub fn prev_event(&mut self) -> Option<ReplayEvent> {
        let undo = self.undo.pop()?;
        apply(&mut self.board, undo);
        Some(self.events[self.undo.len()])
    }

    /// The recorded result, if the match was finished.
    pub fn outcome(&self) -> Option<RecordInfo> {
        self.events.iter().rev().find_map(|e| match e {
            ReplayEvent::Finish { outcome } => Some(*outcome),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Setup;

    fn ready_board() -> Board {
        let cfg = Config::default();
        let mut board = Board::new(cfg.clone());
        board.apply_setup(&Setup::generate(&cfg)).unwrap();
        board
    }

    #[test]
    fn steps_forward_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.jsonl");
        let board = ready_board();
        let start = board.clone();
        let from = board.piece_tile(0).unwrap();

        let mut writer = ReplayWriter::create(&path, &board).unwrap();
        writer.record(ReplayEvent::Piece { piece: 0, tile: Some(40) }).unwrap();
        writer.record(ReplayEvent::Breach { tile: 40, breached: true }).unwrap();
        writer.record(ReplayEvent::Top { top: TileTop::OwnFarm, tile: Some(40) }).unwrap();
        writer.record(ReplayEvent::Piece { piece: 1, tile: None }).unwrap();
        writer.record(ReplayEvent::Finish { outcome: RecordInfo::Win }).unwrap();
        drop(writer);

        let mut reader = ReplayReader::open(&path).unwrap();
        assert_eq!(reader.len(), 5);
        assert_eq!(reader.outcome(), Some(RecordInfo::Win));
        while reader.next_event().is_some() {}
        assert_eq!(reader.position(), 5);
        assert_eq!(reader.board().piece_tile(0), Some(40));
        assert!(reader.board().tile(40).breached);
        assert_eq!(reader.board().top_at(40), Some(TileTop::OwnFarm));
        assert!(!reader.board().piece(1).on_board());

        assert_eq!(reader.prev_event(), Some(ReplayEvent::Finish { outcome: RecordInfo::Win }));
        while reader.prev_event().is_some() {}
        assert_eq!(reader.board().piece_tile(0), Some(from));
        assert_eq!(reader.board(), &start);
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        File::create(&path).unwrap();
        assert!(matches!(ReplayReader::open(&path), Err(ReplayError::Empty)));
    }

    #[test]
    fn bad_line_reports_its_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        let writer = ReplayWriter::create(&path, &ready_board()).unwrap();
        drop(writer);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"event\":\"teleport\"}}").unwrap();
        match ReplayReader::open(&path) {
            Err(ReplayError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }
}
