//! Incoming messages and turn hand-over.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{Game, MatchPhase, Notifier};
use crate::board::{Board, TileId};
use crate::error::{GameError, NetError, WireError};
use crate::net::Link;
use crate::protocol::message::{Message, RecordPayload};
use crate::replay::ReplayEvent;
use crate::turn::{RecordInfo, TurnRecord};

impl<L: Link, N: Notifier> Game<L, N> {
    /// Handles every message that has arrived. Returns how many were handled.
    ///
    /// Any error returned here is fatal: the match is left in
    /// [`MatchPhase::Aborted`].
    pub fn tick(&mut self) -> Result<usize, GameError> {
        let mut handled = 0;
        while !matches!(self.phase, MatchPhase::Over(_) | MatchPhase::Aborted) {
            let frame = match self.link.poll() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => return Err(self.abort(err)),
            };
            let setup_tiles = usize::from(self.board.own_home().start);
            let msg = match Message::decode(&frame, setup_tiles) {
                Ok(msg) => msg,
                Err(err) => return Err(self.abort(err.into())),
            };
            match self.handle(msg) {
                Ok(()) => {}
                Err(GameError::Net(err)) => return Err(self.abort(err)),
                Err(other) => return Err(other),
            }
            handled += 1;
        }
        Ok(handled)
    }

    fn handle(&mut self, msg: Message) -> Result<(), GameError> {
        debug!(code = ?msg.code(), "received");
        match (self.phase, msg) {
            (MatchPhase::Connecting, Message::Start { first_turn, mut config }) => {
                config.check_values();
                self.board = Board::new(config);
                self.my_turn = first_turn;
                self.phase = MatchPhase::Setup;
                info!(my_turn = first_turn, "joined match");
                Ok(())
            }
            (MatchPhase::Setup, Message::Setup(payload)) if self.enemy_middle.is_none() => {
                let middle = self.board.apply_enemy_setup(&payload).map_err(NetError::from)?;
                self.enemy_middle = Some(middle);
                self.notifier.opponent_ready();
                if self.own_ready {
                    self.start_match()?;
                }
                Ok(())
            }
            (MatchPhase::Playing, Message::Move { piece, tile }) => {
                self.wire_piece(piece)?;
                self.wire_tile(tile)?;
                self.record(ReplayEvent::Piece {
                    piece,
                    tile: Some(tile),
                });
                self.board.place_piece(piece, tile);
                Ok(())
            }
            (MatchPhase::Playing, Message::Kill { piece }) => {
                self.wire_piece(piece)?;
                self.record(ReplayEvent::Piece { piece, tile: None });
                self.board.remove_piece(piece);
                Ok(())
            }
            (MatchPhase::Playing, Message::Breach { tile, breached }) => {
                self.wire_tile(tile)?;
                self.record(ReplayEvent::Breach { tile, breached });
                self.board.set_breached(tile, breached);
                Ok(())
            }
            (MatchPhase::Playing, Message::Tile { tile, kind, top }) => {
                self.wire_tile(tile)?;
                self.record(ReplayEvent::Tile { tile, kind });
                self.board.set_tile_kind(tile, kind);
                if let Some(top) = top {
                    self.record(ReplayEvent::Top {
                        top,
                        tile: Some(tile),
                    });
                    self.board.set_top(top, Some(tile));
                }
                Ok(())
            }
            (MatchPhase::Playing, Message::Record(payload)) => self.recv_record(payload),
            (phase, msg) => Err(NetError::Unexpected(format!("{:?} during {phase:?}", msg.code())).into()),
        }
    }

    fn wire_piece(&self, piece: u16) -> Result<(), NetError> {
        if piece >= self.board.arena_len() {
            return Err(WireError::InvalidValue {
                field: "piece",
                value: u32::from(piece),
            }
            .into());
        }
        Ok(())
    }

    fn wire_tile(&self, tile: TileId) -> Result<(), NetError> {
        if tile >= self.board.tile_count() {
            return Err(WireError::InvalidValue {
                field: "tile",
                value: u32::from(tile),
            }
            .into());
        }
        Ok(())
    }

    fn recv_record(&mut self, payload: RecordPayload) -> Result<(), GameError> {
        let continued =
            self.own_rec.info == RecordInfo::BattleFail && payload.info == RecordInfo::BattleFail;
        if continued {
            self.own_rec.info = RecordInfo::None;
            self.ene_rec.info = RecordInfo::None;
        } else {
            let mut protects = BTreeMap::new();
            for (piece, strong) in payload.protects {
                self.wire_piece(piece)?;
                protects.insert(piece, strong);
            }
            let last_actor = payload.last_actor.filter(|&p| p < self.board.arena_len());
            self.ene_rec = TurnRecord::received(last_actor, protects, payload.info);
            self.own_rec = TurnRecord::new();
            self.check_points_win();
        }

        if self.ene_rec.info.is_final() {
            self.finish(self.ene_rec.info.inverted());
            return Ok(());
        }
        self.my_turn = true;
        self.prepare_turn(continued);
        info!(continued, battle_fail = self.ene_rec.info == RecordInfo::BattleFail, "turn started");
        self.notifier.turn_changed(true);
        Ok(())
    }

    /// Sends the own record and hands the turn to the opponent.
    pub(super) fn pass_turn(&mut self) -> Result<(), GameError> {
        self.finish_favor();
        self.send_record()?;
        self.first_turn = false;
        self.my_turn = false;
        if !self.own_rec.info.is_final() {
            self.prepare_turn(false);
            info!("turn passed");
            self.notifier.turn_changed(false);
        }
        Ok(())
    }

    pub(super) fn send_record(&mut self) -> Result<(), GameError> {
        let info = if self.own_rec.info != RecordInfo::None {
            self.own_rec.info
        } else if self.ene_rec.info == RecordInfo::BattleFail {
            RecordInfo::BattleFail
        } else {
            RecordInfo::None
        };
        let payload = RecordPayload {
            info,
            last_actor: self
                .own_rec
                .last_actor()
                .map(|p| self.board.inverse_piece_id(p)),
            protects: self
                .own_rec
                .protects
                .iter()
                .map(|(&p, &strong)| (self.board.inverse_piece_id(p), strong))
                .collect(),
        };
        self.send(Message::Record(payload))
    }
}
