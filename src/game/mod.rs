//! Match state machine.
//!
//! A [`Game`] owns the board, the two turn records, the favor economy, and the
//! link to the opponent. Every local action is validated in full before the
//! first mutation; each mutation is then applied locally and sent to the peer
//! right away, so both boards replay the same sequence. Incoming messages are
//! drained by [`Game::tick`].

mod rules;
mod sync;

use std::path::PathBuf;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::board::{Board, PieceId, PieceType, Setup, TileId, TileTop, TileType};
use crate::config::{Config, ConfigOptions};
use crate::error::{GameError, NetError};
use crate::net::Link;
use crate::protocol::message::Message;
use crate::replay::{ReplayEvent, ReplayWriter};
use crate::turn::{Favor, RecordInfo, TurnRecord, FAVOR_MAX};

/// Where the match stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting for the host's `start` message.
    Connecting,
    /// Both sides are arranging their home areas.
    Setup,
    Playing,
    Over(RecordInfo),
    /// The link failed; the match is abandoned.
    Aborted,
}

/// Whose move it is while [`MatchPhase::Playing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    MyTurn,
    /// The opponent lost a fortress battle: move their attacker one step.
    BattleContinuation,
    OpponentTurn,
}

/// What happened to the turn after a successful local action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    /// More actions may follow.
    Continue,
    /// The turn passed to the opponent.
    TurnEnded,
    /// The battle roll failed. After an attack the turn has passed as well.
    BattleLost,
    MatchOver(RecordInfo),
}

/// Callbacks towards whatever presents the match.
pub trait Notifier {
    fn turn_changed(&mut self, _my_turn: bool) {}

    fn favor_picks_available(&mut self, _picks: u16) {}

    fn opponent_ready(&mut self) {}

    fn match_started(&mut self, _my_turn: bool) {}

    fn match_over(&mut self, _outcome: RecordInfo) {}
}

impl Notifier for () {}

/// Favor tokens of the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Favors {
    /// Favors held, per [`Favor`].
    pub count: [u16; FAVOR_MAX],
    /// Favors still obtainable, held ones included.
    pub left: [u16; FAVOR_MAX],
    /// Picks granted but not yet taken.
    pub available: u16,
}

impl Favors {
    fn start(limit: u16, available: u16) -> Self {
        Self {
            count: [0; FAVOR_MAX],
            left: [limit; FAVOR_MAX],
            available,
        }
    }

    pub fn held(&self, favor: Favor) -> u16 {
        self.count[favor as usize]
    }

    fn none_held(&self) -> bool {
        self.count.iter().all(|&c| c == 0)
    }
}

pub struct Game<L: Link, N: Notifier = ()> {
    board: Board,
    link: L,
    notifier: N,
    rng: SmallRng,
    phase: MatchPhase,
    my_turn: bool,
    first_turn: bool,
    own_rec: TurnRecord,
    ene_rec: TurnRecord,
    favors: Favors,
    selected: Option<Favor>,
    any_favor_used: bool,
    last_favor_used: bool,
    misc_action_taken: bool,
    unplaced_dragons: u16,
    vp_own: u16,
    vp_ene: u16,
    own_ready: bool,
    enemy_middle: Option<Vec<TileType>>,
    record_path: Option<PathBuf>,
    recorder: Option<ReplayWriter>,
}

impl<L: Link, N: Notifier> Game<L, N> {
    fn with_parts(config: Config, link: L, notifier: N, seed: Option<u64>) -> Self {
        Self {
            board: Board::new(config),
            link,
            notifier,
            rng: seed.map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64),
            phase: MatchPhase::Connecting,
            my_turn: false,
            first_turn: true,
            own_rec: TurnRecord::new(),
            ene_rec: TurnRecord::new(),
            favors: Favors::default(),
            selected: None,
            any_favor_used: false,
            last_favor_used: false,
            misc_action_taken: false,
            unplaced_dragons: 0,
            vp_own: 0,
            vp_ene: 0,
            own_ready: false,
            enemy_middle: None,
            record_path: None,
            recorder: None,
        }
    }

    /// Opens a match as host: decides who moves first and sends the
    /// configuration to the opponent.
    pub fn host(mut config: Config, link: L, notifier: N, seed: Option<u64>) -> Result<Self, GameError> {
        config.check_values();
        let mut game = Self::with_parts(config.clone(), link, notifier, seed);
        game.my_turn = game.rng.gen();
        game.phase = MatchPhase::Setup;
        info!(my_turn = game.my_turn, "hosting match");
        game.send(Message::Start {
            first_turn: !game.my_turn,
            config,
        })?;
        Ok(game)
    }

    /// Joins a match; the configuration arrives with the host's `start`.
    pub fn join(link: L, notifier: N, seed: Option<u64>) -> Self {
        Self::with_parts(Config::default(), link, notifier, seed)
    }

    /// Records every board mutation of the coming match to `path`.
    pub fn record_to(&mut self, path: impl Into<PathBuf>) {
        self.record_path = Some(path.into());
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> &Config {
        self.board.config()
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// `None` unless the match is being played.
    pub fn turn_state(&self) -> Option<TurnState> {
        if self.phase != MatchPhase::Playing {
            return None;
        }
        Some(if !self.my_turn {
            TurnState::OpponentTurn
        } else if self.ene_rec.info == RecordInfo::BattleFail {
            TurnState::BattleContinuation
        } else {
            TurnState::MyTurn
        })
    }

    pub fn is_my_turn(&self) -> bool {
        self.phase == MatchPhase::Playing && self.my_turn
    }

    pub fn is_first_turn(&self) -> bool {
        self.first_turn
    }

    pub fn own_record(&self) -> &TurnRecord {
        &self.own_rec
    }

    pub fn enemy_record(&self) -> &TurnRecord {
        &self.ene_rec
    }

    pub fn favors(&self) -> &Favors {
        &self.favors
    }

    pub fn selected_favor(&self) -> Option<Favor> {
        self.selected
    }

    /// Accumulated (own, enemy) victory points.
    pub fn victory_points(&self) -> (u16, u16) {
        (self.vp_own, self.vp_ene)
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    /// Adds a piece to a set-piece battle selection. Returns the picks left.
    pub fn pick_piece(&mut self, kind: PieceType) -> Result<u16, GameError> {
        self.ensure_setup()?;
        Ok(self.board.pick_piece(kind)?)
    }

    /// Applies the own home arrangement and sends it to the opponent. The
    /// match begins once both arrangements are known.
    pub fn submit_setup(&mut self, setup: &Setup) -> Result<(), GameError> {
        self.ensure_setup()?;
        self.board.apply_setup(setup)?;
        self.own_ready = true;
        debug!("own setup applied");
        self.send(Message::Setup(self.board.setup_payload()))?;
        if self.enemy_middle.is_some() {
            self.start_match()?;
        }
        Ok(())
    }

    fn ensure_setup(&self) -> Result<(), GameError> {
        if self.phase != MatchPhase::Setup {
            return Err(GameError::Phase("setup is over"));
        }
        if self.own_ready {
            return Err(GameError::Phase("setup already submitted"));
        }
        Ok(())
    }

    fn start_match(&mut self) -> Result<(), GameError> {
        let mut middle = self.enemy_middle.take().unwrap_or_default();
        self.board.prepare_match(self.my_turn, &mut middle);
        let config = self.board.config();
        let limit = config.favor_limit;
        let late = config.has(ConfigOptions::DRAGON_LATE);

        self.first_turn = true;
        self.own_rec = TurnRecord::new();
        self.ene_rec = TurnRecord::new();
        let available = self.board.count_available_favors();
        self.favors = Favors::start(limit, available);
        self.selected = None;
        self.unplaced_dragons = if late { self.board.off_board_dragons() } else { 0 };
        self.vp_own = 0;
        self.vp_ene = 0;
        self.phase = MatchPhase::Playing;

        if let Some(path) = self.record_path.clone() {
            match ReplayWriter::create(&path, &self.board) {
                Ok(writer) => self.recorder = Some(writer),
                Err(err) => warn!(path = %path.display(), "can't record match: {err}"),
            }
        }
        self.prepare_turn(false);
        info!(my_turn = self.my_turn, favors = available, "match started");
        self.notifier.match_started(self.my_turn);
        if available > 0 {
            self.notifier.favor_picks_available(available);
        }
        Ok(())
    }

    /// Takes a granted favor pick.
    pub fn pick_favor(&mut self, favor: Favor) -> Result<(), GameError> {
        if self.phase != MatchPhase::Playing {
            return Err(GameError::Phase("no match in progress"));
        }
        let i = favor as usize;
        if self.favors.available == 0 {
            return Err(GameError::rule("No favor picks available"));
        }
        if self.favors.count[i] >= self.favors.left[i] {
            return Err(GameError::rule(format!(
                "No {} favors left",
                favor.name()
            )));
        }
        self.favors.count[i] += 1;
        self.favors.available -= 1;
        debug!(favor = favor.name(), "favor picked");
        Ok(())
    }

    /// Selects the favor the next action is taken under, or clears it. A
    /// partly used favor is consumed when another one replaces it.
    pub fn select_favor(&mut self, favor: Option<Favor>) -> Result<(), GameError> {
        self.ensure_turn()?;
        if let Some(f) = favor {
            if self.ene_rec.info == RecordInfo::BattleFail {
                return Err(GameError::rule("Only moving is allowed"));
            }
            if self.favors.held(f) == 0 {
                return Err(GameError::rule(format!(
                    "No {} favor available",
                    f.name()
                )));
            }
        }
        if self.selected != favor {
            self.finish_favor();
        }
        self.selected = favor;
        Ok(())
    }

    /// Closes the selected favor, consuming it if an action was taken under
    /// it.
    fn finish_favor(&mut self) {
        if let Some(f) = self.selected.take() {
            if self.last_favor_used {
                let i = f as usize;
                self.favors.count[i] = self.favors.count[i].saturating_sub(1);
                if self.config().has(ConfigOptions::FAVOR_TOTAL) {
                    self.favors.left[i] = self.favors.left[i].saturating_sub(1);
                }
                self.any_favor_used = true;
                self.last_favor_used = false;
                debug!(favor = f.name(), "favor used");
            }
        }
    }

    /// Ends the turn on request.
    pub fn end_turn(&mut self) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        self.finish_favor();
        if let Some(outcome) = self.check_points_win() {
            self.do_win(outcome)?;
            return Ok(Conclusion::MatchOver(outcome));
        }
        self.pass_turn()?;
        Ok(Conclusion::TurnEnded)
    }

    /// Gives up the match.
    pub fn surrender(&mut self) -> Result<Conclusion, GameError> {
        if self.phase != MatchPhase::Playing {
            return Err(GameError::Phase("no match in progress"));
        }
        self.own_rec = TurnRecord::new();
        self.own_rec.info = RecordInfo::Loss;
        self.send_record()?;
        self.finish(RecordInfo::Loss);
        Ok(Conclusion::MatchOver(RecordInfo::Loss))
    }

    fn ensure_turn(&self) -> Result<(), GameError> {
        match self.phase {
            MatchPhase::Playing if self.my_turn => Ok(()),
            MatchPhase::Playing => Err(GameError::rule("It's not your turn")),
            _ => Err(GameError::Phase("no match in progress")),
        }
    }

    /// Own win or loss by thrones or home fortresses.
    fn check_win(&self) -> Option<RecordInfo> {
        if self.board.thrones_lost(true) || self.board.fortresses_captured(true) {
            Some(RecordInfo::Loss)
        } else if self.board.thrones_lost(false) || self.board.fortresses_captured(false) {
            Some(RecordInfo::Win)
        } else {
            None
        }
    }

    /// Adds this turn change's victory points and reports a decided match.
    fn check_points_win(&mut self) -> Option<RecordInfo> {
        let config = self.board.config();
        if !config.has(ConfigOptions::VICTORY_POINTS)
            || self.ene_rec.info == RecordInfo::BattleFail
        {
            return None;
        }
        let quota = config.victory_points_num;
        let (own, ene) = self.board.count_victory_points();
        self.vp_own += own;
        self.vp_ene += ene;
        if self.vp_own < quota && self.vp_ene < quota {
            return None;
        }
        Some(match self.vp_own.cmp(&self.vp_ene) {
            std::cmp::Ordering::Greater => RecordInfo::Win,
            std::cmp::Ordering::Less => RecordInfo::Loss,
            std::cmp::Ordering::Equal => RecordInfo::Tie,
        })
    }

    fn do_win(&mut self, outcome: RecordInfo) -> Result<(), GameError> {
        self.own_rec.info = outcome;
        self.pass_turn()?;
        self.finish(outcome);
        Ok(())
    }

    fn finish(&mut self, outcome: RecordInfo) {
        self.record(ReplayEvent::Finish { outcome });
        self.recorder = None;
        self.my_turn = false;
        self.phase = MatchPhase::Over(outcome);
        info!(?outcome, "match over");
        self.notifier.match_over(outcome);
    }

    /// Resets the per-turn state at a turn change.
    fn prepare_turn(&mut self, continued: bool) {
        let xmov = self.ene_rec.info == RecordInfo::BattleFail;
        let homefront = self.config().has(ConfigOptions::HOMEFRONT);
        if !(xmov || continued) && self.own_rec.info != RecordInfo::BattleFail && !homefront {
            for tile in self.board.restore_fortresses() {
                self.record(ReplayEvent::Breach { tile, breached: false });
            }
        }
        if self.my_turn && !continued {
            self.any_favor_used = false;
            self.last_favor_used = false;
            self.misc_action_taken = false;
        }
    }

    fn record(&mut self, event: ReplayEvent) {
        if let Some(writer) = &mut self.recorder {
            if let Err(err) = writer.record(event) {
                warn!("recording stopped: {err}");
                self.recorder = None;
            }
        }
    }

    fn send(&mut self, msg: Message) -> Result<(), GameError> {
        let res = msg
            .encode()
            .map_err(NetError::from)
            .and_then(|bytes| self.link.send(&bytes));
        res.map_err(|err| self.abort(err))
    }

    fn abort(&mut self, err: NetError) -> GameError {
        if !matches!(self.phase, MatchPhase::Over(_) | MatchPhase::Aborted) {
            warn!("match abandoned: {err}");
            self.phase = MatchPhase::Aborted;
            self.my_turn = false;
            self.recorder = None;
        }
        GameError::Net(err)
    }

    /// Moves a piece and tells the opponent. A throne entering a fresh
    /// fortress grants a favor pick.
    fn place_piece(&mut self, piece: PieceId, tile: TileId) -> Result<(), GameError> {
        self.record(ReplayEvent::Piece {
            piece,
            tile: Some(tile),
        });
        let entered = self.board.place_piece(piece, tile);
        if entered
            && self.board.is_own_piece(piece)
            && self.favors.available < self.favors.left.iter().sum::<u16>()
        {
            self.favors.available += 1;
            debug!(piece, tile, "throne entered a fortress");
        }
        let msg = Message::Move {
            piece: self.board.inverse_piece_id(piece),
            tile: self.board.invert_tile(tile),
        };
        self.send(msg)
    }

    fn remove_piece(&mut self, piece: PieceId) -> Result<(), GameError> {
        self.record(ReplayEvent::Piece { piece, tile: None });
        self.board.remove_piece(piece);
        let msg = Message::Kill {
            piece: self.board.inverse_piece_id(piece),
        };
        self.send(msg)
    }

    fn breach_tile(&mut self, tile: TileId, breached: bool) -> Result<(), GameError> {
        self.record(ReplayEvent::Breach { tile, breached });
        self.board.set_breached(tile, breached);
        let msg = Message::Breach {
            tile: self.board.invert_tile(tile),
            breached,
        };
        self.send(msg)
    }

    fn change_tile(&mut self, tile: TileId, kind: TileType, top: Option<TileTop>) -> Result<(), GameError> {
        self.record(ReplayEvent::Tile { tile, kind });
        self.board.set_tile_kind(tile, kind);
        if let Some(top) = top {
            self.record(ReplayEvent::Top {
                top,
                tile: Some(tile),
            });
            self.board.set_top(top, Some(tile));
        }
        let msg = Message::Tile {
            tile: self.board.invert_tile(tile),
            kind,
            top: top.map(TileTop::invert),
        };
        self.send(msg)
    }
}
