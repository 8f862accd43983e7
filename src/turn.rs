//! Per-turn action ledger.
//!
//! A `TurnRecord` tracks which pieces acted this turn and how, which pieces
//! are protected from engagement, and an outcome tag that travels with the
//! record at the end of the turn.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::board::piece::{PieceId, PieceType};

bitflags! {
    /// Actions a piece has taken this turn.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Action: u8 {
        /// Regular position change.
        const MOVE = 0x01;
        /// Trading places with another piece.
        const SWAP = 0x02;
        /// Melee attack.
        const ATTACK = 0x04;
        /// Ranged attack.
        const FIRE = 0x08;
        const SPAWN = 0x10;
        const MS = Self::MOVE.bits() | Self::SWAP.bits();
        const AF = Self::ATTACK.bits() | Self::FIRE.bits();
    }
}

/// Outcome tag carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RecordInfo {
    #[default]
    None = 0,
    Win = 1,
    Loss = 2,
    Tie = 3,
    BattleFail = 4,
}

impl RecordInfo {
    pub fn from_u8(v: u8) -> Option<RecordInfo> {
        match v {
            0 => Some(RecordInfo::None),
            1 => Some(RecordInfo::Win),
            2 => Some(RecordInfo::Loss),
            3 => Some(RecordInfo::Tie),
            4 => Some(RecordInfo::BattleFail),
            _ => None,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, RecordInfo::Win | RecordInfo::Loss | RecordInfo::Tie)
    }

    /// The same outcome from the opponent's point of view.
    pub fn inverted(self) -> RecordInfo {
        match self {
            RecordInfo::Win => RecordInfo::Loss,
            RecordInfo::Loss => RecordInfo::Win,
            other => other,
        }
    }
}

/// Rule-bending tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Favor {
    /// Move any piece a single step, ignoring the action budget.
    Hasten = 0,
    /// Move and swap an untouched piece outside the budget.
    Assault = 1,
    /// Protect a piece for the opponent's next turn.
    Conspire = 2,
    /// Swap two enemy pieces.
    Deceive = 3,
}

pub const FAVOR_MAX: usize = 4;

pub const ALL_FAVORS: [Favor; FAVOR_MAX] =
    [Favor::Hasten, Favor::Assault, Favor::Conspire, Favor::Deceive];

impl Favor {
    pub const fn name(self) -> &'static str {
        match self {
            Favor::Hasten => "hasten",
            Favor::Assault => "assault",
            Favor::Conspire => "conspire",
            Favor::Deceive => "deceive",
        }
    }

    pub fn from_name(s: &str) -> Option<Favor> {
        ALL_FAVORS
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
    }
}

/// Action ledger for one side's turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnRecord {
    /// Pieces acting within the regular budget.
    pub actors: BTreeMap<PieceId, Action>,
    /// Pieces acting under an assault favor.
    pub assault: BTreeMap<PieceId, Action>,
    /// Pieces that can't engage or be engaged; `true` also blocks thrones.
    pub protects: BTreeMap<PieceId, bool>,
    pub last_act: Option<(PieceId, Action)>,
    pub last_assault: Option<(PieceId, Action)>,
    pub info: RecordInfo,
}

impl TurnRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record as received from the opponent at the end of their turn.
    pub fn received(
        last_actor: Option<PieceId>,
        protects: BTreeMap<PieceId, bool>,
        info: RecordInfo,
    ) -> Self {
        Self {
            protects,
            last_act: last_actor.map(|p| (p, Action::empty())),
            info,
            ..Self::default()
        }
    }

    /// Records an action, merging it into the piece's earlier actions.
    pub fn update(&mut self, actor: PieceId, action: Action, regular: bool) {
        let (last, ledger) = if regular {
            (&mut self.last_act, &mut self.actors)
        } else {
            (&mut self.last_assault, &mut self.assault)
        };
        *last = Some((actor, action));
        *ledger.entry(actor).or_insert(Action::empty()) |= action;
    }

    /// Protects a piece. A strong protect is kept if already present.
    pub fn add_protect(&mut self, piece: PieceId, strong: bool) {
        let entry = self.protects.entry(piece).or_insert(strong);
        *entry |= strong;
    }

    pub fn is_protected(&self, piece: PieceId) -> bool {
        self.protects.contains_key(&piece)
    }

    pub fn last_actor(&self) -> Option<PieceId> {
        self.last_act.map(|(p, _)| p)
    }

    /// Returns the action class that used up the turn, or an empty set if the
    /// regular budget still has room.
    ///
    /// Two moves, or a move and a swap, exhaust the budget; a warhorse's swap
    /// is free. Any attack, fire or spawn ends the turn on its own.
    pub fn actions_exhausted(&self, kind_of: impl Fn(PieceId) -> PieceType) -> Action {
        let mut moves = 0u8;
        let mut swaps = 0u8;
        let mut terminal = Action::empty();
        for (&piece, &act) in &self.actors {
            if moves < 2 && act.contains(Action::MOVE) {
                moves += 1;
            }
            if swaps == 0 && act.contains(Action::SWAP) && kind_of(piece) != PieceType::Warhorse {
                swaps += 1;
            }
            if act.intersects(Action::AF) {
                terminal = Action::AF;
            } else if act.contains(Action::SPAWN) && terminal.is_empty() {
                terminal = Action::SPAWN;
            }
        }
        if moves + swaps >= 2 {
            Action::MS
        } else {
            terminal
        }
    }
}

/// Player-facing description of an action already taken.
pub fn action_record_msg(action: Action, own: bool) -> String {
    let pref = if own {
        "Piece has already "
    } else {
        "A piece has already "
    };
    let verb = if action.contains(Action::MOVE) {
        "moved"
    } else if action.contains(Action::SWAP) {
        "switched"
    } else if action.contains(Action::ATTACK) {
        "attacked"
    } else if action.contains(Action::FIRE) {
        "fired"
    } else if action.contains(Action::SPAWN) {
        "spawned"
    } else {
        "acted"
    };
    format!("{pref}{verb}")
}
