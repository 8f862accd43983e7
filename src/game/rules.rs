//! Local actions and the checks guarding them.
//!
//! Every public action runs all of its checks before touching the board, so
//! a rejected action leaves no trace locally or on the wire.

use rand::Rng;
use tracing::debug;

use super::{Conclusion, Game, Notifier};
use crate::board::{delta_single, PieceId, PieceType, TileId, TileType};
use crate::config::{ConfigOptions, RANDOM_LIMIT};
use crate::error::{first_upper, GameError};
use crate::movegen::{collect_engage_tiles, collect_move_tiles};
use crate::net::Link;
use crate::turn::{action_record_msg, Action, Favor, RecordInfo};

/// A roll in `0..RANDOM_LIMIT` wins the battle only when it stays below the
/// pass value.
pub(super) fn battle_won(roll: u8, battle_pass: u8) -> bool {
    roll < battle_pass
}

impl<L: Link, N: Notifier> Game<L, N> {
    /// Moves `piece` to `dst`, swapping with whatever piece stands there.
    pub fn move_piece(&mut self, piece: PieceId, dst: TileId) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        let pos = self.acting_tile(piece, dst)?;
        let favor = self.selected;
        self.check_actor(piece, favor)?;
        let occupant = self.board.piece_at(dst);
        let action = if occupant.is_some() {
            Action::SWAP
        } else {
            Action::MOVE
        };
        self.check_action_record(piece, occupant, action, favor)?;

        match occupant {
            None => {
                if !collect_move_tiles(&self.board, piece, &self.ene_rec, favor, false).contains(&dst) {
                    return Err(GameError::rule("Can't move there"));
                }
                self.place_piece(piece, dst)?;
            }
            Some(occupant) => {
                self.check_swap(piece, occupant, dst, favor)?;
                if !collect_move_tiles(&self.board, piece, &self.ene_rec, favor, true).contains(&dst) {
                    return Err(GameError::rule("Can't move there"));
                }
                self.place_piece(occupant, pos)?;
                self.place_piece(piece, dst)?;
            }
        }
        debug!(piece, dst, ?action, "piece moved");
        self.conclude_action(Some(piece), action, favor)
    }

    /// Melee attack on `dst`. The attacker takes the tile unless it breaks
    /// into a fortress.
    pub fn attack(&mut self, piece: PieceId, dst: TileId) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        let pos = self.acting_tile(piece, dst)?;
        let favor = self.selected;
        self.check_actor(piece, favor)?;
        let victim = self.board.piece_at(dst);
        self.check_action_record(piece, victim, Action::ATTACK, favor)?;
        self.check_killer(piece, victim, dst, true)?;

        let kind = self.board.piece(piece).kind;
        let (src, dtil) = (self.board.tile(pos).kind, self.board.tile(dst).kind);
        if kind != PieceType::Throne && self.config().has(ConfigOptions::TERRAIN_RULES) {
            let name = first_upper(kind.name());
            if src == TileType::Mountain && !matches!(kind, PieceType::Ranger | PieceType::Dragon) {
                return Err(GameError::rule(format!("{name} can't attack from a {}", src.name())));
            }
            if dtil == TileType::Forest
                && src != TileType::Forest
                && matches!(kind, PieceType::Lancer | PieceType::Warhorse | PieceType::Elephant)
            {
                return Err(GameError::rule(format!(
                    "{name} must be on a {} to attack onto one",
                    dtil.name()
                )));
            }
            if dtil == TileType::Forest && kind == PieceType::Dragon {
                return Err(GameError::rule(format!("{name} can't attack onto a {}", dtil.name())));
            }
            if dtil == TileType::Water && !matches!(kind, PieceType::Spearman | PieceType::Dragon) {
                return Err(GameError::rule(format!("{name} can't attack onto {}", dtil.name())));
            }
        }
        if !collect_engage_tiles(&self.board, piece).contains(&dst) {
            return Err(GameError::rule("Can't move there"));
        }

        if !self.do_engage(piece, pos, dst, victim, Action::ATTACK)? {
            return Ok(Conclusion::BattleLost);
        }
        debug!(piece, dst, "attack succeeded");
        self.conclude_action(Some(piece), Action::ATTACK, favor)
    }

    /// Ranged attack on `dst`. The shooter stays where it is.
    pub fn fire(&mut self, piece: PieceId, dst: TileId) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        let pos = self.acting_tile(piece, dst)?;
        let favor = self.selected;
        self.check_actor(piece, favor)?;
        let victim = self.board.piece_at(dst);
        self.check_action_record(piece, victim, Action::FIRE, favor)?;
        self.check_killer(piece, victim, dst, false)?;

        let kind = self.board.piece(piece).kind;
        let terrain = self.config().has(ConfigOptions::TERRAIN_RULES);
        let (src, dtil) = (self.board.tile(pos).kind, self.board.tile(dst).kind);
        if terrain {
            match src {
                TileType::Forest => return Err(GameError::rule("Can't fire from a forest")),
                TileType::Water => return Err(GameError::rule("Can't fire from water")),
                _ => {}
            }
            if dtil == TileType::Forest && kind != PieceType::Trebuchet {
                return Err(GameError::rule(format!(
                    "{} can't fire at a {}",
                    first_upper(kind.name()),
                    dtil.name()
                )));
            }
            if dtil == TileType::Mountain {
                return Err(GameError::rule("Can't fire at a mountain"));
            }
        }
        if !collect_engage_tiles(&self.board, piece).contains(&dst) {
            return Err(GameError::rule("Can't fire there"));
        }
        if terrain && self.line_crosses_mountain(pos, dst) {
            return Err(GameError::rule("Can't fire over mountains"));
        }

        if !self.do_engage(piece, pos, dst, victim, Action::FIRE)? {
            return Ok(Conclusion::BattleLost);
        }
        debug!(piece, dst, "fire succeeded");
        self.conclude_action(Some(piece), Action::FIRE, favor)
    }

    /// Strongly protects a piece for the opponent's next turn, using a
    /// conspire favor.
    pub fn conspire(&mut self, piece: PieceId) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        self.check_piece_on_board(piece)?;
        if self.ene_rec.info == RecordInfo::BattleFail {
            return Err(GameError::rule("Only moving is allowed"));
        }
        if self.favors.held(Favor::Conspire) == 0 {
            return Err(GameError::rule("No conspire favor available"));
        }
        if self.own_rec.protects.get(&piece) == Some(&true) {
            return Err(GameError::rule("Piece is already protected"));
        }
        self.select_favor(Some(Favor::Conspire))?;
        self.own_rec.add_protect(piece, true);
        debug!(piece, "piece protected");
        self.conclude_action(None, Action::empty(), Some(Favor::Conspire))
    }

    /// Places an unplaced dragon onto an own home fortress, capturing any
    /// enemy standing there.
    pub fn place_dragon(&mut self, tile: TileId) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        self.check_tile(tile)?;
        self.check_action_record(PieceId::MAX, None, Action::SPAWN, None)?;
        if self.unplaced_dragons == 0 {
            return Err(GameError::rule("No dragon left to place"));
        }
        if !self.board.is_own_home(tile) || self.board.tile(tile).kind != TileType::Fortress {
            return Err(GameError::rule("Dragon must be placed on a home fortress"));
        }
        let occupant = self.board.piece_at(tile);
        if occupant.is_some_and(|p| self.board.is_own_piece(p)) {
            return Err(GameError::rule("Tile is occupied"));
        }
        let Some(dragon) = self.board.spawnable_piece(PieceType::Dragon) else {
            return Err(GameError::rule("No dragon left to place"));
        };

        if let Some(p) = occupant {
            self.remove_piece(p)?;
        }
        self.place_piece(dragon, tile)?;
        self.unplaced_dragons -= 1;
        debug!(dragon, tile, "dragon placed");
        self.conclude_action(Some(dragon), Action::SPAWN, None)
    }

    /// Brings a captured piece back onto the board.
    pub fn spawn(&mut self, kind: PieceType, tile: TileId) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        self.check_tile(tile)?;
        self.ensure_homefront("Spawning")?;
        self.check_action_record(PieceId::MAX, None, Action::SPAWN, None)?;
        if !self.board.spawn_tiles(kind).contains(&tile) {
            return Err(GameError::rule(format!("Can't spawn a {} there", kind.name())));
        }
        let occupant = self.board.piece_at(tile);
        if occupant.is_some_and(|p| self.board.is_own_piece(p)) {
            return Err(GameError::rule("Tile is occupied"));
        }
        let Some(piece) = self.board.spawnable_piece(kind) else {
            return Err(GameError::rule(format!("No {} to spawn", kind.name())));
        };

        if let Some(p) = occupant {
            self.remove_piece(p)?;
        }
        self.place_piece(piece, tile)?;
        debug!(piece, tile, "piece spawned");
        self.conclude_action(Some(piece), Action::SPAWN, None)
    }

    /// Founds a farm, or a city once the farm exists, under a throne.
    pub fn establish(&mut self, throne: PieceId) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        self.check_piece_on_board(throne)?;
        self.ensure_homefront("Establishing")?;
        self.check_misc_action()?;
        let (tile, top) = self.board.establish_target(throne)?;
        let kind = self.board.tile(tile).kind;
        self.change_tile(tile, kind, Some(top))?;
        self.misc_action_taken = true;
        debug!(throne, tile, top = top.name(), "established");
        Ok(Conclusion::Continue)
    }

    /// Repairs the breached fortress or farm under a throne.
    pub fn rebuild(&mut self, throne: PieceId) -> Result<Conclusion, GameError> {
        self.ensure_turn()?;
        self.check_piece_on_board(throne)?;
        self.ensure_homefront("Rebuilding")?;
        self.check_misc_action()?;
        let tile = match self.board.piece_tile(throne) {
            Some(t) if self.board.is_own_piece(throne) && self.board.rebuildable(throne) => t,
            _ => return Err(GameError::rule("Nothing to rebuild")),
        };
        self.breach_tile(tile, false)?;
        self.misc_action_taken = true;
        debug!(throne, tile, "rebuilt");
        Ok(Conclusion::Continue)
    }

    /// Who may trade places with whom.
    fn check_swap(
        &self,
        piece: PieceId,
        occupant: PieceId,
        dst: TileId,
        favor: Option<Favor>,
    ) -> Result<(), GameError> {
        let kind = self.board.piece(piece).kind;
        let enemy = !self.board.is_own_piece(occupant);
        let warhorse = kind == PieceType::Warhorse;
        if enemy && !warhorse && favor != Some(Favor::Deceive) {
            return Err(GameError::rule("Piece can't switch with an enemy"));
        }
        let favored = matches!(favor, Some(Favor::Assault | Favor::Deceive));
        if !favored && warhorse && enemy && self.config().has(ConfigOptions::TERRAIN_RULES) {
            let name = first_upper(kind.name());
            let tile = self.board.tile(dst);
            if self.board.piece(occupant).kind == PieceType::Spearman {
                return Err(GameError::rule(format!(
                    "{name} can't switch with an enemy {}",
                    PieceType::Spearman.name()
                )));
            }
            if tile.kind == TileType::Water {
                return Err(GameError::rule(format!("{name} can't switch onto water")));
            }
            if tile.is_unbreached_fortress() {
                return Err(GameError::rule(format!(
                    "{name} can't switch onto a not breached fortress"
                )));
            }
        }
        Ok(())
    }

    fn ensure_homefront(&self, what: &str) -> Result<(), GameError> {
        if !self.config().has(ConfigOptions::HOMEFRONT) {
            return Err(GameError::rule(format!("{what} requires the homefront rule")));
        }
        Ok(())
    }

    fn check_misc_action(&self) -> Result<(), GameError> {
        if self.misc_action_taken {
            return Err(GameError::rule("Only one establish or rebuild per turn"));
        }
        if self.ene_rec.info == RecordInfo::BattleFail {
            return Err(GameError::rule("Only moving is allowed"));
        }
        Ok(())
    }

    fn check_tile(&self, tile: TileId) -> Result<(), GameError> {
        if tile >= self.board.tile_count() {
            return Err(GameError::rule("Tile is off the board"));
        }
        Ok(())
    }

    fn check_piece_on_board(&self, piece: PieceId) -> Result<TileId, GameError> {
        if piece >= self.board.arena_len() {
            return Err(GameError::rule("No such piece"));
        }
        self.board
            .piece_tile(piece)
            .ok_or_else(|| GameError::rule("Piece isn't on the board"))
    }

    /// The tile `piece` acts from, checked against the target `dst`.
    fn acting_tile(&self, piece: PieceId, dst: TileId) -> Result<TileId, GameError> {
        let pos = self.check_piece_on_board(piece)?;
        self.check_tile(dst)?;
        if pos == dst {
            return Err(GameError::rule("Piece is already there"));
        }
        Ok(pos)
    }

    /// Whose pieces may act under `favor`.
    fn check_actor(&self, piece: PieceId, favor: Option<Favor>) -> Result<(), GameError> {
        if self.ene_rec.info == RecordInfo::BattleFail {
            if self.ene_rec.last_actor() != Some(piece) {
                return Err(GameError::rule("Only the piece that lost the battle can move"));
            }
            return Ok(());
        }
        let own = self.board.is_own_piece(piece);
        match favor {
            Some(Favor::Deceive) if own => {
                return Err(GameError::rule("Deceive is limited to switching enemy pieces"));
            }
            Some(Favor::Deceive) => return Ok(()),
            _ if !own => return Err(GameError::rule("Can't move an enemy piece")),
            _ => {}
        }
        let rec = &self.own_rec;
        match favor {
            Some(Favor::Hasten) => {
                let restricted = rec.actors.len() >= 2 || rec.actors.values().any(|a| a.contains(Action::SWAP));
                if restricted && !rec.actors.contains_key(&piece) {
                    return Err(GameError::rule("Hasten can only move a piece that already acted"));
                }
                if !restricted && rec.assault.contains_key(&piece) {
                    return Err(GameError::rule("Can't hasten an assault piece"));
                }
            }
            Some(Favor::Assault) => match rec.last_assault {
                Some((last, _)) if last != piece => {
                    return Err(GameError::rule("Assault is limited to one piece"));
                }
                None if rec.actors.contains_key(&piece) => {
                    return Err(GameError::rule("Piece has already acted"));
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    /// True when `piece` is the only actor so far and it has only moved.
    fn only_moved(&self, piece: PieceId) -> bool {
        self.own_rec.actors.len() == 1 && self.own_rec.actors.get(&piece) == Some(&Action::MOVE)
    }

    /// Enforces the per-turn action budget and the favor restrictions.
    fn check_action_record(
        &self,
        piece: PieceId,
        occupant: Option<PieceId>,
        action: Action,
        favor: Option<Favor>,
    ) -> Result<(), GameError> {
        let rec = &self.own_rec;
        let xmov = self.ene_rec.info == RecordInfo::BattleFail;
        if xmov && action != Action::MOVE {
            return Err(GameError::rule("Only moving is allowed"));
        }

        match favor {
            Some(Favor::Hasten) => {
                if action != Action::MOVE {
                    return Err(GameError::rule("Hasten is limited to moving"));
                }
            }
            Some(Favor::Assault) => {
                if !Action::MS.contains(action) {
                    return Err(GameError::rule("Assault is limited to moving and switching"));
                }
                if occupant.is_some_and(|o| rec.actors.contains_key(&o)) {
                    return Err(GameError::rule("Can't switch with a non-assault piece"));
                }
                if let Some(&done) = rec.assault.get(&piece) {
                    let other = if action == Action::MOVE {
                        Action::SWAP
                    } else {
                        Action::MOVE
                    };
                    let taken = done - other;
                    if !taken.is_empty() {
                        return Err(GameError::rule(action_record_msg(taken, true)));
                    }
                }
            }
            Some(Favor::Deceive) => {
                if action != Action::SWAP || occupant.map_or(true, |o| self.board.is_own_piece(o)) {
                    return Err(GameError::rule("Deceive is limited to switching enemy pieces"));
                }
            }
            Some(Favor::Conspire) => {
                return Err(GameError::rule("Conspire is limited to protecting pieces"));
            }
            None if xmov => {}
            None if action == Action::MOVE || action == Action::SWAP => {
                let mine = rec.actors.get(&piece).copied();
                let limit = if mine.is_some() { 3 } else { 2 };
                if rec.actors.len() >= limit {
                    return Err(GameError::rule(format!(
                        "{} non-{} pieces have already acted",
                        rec.actors.len(),
                        Favor::Assault.name()
                    )));
                }
                let warhorse = self.board.piece(piece).kind == PieceType::Warhorse;
                let allowed = match (action == Action::MOVE, warhorse) {
                    (true, _) => Action::SWAP,
                    (false, true) => Action::MS,
                    (false, false) => Action::MOVE,
                };
                if let Some(m) = mine {
                    let taken = m - allowed;
                    if !taken.is_empty() {
                        return Err(GameError::rule(action_record_msg(taken, true)));
                    }
                }
                let other = rec.actors.iter().find(|(&p, _)| p != piece).map(|(_, &a)| a);
                if let Some(o) = other {
                    let budget = if action == Action::MOVE {
                        Action::MS
                    } else {
                        Action::MOVE
                    };
                    let taken = o - budget;
                    if !taken.is_empty() {
                        return Err(GameError::rule(action_record_msg(taken, false)));
                    }
                    if action == Action::MOVE {
                        if o.contains(Action::MS) {
                            return Err(GameError::rule("A piece has already moved and switched"));
                        }
                        if mine.is_some_and(|m| !m.is_empty()) {
                            return Err(GameError::rule("Piece can't move anymore"));
                        }
                    } else {
                        let spent = match mine {
                            Some(m) if warhorse => m - Action::SWAP,
                            Some(m) => m,
                            None => Action::empty(),
                        };
                        if !spent.is_empty() {
                            return Err(GameError::rule("Piece can't switch anymore"));
                        }
                    }
                }
            }
            None => {
                let move_then_engage = action.intersects(Action::AF) && self.only_moved(piece);
                if !rec.actors.is_empty() && !move_then_engage {
                    return Err(GameError::rule("A piece has already acted"));
                }
            }
        }

        if favor != Some(Favor::Assault)
            && action == Action::SWAP
            && occupant.is_some_and(|o| rec.assault.contains_key(&o))
        {
            return Err(GameError::rule("Can't switch with an assault piece"));
        }
        Ok(())
    }

    /// Conditions on the attacker and its target that hold for both melee
    /// and ranged engagements.
    fn check_killer(
        &self,
        killer: PieceId,
        victim: Option<PieceId>,
        dst: TileId,
        attack: bool,
    ) -> Result<(), GameError> {
        let verb = if attack { "attack" } else { "fire" };
        let config = self.config();
        if self.first_turn && !config.has(ConfigOptions::FIRST_TURN_ENGAGE) {
            return Err(GameError::rule(format!("Can't {verb} during the first turn")));
        }
        if self.any_favor_used {
            return Err(GameError::rule(format!("Can't {verb} after a fate's favor")));
        }
        if self.ene_rec.is_protected(killer) {
            return Err(GameError::rule(format!("Piece can't {verb} during this turn")));
        }
        if !self.own_rec.actors.is_empty() && !self.only_moved(killer) {
            return Err(GameError::rule(format!("Piece can't {verb}")));
        }

        let kind = self.board.piece(killer).kind;
        let tile = *self.board.tile(dst);
        match victim {
            Some(v) if self.board.is_own_piece(v) => {
                Err(GameError::rule(format!("Can't {verb} an own piece")))
            }
            Some(v) => {
                if let Some(&strong) = self.ene_rec.protects.get(&v) {
                    if strong || kind != PieceType::Throne {
                        return Err(GameError::rule("Piece is protected during this turn"));
                    }
                }
                let target = self.board.piece(v).kind;
                if target == PieceType::Elephant
                    && tile.kind == TileType::Plains
                    && !matches!(kind, PieceType::Dragon | PieceType::Throne)
                    && config.has(ConfigOptions::TERRAIN_RULES)
                {
                    return Err(GameError::rule(format!(
                        "{} can't attack an {} on {}",
                        first_upper(kind.name()),
                        target.name(),
                        tile.kind.name()
                    )));
                }
                Ok(())
            }
            None => {
                let farm = self.board.top_at(dst).is_some_and(|t| t.is_farm());
                let open = config.has(ConfigOptions::HOMEFRONT)
                    && (tile.kind == TileType::Fortress || farm)
                    && !tile.breached;
                if open {
                    Ok(())
                } else if attack {
                    Err(GameError::rule("Can't attack nothing"))
                } else {
                    Err(GameError::rule("Can't fire at nothing"))
                }
            }
        }
    }

    fn line_crosses_mountain(&self, pos: TileId, dst: TileId) -> bool {
        let grid = self.board.grid();
        let (a, b) = (grid.id_to_pos(pos), grid.id_to_pos(dst));
        let (dx, dy) = delta_single(
            i32::from(b.x) - i32::from(a.x),
            i32::from(b.y) - i32::from(a.y),
        );
        let mut at = a;
        while let Some(next) = grid.offset(at, dx, dy) {
            if next == b {
                break;
            }
            if self.board.tile(grid.pos_to_id(next)).kind == TileType::Mountain {
                return true;
            }
            at = next;
        }
        false
    }

    /// Resolves an attack or fire that passed every check. Returns false when
    /// the fortress battle roll failed.
    fn do_engage(
        &mut self,
        killer: PieceId,
        pos: TileId,
        dst: TileId,
        victim: Option<PieceId>,
        action: Action,
    ) -> Result<bool, GameError> {
        let kind = self.board.piece(killer).kind;
        let tile = *self.board.tile(dst);
        let battle = tile.is_unbreached_fortress() && kind != PieceType::Throne;

        let mut land = dst;
        if battle && kind == PieceType::Dragon {
            let grid = self.board.grid();
            let (a, b) = (grid.id_to_pos(pos), grid.id_to_pos(dst));
            let (dx, dy) = delta_single(
                i32::from(b.x) - i32::from(a.x),
                i32::from(b.y) - i32::from(a.y),
            );
            if let Some(p) = grid.offset(b, -dx, -dy) {
                land = grid.pos_to_id(p);
            }
            if land != pos && self.board.piece_at(land).is_some() {
                return Err(GameError::rule("No space beside fortress"));
            }
        }
        if kind == PieceType::Warhorse {
            self.own_rec.add_protect(killer, false);
        }

        if !battle {
            // a throne walks into a fortress without a roll but still breaks it
            let farm = self.board.top_at(dst).is_some_and(|t| t.is_farm());
            if !tile.breached && (farm || tile.kind == TileType::Fortress) {
                self.breach_tile(dst, true)?;
            }
            if let Some(v) = victim {
                self.remove_piece(v)?;
            }
            if action == Action::ATTACK {
                self.place_piece(killer, dst)?;
            }
            return Ok(true);
        }

        let hostile = victim.map_or(true, |v| !self.board.is_own_piece(v));
        let roll = self.rng.gen_range(0..RANDOM_LIMIT);
        if hostile && !battle_won(roll, self.config().battle_pass) {
            debug!(killer, dst, roll, "battle lost");
            self.ene_rec.add_protect(killer, false);
            self.own_rec.add_protect(killer, false);
            if action == Action::ATTACK {
                self.own_rec.info = RecordInfo::BattleFail;
                self.own_rec.last_act = Some((killer, Action::ATTACK));
                self.pass_turn()?;
            }
            return Ok(false);
        }

        self.breach_tile(dst, true)?;
        if kind == PieceType::Dragon && land != pos {
            self.place_piece(killer, land)?;
        }
        Ok(true)
    }

    /// Books an action and decides whether the turn goes on.
    fn conclude_action(
        &mut self,
        piece: Option<PieceId>,
        action: Action,
        favor: Option<Favor>,
    ) -> Result<Conclusion, GameError> {
        match (favor, piece) {
            (None, Some(p)) => self.own_rec.update(p, action, true),
            (None, None) => {}
            (Some(f), piece) => {
                self.last_favor_used = true;
                if f == Favor::Assault {
                    if let Some(p) = piece {
                        self.own_rec.update(p, action, false);
                        if self.own_rec.assault.get(&p).is_some_and(|a| a.contains(Action::MS)) {
                            self.finish_favor();
                        }
                    }
                } else {
                    self.finish_favor();
                    if let (Favor::Hasten, Some(p)) = (f, piece) {
                        self.own_rec.update(p, Action::empty(), true);
                    }
                }
            }
        }

        if let Some(outcome) = self.check_win() {
            self.do_win(outcome)?;
            return Ok(Conclusion::MatchOver(outcome));
        }

        let board = &self.board;
        let exhausted = self.own_rec.actions_exhausted(|p| board.piece(p).kind);
        let done = !exhausted.is_empty() && self.favors.none_held() && self.unplaced_dragons == 0;
        let homefront = self.config().has(ConfigOptions::HOMEFRONT);
        let ends = (done || exhausted.intersects(Action::AF | Action::SPAWN)) && !homefront;
        let conclusion = if ends || self.ene_rec.info == RecordInfo::BattleFail {
            if let Some(outcome) = self.check_points_win() {
                self.do_win(outcome)?;
                return Ok(Conclusion::MatchOver(outcome));
            }
            self.pass_turn()?;
            Conclusion::TurnEnded
        } else {
            Conclusion::Continue
        };
        if self.favors.available > 0 {
            self.notifier.favor_picks_available(self.favors.available);
        }
        Ok(conclusion)
    }
}
