//! Console command parser.
//!
//! Parses lines typed into the headless driver into structured `Command`
//! variants that the main loop dispatches onto the game. Tiles are written as
//! `x,y` board coordinates in the local frame.

use crate::board::{PieceType, Pos};
use crate::turn::Favor;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Move the piece standing on `from` to `to`.
    Move { from: Pos, to: Pos },

    /// Melee attack from `from` onto `to`.
    Attack { from: Pos, to: Pos },

    /// Ranged attack from `from` onto `to`.
    Fire { from: Pos, to: Pos },

    /// Select a held favor for the next action, `None` to clear it.
    Favor(Option<Favor>),

    /// Take one of the granted favor picks.
    Pick(Favor),

    /// Protect the piece on a tile for the opponent's next turn.
    Conspire(Pos),

    /// Found a farm or city under the throne on a tile.
    Establish(Pos),

    /// Restore the tile under the throne on a tile.
    Rebuild(Pos),

    /// Bring a captured piece back onto a tile.
    Spawn { kind: PieceType, at: Pos },

    /// Place a late dragon onto a home fortress.
    Dragon(Pos),

    End,

    Surrender,

    /// Print the board.
    Board,

    Quit,
}

/// Parses a single line of input into a `Command`.
///
/// Returns `None` for empty lines or unrecognized commands. Malformed
/// arguments for known commands also return `None` after logging to stderr.
pub fn parse_command(line: &str) -> Option<Command> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (&name, args) = tokens.split_first()?;

    match name {
        "end" => Some(Command::End),
        "surrender" => Some(Command::Surrender),
        "board" => Some(Command::Board),
        "quit" => Some(Command::Quit),

        "move" => parse_pair(args, "move").map(|(from, to)| Command::Move { from, to }),
        "attack" => parse_pair(args, "attack").map(|(from, to)| Command::Attack { from, to }),
        "fire" => parse_pair(args, "fire").map(|(from, to)| Command::Fire { from, to }),
        "favor" => parse_favor(args),
        "pick" => parse_pick(args),
        "conspire" => parse_single(args, "conspire").map(Command::Conspire),
        "establish" => parse_single(args, "establish").map(Command::Establish),
        "rebuild" => parse_single(args, "rebuild").map(Command::Rebuild),
        "spawn" => parse_spawn(args),
        "dragon" => parse_single(args, "dragon").map(Command::Dragon),

        other => {
            eprintln!("unknown command: {}", other);
            None
        }
    }
}

/// Parses a tile written as `x,y`.
pub fn parse_pos(token: &str) -> Option<Pos> {
    let (x, y) = token.split_once(',')?;
    let x = x.trim().parse().ok()?;
    let y = y.trim().parse().ok()?;
    Some(Pos::new(x, y))
}

fn parse_single(args: &[&str], name: &str) -> Option<Pos> {
    match args {
        [tile] => {
            let pos = parse_pos(tile);
            if pos.is_none() {
                eprintln!("invalid tile: '{}'", tile);
            }
            pos
        }
        _ => {
            eprintln!("malformed {}: expected '{} <x,y>'", name, name);
            None
        }
    }
}

/// Parses `<x,y> <x,y>`.
fn parse_pair(args: &[&str], name: &str) -> Option<(Pos, Pos)> {
    let [from, to] = args else {
        eprintln!("malformed {}: expected '{} <x,y> <x,y>'", name, name);
        return None;
    };
    match (parse_pos(from), parse_pos(to)) {
        (Some(from), Some(to)) => Some((from, to)),
        _ => {
            eprintln!("invalid tiles: '{}' '{}'", from, to);
            None
        }
    }
}

/// Parses `favor <name>` or `favor none`.
fn parse_favor(args: &[&str]) -> Option<Command> {
    let [name] = args else {
        eprintln!("malformed favor: expected 'favor <name|none>'");
        return None;
    };
    if name.eq_ignore_ascii_case("none") {
        return Some(Command::Favor(None));
    }
    match Favor::from_name(name) {
        Some(favor) => Some(Command::Favor(Some(favor))),
        None => {
            eprintln!("unknown favor: '{}'", name);
            None
        }
    }
}

fn parse_pick(args: &[&str]) -> Option<Command> {
    let [name] = args else {
        eprintln!("malformed pick: expected 'pick <name>'");
        return None;
    };
    match Favor::from_name(name) {
        Some(favor) => Some(Command::Pick(favor)),
        None => {
            eprintln!("unknown favor: '{}'", name);
            None
        }
    }
}

/// Parses `spawn <piece> <x,y>`.
fn parse_spawn(args: &[&str]) -> Option<Command> {
    let [kind, tile] = args else {
        eprintln!("malformed spawn: expected 'spawn <piece> <x,y>'");
        return None;
    };
    let Some(kind) = PieceType::from_name(kind) else {
        eprintln!("unknown piece: '{}'", kind);
        return None;
    };
    let at = parse_single(&[*tile], "spawn")?;
    Some(Command::Spawn { kind, at })
}
