//! Scripted matches between two in-process peers.
//!
//! Both games validate every action themselves; these tests drive them
//! through the public API only and check that the mirrored boards never
//! drift apart.

use thrones::board::{Board, PieceId, PieceType, Pos, Setup, TileId};
use thrones::config::Config;
use thrones::game::{Conclusion, Game, MatchPhase, TurnState};
use thrones::movegen::collect_move_tiles;
use thrones::net::{loopback_pair, LoopLink};
use thrones::replay::ReplayReader;
use thrones::turn::{Favor, RecordInfo, TurnRecord};

type Peer = Game<LoopLink>;

/// Ticks both peers until neither has anything left to handle.
fn pump(a: &mut Peer, b: &mut Peer) {
    loop {
        let handled = a.tick().unwrap() + b.tick().unwrap();
        if handled == 0 {
            break;
        }
    }
}

fn start_with(config: Config, host_setup: impl Fn(&Config) -> Setup) -> (Peer, Peer) {
    let (a, b) = loopback_pair();
    let mut host = Game::host(config, a, (), Some(11)).unwrap();
    let mut guest = Game::join(b, (), Some(12));
    pump(&mut host, &mut guest);
    assert_eq!(guest.phase(), MatchPhase::Setup);

    host.submit_setup(&host_setup(host.config())).unwrap();
    guest.submit_setup(&Setup::generate(guest.config())).unwrap();
    pump(&mut host, &mut guest);
    assert_eq!(host.phase(), MatchPhase::Playing);
    assert_eq!(guest.phase(), MatchPhase::Playing);
    (host, guest)
}

fn start(config: Config) -> (Peer, Peer) {
    start_with(config, Setup::generate)
}

/// Returns the peers ordered as (to move, waiting).
fn by_turn<'a>(a: &'a mut Peer, b: &'a mut Peer) -> (&'a mut Peer, &'a mut Peer) {
    if a.is_my_turn() {
        (a, b)
    } else {
        (b, a)
    }
}

fn assert_mirrored(a: &Board, b: &Board) {
    for t in 0..a.tile_count() {
        assert_eq!(a.tile(t), b.tile(a.invert_tile(t)), "tile {t}");
    }
    for p in 0..a.arena_len() {
        assert_eq!(
            a.piece_tile(p).map(|t| a.invert_tile(t)),
            b.piece_tile(a.inverse_piece_id(p)),
            "piece {p}"
        );
    }
}

/// First free tile the piece may move to.
fn free_step(game: &Peer, piece: PieceId) -> Option<TileId> {
    let board = game.board();
    collect_move_tiles(board, piece, &TurnRecord::new(), None, false)
        .into_iter()
        .find(|&t| board.piece_at(t).is_none())
}

/// Moves the first two own pieces that have a free step and returns the
/// conclusion of the last move.
fn play_two_moves(game: &mut Peer) -> Conclusion {
    let mut moved = 0;
    let mut last = Conclusion::Continue;
    for piece in game.board().own_pieces() {
        if moved == 2 {
            break;
        }
        if game.board().piece(piece).kind == PieceType::Throne {
            continue;
        }
        let Some(dst) = free_step(game, piece) else { continue };
        last = game.move_piece(piece, dst).unwrap();
        moved += 1;
    }
    assert_eq!(moved, 2);
    last
}

#[test]
fn turns_alternate_and_boards_stay_mirrored() {
    let (mut host, mut guest) = start(Config::default());
    assert_mirrored(host.board(), guest.board());

    for _ in 0..4 {
        let (mover, waiter) = by_turn(&mut host, &mut guest);
        assert_eq!(waiter.turn_state(), Some(TurnState::OpponentTurn));
        assert_eq!(play_two_moves(mover), Conclusion::TurnEnded);
        pump(mover, waiter);
        assert!(waiter.is_my_turn());
        assert!(!mover.is_my_turn());
        assert_mirrored(mover.board(), waiter.board());
    }
    assert!(!host.is_first_turn());
    assert!(!guest.is_first_turn());
}

#[test]
fn throne_on_a_fortress_grants_a_hasten() {
    // swap the throne with the piece standing on the home fortress
    let throne_on_fortress = |cfg: &Config| {
        let mut setup = Setup::generate(cfg);
        let fortress = Pos::new(1, 0);
        let throne = setup
            .pieces
            .iter()
            .position(|&(_, kind)| kind == PieceType::Throne)
            .unwrap();
        let other = setup.pieces.iter().position(|&(pos, _)| pos == fortress).unwrap();
        let throne_pos = setup.pieces[throne].0;
        setup.pieces[throne].0 = fortress;
        setup.pieces[other].0 = throne_pos;
        setup
    };
    let (mut host, mut guest) = start_with(Config::default(), throne_on_fortress);
    assert_eq!(host.favors().available, 1);
    assert_eq!(guest.favors().available, 0);

    // play until the host is to move
    if !host.is_my_turn() {
        play_two_moves(&mut guest);
        pump(&mut host, &mut guest);
    }
    assert!(host.is_my_turn());

    host.pick_favor(Favor::Hasten).unwrap();
    assert_eq!(host.favors().available, 0);
    host.select_favor(Some(Favor::Hasten)).unwrap();
    let piece = host
        .board()
        .own_pieces()
        .find(|&p| host.board().piece(p).kind == PieceType::Ranger && free_step(&host, p).is_some())
        .unwrap();
    let dst = free_step(&host, piece).unwrap();
    assert_eq!(host.move_piece(piece, dst).unwrap(), Conclusion::Continue);
    assert_eq!(host.selected_favor(), None);
    assert_eq!(host.favors().held(Favor::Hasten), 0);

    // a hastened piece keeps its regular move
    let dst = free_step(&host, piece).unwrap();
    assert_eq!(host.move_piece(piece, dst).unwrap(), Conclusion::Continue);
    assert_eq!(host.end_turn().unwrap(), Conclusion::TurnEnded);
    pump(&mut host, &mut guest);
    assert!(guest.is_my_turn());
    assert_mirrored(host.board(), guest.board());
}

#[test]
fn surrender_ends_the_match_on_both_sides() {
    let (mut host, mut guest) = start(Config::default());
    let (mover, waiter) = by_turn(&mut host, &mut guest);
    play_two_moves(mover);
    pump(mover, waiter);

    assert_eq!(
        waiter.surrender().unwrap(),
        Conclusion::MatchOver(RecordInfo::Loss)
    );
    pump(mover, waiter);
    assert_eq!(waiter.phase(), MatchPhase::Over(RecordInfo::Loss));
    assert_eq!(mover.phase(), MatchPhase::Over(RecordInfo::Win));
    assert!(mover.end_turn().is_err());
}

#[test]
fn recording_replays_to_the_final_board() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("host.jsonl");

    let (a, b) = loopback_pair();
    let mut host = Game::host(Config::default(), a, (), Some(3)).unwrap();
    host.record_to(&path);
    let mut guest = Game::join(b, (), Some(4));
    pump(&mut host, &mut guest);
    host.submit_setup(&Setup::generate(host.config())).unwrap();
    guest.submit_setup(&Setup::generate(guest.config())).unwrap();
    pump(&mut host, &mut guest);

    for _ in 0..3 {
        let (mover, waiter) = by_turn(&mut host, &mut guest);
        play_two_moves(mover);
        pump(mover, waiter);
    }
    host.surrender().unwrap();
    pump(&mut host, &mut guest);

    let mut reader = ReplayReader::open(&path).unwrap();
    assert_eq!(reader.outcome(), Some(RecordInfo::Loss));
    // six moves and the result
    assert!(reader.len() >= 7);
    while reader.next_event().is_some() {}
    let replayed = reader.board();
    for t in 0..replayed.tile_count() {
        assert_eq!(replayed.tile(t), host.board().tile(t), "tile {t}");
        assert_eq!(replayed.piece_at(t), host.board().piece_at(t), "tile {t}");
    }
}

#[test]
fn dropped_peer_aborts_the_match() {
    let (mut host, guest) = start(Config::default());
    drop(guest);
    let err = host.tick().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(host.phase(), MatchPhase::Aborted);
}
