//! Thrones -- a headless console driver for peer-to-peer matches.
//!
//! Hosts or joins a match over TCP, reads commands from stdin and prints the
//! game's notifications to stdout.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{ArgGroup, Parser};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use tracing::{info, warn};

use thrones::board::{PieceId, Pos, Setup, TileId};
use thrones::config::{Config, ConfigOptions};
use thrones::error::{GameError, NetError};
use thrones::game::{Conclusion, Game, MatchPhase, Notifier};
use thrones::net::{Link, TcpLink};
use thrones::protocol::parser::{parse_command, Command};
use thrones::turn::{RecordInfo, ALL_FAVORS};

/// How long the loop waits for console input before polling the peer again.
const TICK: Duration = Duration::from_millis(50);

const CONNECT_ATTEMPTS: u32 = 20;
const CONNECT_RETRY: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "thrones", about = "Play a Thrones match against a peer")]
#[command(group(ArgGroup::new("mode").required(true).args(["host", "connect"])))]
struct Args {
    /// Rule configuration (JSON). Only the host's configuration is used.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wait for the opponent on this port.
    #[arg(long)]
    host: Option<u16>,

    /// Connect to a hosting opponent, e.g. `127.0.0.1:7777`.
    #[arg(long)]
    connect: Option<String>,

    /// Home arrangement (JSON). A generated arrangement is used when omitted.
    #[arg(long)]
    setup: Option<PathBuf>,

    /// Seed for the battle rolls.
    #[arg(long)]
    seed: Option<u64>,

    /// Record the match to this file.
    #[arg(long)]
    record: Option<PathBuf>,
}

/// Prints game notifications for the console player.
struct Console;

impl Notifier for Console {
    fn turn_changed(&mut self, my_turn: bool) {
        if my_turn {
            println!("your turn");
        } else {
            println!("opponent's turn");
        }
    }

    fn favor_picks_available(&mut self, picks: u16) {
        println!("{picks} favor pick(s) available");
    }

    fn opponent_ready(&mut self) {
        println!("opponent is ready");
    }

    fn match_started(&mut self, my_turn: bool) {
        println!("match started, {}", if my_turn { "you begin" } else { "opponent begins" });
    }

    fn match_over(&mut self, outcome: RecordInfo) {
        let text = match outcome {
            RecordInfo::Win => "you won",
            RecordInfo::Loss => "you lost",
            _ => "tie",
        };
        println!("match over: {text}");
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), GameError> {
    let mut game = match (args.host, &args.connect) {
        (Some(port), _) => {
            let config = match &args.config {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            println!("waiting for an opponent on port {port}");
            Game::host(config, TcpLink::host(port)?, Console, args.seed)?
        }
        (None, Some(addr)) => Game::join(connect(addr)?, Console, args.seed),
        (None, None) => return Err(GameError::Phase("either --host or --connect is required")),
    };
    if let Some(path) = &args.record {
        game.record_to(path);
    }

    let lines = spawn_stdin_reader();
    let mut setup_sent = false;
    loop {
        game.tick()?;
        match game.phase() {
            MatchPhase::Setup if !setup_sent => {
                let setup = match &args.setup {
                    Some(path) => Setup::load(path)?,
                    None => Setup::generate(game.config()),
                };
                game.submit_setup(&setup)?;
                setup_sent = true;
                println!("home submitted, waiting for the opponent");
            }
            MatchPhase::Over(_) => return Ok(()),
            MatchPhase::Aborted => return Err(NetError::Disconnected.into()),
            _ => {}
        }

        let line = match lines.recv_timeout(TICK) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("console closed");
                return Ok(());
            }
        };
        let Some(cmd) = parse_command(&line) else {
            continue;
        };
        if cmd == Command::Quit {
            return Ok(());
        }
        match dispatch(&mut game, cmd) {
            Ok(Some(Conclusion::BattleLost)) => println!("battle lost"),
            Ok(_) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => println!("{err}"),
        }
    }
}

/// Connects to the host, retrying while it is not listening yet.
fn connect(addr: &str) -> Result<TcpLink, NetError> {
    let mut attempt = 1;
    loop {
        match TcpLink::connect(addr) {
            Ok(link) => return Ok(link),
            Err(err) if attempt < CONNECT_ATTEMPTS => {
                warn!(attempt, "connect failed: {err}");
                attempt += 1;
                thread::sleep(CONNECT_RETRY);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Forwards stdin lines over a channel; the channel closes at end of input.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn dispatch<L: Link, N: Notifier>(
    game: &mut Game<L, N>,
    cmd: Command,
) -> Result<Option<Conclusion>, GameError> {
    let conclusion = match cmd {
        Command::Move { from, to } => {
            let piece = piece_on(game, from)?;
            let dst = tile(game, to)?;
            game.move_piece(piece, dst)?
        }
        Command::Attack { from, to } => {
            let piece = piece_on(game, from)?;
            let dst = tile(game, to)?;
            game.attack(piece, dst)?
        }
        Command::Fire { from, to } => {
            let piece = piece_on(game, from)?;
            let dst = tile(game, to)?;
            game.fire(piece, dst)?
        }
        Command::Favor(favor) => {
            game.select_favor(favor)?;
            return Ok(None);
        }
        Command::Pick(favor) => {
            game.pick_favor(favor)?;
            return Ok(None);
        }
        Command::Conspire(at) => {
            let piece = piece_on(game, at)?;
            game.conspire(piece)?
        }
        Command::Establish(at) => {
            let piece = piece_on(game, at)?;
            game.establish(piece)?
        }
        Command::Rebuild(at) => {
            let piece = piece_on(game, at)?;
            game.rebuild(piece)?
        }
        Command::Spawn { kind, at } => {
            let dst = tile(game, at)?;
            game.spawn(kind, dst)?
        }
        Command::Dragon(at) => {
            let dst = tile(game, at)?;
            game.place_dragon(dst)?
        }
        Command::End => game.end_turn()?,
        Command::Surrender => game.surrender()?,
        Command::Board => {
            print_status(game);
            return Ok(None);
        }
        Command::Quit => return Ok(None),
    };
    Ok(Some(conclusion))
}

fn tile<L: Link, N: Notifier>(game: &Game<L, N>, pos: Pos) -> Result<TileId, GameError> {
    game.board()
        .tile_at(pos)
        .ok_or_else(|| GameError::rule(format!("No tile at {},{}", pos.x, pos.y)))
}

fn piece_on<L: Link, N: Notifier>(game: &Game<L, N>, pos: Pos) -> Result<PieceId, GameError> {
    let t = tile(game, pos)?;
    game.board()
        .piece_at(t)
        .ok_or_else(|| GameError::rule(format!("No piece at {},{}", pos.x, pos.y)))
}

fn print_status<L: Link, N: Notifier>(game: &Game<L, N>) {
    print!("{}", game.board());
    let favors = game.favors();
    let held: Vec<String> = ALL_FAVORS
        .iter()
        .map(|&f| format!("{} {}/{}", f.name(), favors.count[f as usize], favors.left[f as usize]))
        .collect();
    println!("favors: {} (picks {})", held.join(", "), favors.available);
    if let Some(f) = game.selected_favor() {
        println!("selected: {}", f.name());
    }
    if game.config().has(ConfigOptions::VICTORY_POINTS) {
        let (own, ene) = game.victory_points();
        println!("victory points: {own} - {ene}");
    }
    println!("{}", if game.is_my_turn() { "your turn" } else { "opponent's turn" });
}
