//! The line-oriented command protocol
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
//! Commands arrive one per line on standard input: `init`, `setoption`, `newgame`,
//! `set_position`, `go`, `stop` and `quit`. Searches run on a background thread so that
//! `stop` can interrupt them; the search thread emits `info` records after every
//! completed depth and a final `bestmove`. Malformed input and illegal moves produce a
//! single diagnostic line and leave the engine state untouched.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use log::{debug, error, info, warn};
use crate::book::Book;
use crate::chess::{Board, Color, Move};
use crate::chess::movegen;
use crate::engine::{Coordinator, Thinking};
use super::io::Client;

const DEFAULT_HASH_MB: usize = 16;
const MIN_HASH_MB: usize = 1;
const MAX_HASH_MB: usize = 512;
const DEFAULT_BOOK: &str = "book.bin";
const DEFAULT_DEPTH: u32 = 12;
/// The least time a clock-managed search is given.
const MIN_BUDGET_MS: u64 = 50;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The engine side of the text protocol.
#[derive(Debug)]
pub struct Uci {
    client: Client,
    board: Board,
    hash_mb: usize,
    book_path: PathBuf,
    use_book: bool,
    book: Option<Book>,
    stop: Arc<AtomicBool>,
    search: Option<JoinHandle<()>>,
}

impl Uci {
    /// Creates a protocol handler bound to stdin and stdout.
    pub fn new() -> Uci {
        Uci {
            client: Client::connect(),
            board: Board::initial(),
            hash_mb: DEFAULT_HASH_MB,
            book_path: PathBuf::from(DEFAULT_BOOK),
            use_book: true,
            book: None,
            stop: Arc::new(AtomicBool::new(false)),
            search: None,
        }
    }

    /// Runs the command loop until `quit` or end of input.
    pub fn run(&mut self) {
        while let Ok(line) = self.client.recv() {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("init") => self.init(),
                Some("setoption") => self.setoption(&line),
                Some("newgame") => {
                    self.abort_search();
                    self.board = Board::initial();
                },
                Some("set_position") => self.set_position(&line),
                Some("go") => self.go(&line),
                Some("stop") => self.abort_search(),
                Some("quit") => break,
                Some(other) => debug!("ignoring unknown command: {}", other),
                None => { },
            }
        }
        self.abort_search();
    }

    /// Answers `init`: identification, option declarations, and `ready`.
    fn init(&self) {
        Client::send(concat!("id name Outpost ", env!("CARGO_PKG_VERSION")));
        Client::send("id author the Outpost developers");
        Client::send(&format!(
            "option name Hash type spin default {} min {} max {}",
            DEFAULT_HASH_MB, MIN_HASH_MB, MAX_HASH_MB
        ));
        Client::send(&format!("option name Book type string default {}", DEFAULT_BOOK));
        Client::send("option name UseBook type check default true");
        Client::send("ready");
    }

    /// Handles `setoption name <Name> value <Value>`.
    fn setoption(&mut self, line: &str) {
        let mut tokens = line.split_whitespace();
        tokens.next();
        if tokens.next() != Some("name") {
            Client::send("error malformed setoption");
            return;
        }

        let mut name_parts = Vec::new();
        for tok in tokens.by_ref() {
            if tok == "value" {
                break;
            }
            name_parts.push(tok);
        }
        let name = name_parts.join(" ");
        let value = tokens.collect::<Vec<_>>().join(" ");

        match name.as_str() {
            "Hash" => match value.parse::<usize>() {
                Ok(mb) => {
                    self.hash_mb = mb.clamp(MIN_HASH_MB, MAX_HASH_MB);
                    info!("hash size set to {} MB per worker", self.hash_mb);
                },
                Err(_) => Client::send("error malformed Hash value"),
            },
            "Book" => {
                self.book_path = PathBuf::from(&value);
                self.book = None;  // reload on demand
                info!("book path set to {}", self.book_path.display());
            },
            "UseBook" => {
                self.use_book = matches!(value.to_lowercase().as_str(), "true" | "1" | "on");
                info!("book lookup {}", if self.use_book { "enabled" } else { "disabled" });
            },
            _ => debug!("ignoring unknown option: {}", name),
        }
    }

    /// Handles `set_position startpos|fen <FEN> [moves m1 m2 ...]`. The board changes
    /// only if every part of the command parses and every move is legal.
    fn set_position(&mut self, line: &str) {
        let mut tokens = line.split_whitespace();
        tokens.next();

        let mut board = match tokens.next() {
            Some("startpos") => Board::initial(),
            Some("fen") => {
                let fen = tokens.by_ref().take(6).collect::<Vec<_>>().join(" ");
                match fen.parse() {
                    Ok(board) => board,
                    Err(err) => {
                        Client::send(&format!("error malformed position: {}", err));
                        return;
                    },
                }
            },
            _ => {
                Client::send("error malformed position: expected startpos or fen");
                return;
            },
        };

        match tokens.next() {
            Some("moves") => {
                for tok in tokens {
                    let wanted: Move = match tok.parse() {
                        Ok(m) => m,
                        Err(err) => {
                            Client::send(&format!("error malformed move {}: {}", tok, err));
                            return;
                        },
                    };
                    match movegen::legal_moves(&board).into_iter().find(|&m| m == wanted) {
                        Some(m) => board = board.apply(m).expect("INFALLIBLE"),
                        None => {
                            Client::send(&format!("error illegal move: {}", tok));
                            return;
                        },
                    }
                }
            },
            Some(other) => {
                Client::send(&format!("error malformed position: unexpected {}", other));
                return;
            },
            None => { },
        }

        self.board = board;
    }

    /// Handles `go`, starting a search on a background thread.
    fn go(&mut self, line: &str) {
        let params = GoParams::parse(line);
        let budget = params.budget(self.board.turn());
        let depth = params.depth.unwrap_or(DEFAULT_DEPTH).max(1);

        self.abort_search();

        if self.use_book {
            if self.book.is_none() {
                match Book::open(&self.book_path) {
                    Ok(book) => self.book = Some(book),
                    Err(err) => {
                        warn!("cannot load book {}: {}", self.book_path.display(), err);
                        self.use_book = false;
                    },
                }
            }
            if let Some(m) = self.book.as_ref().and_then(|b| b.probe(&self.board)) {
                info!("book move {}", m);
                Client::send(&format!("bestmove {}", m));
                return;
            }
        }

        self.stop = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&self.stop);
        let board = self.board;
        let hash_mb = self.hash_mb;

        self.search = Some(thread::spawn(move || {
            let coordinator = Coordinator::new(hash_mb);
            let thinking = coordinator.run(&board, depth, budget, &stop, |t| {
                Client::send(&info_line(t));
            });
            match thinking.as_ref().and_then(|t| t.best_move()) {
                Some(m) => Client::send(&format!("bestmove {}", m)),
                None => Client::send("bestmove 0000"),
            }
        }));
    }

    /// Stops any running search and waits for its final output.
    fn abort_search(&mut self) {
        if let Some(handle) = self.search.take() {
            self.stop.store(true, Ordering::Relaxed);
            if handle.join().is_err() {
                error!("search thread panicked");
            }
        }
    }
}

impl Default for Uci {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Uci {
    fn drop(&mut self) {
        self.abort_search();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The time and depth arguments of a `go` command.
#[derive(Debug, Default)]
struct GoParams {
    movetime: Option<u64>,
    depth: Option<u32>,
    wtime: Option<i64>,
    btime: Option<i64>,
    winc: i64,
    binc: i64,
    movestogo: Option<u32>,
}

impl GoParams {
    fn parse(line: &str) -> GoParams {
        fn num<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
            value.and_then(|v| v.parse().ok())
        }

        let mut params = GoParams::default();
        let mut tokens = line.split_whitespace();
        tokens.next();

        while let Some(tok) = tokens.next() {
            let value = tokens.next();
            match tok {
                "movetime" => params.movetime = num(value),
                "depth" => params.depth = num(value),
                "wtime" => params.wtime = num(value),
                "btime" => params.btime = num(value),
                "winc" => params.winc = num(value).unwrap_or(0),
                "binc" => params.binc = num(value).unwrap_or(0),
                "movestogo" => params.movestogo = num(value),
                _ => { },
            }
        }
        params
    }

    /// The time budget for this search: an explicit `movetime` wins; otherwise the
    /// remaining clock is split across the moves to go (or 30) plus half the increment,
    /// floored at 50 ms. A bare `depth` search has no budget at all.
    fn budget(&self, side: Color) -> Option<Duration> {
        if let Some(ms) = self.movetime {
            return Some(Duration::from_millis(ms));
        }

        let (time, inc) = match side {
            Color::White => (self.wtime, self.winc),
            Color::Black => (self.btime, self.binc),
        };
        if let Some(remaining) = time.filter(|&t| t > 0) {
            let slices = self.movestogo.unwrap_or(30).max(1) as i64;
            let ms = (remaining/slices + inc/2).max(MIN_BUDGET_MS as i64) as u64;
            return Some(Duration::from_millis(ms));
        }

        if self.depth.is_some() {
            None
        } else {
            Some(Duration::from_millis(1000))
        }
    }
}

/// Formats one per-depth status record.
fn info_line(t: &Thinking) -> String {
    let pv = t.pv()
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "info depth {} score cp {} time {} nodes {} nps {} pv {}",
        t.depth(), t.score(), t.time().as_millis(), t.nodes(), t.nps(), pv
    )
}
