//! The engine: iterative deepening with root-level parallelism
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
//! The coordinator iterates depths. For each depth it orders the root moves with what the
//! previous iteration learned, then lets worker threads draw root moves from an atomic
//! counter and search each child single-threaded with a full window and a private
//! heuristics store. Results are reported under a mutex; after the depth the workers'
//! stores are merged into a shared aggregate, again under a mutex, so no shared-mutable
//! state ever enters the hot path. A depth interrupted by the deadline or the stop flag
//! is discarded whole, and the answer comes from the last fully completed depth.

use std::cmp::max;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, warn};
use crate::chess::{Board, Color, Move};
use crate::chess::movegen;

pub mod eval;
pub mod heuristics;
pub mod search;

use eval::EvalScratch;
use heuristics::{RootAggregate, ThreadContext, TtEntry};
use search::{Limits, INFINITY};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Thinking output: what the engine knows after a completed depth iteration.
#[derive(Debug, Clone)]
pub struct Thinking {
    score: i32,
    depth: u32,
    time: Duration,
    nodes: u64,
    pv: Vec<Move>,
}

impl Thinking {
    /// Returns the estimated score, in centipawns for the side to move at the root.
    pub fn score(&self) -> i32 {
        self.score
    }

    /// Returns the search depth that was reached.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns the amount of time used for the search.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Returns the number of nodes searched.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Returns the average number of nodes searched per second.
    pub fn nps(&self) -> u64 {
        let ms = self.time.as_millis() as u64;
        if ms > 0 { self.nodes * 1000 / ms } else { self.nodes * 1000 }
    }

    /// Returns the principal variation.
    pub fn pv(&self) -> &[Move] {
        &self.pv
    }

    /// Returns the best move found in the search.
    pub fn best_move(&self) -> Option<&Move> {
        self.pv.first()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Distributes root moves across worker threads and aggregates their results.
#[derive(Debug)]
pub struct Coordinator {
    threads: usize,
    tt_entries: usize,
}

impl Coordinator {
    /// Creates a coordinator with one worker per hardware thread and a per-worker
    /// transposition table sized from `hash_mb` megabytes.
    ///
    /// If the hardware thread count cannot be determined, the engine falls back to a
    /// single worker and half the requested hash.
    pub fn new(hash_mb: usize) -> Coordinator {
        match thread::available_parallelism() {
            Ok(n) => Coordinator::with_threads(n.get(), hash_mb),
            Err(err) => {
                warn!("cannot determine hardware threads ({}); \
                       falling back to one worker and half the hash", err);
                Coordinator::with_threads(1, max(1, hash_mb/2))
            },
        }
    }

    /// Creates a coordinator with an explicit worker count.
    pub fn with_threads(threads: usize, hash_mb: usize) -> Coordinator {
        let entry_size = std::mem::size_of::<Option<TtEntry>>();
        Coordinator {
            threads: threads.max(1),
            tt_entries: max(1, hash_mb * 1024 * 1024 / entry_size),
        }
    }

    /// Returns the number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Searches `board` by iterative deepening up to `max_depth`, within the optional
    /// time budget, calling `on_depth` after every completed depth. Returns the thinking
    /// of the last fully completed depth, or `None` if there are no legal moves.
    ///
    /// Setting `stop` cancels the search; the current depth iteration is discarded.
    pub fn run<F>(
        &self,
        board: &Board,
        max_depth: u32,
        budget: Option<Duration>,
        stop: &AtomicBool,
        mut on_depth: F,
    ) -> Option<Thinking>
    where
        F: FnMut(&Thinking),
    {
        let start = Instant::now();
        let start_nodes = search::nodes();
        let deadline = budget.map(|b| start + b);

        // root move list paired with the score of the previous iteration
        let mut roots: Vec<(Move, i32)> = movegen::legal_moves(board)
            .into_iter()
            .map(|m| (m, 0))
            .collect();
        if roots.is_empty() {
            return None;
        }
        debug!("searching {} with {} root moves", board, roots.len());

        let aggregate = Mutex::new(RootAggregate::new(self.tt_entries));
        let root_key = board.zobrist_key();
        let mut best: Option<Thinking> = None;

        for depth in 1..=max_depth {
            let limits = Limits { deadline, stop };
            if limits.stopped() {
                break;
            }

            // order root moves: previous scores first, then any aggregate-table move in
            // front of everything
            roots.sort_by(|a, b| b.1.cmp(&a.1));
            let tt_move = aggregate.lock().expect("INFALLIBLE")
                .tt.probe(root_key)
                .and_then(|e| e.best);
            if let Some(m) = tt_move {
                if let Some(i) = roots.iter().position(|&(rm, _)| rm == m) {
                    let front = roots.remove(i);
                    roots.insert(0, front);
                }
            }

            let next = AtomicUsize::new(0);
            let complete = AtomicBool::new(true);
            let results: Mutex<Vec<Option<(i32, Vec<Move>)>>> =
                Mutex::new(vec![None; roots.len()]);

            thread::scope(|s| {
                for _ in 0..self.threads {
                    s.spawn(|| {
                        self.worker(board, depth, &roots, &next, &results,
                                    &complete, &aggregate, &limits);
                    });
                }
            });

            if !complete.load(Ordering::Relaxed) {
                break;
            }

            // every root move was searched; fold the results in
            let results = results.into_inner().expect("INFALLIBLE");
            let mut best_idx = 0;
            let mut best_score = -INFINITY;
            let mut best_pv = Vec::new();
            for (i, result) in results.into_iter().enumerate() {
                let (score, pv) = result.expect("INFALLIBLE");
                roots[i].1 = score;
                if score > best_score {
                    best_score = score;
                    best_idx = i;
                    best_pv = pv;
                }
            }
            debug!("depth {} best {} score {}", depth, roots[best_idx].0, best_score);

            let thinking = Thinking {
                score: best_score,
                depth,
                time: start.elapsed(),
                nodes: search::nodes() - start_nodes,
                pv: best_pv,
            };
            on_depth(&thinking);
            best = Some(thinking);
        }

        // nothing completed in time: fall back to the static choice so a move is always
        // produced when one exists
        if best.is_none() {
            best = Some(self.static_choice(board, &roots, start, start_nodes));
        }

        best
    }

    /// One worker: draw root moves atomically, search each child with a full window and a
    /// private context, report results under the mutex, then merge the context into the
    /// aggregate under the mutex.
    #[allow(clippy::too_many_arguments)]
    fn worker(
        &self,
        board: &Board,
        depth: u32,
        roots: &[(Move, i32)],
        next: &AtomicUsize,
        results: &Mutex<Vec<Option<(i32, Vec<Move>)>>>,
        complete: &AtomicBool,
        aggregate: &Mutex<RootAggregate>,
        limits: &Limits,
    ) {
        let mut ctx = ThreadContext::new(self.tt_entries);
        ctx.age = depth as u16;

        loop {
            let i = next.fetch_add(1, Ordering::Relaxed);
            if i >= roots.len() {
                break;
            }
            if limits.stopped() {
                complete.store(false, Ordering::Relaxed);
                break;
            }

            let (m, _) = roots[i];
            let child = board.apply(m).expect("INFALLIBLE");
            // the child sits one ply from the root, which keeps mate scores and killer
            // slots aligned with a search from the root itself
            let (child_score, child_pv) =
                search::alpha_beta(&child, depth - 1, -INFINITY, INFINITY, 1,
                                   &mut ctx, limits);
            if limits.stopped() {
                // the unwound sentinel is not a score; drop the whole depth
                complete.store(false, Ordering::Relaxed);
                break;
            }

            let score = -child_score;
            let mut pv = Vec::with_capacity(child_pv.len() + 1);
            pv.push(m);
            pv.extend(child_pv);
            results.lock().expect("INFALLIBLE")[i] = Some((score, pv));
        }

        aggregate.lock().expect("INFALLIBLE").absorb(&ctx);
    }

    /// Depth-zero fallback: pick the root move whose child evaluates best for the side
    /// to move.
    fn static_choice(&self, board: &Board, roots: &[(Move, i32)], start: Instant,
                     start_nodes: u64) -> Thinking {
        let mut scratch = EvalScratch::new();
        let mut best_move = roots[0].0;
        let mut best_score = -INFINITY;
        for &(m, _) in roots {
            let child = board.apply(m).expect("INFALLIBLE");
            let white_pov = eval::evaluate(&child, &mut scratch);
            let score = match board.turn() {
                Color::White => white_pov,
                Color::Black => -white_pov,
            };
            if score > best_score {
                best_score = score;
                best_move = m;
            }
        }

        Thinking {
            score: best_score,
            depth: 1,
            time: start.elapsed(),
            nodes: search::nodes() - start_nodes,
            pv: vec![best_move],
        }
    }
}
