//! Alpha-beta search with quiescence extension
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
//! Negamax alpha-beta over value-typed boards. The stop flag and deadline are observed at
//! every node entry; on expiry the search unwinds returning a sentinel 0, and the
//! coordinator discards the whole depth iteration, so the sentinel never reaches a
//! decision. The transposition table seeds move ordering with the stored best move;
//! scores are never short-circuited from it, which keeps the value of every full-window
//! search equal to the plain minimax value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use crate::chess::{Board, Color, Move};
use crate::chess::movegen;
use super::eval::{evaluate, EvalScratch};
use super::heuristics::{Bound, ThreadContext};

/// Larger than any reachable evaluation.
pub const INFINITY: i32 = 100_000;

/// Base value of a checkmate score; the search returns `MATE - ply` when it finds a mate,
/// so shallower mates score higher.
pub const MATE: i32 = 99_000;

/// Ordering score that puts the transposition-table move in front of everything.
const TT_MOVE_SCORE: i32 = 2_000_000;
/// Ordering scores that put killers behind the table move but ahead of captures.
const KILLER1_SCORE: i32 = 1_500_000;
const KILLER2_SCORE: i32 = 1_490_000;

/// Global monotonically increasing count of nodes visited, shared by every worker.
/// Reads are informational only; callers interested in one search take a baseline first.
static NODES: AtomicU64 = AtomicU64::new(0);

/// Returns the number of nodes searched since the process started.
pub fn nodes() -> u64 {
    NODES.load(Ordering::Relaxed)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// When a search must give up: a hard deadline, a cooperative stop flag, or both.
#[derive(Debug, Copy, Clone)]
pub struct Limits<'a> {
    /// Wall-clock point past which the search unwinds
    pub deadline: Option<Instant>,
    /// Set by the coordinator to cancel the search
    pub stop: &'a AtomicBool,
}

impl Limits<'_> {
    /// Returns true if the search should unwind now.
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Searches `board` to `depth` plies plus quiescence, returning the score from the side
/// to move's point of view and the principal variation.
///
/// `ply` is the distance from the search root, used for mate scores and killer slots.
pub fn alpha_beta(
    board: &Board,
    depth: u32,
    mut alpha: i32,
    beta: i32,
    ply: u32,
    ctx: &mut ThreadContext,
    limits: &Limits,
) -> (i32, Vec<Move>) {
    NODES.fetch_add(1, Ordering::Relaxed);
    if limits.stopped() {
        return (0, Vec::new());
    }
    if board.halfmove_clock() >= 100 {
        return (0, Vec::new());
    }
    if depth == 0 {
        return (quiescence(board, alpha, beta, ctx, limits), Vec::new());
    }

    let mut moves = movegen::legal_moves(board);
    if moves.is_empty() {
        let score = if board.in_check(board.turn()) { -(MATE - ply as i32) } else { 0 };
        return (score, Vec::new());
    }

    let key = board.zobrist_key();
    let tt_move = ctx.tt.probe(key).and_then(|e| e.best);
    order_moves(board, &mut moves, ply, tt_move, ctx);

    let original_alpha = alpha;
    let mut best_score = -INFINITY;
    let mut best_move = moves[0];
    let mut pv = Vec::new();

    for m in moves {
        let child = board.apply(m).expect("INFALLIBLE");
        let (child_score, child_pv) =
            alpha_beta(&child, depth - 1, -beta, -alpha, ply + 1, ctx, limits);
        let score = -child_score;

        if score > best_score {
            best_score = score;
            best_move = m;
            pv = Vec::with_capacity(child_pv.len() + 1);
            pv.push(m);
            pv.extend(child_pv);
        }
        if best_score > alpha {
            alpha = best_score;
        }
        if alpha >= beta {
            if is_quiet(board, m) {
                ctx.killers.add(ply as usize, m);
                ctx.history.add(board.turn(), m.from, m.to, (depth * depth) as i32);
            }
            ctx.tt.store(key, best_score, depth, Bound::Lower, Some(best_move), ctx.age);
            return (best_score, pv);
        }
    }

    let bound = if best_score <= original_alpha { Bound::Upper } else { Bound::Exact };
    ctx.tt.store(key, best_score, depth, bound, Some(best_move), ctx.age);
    (best_score, pv)
}

/// Captures-and-promotions extension of the leaf evaluation. Terminates without a depth
/// counter: every recursion either consumes a capturable piece or converts a pawn.
fn quiescence(board: &Board, mut alpha: i32, beta: i32, ctx: &mut ThreadContext,
              limits: &Limits) -> i32 {
    NODES.fetch_add(1, Ordering::Relaxed);
    if limits.stopped() {
        return 0;
    }

    // evaluate() yields 0 for fifty-move draws before anything else
    let stand_pat = side_to_move_eval(board, &mut ctx.eval);
    if stand_pat >= beta {
        return stand_pat;
    }
    let mut best = stand_pat;
    if stand_pat > alpha {
        alpha = stand_pat;
    }

    let mut moves = movegen::legal_captures(board);
    moves.sort_by(|a, b| b.score.cmp(&a.score));

    for m in moves {
        let child = board.apply(m).expect("INFALLIBLE");
        let score = -quiescence(&child, -beta, -alpha, ctx, limits);
        if score >= beta {
            return score;
        }
        if score > best {
            best = score;
        }
        if score > alpha {
            alpha = score;
        }
    }

    best
}

/// The static evaluation from the side to move's point of view.
pub fn side_to_move_eval(board: &Board, scratch: &mut EvalScratch) -> i32 {
    let white_pov = evaluate(board, scratch);
    match board.turn() {
        Color::White => white_pov,
        Color::Black => -white_pov,
    }
}

/// True if `m` neither captures nor promotes on `board`. Only quiet moves feed the
/// killer and history tables.
fn is_quiet(board: &Board, m: Move) -> bool {
    board.piece_at(m.to).is_none() && !m.en_passant && m.promotion.is_none()
}

/// Sorts moves best-first: the transposition-table move, then this ply's killers, then
/// captures and promotions by the generator's MVV/LVA scores, then quiet moves by
/// history. The scores written by the generator are overwritten in place.
fn order_moves(board: &Board, moves: &mut [Move], ply: u32, tt_move: Option<Move>,
               ctx: &mut ThreadContext) {
    let (k1, k2) = ctx.killers.get(ply as usize);
    for m in moves.iter_mut() {
        if tt_move == Some(*m) {
            m.score = TT_MOVE_SCORE;
        } else if is_quiet(board, *m) {
            if k1 == Some(*m) {
                m.score = KILLER1_SCORE;
            } else if k2 == Some(*m) {
                m.score = KILLER2_SCORE;
            } else {
                m.score = ctx.history.get(board.turn(), m.from, m.to) as i32;
            }
        }
        // captures and promotions keep their generator scores
    }
    moves.sort_by(|a, b| b.score.cmp(&a.score));
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn search(fen: &str, depth: u32) -> (i32, Vec<Move>) {
        let board: Board = fen.parse().unwrap();
        let stop = AtomicBool::new(false);
        let limits = Limits { deadline: None, stop: &stop };
        let mut ctx = ThreadContext::new(1024);
        alpha_beta(&board, depth, -INFINITY, INFINITY, 0, &mut ctx, &limits)
    }

    #[test]
    fn finds_the_back_rank_mate() {
        let (score, pv) = search("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", 2);
        assert_eq!(pv[0].to_string(), "a1a8");
        assert_eq!(score, MATE - 1);
    }

    #[test]
    fn reports_being_mated() {
        // black is checkmated before moving
        let (score, pv) = search("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1", 3);
        assert_eq!(score, -MATE);
        assert!(pv.is_empty());
    }

    #[test]
    fn stalemate_is_a_draw() {
        let (score, pv) = search("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 3);
        assert_eq!(score, 0);
        assert!(pv.is_empty());
    }

    #[test]
    fn fifty_move_draws_score_zero_regardless_of_material() {
        let (score, _) = search("kq6/8/8/8/8/8/8/K7 w - - 100 1", 4);
        assert_eq!(score, 0);
    }

    #[test]
    fn prefers_the_shallower_mate() {
        // white mates in one with a1a8; any slower mate scores lower
        let (score, _) = search("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", 4);
        assert_eq!(score, MATE - 1);
    }

    #[test]
    fn quiescence_sees_past_the_horizon() {
        // a depth-1 search would grab the defended d5 pawn if the leaf were evaluated
        // statically; quiescence sees the e6 recapture and keeps the queen home
        let (score, pv) = search("4k3/8/4p3/3p4/8/8/8/3QK3 w - - 0 1", 1);
        assert_ne!(pv[0].to_string(), "d1d5");
        assert!(score > 600);
    }

    #[test]
    fn stop_flag_unwinds_immediately() {
        let board = Board::initial();
        let stop = AtomicBool::new(true);
        let limits = Limits { deadline: None, stop: &stop };
        let mut ctx = ThreadContext::new(64);
        let (score, pv) = alpha_beta(&board, 6, -INFINITY, INFINITY, 0, &mut ctx, &limits);
        assert_eq!(score, 0);
        assert!(pv.is_empty());
    }
}
