//! Tests the search: mating lines, minimax equivalence, and parallel determinism
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////

use std::sync::atomic::AtomicBool;
use outpost::chess::Board;
use outpost::chess::movegen;
use outpost::engine::Coordinator;
use outpost::engine::heuristics::ThreadContext;
use outpost::engine::search::{self, alpha_beta, Limits, INFINITY, MATE};

fn board(fen: &str) -> Board {
    fen.parse().unwrap()
}

/// Plain negamax with the same quiescence leaves as the real search, as a reference.
fn minimax(b: &Board, depth: u32, ply: u32, ctx: &mut ThreadContext, limits: &Limits) -> i32 {
    if b.halfmove_clock() >= 100 {
        return 0;
    }
    if depth == 0 {
        return alpha_beta(b, 0, -INFINITY, INFINITY, ply, ctx, limits).0;
    }

    let moves = movegen::legal_moves(b);
    if moves.is_empty() {
        return if b.in_check(b.turn()) { -(MATE - ply as i32) } else { 0 };
    }

    moves.into_iter()
        .map(|m| -minimax(&b.apply(m).unwrap(), depth - 1, ply + 1, ctx, limits))
        .max()
        .unwrap()
}

#[test]
fn alpha_beta_equals_minimax_at_fixed_depth() {
    let stop = AtomicBool::new(false);
    let limits = Limits { deadline: None, stop: &stop };

    for fen in [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 4 4",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    ] {
        for depth in 1..=2 {
            let b = board(fen);
            let mut ctx = ThreadContext::new(4096);
            let reference = minimax(&b, depth, 0, &mut ctx, &limits);

            let mut ctx = ThreadContext::new(4096);
            let (score, _) = alpha_beta(&b, depth, -INFINITY, INFINITY, 0, &mut ctx, &limits);
            assert_eq!(score, reference, "{} at depth {}", fen, depth);
        }
    }
}

#[test]
fn back_rank_mate_in_one() {
    let b = board("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
    let stop = AtomicBool::new(false);

    for threads in [1, 4] {
        let thinking = Coordinator::with_threads(threads, 1)
            .run(&b, 2, None, &stop, |_| { })
            .unwrap();
        assert_eq!(thinking.best_move().unwrap().to_string(), "a1a8");
        assert_eq!(thinking.score(), MATE - 1);
    }
}

#[test]
fn scores_are_identical_for_one_and_many_workers() {
    let stop = AtomicBool::new(false);
    for fen in [
        "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 b - - 0 1",
    ] {
        let b = board(fen);
        let mut scores = Vec::new();
        for threads in [1, 2, 8] {
            let thinking = Coordinator::with_threads(threads, 1)
                .run(&b, 3, None, &stop, |_| { })
                .unwrap();
            scores.push(thinking.score());
        }
        assert_eq!(scores[0], scores[1], "{}", fen);
        assert_eq!(scores[0], scores[2], "{}", fen);
    }
}

#[test]
fn fifty_move_positions_search_to_zero() {
    let b = board("kq6/8/8/8/8/8/8/K7 w - - 100 1");
    let stop = AtomicBool::new(false);
    let mut ctx = ThreadContext::new(64);
    let limits = Limits { deadline: None, stop: &stop };
    let (score, _) = alpha_beta(&b, 4, -INFINITY, INFINITY, 0, &mut ctx, &limits);
    assert_eq!(score, 0);
}

#[test]
fn node_counter_grows_while_searching() {
    let b = Board::initial();
    let stop = AtomicBool::new(false);
    let thinking = Coordinator::with_threads(2, 1)
        .run(&b, 3, None, &stop, |_| { })
        .unwrap();
    assert!(thinking.nodes() > 0);
    assert!(search::nodes() >= thinking.nodes());
}

#[test]
fn an_expired_deadline_still_produces_a_move() {
    let b = Board::initial();
    let stop = AtomicBool::new(false);
    let thinking = Coordinator::with_threads(2, 1)
        .run(&b, 6, Some(std::time::Duration::from_millis(0)), &stop, |_| { })
        .unwrap();
    assert!(thinking.best_move().is_some());
}
