//! Module for counting and printing the number of variations from a given position
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use super::Board;
use super::movegen::legal_moves;

/// Print the number of variations of the given `depth` for each legal move from `board`
pub fn print(board: &Board, depth: usize) -> usize {
    if depth < 1 {
        return 1;
    }

    let mut total = 0;

    for m in legal_moves(board) {
        let board = board.apply(m).expect("INFALLIBLE");
        let count = count(&board, depth - 1);
        total += count;
        println!("\t{:7}\t{:12}\t{}", m.to_string(), count, board);
    }

    total
}

/// Count the number of variations of the given `depth` from `board`
pub fn count(board: &Board, depth: usize) -> usize {
    if depth < 1 {
        return 1;
    }

    let mut total = 0;

    for m in legal_moves(board) {
        let board = board.apply(m).expect("INFALLIBLE");
        total += count(&board, depth - 1);
    }

    total
}
