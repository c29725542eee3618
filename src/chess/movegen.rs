//! Move generation and attack queries on an offset board with sentinels
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
//! Each of the 64 squares maps into a 120-cell extended board surrounded by sentinel
//! cells. A piece's moves are generated by repeatedly adding a direction offset to the
//! extended index and halting on a sentinel, an own piece, or an enemy piece (the last
//! after emitting the capture). Piece movement is a table of direction offsets plus a
//! flag saying whether the piece slides; only pawns need their own code path.

use std::convert::TryFrom;
use super::{Board, Color, Move, Piece, Square};

/// The extended board: maps a 120-cell index back to a square index, or -1 for the
/// sentinel border.
const MAILBOX: [i32; 120] = [
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
    -1,  0,  1,  2,  3,  4,  5,  6,  7, -1,
    -1,  8,  9, 10, 11, 12, 13, 14, 15, -1,
    -1, 16, 17, 18, 19, 20, 21, 22, 23, -1,
    -1, 24, 25, 26, 27, 28, 29, 30, 31, -1,
    -1, 32, 33, 34, 35, 36, 37, 38, 39, -1,
    -1, 40, 41, 42, 43, 44, 45, 46, 47, -1,
    -1, 48, 49, 50, 51, 52, 53, 54, 55, -1,
    -1, 56, 57, 58, 59, 60, 61, 62, 63, -1,
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
];

/// Maps a square index to its position on the extended board.
const MAILBOX64: [usize; 64] = [
    21, 22, 23, 24, 25, 26, 27, 28,
    31, 32, 33, 34, 35, 36, 37, 38,
    41, 42, 43, 44, 45, 46, 47, 48,
    51, 52, 53, 54, 55, 56, 57, 58,
    61, 62, 63, 64, 65, 66, 67, 68,
    71, 72, 73, 74, 75, 76, 77, 78,
    81, 82, 83, 84, 85, 86, 87, 88,
    91, 92, 93, 94, 95, 96, 97, 98,
];

/// Direction offsets per piece type on the extended board. Pawns are handled separately
/// because their moves depend on color and occupancy.
const OFFSETS: [&[i32]; Piece::COUNT] = [
    &[],
    &[-21, -19, -12, -8, 8, 12, 19, 21],
    &[-11, -9, 9, 11],
    &[-10, -1, 1, 10],
    &[-11, -10, -9, -1, 1, 9, 10, 11],
    &[-11, -10, -9, -1, 1, 9, 10, 11],
];

/// Whether each piece type slides (repeats its offset) or is a leaper.
const SLIDES: [bool; Piece::COUNT] = [false, false, true, true, true, false];

/// Ordering-score base for captures and promotions.
const TACTICAL_BASE: i32 = 1_000_000;

/// One step from `sq` in direction `offset`, or `None` when it falls off the board.
fn step(sq: usize, offset: i32) -> Option<usize> {
    match MAILBOX[(MAILBOX64[sq] as i32 + offset) as usize] {
        -1 => None,
        n => Some(n as usize),
    }
}

/// Most Valuable Victim / Least Valuable Attacker capture score.
fn mvv_lva(victim: Piece, attacker: Piece) -> i32 {
    TACTICAL_BASE + 10*(victim as i32) - attacker as i32
}

fn square(i: usize) -> Square {
    Square::try_from(i).expect("INFALLIBLE")
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Returns true if `sq` is attacked by at least one piece of `side`.
///
/// Pawn attack geometry is encoded separately and covers the two capture diagonals only;
/// kings attack their eight adjacent squares without ray sliding.
pub fn attacked(board: &Board, sq: Square, side: Color) -> bool {
    let target = sq as usize;

    for i in 0..Square::COUNT {
        let piece = match board.piece_at(square(i)) {
            Some((color, piece)) if color == side => piece,
            _ => continue,
        };

        if piece == Piece::Pawn {
            let col = i & 7;
            match side {
                Color::White => {
                    if col != 0 && i - 9 == target { return true; }
                    if col != 7 && i - 7 == target { return true; }
                },
                Color::Black => {
                    if col != 0 && i + 7 == target { return true; }
                    if col != 7 && i + 9 == target { return true; }
                },
            }
            continue;
        }

        for &offset in OFFSETS[piece as usize] {
            let mut n = i;
            loop {
                n = match step(n, offset) {
                    Some(n) => n,
                    None => break,
                };
                if n == target {
                    return true;
                }
                if board.piece_at(square(n)).is_some() || !SLIDES[piece as usize] {
                    break;
                }
            }
        }
    }

    false
}

/// Returns true if the side to move has a pawn that could capture onto the current
/// en-passant target. The Zobrist key and the opening-book key only account for the
/// en-passant file when this holds.
pub fn en_passant_threatened(board: &Board) -> bool {
    let target = match board.ep_target() {
        Some(sq) => sq as usize,
        None => return false,
    };
    let col = target & 7;
    let own_pawn = Some((board.turn(), Piece::Pawn));

    match board.turn() {
        Color::White if target >> 3 == 2 => {
            (col != 0 && board.piece_at(square(target + 7)) == own_pawn)
                || (col != 7 && board.piece_at(square(target + 9)) == own_pawn)
        },
        Color::Black if target >> 3 == 5 => {
            (col != 0 && board.piece_at(square(target - 9)) == own_pawn)
                || (col != 7 && board.piece_at(square(target - 7)) == own_pawn)
        },
        _ => false,
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Generates pseudo-legal moves: every move a piece of the side to move can make by its
/// movement rules, ignoring whether the mover's king is left attacked. With
/// `captures_only`, only captures and promotions are produced (the quiescence set).
fn generate(board: &Board, captures_only: bool) -> Vec<Move> {
    let side = board.turn();
    let xside = !side;
    let mut moves = Vec::with_capacity(if captures_only { 8 } else { 48 });

    for i in 0..Square::COUNT {
        let piece = match board.piece_at(square(i)) {
            Some((color, piece)) if color == side => piece,
            _ => continue,
        };

        if piece == Piece::Pawn {
            generate_pawn(board, i, side, captures_only, &mut moves);
            continue;
        }

        for &offset in OFFSETS[piece as usize] {
            let mut n = i;
            loop {
                n = match step(n, offset) {
                    Some(n) => n,
                    None => break,
                };
                match board.piece_at(square(n)) {
                    Some((color, victim)) => {
                        if color == xside {
                            moves.push(Move::scored(square(i), square(n), mvv_lva(victim, piece)));
                        }
                        break;
                    },
                    None => {
                        if !captures_only {
                            moves.push(Move::new(square(i), square(n)));
                        }
                    },
                }
                if !SLIDES[piece as usize] {
                    break;
                }
            }
        }
    }

    if !captures_only {
        generate_castling(board, side, &mut moves);
    }
    generate_en_passant(board, side, &mut moves);

    moves
}

/// Pawn pushes, captures, and promotions for the pawn on square `i`.
fn generate_pawn(board: &Board, i: usize, side: Color, captures_only: bool, moves: &mut Vec<Move>) {
    let col = i & 7;
    // white pawns move toward row 0, black pawns toward row 7
    let (fwd, start_row, last_row): (i32, usize, usize) = match side {
        Color::White => (-8, 6, 0),
        Color::Black => (8, 1, 7),
    };
    let ahead = (i as i32 + fwd) as usize;

    if board.piece_at(square(ahead)).is_none() {
        if ahead >> 3 == last_row {
            push_promotions(square(i), square(ahead), None, moves);
        } else if !captures_only {
            moves.push(Move::new(square(i), square(ahead)));
            let ahead2 = (i as i32 + 2*fwd) as usize;
            if i >> 3 == start_row && board.piece_at(square(ahead2)).is_none() {
                moves.push(Move::new(square(i), square(ahead2)));
            }
        }
    }

    for dc in [-1i32, 1] {
        if (col == 0 && dc == -1) || (col == 7 && dc == 1) {
            continue;
        }
        let n = (i as i32 + fwd + dc) as usize;
        match board.piece_at(square(n)) {
            Some((color, victim)) if color == !side => {
                if n >> 3 == last_row {
                    push_promotions(square(i), square(n), Some(victim), moves);
                } else {
                    moves.push(Move::scored(square(i), square(n), mvv_lva(victim, Piece::Pawn)));
                }
            },
            _ => { }
        }
    }
}

/// Emits the four promotion moves for one pawn arrival on the last rank. Promotions that
/// capture score by MVV/LVA; quiet promotions score by the promoted piece.
fn push_promotions(from: Square, to: Square, victim: Option<Piece>, moves: &mut Vec<Move>) {
    for p in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
        let score = match victim {
            Some(v) => mvv_lva(v, Piece::Pawn),
            None => TACTICAL_BASE + 10*(p as i32),
        };
        moves.push(Move { promotion: Some(p), ..Move::scored(from, to, score) });
    }
}

/// Castling moves, emitted only when the right is present, the span between king and rook
/// is empty, and no square the king touches is attacked by the enemy.
fn generate_castling(board: &Board, side: Color, moves: &mut Vec<Move>) {
    use Square::*;
    let xside = !side;

    let candidates: [(bool, Square, Square, Square, &[Square]); 2] = match side {
        Color::White => [
            (board.castling().kingside(side), E1, G1, H1, &[F1, G1]),
            (board.castling().queenside(side), E1, C1, A1, &[D1, C1, B1]),
        ],
        Color::Black => [
            (board.castling().kingside(side), E8, G8, H8, &[F8, G8]),
            (board.castling().queenside(side), E8, C8, A8, &[D8, C8, B8]),
        ],
    };

    for (right, king_from, king_to, rook_from, between) in candidates {
        if !right
            || board.piece_at(king_from) != Some((side, Piece::King))
            || board.piece_at(rook_from) != Some((side, Piece::Rook))
            || between.iter().any(|&sq| board.piece_at(sq).is_some())
        {
            continue;
        }
        // the king's path is origin, transit and destination; on the queenside the b-file
        // square may be attacked freely
        let transit = square((king_from as usize + king_to as usize)/2);
        if attacked(board, king_from, xside)
            || attacked(board, transit, xside)
            || attacked(board, king_to, xside)
        {
            continue;
        }
        moves.push(Move { castling: true, ..Move::new(king_from, king_to) });
    }
}

/// En-passant captures onto the current target square, if any.
fn generate_en_passant(board: &Board, side: Color, moves: &mut Vec<Move>) {
    let target = match board.ep_target() {
        Some(sq) => sq as usize,
        None => return,
    };
    let col = target & 7;
    let own_pawn = Some((side, Piece::Pawn));
    // en passant is always pawn takes pawn
    let score = mvv_lva(Piece::Pawn, Piece::Pawn);

    let origins = match side {
        Color::White if target >> 3 == 2 => [target + 7, target + 9],
        Color::Black if target >> 3 == 5 => [target - 9, target - 7],
        _ => return,
    };
    for (k, from) in origins.into_iter().enumerate() {
        // the first candidate sits one file left of the target, the second one file right
        if (col == 0 && k == 0) || (col == 7 && k == 1) {
            continue;
        }
        if board.piece_at(square(from)) == own_pawn {
            moves.push(Move {
                en_passant: true,
                ..Move::scored(square(from), square(target), score)
            });
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Generates all pseudo-legal moves for the side to move.
pub fn pseudo_legal_moves(board: &Board) -> Vec<Move> {
    generate(board, false)
}

/// Generates pseudo-legal captures and promotions only, for quiescence.
pub fn pseudo_legal_captures(board: &Board) -> Vec<Move> {
    generate(board, true)
}

/// A pseudo-legal move is legal iff applying it does not leave the mover's king attacked.
fn filter_legal(board: &Board, moves: Vec<Move>) -> Vec<Move> {
    let side = board.turn();
    moves.into_iter()
        .filter(|&m| !board.apply(m).expect("INFALLIBLE").in_check(side))
        .collect()
}

/// Generates all legal moves for the side to move.
pub fn legal_moves(board: &Board) -> Vec<Move> {
    filter_legal(board, pseudo_legal_moves(board))
}

/// Generates all legal captures and promotions for the side to move.
pub fn legal_captures(board: &Board) -> Vec<Move> {
    filter_legal(board, pseudo_legal_captures(board))
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;

    fn board(fen: &str) -> Board {
        fen.parse().unwrap()
    }

    fn contains(moves: &[Move], m: &str) -> bool {
        let m: Move = m.parse().unwrap();
        moves.iter().any(|&x| x == m)
    }

    #[test]
    fn twenty_moves_from_the_initial_position() {
        assert_eq!(legal_moves(&Board::initial()).len(), 20);
    }

    #[test]
    fn attacked_sees_sliders_and_leapers() {
        let b = board("4k3/8/8/8/8/2n5/8/R3K3 w - - 0 1");
        assert!(attacked(&b, Square::A8, Color::White));   // rook up the a-file
        assert!(!attacked(&b, Square::B2, Color::White));
        assert!(attacked(&b, Square::A2, Color::Black));   // knight from c3
        assert!(attacked(&b, Square::D1, Color::Black));
        assert!(!attacked(&b, Square::C4, Color::White));
    }

    #[test]
    fn attacked_pawn_geometry_is_diagonal_only() {
        let b = board("4k3/8/8/3p4/8/8/8/4K3 w - - 0 1");
        assert!(attacked(&b, Square::C4, Color::Black));
        assert!(attacked(&b, Square::E4, Color::Black));
        assert!(!attacked(&b, Square::D4, Color::Black));  // pushes do not attack
    }

    #[test]
    fn pinned_piece_moves_are_filtered_out() {
        // the d2 knight is pinned against the king by the d8 rook
        let b = board("3rk3/8/8/8/8/8/3N4/3K4 w - - 0 1");
        let moves = legal_moves(&b);
        assert!(!moves.iter().any(|m| m.from == Square::D2));
    }

    #[test]
    fn evasions_only_while_in_check() {
        let b = board("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1");
        for m in legal_moves(&b) {
            assert!(!b.apply(m).unwrap().in_check(Color::White));
        }
    }

    #[test]
    fn promotions_come_in_all_four_flavors() {
        let b = board("7k/P7/8/8/8/8/7p/7K w - - 0 1");
        let moves = legal_moves(&b);
        for m in ["a7a8q", "a7a8r", "a7a8b", "a7a8n"] {
            assert!(contains(&moves, m));
        }
        assert!(!moves.iter().any(|m| m.from == Square::A7 && m.promotion.is_none()));
    }

    #[test]
    fn en_passant_is_generated_only_with_a_capturing_pawn() {
        let b = board("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3");
        assert!(contains(&legal_moves(&b), "e5d6"));
        assert!(en_passant_threatened(&b));

        // same target square, no white pawn beside it
        let b = board("rnbqkbnr/ppp1pppp/8/3p4/8/8/PPPPPPPP/RNBQKBNR w KQkq d6 0 3");
        assert!(!legal_moves(&b).iter().any(|m| m.en_passant));
        assert!(!en_passant_threatened(&b));
    }

    #[test]
    fn castling_is_generated_when_the_path_is_safe() {
        let b = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let moves = legal_moves(&b);
        assert!(contains(&moves, "e1g1"));
        assert!(contains(&moves, "e1c1"));
    }

    #[test]
    fn castling_is_excluded_when_the_king_path_is_attacked() {
        // the f8 rook covers f1: kingside is out, queenside stays in
        let b = board("r3kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        let moves = legal_moves(&b);
        assert!(!contains(&moves, "e1g1"));
        assert!(contains(&moves, "e1c1"));
    }

    #[test]
    fn castling_is_excluded_while_in_check() {
        let b = board("4k3/8/8/8/8/8/4r3/R3K2R w KQ - 0 1");
        let moves = legal_moves(&b);
        assert!(!contains(&moves, "e1g1"));
        assert!(!contains(&moves, "e1c1"));
    }

    #[test]
    fn queenside_b_file_attack_does_not_block_castling() {
        // the b8 rook attacks b1, which the king never touches
        let b = board("1r2k3/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert!(contains(&legal_moves(&b), "e1c1"));
    }

    #[test]
    fn capture_scores_prefer_valuable_victims_and_cheap_attackers() {
        // pawn takes queen outranks rook takes queen outranks pawn takes rook
        let b = board("4k3/8/2q1r3/3P4/8/8/8/R3K3 w - - 0 1");
        let moves = pseudo_legal_moves(&b);
        let score = |s: &str| {
            let m: Move = s.parse().unwrap();
            moves.iter().find(|&&x| x == m).unwrap().score
        };
        assert!(score("d5c6") > score("d5e6"));
        assert_eq!(score("d5c6"), 1_000_040);
        assert_eq!(score("d5e6"), 1_000_030);
    }

    #[test]
    fn quiescence_set_is_captures_and_promotions_only() {
        let b = board("7k/P7/8/3p4/4P3/8/8/7K w - - 0 1");
        let moves = legal_captures(&b);
        assert!(contains(&moves, "e4d5"));
        for m in ["a7a8q", "a7a8r", "a7a8b", "a7a8n"] {
            assert!(contains(&moves, m));
        }
        assert!(!contains(&moves, "e4e5"));
        assert!(!moves.iter().any(|m| m.from == Square::H1));
    }
}
