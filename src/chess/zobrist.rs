//! Zobrist position fingerprints
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::convert::TryFrom;
use std::fmt;
use std::sync::OnceLock;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use super::{Board, Color, Piece, Square};
use super::movegen;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A 64-bit hash key generated from a position.
///
/// The key is the XOR of one random word per (piece, square) present, a word for the side
/// to move when it is white, one word per active castling right, and one word per file of
/// the en-passant target when a pawn of the side to move actually threatens that capture.
/// The gating keeps positions that differ only in an uncapturable en-passant square from
/// hashing apart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Zobrist(u64);

impl Zobrist {
    /// Computes the fingerprint of `board` from scratch.
    pub fn compute(board: &Board) -> Zobrist {
        let t = tables();
        let mut key = 0;

        for i in 0..Square::COUNT {
            let sq = Square::try_from(i).expect("INFALLIBLE");
            if let Some((color, piece)) = board.piece_at(sq) {
                key ^= t.pieces[color as usize][piece as usize][i];
            }
        }

        if board.turn() == Color::White {
            key ^= t.white_turn;
        }

        for right in board.castling().active_indices() {
            key ^= t.castling[right];
        }

        if let Some(sq) = board.ep_target() {
            if movegen::en_passant_threatened(board) {
                key ^= t.ep_file[sq.col()];
            }
        }

        Zobrist(key)
    }
}

impl fmt::Display for Zobrist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::LowerHex for Zobrist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Zobrist> for u64 {
    /// Allows using the key to get a hash table index
    fn from(key: Zobrist) -> Self {
        key.0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
struct Tables {
    pieces: [[[u64; Square::COUNT]; Piece::COUNT]; Color::COUNT],
    white_turn: u64,
    castling: [u64; 4],
    ep_file: [u64; 8],
}

/// The random words behind the fingerprint, drawn once per process from a fixed seed so
/// that keys are stable across runs and threads.
fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(0x51ab_7d3a_9c24_e06f);
        let mut t = Tables {
            pieces: [[[0; Square::COUNT]; Piece::COUNT]; Color::COUNT],
            white_turn: 0,
            castling: [0; 4],
            ep_file: [0; 8],
        };
        for color in t.pieces.iter_mut() {
            for piece in color.iter_mut() {
                for word in piece.iter_mut() {
                    *word = rng.gen();
                }
            }
        }
        t.white_turn = rng.gen();
        for word in t.castling.iter_mut() {
            *word = rng.gen();
        }
        for word in t.ep_file.iter_mut() {
            *word = rng.gen();
        }
        t
    })
}
