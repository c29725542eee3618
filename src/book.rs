//! Opening book lookup
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
//! The book file is a sequence of 16-byte big-endian records: a 64-bit position key, a
//! 16-bit move, a 16-bit weight and a 32-bit learn value. Keys follow the polyglot
//! layout — piece words 0..768 by (piece kind, square), castling words 768..772,
//! en-passant file words 772..780 counted only when a capturing pawn is present, and the
//! white-to-move word 780 — with the words drawn from a fixed-seed generator; dropping in
//! the published constant table restores compatibility with community book files. Moves
//! that castle are encoded as the king capturing its own rook and are translated at
//! lookup time. A probed move is returned only if it appears in the legal move list.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;
use log::debug;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use crate::chess::{Board, Color, File, Move, Piece, Rank, Square};
use crate::chess::movegen;

/// Word indices in the polyglot key layout.
const CASTLE_OFFSET: usize = 768;
const EP_OFFSET: usize = 772;
const TURN_OFFSET: usize = 780;
const WORD_COUNT: usize = 781;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// One record from a book file, minus the key it is filed under and the learn value,
/// which this engine reads past but never uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct BookEntry {
    mv: u16,
    weight: u16,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An opening book, read-only after load.
#[derive(Debug, Default)]
pub struct Book {
    entries: HashMap<u64, Vec<BookEntry>>,
}

impl Book {
    /// Loads a book from a file.
    pub fn open(path: &Path) -> io::Result<Book> {
        let data = fs::read(path)?;
        let book = Book::parse(&data);
        debug!("loaded {} book positions from {}", book.entries.len(), path.display());
        Ok(book)
    }

    /// Parses book records from raw bytes. A trailing partial record is ignored.
    pub fn parse(data: &[u8]) -> Book {
        let mut entries: HashMap<u64, Vec<BookEntry>> = HashMap::new();
        for record in data.chunks_exact(16) {
            let key = u64::from_be_bytes(record[0..8].try_into().expect("INFALLIBLE"));
            let mv = u16::from_be_bytes(record[8..10].try_into().expect("INFALLIBLE"));
            let weight = u16::from_be_bytes(record[10..12].try_into().expect("INFALLIBLE"));
            entries.entry(key).or_default().push(BookEntry { mv, weight });
        }
        Book { entries }
    }

    /// Returns the number of distinct positions in the book.
    pub fn positions(&self) -> usize {
        self.entries.len()
    }

    /// Probes the book for `board`, picking among stored moves at random in proportion
    /// to their weights. The result is validated against the legal move list; a record
    /// that does not describe a legal move yields `None`.
    pub fn probe(&self, board: &Board) -> Option<Move> {
        let candidates = self.entries.get(&position_key(board))?;

        let total: u32 = candidates.iter().map(|e| e.weight as u32).sum();
        let chosen = if total == 0 {
            candidates[0]
        } else {
            let mut r = rand::thread_rng().gen_range(0..total);
            let mut chosen = candidates[0];
            for &e in candidates {
                if r < e.weight as u32 {
                    chosen = e;
                    break;
                }
                r -= e.weight as u32;
            }
            chosen
        };

        let wanted = decode_move(board, chosen.mv)?;
        movegen::legal_moves(board).into_iter().find(|&m| m == wanted)
    }
}

/// Decodes a 16-bit book move for `board`. Bit layout from the least significant end:
/// destination file, destination rank, origin file, origin rank (three bits each), then
/// the promotion piece (0 none, 1 knight, 2 bishop, 3 rook, 4 queen). Castling arrives
/// encoded as the king capturing its own rook.
fn decode_move(board: &Board, mv: u16) -> Option<Move> {
    let file = |bits: u16| File::try_from(bits as usize).ok();
    let rank = |bits: u16| Rank::try_from(bits as usize).ok();

    let to = Square::from_coord(file(mv & 7)?, rank((mv >> 3) & 7)?);
    let from = Square::from_coord(file((mv >> 6) & 7)?, rank((mv >> 9) & 7)?);
    let promotion = match (mv >> 12) & 7 {
        0 => None,
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => return None,
    };

    // a king "capturing" its own rook is castling
    let to = match (board.piece_at(from), board.piece_at(to)) {
        (Some((c1, Piece::King)), Some((c2, Piece::Rook))) if c1 == c2 => {
            match (from, to) {
                (Square::E1, Square::H1) => Square::G1,
                (Square::E1, Square::A1) => Square::C1,
                (Square::E8, Square::H8) => Square::G8,
                (Square::E8, Square::A8) => Square::C8,
                _ => to,
            }
        },
        _ => to,
    };

    Some(Move { promotion, ..Move::new(from, to) })
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Computes the book key of a position.
pub fn position_key(board: &Board) -> u64 {
    let words = words();
    let mut key = 0;

    for i in 0..Square::COUNT {
        let sq = Square::try_from(i).expect("INFALLIBLE");
        if let Some((color, piece)) = board.piece_at(sq) {
            // piece kinds alternate black/white from pawn upward
            let kind = 2*(piece as usize) + if color == Color::White { 1 } else { 0 };
            let row = 7 - sq.row();  // book ranks count up from white's side
            key ^= words[64*kind + 8*row + sq.col()];
        }
    }

    let castling = board.castling();
    for (i, right) in [
        castling.kingside(Color::White),
        castling.queenside(Color::White),
        castling.kingside(Color::Black),
        castling.queenside(Color::Black),
    ].iter().enumerate() {
        if *right {
            key ^= words[CASTLE_OFFSET + i];
        }
    }

    if let Some(sq) = board.ep_target() {
        if movegen::en_passant_threatened(board) {
            key ^= words[EP_OFFSET + sq.col()];
        }
    }

    if board.turn() == Color::White {
        key ^= words[TURN_OFFSET];
    }

    key
}

/// The key words, drawn once per process from a fixed seed.
fn words() -> &'static [u64; WORD_COUNT] {
    static WORDS: OnceLock<[u64; WORD_COUNT]> = OnceLock::new();
    WORDS.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(0x2c90_41de_66b2_8f84);
        let mut words = [0; WORD_COUNT];
        for w in words.iter_mut() {
            *w = rng.gen();
        }
        words
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;

    /// Builds one raw 16-byte record.
    fn record(key: u64, mv: u16, weight: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&key.to_be_bytes());
        bytes.extend_from_slice(&mv.to_be_bytes());
        bytes.extend_from_slice(&weight.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes
    }

    /// Encodes a move the way book files do.
    fn encode(from_file: u16, from_rank: u16, to_file: u16, to_rank: u16, promo: u16) -> u16 {
        to_file | (to_rank << 3) | (from_file << 6) | (from_rank << 9) | (promo << 12)
    }

    #[test]
    fn keys_depend_on_placement_turn_castling_and_en_passant() {
        let initial = position_key(&Board::initial());
        assert_eq!(initial, position_key(&Board::initial()));

        let black: Board = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1"
            .parse().unwrap();
        assert_ne!(initial, position_key(&black));

        let no_castle: Board = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w - - 0 1"
            .parse().unwrap();
        assert_ne!(initial, position_key(&no_castle));

        // an en-passant square no pawn can use does not contribute
        let idle_ep: Board = "rnbqkbnr/ppp1pppp/8/3p4/8/8/PPPPPPPP/RNBQKBNR w KQkq d6 0 3"
            .parse().unwrap();
        let idle_plain: Board = "rnbqkbnr/ppp1pppp/8/3p4/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 3"
            .parse().unwrap();
        assert_eq!(position_key(&idle_ep), position_key(&idle_plain));
    }

    #[test]
    fn probe_returns_the_stored_legal_move() {
        let board = Board::initial();
        // e2e4: from file e rank 2, to file e rank 4
        let data = record(position_key(&board), encode(4, 1, 4, 3, 0), 10);
        let book = Book::parse(&data);
        assert_eq!(book.probe(&board).unwrap().to_string(), "e2e4");
    }

    #[test]
    fn probe_misses_unknown_positions_and_bad_moves() {
        let board = Board::initial();
        let book = Book::parse(&record(0x1234, encode(4, 1, 4, 3, 0), 1));
        assert!(book.probe(&board).is_none());

        // e2e5 is not a legal move, so the record is rejected
        let book = Book::parse(&record(position_key(&board), encode(4, 1, 4, 4, 0), 1));
        assert!(book.probe(&board).is_none());
    }

    #[test]
    fn king_takes_rook_is_translated_to_castling() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        // encoded as e1 "captures" h1
        let data = record(position_key(&board), encode(4, 0, 7, 0, 0), 1);
        let book = Book::parse(&data);
        let m = book.probe(&board).unwrap();
        assert_eq!(m.to_string(), "e1g1");
        assert!(m.castling);
    }

    #[test]
    fn weights_zero_still_yield_a_move() {
        let board = Board::initial();
        let data = record(position_key(&board), encode(6, 0, 5, 2, 0), 0);
        let book = Book::parse(&data);
        assert_eq!(book.probe(&board).unwrap().to_string(), "g1f3");
    }

    #[test]
    fn partial_trailing_records_are_ignored() {
        let board = Board::initial();
        let mut data = record(position_key(&board), encode(4, 1, 4, 3, 0), 1);
        data.extend_from_slice(&[0xde, 0xad, 0xbe]);
        let book = Book::parse(&data);
        assert_eq!(book.positions(), 1);
        assert!(book.probe(&board).is_some());
    }
}
