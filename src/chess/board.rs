//! The board: piece placement, side to move, castling rights, en-passant state and clocks
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use std::str::FromStr;
use std::convert::TryFrom;
use super::{Color, Piece, Square, Zobrist};
use super::movegen;
use super::error::{ApplyMoveError, ParseFenError};
use super::moves::Move;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The four castling-right flags, one per color and side.
///
/// A right is cleared permanently whenever the king leaves its origin square or the
/// corresponding rook leaves, or is captured on, its origin square.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    const WHITE_KINGSIDE: u8 = 0b0001;
    const WHITE_QUEENSIDE: u8 = 0b0010;
    const BLACK_KINGSIDE: u8 = 0b0100;
    const BLACK_QUEENSIDE: u8 = 0b1000;

    /// Returns rights with all four flags set.
    pub fn all() -> CastlingRights {
        CastlingRights(0b1111)
    }

    /// Returns rights with no flags set.
    pub fn none() -> CastlingRights {
        CastlingRights(0)
    }

    fn bit(color: Color, kingside: bool) -> u8 {
        match (color, kingside) {
            (Color::White, true) => Self::WHITE_KINGSIDE,
            (Color::White, false) => Self::WHITE_QUEENSIDE,
            (Color::Black, true) => Self::BLACK_KINGSIDE,
            (Color::Black, false) => Self::BLACK_QUEENSIDE,
        }
    }

    /// Returns true if `color` may still castle kingside.
    pub fn kingside(self, color: Color) -> bool {
        self.0 & Self::bit(color, true) != 0
    }

    /// Returns true if `color` may still castle queenside.
    pub fn queenside(self, color: Color) -> bool {
        self.0 & Self::bit(color, false) != 0
    }

    /// Sets the flag for one color and side.
    pub fn set(&mut self, color: Color, kingside: bool) {
        self.0 |= Self::bit(color, kingside);
    }

    /// Clears the flag for one color and side.
    pub fn clear(&mut self, color: Color, kingside: bool) {
        self.0 &= !Self::bit(color, kingside);
    }

    /// Clears both of `color`'s flags.
    pub fn clear_color(&mut self, color: Color) {
        self.clear(color, true);
        self.clear(color, false);
    }

    /// Index of each active right, in `K Q k q` order, for Zobrist keying.
    pub fn active_indices(self) -> impl Iterator<Item = usize> {
        let bits = self.0;
        (0..4).filter(move |i| bits & (1 << i) != 0)
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return '-'.fmt(f);
        }
        if self.kingside(Color::White) { 'K'.fmt(f)?; }
        if self.queenside(Color::White) { 'Q'.fmt(f)?; }
        if self.kingside(Color::Black) { 'k'.fmt(f)?; }
        if self.queenside(Color::Black) { 'q'.fmt(f)?; }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A chess position.
///
/// Boards are plain values: `apply` returns a fresh board and never mutates its receiver,
/// which is what lets the search hand copies to worker threads without synchronization.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Option<(Color, Piece)>; Square::COUNT],
    turn: Color,
    castling: CastlingRights,
    ep_target: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Board {
    /// Returns the standard opening position.
    pub fn initial() -> Board {
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            .parse()
            .expect("INFALLIBLE")
    }

    /// Returns the piece on a square, if any.
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        self.cells[sq as usize]
    }

    /// Returns the side to move.
    pub fn turn(&self) -> Color {
        self.turn
    }

    /// Returns the current castling rights.
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    /// Returns the en-passant target square, if the last move was a double pawn push.
    pub fn ep_target(&self) -> Option<Square> {
        self.ep_target
    }

    /// Returns the number of half-moves since the last capture or pawn move. A value of
    /// 100 means the fifty-move rule has been reached.
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Returns the full-move number, starting at 1 and incremented after black's move.
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Returns the square of `color`'s king.
    ///
    /// Legal positions have exactly one king per color; a missing king is an invariant
    /// violation, so callers unwrap with `expect`.
    pub fn king_square(&self, color: Color) -> Option<Square> {
        (0..Square::COUNT)
            .find(|&i| self.cells[i] == Some((color, Piece::King)))
            .map(|i| Square::try_from(i).expect("INFALLIBLE"))
    }

    /// Returns true if `color`'s king is attacked.
    pub fn in_check(&self, color: Color) -> bool {
        let king = self.king_square(color).expect("INFALLIBLE");
        movegen::attacked(self, king, !color)
    }

    /// Returns the Zobrist fingerprint of this position.
    pub fn zobrist_key(&self) -> Zobrist {
        Zobrist::compute(self)
    }

    /// Returns a new board with `m` performed.
    ///
    /// Castling preconditions (king and rook on their origin squares, empty span, no
    /// attacked square on the king's path) are re-verified here even though the generator
    /// checks them too. A pawn move to the last rank without a promotion piece is an
    /// invariant violation reported as `MissingPromotion`.
    pub fn apply(&self, m: Move) -> Result<Board, ApplyMoveError> {
        let mut board = *self;
        let (color, piece) = board.cells[m.from as usize].ok_or(ApplyMoveError::VacantOrigin)?;
        let mut capture = board.cells[m.to as usize].is_some();

        if m.castling {
            board.perform_castling(color, m)?;
        } else {
            if m.en_passant {
                // the captured pawn shares the mover's origin rank and the destination file
                let victim = Square::from_row_col(m.from.row(), m.to.col()).expect("INFALLIBLE");
                board.cells[victim as usize] = None;
                capture = true;
            }

            board.cells[m.to as usize] = board.cells[m.from as usize];
            board.cells[m.from as usize] = None;

            if piece == Piece::Pawn && (m.to.row() == 0 || m.to.row() == 7) {
                match m.promotion {
                    Some(p) => board.cells[m.to as usize] = Some((color, p)),
                    None => return Err(ApplyMoveError::MissingPromotion),
                }
            }
        }

        if piece == Piece::King {
            board.castling.clear_color(color);
        }
        for sq in [m.from, m.to] {
            match sq {
                Square::A1 => board.castling.clear(Color::White, false),
                Square::H1 => board.castling.clear(Color::White, true),
                Square::A8 => board.castling.clear(Color::Black, false),
                Square::H8 => board.castling.clear(Color::Black, true),
                _ => { }
            }
        }

        board.ep_target = if piece == Piece::Pawn && m.from.row().abs_diff(m.to.row()) == 2 {
            Square::from_row_col((m.from.row() + m.to.row())/2, m.from.col())
        } else {
            None
        };

        if piece == Piece::Pawn || capture {
            board.halfmove_clock = 0;
        } else {
            board.halfmove_clock += 1;
        }

        board.turn = !board.turn;
        if board.turn == Color::White {
            board.fullmove_number += 1;
        }

        Ok(board)
    }

    /// Moves the king two files toward its rook and jumps the rook to the square the king
    /// crossed, after verifying every castling precondition on this board.
    fn perform_castling(&mut self, color: Color, m: Move) -> Result<(), ApplyMoveError> {
        use Square::*;

        let kingside = m.to.col() > m.from.col();
        let (king_from, king_to, rook_from, rook_to) = match (color, kingside) {
            (Color::White, true) => (E1, G1, H1, F1),
            (Color::White, false) => (E1, C1, A1, D1),
            (Color::Black, true) => (E8, G8, H8, F8),
            (Color::Black, false) => (E8, C8, A8, D8),
        };

        let ok = m.from == king_from
            && self.cells[king_from as usize] == Some((color, Piece::King))
            && self.cells[rook_from as usize] == Some((color, Piece::Rook))
            && self.span_empty(king_from, rook_from)
            && !movegen::attacked(self, king_from, !color)
            && !movegen::attacked(self, rook_to, !color)
            && !movegen::attacked(self, king_to, !color);
        if !ok {
            return Err(ApplyMoveError::IllegalCastling);
        }

        self.cells[king_from as usize] = None;
        self.cells[rook_from as usize] = None;
        self.cells[king_to as usize] = Some((color, Piece::King));
        self.cells[rook_to as usize] = Some((color, Piece::Rook));
        Ok(())
    }

    /// Returns true if every square strictly between `a` and `b` on one rank is empty.
    fn span_empty(&self, a: Square, b: Square) -> bool {
        let row = a.row();
        let (lo, hi) = if a.col() < b.col() { (a.col(), b.col()) } else { (b.col(), a.col()) };
        (lo + 1..hi).all(|col| {
            let sq = Square::from_row_col(row, col).expect("INFALLIBLE");
            self.cells[sq as usize].is_none()
        })
    }
}

impl fmt::Display for Board {
    /// Formats the position as a FEN string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..8 {
            let mut empty = 0;
            for col in 0..8 {
                let sq = Square::from_row_col(row, col).expect("INFALLIBLE");
                match self.cells[sq as usize] {
                    None => empty += 1,
                    Some((color, piece)) => {
                        if empty > 0 {
                            write!(f, "{}", empty)?;
                            empty = 0;
                        }
                        let c = piece.to_string();
                        match color {
                            Color::White => c.fmt(f)?,
                            Color::Black => c.to_lowercase().fmt(f)?,
                        }
                    },
                }
            }
            if empty > 0 {
                write!(f, "{}", empty)?;
            }
            if row < 7 {
                '/'.fmt(f)?;
            }
        }

        write!(f, " {} {} ", self.turn, self.castling)?;
        match self.ep_target {
            Some(sq) => write!(f, "{}", sq)?,
            None => write!(f, "-")?,
        }
        write!(f, " {} {}", self.halfmove_clock, self.fullmove_number)
    }
}

impl FromStr for Board {
    type Err = ParseFenError;

    /// Parses the six space-separated FEN fields: placement, side to move, castling
    /// rights, en-passant square, halfmove clock and fullmove number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();

        let placement = fields.next().ok_or(ParseFenError::MissingField)?;
        let mut cells = [None; Square::COUNT];
        let mut kings = [0usize; Color::COUNT];
        let rows: Vec<&str> = placement.split('/').collect();
        if rows.len() != 8 {
            return Err(ParseFenError::ParseBoard);
        }
        for (row, row_str) in rows.iter().enumerate() {
            let mut col = 0;
            for c in row_str.chars() {
                if let Some(n) = c.to_digit(10) {
                    col += n as usize;
                } else {
                    let piece: Piece = c.to_string().parse()?;
                    let color = if c.is_uppercase() { Color::White } else { Color::Black };
                    let sq = Square::from_row_col(row, col).ok_or(ParseFenError::ParseBoard)?;
                    cells[sq as usize] = Some((color, piece));
                    if piece == Piece::King {
                        kings[color as usize] += 1;
                    }
                    if piece == Piece::Pawn && (row == 0 || row == 7) {
                        return Err(ParseFenError::InvalidPawnRank);
                    }
                    col += 1;
                }
            }
            if col != 8 {
                return Err(ParseFenError::ParseBoard);
            }
        }
        if kings != [1, 1] {
            return Err(ParseFenError::KingCount);
        }

        let turn = fields.next().ok_or(ParseFenError::MissingField)?.parse()?;

        let castling_str = fields.next().ok_or(ParseFenError::MissingField)?;
        let mut castling = CastlingRights::none();
        if castling_str != "-" {
            for c in castling_str.chars() {
                match c {
                    'K' => castling.set(Color::White, true),
                    'Q' => castling.set(Color::White, false),
                    'k' => castling.set(Color::Black, true),
                    'q' => castling.set(Color::Black, false),
                    _ => return Err(ParseFenError::ParseCastling),
                }
            }
        }

        let ep_str = fields.next().ok_or(ParseFenError::MissingField)?;
        let ep_target = if ep_str == "-" {
            None
        } else {
            Some(ep_str.parse::<Square>()?)
        };

        let halfmove_clock = fields.next()
            .ok_or(ParseFenError::MissingField)?
            .parse()
            .map_err(|_| ParseFenError::ParseHalfMoveClock)?;
        let fullmove_number = fields.next()
            .ok_or(ParseFenError::MissingField)?
            .parse()
            .map_err(|_| ParseFenError::ParseMoveNumber)?;

        Ok(Board { cells, turn, castling, ep_target, halfmove_clock, fullmove_number })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn initial_position_is_the_standard_one() {
        let board = Board::initial();
        assert_eq!(board.piece_at(Square::E1), Some((Color::White, Piece::King)));
        assert_eq!(board.piece_at(Square::D8), Some((Color::Black, Piece::Queen)));
        assert_eq!(board.piece_at(Square::E4), None);
        assert_eq!(board.turn(), Color::White);
        assert_eq!(board.castling(), CastlingRights::all());
        assert_eq!(board.ep_target(), None);
        assert_eq!(board.halfmove_clock(), 0);
        assert_eq!(board.fullmove_number(), 1);
    }

    #[test]
    fn fen_round_trips() {
        for fen in [
            START_FEN,
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2",
            "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
            "8/8/8/8/8/5k2/8/4K2q w - - 42 73",
        ] {
            let board: Board = fen.parse().unwrap();
            assert_eq!(board.to_string(), fen);
        }
    }

    #[test]
    fn malformed_fen_is_rejected() {
        assert!("".parse::<Board>().is_err());
        assert!("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1".parse::<Board>().is_err());
        assert!("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0".parse::<Board>().is_err());
        assert!("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1".parse::<Board>().is_err());
        assert!("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQxq - 0 1".parse::<Board>().is_err());
        // two white kings
        assert!("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNK w KQkq - 0 1".parse::<Board>().is_err());
        // pawn on the last rank
        assert!("Pnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".parse::<Board>().is_err());
    }

    #[test]
    fn apply_moves_the_piece_and_updates_the_clocks() {
        let board = Board::initial();
        let board = board.apply("e2e4".parse().unwrap()).unwrap();
        assert_eq!(board.piece_at(Square::E4), Some((Color::White, Piece::Pawn)));
        assert_eq!(board.piece_at(Square::E2), None);
        assert_eq!(board.turn(), Color::Black);
        assert_eq!(board.ep_target(), Some(Square::E3));
        assert_eq!(board.halfmove_clock(), 0);
        assert_eq!(board.fullmove_number(), 1);

        let board = board.apply("g8f6".parse().unwrap()).unwrap();
        assert_eq!(board.turn(), Color::White);
        assert_eq!(board.ep_target(), None);
        assert_eq!(board.halfmove_clock(), 1);
        assert_eq!(board.fullmove_number(), 2);
    }

    #[test]
    fn capture_resets_the_halfmove_clock() {
        let board: Board = "4k3/8/8/3p4/4N3/8/8/4K3 w - - 12 34".parse().unwrap();
        let board = board.apply("e4d5".parse().unwrap()).unwrap();
        assert_eq!(board.piece_at(Square::D5), Some((Color::White, Piece::Knight)));
        assert_eq!(board.halfmove_clock(), 0);
    }

    #[test]
    fn en_passant_removes_the_pushed_pawn() {
        let board: Board =
            "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3".parse().unwrap();
        let mut m: Move = "e5d6".parse().unwrap();
        m.en_passant = true;
        let board = board.apply(m).unwrap();
        assert_eq!(board.piece_at(Square::D6), Some((Color::White, Piece::Pawn)));
        assert_eq!(board.piece_at(Square::D5), None);
        assert_eq!(board.piece_at(Square::E5), None);
    }

    #[test]
    fn promotion_replaces_the_pawn() {
        let board: Board = "7k/P7/8/8/8/8/7p/7K w - - 0 1".parse().unwrap();
        let board = board.apply("a7a8q".parse().unwrap()).unwrap();
        assert_eq!(board.piece_at(Square::A8), Some((Color::White, Piece::Queen)));
        assert_eq!(board.piece_at(Square::A7), None);
    }

    #[test]
    fn promotion_without_a_piece_is_an_error() {
        let board: Board = "7k/P7/8/8/8/8/7p/7K w - - 0 1".parse().unwrap();
        assert_eq!(
            board.apply("a7a8".parse().unwrap()),
            Err(ApplyMoveError::MissingPromotion)
        );
    }

    #[test]
    fn castling_moves_both_king_and_rook() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let mut m: Move = "e1g1".parse().unwrap();
        m.castling = true;
        let board = board.apply(m).unwrap();
        assert_eq!(board.piece_at(Square::G1), Some((Color::White, Piece::King)));
        assert_eq!(board.piece_at(Square::F1), Some((Color::White, Piece::Rook)));
        assert_eq!(board.piece_at(Square::E1), None);
        assert_eq!(board.piece_at(Square::H1), None);
        assert!(!board.castling().kingside(Color::White));
        assert!(!board.castling().queenside(Color::White));
        assert!(board.castling().kingside(Color::Black));
    }

    #[test]
    fn castling_with_a_piece_in_the_way_is_an_error() {
        let board: Board = "r3k2r/8/8/8/8/8/8/RN2K2R w KQkq - 0 1".parse().unwrap();
        let mut m: Move = "e1c1".parse().unwrap();
        m.castling = true;
        assert_eq!(board.apply(m), Err(ApplyMoveError::IllegalCastling));
    }

    #[test]
    fn rook_moves_and_rook_captures_clear_the_right() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let board = board.apply("a1a8".parse().unwrap()).unwrap();
        // white's own queenside right goes with the rook leaving a1, and black's with the
        // rook captured on a8
        assert!(!board.castling().queenside(Color::White));
        assert!(board.castling().kingside(Color::White));
        assert!(!board.castling().queenside(Color::Black));
        assert!(board.castling().kingside(Color::Black));
    }

    #[test]
    fn king_moves_clear_both_rights() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let board = board.apply("e1e2".parse().unwrap()).unwrap();
        assert!(!board.castling().kingside(Color::White));
        assert!(!board.castling().queenside(Color::White));
        assert!(board.castling().kingside(Color::Black));
    }
}
