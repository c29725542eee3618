//! Move representation and the long-algebraic boundary format
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use std::str::FromStr;
use super::{Piece, Square};
use super::error::ParseMoveError;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A chess move.
///
/// Two moves compare equal when their origin, destination and promotion piece match; the
/// castling and en-passant flags are redundant with the coordinates for well-formed moves,
/// and the ordering score is transient state written by the generator and consumed by the
/// move sort.
#[derive(Debug, Copy, Clone)]
pub struct Move {
    /// Origin square
    pub from: Square,
    /// Destination square
    pub to: Square,
    /// Promotion piece for a pawn reaching the last rank
    pub promotion: Option<Piece>,
    /// True if this move castles
    pub castling: bool,
    /// True if this move captures en passant
    pub en_passant: bool,
    /// Ordering score; larger is searched earlier
    pub score: i32,
}

impl Move {
    /// Creates a quiet move between two squares.
    pub fn new(from: Square, to: Square) -> Move {
        Move { from, to, promotion: None, castling: false, en_passant: false, score: 0 }
    }

    /// Creates a move with an ordering score.
    pub fn scored(from: Square, to: Square, score: i32) -> Move {
        Move { score, ..Move::new(from, to) }
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Move) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.promotion == other.promotion
    }
}

impl Eq for Move { }

impl fmt::Display for Move {
    /// Formats the move in long algebraic notation: origin square, destination square, and
    /// an optional lowercase promotion letter, for example `e2e4` or `a7a8q`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        match self.promotion {
            Some(p) => write!(f, "{}", p.to_string().to_lowercase()),
            None => Ok(()),
        }
    }
}

impl FromStr for Move {
    type Err = ParseMoveError;

    /// Parses a move in long algebraic notation. The result carries no castling or
    /// en-passant flag; callers match it against the generated legal move list, which
    /// equality by coordinates makes exact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
            return Err(ParseMoveError);
        }

        let from: Square = s[0..2].parse()?;
        let to: Square = s[2..4].parse()?;
        let promotion = match &s[4..] {
            "" => None,
            "n" => Some(Piece::Knight),
            "b" => Some(Piece::Bishop),
            "r" => Some(Piece::Rook),
            "q" => Some(Piece::Queen),
            _ => return Err(ParseMoveError),
        };

        Ok(Move { promotion, ..Move::new(from, to) })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::Square;

    #[test]
    fn display_and_fromstr_round_trip() {
        let m = Move::new(Square::E2, Square::E4);
        assert_eq!(m.to_string(), "e2e4");
        assert_eq!("e2e4".parse::<Move>().unwrap(), m);

        let p = Move { promotion: Some(Piece::Queen), ..Move::new(Square::A7, Square::A8) };
        assert_eq!(p.to_string(), "a7a8q");
        assert_eq!("a7a8q".parse::<Move>().unwrap(), p);
    }

    #[test]
    fn equality_ignores_score_and_flags() {
        let a = Move::scored(Square::G1, Square::F3, 42);
        let mut b = Move::new(Square::G1, Square::F3);
        b.en_passant = true;
        assert_eq!(a, b);

        let c = Move { promotion: Some(Piece::Rook), ..a };
        assert_ne!(a, c);
    }

    #[test]
    fn malformed_strings_are_rejected() {
        assert!("e2".parse::<Move>().is_err());
        assert!("e2e9".parse::<Move>().is_err());
        assert!("e7e8k".parse::<Move>().is_err());
        assert!("e2e4e5".parse::<Move>().is_err());
    }
}
