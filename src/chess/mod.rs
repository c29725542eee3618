//! The `chess` module implements the rules of standard chess.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use std::mem;
use std::str::FromStr;
use std::convert::TryFrom;
use self::error::*;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Which side a piece or player is on, based on the color of the pieces for that side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The number of colors
    pub const COUNT: usize = 2;
}

impl std::ops::Not for Color {
    type Output = Color;

    /// Returns the opposite color
    ///
    /// # Example
    /// ```
    /// use outpost::chess::Color;
    /// assert_eq!(!Color::White, Color::Black);
    /// assert_eq!(!Color::Black, Color::White);
    /// ```
    fn not(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => 'w'.fmt(f),
            Color::Black => 'b'.fmt(f),
        }
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "w" => Ok(Color::White),
            "b" => Ok(Color::Black),
            _   => Err(ParseColorError),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::White
    }
}

impl TryFrom<usize> for Color {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value < Self::COUNT {
            unsafe { Ok(mem::transmute::<u8, Color>(value as u8)) }
        } else {
            Err(TryFromIntError)
        }
    }
}

impl From<Color> for usize {
    fn from(value: Color) -> Self {
        value as Self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The type of a chess piece
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Piece {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl Piece {
    /// The number of piece types
    pub const COUNT: usize = Piece::King as usize + 1;
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Piece::Pawn => "P",
            Piece::Knight => "N",
            Piece::Bishop => "B",
            Piece::Rook => "R",
            Piece::Queen => "Q",
            Piece::King => "K",
        }.fmt(f)
    }
}

impl FromStr for Piece {
    type Err = ParsePieceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P"|"p" => Ok(Piece::Pawn),
            "N"|"n" => Ok(Piece::Knight),
            "B"|"b" => Ok(Piece::Bishop),
            "R"|"r" => Ok(Piece::Rook),
            "Q"|"q" => Ok(Piece::Queen),
            "K"|"k" => Ok(Piece::King),
            _       => Err(ParsePieceError),
        }
    }
}

impl Default for Piece {
    fn default() -> Self {
        Piece::Pawn
    }
}

impl TryFrom<usize> for Piece {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value < Self::COUNT {
            unsafe { Ok(mem::transmute::<u8, Piece>(value as u8)) }
        } else {
            Err(TryFromIntError)
        }
    }
}

impl From<Piece> for usize {
    fn from(value: Piece) -> Self {
        value as Self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Vertical column of the board, labeled from left to right from `White`'s perspective as
/// `A` through `H`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum File {
    // discriminants are spelled out so nothing can go wrong when we use transmute later
    A = 0, B = 1, C = 2, D = 3, E = 4, F = 5, G = 6, H = 7,
}

impl File {
    /// The number of files
    pub const COUNT: usize = File::H as usize + 1;
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            File::A => "a",
            File::B => "b",
            File::C => "c",
            File::D => "d",
            File::E => "e",
            File::F => "f",
            File::G => "g",
            File::H => "h",
        }.fmt(f)
    }
}

impl FromStr for File {
    type Err = ParseFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a"|"A" => Ok(File::A),
            "b"|"B" => Ok(File::B),
            "c"|"C" => Ok(File::C),
            "d"|"D" => Ok(File::D),
            "e"|"E" => Ok(File::E),
            "f"|"F" => Ok(File::F),
            "g"|"G" => Ok(File::G),
            "h"|"H" => Ok(File::H),
            _       => Err(ParseFileError),
        }
    }
}

impl TryFrom<usize> for File {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value < Self::COUNT {
            unsafe { Ok(mem::transmute::<u8, File>(value as u8)) }
        } else {
            Err(TryFromIntError)
        }
    }
}

impl From<File> for usize {
    fn from(value: File) -> Self {
        value as Self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Horizontal row of the board, labeled from nearest to farthest from `White`'s perspective
/// as `R1` through `R8`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Rank {
    // discriminants are spelled out so nothing can go wrong when we use transmute later
    R1 = 0, R2 = 1, R3 = 2, R4 = 3, R5 = 4, R6 = 5, R7 = 6, R8 = 7,
}

impl Rank {
    /// The number of ranks
    pub const COUNT: usize = Rank::R8 as usize + 1;
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ((*self as usize) + 1).fmt(f)
    }
}

impl FromStr for Rank {
    type Err = ParseRankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Rank::R1),
            "2" => Ok(Rank::R2),
            "3" => Ok(Rank::R3),
            "4" => Ok(Rank::R4),
            "5" => Ok(Rank::R5),
            "6" => Ok(Rank::R6),
            "7" => Ok(Rank::R7),
            "8" => Ok(Rank::R8),
            _   => Err(ParseRankError),
        }
    }
}

impl TryFrom<usize> for Rank {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value < Self::COUNT {
            unsafe { Ok(mem::transmute::<u8, Rank>(value as u8)) }
        } else {
            Err(TryFromIntError)
        }
    }
}

impl From<Rank> for usize {
    fn from(value: Rank) -> Self {
        value as Self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A specific square on the board, labeled using the `File` and `Rank` as coordinates.
///
/// Squares are numbered row-major from the top of the board as `White` sees it, so that
/// `A8` is index 0 and `H1` is index 63. This is the indexing the mailbox move generator
/// and the piece-square tables are written in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Square {
    // discriminants are spelled out so nothing can go wrong when we use transmute later
    A8 =  0, B8 =  1, C8 =  2, D8 =  3, E8 =  4, F8 =  5, G8 =  6, H8 =  7,
    A7 =  8, B7 =  9, C7 = 10, D7 = 11, E7 = 12, F7 = 13, G7 = 14, H7 = 15,
    A6 = 16, B6 = 17, C6 = 18, D6 = 19, E6 = 20, F6 = 21, G6 = 22, H6 = 23,
    A5 = 24, B5 = 25, C5 = 26, D5 = 27, E5 = 28, F5 = 29, G5 = 30, H5 = 31,
    A4 = 32, B4 = 33, C4 = 34, D4 = 35, E4 = 36, F4 = 37, G4 = 38, H4 = 39,
    A3 = 40, B3 = 41, C3 = 42, D3 = 43, E3 = 44, F3 = 45, G3 = 46, H3 = 47,
    A2 = 48, B2 = 49, C2 = 50, D2 = 51, E2 = 52, F2 = 53, G2 = 54, H2 = 55,
    A1 = 56, B1 = 57, C1 = 58, D1 = 59, E1 = 60, F1 = 61, G1 = 62, H1 = 63,
}

impl Square {
    /// The number of squares
    pub const COUNT: usize = Square::H1 as usize + 1;

    /// Returns a square from its file and rank
    pub fn from_coord(file: File, rank: Rank) -> Square {
        Square::try_from((7 - rank as usize)*8 + file as usize).expect("INFALLIBLE")
    }

    /// Returns a square from its row and column indices
    pub fn from_row_col(row: usize, col: usize) -> Option<Square> {
        if row < 8 && col < 8 {
            Some(Square::try_from(row*8 + col).expect("INFALLIBLE"))
        } else {
            None
        }
    }

    /// Returns the square's file
    pub fn file(self) -> File {
        File::try_from(self.col()).expect("INFALLIBLE")
    }

    /// Returns the square's rank
    pub fn rank(self) -> Rank {
        Rank::try_from(7 - self.row()).expect("INFALLIBLE")
    }

    /// Returns the square's row index (0 is the 8th rank, 7 is the 1st)
    pub fn row(self) -> usize {
        (self as usize) >> 3
    }

    /// Returns the square's column index (0 is the a-file)
    pub fn col(self) -> usize {
        (self as usize) & 7
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.file().to_string() + &self.rank().to_string()).fmt(f)
    }
}

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c: Vec<_> = s.chars().collect();
        if c.len() == 2 {
            Ok(Square::from_coord(c[0].to_string().parse()?, c[1].to_string().parse()?))
        } else {
            Err(ParseSquareError)
        }
    }
}

impl TryFrom<usize> for Square {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value < Self::COUNT {
            unsafe { Ok(mem::transmute::<u8, Square>(value as u8)) }
        } else {
            Err(TryFromIntError)
        }
    }
}

impl From<Square> for usize {
    fn from(value: Square) -> Self {
        value as Self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
mod board;
pub use board::{Board, CastlingRights};
mod moves;
pub use moves::Move;
pub mod movegen;
mod zobrist;
pub use zobrist::Zobrist;

pub mod variations;

pub mod error;

#[cfg(test)]
mod color_tests {
    use std::convert::TryFrom;
    use super::Color;

    #[test]
    fn display_and_fromstr_traits_work() {
        assert_eq!(format!("{}", Color::White), "w");
        assert_eq!(format!("{}", Color::Black), "b");
        assert_eq!("w".parse::<Color>().unwrap(), Color::White);
        assert_eq!("b".parse::<Color>().unwrap(), Color::Black);
        assert!("x".parse::<Color>().is_err());
    }

    #[test]
    fn usize_conversions_are_consistent() {
        assert_eq!(usize::from(Color::White), 0);
        assert_eq!(usize::from(Color::Black), 1);
        assert_eq!(Color::try_from(0).unwrap(), Color::White);
        assert_eq!(Color::try_from(1).unwrap(), Color::Black);
        assert!(Color::try_from(2).is_err());
    }
}
