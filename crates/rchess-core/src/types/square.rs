//! 筋（File）・段（Rank）・升（Square）
//!
//! 升の番号は a1 = 0, b1 = 1, ..., h8 = 63（リトルエンディアン・ランクファイル）。

use std::fmt;
use std::str::FromStr;

use super::Color;

/// 筋（a〜h）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum File {
    FileA = 0,
    FileB = 1,
    FileC = 2,
    FileD = 3,
    FileE = 4,
    FileF = 5,
    FileG = 6,
    FileH = 7,
}

impl File {
    /// 筋の数
    pub const NUM: usize = 8;

    /// 全ての筋
    pub const ALL: [File; 8] = [
        File::FileA,
        File::FileB,
        File::FileC,
        File::FileD,
        File::FileE,
        File::FileF,
        File::FileG,
        File::FileH,
    ];

    /// u8からFileに変換
    #[inline]
    pub const fn from_u8(n: u8) -> Option<File> {
        if n < 8 { Some(Self::ALL[n as usize]) } else { None }
    }

    /// インデックスとして使用
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 文字（'a'-'h'）に変換
    #[inline]
    pub const fn to_char(self) -> char {
        (b'a' + self as u8) as char
    }

    /// 文字（'a'-'h'）から変換
    #[inline]
    pub const fn from_char(c: char) -> Option<File> {
        match c {
            'a'..='h' => File::from_u8(c as u8 - b'a'),
            _ => None,
        }
    }
}

/// 段（1〜8）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Rank {
    Rank1 = 0,
    Rank2 = 1,
    Rank3 = 2,
    Rank4 = 3,
    Rank5 = 4,
    Rank6 = 5,
    Rank7 = 6,
    Rank8 = 7,
}

impl Rank {
    /// 段の数
    pub const NUM: usize = 8;

    /// 全ての段
    pub const ALL: [Rank; 8] = [
        Rank::Rank1,
        Rank::Rank2,
        Rank::Rank3,
        Rank::Rank4,
        Rank::Rank5,
        Rank::Rank6,
        Rank::Rank7,
        Rank::Rank8,
    ];

    /// u8からRankに変換
    #[inline]
    pub const fn from_u8(n: u8) -> Option<Rank> {
        if n < 8 { Some(Self::ALL[n as usize]) } else { None }
    }

    /// 相対段（白から見た段）
    #[inline]
    pub const fn relative(self, color: Color) -> Rank {
        match color {
            Color::White => self,
            Color::Black => Self::ALL[7 - self as usize],
        }
    }

    /// インデックスとして使用
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 文字（'1'-'8'）に変換
    #[inline]
    pub const fn to_char(self) -> char {
        (b'1' + self as u8) as char
    }

    /// 文字（'1'-'8'）から変換
    #[inline]
    pub const fn from_char(c: char) -> Option<Rank> {
        match c {
            '1'..='8' => Rank::from_u8(c as u8 - b'1'),
            _ => None,
        }
    }
}

/// 升（0〜63）
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Square(u8);

macro_rules! square_consts {
    ($($name:ident = $v:expr),* $(,)?) => {
        impl Square {
            $(pub const $name: Square = Square($v);)*
        }
    };
}

square_consts! {
    A1 = 0, B1 = 1, C1 = 2, D1 = 3, E1 = 4, F1 = 5, G1 = 6, H1 = 7,
    A2 = 8, B2 = 9, C2 = 10, D2 = 11, E2 = 12, F2 = 13, G2 = 14, H2 = 15,
    A3 = 16, B3 = 17, C3 = 18, D3 = 19, E3 = 20, F3 = 21, G3 = 22, H3 = 23,
    A4 = 24, B4 = 25, C4 = 26, D4 = 27, E4 = 28, F4 = 29, G4 = 30, H4 = 31,
    A5 = 32, B5 = 33, C5 = 34, D5 = 35, E5 = 36, F5 = 37, G5 = 38, H5 = 39,
    A6 = 40, B6 = 41, C6 = 42, D6 = 43, E6 = 44, F6 = 45, G6 = 46, H6 = 47,
    A7 = 48, B7 = 49, C7 = 50, D7 = 51, E7 = 52, F7 = 53, G7 = 54, H7 = 55,
    A8 = 56, B8 = 57, C8 = 58, D8 = 59, E8 = 60, F8 = 61, G8 = 62, H8 = 63,
}

impl Square {
    /// 升の数
    pub const NUM: usize = 64;

    /// 筋と段から生成
    #[inline]
    pub const fn new(file: File, rank: Rank) -> Square {
        Square((rank as u8) << 3 | file as u8)
    }

    /// u8から生成（範囲チェックあり）
    #[inline]
    pub const fn from_u8(n: u8) -> Option<Square> {
        if n < 64 { Some(Square(n)) } else { None }
    }

    /// u8から生成（範囲チェックなし、上位ビットはマスクする）
    #[inline]
    pub const fn from_u8_masked(n: u8) -> Square {
        Square(n & 63)
    }

    /// 内部値
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// インデックスとして使用
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// 筋
    #[inline]
    pub const fn file(self) -> File {
        File::ALL[(self.0 & 7) as usize]
    }

    /// 段
    #[inline]
    pub const fn rank(self) -> Rank {
        Rank::ALL[(self.0 >> 3) as usize]
    }

    /// 相対段
    #[inline]
    pub const fn relative_rank(self, color: Color) -> Rank {
        self.rank().relative(color)
    }

    /// 手番から見た相対升（黒なら上下反転）
    #[inline]
    pub const fn relative(self, color: Color) -> Square {
        match color {
            Color::White => self,
            Color::Black => Square(self.0 ^ 56),
        }
    }

    /// 方向を加算（盤外チェックなし）
    #[inline]
    pub const fn offset(self, delta: i8) -> Square {
        Square((self.0 as i8 + delta) as u8 & 63)
    }

    /// 盤上をはみ出さずに移動できるならその升を返す
    ///
    /// 筋が2以上ずれる移動（盤端の折り返し）はNone。
    #[inline]
    pub fn try_offset(self, delta: i8) -> Option<Square> {
        let to = self.0 as i16 + delta as i16;
        if !(0..64).contains(&to) {
            return None;
        }
        let to = Square(to as u8);
        if self.file_distance(to) <= 2 { Some(to) } else { None }
    }

    /// 筋の差
    #[inline]
    pub const fn file_distance(self, other: Square) -> u8 {
        (self.0 & 7).abs_diff(other.0 & 7)
    }

    /// 段の差
    #[inline]
    pub const fn rank_distance(self, other: Square) -> u8 {
        (self.0 >> 3).abs_diff(other.0 >> 3)
    }

    /// チェビシェフ距離
    #[inline]
    pub const fn distance(self, other: Square) -> u8 {
        let f = self.file_distance(other);
        let r = self.rank_distance(other);
        if f > r { f } else { r }
    }

    /// 全ての升を列挙
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64u8).map(Square)
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file().to_char(), self.rank().to_char())
    }
}

impl FromStr for Square {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let file = chars.next().and_then(File::from_char).ok_or(())?;
        let rank = chars.next().and_then(Rank::from_char).ok_or(())?;
        if chars.next().is_some() {
            return Err(());
        }
        Ok(Square::new(file, rank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_file_rank() {
        assert_eq!(Square::E4.file(), File::FileE);
        assert_eq!(Square::E4.rank(), Rank::Rank4);
        assert_eq!(Square::new(File::FileH, Rank::Rank8), Square::H8);
    }

    #[test]
    fn test_square_relative() {
        assert_eq!(Square::E2.relative(Color::Black), Square::E7);
        assert_eq!(Square::A1.relative_rank(Color::Black), Rank::Rank8);
    }

    #[test]
    fn test_square_parse_display() {
        let sq: Square = "g7".parse().unwrap();
        assert_eq!(sq, Square::G7);
        assert_eq!(sq.to_string(), "g7");
        assert!("i1".parse::<Square>().is_err());
        assert!("a9".parse::<Square>().is_err());
        assert!("a1x".parse::<Square>().is_err());
    }

    #[test]
    fn test_try_offset_wraps() {
        // h筋から右への移動は盤外
        assert_eq!(Square::H1.try_offset(1), None);
        assert_eq!(Square::A1.try_offset(-1), None);
        assert_eq!(Square::B1.try_offset(15), Some(Square::A3));
        assert_eq!(Square::A1.try_offset(6), None);
    }

    #[test]
    fn test_distance() {
        assert_eq!(Square::A1.distance(Square::H8), 7);
        assert_eq!(Square::E4.distance(Square::F6), 2);
    }
}
