//! ビットボードモジュール
//!
//! 64マスの盤面を64bitで表現し、高速なビット演算と利き計算を提供する。
//!
//! - `Bitboard`: 64bit盤面表現（bit i = 升 i、a1 = 0）
//! - 筋・段ごとのマスク（`FILE_BB`, `RANK_BB`）
//! - 近接駒の利きテーブル（ポーン・桂・キング）
//! - 遠方駒の利き計算（マジックビットボード、`between_bb` / `line_bb` など）

mod sliders;
mod tables;

pub use sliders::*;
pub use tables::*;

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not, Sub};

use crate::types::{Color, File, Rank, Square};

/// 64bit盤面表現
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Bitboard(u64);

impl Bitboard {
    /// 空
    pub const EMPTY: Bitboard = Bitboard(0);
    /// 全升
    pub const ALL: Bitboard = Bitboard(!0);

    /// 生の値から生成
    #[inline]
    pub const fn new(bits: u64) -> Bitboard {
        Bitboard(bits)
    }

    /// 1升だけのBitboard
    #[inline]
    pub const fn from_square(sq: Square) -> Bitboard {
        Bitboard(1u64 << sq.raw())
    }

    /// 生の値
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// 升が含まれているか
    #[inline]
    pub const fn contains(self, sq: Square) -> bool {
        self.0 & (1u64 << sq.raw()) != 0
    }

    /// 升を追加
    #[inline]
    pub fn set(&mut self, sq: Square) {
        self.0 |= 1u64 << sq.raw();
    }

    /// 升を除去
    #[inline]
    pub fn clear(&mut self, sq: Square) {
        self.0 &= !(1u64 << sq.raw());
    }

    /// 空か
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 空でないか
    #[inline]
    pub const fn is_not_empty(self) -> bool {
        self.0 != 0
    }

    /// 立っているビット数
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// 2つ以上立っているか
    #[inline]
    pub const fn more_than_one(self) -> bool {
        self.0 & self.0.wrapping_sub(1) != 0
    }

    /// 最下位ビットの升（空でないこと）
    #[inline]
    pub const fn lsb(self) -> Square {
        debug_assert!(self.0 != 0);
        Square::from_u8_masked(self.0.trailing_zeros() as u8)
    }

    /// 最上位ビットの升（空でないこと）
    #[inline]
    pub const fn msb(self) -> Square {
        debug_assert!(self.0 != 0);
        Square::from_u8_masked(63 - self.0.leading_zeros() as u8)
    }

    /// 最下位ビットを取り出して除去する
    #[inline]
    pub fn pop_lsb(&mut self) -> Square {
        let sq = self.lsb();
        self.0 &= self.0 - 1;
        sq
    }

    /// 手番から見て最も手前の升
    #[inline]
    pub const fn frontmost(self, color: Color) -> Square {
        match color {
            Color::White => self.msb(),
            Color::Black => self.lsb(),
        }
    }

    /// 1升ずらす（盤端の折り返しは除去する）
    #[inline]
    pub const fn shift(self, dir: Direction) -> Bitboard {
        const NOT_A: u64 = !FILE_A;
        const NOT_H: u64 = !FILE_H;
        Bitboard(match dir {
            Direction::North => self.0 << 8,
            Direction::South => self.0 >> 8,
            Direction::East => (self.0 & NOT_H) << 1,
            Direction::West => (self.0 & NOT_A) >> 1,
            Direction::NorthEast => (self.0 & NOT_H) << 9,
            Direction::NorthWest => (self.0 & NOT_A) << 7,
            Direction::SouthEast => (self.0 & NOT_H) >> 7,
            Direction::SouthWest => (self.0 & NOT_A) >> 9,
        })
    }

    /// 手番から見て前方に1升ずらす
    #[inline]
    pub const fn shift_up(self, color: Color) -> Bitboard {
        match color {
            Color::White => self.shift(Direction::North),
            Color::Black => self.shift(Direction::South),
        }
    }

    /// イテレータ
    #[inline]
    pub fn iter(self) -> BitboardIter {
        BitboardIter(self.0)
    }
}

/// Bitboardの升を下位から順に列挙するイテレータ
pub struct BitboardIter(u64);

impl Iterator for BitboardIter {
    type Item = Square;

    #[inline]
    fn next(&mut self) -> Option<Square> {
        if self.0 == 0 {
            return None;
        }
        let sq = Square::from_u8_masked(self.0.trailing_zeros() as u8);
        self.0 &= self.0 - 1;
        Some(sq)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl IntoIterator for Bitboard {
    type Item = Square;
    type IntoIter = BitboardIter;

    #[inline]
    fn into_iter(self) -> BitboardIter {
        self.iter()
    }
}

/// 盤上の8方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

// =============================================================================
// 演算子
// =============================================================================

macro_rules! impl_bit_ops {
    ($trait:ident, $fn:ident, $assign_trait:ident, $assign_fn:ident, $op:tt) => {
        impl $trait for Bitboard {
            type Output = Bitboard;

            #[inline]
            fn $fn(self, rhs: Bitboard) -> Bitboard {
                Bitboard(self.0 $op rhs.0)
            }
        }

        impl $trait<Square> for Bitboard {
            type Output = Bitboard;

            #[inline]
            fn $fn(self, rhs: Square) -> Bitboard {
                Bitboard(self.0 $op (1u64 << rhs.raw()))
            }
        }

        impl $assign_trait for Bitboard {
            #[inline]
            fn $assign_fn(&mut self, rhs: Bitboard) {
                self.0 = self.0 $op rhs.0;
            }
        }

        impl $assign_trait<Square> for Bitboard {
            #[inline]
            fn $assign_fn(&mut self, rhs: Square) {
                self.0 = self.0 $op (1u64 << rhs.raw());
            }
        }
    };
}

impl_bit_ops!(BitAnd, bitand, BitAndAssign, bitand_assign, &);
impl_bit_ops!(BitOr, bitor, BitOrAssign, bitor_assign, |);
impl_bit_ops!(BitXor, bitxor, BitXorAssign, bitxor_assign, ^);

impl Not for Bitboard {
    type Output = Bitboard;

    #[inline]
    fn not(self) -> Bitboard {
        Bitboard(!self.0)
    }
}

/// 差集合（`a & !b`）
impl Sub for Bitboard {
    type Output = Bitboard;

    #[inline]
    fn sub(self, rhs: Bitboard) -> Bitboard {
        Bitboard(self.0 & !rhs.0)
    }
}

impl From<Square> for Bitboard {
    #[inline]
    fn from(sq: Square) -> Bitboard {
        Bitboard::from_square(sq)
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bitboard({:#018x})", self.0)?;
        for rank in Rank::ALL.iter().rev() {
            for file in File::ALL {
                let c = if self.contains(Square::new(file, *rank)) { 'X' } else { '.' };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// =============================================================================
// 筋・段のマスク
// =============================================================================

const FILE_A: u64 = 0x0101_0101_0101_0101;
const FILE_H: u64 = FILE_A << 7;
const RANK_1: u64 = 0xFF;

/// 筋のBitboard
pub static FILE_BB: [Bitboard; File::NUM] = {
    let mut result = [Bitboard::EMPTY; File::NUM];
    let mut f = 0;
    while f < 8 {
        result[f] = Bitboard(FILE_A << f);
        f += 1;
    }
    result
};

/// 段のBitboard
pub static RANK_BB: [Bitboard; Rank::NUM] = {
    let mut result = [Bitboard::EMPTY; Rank::NUM];
    let mut r = 0;
    while r < 8 {
        result[r] = Bitboard(RANK_1 << (8 * r));
        r += 1;
    }
    result
};

/// 筋のBitboard
#[inline]
pub fn file_bb(file: File) -> Bitboard {
    FILE_BB[file.index()]
}

/// 段のBitboard
#[inline]
pub fn rank_bb(rank: Rank) -> Bitboard {
    RANK_BB[rank.index()]
}

/// 升の属する筋のBitboard
#[inline]
pub fn file_bb_of(sq: Square) -> Bitboard {
    FILE_BB[sq.file().index()]
}

/// 升の属する段のBitboard
#[inline]
pub fn rank_bb_of(sq: Square) -> Bitboard {
    RANK_BB[sq.rank().index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitboard_basic_ops() {
        let mut bb = Bitboard::EMPTY;
        bb.set(Square::E4);
        bb |= Square::A1;
        assert!(bb.contains(Square::E4));
        assert_eq!(bb.count(), 2);
        assert!(bb.more_than_one());
        assert_eq!(bb.lsb(), Square::A1);
        assert_eq!(bb.msb(), Square::E4);
        bb.clear(Square::A1);
        assert!(!bb.more_than_one());
    }

    #[test]
    fn test_bitboard_iter() {
        let bb = Bitboard::from_square(Square::H8) | Square::B2 | Square::C3;
        let squares: Vec<Square> = bb.iter().collect();
        assert_eq!(squares, vec![Square::B2, Square::C3, Square::H8]);
    }

    #[test]
    fn test_shift_no_wrap() {
        let h = file_bb(File::FileH);
        assert!(h.shift(Direction::East).is_empty());
        assert!(file_bb(File::FileA).shift(Direction::West).is_empty());
        assert_eq!(
            Bitboard::from_square(Square::E4).shift(Direction::NorthWest),
            Bitboard::from_square(Square::D5)
        );
        assert_eq!(rank_bb(Rank::Rank8).shift(Direction::North), Bitboard::EMPTY);
    }

    #[test]
    fn test_file_rank_bb() {
        assert_eq!(file_bb(File::FileA).count(), 8);
        assert_eq!(rank_bb(Rank::Rank1).raw(), 0xFF);
        assert!(file_bb_of(Square::C7).contains(Square::C1));
        assert!(rank_bb_of(Square::C7).contains(Square::H7));
    }
}
