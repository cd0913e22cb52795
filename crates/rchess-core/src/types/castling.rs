//! キャスリング権（CastlingRights）

use super::Color;

/// キャスリング権（4bitのフラグ集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct CastlingRights(u8);

impl CastlingRights {
    /// 組み合わせの数（Zobrist配列サイズ）
    pub const NUM: usize = 16;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const WHITE_OO: CastlingRights = CastlingRights(1);
    pub const WHITE_OOO: CastlingRights = CastlingRights(2);
    pub const BLACK_OO: CastlingRights = CastlingRights(4);
    pub const BLACK_OOO: CastlingRights = CastlingRights(8);
    pub const WHITE: CastlingRights = CastlingRights(1 | 2);
    pub const BLACK: CastlingRights = CastlingRights(4 | 8);
    pub const ALL: CastlingRights = CastlingRights(15);

    /// 単一の権利4つ（配列インデックス順）
    pub const SINGLES: [CastlingRights; 4] = [
        CastlingRights::WHITE_OO,
        CastlingRights::WHITE_OOO,
        CastlingRights::BLACK_OO,
        CastlingRights::BLACK_OOO,
    ];

    /// 手番とサイドから単一の権利を得る
    #[inline]
    pub const fn single(color: Color, king_side: bool) -> CastlingRights {
        let base = match color {
            Color::White => 1,
            Color::Black => 4,
        };
        CastlingRights(if king_side { base } else { base << 1 })
    }

    /// 手番の権利全体
    #[inline]
    pub const fn of_color(color: Color) -> CastlingRights {
        match color {
            Color::White => CastlingRights::WHITE,
            Color::Black => CastlingRights::BLACK,
        }
    }

    /// u8から生成
    #[inline]
    pub const fn from_bits(bits: u8) -> CastlingRights {
        CastlingRights(bits & 15)
    }

    /// 内部値
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// インデックスとして使用（0〜15）
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// 単一の権利の配列インデックス（0〜3）
    ///
    /// 単一の権利以外に対して呼んではならない。
    #[inline]
    pub const fn single_index(self) -> usize {
        self.0.trailing_zeros() as usize
    }

    /// 権利が1つもないか
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 指定の権利を含むか
    #[inline]
    pub const fn contains(self, other: CastlingRights) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for CastlingRights {
    type Output = CastlingRights;

    #[inline]
    fn bitor(self, rhs: CastlingRights) -> CastlingRights {
        CastlingRights(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for CastlingRights {
    #[inline]
    fn bitor_assign(&mut self, rhs: CastlingRights) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for CastlingRights {
    type Output = CastlingRights;

    #[inline]
    fn bitand(self, rhs: CastlingRights) -> CastlingRights {
        CastlingRights(self.0 & rhs.0)
    }
}

impl std::ops::Not for CastlingRights {
    type Output = CastlingRights;

    #[inline]
    fn not(self) -> CastlingRights {
        CastlingRights(!self.0 & 15)
    }
}

impl std::ops::BitAndAssign for CastlingRights {
    #[inline]
    fn bitand_assign(&mut self, rhs: CastlingRights) {
        self.0 &= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single() {
        assert_eq!(CastlingRights::single(Color::White, true), CastlingRights::WHITE_OO);
        assert_eq!(CastlingRights::single(Color::Black, false), CastlingRights::BLACK_OOO);
        assert_eq!(CastlingRights::BLACK_OOO.single_index(), 3);
    }

    #[test]
    fn test_ops() {
        let mut cr = CastlingRights::ALL;
        cr &= !CastlingRights::WHITE;
        assert_eq!(cr, CastlingRights::BLACK);
        assert!(cr.contains(CastlingRights::BLACK_OO));
        assert!(!cr.contains(CastlingRights::WHITE_OOO));
    }
}
