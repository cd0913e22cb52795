//! 近接駒の利きテーブル
//!
//! 盤端の折り返しを除いたポーン・桂・キングの利きをコンパイル時に計算する。

use crate::types::{Color, Square};

use super::{Bitboard, Direction};

/// ポーンの利き [Color][Square]
pub static PAWN_ATTACKS: [[Bitboard; Square::NUM]; Color::NUM] =
    [init_step_attacks(&[(-1, 1), (1, 1)]), init_step_attacks(&[(-1, -1), (1, -1)])];

/// 桂の利き [Square]
pub static KNIGHT_ATTACKS: [Bitboard; Square::NUM] = init_step_attacks(&[
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
]);

/// キングの利き [Square]
pub static KING_ATTACKS: [Bitboard; Square::NUM] = init_step_attacks(&[
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
]);

// === 初期化関数 ===

/// (筋の差, 段の差) の組から、盤内に収まる移動先を集める
const fn init_step_attacks(steps: &[(i32, i32)]) -> [Bitboard; Square::NUM] {
    let mut result = [Bitboard::EMPTY; Square::NUM];
    let mut sq = 0;
    while sq < 64 {
        let file = (sq & 7) as i32;
        let rank = (sq >> 3) as i32;
        let mut bits = 0u64;
        let mut i = 0;
        while i < steps.len() {
            let f = file + steps[i].0;
            let r = rank + steps[i].1;
            if f >= 0 && f < 8 && r >= 0 && r < 8 {
                bits |= 1u64 << (r * 8 + f);
            }
            i += 1;
        }
        result[sq] = Bitboard::new(bits);
        sq += 1;
    }
    result
}

// === アクセサ ===

/// ポーンの利き
#[inline]
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    PAWN_ATTACKS[color.index()][sq.index()]
}

/// 桂の利き
#[inline]
pub fn knight_attacks(sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[sq.index()]
}

/// キングの利き
#[inline]
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[sq.index()]
}

/// ポーンの集合が利いている升の集合
#[inline]
pub fn pawn_attacks_bb(color: Color, pawns: Bitboard) -> Bitboard {
    match color {
        Color::White => pawns.shift(Direction::NorthWest) | pawns.shift(Direction::NorthEast),
        Color::Black => pawns.shift(Direction::SouthWest) | pawns.shift(Direction::SouthEast),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knight_attacks() {
        assert_eq!(knight_attacks(Square::A1).count(), 2);
        assert_eq!(knight_attacks(Square::D4).count(), 8);
        assert!(knight_attacks(Square::G1).contains(Square::F3));
        assert!(!knight_attacks(Square::H1).contains(Square::A2));
    }

    #[test]
    fn test_king_attacks() {
        assert_eq!(king_attacks(Square::A1).count(), 3);
        assert_eq!(king_attacks(Square::E4).count(), 8);
        assert!(!king_attacks(Square::H4).contains(Square::A5));
    }

    #[test]
    fn test_pawn_attacks() {
        let w = pawn_attacks(Color::White, Square::E4);
        assert!(w.contains(Square::D5) && w.contains(Square::F5));
        let b = pawn_attacks(Color::Black, Square::A5);
        assert_eq!(b, Bitboard::from_square(Square::B4));
        // 集合版と升版が一致する
        for sq in Square::all() {
            for c in Color::ALL {
                assert_eq!(pawn_attacks_bb(c, Bitboard::from_square(sq)), pawn_attacks(c, sq));
            }
        }
    }
}
