//! 評価値（Value）と駒の価値
//!
//! `Value::MATE` 付近を詰みスコアとして予約している。
//! 通常の評価値は [-MATE_IN_MAX_PLY, MATE_IN_MAX_PLY] の範囲で用いる。

use super::{PieceType, MAX_PLY};

/// 評価値
///
/// 通常の局面評価と、詰み表現（`mate_in` / `mated_in`）を同一の整数スケールで扱う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Value(i32);

impl Value {
    /// ゼロ
    pub const ZERO: Value = Value(0);
    /// 引き分け
    pub const DRAW: Value = Value(0);
    /// 勝ちが確定的な評価値
    pub const KNOWN_WIN: Value = Value(10000);
    /// 詰み（勝ち側の最大スコア）
    pub const MATE: Value = Value(32000);
    /// 無限大
    pub const INFINITE: Value = Value(32001);
    /// 無効値
    pub const NONE: Value = Value(32002);

    /// 最大探索深度内での詰みスコア
    pub const MATE_IN_MAX_PLY: Value = Value(Self::MATE.0 - MAX_PLY);
    /// 最大探索深度内での詰まされスコア
    pub const MATED_IN_MAX_PLY: Value = Value(-Self::MATE_IN_MAX_PLY.0);

    /// ポーンの終盤価値
    ///
    /// UCI `score cp` 出力時に `100 * value / PAWN_VALUE` で正規化するために使用。
    pub const PAWN_VALUE: i32 = PAWN_VALUE_EG;

    /// 値から生成
    #[inline]
    pub const fn new(v: i32) -> Value {
        Value(v)
    }

    /// ply手で詰ますスコア
    #[inline]
    pub const fn mate_in(ply: i32) -> Value {
        Value(Self::MATE.0 - ply)
    }

    /// ply手で詰まされるスコア
    #[inline]
    pub const fn mated_in(ply: i32) -> Value {
        Value(-Self::MATE.0 + ply)
    }

    /// 勝ちスコアかどうか
    #[inline]
    pub const fn is_win(self) -> bool {
        self.0 >= Self::MATE_IN_MAX_PLY.0
    }

    /// 負けスコアかどうか
    #[inline]
    pub const fn is_loss(self) -> bool {
        self.0 <= Self::MATED_IN_MAX_PLY.0
    }

    /// 詰みスコア（勝ちまたは負け）かどうか
    #[inline]
    pub const fn is_mate_score(self) -> bool {
        self.is_win() || self.is_loss()
    }

    /// 生の値を取得
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// 詰み手数（plyでなく手数、負なら詰まされ）
    ///
    /// 詰みスコアでない場合は0。
    #[inline]
    pub const fn mate_moves(self) -> i32 {
        if self.is_win() {
            (Self::MATE.0 - self.0 + 1) / 2
        } else if self.is_loss() {
            (-Self::MATE.0 - self.0) / 2
        } else {
            0
        }
    }

    /// 内部値をUCI centipawn値に変換
    #[inline]
    pub const fn to_cp(self) -> i32 {
        100 * self.0 / Self::PAWN_VALUE
    }
}

impl std::ops::Neg for Value {
    type Output = Value;

    #[inline]
    fn neg(self) -> Value {
        Value(-self.0)
    }
}

impl std::ops::Add for Value {
    type Output = Value;

    #[inline]
    fn add(self, rhs: Value) -> Value {
        Value(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Value {
    type Output = Value;

    #[inline]
    fn sub(self, rhs: Value) -> Value {
        Value(self.0 - rhs.0)
    }
}

impl std::ops::Add<i32> for Value {
    type Output = Value;

    #[inline]
    fn add(self, rhs: i32) -> Value {
        Value(self.0 + rhs)
    }
}

impl std::ops::Sub<i32> for Value {
    type Output = Value;

    #[inline]
    fn sub(self, rhs: i32) -> Value {
        Value(self.0 - rhs)
    }
}

impl std::ops::AddAssign for Value {
    #[inline]
    fn add_assign(&mut self, rhs: Value) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Value {
    #[inline]
    fn sub_assign(&mut self, rhs: Value) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul<i32> for Value {
    type Output = Value;

    #[inline]
    fn mul(self, rhs: i32) -> Value {
        Value(self.0 * rhs)
    }
}

impl std::ops::Div<i32> for Value {
    type Output = Value;

    #[inline]
    fn div(self, rhs: i32) -> Value {
        Value(self.0 / rhs)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value(v)
    }
}

// =============================================================================
// 駒の価値
// =============================================================================

pub const PAWN_VALUE_MG: i32 = 126;
pub const PAWN_VALUE_EG: i32 = 208;
pub const KNIGHT_VALUE_MG: i32 = 781;
pub const KNIGHT_VALUE_EG: i32 = 854;
pub const BISHOP_VALUE_MG: i32 = 825;
pub const BISHOP_VALUE_EG: i32 = 915;
pub const ROOK_VALUE_MG: i32 = 1276;
pub const ROOK_VALUE_EG: i32 = 1380;
pub const QUEEN_VALUE_MG: i32 = 2538;
pub const QUEEN_VALUE_EG: i32 = 2682;

/// 中盤の駒価値（SEE・MVV・非ポーン駒の物量に使用）
#[inline]
pub const fn piece_value_mg(pt: PieceType) -> i32 {
    match pt {
        PieceType::Pawn => PAWN_VALUE_MG,
        PieceType::Knight => KNIGHT_VALUE_MG,
        PieceType::Bishop => BISHOP_VALUE_MG,
        PieceType::Rook => ROOK_VALUE_MG,
        PieceType::Queen => QUEEN_VALUE_MG,
        PieceType::King => 0,
    }
}

/// 終盤の駒価値
#[inline]
pub const fn piece_value_eg(pt: PieceType) -> i32 {
    match pt {
        PieceType::Pawn => PAWN_VALUE_EG,
        PieceType::Knight => KNIGHT_VALUE_EG,
        PieceType::Bishop => BISHOP_VALUE_EG,
        PieceType::Rook => ROOK_VALUE_EG,
        PieceType::Queen => QUEEN_VALUE_EG,
        PieceType::King => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_constants() {
        assert_eq!(Value::MATE.raw(), 32000);
        assert_eq!(Value::MATE_IN_MAX_PLY.raw(), 32000 - MAX_PLY);
        assert!(Value::INFINITE > Value::MATE);
    }

    #[test]
    fn test_mate_scores() {
        let v = Value::mate_in(5);
        assert!(v.is_win());
        assert_eq!(v.mate_moves(), 3);
        let v = Value::mated_in(4);
        assert!(v.is_loss());
        assert_eq!(v.mate_moves(), -2);
        assert!(!Value::new(500).is_mate_score());
    }

    #[test]
    fn test_to_cp() {
        assert_eq!(Value::new(PAWN_VALUE_EG).to_cp(), 100);
        assert_eq!(Value::new(-104).to_cp(), -50);
    }
}
