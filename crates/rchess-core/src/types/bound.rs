//! 境界値種別（Bound）

use super::Value;

/// 境界値種別（置換表に格納する値の種類）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Bound {
    /// なし
    #[default]
    None = 0,
    /// 上界（fail-low: 真の値はこれ以下）
    Upper = 1,
    /// 下界（fail-high: 真の値はこれ以上）
    Lower = 2,
    /// 正確な値
    Exact = 3,
}

impl Bound {
    /// TTカットオフ判定に使用
    ///
    /// 値がbetaと比較して、この境界で値を信用できるか。
    #[inline]
    pub const fn can_cutoff(self, value: Value, beta: Value) -> bool {
        let bit = if value.raw() >= beta.raw() { Bound::Lower as u8 } else { Bound::Upper as u8 };
        (self as u8) & bit != 0
    }

    /// 下界を含むか
    #[inline]
    pub const fn is_lower(self) -> bool {
        (self as u8) & (Bound::Lower as u8) != 0
    }

    /// 上界を含むか
    #[inline]
    pub const fn is_upper(self) -> bool {
        (self as u8) & (Bound::Upper as u8) != 0
    }

    /// u8から変換
    #[inline]
    pub const fn from_u8(n: u8) -> Bound {
        match n & 3 {
            0 => Bound::None,
            1 => Bound::Upper,
            2 => Bound::Lower,
            _ => Bound::Exact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_from_u8() {
        assert_eq!(Bound::from_u8(0), Bound::None);
        assert_eq!(Bound::from_u8(1), Bound::Upper);
        assert_eq!(Bound::from_u8(2), Bound::Lower);
        assert_eq!(Bound::from_u8(3), Bound::Exact);
    }

    #[test]
    fn test_bound_can_cutoff() {
        let beta = Value::new(100);
        assert!(Bound::Lower.can_cutoff(Value::new(150), beta));
        assert!(!Bound::Lower.can_cutoff(Value::new(50), beta));
        assert!(Bound::Upper.can_cutoff(Value::new(50), beta));
        assert!(!Bound::Upper.can_cutoff(Value::new(150), beta));
        assert!(Bound::Exact.can_cutoff(Value::new(50), beta));
        assert!(!Bound::None.can_cutoff(Value::new(150), beta));
    }
}
