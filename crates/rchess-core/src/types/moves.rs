//! 指し手（Move）

use std::fmt;

use super::{File, PieceType, Square};

/// 指し手の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MoveType {
    Normal = 0,
    Promotion = 1 << 14,
    EnPassant = 2 << 14,
    Castling = 3 << 14,
}

/// 指し手（16bit）
///
/// - bit 0-5:   移動先 (to)
/// - bit 6-11:  移動元 (from)
/// - bit 12-13: 成り駒種（Knight=0 .. Queen=3）
/// - bit 14-15: 指し手の種類（MoveType）
///
/// キャスリングは「キングが自分のルークを取る」形でエンコードする。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// 無効な指し手
    pub const NONE: Move = Move(0);
    /// 探索用 null move（from == to == b1）
    pub const NULL: Move = Move(65);

    const TYPE_MASK: u16 = 3 << 14;

    /// 通常の指し手を生成
    #[inline]
    pub const fn new(from: Square, to: Square) -> Move {
        Move(((from.raw() as u16) << 6) | to.raw() as u16)
    }

    /// 特殊な指し手を生成
    ///
    /// `promotion` は `MoveType::Promotion` のときのみ意味を持つ。
    #[inline]
    pub const fn new_special(
        move_type: MoveType,
        from: Square,
        to: Square,
        promotion: PieceType,
    ) -> Move {
        let promo_bits = match move_type {
            MoveType::Promotion => ((promotion as u16) - PieceType::Knight as u16) << 12,
            _ => 0,
        };
        Move(move_type as u16 | promo_bits | ((from.raw() as u16) << 6) | to.raw() as u16)
    }

    /// 成りの指し手を生成
    #[inline]
    pub const fn new_promotion(from: Square, to: Square, promotion: PieceType) -> Move {
        Move::new_special(MoveType::Promotion, from, to, promotion)
    }

    /// 16bit値から復元（置換表などから）
    #[inline]
    pub const fn from_u16(v: u16) -> Move {
        Move(v)
    }

    /// 16bit値
    #[inline]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// 移動元
    #[inline]
    pub const fn from(self) -> Square {
        Square::from_u8_masked((self.0 >> 6) as u8)
    }

    /// 移動先
    #[inline]
    pub const fn to(self) -> Square {
        Square::from_u8_masked(self.0 as u8)
    }

    /// from/to を合わせたインデックス（0〜4095）
    #[inline]
    pub const fn from_to(self) -> usize {
        (self.0 & 0xFFF) as usize
    }

    /// 指し手の種類
    #[inline]
    pub const fn move_type(self) -> MoveType {
        match self.0 & Self::TYPE_MASK {
            0 => MoveType::Normal,
            0x4000 => MoveType::Promotion,
            0x8000 => MoveType::EnPassant,
            _ => MoveType::Castling,
        }
    }

    /// 成り駒種（成りでない場合も Knight..Queen のいずれかを返す）
    #[inline]
    pub const fn promotion_type(self) -> PieceType {
        match (self.0 >> 12) & 3 {
            0 => PieceType::Knight,
            1 => PieceType::Bishop,
            2 => PieceType::Rook,
            _ => PieceType::Queen,
        }
    }

    /// 成りか
    #[inline]
    pub const fn is_promotion(self) -> bool {
        matches!(self.move_type(), MoveType::Promotion)
    }

    /// 有効な指し手か（NONE/NULLでない）
    #[inline]
    pub const fn is_ok(self) -> bool {
        self.from().raw() != self.to().raw()
    }

    /// NONEでないか
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// NONEか
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// 長形式代数記法（UCI形式）に変換
    ///
    /// チェス960でない場合、キャスリングはキングの移動先（g筋/c筋）で表す。
    pub fn to_uci(self, chess960: bool) -> String {
        if self == Move::NONE {
            return "(none)".to_string();
        }
        if self == Move::NULL {
            return "0000".to_string();
        }
        let from = self.from();
        let mut to = self.to();
        if self.move_type() == MoveType::Castling && !chess960 {
            let file = if to > from { File::FileG } else { File::FileC };
            to = Square::new(file, from.rank());
        }
        let mut s = format!("{from}{to}");
        if self.is_promotion() {
            s.push(self.promotion_type().to_char());
        }
        s
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({})", self.to_uci(true))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci(false))
    }
}
