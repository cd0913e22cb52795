//! 駒種（PieceType）と駒（Piece）

use super::Color;

/// 駒種
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PieceType {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceType {
    /// 駒種の数
    pub const NUM: usize = 6;

    /// 全ての駒種
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    /// 成り先として選べる駒種（価値の高い順）
    pub const PROMOTIONS: [PieceType; 4] =
        [PieceType::Queen, PieceType::Rook, PieceType::Bishop, PieceType::Knight];

    /// u8から変換（1〜6）
    #[inline]
    pub const fn from_u8(n: u8) -> Option<PieceType> {
        match n {
            1 => Some(PieceType::Pawn),
            2 => Some(PieceType::Knight),
            3 => Some(PieceType::Bishop),
            4 => Some(PieceType::Rook),
            5 => Some(PieceType::Queen),
            6 => Some(PieceType::King),
            _ => None,
        }
    }

    /// インデックスとして使用（1〜6）
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 遠方駒か
    #[inline]
    pub const fn is_slider(self) -> bool {
        matches!(self, PieceType::Bishop | PieceType::Rook | PieceType::Queen)
    }

    /// FEN文字（白は大文字）
    #[inline]
    pub const fn to_char(self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }

    /// FEN文字から変換（大小文字は区別しない）
    #[inline]
    pub const fn from_char(c: char) -> Option<PieceType> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceType::Pawn),
            'n' => Some(PieceType::Knight),
            'b' => Some(PieceType::Bishop),
            'r' => Some(PieceType::Rook),
            'q' => Some(PieceType::Queen),
            'k' => Some(PieceType::King),
            _ => None,
        }
    }
}

/// 駒（手番付き）
///
/// 内部値は `color << 3 | piece_type`。0 は駒なし。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Piece(u8);

impl Piece {
    /// 駒の種類数（配列サイズ用、NONE含む）
    pub const NUM: usize = 16;

    /// 駒なし
    pub const NONE: Piece = Piece(0);

    pub const W_PAWN: Piece = Piece::new(Color::White, PieceType::Pawn);
    pub const W_KNIGHT: Piece = Piece::new(Color::White, PieceType::Knight);
    pub const W_BISHOP: Piece = Piece::new(Color::White, PieceType::Bishop);
    pub const W_ROOK: Piece = Piece::new(Color::White, PieceType::Rook);
    pub const W_QUEEN: Piece = Piece::new(Color::White, PieceType::Queen);
    pub const W_KING: Piece = Piece::new(Color::White, PieceType::King);
    pub const B_PAWN: Piece = Piece::new(Color::Black, PieceType::Pawn);
    pub const B_KNIGHT: Piece = Piece::new(Color::Black, PieceType::Knight);
    pub const B_BISHOP: Piece = Piece::new(Color::Black, PieceType::Bishop);
    pub const B_ROOK: Piece = Piece::new(Color::Black, PieceType::Rook);
    pub const B_QUEEN: Piece = Piece::new(Color::Black, PieceType::Queen);
    pub const B_KING: Piece = Piece::new(Color::Black, PieceType::King);

    /// 盤上に存在しうる全ての駒
    pub const ALL: [Piece; 12] = [
        Piece::W_PAWN,
        Piece::W_KNIGHT,
        Piece::W_BISHOP,
        Piece::W_ROOK,
        Piece::W_QUEEN,
        Piece::W_KING,
        Piece::B_PAWN,
        Piece::B_KNIGHT,
        Piece::B_BISHOP,
        Piece::B_ROOK,
        Piece::B_QUEEN,
        Piece::B_KING,
    ];

    /// 手番と駒種から生成
    #[inline]
    pub const fn new(color: Color, pt: PieceType) -> Piece {
        Piece(((color as u8) << 3) | pt as u8)
    }

    /// 駒なしか
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// 駒があるか
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// 駒種（駒なしの場合はNone）
    #[inline]
    pub const fn piece_type_opt(self) -> Option<PieceType> {
        PieceType::from_u8(self.0 & 7)
    }

    /// 駒種
    ///
    /// 駒なしに対して呼んではならない（debug時はpanic、release時はPawnを返す）。
    #[inline]
    pub const fn piece_type(self) -> PieceType {
        debug_assert!(self.0 != 0, "piece_type() called on Piece::NONE");
        match PieceType::from_u8(self.0 & 7) {
            Some(pt) => pt,
            None => PieceType::Pawn,
        }
    }

    /// 手番
    #[inline]
    pub const fn color(self) -> Color {
        if self.0 >> 3 == 0 { Color::White } else { Color::Black }
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

    /// FEN文字
    pub fn to_char(self) -> char {
        match self.piece_type_opt() {
            None => ' ',
            Some(pt) => match self.color() {
                Color::White => pt.to_char().to_ascii_uppercase(),
                Color::Black => pt.to_char(),
            },
        }
    }

    /// FEN文字から変換
    pub fn from_char(c: char) -> Option<Piece> {
        let pt = PieceType::from_char(c)?;
        let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
        Some(Piece::new(color, pt))
    }
}
