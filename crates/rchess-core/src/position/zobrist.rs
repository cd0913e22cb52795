//! Zobristハッシュ

use crate::types::{CastlingRights, File, Piece, Square};

/// Zobristハッシュ用乱数テーブル
pub struct Zobrist {
    /// 駒×升 [Piece.index()][Square.index()]
    pub psq: [[u64; Square::NUM]; Piece::NUM],
    /// アンパッサン可能な筋 [File]
    pub enpassant: [u64; File::NUM],
    /// キャスリング権の組み合わせ [CastlingRights.index()]
    pub castling: [u64; CastlingRights::NUM],
    /// 手番用（黒番のときにXOR）
    pub side: u64,
    /// 盤上にポーンが一枚もない時のポーンキー
    pub no_pawns: u64,
}

/// xorshift64*（const fn対応）
///
/// 同じシードから常に同じ値列を生成するため、キーはビルドや実行によらず再現可能。
struct Prng(u64);

impl Prng {
    const fn next(mut self) -> (Self, u64) {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        let v = self.0.wrapping_mul(2685821657736338717);
        (self, v)
    }
}

impl Zobrist {
    /// テーブル初期化
    pub const fn init() -> Self {
        let mut zobrist = Zobrist {
            psq: [[0; Square::NUM]; Piece::NUM],
            enpassant: [0; File::NUM],
            castling: [0; CastlingRights::NUM],
            side: 0,
            no_pawns: 0,
        };
        let mut rng = Prng(1070372);
        let mut v;

        // 駒×升（Piece::NONE と未使用インデックスは0のまま）
        let mut i = 0;
        while i < Piece::ALL.len() {
            let pc = Piece::ALL[i].index();
            let mut sq = 0;
            while sq < Square::NUM {
                (rng, v) = rng.next();
                zobrist.psq[pc][sq] = v;
                sq += 1;
            }
            i += 1;
        }

        let mut f = 0;
        while f < File::NUM {
            (rng, v) = rng.next();
            zobrist.enpassant[f] = v;
            f += 1;
        }

        let mut cr = 0;
        while cr < CastlingRights::NUM {
            (rng, v) = rng.next();
            zobrist.castling[cr] = v;
            cr += 1;
        }

        (rng, v) = rng.next();
        zobrist.side = v;
        (_, v) = rng.next();
        zobrist.no_pawns = v;

        zobrist
    }
}

/// グローバルZobristテーブル
pub static ZOBRIST: Zobrist = Zobrist::init();

/// 駒と升のハッシュを取得
#[inline]
pub fn zobrist_psq(pc: Piece, sq: Square) -> u64 {
    ZOBRIST.psq[pc.index()][sq.index()]
}

/// アンパッサン筋のハッシュを取得
#[inline]
pub fn zobrist_enpassant(file: File) -> u64 {
    ZOBRIST.enpassant[file.index()]
}

/// キャスリング権のハッシュを取得
#[inline]
pub fn zobrist_castling(cr: CastlingRights) -> u64 {
    ZOBRIST.castling[cr.index()]
}

/// 手番のハッシュを取得
#[inline]
pub fn zobrist_side() -> u64 {
    ZOBRIST.side
}

/// 盤上にポーンが無い状態のハッシュを取得
#[inline]
pub fn zobrist_no_pawns() -> u64 {
    ZOBRIST.no_pawns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zobrist_init() {
        assert_ne!(zobrist_side(), 0);
        assert_ne!(zobrist_psq(Piece::W_PAWN, Square::E2), zobrist_psq(Piece::W_PAWN, Square::E3));
        assert_ne!(zobrist_psq(Piece::W_PAWN, Square::E2), zobrist_psq(Piece::B_PAWN, Square::E2));
        assert_eq!(zobrist_psq(Piece::NONE, Square::E2), 0);
    }

    #[test]
    fn test_zobrist_values_unique() {
        let mut values: Vec<u64> = Piece::ALL
            .iter()
            .flat_map(|pc| Square::all().map(move |sq| zobrist_psq(*pc, sq)))
            .collect();
        values.extend(ZOBRIST.enpassant);
        values.extend(ZOBRIST.castling);
        values.push(zobrist_side());
        values.push(zobrist_no_pawns());
        let len = values.len();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), len);
    }

    #[test]
    fn test_zobrist_xor_property() {
        let h1 = zobrist_psq(Piece::W_KNIGHT, Square::G1);
        let h2 = zobrist_psq(Piece::W_KNIGHT, Square::F3);
        let combined = h1 ^ h2;
        assert_eq!(combined ^ h2, h1);
        assert_eq!(combined ^ h1, h2);
    }
}
