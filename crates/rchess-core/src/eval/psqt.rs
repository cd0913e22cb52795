//! 駒割＋駒位置テーブル（PSQT）と差分更新用 Accumulator
//!
//! テーブルは白視点の (中盤, 終盤) の値で、黒の駒は上下反転して符号を反転する。

use crate::position::{DirtyPiece, Position};
use crate::types::{Color, Piece, PieceType, Square, piece_value_eg, piece_value_mg};

/// 中盤・終盤の2値
pub const MG: usize = 0;
pub const EG: usize = 1;

/// 中心4升からのチェビシェフ距離（0..=3）
const fn center_distance(sq: usize) -> i32 {
    let f = (sq & 7) as i32;
    let r = (sq >> 3) as i32;
    let df = if f < 4 { 3 - f } else { f - 4 };
    let dr = if r < 4 { 3 - r } else { r - 4 };
    if df > dr { df } else { dr }
}

/// 白の駒種・升に対する位置ボーナス（駒の価値を含まない）
const fn bonus(pt: PieceType, sq: usize) -> [i32; 2] {
    let file = (sq & 7) as i32;
    let rank = (sq >> 3) as i32;
    let cd = center_distance(sq);

    match pt {
        PieceType::Pawn => {
            const ADVANCE_MG: [i32; 8] = [0, 0, 2, 6, 14, 24, 40, 0];
            const ADVANCE_EG: [i32; 8] = [0, 0, 4, 10, 22, 40, 70, 0];
            // d/e筋のポーンは中盤で少し高く、a/h筋は少し低い
            let center_file = match file {
                3 | 4 => 12,
                0 | 7 => -6,
                _ => 0,
            };
            let center = if rank >= 2 && rank <= 4 { center_file } else { 0 };
            [ADVANCE_MG[rank as usize] + center, ADVANCE_EG[rank as usize]]
        }
        PieceType::Knight => [24 - 14 * cd, 18 - 12 * cd],
        PieceType::Bishop => [12 - 6 * cd, 10 - 6 * cd],
        PieceType::Rook => {
            let seventh = if rank == 6 { 20 } else { 0 };
            let center_file = if file == 3 || file == 4 { 6 } else { 0 };
            [seventh + center_file, seventh / 2]
        }
        PieceType::Queen => [4 - 3 * cd, 14 - 7 * cd],
        PieceType::King => {
            // 中盤は自陣の端に囲われている方が良く、終盤は中央に出る方が良い
            let shelter = match file {
                0 | 1 | 2 | 6 | 7 => 24,
                _ => 0,
            };
            let mg = if rank == 0 { shelter } else { -28 * rank };
            [mg, 36 - 18 * cd]
        }
    }
}

/// 駒×升の評価値（白視点、駒の価値込み）[Piece][Square][MG/EG]
pub struct PsqTable {
    table: [[[i32; 2]; Square::NUM]; Piece::NUM],
}

impl PsqTable {
    const fn init() -> Self {
        let mut table = [[[0; 2]; Square::NUM]; Piece::NUM];
        let mut i = 0;
        while i < Piece::ALL.len() {
            let pc = Piece::ALL[i];
            let pt = pc.piece_type();
            let mut sq = 0;
            while sq < Square::NUM {
                let (rel, sign) = match pc.color() {
                    Color::White => (sq, 1),
                    Color::Black => (sq ^ 56, -1),
                };
                let b = bonus(pt, rel);
                table[pc.index()][sq] = [
                    sign * (piece_value_mg(pt) + b[MG]),
                    sign * (piece_value_eg(pt) + b[EG]),
                ];
                sq += 1;
            }
            i += 1;
        }
        PsqTable { table }
    }

    #[inline]
    pub fn get(&self, pc: Piece, sq: Square) -> [i32; 2] {
        self.table[pc.index()][sq.index()]
    }
}

/// グローバルPSQテーブル
pub static PSQT: PsqTable = PsqTable::init();

/// 駒割＋駒位置の累積値（白視点）
///
/// StateInfo に置かれ、do_move で [`DirtyPiece`] から差分更新される。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Accumulator {
    /// [MG/EG]
    pub psq: [i32; 2],
}

impl Accumulator {
    /// 空の Accumulator
    pub const EMPTY: Accumulator = Accumulator { psq: [0; 2] };

    /// 盤面から全計算する
    pub fn refresh(pos: &Position) -> Accumulator {
        let mut acc = Accumulator::EMPTY;
        for sq in pos.occupied() {
            acc.add(pos.piece_on(sq), sq);
        }
        acc
    }

    /// 駒移動情報から差分更新する
    #[inline]
    pub fn apply(&mut self, dirty: &DirtyPiece) {
        for cp in dirty.pieces() {
            if let Some(from) = cp.from {
                self.remove(cp.piece, from);
            }
            if let Some(to) = cp.to {
                self.add(cp.piece, to);
            }
        }
    }

    #[inline]
    fn add(&mut self, pc: Piece, sq: Square) {
        let v = PSQT.get(pc, sq);
        self.psq[MG] += v[MG];
        self.psq[EG] += v[EG];
    }

    #[inline]
    fn remove(&mut self, pc: Piece, sq: Square) {
        let v = PSQT.get(pc, sq);
        self.psq[MG] -= v[MG];
        self.psq[EG] -= v[EG];
    }
}
