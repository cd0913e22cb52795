//! 繰り返しの先読み検出（cuckooテーブル）
//!
//! 1手で元の局面に戻せる可逆な手（ポーン以外の駒の移動）を、手の前後のキー差分で引けるように
//! cuckooハッシュに格納しておく。探索中に「次の1手で過去の局面に戻れる」ことを検出し、
//! 引き分けスコアを早めに下限として使うために用いる。

use std::sync::OnceLock;

use crate::bitboard::{Bitboard, attacks_bb, between_bb};
use crate::types::{Move, Piece, PieceType, Square};

use super::Position;
use super::zobrist::{zobrist_psq, zobrist_side};

/// テーブルサイズ（2のべき）
const CUCKOO_SIZE: usize = 8192;

/// 可逆な手の総数（駒種×升の組み合わせから決まる）
const CUCKOO_ENTRIES: usize = 3668;

struct CuckooTable {
    keys: Box<[u64; CUCKOO_SIZE]>,
    moves: Box<[Move; CUCKOO_SIZE]>,
}

static CUCKOO: OnceLock<CuckooTable> = OnceLock::new();

#[inline]
const fn h1(key: u64) -> usize {
    (key & 0x1fff) as usize
}

#[inline]
const fn h2(key: u64) -> usize {
    ((key >> 16) & 0x1fff) as usize
}

impl CuckooTable {
    fn build() -> Self {
        let mut keys = Box::new([0u64; CUCKOO_SIZE]);
        let mut moves = Box::new([Move::NONE; CUCKOO_SIZE]);
        let mut count = 0;

        for pc in Piece::ALL {
            if pc.piece_type() == PieceType::Pawn {
                continue;
            }
            for s1 in Square::all() {
                for s2 in Square::all().filter(|s2| s2.raw() > s1.raw()) {
                    if !attacks_bb(pc.piece_type(), s1, Bitboard::EMPTY).contains(s2) {
                        continue;
                    }

                    let mut mv = Move::new(s1, s2);
                    let mut key = zobrist_psq(pc, s1) ^ zobrist_psq(pc, s2) ^ zobrist_side();
                    let mut i = h1(key);
                    // 空きが見つかるまで追い出しを繰り返す
                    loop {
                        std::mem::swap(&mut keys[i], &mut key);
                        std::mem::swap(&mut moves[i], &mut mv);
                        if mv == Move::NONE {
                            break;
                        }
                        i = if i == h1(key) { h2(key) } else { h1(key) };
                    }
                    count += 1;
                }
            }
        }
        debug_assert_eq!(count, CUCKOO_ENTRIES);

        CuckooTable { keys, moves }
    }

    /// キー差分に一致する可逆な手を引く
    #[inline]
    fn probe(&self, move_key: u64) -> Option<Move> {
        let j = h1(move_key);
        if self.keys[j] == move_key {
            return Some(self.moves[j]);
        }
        let j = h2(move_key);
        if self.keys[j] == move_key {
            return Some(self.moves[j]);
        }
        None
    }
}

/// cuckooテーブルを初期化する
pub fn init_cuckoo() {
    cuckoo();
}

#[inline]
fn cuckoo() -> &'static CuckooTable {
    CUCKOO.get_or_init(CuckooTable::build)
}

impl Position {
    /// 次の1手で過去の局面（最後の不可逆な手以降）に戻れるか
    ///
    /// 探索木の内側（ply > i）での一致は即座に引き分けとみなす。ルート以前の局面への一致は、
    /// その局面自体が繰り返しであるときに限る。
    pub fn has_game_cycle(&self, ply: i32) -> bool {
        let end = self.state().rule50.min(self.state().plies_from_null);
        if end < 3 {
            return false;
        }

        let table = cuckoo();
        let original_key = self.state().key;

        let mut i = 3;
        while i <= end {
            let Some(stp) = self.state_back(i as usize) else {
                break;
            };
            let move_key = original_key ^ stp.key;

            if let Some(m) = table.probe(move_key) {
                let s1 = m.from();
                let s2 = m.to();

                if ((between_bb(s1, s2) ^ s2) & self.occupied()).is_empty() {
                    if ply > i {
                        return true;
                    }

                    // テーブルには両方向の手が同じ位置に入っているので、駒のいる側を見る
                    let sq = if self.empty(s1) { s2 } else { s1 };
                    if self.piece_on(sq).color() != self.side_to_move() {
                        i += 2;
                        continue;
                    }

                    // ルート以前では、もう1回の繰り返しを要求する
                    if stp.repetition != 0 {
                        return true;
                    }
                }
            }
            i += 2;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuckoo_table_entries() {
        let table = cuckoo();
        let filled = table.moves.iter().filter(|m| m.is_some()).count();
        assert_eq!(filled, CUCKOO_ENTRIES);
    }

    #[test]
    fn test_cuckoo_probe_finds_knight_move() {
        let table = cuckoo();
        let pc = Piece::W_KNIGHT;
        let key = zobrist_psq(pc, Square::G1) ^ zobrist_psq(pc, Square::F3) ^ zobrist_side();
        // 升番号の小さい側を移動元として格納される
        assert_eq!(table.probe(key), Some(Move::new(Square::G1, Square::F3)));
        assert_eq!(table.probe(key ^ 1), None);
    }

    #[test]
    fn test_game_cycle_detected() {
        let mut pos = Position::startpos();
        let moves = [
            Move::new(Square::G1, Square::F3),
            Move::new(Square::G8, Square::F6),
            Move::new(Square::F3, Square::G1),
        ];
        for m in moves {
            pos.do_move(m, false);
        }
        // 黒がNf6-g8と指せば初期局面に戻る
        assert!(pos.has_game_cycle(4));
        // ルート以前の一致は繰り返し済みでなければ認めない
        assert!(!pos.has_game_cycle(1));
    }

    #[test]
    fn test_no_cycle_after_irreversible_move() {
        let mut pos = Position::startpos();
        for m in [
            Move::new(Square::G1, Square::F3),
            Move::new(Square::G8, Square::F6),
            Move::new(Square::E2, Square::E4),
        ] {
            pos.do_move(m, false);
        }
        assert!(!pos.has_game_cycle(10));
    }
}
