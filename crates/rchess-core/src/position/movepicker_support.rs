//! MovePicker サポートメソッド
//!
//! MovePicker と探索が必要とする Position のメソッド（pseudo-legal 判定と SEE）を実装する。

use super::Position;
use crate::bitboard::{
    attacks_bb, between_bb, bishop_attacks, pawn_attacks, rank_bb, rook_attacks,
};
use crate::movegen::{ExtMoveBuffer, GenType, generate_with_type};
use crate::types::{
    BISHOP_VALUE_MG, KNIGHT_VALUE_MG, Move, MoveType, PAWN_VALUE_MG, PieceType, QUEEN_VALUE_MG,
    ROOK_VALUE_MG, Rank, Square, Value, piece_value_mg,
};

impl Position {
    // =========================================================================
    // 指し手の妥当性チェック
    // =========================================================================

    /// pseudo-legal チェック（TT手・killer手の妥当性確認用）
    ///
    /// 任意の16bit値から復元した指し手が現在の局面で pseudo-legal かどうかを確認する。
    /// 自キングが取られないかまでは見ないが、王手中は回避になっていない手を弾く。
    pub fn pseudo_legal(&self, m: Move) -> bool {
        if !m.is_ok() {
            return false;
        }

        let us = self.side_to_move();
        let from = m.from();
        let to = m.to();
        let pc = self.moved_piece(m);

        // 特殊な手は稀なので生成して照合する
        if m.move_type() != MoveType::Normal {
            let gen_type = if self.in_check() {
                GenType::Evasions
            } else {
                GenType::NonEvasions
            };
            let mut buffer = ExtMoveBuffer::new();
            generate_with_type(self, gen_type, &mut buffer);
            return buffer.iter().any(|ext| ext.mv == m);
        }

        // 通常の手では成りのビットは立たない
        if (m.to_u16() >> 12) & 3 != 0 {
            return false;
        }

        // 移動元に自分の駒があるか
        if pc.is_none() || pc.color() != us {
            return false;
        }

        // 移動先に自分の駒がないか（キャスリングは上で処理済み）
        if self.pieces_c(us).contains(to) {
            return false;
        }

        if pc.piece_type() == PieceType::Pawn {
            // 最終段への移動は成りでなければならない
            if (rank_bb(Rank::Rank8.relative(us)) & to).is_not_empty() {
                return false;
            }

            let push = us.pawn_push();
            let capture = (pawn_attacks(us, from) & self.pieces_c(!us)).contains(to);
            let single = from.offset(push) == to && self.empty(to);
            let double = from.offset(2 * push) == to
                && from.relative_rank(us) == Rank::Rank2
                && self.empty(to)
                && self.empty(to.offset(-push));

            if !(capture || single || double) {
                return false;
            }
        } else if !attacks_bb(pc.piece_type(), from, self.occupied()).contains(to) {
            return false;
        }

        // 王手中は回避手であること（合法性は legal() で改めて判定する）
        if self.in_check() {
            let checkers = self.checkers();
            if pc.piece_type() != PieceType::King {
                // 両王手ならキングが動くしかない
                if checkers.more_than_one() {
                    return false;
                }
                // 王手駒を取るか間に入る
                if !between_bb(self.king_square(us), checkers.lsb()).contains(to) {
                    return false;
                }
            } else if (self.attackers_to_occ(to, self.occupied() ^ from) & self.pieces_c(!us))
                .is_not_empty()
            {
                return false;
            }
        }

        true
    }

    // =========================================================================
    // SEE (Static Exchange Evaluation)
    // =========================================================================

    /// 指し手の静的駒交換値が threshold 以上か
    ///
    /// 最も安い駒から順に取り返す前提で交換を進める。pin している駒が盤上にある間は
    /// pin されている駒を取り返しに使わない。特殊な手は交換値0として扱う。
    pub fn see_ge(&self, m: Move, threshold: Value) -> bool {
        debug_assert!(m.is_ok());

        if m.move_type() != MoveType::Normal {
            return Value::ZERO >= threshold;
        }

        let from = m.from();
        let to = m.to();

        let mut swap = see_value(self, to) - threshold.raw();
        if swap < 0 {
            return false;
        }

        swap = see_value(self, from) - swap;
        if swap <= 0 {
            return true;
        }

        let mut occupied = self.occupied() ^ from ^ to;
        let mut stm = self.piece_on(from).color();
        let mut attackers = self.attackers_to_occ(to, occupied);
        let mut res = true;

        let bishops_queens = self.pieces_pt2(PieceType::Bishop, PieceType::Queen);
        let rooks_queens = self.pieces_pt2(PieceType::Rook, PieceType::Queen);

        loop {
            stm = !stm;
            attackers &= occupied;

            let mut stm_attackers = attackers & self.pieces_c(stm);
            if stm_attackers.is_empty() {
                break;
            }

            // pinしている駒が残っている間はpinされた駒を使わない
            if (self.pinners(!stm) & occupied).is_not_empty() {
                stm_attackers &= !self.blockers_for_king(stm);
                if stm_attackers.is_empty() {
                    break;
                }
            }

            res = !res;

            // 最も価値の低い攻撃駒で取り返す
            let least = |pt: PieceType| stm_attackers & self.pieces_pt(pt);

            let bb = least(PieceType::Pawn);
            if bb.is_not_empty() {
                swap = PAWN_VALUE_MG - swap;
                if swap < i32::from(res) {
                    break;
                }
                occupied ^= bb.lsb();
                attackers |= bishop_attacks(to, occupied) & bishops_queens;
                continue;
            }

            let bb = least(PieceType::Knight);
            if bb.is_not_empty() {
                swap = KNIGHT_VALUE_MG - swap;
                if swap < i32::from(res) {
                    break;
                }
                occupied ^= bb.lsb();
                continue;
            }

            let bb = least(PieceType::Bishop);
            if bb.is_not_empty() {
                swap = BISHOP_VALUE_MG - swap;
                if swap < i32::from(res) {
                    break;
                }
                occupied ^= bb.lsb();
                attackers |= bishop_attacks(to, occupied) & bishops_queens;
                continue;
            }

            let bb = least(PieceType::Rook);
            if bb.is_not_empty() {
                swap = ROOK_VALUE_MG - swap;
                if swap < i32::from(res) {
                    break;
                }
                occupied ^= bb.lsb();
                attackers |= rook_attacks(to, occupied) & rooks_queens;
                continue;
            }

            let bb = least(PieceType::Queen);
            if bb.is_not_empty() {
                swap = QUEEN_VALUE_MG - swap;
                if swap < i32::from(res) {
                    break;
                }
                occupied ^= bb.lsb();
                attackers |= (bishop_attacks(to, occupied) & bishops_queens)
                    | (rook_attacks(to, occupied) & rooks_queens);
                continue;
            }

            // キングで取る: 相手にまだ攻撃駒があれば取り返されるので結果が反転する
            return if (attackers & !self.pieces_c(stm)).is_not_empty() {
                !res
            } else {
                res
            };
        }

        res
    }
}

/// SEE用の駒の価値（空升は0）
#[inline]
fn see_value(pos: &Position, sq: Square) -> i32 {
    pos.piece_on(sq).piece_type_opt().map_or(0, piece_value_mg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_from(fen: &str) -> Position {
        Position::from_fen(fen, false).unwrap()
    }

    #[test]
    fn test_see_simple_capture() {
        // 守られていないポーンを取る
        let pos = pos_from("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1");
        let m = Move::new(Square::E4, Square::D5);
        assert!(pos.see_ge(m, Value::ZERO));
        assert!(pos.see_ge(m, Value::new(PAWN_VALUE_MG)));
        assert!(!pos.see_ge(m, Value::new(PAWN_VALUE_MG + 1)));
    }

    #[test]
    fn test_see_defended_pawn_with_queen() {
        // ポーンで守られたポーンをクイーンで取ると損
        let pos = pos_from("4k3/8/2p5/3p4/8/8/3Q4/4K3 w - - 0 1");
        let m = Move::new(Square::D2, Square::D5);
        assert!(!pos.see_ge(m, Value::ZERO));
        assert!(pos.see_ge(m, Value::new(PAWN_VALUE_MG - QUEEN_VALUE_MG)));
    }

    #[test]
    fn test_see_xray_recapture() {
        // ルークの後ろのルークが取り返しに参加する
        let pos = pos_from("3rk3/3r4/8/3p4/8/8/3R4/3RK3 w - - 0 1");
        let m = Move::new(Square::D2, Square::D5);
        // RxP, RxR, RxR, RxR: ポーン - ルーク + ルーク - ルーク... 白はポーン1枚得して終わらない
        assert!(!pos.see_ge(m, Value::new(1)));
        assert!(pos.see_ge(m, Value::new(PAWN_VALUE_MG - ROOK_VALUE_MG)));
    }

    #[test]
    fn test_see_quiet_move_to_attacked_square() {
        // ポーンの利きがある升へのナイトの移動は損
        let pos = pos_from("4k3/8/8/8/3p4/8/8/1N2K3 w - - 0 1");
        let m = Move::new(Square::B1, Square::C3);
        assert!(pos.see_ge(m, Value::new(-KNIGHT_VALUE_MG)));
        assert!(!pos.see_ge(m, Value::ZERO));
    }

    #[test]
    fn test_see_special_moves_are_zero() {
        let pos = pos_from("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2");
        let m = Move::new_special(MoveType::EnPassant, Square::E5, Square::D6, PieceType::Knight);
        assert!(pos.see_ge(m, Value::ZERO));
        assert!(!pos.see_ge(m, Value::new(1)));
    }

    #[test]
    fn test_pseudo_legal() {
        let pos = Position::startpos();
        assert!(pos.pseudo_legal(Move::new(Square::E2, Square::E4)));
        assert!(pos.pseudo_legal(Move::new(Square::G1, Square::F3)));
        // 相手の駒・塞がれた経路・空升からの手
        assert!(!pos.pseudo_legal(Move::new(Square::E7, Square::E5)));
        assert!(!pos.pseudo_legal(Move::new(Square::F1, Square::C4)));
        assert!(!pos.pseudo_legal(Move::new(Square::E4, Square::E5)));
        assert!(!pos.pseudo_legal(Move::NONE));
        assert!(!pos.pseudo_legal(Move::NULL));
        // 成りのビットが立った通常手
        let flagged = Move::from_u16(Move::new(Square::E2, Square::E4).to_u16() | (3 << 12));
        assert!(!pos.pseudo_legal(flagged));
    }

    #[test]
    fn test_pseudo_legal_in_check() {
        // e8のルークで王手されている
        let pos = pos_from("4r2k/8/8/8/8/8/3N4/4K3 w - - 0 1");
        assert!(pos.in_check());
        // 合駒になるナイトの手
        assert!(pos.pseudo_legal(Move::new(Square::D2, Square::E4)));
        // 王手を無視するナイトの手
        assert!(!pos.pseudo_legal(Move::new(Square::D2, Square::B3)));
        // 利きのある升へのキング移動
        assert!(!pos.pseudo_legal(Move::new(Square::E1, Square::E2)));
        assert!(pos.pseudo_legal(Move::new(Square::E1, Square::D1)));
    }
}
