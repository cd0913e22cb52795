//! MovePicker（指し手オーダリング）
//!
//! 探索中に指し手を段階的に生成・順序付けして返す。
//! カットオフを起こしやすい手ほど先に返す。
//!
//! ## History参照を保持しない設計
//!
//! 再帰呼び出し時の借用の衝突を避けるため、MovePickerは`Position`や`HistoryTables`
//! への参照をフィールドとして持たない。`next_move()`の呼び出しごとに受け取る。
//! continuation history は参照ではなく [`ContHistKey`] で保持する。
//!
//! ## Stage
//!
//! ### 通常探索（王手なし）
//! 1. MainTT - 置換表の指し手
//! 2. CaptureInit - 捕獲手の生成
//! 3. GoodCapture - 良い捕獲手（SEEが閾値以上）
//! 4. Refutation - killer 2手と countermove
//! 5. QuietInit - 静かな手の生成
//! 6. Quiet - 静かな手
//! 7. BadCapture - 悪い捕獲手
//!
//! ### 王手回避
//! EvasionTT → EvasionInit → Evasion
//!
//! ### ProbCut
//! ProbCutTT → ProbCutInit → ProbCut
//!
//! ### 静止探索
//! QSearchTT → QCaptureInit → QCapture → QCheckInit → QCheck
//!
//! 王手生成は `depth == DEPTH_QS_CHECKS` のときだけ行う。

use super::history::{ContHistKey, HistoryTables};
use crate::bitboard::{Bitboard, attacks_bb, pawn_attacks_bb};
use crate::movegen::{ExtMove, ExtMoveBuffer, GenType, generate_with_type};
use crate::position::Position;
use crate::types::{
    Color, DEPTH_QS_CHECKS, DEPTH_QS_RECAPTURES, Depth, Move, Piece, PieceType, Square, Value,
    piece_value_mg,
};

// =============================================================================
// Stage（指し手生成の段階）
// =============================================================================

/// 指し手生成の段階
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Stage {
    // 通常探索（王手なし）
    /// 置換表の指し手
    MainTT,
    /// 捕獲手の生成
    CaptureInit,
    /// 良い捕獲手
    GoodCapture,
    /// killer / countermove
    Refutation,
    /// 静かな手の生成
    QuietInit,
    /// 静かな手
    Quiet,
    /// 悪い捕獲手
    BadCapture,

    // 王手回避
    /// 置換表の指し手（回避）
    EvasionTT,
    /// 回避手の生成
    EvasionInit,
    /// 回避手
    Evasion,

    // ProbCut
    /// 置換表の指し手（ProbCut）
    ProbCutTT,
    /// 捕獲手生成（ProbCut）
    ProbCutInit,
    /// SEEしきい値付き捕獲
    ProbCut,

    // 静止探索
    /// 置換表の指し手（静止探索）
    QSearchTT,
    /// 捕獲手の生成（静止探索）
    QCaptureInit,
    /// 捕獲手（静止探索）
    QCapture,
    /// 王手の生成
    QCheckInit,
    /// 駒を取らない王手
    QCheck,
}

impl Stage {
    /// 次のステージ
    pub fn next(self) -> Self {
        match self {
            Stage::MainTT => Stage::CaptureInit,
            Stage::CaptureInit => Stage::GoodCapture,
            Stage::GoodCapture => Stage::Refutation,
            Stage::Refutation => Stage::QuietInit,
            Stage::QuietInit => Stage::Quiet,
            Stage::Quiet => Stage::BadCapture,
            Stage::BadCapture => Stage::BadCapture, // 終端

            Stage::EvasionTT => Stage::EvasionInit,
            Stage::EvasionInit => Stage::Evasion,
            Stage::Evasion => Stage::Evasion, // 終端

            Stage::ProbCutTT => Stage::ProbCutInit,
            Stage::ProbCutInit => Stage::ProbCut,
            Stage::ProbCut => Stage::ProbCut, // 終端

            Stage::QSearchTT => Stage::QCaptureInit,
            Stage::QCaptureInit => Stage::QCapture,
            Stage::QCapture => Stage::QCheckInit,
            Stage::QCheckInit => Stage::QCheck,
            Stage::QCheck => Stage::QCheck, // 終端
        }
    }
}

// =============================================================================
// MovePicker
// =============================================================================

/// 指し手オーダリング器
///
/// ```ignore
/// let mut mp = MovePicker::new(pos, tt_move, depth, cont_keys, counter_move, killers);
/// loop {
///     let mv = mp.next_move(pos, &st.history);
///     if mv.is_none() { break; }
///     if move_count_pruning { mp.skip_quiet_moves(); }
///     // 再帰（この時点で &HistoryTables は借用されていない）
/// }
/// ```
pub struct MovePicker {
    /// 1,2,3,4,5,6手前の continuation history（添字2と4はスコアに使わない）
    cont_keys: [ContHistKey; 6],

    // 状態
    stage: Stage,
    tt_move: Move,
    refutations: [Move; 3],
    ref_cur: usize,
    ref_end: usize,
    recapture_square: Square,
    threshold: Value,
    /// 探索の深さ（部分ソートの閾値とqsearchの段階判定に使用）
    depth: Depth,
    skip_quiets: bool,

    // 指し手バッファ
    moves: ExtMoveBuffer,
    cur: usize,
    end_cur: usize,
    end_bad_captures: usize,
}

impl MovePicker {
    /// 通常探索用コンストラクタ（depth > 0）
    ///
    /// 王手されていれば回避手のステージから始まる。
    pub fn new(
        pos: &Position,
        tt_move: Move,
        depth: Depth,
        cont_keys: [ContHistKey; 6],
        counter_move: Move,
        killers: [Move; 2],
    ) -> Self {
        debug_assert!(depth > 0);

        let tt_ok = tt_move.is_some() && pos.pseudo_legal(tt_move);
        let stage = match (pos.in_check(), tt_ok) {
            (true, true) => Stage::EvasionTT,
            (true, false) => Stage::EvasionInit,
            (false, true) => Stage::MainTT,
            (false, false) => Stage::CaptureInit,
        };

        Self {
            refutations: [killers[0], killers[1], counter_move],
            ..Self::empty(stage, tt_move, depth, cont_keys)
        }
    }

    /// 静止探索用コンストラクタ（depth <= 0）
    ///
    /// `depth <= DEPTH_QS_RECAPTURES` では `recapture_square` への取り返しだけを返す。
    pub fn new_qsearch(
        pos: &Position,
        tt_move: Move,
        depth: Depth,
        cont_keys: [ContHistKey; 6],
        recapture_square: Square,
    ) -> Self {
        debug_assert!(depth <= 0);

        let in_check = pos.in_check();
        let tt_ok = tt_move.is_some()
            && (in_check || depth > DEPTH_QS_RECAPTURES || tt_move.to() == recapture_square)
            && pos.pseudo_legal(tt_move);
        let stage = match (in_check, tt_ok) {
            (true, true) => Stage::EvasionTT,
            (true, false) => Stage::EvasionInit,
            (false, true) => Stage::QSearchTT,
            (false, false) => Stage::QCaptureInit,
        };

        Self {
            recapture_square,
            ..Self::empty(stage, tt_move, depth, cont_keys)
        }
    }

    /// ProbCut専用コンストラクタ
    ///
    /// SEEが `threshold` 以上の捕獲手だけを返す。
    pub fn new_probcut(pos: &Position, tt_move: Move, threshold: Value, depth: Depth) -> Self {
        debug_assert!(!pos.in_check());

        let stage = if tt_move.is_some()
            && pos.capture_stage(tt_move)
            && pos.pseudo_legal(tt_move)
            && pos.see_ge(tt_move, threshold)
        {
            Stage::ProbCutTT
        } else {
            Stage::ProbCutInit
        };

        Self {
            threshold,
            ..Self::empty(stage, tt_move, depth, [ContHistKey::SENTINEL; 6])
        }
    }

    fn empty(stage: Stage, tt_move: Move, depth: Depth, cont_keys: [ContHistKey; 6]) -> Self {
        Self {
            cont_keys,
            stage,
            tt_move,
            refutations: [Move::NONE; 3],
            ref_cur: 0,
            ref_end: 0,
            recapture_square: Square::A1,
            threshold: Value::ZERO,
            depth,
            skip_quiets: false,
            moves: ExtMoveBuffer::new(),
            cur: 0,
            end_cur: 0,
            end_bad_captures: 0,
        }
    }

    /// 残りのquiet手の生成と返却をやめる（move count pruning 成立時）
    pub fn skip_quiet_moves(&mut self) {
        self.skip_quiets = true;
    }

    /// 現在のステージを取得
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 次の指し手を返す
    ///
    /// 指し手が尽きたら `Move::NONE` を返す。
    pub fn next_move(&mut self, pos: &Position, history: &HistoryTables) -> Move {
        loop {
            match self.stage {
                // ==============================
                // TT手を返す
                // ==============================
                Stage::MainTT | Stage::EvasionTT | Stage::QSearchTT | Stage::ProbCutTT => {
                    self.stage = self.stage.next();
                    return self.tt_move;
                }

                // ==============================
                // 捕獲手の生成
                // ==============================
                Stage::CaptureInit | Stage::QCaptureInit | Stage::ProbCutInit => {
                    self.moves.clear();
                    self.cur = 0;
                    self.end_bad_captures = 0;
                    self.end_cur = generate_with_type(pos, GenType::Captures, &mut self.moves);

                    self.score_captures(pos, history);
                    partial_insertion_sort(self.moves.as_mut_slice(), self.end_cur, -3000 * self.depth);

                    self.stage = self.stage.next();
                }

                // ==============================
                // 良い捕獲手を返す
                // ==============================
                Stage::GoodCapture => {
                    if let Some(m) = self.select_good_capture(pos) {
                        return m;
                    }

                    // countermove が killer と同じなら除く
                    self.ref_cur = 0;
                    self.ref_end = 3;
                    if self.refutations[0] == self.refutations[2]
                        || self.refutations[1] == self.refutations[2]
                    {
                        self.ref_end = 2;
                    }
                    self.stage = Stage::Refutation;
                }

                // ==============================
                // killer / countermove
                // ==============================
                Stage::Refutation => {
                    while self.ref_cur < self.ref_end {
                        let m = self.refutations[self.ref_cur];
                        self.ref_cur += 1;
                        if m.is_some()
                            && m != self.tt_move
                            && !pos.is_capture(m)
                            && pos.pseudo_legal(m)
                        {
                            return m;
                        }
                    }
                    self.stage = Stage::QuietInit;
                }

                // ==============================
                // 静かな手の生成
                // ==============================
                Stage::QuietInit => {
                    if !self.skip_quiets {
                        // 良い捕獲手の領域は返却済みなので上書きしてよい
                        self.moves.truncate(self.end_bad_captures);
                        self.cur = self.end_bad_captures;
                        generate_with_type(pos, GenType::Quiets, &mut self.moves);
                        self.end_cur = self.moves.len();

                        self.score_quiets(pos, history);
                        let start = self.cur;
                        partial_insertion_sort(
                            &mut self.moves.as_mut_slice()[start..],
                            self.end_cur - start,
                            -3000 * self.depth,
                        );
                    }
                    self.stage = Stage::Quiet;
                }

                // ==============================
                // 静かな手を返す
                // ==============================
                Stage::Quiet => {
                    if !self.skip_quiets {
                        if let Some(m) = self.select_quiet() {
                            return m;
                        }
                    }

                    self.cur = 0;
                    self.end_cur = self.end_bad_captures;
                    self.stage = Stage::BadCapture;
                }

                // ==============================
                // 悪い捕獲手を返す
                // ==============================
                Stage::BadCapture => {
                    return self.select_simple().unwrap_or(Move::NONE);
                }

                // ==============================
                // 王手回避
                // ==============================
                Stage::EvasionInit => {
                    self.moves.clear();
                    self.cur = 0;
                    self.end_cur = generate_with_type(pos, GenType::Evasions, &mut self.moves);
                    self.score_evasions(pos, history);
                    self.stage = Stage::Evasion;
                }

                Stage::Evasion => {
                    return self.select_best().unwrap_or(Move::NONE);
                }

                // ==============================
                // ProbCut
                // ==============================
                Stage::ProbCut => {
                    return self.select_probcut(pos).unwrap_or(Move::NONE);
                }

                // ==============================
                // 静止探索
                // ==============================
                Stage::QCapture => {
                    if let Some(m) = self.select_qcapture() {
                        return m;
                    }
                    // 王手を生成しない深さならここで終わり
                    if self.depth != DEPTH_QS_CHECKS {
                        return Move::NONE;
                    }
                    self.stage = Stage::QCheckInit;
                }

                Stage::QCheckInit => {
                    self.moves.clear();
                    self.cur = 0;
                    self.end_cur = generate_with_type(pos, GenType::QuietChecks, &mut self.moves);
                    self.stage = Stage::QCheck;
                }

                Stage::QCheck => {
                    return self.select_simple().unwrap_or(Move::NONE);
                }
            }
        }
    }

    // =========================================================================
    // スコアリング
    // =========================================================================

    /// 捕獲手: 6 * 取られる駒の価値 + capture history
    fn score_captures(&mut self, pos: &Position, history: &HistoryTables) {
        for ext in self.moves.as_mut_slice()[..self.end_cur].iter_mut() {
            let to = ext.mv.to();
            let captured = pos.piece_on(to);
            ext.value = 6 * captured_value(captured)
                + history.capture_history.get(pos.moved_piece(ext.mv), to, captured) as i32;
        }
    }

    /// 静かな手: 履歴 + 取られそうな駒を逃がす手へのボーナス
    fn score_quiets(&mut self, pos: &Position, history: &HistoryTables) {
        let us = pos.side_to_move();
        let them = !us;

        let threatened_by_pawn = attacks_by(pos, them, PieceType::Pawn);
        let threatened_by_minor = attacks_by(pos, them, PieceType::Knight)
            | attacks_by(pos, them, PieceType::Bishop)
            | threatened_by_pawn;
        let threatened_by_rook = attacks_by(pos, them, PieceType::Rook) | threatened_by_minor;

        // 自分より価値の低い駒に狙われている駒
        let threatened = (pos.pieces(us, PieceType::Queen) & threatened_by_rook)
            | (pos.pieces(us, PieceType::Rook) & threatened_by_minor)
            | (pos.pieces_c_pt2(us, PieceType::Knight, PieceType::Bishop) & threatened_by_pawn);

        let cont = [
            history.continuation(self.cont_keys[0]),
            history.continuation(self.cont_keys[1]),
            history.continuation(self.cont_keys[3]),
            history.continuation(self.cont_keys[5]),
        ];

        let start = self.cur;
        for ext in self.moves.as_mut_slice()[start..self.end_cur].iter_mut() {
            let m = ext.mv;
            let pc = pos.moved_piece(m);
            let to = m.to();

            let escape = if threatened.contains(m.from()) {
                threat_escape_bonus(
                    pc.piece_type(),
                    to,
                    threatened_by_pawn,
                    threatened_by_minor,
                    threatened_by_rook,
                )
            } else {
                0
            };

            ext.value = 2 * history.main_history.get(us, m) as i32
                + 2 * cont[0].get(pc, to) as i32
                + cont[1].get(pc, to) as i32
                + cont[2].get(pc, to) as i32
                + cont[3].get(pc, to) as i32
                + escape;
        }
    }

    /// 回避手: 捕獲（MVV-LVA）を静かな手より先に
    fn score_evasions(&mut self, pos: &Position, history: &HistoryTables) {
        let us = pos.side_to_move();
        let cont0 = history.continuation(self.cont_keys[0]);

        for ext in self.moves.as_mut_slice()[..self.end_cur].iter_mut() {
            let m = ext.mv;
            let pc = pos.moved_piece(m);
            ext.value = if pos.is_capture(m) {
                captured_value(pos.piece_on(m.to())) - pc.piece_type().index() as i32
            } else {
                2 * history.main_history.get(us, m) as i32 + 2 * cont0.get(pc, m.to()) as i32
                    - (1 << 28)
            };
        }
    }

    // =========================================================================
    // ヘルパー
    // =========================================================================

    /// 良い捕獲手を選択（SEE >= -69 * score / 1024）
    ///
    /// 悪い捕獲手はバッファ先頭へ寄せて後回しにする。
    fn select_good_capture(&mut self, pos: &Position) -> Option<Move> {
        while self.cur < self.end_cur {
            let ext = self.moves[self.cur];
            self.cur += 1;

            // TT手は既に返したのでスキップ
            if ext.mv == self.tt_move {
                continue;
            }

            if pos.see_ge(ext.mv, Value::new(-69 * ext.value / 1024)) {
                return Some(ext.mv);
            }
            self.moves[self.end_bad_captures] = ext;
            self.end_bad_captures += 1;
        }
        None
    }

    /// killer / countermove 以外の静かな手
    fn select_quiet(&mut self) -> Option<Move> {
        while self.cur < self.end_cur {
            let m = self.moves[self.cur].mv;
            self.cur += 1;

            if m != self.tt_move && !self.refutations.contains(&m) {
                return Some(m);
            }
        }
        None
    }

    /// シンプルな手の選択（TT手スキップのみ）
    fn select_simple(&mut self) -> Option<Move> {
        while self.cur < self.end_cur {
            let m = self.moves[self.cur].mv;
            self.cur += 1;

            if m != self.tt_move {
                return Some(m);
            }
        }
        None
    }

    /// 残りから最大スコアの手を選ぶ（回避手用）
    fn select_best(&mut self) -> Option<Move> {
        while self.cur < self.end_cur {
            let slice = &mut self.moves.as_mut_slice()[self.cur..self.end_cur];
            let best = slice
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.value.cmp(&b.1.value).then(b.0.cmp(&a.0)))
                .map_or(0, |(i, _)| i);
            slice.swap(0, best);

            let m = self.moves[self.cur].mv;
            self.cur += 1;
            if m != self.tt_move {
                return Some(m);
            }
        }
        None
    }

    /// ProbCut用の手の選択（SEE閾値チェック）
    fn select_probcut(&mut self, pos: &Position) -> Option<Move> {
        while self.cur < self.end_cur {
            let m = self.moves[self.cur].mv;
            self.cur += 1;

            if m != self.tt_move && pos.see_ge(m, self.threshold) {
                return Some(m);
            }
        }
        None
    }

    /// 静止探索の捕獲手（深い所では取り返しのみ）
    fn select_qcapture(&mut self) -> Option<Move> {
        while self.cur < self.end_cur {
            let m = self.moves[self.cur].mv;
            self.cur += 1;

            if m != self.tt_move
                && (self.depth > DEPTH_QS_RECAPTURES || m.to() == self.recapture_square)
            {
                return Some(m);
            }
        }
        None
    }
}

// =============================================================================
// ユーティリティ関数
// =============================================================================

/// 部分挿入ソート
///
/// `limit` 以上のスコアの手を先頭に集め、降順でソートする。
/// 先頭要素（index 0）を初期 sorted 領域とみなし、index 1 から走査する。
/// sorted 領域の末尾インデックスを返す。
fn partial_insertion_sort(moves: &mut [ExtMove], end: usize, limit: i32) -> usize {
    let mut sorted_end: usize = 0;
    for p in 1..end {
        if moves[p].value >= limit {
            let tmp = moves[p];
            sorted_end += 1;
            moves[p] = moves[sorted_end];
            let mut q = sorted_end;
            while q > 0 && moves[q - 1].value < tmp.value {
                moves[q] = moves[q - 1];
                q -= 1;
            }
            moves[q] = tmp;
        }
    }
    sorted_end
}

/// 取られる駒の中盤価値（空升なら0）
#[inline]
fn captured_value(pc: Piece) -> i32 {
    pc.piece_type_opt().map_or(0, piece_value_mg)
}

/// `c` の `pt` が利いている升
/// 狙われている駒を逃がす手へのボーナス
///
/// クイーン・ルークが逃げ切れなくても、ポーンの利きから外れれば小さいボーナスを与える。
fn threat_escape_bonus(
    pt: PieceType,
    to: Square,
    by_pawn: Bitboard,
    by_minor: Bitboard,
    by_rook: Bitboard,
) -> i32 {
    if pt == PieceType::Queen && !by_rook.contains(to) {
        50000
    } else if pt == PieceType::Rook && !by_minor.contains(to) {
        25000
    } else if !by_pawn.contains(to) {
        15000
    } else {
        0
    }
}

fn attacks_by(pos: &Position, c: Color, pt: PieceType) -> Bitboard {
    if pt == PieceType::Pawn {
        return pawn_attacks_bb(c, pos.pieces(c, PieceType::Pawn));
    }
    let occupied = pos.occupied();
    pos.pieces(c, pt)
        .iter()
        .fold(Bitboard::EMPTY, |acc, sq| acc | attacks_bb(pt, sq, occupied))
}

// =============================================================================
// テスト
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::{MoveList, generate_legal};

    fn collect_all(mp: &mut MovePicker, pos: &Position, history: &HistoryTables) -> Vec<Move> {
        let mut out = Vec::new();
        loop {
            let m = mp.next_move(pos, history);
            if m.is_none() {
                break;
            }
            out.push(m);
        }
        out
    }

    fn legal_count(pos: &Position) -> usize {
        let mut list = MoveList::new();
        generate_legal(pos, &mut list);
        list.len()
    }

    #[test]
    fn test_stage_next() {
        assert_eq!(Stage::MainTT.next(), Stage::CaptureInit);
        assert_eq!(Stage::CaptureInit.next(), Stage::GoodCapture);
        assert_eq!(Stage::GoodCapture.next(), Stage::Refutation);
        assert_eq!(Stage::Refutation.next(), Stage::QuietInit);
        assert_eq!(Stage::QuietInit.next(), Stage::Quiet);
        assert_eq!(Stage::Quiet.next(), Stage::BadCapture);
        assert_eq!(Stage::BadCapture.next(), Stage::BadCapture);

        assert_eq!(Stage::EvasionTT.next(), Stage::EvasionInit);
        assert_eq!(Stage::EvasionInit.next(), Stage::Evasion);
        assert_eq!(Stage::Evasion.next(), Stage::Evasion);

        assert_eq!(Stage::ProbCutTT.next(), Stage::ProbCutInit);
        assert_eq!(Stage::ProbCutInit.next(), Stage::ProbCut);

        assert_eq!(Stage::QSearchTT.next(), Stage::QCaptureInit);
        assert_eq!(Stage::QCaptureInit.next(), Stage::QCapture);
        assert_eq!(Stage::QCapture.next(), Stage::QCheckInit);
        assert_eq!(Stage::QCheckInit.next(), Stage::QCheck);
        assert_eq!(Stage::QCheck.next(), Stage::QCheck);
    }

    #[test]
    fn test_partial_insertion_sort() {
        let mut moves = vec![
            ExtMove::new(Move::NONE, 100),
            ExtMove::new(Move::NONE, 50),
            ExtMove::new(Move::NONE, 200),
            ExtMove::new(Move::NONE, 10),
            ExtMove::new(Move::NONE, 150),
        ];

        let len = moves.len();
        let sorted_end = partial_insertion_sort(&mut moves, len, 100);

        // index 1 以降で >= 100 の手は 200, 150 の2つ
        assert_eq!(sorted_end, 2);
        assert_eq!(moves[0].value, 200);
        assert_eq!(moves[1].value, 150);
        assert_eq!(moves[2].value, 100);
    }

    #[test]
    fn test_partial_insertion_sort_boundary_value() {
        // value == limit の手は閾値以上として扱われる
        let mut moves = vec![
            ExtMove::new(Move::NONE, 99),
            ExtMove::new(Move::NONE, 100),
            ExtMove::new(Move::NONE, 101),
        ];

        let len = moves.len();
        let sorted_end = partial_insertion_sort(&mut moves, len, 100);

        assert_eq!(sorted_end, 2);
        assert_eq!(moves[0].value, 101);
        assert_eq!(moves[1].value, 100);
        assert_eq!(moves[2].value, 99);
    }

    #[test]
    fn test_partial_insertion_sort_full_sort() {
        let mut moves = vec![
            ExtMove::new(Move::NONE, 50),
            ExtMove::new(Move::NONE, -100),
            ExtMove::new(Move::NONE, 200),
            ExtMove::new(Move::NONE, 0),
        ];

        let len = moves.len();
        let sorted_end = partial_insertion_sort(&mut moves, len, i32::MIN);

        assert_eq!(sorted_end, 3);
        let values: Vec<i32> = moves.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![200, 50, 0, -100]);
    }

    #[test]
    fn test_movepicker_returns_every_legal_move_once() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            false,
        )
        .unwrap();
        let history = HistoryTables::new_boxed();
        let tt_move = Move::new(Square::E5, Square::F7);
        let mut mp = MovePicker::new(
            &pos,
            tt_move,
            5,
            [ContHistKey::SENTINEL; 6],
            Move::NONE,
            [Move::NONE; 2],
        );

        let moves = collect_all(&mut mp, &pos, &history);
        assert_eq!(moves[0], tt_move);

        let legal: Vec<Move> = moves.iter().copied().filter(|&m| pos.legal(m)).collect();
        assert_eq!(legal.len(), legal_count(&pos));

        let mut dedup = moves.clone();
        dedup.sort_by_key(|m| m.to_u16());
        dedup.dedup();
        assert_eq!(dedup.len(), moves.len(), "duplicate move returned");
    }

    #[test]
    fn test_movepicker_good_captures_before_quiets() {
        // 白はタダのクイーンを取れる
        let pos = Position::from_fen("4k3/8/8/3q4/8/8/3R4/4K3 w - - 0 1", false).unwrap();
        let history = HistoryTables::new_boxed();
        let mut mp = MovePicker::new(
            &pos,
            Move::NONE,
            3,
            [ContHistKey::SENTINEL; 6],
            Move::NONE,
            [Move::NONE; 2],
        );

        let first = mp.next_move(&pos, &history);
        assert_eq!(first, Move::new(Square::D2, Square::D5));
    }

    #[test]
    fn test_movepicker_killer_after_captures() {
        let pos = Position::startpos();
        let history = HistoryTables::new_boxed();
        let killer = Move::new(Square::G1, Square::F3);
        let mut mp = MovePicker::new(
            &pos,
            Move::NONE,
            4,
            [ContHistKey::SENTINEL; 6],
            Move::NONE,
            [killer, Move::NONE],
        );

        // 初期局面に捕獲手はないので killer が最初
        let moves = collect_all(&mut mp, &pos, &history);
        assert_eq!(moves[0], killer);
        assert_eq!(moves.len(), 20);
        assert_eq!(moves.iter().filter(|&&m| m == killer).count(), 1);
    }

    #[test]
    fn test_movepicker_skip_quiets() {
        let pos = Position::startpos();
        let history = HistoryTables::new_boxed();
        let mut mp = MovePicker::new(
            &pos,
            Move::NONE,
            4,
            [ContHistKey::SENTINEL; 6],
            Move::NONE,
            [Move::NONE; 2],
        );
        mp.skip_quiet_moves();
        assert!(mp.next_move(&pos, &history).is_none());
    }

    #[test]
    fn test_movepicker_evasions() {
        // 黒のルークで王手されている
        let pos = Position::from_fen("4k3/8/8/8/8/8/4r3/R3K3 w Q - 0 1", false).unwrap();
        let history = HistoryTables::new_boxed();
        let mut mp = MovePicker::new(
            &pos,
            Move::NONE,
            4,
            [ContHistKey::SENTINEL; 6],
            Move::NONE,
            [Move::NONE; 2],
        );
        assert_eq!(mp.stage(), Stage::EvasionInit);

        let moves = collect_all(&mut mp, &pos, &history);
        // 取る手が最初に返る
        assert_eq!(moves[0], Move::new(Square::E1, Square::E2));
        let legal: Vec<Move> = moves.iter().copied().filter(|&m| pos.legal(m)).collect();
        assert_eq!(legal.len(), legal_count(&pos));
    }

    #[test]
    fn test_movepicker_qsearch_recaptures_only() {
        let pos = Position::from_fen("4k3/8/2n5/3p4/4P3/5N2/8/4K3 w - - 0 1", false).unwrap();
        let history = HistoryTables::new_boxed();

        // 通常のqsearch深さではすべての捕獲手
        let mut mp = MovePicker::new_qsearch(
            &pos,
            Move::NONE,
            DEPTH_QS_CHECKS,
            [ContHistKey::SENTINEL; 6],
            Square::A1,
        );
        let moves = collect_all(&mut mp, &pos, &history);
        assert!(moves.contains(&Move::new(Square::E4, Square::D5)));

        // 深いqsearchでは指定升への取り返しのみ
        let mut mp = MovePicker::new_qsearch(
            &pos,
            Move::NONE,
            DEPTH_QS_RECAPTURES,
            [ContHistKey::SENTINEL; 6],
            Square::H8,
        );
        assert!(mp.next_move(&pos, &history).is_none());
    }

    #[test]
    fn test_movepicker_qsearch_checks_only_at_check_depth() {
        // 駒を取る手はなく、Qh5+ などの王手がある
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1", false).unwrap();
        let history = HistoryTables::new_boxed();

        let mut mp = MovePicker::new_qsearch(
            &pos,
            Move::NONE,
            DEPTH_QS_CHECKS,
            [ContHistKey::SENTINEL; 6],
            Square::A1,
        );
        let checks = collect_all(&mut mp, &pos, &history);
        assert!(!checks.is_empty());
        assert!(checks.iter().all(|&m| pos.gives_check(m)));

        let mut mp = MovePicker::new_qsearch(
            &pos,
            Move::NONE,
            -1,
            [ContHistKey::SENTINEL; 6],
            Square::A1,
        );
        assert!(mp.next_move(&pos, &history).is_none());
    }

    #[test]
    fn test_movepicker_probcut_threshold() {
        let pos = Position::from_fen("4k3/4p3/8/3n4/8/8/8/3RK3 w - - 0 1", false).unwrap();
        let history = HistoryTables::new_boxed();
        let mut mp = MovePicker::new_probcut(&pos, Move::NONE, Value::new(1), 4);
        let m = mp.next_move(&pos, &history);
        // e7 のポーンは d5 に利いていないのでタダ取り
        assert_eq!(m, Move::new(Square::D1, Square::D5));

        let mut mp = MovePicker::new_probcut(&pos, Move::NONE, Value::new(5000), 4);
        assert!(mp.next_move(&pos, &history).is_none());
    }

    #[test]
    fn test_threat_escape_bonus_falls_back_to_pawn_safety() {
        let by_pawn = Bitboard::from_square(Square::C4);
        let by_minor = by_pawn | Bitboard::from_square(Square::D4);
        let by_rook = by_minor | Bitboard::from_square(Square::E4);

        assert_eq!(threat_escape_bonus(PieceType::Queen, Square::H4, by_pawn, by_minor, by_rook), 50000);
        assert_eq!(threat_escape_bonus(PieceType::Rook, Square::E4, by_pawn, by_minor, by_rook), 25000);
        // ルークの利きに残るクイーン、マイナーピースの利きに残るルークもポーンから逃げれば加点
        assert_eq!(threat_escape_bonus(PieceType::Queen, Square::E4, by_pawn, by_minor, by_rook), 15000);
        assert_eq!(threat_escape_bonus(PieceType::Rook, Square::D4, by_pawn, by_minor, by_rook), 15000);
        assert_eq!(threat_escape_bonus(PieceType::Knight, Square::D4, by_pawn, by_minor, by_rook), 15000);
        assert_eq!(threat_escape_bonus(PieceType::Queen, Square::C4, by_pawn, by_minor, by_rook), 0);
        assert_eq!(threat_escape_bonus(PieceType::Bishop, Square::C4, by_pawn, by_minor, by_rook), 0);
    }

    #[test]
    fn test_movepicker_quiet_promotion_killer_is_refutation() {
        let pos = Position::from_fen("2r1k3/1P6/8/8/8/8/8/4K3 w - - 0 1", false).unwrap();
        let history = HistoryTables::new_boxed();
        let killer = Move::new_promotion(Square::B7, Square::B8, PieceType::Queen);
        let mut mp = MovePicker::new(
            &pos,
            Move::NONE,
            4,
            [ContHistKey::SENTINEL; 6],
            Move::NONE,
            [killer, Move::NONE],
        );

        // 駒を取らない成りは refutation として静かな手より先に返る
        let moves = collect_all(&mut mp, &pos, &history);
        let last_killer = moves.iter().rposition(|&m| m == killer).unwrap();
        let first_king = moves.iter().position(|&m| m.from() == Square::E1).unwrap();
        assert_eq!(moves.iter().filter(|&&m| m == killer).count(), 2);
        assert!(last_killer < first_king);
    }
}
