//! 探索で使う補助型
//!
//! - `NodeType`: ノード種別（const generic 引数として使う）
//! - `Stack` / `StackArray`: plyごとの探索スタック
//! - `RootMove` / `RootMoves`: ルート局面の指し手と読み筋
//! - 置換表に格納する評価値の変換（詰みスコアのply補正）

use crate::movegen::{MoveList, generate_legal};
use crate::position::Position;
use crate::tt::TranspositionTable;
use crate::types::{MAX_PLY, Move, Value};

use super::history::ContHistKey;

// =============================================================================
// NodeType
// =============================================================================

/// ノード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    /// null window で探索するノード
    NonPV = 0,
    /// PVノード
    PV = 1,
    /// ルートノード
    Root = 2,
}

// =============================================================================
// Stack
// =============================================================================

/// 探索スタックの長さ（ルートより前と末端の余白を含む）
pub const STACK_SIZE: usize = MAX_PLY as usize + 10;

/// ルート（ply 0）のスタック位置
///
/// ルートより前に7エントリの番兵を置き、`ply - 6` まで範囲チェックなしで参照できるようにする。
pub const STACK_OFFSET: usize = 7;

/// plyに対応するスタックの添字
#[inline]
pub const fn ss(ply: i32) -> usize {
    (ply + STACK_OFFSET as i32) as usize
}

/// plyごとの探索情報
#[derive(Clone)]
pub struct Stack {
    /// このplyの読み筋（PVノードでのみ更新）
    pub pv: Vec<Move>,
    /// このplyで指した手が指す continuation history
    pub cont_hist_key: ContHistKey,
    /// ルートからの手数
    pub ply: i32,
    /// このplyで指している手
    pub current_move: Move,
    /// singular extension 判定で除外している手
    pub excluded_move: Move,
    /// killer手
    pub killers: [Move; 2],
    /// 静的評価値（王手中は `Value::NONE`）
    pub static_eval: Value,
    /// LMR用の履歴スコア
    pub stat_score: i32,
    /// このノードで探索した手の数
    pub move_count: i32,
    pub in_check: bool,
    pub tt_pv: bool,
    pub tt_hit: bool,
    /// ルートからの二重延長の回数
    pub double_extensions: i32,
    /// 子ノードでのbeta cutの連続回数
    pub cutoff_cnt: i32,
}

impl Stack {
    fn new(ply: i32) -> Self {
        Self {
            pv: Vec::with_capacity(MAX_PLY as usize + 1),
            cont_hist_key: ContHistKey::SENTINEL,
            ply,
            current_move: Move::NONE,
            excluded_move: Move::NONE,
            killers: [Move::NONE; 2],
            static_eval: Value::ZERO,
            stat_score: 0,
            move_count: 0,
            in_check: false,
            tt_pv: false,
            tt_hit: false,
            double_extensions: 0,
            cutoff_cnt: 0,
        }
    }

    /// 探索開始前の状態に戻す（読み筋の確保済み領域は残す）
    fn reset(&mut self) {
        self.pv.clear();
        self.cont_hist_key = ContHistKey::SENTINEL;
        self.current_move = Move::NONE;
        self.excluded_move = Move::NONE;
        self.killers = [Move::NONE; 2];
        self.static_eval = Value::ZERO;
        self.stat_score = 0;
        self.move_count = 0;
        self.in_check = false;
        self.tt_pv = false;
        self.tt_hit = false;
        self.double_extensions = 0;
        self.cutoff_cnt = 0;
    }
}

/// 探索スタック
pub type StackArray = Vec<Stack>;

/// 探索スタックを初期化
pub fn init_stack_array() -> StackArray {
    (0..STACK_SIZE).map(|i| Stack::new(i as i32 - STACK_OFFSET as i32)).collect()
}

/// 探索スタックを探索開始前の状態に戻す
pub fn reset_stack_array(stack: &mut [Stack]) {
    stack.iter_mut().for_each(Stack::reset);
}

/// plyの読み筋を `mv` + 子の読み筋で置き換える
#[inline]
pub fn update_pv(stack: &mut [Stack], ply: i32, mv: Move) {
    let idx = ss(ply);
    let (head, tail) = stack.split_at_mut(idx + 1);
    let pv = &mut head[idx].pv;
    pv.clear();
    pv.push(mv);
    pv.extend_from_slice(&tail[0].pv);
}

// =============================================================================
// 評価値の変換
// =============================================================================

/// 置換表に格納するための評価値変換
///
/// 詰みスコアを「現局面からの手数」に直す。
#[inline]
pub fn value_to_tt(v: Value, ply: i32) -> Value {
    if v.is_win() {
        v + ply
    } else if v.is_loss() {
        v - ply
    } else {
        v
    }
}

/// 置換表から取り出した評価値の変換
///
/// 50手ルールで届かない詰みスコアは、詰みでない最大値に丸める。
#[inline]
pub fn value_from_tt(v: Value, ply: i32, rule50: i32) -> Value {
    if v == Value::NONE {
        return Value::NONE;
    }

    if v.is_win() {
        if Value::MATE.raw() - v.raw() > 99 - rule50 {
            return Value::MATE_IN_MAX_PLY - 1;
        }
        return v - ply;
    }

    if v.is_loss() {
        if Value::MATE.raw() + v.raw() > 99 - rule50 {
            return Value::MATED_IN_MAX_PLY + 1;
        }
        return v + ply;
    }

    v
}

/// 引き分けの評価値
///
/// 繰り返しの盲点を避けるため、ノード数に応じて ±1 だけ揺らす。
#[inline]
pub fn draw_value(nodes: u64) -> Value {
    Value::new(Value::DRAW.raw() - 1 + (nodes & 2) as i32)
}

// =============================================================================
// RootMove
// =============================================================================

/// ルート局面の指し手1つ分の探索結果
#[derive(Clone, Debug)]
pub struct RootMove {
    pub score: Value,
    pub previous_score: Value,
    pub average_score: Value,
    pub sel_depth: i32,
    /// 読み筋（先頭がこの指し手）
    pub pv: Vec<Move>,
}

impl RootMove {
    pub fn new(mv: Move) -> Self {
        Self {
            score: -Value::INFINITE,
            previous_score: -Value::INFINITE,
            average_score: -Value::INFINITE,
            sel_depth: 0,
            pv: vec![mv],
        }
    }

    /// 先頭の指し手
    #[inline]
    pub fn mv(&self) -> Move {
        self.pv[0]
    }

    /// 置換表から相手の応手（ponder手）を補う
    ///
    /// 読み筋が1手しかないとき、最善手を指した局面の置換表エントリの手が合法なら追加する。
    pub fn extract_ponder_from_tt(&mut self, pos: &mut Position, tt: &TranspositionTable) -> bool {
        if self.pv.len() > 1 {
            return true;
        }
        let best = self.pv[0];
        if best.is_none() {
            return false;
        }

        let gives_check = pos.gives_check(best);
        pos.do_move(best, gives_check);
        let probe = tt.probe(pos.key());
        if probe.found {
            let mut legal = MoveList::new();
            generate_legal(pos, &mut legal);
            if legal.contains(probe.data.mv) {
                self.pv.push(probe.data.mv);
            }
        }
        pos.undo_move(best);

        self.pv.len() > 1
    }
}

/// ルート手のリスト
#[derive(Clone, Debug, Default)]
pub struct RootMoves {
    moves: Vec<RootMove>,
}

impl RootMoves {
    pub fn new() -> Self {
        Self { moves: Vec::new() }
    }

    /// 合法手からルート手を作る（`search_moves` が空でなければそれに含まれる手だけ）
    pub fn from_legal_moves(pos: &Position, search_moves: &[Move]) -> Self {
        let mut legal = MoveList::new();
        generate_legal(pos, &mut legal);
        let moves = legal
            .iter()
            .copied()
            .filter(|m| search_moves.is_empty() || search_moves.contains(m))
            .map(RootMove::new)
            .collect();
        Self { moves }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn push(&mut self, rm: RootMove) {
        self.moves.push(rm);
    }

    /// 指し手の位置を探す
    pub fn find(&self, mv: Move) -> Option<usize> {
        self.moves.iter().position(|rm| rm.mv() == mv)
    }

    /// [begin, end) の範囲に指し手が含まれるか
    pub fn contains_in(&self, begin: usize, end: usize, mv: Move) -> bool {
        self.moves[begin..end].iter().any(|rm| rm.mv() == mv)
    }

    /// [begin, end) を評価値の降順に安定ソート
    ///
    /// 同点なら前回の評価値で比べる。PV以外は `-INFINITE` なので元の順序が保たれる。
    pub fn stable_sort_range(&mut self, begin: usize, end: usize) {
        self.moves[begin..end].sort_by(|a, b| {
            b.score.cmp(&a.score).then_with(|| b.previous_score.cmp(&a.previous_score))
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RootMove> {
        self.moves.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, RootMove> {
        self.moves.iter_mut()
    }
}

impl std::ops::Index<usize> for RootMoves {
    type Output = RootMove;

    fn index(&self, idx: usize) -> &RootMove {
        &self.moves[idx]
    }
}

impl std::ops::IndexMut<usize> for RootMoves {
    fn index_mut(&mut self, idx: usize) -> &mut RootMove {
        &mut self.moves[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bound, Square};

    #[test]
    fn test_value_tt_roundtrip_mate() {
        let v = Value::mate_in(10);
        let stored = value_to_tt(v, 4);
        assert_eq!(stored, Value::mate_in(6));
        assert_eq!(value_from_tt(stored, 4, 0), v);

        let v = Value::mated_in(7);
        let stored = value_to_tt(v, 3);
        assert_eq!(value_from_tt(stored, 3, 0), v);
    }

    #[test]
    fn test_value_tt_ordinary_values_unchanged() {
        let v = Value::new(123);
        assert_eq!(value_to_tt(v, 20), v);
        assert_eq!(value_from_tt(v, 20, 50), v);
        assert_eq!(value_from_tt(Value::NONE, 3, 0), Value::NONE);
    }

    #[test]
    fn test_value_from_tt_downgrades_unreachable_mate() {
        // 50手ルールの残りより遠い詰みは信用しない
        let stored = Value::mate_in(20);
        let v = value_from_tt(stored, 0, 90);
        assert!(!v.is_win());
        assert_eq!(v, Value::MATE_IN_MAX_PLY - 1);

        let stored = Value::mated_in(20);
        let v = value_from_tt(stored, 0, 90);
        assert!(!v.is_loss());
    }

    #[test]
    fn test_draw_value_jitter() {
        assert_eq!(draw_value(0).raw(), -1);
        assert_eq!(draw_value(2).raw(), 1);
        assert_eq!(draw_value(5).raw(), -1);
    }

    #[test]
    fn test_update_pv() {
        let mut stack = init_stack_array();
        let m1 = Move::new(Square::E2, Square::E4);
        let m2 = Move::new(Square::E7, Square::E5);
        let m3 = Move::new(Square::G1, Square::F3);
        stack[ss(2)].pv = vec![m3];
        update_pv(&mut stack, 1, m2);
        update_pv(&mut stack, 0, m1);
        assert_eq!(stack[ss(0)].pv, vec![m1, m2, m3]);
    }

    #[test]
    fn test_stack_sentinels_before_root() {
        let stack = init_stack_array();
        assert_eq!(stack.len(), STACK_SIZE);
        assert_eq!(stack[ss(0)].ply, 0);
        assert_eq!(stack[ss(0) - 7].ply, -7);
        assert_eq!(stack[ss(MAX_PLY + 2)].ply, MAX_PLY + 2);
        assert!(stack[ss(0) - 1].current_move.is_none());
    }

    #[test]
    fn test_root_moves_sort_is_stable() {
        let pos = Position::startpos();
        let mut rms = RootMoves::from_legal_moves(&pos, &[]);
        assert_eq!(rms.len(), 20);

        let first = rms[0].mv();
        let last = rms[19].mv();
        rms[19].score = Value::new(50);
        rms.stable_sort_range(0, 20);
        assert_eq!(rms[0].mv(), last);
        assert_eq!(rms[1].mv(), first);
    }

    #[test]
    fn test_root_moves_search_moves_filter() {
        let pos = Position::startpos();
        let e4 = Move::new(Square::E2, Square::E4);
        let d4 = Move::new(Square::D2, Square::D4);
        let rms = RootMoves::from_legal_moves(&pos, &[e4, d4]);
        assert_eq!(rms.len(), 2);
        assert!(rms.find(e4).is_some());
        assert!(rms.contains_in(0, 2, d4));
    }

    #[test]
    fn test_extract_ponder_from_tt() {
        let mut pos = Position::startpos();
        let tt = TranspositionTable::new(1);
        let e4 = Move::new(Square::E2, Square::E4);
        let e5 = Move::new(Square::E7, Square::E5);

        pos.do_move(e4, false);
        let key = pos.key();
        tt.probe(key).writer.write(key, Value::ZERO, false, Bound::Exact, 5, e5, Value::ZERO);
        pos.undo_move(e4);

        let mut rm = RootMove::new(e4);
        assert!(rm.extract_ponder_from_tt(&mut pos, &tt));
        assert_eq!(rm.pv, vec![e4, e5]);
        assert_eq!(pos.key(), Position::startpos().key());
    }
}
