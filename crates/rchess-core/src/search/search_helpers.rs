//! 探索ヘルパー関数群
//!
//! 中断チェック、静的評価、指し手の実行とノード数の計上、ContinuationHistory の参照。

use crate::eval::EvalResult;
use crate::position::Position;
use crate::types::{Move, Piece, Square, Value};

use super::alpha_beta::{SearchContext, SearchState};
use super::history::ContHistKey;
use super::types::ss;

// =============================================================================
// 中断チェック
// =============================================================================

/// 時間・ノード数による停止判定（メインスレッドのみ）
///
/// 1024回（ノード数制限があればそれに応じて少なく）に1回だけ実際に判定する。
/// 停止条件を満たしたら共有の停止フラグを立てる。
pub(super) fn check_time(st: &mut SearchState, ctx: &SearchContext<'_>) {
    st.calls_cnt -= 1;
    if st.calls_cnt > 0 {
        return;
    }

    let limits = ctx.limits;
    st.calls_cnt = if limits.nodes > 0 {
        (limits.nodes / 1024).min(1024) as i32
    } else {
        1024
    };

    // ponder中は ponderhit まで止めない
    if ctx.signals.ponder() {
        return;
    }

    let elapsed = ctx.time.elapsed();
    let stop = (limits.use_time_management()
        && (elapsed > ctx.time.maximum() - 10
            || ctx.signals.stop_on_ponderhit()))
        || (limits.has_movetime() && elapsed >= limits.movetime)
        || (limits.has_nodes_limit() && ctx.nodes_searched() >= limits.nodes);

    if stop {
        ctx.signals.stop();
    }
}

/// 停止要求が出ているか
#[inline]
pub(super) fn stop_requested(ctx: &SearchContext<'_>) -> bool {
    ctx.signals.stopped()
}

// =============================================================================
// 評価
// =============================================================================

/// 静的評価（詰みスコアの範囲には入れない）
#[inline]
pub(super) fn evaluate(ctx: &SearchContext<'_>, pos: &Position) -> EvalResult {
    let mut r = ctx.evaluator.evaluate_full(pos);
    let bound = Value::MATE_IN_MAX_PLY.raw() - 1;
    r.value = Value::new(r.value.raw().clamp(-bound, bound));
    r
}

// =============================================================================
// 指し手の実行
// =============================================================================

/// 指し手を実行し、ノード数を計上する
#[inline]
pub(super) fn do_move(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    mv: Move,
    gives_check: bool,
) {
    ctx.tt.prefetch(pos.key_after(mv));
    st.nodes += 1;
    ctx.progress.set_nodes(st.nodes);
    pos.do_move(mv, gives_check);
}

/// singular extension 用に除外手を混ぜたキー
#[inline]
pub(super) fn make_key(key: u64) -> u64 {
    key.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407)
}

// =============================================================================
// ContinuationHistory 操作
// =============================================================================

/// 1〜6手前の ContinuationHistory キー
#[inline]
pub(super) fn cont_keys(st: &SearchState, ply: i32) -> [ContHistKey; 6] {
    std::array::from_fn(|i| st.stack[ss(ply - 1 - i as i32)].cont_hist_key)
}

/// このplyで指す手の ContinuationHistory キーを設定
#[inline]
pub(super) fn set_cont_history_for_move(
    st: &mut SearchState,
    ply: i32,
    in_check: bool,
    capture: bool,
    piece: Piece,
    to: Square,
) {
    st.stack[ss(ply)].cont_hist_key = ContHistKey::new(in_check, capture, piece, to);
}

/// null move の後は番兵を指す
#[inline]
pub(super) fn clear_cont_history_for_null(st: &mut SearchState, ply: i32) {
    st.stack[ss(ply)].cont_hist_key = ContHistKey::SENTINEL;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key_differs() {
        let k = 0x1234_5678_9abc_def0u64;
        let m = Move::new(Square::E2, Square::E4);
        assert_ne!(k ^ make_key(m.to_u16() as u64), k);
        assert_ne!(
            make_key(m.to_u16() as u64),
            make_key(Move::new(Square::D2, Square::D4).to_u16() as u64)
        );
    }
}
