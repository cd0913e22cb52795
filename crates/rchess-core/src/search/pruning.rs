//! 枝刈りヘルパー群
//!
//! - Razoring
//! - Futility Pruning（静的評価が beta を大きく上回るときの fail high）
//! - Null Move Pruning
//! - ProbCut
//! - Step14 pruning（move count, futility, SEE）

use crate::position::Position;
use crate::types::{Bound, Depth, Move, Value, piece_value_eg};

use super::alpha_beta::{
    FutilityParams, NullMoveParams, SearchContext, SearchState, Step14Context, Step14Outcome,
    TTContext,
};
use super::history::HistoryTables;
use super::movepicker::MovePicker;
use super::qsearch::qsearch;
use super::search_helpers::{clear_cont_history_for_null, do_move, set_cont_history_for_move};
use super::types::{NodeType, ss, value_to_tt};

// =============================================================================
// マージン
// =============================================================================

/// Futility margin
#[inline]
pub(super) fn futility_margin(depth: Depth, improving: bool) -> Value {
    Value::new(168 * (depth - improving as i32))
}

/// この手数以降の quiet 手は枝刈り候補
#[inline]
pub(super) const fn futility_move_count(improving: bool, depth: Depth) -> i32 {
    if improving {
        3 + depth * depth
    } else {
        (3 + depth * depth) / 2
    }
}

// =============================================================================
// Razoring
// =============================================================================

/// Razoring
///
/// 評価値が alpha を大きく下回るとき、静止探索で fail low が確認できればその値を返す。
#[inline]
pub(super) fn try_razoring(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    alpha: Value,
    ply: i32,
    eval: Value,
) -> Option<Value> {
    if depth <= 7 && eval < alpha - 348 - 258 * depth * depth {
        let value = qsearch::<{ NodeType::NonPV as u8 }>(st, ctx, pos, 0, alpha - 1, alpha, ply);
        if value < alpha {
            return Some(value);
        }
    }
    None
}

// =============================================================================
// Futility Pruning
// =============================================================================

/// Futility pruning（子ノード側）
#[inline]
pub(super) fn try_futility_pruning(p: FutilityParams) -> Option<Value> {
    if !p.tt_pv
        && p.depth < 8
        && p.eval - futility_margin(p.depth, p.improving) - p.prev_stat_score / 256 >= p.beta
        && p.eval >= p.beta
        && p.eval < Value::new(26305)
    {
        return Some(p.eval);
    }
    None
}

// =============================================================================
// Null Move Pruning
// =============================================================================

/// Null move pruning
///
/// search_node を呼び出すため、コールバックとして受け取る。
/// 深い探索では同じ手番側の null move を一定plyまで禁止して検証探索を行う。
#[allow(clippy::too_many_arguments)]
#[inline]
pub(super) fn try_null_move_pruning<F>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    p: NullMoveParams,
    ply: i32,
    search_node: F,
) -> Option<Value>
where
    F: Fn(&mut SearchState, &SearchContext<'_>, &mut Position, Depth, Value, Value, i32, bool) -> Value,
{
    let prev = &st.stack[ss(ply - 1)];
    if prev.current_move == Move::NULL
        || prev.stat_score >= 14695
        || p.eval < p.beta
        || p.eval < p.static_eval
        || p.static_eval < p.beta - 15 * p.depth - p.improvement / 15 + 201 + p.complexity / 24
        || p.excluded_move.is_some()
        || pos.non_pawn_material(p.us) == 0
        || (ply < st.nmp_min_ply && p.us == st.nmp_color)
    {
        return None;
    }

    let depth = p.depth;
    let beta = p.beta;
    let r = ((p.eval - beta).raw() / 147).min(5) + depth / 3 + 4 - (p.complexity > 650) as i32;

    st.stack[ss(ply)].current_move = Move::NULL;
    clear_cont_history_for_null(st, ply);

    pos.do_null_move();
    let mut null_value = -search_node(st, ctx, pos, depth - r, -beta, -beta + 1, ply + 1, !p.cut_node);
    pos.undo_null_move();

    if null_value < beta {
        return None;
    }

    // 証明されていない詰みスコアは返さない
    if null_value.is_win() {
        null_value = beta;
    }

    if st.nmp_min_ply != 0 || (beta.raw().abs() < Value::KNOWN_WIN.raw() && depth < 14) {
        return Some(null_value);
    }

    // 検証探索中は同じ手番の null move を禁止
    st.nmp_min_ply = ply + 3 * (depth - r) / 4;
    st.nmp_color = p.us;

    let v = search_node(st, ctx, pos, depth - r, beta - 1, beta, ply, false);

    st.nmp_min_ply = 0;

    if v >= beta { Some(null_value) } else { None }
}

// =============================================================================
// ProbCut
// =============================================================================

/// ProbCut
///
/// SEE の良い駒取りを浅く読み、beta より十分高い値が出れば枝を切る。
#[allow(clippy::too_many_arguments)]
#[inline]
pub(super) fn try_probcut<F>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    beta: Value,
    improving: bool,
    tt_ctx: &TTContext<'_>,
    ply: i32,
    cut_node: bool,
    excluded_move: Move,
    search_node: F,
) -> Option<Value>
where
    F: Fn(&mut SearchState, &SearchContext<'_>, &mut Position, Depth, Value, Value, i32, bool) -> Value,
{
    let prob_cut_beta = beta + 179 - 46 * improving as i32;

    if depth <= 4 || beta.is_mate_score() {
        return None;
    }
    // 置換表が浅い探索で既に prob_cut_beta 未満を示している
    if tt_ctx.hit
        && tt_ctx.data.depth >= depth - 3
        && tt_ctx.value != Value::NONE
        && tt_ctx.value < prob_cut_beta
    {
        return None;
    }

    let static_eval = st.stack[ss(ply)].static_eval;
    let in_check = st.stack[ss(ply)].in_check;
    let mut mp = MovePicker::new_probcut(pos, tt_ctx.mv, prob_cut_beta - static_eval, depth - 3);

    loop {
        let mv = mp.next_move(pos, &st.history);
        if mv.is_none() {
            break;
        }
        if mv == excluded_move || !pos.legal(mv) {
            continue;
        }

        let gives_check = pos.gives_check(mv);
        st.stack[ss(ply)].current_move = mv;
        set_cont_history_for_move(st, ply, in_check, true, pos.moved_piece(mv), mv.to());
        do_move(st, ctx, pos, mv, gives_check);

        let mut value = -qsearch::<{ NodeType::NonPV as u8 }>(
            st,
            ctx,
            pos,
            0,
            -prob_cut_beta,
            -prob_cut_beta + 1,
            ply + 1,
        );

        if value >= prob_cut_beta {
            value = -search_node(
                st,
                ctx,
                pos,
                depth - 4,
                -prob_cut_beta,
                -prob_cut_beta + 1,
                ply + 1,
                !cut_node,
            );
        }

        pos.undo_move(mv);

        if value >= prob_cut_beta {
            tt_ctx.writer.write(
                tt_ctx.key,
                value_to_tt(value, ply),
                st.stack[ss(ply)].tt_pv,
                Bound::Lower,
                depth - 3,
                mv,
                static_eval,
            );
            return Some(value);
        }
    }

    None
}

/// 王手されている局面での小さな ProbCut
///
/// 置換表の駒取りが十分深い下限値を持っていれば、探索せずに返す。
#[inline]
pub(super) fn try_small_probcut(depth: Depth, beta: Value, tt_ctx: &TTContext<'_>) -> Option<Value> {
    let prob_cut_beta = beta + 481;
    if depth >= 2
        && tt_ctx.capture
        && tt_ctx.data.bound.is_lower()
        && tt_ctx.data.depth >= depth - 3
        && tt_ctx.value >= prob_cut_beta
        && tt_ctx.value.raw().abs() <= Value::KNOWN_WIN.raw()
        && beta.raw().abs() <= Value::KNOWN_WIN.raw()
    {
        return Some(prob_cut_beta);
    }
    None
}

// =============================================================================
// Step14 Pruning
// =============================================================================

/// Step14 の枝刈り
///
/// 駒取り・王手は futility と SEE、quiet 手は履歴・futility・SEE で判定する。
#[inline]
pub(super) fn step14_pruning(history: &HistoryTables, c: &Step14Context<'_>) -> Step14Outcome {
    let to = c.mv.to();
    let lmr_depth = c.lmr_depth;

    if c.capture || c.gives_check {
        let captured = c.pos.piece_on(to);
        if !c.pos.empty(to) && !c.gives_check && !c.pv_node && lmr_depth < 6 && !c.in_check {
            let captured_value = captured.piece_type_opt().map_or(0, piece_value_eg);
            let capt_hist = history.capture_history.get(c.moved_piece, to, captured) as i32;
            if c.static_eval + 281 + 179 * lmr_depth + captured_value + capt_hist / 6 < c.alpha {
                return Step14Outcome::Skip;
            }
        }

        if !c.pos.see_ge(c.mv, Value::new(-203 * c.depth)) {
            return Step14Outcome::Skip;
        }
    } else {
        let cont = |i: usize| history.continuation(c.cont_keys[i]).get(c.moved_piece, to) as i32;
        let mut hist = cont(0) + cont(1) + cont(3);

        if lmr_depth < 5 && hist < -3875 * (c.depth - 1) {
            return Step14Outcome::Skip;
        }

        hist += 2 * history.main_history.get(c.us, c.mv) as i32;

        if !c.in_check && lmr_depth < 11 && c.static_eval + 122 + 138 * lmr_depth + hist / 60 <= c.alpha
        {
            return Step14Outcome::Skip;
        }

        if !c.pos.see_ge(c.mv, Value::new(-25 * lmr_depth * lmr_depth - 20 * lmr_depth)) {
            return Step14Outcome::Skip;
        }
    }

    Step14Outcome::Continue
}
