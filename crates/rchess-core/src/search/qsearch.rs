//! 静止探索（Quiescence Search）
//!
//! 駒取り（浅い深さでは王手も）だけを読み、水平線効果を抑える。
//! 王手されている局面では全回避手を読む。

use crate::position::Position;
use crate::types::{
    Bound, DEPTH_NONE, DEPTH_QS_CHECKS, DEPTH_QS_NO_CHECKS, Depth, MAX_PLY, Move, Value,
    piece_value_eg,
};

use super::alpha_beta::{SearchContext, SearchState};
use super::history::COUNTER_MOVE_PRUNE_THRESHOLD;
use super::movepicker::MovePicker;
use super::search_helpers::{cont_keys, do_move, evaluate, set_cont_history_for_move};
use super::types::{NodeType, ss, update_pv, value_from_tt, value_to_tt};

/// 静止探索
///
/// `NT` は `NodeType::PV` か `NodeType::NonPV`。`depth` は 0 以下。
pub(super) fn qsearch<const NT: u8>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    alpha: Value,
    beta: Value,
    ply: i32,
) -> Value {
    let pv_node = NT == NodeType::PV as u8;
    let mut alpha = alpha;

    if pv_node {
        st.stack[ss(ply + 1)].pv.clear();
        st.stack[ss(ply)].pv.clear();
    }

    let in_check = pos.in_check();
    st.stack[ss(ply)].in_check = in_check;
    let mut best_move = Move::NONE;
    let mut move_count = 0;

    if pos.is_draw(ply) || ply >= MAX_PLY {
        return if ply >= MAX_PLY && !in_check {
            evaluate(ctx, pos).value
        } else {
            Value::DRAW
        };
    }

    // 王手を生成する深さかどうかで置換表の深さを分ける
    let tt_depth = if in_check || depth >= DEPTH_QS_CHECKS {
        DEPTH_QS_CHECKS
    } else {
        DEPTH_QS_NO_CHECKS
    };

    // =========================================================================
    // 置換表
    // =========================================================================
    let pos_key = pos.key();
    let probe = ctx.tt.probe(pos_key);
    let tt_hit = probe.found;
    let tte = probe.data;
    st.stack[ss(ply)].tt_hit = tt_hit;
    let tt_value = if tt_hit {
        value_from_tt(tte.value, ply, pos.rule50_count())
    } else {
        Value::NONE
    };
    let tt_move = if tt_hit { tte.mv } else { Move::NONE };
    let pv_hit = tt_hit && tte.is_pv;

    if !pv_node
        && tt_hit
        && tte.depth >= tt_depth
        && tt_value != Value::NONE
        && tte.bound.can_cutoff(tt_value, beta)
    {
        return tt_value;
    }

    // =========================================================================
    // 静的評価（stand pat）
    // =========================================================================
    let mut best_value;
    let futility_base;

    if in_check {
        st.stack[ss(ply)].static_eval = Value::NONE;
        best_value = -Value::INFINITE;
        futility_base = -Value::INFINITE;
    } else {
        let static_eval;
        if tt_hit {
            static_eval = if tte.eval == Value::NONE {
                evaluate(ctx, pos).value
            } else {
                tte.eval
            };
            best_value = static_eval;

            let use_tt = tt_value != Value::NONE
                && if tt_value > best_value {
                    tte.bound.is_lower()
                } else {
                    tte.bound.is_upper()
                };
            if use_tt {
                best_value = tt_value;
            }
        } else {
            // null move の直後は符号を反転するだけでよい
            let prev = &st.stack[ss(ply - 1)];
            static_eval = if prev.current_move != Move::NULL {
                evaluate(ctx, pos).value
            } else {
                -prev.static_eval
            };
            best_value = static_eval;
        }
        st.stack[ss(ply)].static_eval = static_eval;

        if best_value >= beta {
            if !tt_hit {
                probe.writer.write(
                    pos_key,
                    value_to_tt(best_value, ply),
                    false,
                    Bound::Lower,
                    DEPTH_NONE,
                    Move::NONE,
                    static_eval,
                );
            }
            return best_value;
        }

        if pv_node && best_value > alpha {
            alpha = best_value;
        }

        futility_base = best_value + 118;
    }

    // =========================================================================
    // 指し手ループ
    // =========================================================================
    let cont_keys = cont_keys(st, ply);
    let prev_sq = st.stack[ss(ply - 1)].current_move.to();
    let mut mp = MovePicker::new_qsearch(pos, tt_move, depth, cont_keys, prev_sq);
    let mut quiet_check_evasions = 0;

    loop {
        let mv = mp.next_move(pos, &st.history);
        if mv.is_none() {
            break;
        }
        if !pos.legal(mv) {
            continue;
        }

        let gives_check = pos.gives_check(mv);
        let capture = pos.is_capture(mv);
        move_count += 1;

        // Futility pruning と SEE による枝刈り
        if best_value > Value::MATED_IN_MAX_PLY
            && !gives_check
            && mv.to() != prev_sq
            && futility_base > -Value::KNOWN_WIN
            && !mv.is_promotion()
        {
            if move_count > 2 {
                continue;
            }

            let captured = pos.piece_on(mv.to()).piece_type_opt().map_or(0, piece_value_eg);
            let futility_value = futility_base + captured;
            if futility_value <= alpha {
                best_value = best_value.max(futility_value);
                continue;
            }

            if futility_base <= alpha && !pos.see_ge(mv, Value::new(1)) {
                best_value = best_value.max(futility_base);
                continue;
            }
        }

        // 駒損する手は読まない
        if best_value > Value::MATED_IN_MAX_PLY && !pos.see_ge(mv, Value::ZERO) {
            continue;
        }

        let moved_piece = pos.moved_piece(mv);
        st.stack[ss(ply)].current_move = mv;
        set_cont_history_for_move(st, ply, in_check, capture, moved_piece, mv.to());

        // 履歴の悪い quiet な回避手は読まない
        if !capture && best_value > Value::MATED_IN_MAX_PLY {
            let to = mv.to();
            let c0 = st.history.continuation(cont_keys[0]).get(moved_piece, to) as i32;
            let c1 = st.history.continuation(cont_keys[1]).get(moved_piece, to) as i32;
            if c0 < COUNTER_MOVE_PRUNE_THRESHOLD && c1 < COUNTER_MOVE_PRUNE_THRESHOLD {
                continue;
            }
        }

        // quiet な回避手は2つまで
        if best_value > Value::MATED_IN_MAX_PLY && quiet_check_evasions > 1 && !capture && in_check
        {
            continue;
        }
        quiet_check_evasions += (!capture && in_check) as i32;

        do_move(st, ctx, pos, mv, gives_check);
        let value = -qsearch::<NT>(st, ctx, pos, depth - 1, -beta, -alpha, ply + 1);
        pos.undo_move(mv);

        if value > best_value {
            best_value = value;

            if value > alpha {
                best_move = mv;

                if pv_node {
                    update_pv(&mut st.stack, ply, mv);
                }

                if pv_node && value < beta {
                    alpha = value;
                } else {
                    break;
                }
            }
        }
    }

    // 王手を回避できなければ詰み
    if in_check && best_value == -Value::INFINITE {
        return Value::mated_in(ply);
    }

    probe.writer.write(
        pos_key,
        value_to_tt(best_value, ply),
        pv_hit,
        if best_value >= beta {
            Bound::Lower
        } else {
            Bound::Upper
        },
        tt_depth,
        best_move,
        st.stack[ss(ply)].static_eval,
    );

    best_value
}
