//! Alpha-Beta探索の実装
//!
//! - 反復深化 + Aspiration Window
//! - Principal Variation Search (PVS)
//! - 各種枝刈り: Razoring, Futility, NMP, ProbCut, LMP, SEE
//! - 延長: Singular Extension, 王手延長
//! - Late Move Reduction と履歴統計の更新

use std::sync::Arc;

use log::debug;

use crate::eval::Evaluator;
use crate::position::Position;
use crate::tt::{TTData, TTWriter, TranspositionTable};
use crate::types::{
    Bound, Color, DEPTH_NONE, Depth, MAX_MOVES, MAX_PLY, Move, PAWN_VALUE_MG, Piece, Square, Value,
};

use super::engine::{SearchInfo, build_infos};
use super::history::{ContHistKey, HistoryTables, stat_bonus};
use super::movepicker::MovePicker;
use super::pruning::{
    futility_move_count, step14_pruning, try_futility_pruning, try_null_move_pruning,
    try_probcut, try_razoring, try_small_probcut,
};
use super::qsearch::qsearch;
use super::search_helpers::{
    check_time, cont_keys, do_move, evaluate, make_key, set_cont_history_for_move,
    stop_requested,
};
use super::thread::{SearchProgress, SearchSignals, SearchTask};
use super::time_manager::{
    RunningAverage, SINGLE_MOVE_TIME_LIMIT, calculate_best_move_instability,
    calculate_complex_position, calculate_falling_eval, calculate_time_reduction,
};
use super::types::{
    NodeType, RootMoves, StackArray, draw_value, init_stack_array, reset_stack_array, ss,
    update_pv, value_from_tt, value_to_tt,
};
use super::{LimitsType, TimeManagement};

// =============================================================================
// Reductions
// =============================================================================

/// LMR の削減量テーブル
///
/// スレッド数が多いほど少しだけ強く削減する。
#[derive(Clone)]
pub struct Reductions {
    table: [i32; MAX_MOVES],
}

impl Reductions {
    pub fn new(threads: usize) -> Self {
        let mut table = [0; MAX_MOVES];
        let scale = 20.81 + (threads.max(1) as f64).ln() / 2.0;
        for (i, r) in table.iter_mut().enumerate().skip(1) {
            *r = (scale * (i as f64).ln()) as i32;
        }
        Self { table }
    }

    /// 削減量
    ///
    /// ルートの窓に対して現在の窓が狭いほど強く削減する。
    #[inline]
    pub fn reduction(
        &self,
        improving: bool,
        depth: Depth,
        move_count: i32,
        delta: Value,
        root_delta: i32,
    ) -> Depth {
        let d = (depth.max(0) as usize).min(MAX_MOVES - 1);
        let mn = (move_count.max(0) as usize).min(MAX_MOVES - 1);
        let r = self.table[d] * self.table[mn];
        (r + 1463 - delta.raw() * 1024 / root_delta.max(1)) / 1024 + (!improving && r > 1010) as i32
    }
}

// =============================================================================
// 枝刈りに渡す文脈
// =============================================================================

/// 置換表プローブの結果をまとめたコンテキスト
pub(super) struct TTContext<'a> {
    pub(super) key: u64,
    pub(super) writer: TTWriter<'a>,
    pub(super) data: TTData,
    pub(super) hit: bool,
    pub(super) mv: Move,
    pub(super) value: Value,
    pub(super) capture: bool,
}

/// Step14の枝刈り判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Step14Outcome {
    Skip,
    Continue,
}

/// Futility判定に必要な情報
#[derive(Clone, Copy)]
pub(super) struct FutilityParams {
    pub(super) depth: Depth,
    pub(super) beta: Value,
    pub(super) eval: Value,
    pub(super) improving: bool,
    pub(super) tt_pv: bool,
    /// 1手前の statScore
    pub(super) prev_stat_score: i32,
}

/// Null move pruning に必要な情報
#[derive(Clone, Copy)]
pub(super) struct NullMoveParams {
    pub(super) depth: Depth,
    pub(super) beta: Value,
    pub(super) eval: Value,
    pub(super) static_eval: Value,
    pub(super) improvement: i32,
    pub(super) complexity: i32,
    pub(super) excluded_move: Move,
    pub(super) us: Color,
    pub(super) cut_node: bool,
}

/// Step14 の枝刈りに必要な文脈
pub(super) struct Step14Context<'a> {
    pub(super) pos: &'a Position,
    pub(super) mv: Move,
    pub(super) depth: Depth,
    pub(super) lmr_depth: i32,
    pub(super) capture: bool,
    pub(super) gives_check: bool,
    pub(super) pv_node: bool,
    pub(super) in_check: bool,
    pub(super) static_eval: Value,
    pub(super) alpha: Value,
    pub(super) moved_piece: Piece,
    pub(super) cont_keys: &'a [ContHistKey; 6],
    pub(super) us: Color,
}

// =============================================================================
// SearchContext / SearchState
// =============================================================================

/// 探索中に変化しない共有データ
///
/// 1回の `go` の間、各ノードで共有される参照群。
pub struct SearchContext<'a> {
    /// 置換表（全スレッド共有）
    pub tt: &'a TranspositionTable,
    pub evaluator: &'a dyn Evaluator,
    pub limits: &'a LimitsType,
    pub time: &'a TimeManagement,
    /// 停止・ponder フラグ
    pub signals: &'a SearchSignals,
    pub reductions: &'a Reductions,
    /// このスレッドのノード数の公開先
    pub progress: &'a SearchProgress,
    /// 全スレッドのノード数（メインスレッドが合計に使う）
    pub all_progress: &'a [Arc<SearchProgress>],
    /// スレッドID（0=main）
    pub thread_id: usize,
}

impl SearchContext<'_> {
    #[inline]
    pub fn is_main(&self) -> bool {
        self.thread_id == 0
    }

    /// 全スレッドの探索ノード数の合計
    pub fn nodes_searched(&self) -> u64 {
        self.all_progress.iter().map(|p| p.nodes()).sum()
    }
}

/// 探索中に変化する状態
///
/// 各探索スレッドが持つ可変状態。履歴は `go` をまたいで保持する。
pub struct SearchState {
    /// 探索ノード数
    pub nodes: u64,
    /// 探索スタック
    pub stack: StackArray,
    /// 履歴統計
    pub history: Box<HistoryTables>,
    /// ルート手
    pub root_moves: RootMoves,
    pub root_depth: Depth,
    /// 完了済み深さ
    pub completed_depth: Depth,
    /// 前回の `go` で採用されたスレッドの完了深さ
    pub previous_depth: Depth,
    /// 選択的深さ
    pub sel_depth: i32,
    /// ルートでのウィンドウ幅（beta - alpha）。LMRスケール用。
    pub root_delta: i32,
    /// MultiPVで現在探索中の候補番号
    pub pv_idx: usize,
    pub pv_last: usize,
    pub best_value: Value,
    /// Null Move Pruning の検証探索用
    pub nmp_min_ply: i32,
    pub nmp_color: Color,
    /// 局面の複雑さの移動平均（時間管理用）
    pub complexity_average: RunningAverage,
    /// check_time 呼び出しカウンター
    pub calls_cnt: i32,
}

impl SearchState {
    pub fn new() -> Self {
        Self {
            nodes: 0,
            stack: init_stack_array(),
            history: HistoryTables::new_boxed(),
            root_moves: RootMoves::new(),
            root_depth: 0,
            completed_depth: 0,
            previous_depth: 0,
            sel_depth: 0,
            root_delta: 1,
            pv_idx: 0,
            pv_last: 0,
            best_value: -Value::INFINITE,
            nmp_min_ply: 0,
            nmp_color: Color::White,
            complexity_average: RunningAverage::default(),
            calls_cnt: 0,
        }
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// メインスレッド専用の状態
// =============================================================================

/// メインスレッドだけが持つ、`go` をまたぐ状態と出力先
pub struct MainThreadState<'a> {
    /// 前回採用した最善手の評価値（初回は `INFINITE`）
    pub best_previous_score: Value,
    pub best_previous_average_score: Value,
    pub previous_time_reduction: f64,
    /// 読み筋の出力先
    pub on_info: &'a mut dyn FnMut(&SearchInfo),
}

impl MainThreadState<'_> {
    /// 現在のルート手から読み筋を出力する
    fn report(&mut self, st: &SearchState, ctx: &SearchContext<'_>, pos: &Position, depth: Depth) {
        let multi_pv = ctx.limits.multi_pv.max(1).min(st.root_moves.len());
        let infos = build_infos(
            &st.root_moves,
            depth,
            multi_pv,
            ctx.nodes_searched(),
            ctx.time.elapsed(),
            ctx.tt.hashfull(),
            pos.is_chess960(),
        );
        for info in &infos {
            (self.on_info)(info);
        }
    }
}

// =============================================================================
// SearchWorker
// =============================================================================

/// 探索用のワーカー
///
/// Workerはゲーム全体で再利用される。
/// 履歴統計は `clear()`（新規対局）でのみ消去し、`go` では保持する。
pub struct SearchWorker {
    /// スレッドID（0=main）
    pub thread_id: usize,
    /// ノード数と最善手変更回数の公開先
    pub progress: Arc<SearchProgress>,
    /// 探索中に変化する状態
    pub state: SearchState,
}

impl SearchWorker {
    /// 新しいSearchWorkerを作成
    ///
    /// 履歴テーブルが大きいので Box で返す。
    pub fn new(thread_id: usize, progress: Arc<SearchProgress>) -> Box<Self> {
        Box::new(Self {
            thread_id,
            progress,
            state: SearchState::new(),
        })
    }

    /// 新規対局: 全履歴をクリア
    pub fn clear(&mut self) {
        self.state.history.clear();
        self.state.previous_depth = 0;
    }

    /// goで呼び出し：探索状態のリセット（履歴はクリアしない）
    pub fn prepare_search(&mut self, root_moves: RootMoves) {
        let st = &mut self.state;
        st.nodes = 0;
        st.sel_depth = 0;
        st.root_depth = 0;
        st.completed_depth = 0;
        st.root_delta = 1;
        st.pv_idx = 0;
        st.pv_last = 0;
        st.best_value = -Value::INFINITE;
        st.nmp_min_ply = 0;
        st.nmp_color = Color::White;
        st.calls_cnt = 0;
        st.root_moves = root_moves;
        reset_stack_array(&mut st.stack);
        self.progress.reset();
    }

    /// 探索のメインエントリーポイント
    ///
    /// 停止フラグが立つか、メインスレッドなら深さ制限に達するまで反復深化する。
    pub fn search(
        &mut self,
        pos: &mut Position,
        task: &SearchTask,
        main: Option<&mut MainThreadState<'_>>,
    ) {
        let ctx = SearchContext {
            tt: &task.tt,
            evaluator: task.evaluator.as_ref(),
            limits: &task.limits,
            time: &task.time,
            signals: &task.signals,
            reductions: &task.reductions,
            progress: &self.progress,
            all_progress: &task.progress,
            thread_id: self.thread_id,
        };
        iterative_deepening(&mut self.state, &ctx, pos, main);
    }
}

// =============================================================================
// 反復深化
// =============================================================================

fn iterative_deepening(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    mut main: Option<&mut MainThreadState<'_>>,
) {
    let is_main = main.is_some();
    let mut last_best_move = Move::NONE;
    let mut last_best_move_depth = 0;
    let mut time_reduction = 1.0;
    let mut tot_best_move_changes = 0.0;
    let mut iter_idx = 0;

    let mut alpha = -Value::INFINITE;
    let mut beta = Value::INFINITE;
    let mut delta = -Value::INFINITE;
    st.best_value = -Value::INFINITE;

    let mut iter_value = [Value::ZERO; 4];
    if let Some(m) = main.as_deref() {
        if m.best_previous_score != Value::INFINITE {
            iter_value = [m.best_previous_score; 4];
        }
    }

    let multi_pv = ctx.limits.multi_pv.max(1).min(st.root_moves.len());
    st.complexity_average.set(174, 1);
    let mut search_again_counter = 0;

    loop {
        st.root_depth += 1;
        if st.root_depth >= MAX_PLY || stop_requested(ctx) {
            break;
        }
        if is_main && ctx.limits.has_depth_limit() && st.root_depth > ctx.limits.depth {
            break;
        }

        if is_main {
            tot_best_move_changes /= 2.0;
        }

        for rm in st.root_moves.iter_mut() {
            rm.previous_score = rm.score;
        }

        st.pv_last = st.root_moves.len();

        if !ctx.signals.increase_depth() {
            search_again_counter += 1;
        }

        st.pv_idx = 0;
        while st.pv_idx < multi_pv && !stop_requested(ctx) {
            let pv_idx = st.pv_idx;
            st.sel_depth = 0;

            // Aspiration Window
            if st.root_depth >= 4 {
                let prev = st.root_moves[pv_idx].average_score;
                delta = Value::new(16 + prev.raw() * prev.raw() / 19178);
                alpha = (prev - delta).max(-Value::INFINITE);
                beta = (prev + delta).min(Value::INFINITE);
            }

            let mut failed_high_cnt = 0;
            loop {
                let adjusted_depth =
                    (st.root_depth - failed_high_cnt - 3 * (search_again_counter + 1) / 4).max(1);
                st.best_value = search_node::<{ NodeType::Root as u8 }>(
                    st,
                    ctx,
                    pos,
                    adjusted_depth,
                    alpha,
                    beta,
                    0,
                    false,
                );

                let pv_last = st.pv_last;
                st.root_moves.stable_sort_range(pv_idx, pv_last);

                if stop_requested(ctx) {
                    break;
                }

                if let Some(m) = main.as_deref_mut() {
                    if multi_pv == 1
                        && (st.best_value <= alpha || st.best_value >= beta)
                        && ctx.time.elapsed() > 3000
                    {
                        m.report(st, ctx, pos, st.root_depth);
                    }
                }

                if st.best_value <= alpha {
                    beta = Value::new((alpha.raw() + beta.raw()) / 2);
                    alpha = (st.best_value - delta).max(-Value::INFINITE);
                    failed_high_cnt = 0;
                    if is_main {
                        ctx.signals.set_stop_on_ponderhit(false);
                    }
                } else if st.best_value >= beta {
                    beta = (st.best_value + delta).min(Value::INFINITE);
                    failed_high_cnt += 1;
                } else {
                    break;
                }

                delta += delta / 4 + 2;
            }

            st.root_moves.stable_sort_range(0, pv_idx + 1);

            if let Some(m) = main.as_deref_mut() {
                if stop_requested(ctx) || pv_idx + 1 == multi_pv || ctx.time.elapsed() > 3000 {
                    m.report(st, ctx, pos, st.root_depth);
                }
            }

            st.pv_idx += 1;
        }

        if !stop_requested(ctx) {
            st.completed_depth = st.root_depth;
        }

        if st.root_moves[0].mv() != last_best_move {
            last_best_move = st.root_moves[0].mv();
            last_best_move_depth = st.root_depth;
        }

        // 指定手数以内の詰みを見つけた
        if ctx.limits.mate > 0
            && st.best_value.is_win()
            && Value::MATE.raw() - st.best_value.raw() <= 2 * ctx.limits.mate
        {
            ctx.signals.stop();
        }

        let Some(m) = main.as_deref_mut() else {
            continue;
        };

        if !stop_requested(ctx) {
            debug!(
                "depth {} seldepth {} score {} nodes {} pv {}",
                st.completed_depth,
                st.root_moves[0].sel_depth,
                st.root_moves[0].score.raw(),
                ctx.nodes_searched(),
                st.root_moves[0].mv().to_uci(pos.is_chess960())
            );
        }

        for p in ctx.all_progress {
            tot_best_move_changes += p.take_best_move_changes() as f64;
        }

        if ctx.limits.use_time_management()
            && !stop_requested(ctx)
            && !ctx.signals.stop_on_ponderhit()
        {
            let falling_eval = calculate_falling_eval(
                m.best_previous_average_score.raw(),
                iter_value[iter_idx].raw(),
                st.best_value.raw(),
            );
            time_reduction = calculate_time_reduction(st.completed_depth, last_best_move_depth);
            let reduction = (1.56 + m.previous_time_reduction) / (2.20 * time_reduction);
            let instability =
                calculate_best_move_instability(tot_best_move_changes, ctx.all_progress.len());
            let complex_position = calculate_complex_position(st.complexity_average.value());

            let mut total_time = ctx.time.optimum() as f64
                * falling_eval
                * reduction
                * instability
                * complex_position;
            if st.root_moves.len() == 1 {
                total_time = total_time.min(SINGLE_MOVE_TIME_LIMIT);
            }

            let elapsed = ctx.time.elapsed() as f64;
            if elapsed > total_time {
                // ponder中なら ponderhit を待ってから止める
                if ctx.signals.ponder() {
                    ctx.signals.set_stop_on_ponderhit(true);
                } else {
                    ctx.signals.stop();
                }
            } else if ctx.signals.increase_depth()
                && !ctx.signals.ponder()
                && elapsed > total_time * 0.43
            {
                ctx.signals.set_increase_depth(false);
            } else {
                ctx.signals.set_increase_depth(true);
            }
        }

        iter_value[iter_idx] = st.best_value;
        iter_idx = (iter_idx + 1) & 3;
    }

    if let Some(m) = main {
        m.previous_time_reduction = time_reduction;
    }
}

// =============================================================================
// 通常探索
// =============================================================================

/// 通常探索ノード
///
/// `NT` は [`NodeType`] の値。
#[allow(clippy::too_many_arguments)]
pub(super) fn search_node<const NT: u8>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    alpha: Value,
    beta: Value,
    ply: i32,
    cut_node: bool,
) -> Value {
    let pv_node = NT != NodeType::NonPV as u8;
    let root_node = NT == NodeType::Root as u8;
    let max_next_depth = if root_node { depth } else { depth + 1 };

    let mut depth = depth;
    let mut alpha = alpha;
    let mut beta = beta;

    // 繰り返しに持ち込める手があれば少なくとも引き分け
    if !root_node && pos.rule50_count() >= 3 && alpha < Value::DRAW && pos.has_game_cycle(ply) {
        alpha = draw_value(st.nodes);
        if alpha >= beta {
            return alpha;
        }
    }

    if depth <= 0 {
        return if pv_node {
            qsearch::<{ NodeType::PV as u8 }>(st, ctx, pos, 0, alpha, beta, ply)
        } else {
            qsearch::<{ NodeType::NonPV as u8 }>(st, ctx, pos, 0, alpha, beta, ply)
        };
    }

    // =========================================================================
    // Step 1. 初期化
    // =========================================================================
    let in_check = pos.in_check();
    let prior_capture = pos.captured_piece().is_some();
    let us = pos.side_to_move();
    st.stack[ss(ply)].in_check = in_check;
    st.stack[ss(ply)].move_count = 0;
    let mut move_count = 0;
    let mut best_value = -Value::INFINITE;
    let max_value = Value::INFINITE;

    if ctx.is_main() {
        check_time(st, ctx);
    }

    if pv_node && st.sel_depth < ply + 1 {
        st.sel_depth = ply + 1;
    }

    // =========================================================================
    // Step 2. 中断・引き分け・mate distance pruning
    // =========================================================================
    if !root_node {
        if stop_requested(ctx) || pos.is_draw(ply) || ply >= MAX_PLY {
            return if ply >= MAX_PLY && !in_check {
                evaluate(ctx, pos).value
            } else {
                draw_value(st.nodes)
            };
        }

        alpha = alpha.max(Value::mated_in(ply));
        beta = beta.min(Value::mate_in(ply + 1));
        if alpha >= beta {
            return alpha;
        }
    } else {
        st.root_delta = (beta - alpha).raw();
    }

    st.stack[ss(ply + 1)].tt_pv = false;
    st.stack[ss(ply + 1)].excluded_move = Move::NONE;
    st.stack[ss(ply + 2)].killers = [Move::NONE; 2];
    st.stack[ss(ply + 2)].cutoff_cnt = 0;
    st.stack[ss(ply)].double_extensions = st.stack[ss(ply - 1)].double_extensions;
    let prev_sq = st.stack[ss(ply - 1)].current_move.to();
    if !root_node {
        st.stack[ss(ply + 2)].stat_score = 0;
    }

    // =========================================================================
    // Step 3. 置換表
    // =========================================================================
    let excluded_move = st.stack[ss(ply)].excluded_move;
    let pos_key = if excluded_move.is_none() {
        pos.key()
    } else {
        pos.key() ^ make_key(excluded_move.to_u16() as u64)
    };
    let probe = ctx.tt.probe(pos_key);
    let tt_hit = probe.found;
    let tte = probe.data;
    st.stack[ss(ply)].tt_hit = tt_hit;
    let tt_value = if tt_hit {
        value_from_tt(tte.value, ply, pos.rule50_count())
    } else {
        Value::NONE
    };
    let tt_move = if root_node {
        st.root_moves[st.pv_idx].mv()
    } else if tt_hit {
        tte.mv
    } else {
        Move::NONE
    };
    let tt_capture = tt_move.is_some() && pos.is_capture(tt_move);
    if excluded_move.is_none() {
        st.stack[ss(ply)].tt_pv = pv_node || (tt_hit && tte.is_pv);
    }

    let tt_ctx = TTContext {
        key: pos_key,
        writer: probe.writer,
        data: tte,
        hit: tt_hit,
        mv: tt_move,
        value: tt_value,
        capture: tt_capture,
    };

    // 非PVノードでは十分な深さの置換表の値で枝を切る
    if !pv_node
        && tt_hit
        && tte.depth > depth - (tte.bound == Bound::Exact) as i32
        && tt_value != Value::NONE
        && tte.bound.can_cutoff(tt_value, beta)
    {
        if tt_move.is_some() {
            if tt_value >= beta {
                if !tt_capture {
                    update_quiet_stats(st, pos, ply, tt_move, stat_bonus(depth));
                }
                // 直前の手が早々に読まれて切られたなら、その手にペナルティ
                if st.stack[ss(ply - 1)].move_count <= 2 && !prior_capture {
                    update_continuation_histories(
                        st,
                        ply - 1,
                        pos.piece_on(prev_sq),
                        prev_sq,
                        -stat_bonus(depth + 1),
                    );
                }
            } else if !tt_capture {
                let penalty = -stat_bonus(depth);
                st.history.main_history.update(us, tt_move, penalty);
                update_continuation_histories(st, ply, pos.moved_piece(tt_move), tt_move.to(), penalty);
            }
        }

        // 50手ルールが近いときは置換表の値を信用しない
        if pos.rule50_count() < 90 {
            return tt_value;
        }
    }

    // =========================================================================
    // Step 4-8. 静的評価と指し手ループ前の枝刈り
    // =========================================================================
    let improving = if in_check {
        st.stack[ss(ply)].static_eval = Value::NONE;
        false
    } else {
        let (eval, static_eval, complexity) = if tt_hit {
            let (se, cx) = if tte.eval == Value::NONE {
                let r = evaluate(ctx, pos);
                (r.value, r.complexity)
            } else {
                (tte.eval, tte.eval.raw().abs())
            };
            // 置換表の値の方が正確なら評価値として使う
            let use_tt = tt_value != Value::NONE
                && if tt_value > se { tte.bound.is_lower() } else { tte.bound.is_upper() };
            (if use_tt { tt_value } else { se }, se, cx)
        } else {
            let r = evaluate(ctx, pos);
            if excluded_move.is_none() {
                tt_ctx.writer.write(
                    pos_key,
                    Value::NONE,
                    st.stack[ss(ply)].tt_pv,
                    Bound::None,
                    DEPTH_NONE,
                    Move::NONE,
                    r.value,
                );
            }
            (r.value, r.value, r.complexity)
        };

        st.stack[ss(ply)].static_eval = static_eval;
        st.complexity_average.update(complexity as i64);

        // 直前の quiet 手の良し悪しを評価値の変化から学習
        let prev = &st.stack[ss(ply - 1)];
        if prev.current_move.is_ok() && !prev.in_check && !prior_capture {
            let prev_move = prev.current_move;
            let bonus = (-16 * (prev.static_eval.raw() + static_eval.raw())).clamp(-2000, 2000);
            st.history.main_history.update(!us, prev_move, bonus);
        }

        let se2 = st.stack[ss(ply - 2)].static_eval;
        let se4 = st.stack[ss(ply - 4)].static_eval;
        let improvement = if se2 != Value::NONE {
            (static_eval - se2).raw()
        } else if se4 != Value::NONE {
            (static_eval - se4).raw()
        } else {
            175
        };
        let improving = improvement > 0;

        // Step 7. Razoring
        if let Some(v) = try_razoring(st, ctx, pos, depth, alpha, ply, eval) {
            return v;
        }

        // Step 8. Futility pruning（子ノード側）
        if let Some(v) = try_futility_pruning(FutilityParams {
            depth,
            beta,
            eval,
            improving,
            tt_pv: st.stack[ss(ply)].tt_pv,
            prev_stat_score: st.stack[ss(ply - 1)].stat_score,
        }) {
            return v;
        }

        if !pv_node {
            // Step 9. Null move search
            let nmp = NullMoveParams {
                depth,
                beta,
                eval,
                static_eval,
                improvement,
                complexity,
                excluded_move,
                us,
                cut_node,
            };
            if let Some(v) = try_null_move_pruning(
                st,
                ctx,
                pos,
                nmp,
                ply,
                search_node::<{ NodeType::NonPV as u8 }>,
            ) {
                return v;
            }

            // Step 10. ProbCut
            if let Some(v) = try_probcut(
                st,
                ctx,
                pos,
                depth,
                beta,
                improving,
                &tt_ctx,
                ply,
                cut_node,
                excluded_move,
                search_node::<{ NodeType::NonPV as u8 }>,
            ) {
                return v;
            }
        }

        // Step 11. 置換表に手がないPVノードは浅く読む
        if pv_node && tt_move.is_none() {
            depth -= 3;
        }
        if depth <= 0 {
            return qsearch::<{ NodeType::PV as u8 }>(st, ctx, pos, 0, alpha, beta, ply);
        }
        if cut_node && depth >= 8 && tt_move.is_none() {
            depth -= 1;
        }

        improving
    };

    // 王手されている局面の小さな ProbCut
    if in_check && !pv_node {
        if let Some(v) = try_small_probcut(depth, beta, &tt_ctx) {
            return v;
        }
    }

    // =========================================================================
    // Step 12. 指し手ループ
    // =========================================================================
    let cont_keys = cont_keys(st, ply);
    let counter_move = st.history.counter_moves.get(pos.piece_on(prev_sq), prev_sq);
    let killers = st.stack[ss(ply)].killers;
    let mut mp = MovePicker::new(pos, tt_move, depth, cont_keys, counter_move, killers);

    let mut value = best_value;
    let mut best_move = Move::NONE;
    let mut move_count_pruning = false;
    let mut singular_quiet_lmr = false;
    let likely_fail_low = pv_node && tt_move.is_some() && tte.bound.is_upper() && tte.depth >= depth;

    let mut captures_searched = [Move::NONE; 32];
    let mut capture_count = 0;
    let mut quiets_searched = [Move::NONE; 64];
    let mut quiet_count = 0;

    loop {
        if move_count_pruning {
            mp.skip_quiet_moves();
        }
        let mv = mp.next_move(pos, &st.history);
        if mv.is_none() {
            break;
        }

        if mv == excluded_move {
            continue;
        }

        // ルートでは MultiPV で未確定の候補だけを探索
        if root_node {
            if !st.root_moves.contains_in(st.pv_idx, st.pv_last, mv) {
                continue;
            }
        } else if !pos.legal(mv) {
            continue;
        }

        move_count += 1;
        st.stack[ss(ply)].move_count = move_count;
        if pv_node {
            st.stack[ss(ply + 1)].pv.clear();
        }

        let mut extension = 0;
        let capture = pos.is_capture(mv);
        let moved_piece = pos.moved_piece(mv);
        let gives_check = pos.gives_check(mv);
        let mut new_depth = depth - 1;
        let delta = beta - alpha;

        // =====================================================================
        // Step 14. 浅い深さでの枝刈り
        // =====================================================================
        if !root_node && pos.non_pawn_material(us) != 0 && best_value > Value::MATED_IN_MAX_PLY {
            move_count_pruning = move_count >= futility_move_count(improving, depth);

            let lmr_depth = (new_depth
                - ctx.reductions.reduction(improving, depth, move_count, delta, st.root_delta))
            .max(0);

            let step_ctx = Step14Context {
                pos: &*pos,
                mv,
                depth,
                lmr_depth,
                capture,
                gives_check,
                pv_node,
                in_check,
                static_eval: st.stack[ss(ply)].static_eval,
                alpha,
                moved_piece,
                cont_keys: &cont_keys,
                us,
            };
            if step14_pruning(&st.history, &step_ctx) == Step14Outcome::Skip {
                continue;
            }
        }

        // =====================================================================
        // Step 15. 延長
        // =====================================================================
        if ply < st.root_depth * 2 {
            if !root_node
                && depth >= 4 - (st.previous_depth > 27) as i32 + 2 * (pv_node && tte.is_pv) as i32
                && mv == tt_move
                && excluded_move.is_none()
                && tt_value.raw().abs() < Value::KNOWN_WIN.raw()
                && tte.bound.is_lower()
                && tte.depth >= depth - 3
            {
                // Singular extension: TT手以外がすべて singular_beta 未満なら延長
                let singular_beta = tt_value - 3 * depth;
                let singular_depth = (depth - 1) / 2;

                st.stack[ss(ply)].excluded_move = mv;
                value = search_node::<{ NodeType::NonPV as u8 }>(
                    st,
                    ctx,
                    pos,
                    singular_depth,
                    singular_beta - 1,
                    singular_beta,
                    ply,
                    cut_node,
                );
                st.stack[ss(ply)].excluded_move = Move::NONE;
                st.stack[ss(ply)].move_count = move_count;

                if value < singular_beta {
                    extension = 1;
                    singular_quiet_lmr = !tt_capture;

                    if !pv_node
                        && value < singular_beta - 26
                        && st.stack[ss(ply)].double_extensions <= 8
                    {
                        extension = 2;
                    }
                } else if singular_beta >= beta {
                    // Multi-cut: TT手なしでも beta を超える手が複数ある
                    return singular_beta;
                } else if tt_value >= beta {
                    extension = -2;
                } else if tt_value <= alpha && tt_value <= value {
                    extension = -1;
                }
            } else if gives_check
                && depth > 9
                && st.stack[ss(ply)].static_eval.raw().abs() > 71
            {
                extension = 1;
            } else if pv_node
                && mv == tt_move
                && mv == st.stack[ss(ply)].killers[0]
                && st.history.continuation(cont_keys[0]).get(moved_piece, mv.to()) >= 5491
            {
                extension = 1;
            }
        }

        new_depth += extension;
        st.stack[ss(ply)].double_extensions =
            st.stack[ss(ply - 1)].double_extensions + (extension == 2) as i32;

        // =====================================================================
        // Step 16. 指し手を実行
        // =====================================================================
        st.stack[ss(ply)].current_move = mv;
        set_cont_history_for_move(st, ply, in_check, capture, moved_piece, mv.to());
        do_move(st, ctx, pos, mv, gives_check);

        // =====================================================================
        // Step 17. Late Move Reduction
        // =====================================================================
        if depth >= 2
            && move_count > 1 + (pv_node && ply <= 1) as i32
            && (!st.stack[ss(ply)].tt_pv
                || !capture
                || (cut_node && st.stack[ss(ply - 1)].move_count > 1))
        {
            let mut r = ctx.reductions.reduction(improving, depth, move_count, delta, st.root_delta);

            if st.stack[ss(ply)].tt_pv && !likely_fail_low {
                r -= 2;
            }
            if st.stack[ss(ply - 1)].move_count > 7 {
                r -= 1;
            }
            if cut_node {
                r += 2;
            }
            if tt_capture {
                r += 1;
            }
            if pv_node {
                r -= 1 + 15 / (3 + depth);
            }
            if singular_quiet_lmr {
                r -= 1;
            }
            if st.stack[ss(ply + 1)].cutoff_cnt > 3 && !pv_node {
                r += 1;
            }

            let to = mv.to();
            let h = &st.history;
            let stat_score = 2 * h.main_history.get(us, mv) as i32
                + h.continuation(cont_keys[0]).get(moved_piece, to) as i32
                + h.continuation(cont_keys[1]).get(moved_piece, to) as i32
                + h.continuation(cont_keys[3]).get(moved_piece, to) as i32
                - 4334;
            st.stack[ss(ply)].stat_score = stat_score;
            r -= stat_score / 15914;

            // [1, new_depth + 1] に収める（new_depth が負なら下限を優先）
            let reduced = new_depth - r;
            let d = if reduced < 1 { 1 } else { reduced.min(new_depth + 1) };

            value = -search_node::<{ NodeType::NonPV as u8 }>(
                st,
                ctx,
                pos,
                d,
                -(alpha + 1),
                -alpha,
                ply + 1,
                true,
            );

            // 削減した探索が alpha を超えたら削減なしで読み直す
            if value > alpha && d < new_depth {
                let do_deeper_search = value > alpha + 78 + 11 * (new_depth - d);
                value = -search_node::<{ NodeType::NonPV as u8 }>(
                    st,
                    ctx,
                    pos,
                    new_depth + do_deeper_search as i32,
                    -(alpha + 1),
                    -alpha,
                    ply + 1,
                    !cut_node,
                );

                let mut bonus = if value > alpha {
                    stat_bonus(new_depth)
                } else {
                    -stat_bonus(new_depth)
                };
                if capture {
                    bonus /= 6;
                }
                update_continuation_histories(st, ply, moved_piece, mv.to(), bonus);
            }
        } else if !pv_node || move_count > 1 {
            // Step 18. 削減なしの null window 探索
            value = -search_node::<{ NodeType::NonPV as u8 }>(
                st,
                ctx,
                pos,
                new_depth,
                -(alpha + 1),
                -alpha,
                ply + 1,
                !cut_node,
            );
        }

        // PVノードでは最初の手と alpha を更新した手をフルウィンドウで読む
        if pv_node && (move_count == 1 || (value > alpha && (root_node || value < beta))) {
            st.stack[ss(ply + 1)].pv.clear();
            value = -search_node::<{ NodeType::PV as u8 }>(
                st,
                ctx,
                pos,
                max_next_depth.min(new_depth),
                -beta,
                -alpha,
                ply + 1,
                false,
            );
        }

        // =====================================================================
        // Step 19. 指し手を戻す
        // =====================================================================
        pos.undo_move(mv);

        // 停止後の値は信用できない
        if stop_requested(ctx) {
            return Value::ZERO;
        }

        // =====================================================================
        // Step 20. 最善手の更新
        // =====================================================================
        if root_node {
            if let Some(idx) = st.root_moves.find(mv) {
                let sel_depth = st.sel_depth;
                let rm = &mut st.root_moves[idx];
                rm.average_score = if rm.average_score != -Value::INFINITE {
                    Value::new((2 * value.raw() + rm.average_score.raw()) / 3)
                } else {
                    value
                };

                if move_count == 1 || value > alpha {
                    rm.score = value;
                    rm.sel_depth = sel_depth;
                    rm.pv.truncate(1);
                    rm.pv.extend_from_slice(&st.stack[ss(1)].pv);

                    if move_count > 1 && st.pv_idx == 0 {
                        ctx.progress.add_best_move_change();
                    }
                } else {
                    // 最善でない手は順序を保つため最低値にする
                    rm.score = -Value::INFINITE;
                }
            }
        }

        if value > best_value {
            best_value = value;

            if value > alpha {
                best_move = mv;

                if pv_node && !root_node {
                    update_pv(&mut st.stack, ply, mv);
                }

                if pv_node && value < beta {
                    alpha = value;

                    // alpha を更新できたら残りの手は少し浅く読む
                    if depth > 2
                        && depth < 7
                        && beta < Value::KNOWN_WIN
                        && alpha > -Value::KNOWN_WIN
                    {
                        depth -= 1;
                    }
                } else {
                    st.stack[ss(ply)].cutoff_cnt += 1;
                    break;
                }
            }
        } else {
            st.stack[ss(ply)].cutoff_cnt = 0;
        }

        if mv != best_move {
            if capture && capture_count < captures_searched.len() {
                captures_searched[capture_count] = mv;
                capture_count += 1;
            } else if !capture && quiet_count < quiets_searched.len() {
                quiets_searched[quiet_count] = mv;
                quiet_count += 1;
            }
        }
    }

    // =========================================================================
    // Step 21. 詰み・ステイルメイトと履歴の更新
    // =========================================================================
    if move_count == 0 {
        best_value = if excluded_move.is_some() {
            alpha
        } else if in_check {
            Value::mated_in(ply)
        } else {
            Value::DRAW
        };
    } else if best_move.is_some() {
        update_all_stats(
            st,
            pos,
            ply,
            best_move,
            best_value,
            beta,
            prev_sq,
            &quiets_searched[..quiet_count],
            &captures_searched[..capture_count],
            depth,
        );
    } else if (depth >= 4 || pv_node) && !prior_capture {
        // fail low したノードでは直前の手にボーナス
        let extra_bonus = pv_node || cut_node || best_value < alpha - 70 * depth;
        update_continuation_histories(
            st,
            ply - 1,
            pos.piece_on(prev_sq),
            prev_sq,
            stat_bonus(depth) * (1 + extra_bonus as i32),
        );
    }

    if pv_node {
        best_value = best_value.min(max_value);
    }

    // fail low なら親がPV経路のときに限りPV扱いを引き継ぐ
    if best_value <= alpha {
        let inherited = st.stack[ss(ply - 1)].tt_pv && depth > 3;
        st.stack[ss(ply)].tt_pv |= inherited;
    }

    if excluded_move.is_none() && !(root_node && st.pv_idx > 0) {
        let bound = if best_value >= beta {
            Bound::Lower
        } else if pv_node && best_move.is_some() {
            Bound::Exact
        } else {
            Bound::Upper
        };
        tt_ctx.writer.write(
            pos_key,
            value_to_tt(best_value, ply),
            st.stack[ss(ply)].tt_pv,
            bound,
            depth,
            best_move,
            st.stack[ss(ply)].static_eval,
        );
    }

    best_value
}

// =============================================================================
// 履歴の更新
// =============================================================================

/// 1, 2, 4, 6手前の ContinuationHistory を更新（王手中は1, 2手前のみ）
pub(super) fn update_continuation_histories(
    st: &mut SearchState,
    ply: i32,
    pc: Piece,
    to: Square,
    bonus: i32,
) {
    let in_check = st.stack[ss(ply)].in_check;
    for i in [1, 2, 4, 6] {
        if in_check && i > 2 {
            break;
        }
        let prev = &st.stack[ss(ply - i)];
        if prev.current_move.is_ok() {
            let key = prev.cont_hist_key;
            st.history.continuation_mut(key).update(pc, to, bonus);
        }
    }
}

/// beta cut を起こした quiet 手の統計を更新（killer, 履歴, countermove）
fn update_quiet_stats(st: &mut SearchState, pos: &Position, ply: i32, mv: Move, bonus: i32) {
    let cur = &mut st.stack[ss(ply)];
    if cur.killers[0] != mv {
        cur.killers[1] = cur.killers[0];
        cur.killers[0] = mv;
    }

    let us = pos.side_to_move();
    st.history.main_history.update(us, mv, bonus);
    update_continuation_histories(st, ply, pos.moved_piece(mv), mv.to(), bonus);

    let prev_move = st.stack[ss(ply - 1)].current_move;
    if prev_move.is_ok() {
        let prev_sq = prev_move.to();
        st.history.counter_moves.set(pos.piece_on(prev_sq), prev_sq, mv);
    }
}

/// 最善手が見つかったノードで、最善手に加点し他の手に減点する
#[allow(clippy::too_many_arguments)]
fn update_all_stats(
    st: &mut SearchState,
    pos: &Position,
    ply: i32,
    best_move: Move,
    best_value: Value,
    beta: Value,
    prev_sq: Square,
    quiets_searched: &[Move],
    captures_searched: &[Move],
    depth: Depth,
) {
    let us = pos.side_to_move();
    let bonus1 = stat_bonus(depth + 1);

    if !pos.is_capture(best_move) {
        let bonus2 = if best_value > beta + PAWN_VALUE_MG {
            bonus1
        } else {
            stat_bonus(depth)
        };

        update_quiet_stats(st, pos, ply, best_move, bonus2);

        for &m in quiets_searched {
            st.history.main_history.update(us, m, -bonus2);
            update_continuation_histories(st, ply, pos.moved_piece(m), m.to(), -bonus2);
        }
    } else {
        let to = best_move.to();
        st.history
            .capture_history
            .update(pos.moved_piece(best_move), to, pos.piece_on(to), bonus1);
    }

    // 直前の手が早い段階で読まれて反駁されたなら減点
    let prev = &st.stack[ss(ply - 1)];
    if (prev.move_count == 1 + prev.tt_hit as i32 || prev.current_move == prev.killers[0])
        && pos.captured_piece().is_none()
    {
        update_continuation_histories(st, ply - 1, pos.piece_on(prev_sq), prev_sq, -bonus1);
    }

    for &m in captures_searched {
        let to = m.to();
        st.history
            .capture_history
            .update(pos.moved_piece(m), to, pos.piece_on(to), -bonus1);
    }
}

// =============================================================================
// テスト
// =============================================================================
