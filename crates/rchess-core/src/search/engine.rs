//! 探索エンジンのエントリポイント
//!
//! UCIフロントエンドから呼び出すためのハイレベルインターフェース。
//! メインスレッドは呼び出し元で探索し、ヘルパースレッドは [`ThreadPool`] が動かす。

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::eval::{EvalError, Evaluator, MaterialEvaluator, load_evaluator};
use crate::position::Position;
use crate::tt::TranspositionTable;
use crate::types::{Depth, Move, Value};

use super::alpha_beta::{MainThreadState, Reductions, SearchWorker};
use super::thread::{SearchProgress, SearchSignals, SearchTask, ThreadPool};
use super::time_manager::DEFAULT_MOVE_OVERHEAD;
use super::types::{RootMove, RootMoves};
use super::{LimitsType, TimeManagement, TimePoint};

// =============================================================================
// EngineOptions
// =============================================================================

/// エンジンオプション
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineOptions {
    /// 探索スレッド数（メインを含む）
    pub threads: usize,
    /// 置換表のサイズ（MB）
    pub hash_mb: usize,
    /// 1手ごとに差し引く通信遅延（ミリ秒）
    pub move_overhead_ms: TimePoint,
    /// Chess960 の表記で入出力する
    pub chess960: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 16,
            move_overhead_ms: DEFAULT_MOVE_OVERHEAD,
            chess960: false,
        }
    }
}

// =============================================================================
// SearchError
// =============================================================================

#[derive(Debug, Error)]
pub enum SearchError {
    /// 評価関数の読み込みに失敗している
    #[error("evaluator is unavailable; refusing to search")]
    EvaluatorUnavailable,
    #[error("failed to spawn search thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

// =============================================================================
// SearchInfo - 探索情報（UCI info出力用）
// =============================================================================

/// UCI形式の評価値
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Score {
    /// センチポーン
    Cp(i32),
    /// 詰みまでの手数（負なら詰まされる）
    Mate(i32),
}

impl Score {
    pub fn from_value(v: Value) -> Self {
        if v.is_mate_score() {
            Score::Mate(v.mate_moves())
        } else {
            Score::Cp(v.to_cp())
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "cp {cp}"),
            Score::Mate(n) => write!(f, "mate {n}"),
        }
    }
}

/// 探索情報（UCI info出力用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchInfo {
    /// 探索深さ
    pub depth: Depth,
    /// 選択的深さ
    pub sel_depth: i32,
    /// MultiPV番号（1-indexed）
    pub multi_pv: usize,
    pub score: Score,
    pub nodes: u64,
    pub nps: u64,
    /// 置換表使用率（千分率）
    pub hashfull: i32,
    /// 経過時間（ミリ秒）
    pub time_ms: u64,
    /// 読み筋（UCI表記）
    pub pv: Vec<String>,
}

impl SearchInfo {
    /// UCI形式のinfo文字列を生成
    pub fn to_uci_string(&self) -> String {
        let mut s = format!(
            "info depth {} seldepth {} multipv {} score {} nodes {} nps {} hashfull {} time {}",
            self.depth,
            self.sel_depth,
            self.multi_pv,
            self.score,
            self.nodes,
            self.nps,
            self.hashfull,
            self.time_ms
        );
        if !self.pv.is_empty() {
            s.push_str(" pv ");
            s.push_str(&self.pv.join(" "));
        }
        s
    }
}

/// ルート手から info 行を組み立てる
///
/// まだ今回の反復で探索していない手は、1つ前の深さと前回の評価値で出す。
/// 深さ1で未探索の手は出さない。
pub(super) fn build_infos(
    root_moves: &RootMoves,
    depth: Depth,
    multi_pv: usize,
    nodes: u64,
    elapsed: TimePoint,
    hashfull: i32,
    chess960: bool,
) -> Vec<SearchInfo> {
    let time_ms = elapsed.max(0) as u64;
    let nps = nodes * 1000 / time_ms.max(1);

    let mut infos = Vec::with_capacity(multi_pv);
    for (i, rm) in root_moves.iter().take(multi_pv).enumerate() {
        let updated = rm.score != -Value::INFINITE;
        if depth == 1 && !updated && i > 0 {
            continue;
        }

        let d = if updated { depth } else { (depth - 1).max(1) };
        let mut v = if updated { rm.score } else { rm.previous_score };
        if v == -Value::INFINITE {
            v = Value::ZERO;
        }

        infos.push(SearchInfo {
            depth: d,
            sel_depth: rm.sel_depth,
            multi_pv: i + 1,
            score: Score::from_value(v),
            nodes,
            nps,
            hashfull,
            time_ms,
            pv: rm.pv.iter().map(|m| m.to_uci(chess960)).collect(),
        });
    }
    infos
}

// =============================================================================
// SearchResult - 探索結果
// =============================================================================

fn serialize_move<S: Serializer>(m: &Move, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&m.to_uci(false))
}

fn serialize_value<S: Serializer>(v: &Value, s: S) -> Result<S::Ok, S::Error> {
    Score::from_value(*v).serialize(s)
}

/// 探索結果
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// 最善手（合法手がなければ `Move::NONE`）
    #[serde(serialize_with = "serialize_move")]
    pub best_move: Move,
    /// Ponder手（相手の予想応手）
    #[serde(serialize_with = "serialize_move")]
    pub ponder_move: Move,
    #[serde(serialize_with = "serialize_value")]
    pub score: Value,
    /// 完了した探索深さ
    pub depth: Depth,
    /// 全スレッドの探索ノード数
    pub nodes: u64,
}

// =============================================================================
// 最善スレッドの選択
// =============================================================================

/// 投票に使うスレッドごとの結果
struct ThreadSummary {
    root_move: RootMove,
    completed_depth: Depth,
}

impl ThreadSummary {
    fn from_worker(worker: &SearchWorker) -> Option<Self> {
        let st = &worker.state;
        if st.root_moves.is_empty() {
            return None;
        }
        Some(Self {
            root_move: st.root_moves[0].clone(),
            completed_depth: st.completed_depth,
        })
    }
}

/// 投票で最善のスレッドを選ぶ
///
/// 最善手ごとに `(score - min_score + 14) * completed_depth` を加算する。
/// 勝ちを見つけたスレッドは最短の勝ちを優先し、負けのスレッドは負けでない結果に置き換える。
/// 票が同じなら読み筋の長い方を採る。
fn select_best_thread(summaries: &[ThreadSummary]) -> usize {
    let Some(min_score) = summaries.iter().map(|s| s.root_move.score).min() else {
        return 0;
    };

    // 票を積み上げながら比較する
    let mut votes: HashMap<Move, i64> = HashMap::new();
    let mut best = 0;
    for (i, th) in summaries.iter().enumerate() {
        *votes.entry(th.root_move.mv()).or_insert(0) +=
            (th.root_move.score - min_score + 14).raw() as i64 * th.completed_depth as i64;

        let b = &summaries[best];
        let th_score = th.root_move.score;
        let best_score = b.root_move.score;
        let th_votes = votes.get(&th.root_move.mv()).copied().unwrap_or(0);
        let best_votes = votes.get(&b.root_move.mv()).copied().unwrap_or(0);

        if best_score.is_mate_score() {
            // 最短の詰み、または最も長く詰みを逃れる手
            if th_score > best_score {
                best = i;
            }
        } else if th_score.is_win()
            || (!th_score.is_loss()
                && (th_votes > best_votes
                    || (th_votes == best_votes && th.root_move.pv.len() > b.root_move.pv.len())))
        {
            best = i;
        }
    }
    best
}

// =============================================================================
// Search - 探索エンジン
// =============================================================================

/// 探索エンジン
///
/// 置換表とワーカーをゲームをまたいで保持する。
/// 履歴統計は `clear()` でのみ消去し、`go` では保持する。
pub struct Search {
    tt: Arc<TranspositionTable>,
    evaluator: Option<Arc<dyn Evaluator>>,
    signals: Arc<SearchSignals>,
    reductions: Arc<Reductions>,
    options: EngineOptions,
    thread_pool: ThreadPool,
    /// メインスレッドのワーカー
    worker: Box<SearchWorker>,

    /// 前回の最善手の評価値（初回は `INFINITE`）
    best_previous_score: Value,
    best_previous_average_score: Value,
    /// 前回の timeReduction（次の手番に持ち回る）
    previous_time_reduction: f64,
}

impl Search {
    /// 新しいSearchを作成
    ///
    /// ヘルパースレッドの起動に失敗したらエラーを返す。
    pub fn new(options: EngineOptions) -> Result<Self, SearchError> {
        let threads = options.threads.max(1);
        let mut thread_pool = ThreadPool::new();
        thread_pool.set_num_threads(threads)?;

        Ok(Self {
            tt: Arc::new(TranspositionTable::new(options.hash_mb)),
            evaluator: Some(Arc::new(MaterialEvaluator::new())),
            signals: Arc::new(SearchSignals::new()),
            reductions: Arc::new(Reductions::new(threads)),
            options: EngineOptions { threads, ..options },
            thread_pool,
            worker: SearchWorker::new(0, Arc::new(SearchProgress::new())),
            best_previous_score: Value::INFINITE,
            best_previous_average_score: Value::INFINITE,
            previous_time_reduction: 1.0,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 評価関数を差し替える
    pub fn set_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.evaluator = Some(evaluator);
    }

    /// 評価関数のパラメータファイルを読み込む
    ///
    /// 失敗すると評価関数は使えない状態になり、`go` は
    /// [`SearchError::EvaluatorUnavailable`] を返す。
    pub fn load_evaluator(&mut self, path: impl AsRef<Path>) -> Result<(), EvalError> {
        match load_evaluator(path) {
            Ok(ev) => {
                self.evaluator = Some(Arc::new(ev));
                Ok(())
            }
            Err(e) => {
                warn!("evaluator disabled: {e}");
                self.evaluator = None;
                Err(e)
            }
        }
    }

    /// 停止フラグなどの共有ハンドル（別スレッドから stop / ponderhit を送る用）
    pub fn signals(&self) -> Arc<SearchSignals> {
        Arc::clone(&self.signals)
    }

    /// 探索を停止
    pub fn stop(&self) {
        self.signals.stop();
    }

    /// ponder を通常の探索に切り替える
    pub fn ponderhit(&self) {
        self.signals.ponderhit();
    }

    /// 新規対局: 履歴と置換表をクリア
    pub fn clear(&mut self) {
        self.thread_pool.wait_for_search_finished();
        self.worker.clear();
        self.thread_pool.clear_histories();
        self.tt.clear(self.options.threads);
        self.best_previous_score = Value::INFINITE;
        self.best_previous_average_score = Value::INFINITE;
        self.previous_time_reduction = 1.0;
        debug!("search state cleared");
    }

    /// 置換表のサイズを変更（内容は消える）
    pub fn resize_tt(&mut self, mb: usize) {
        self.thread_pool.wait_for_search_finished();
        match Arc::get_mut(&mut self.tt) {
            Some(tt) => tt.resize(mb),
            None => self.tt = Arc::new(TranspositionTable::new(mb)),
        }
        self.options.hash_mb = mb;
        debug!("transposition table resized to {mb} MB");
    }

    /// 探索スレッド数を設定
    pub fn set_num_threads(&mut self, threads: usize) -> Result<(), SearchError> {
        let threads = threads.max(1);
        self.thread_pool.set_num_threads(threads)?;
        self.reductions = Arc::new(Reductions::new(threads));
        self.options.threads = threads;
        Ok(())
    }

    pub fn num_threads(&self) -> usize {
        self.options.threads
    }

    /// 探索を実行
    ///
    /// 停止するまで呼び出し元のスレッドをブロックする。
    /// ponder / infinite のときは探索が終わっても `stop` を待つ。
    pub fn go<F>(
        &mut self,
        pos: &Position,
        mut limits: LimitsType,
        mut on_info: F,
    ) -> Result<SearchResult, SearchError>
    where
        F: FnMut(&SearchInfo),
    {
        let evaluator = self.evaluator.clone().ok_or(SearchError::EvaluatorUnavailable)?;

        self.thread_pool.wait_for_search_finished();
        if limits.start_time.is_none() {
            limits.start_time = Some(Instant::now());
        }
        self.signals.reset(limits.ponder);
        self.tt.new_search();

        let root_moves = RootMoves::from_legal_moves(pos, &limits.search_moves);
        let time = TimeManagement::init(
            &limits,
            pos.side_to_move(),
            pos.game_ply(),
            self.options.move_overhead_ms,
            limits.ponder,
        );

        info!(
            "search start: threads {} hash {} MB root moves {} optimum {} ms maximum {} ms",
            self.options.threads,
            self.options.hash_mb,
            root_moves.len(),
            time.optimum(),
            time.maximum()
        );

        if root_moves.is_empty() {
            let score = if pos.in_check() { -Value::MATE } else { Value::DRAW };
            on_info(&SearchInfo {
                depth: 0,
                sel_depth: 0,
                multi_pv: 1,
                score: Score::from_value(score),
                nodes: 0,
                nps: 0,
                hashfull: self.tt.hashfull(),
                time_ms: time.elapsed().max(0) as u64,
                pv: Vec::new(),
            });
            self.wait_while_pondering(&limits);
            info!("no legal moves at root");
            return Ok(SearchResult {
                best_move: Move::NONE,
                ponder_move: Move::NONE,
                score,
                depth: 0,
                nodes: 0,
            });
        }

        let mut progress = Vec::with_capacity(self.options.threads);
        progress.push(Arc::clone(&self.worker.progress));
        progress.extend(self.thread_pool.helper_threads().iter().map(|t| Arc::clone(t.progress())));

        let task = Arc::new(SearchTask {
            limits,
            time,
            tt: Arc::clone(&self.tt),
            evaluator,
            signals: Arc::clone(&self.signals),
            reductions: Arc::clone(&self.reductions),
            progress,
        });

        self.thread_pool.start_thinking(&task, pos, &root_moves);

        let mut root_pos = pos.clone();
        root_pos.truncate_states();
        self.worker.prepare_search(root_moves);
        {
            let mut main = MainThreadState {
                best_previous_score: self.best_previous_score,
                best_previous_average_score: self.best_previous_average_score,
                previous_time_reduction: self.previous_time_reduction,
                on_info: &mut on_info,
            };
            self.worker.search(&mut root_pos, &task, Some(&mut main));
            self.previous_time_reduction = main.previous_time_reduction;
        }

        // ponder / infinite では stop か ponderhit まで bestmove を返さない
        self.wait_while_pondering(&task.limits);

        self.signals.stop();
        self.thread_pool.wait_for_search_finished();

        let nodes: u64 = task.progress.iter().map(|p| p.nodes()).sum();

        let mut summaries = Vec::with_capacity(self.options.threads);
        summaries.extend(ThreadSummary::from_worker(&self.worker));
        let vote = task.limits.multi_pv <= 1
            && !task.limits.has_depth_limit()
            && summaries.first().is_some_and(|s| s.root_move.mv().is_some());
        if vote {
            for thread in self.thread_pool.helper_threads() {
                summaries.extend(thread.with_worker(|w| ThreadSummary::from_worker(w)));
            }
        }

        let best = select_best_thread(&summaries);
        let Some(summary) = summaries.into_iter().nth(best) else {
            return Ok(SearchResult {
                best_move: Move::NONE,
                ponder_move: Move::NONE,
                score: Value::ZERO,
                depth: 0,
                nodes,
            });
        };
        let ThreadSummary {
            mut root_move,
            completed_depth,
        } = summary;

        self.best_previous_score = root_move.score;
        self.best_previous_average_score = root_move.average_score;

        // 次の探索の singular extension の深さ条件に使う
        self.worker.state.previous_depth = completed_depth;
        for thread in self.thread_pool.helper_threads() {
            thread.with_worker(|w| w.state.previous_depth = completed_depth);
        }

        // 最善スレッドがメインでなければ、その読み筋を出し直す
        if best != 0 {
            debug!("best thread {best} overrides main thread");
            let mut rms = RootMoves::new();
            rms.push(root_move.clone());
            for info in build_infos(
                &rms,
                completed_depth,
                1,
                nodes,
                task.time.elapsed(),
                self.tt.hashfull(),
                pos.is_chess960(),
            ) {
                on_info(&info);
            }
        }

        let ponder_move = if root_move.extract_ponder_from_tt(&mut root_pos, &self.tt) {
            root_move.pv[1]
        } else {
            Move::NONE
        };

        let result = SearchResult {
            best_move: root_move.mv(),
            ponder_move,
            score: root_move.score,
            depth: completed_depth,
            nodes,
        };

        info!(
            "search end: bestmove {} ponder {} score {} depth {} nodes {} time {} ms",
            result.best_move.to_uci(pos.is_chess960()),
            result.ponder_move.to_uci(pos.is_chess960()),
            Score::from_value(result.score),
            result.depth,
            result.nodes,
            task.time.elapsed()
        );

        Ok(result)
    }

    fn wait_while_pondering(&self, limits: &LimitsType) {
        while !self.signals.stopped() && (self.signals.ponder() || limits.infinite) {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    fn summary(mv: Move, score: i32, depth: Depth, pv_len: usize) -> ThreadSummary {
        let mut rm = RootMove::new(mv);
        rm.score = Value::new(score);
        rm.pv.resize(pv_len, Move::new(Square::A7, Square::A6));
        ThreadSummary {
            root_move: rm,
            completed_depth: depth,
        }
    }

    #[test]
    fn test_score_from_value() {
        assert_eq!(Score::from_value(Value::ZERO), Score::Cp(0));
        assert_eq!(Score::from_value(Value::mate_in(3)), Score::Mate(2));
        assert_eq!(Score::from_value(Value::mated_in(4)), Score::Mate(-2));
        assert_eq!(Score::Mate(-2).to_string(), "mate -2");
    }

    #[test]
    fn test_vote_prefers_majority_move() {
        let e4 = Move::new(Square::E2, Square::E4);
        let d4 = Move::new(Square::D2, Square::D4);
        let s = vec![
            summary(e4, 30, 10, 5),
            summary(d4, 40, 10, 5),
            summary(d4, 35, 10, 5),
        ];
        assert_ne!(select_best_thread(&s), 0);
    }

    #[test]
    fn test_vote_prefers_shorter_mate() {
        let e4 = Move::new(Square::E2, Square::E4);
        let d4 = Move::new(Square::D2, Square::D4);
        let s = vec![
            summary(e4, Value::mate_in(9).raw(), 20, 9),
            summary(d4, Value::mate_in(5).raw(), 12, 5),
        ];
        assert_eq!(select_best_thread(&s), 1);
    }

    #[test]
    fn test_vote_replaces_loss() {
        let e4 = Move::new(Square::E2, Square::E4);
        let d4 = Move::new(Square::D2, Square::D4);
        let s = vec![
            summary(e4, Value::mated_in(6).raw(), 20, 6),
            summary(d4, -200, 8, 4),
        ];
        assert_eq!(select_best_thread(&s), 1);
    }

    #[test]
    fn test_vote_tie_prefers_longer_pv() {
        let e4 = Move::new(Square::E2, Square::E4);
        let s = vec![summary(e4, 20, 10, 3), summary(e4, 20, 10, 7)];
        assert_eq!(select_best_thread(&s), 1);
    }

    #[test]
    fn test_vote_compares_running_totals() {
        // 2番目のスレッドは途中の同票で読み筋の長さにより選ばれ、3番目の票で逆転される
        let e4 = Move::new(Square::E2, Square::E4);
        let d4 = Move::new(Square::D2, Square::D4);
        let s = vec![summary(e4, 0, 10, 3), summary(d4, 0, 10, 5), summary(e4, 0, 10, 3)];
        assert_eq!(select_best_thread(&s), 2);
    }

    #[test]
    fn test_go_carries_completed_depth_to_workers() {
        let mut search = Search::new(EngineOptions {
            threads: 2,
            hash_mb: 8,
            ..EngineOptions::default()
        })
        .unwrap();
        let limits = LimitsType {
            nodes: 200_000,
            ..LimitsType::default()
        };
        let result = search.go(&Position::startpos(), limits, |_| {}).unwrap();

        assert!(result.depth > 0);
        assert_eq!(search.worker.state.previous_depth, result.depth);
        for thread in search.thread_pool.helper_threads() {
            assert_eq!(thread.with_worker(|w| w.state.previous_depth), result.depth);
        }

        search.clear();
        assert_eq!(search.worker.state.previous_depth, 0);
    }

    #[test]
    fn test_build_infos_skips_unsearched_at_depth_one() {
        let mut rms = RootMoves::new();
        let mut a = RootMove::new(Move::new(Square::E2, Square::E4));
        a.score = Value::new(25);
        rms.push(a);
        rms.push(RootMove::new(Move::new(Square::D2, Square::D4)));

        let infos = build_infos(&rms, 1, 2, 1000, 10, 0, false);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].pv, vec!["e2e4".to_string()]);

        let infos = build_infos(&rms, 5, 2, 1000, 0, 0, false);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].depth, 4);
        assert_eq!(infos[1].score, Score::Cp(0));
        assert!(infos[0].to_uci_string().starts_with("info depth 5 seldepth 0 multipv 1 score cp"));
    }
}
