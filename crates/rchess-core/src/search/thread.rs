//! 並列探索（Lazy SMP）のスレッド管理
//!
//! メインスレッドは呼び出し元のスレッドで探索し、このプールはヘルパースレッドだけを持つ。
//! 各ヘルパーは自分の `SearchWorker` と局面のコピーを持ち、置換表だけを共有する。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use log::{debug, warn};

use crate::eval::Evaluator;
use crate::position::Position;
use crate::tt::TranspositionTable;

use super::alpha_beta::{Reductions, SearchWorker};
use super::types::RootMoves;
use super::{LimitsType, TimeManagement};

/// 探索スレッドのスタックサイズ（再帰が深いので大きめに取る）
const SEARCH_STACK_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// SearchProgress
// =============================================================================

/// スレッドごとの進捗
///
/// メインスレッドがロックなしで集計できるように atomics で公開する。
/// False Sharing を防ぐためキャッシュライン境界に揃える。
#[repr(C, align(64))]
#[derive(Default)]
pub struct SearchProgress {
    nodes: AtomicU64,
    best_move_changes: AtomicU64,
}

impl SearchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.nodes.store(0, Ordering::Relaxed);
        self.best_move_changes.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_nodes(&self, nodes: u64) {
        self.nodes.store(nodes, Ordering::Relaxed);
    }

    #[inline]
    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn add_best_move_change(&self) {
        self.best_move_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// 最善手の変更回数を取り出して0に戻す
    pub fn take_best_move_changes(&self) -> u64 {
        self.best_move_changes.swap(0, Ordering::Relaxed)
    }
}

// =============================================================================
// SearchSignals
// =============================================================================

/// 全スレッドで共有する制御フラグ
#[derive(Debug)]
pub struct SearchSignals {
    stop: AtomicBool,
    ponder: AtomicBool,
    stop_on_ponderhit: AtomicBool,
    increase_depth: AtomicBool,
}

impl Default for SearchSignals {
    fn default() -> Self {
        Self {
            stop: AtomicBool::new(false),
            ponder: AtomicBool::new(false),
            stop_on_ponderhit: AtomicBool::new(false),
            increase_depth: AtomicBool::new(true),
        }
    }
}

impl SearchSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// `go` の開始時に呼ぶ
    pub fn reset(&self, ponder: bool) {
        self.stop.store(false, Ordering::Relaxed);
        self.ponder.store(ponder, Ordering::Relaxed);
        self.stop_on_ponderhit.store(false, Ordering::Relaxed);
        self.increase_depth.store(true, Ordering::Relaxed);
    }

    /// 停止要求
    #[inline]
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn ponder(&self) -> bool {
        self.ponder.load(Ordering::Relaxed)
    }

    pub fn set_ponder(&self, ponder: bool) {
        self.ponder.store(ponder, Ordering::Relaxed);
    }

    /// ponderhit: 通常の探索に切り替える
    ///
    /// 既に時間を使い切っていれば次の時間チェックで止まる。
    pub fn ponderhit(&self) {
        self.set_ponder(false);
    }

    #[inline]
    pub fn stop_on_ponderhit(&self) -> bool {
        self.stop_on_ponderhit.load(Ordering::Relaxed)
    }

    pub fn set_stop_on_ponderhit(&self, v: bool) {
        self.stop_on_ponderhit.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn increase_depth(&self) -> bool {
        self.increase_depth.load(Ordering::Relaxed)
    }

    pub fn set_increase_depth(&self, v: bool) {
        self.increase_depth.store(v, Ordering::Relaxed);
    }
}

// =============================================================================
// SearchTask
// =============================================================================

/// 1回の `go` で全スレッドが共有する探索条件
pub struct SearchTask {
    pub limits: LimitsType,
    pub time: TimeManagement,
    pub tt: Arc<TranspositionTable>,
    pub evaluator: Arc<dyn Evaluator>,
    pub signals: Arc<SearchSignals>,
    pub reductions: Arc<Reductions>,
    /// スレッドID順の進捗（0=main）
    pub progress: Vec<Arc<SearchProgress>>,
}

/// ヘルパースレッド1つ分の仕事
struct HelperJob {
    task: Arc<SearchTask>,
    pos: Position,
    root_moves: RootMoves,
}

enum ThreadTask {
    Search(Box<HelperJob>),
    ClearHistories,
}

// =============================================================================
// Thread
// =============================================================================

struct ThreadState {
    searching: bool,
    exit: bool,
    task: Option<ThreadTask>,
}

struct ThreadInner {
    worker: Mutex<Box<SearchWorker>>,
    state: Mutex<ThreadState>,
    condvar: Condvar,
}

/// ロックが poison されていても中身はそのまま使う（探索状態は次の `go` で作り直す）
#[inline]
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// ヘルパースレッド
pub struct Thread {
    id: usize,
    inner: Arc<ThreadInner>,
    progress: Arc<SearchProgress>,
    handle: Option<JoinHandle<()>>,
}

impl Thread {
    fn new(id: usize) -> std::io::Result<Self> {
        let progress = Arc::new(SearchProgress::new());
        let inner = Arc::new(ThreadInner {
            worker: Mutex::new(SearchWorker::new(id, Arc::clone(&progress))),
            state: Mutex::new(ThreadState {
                searching: true,
                exit: false,
                task: None,
            }),
            condvar: Condvar::new(),
        });

        let thread_inner = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name(format!("search-{id}"))
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || idle_loop(thread_inner))?;

        let thread = Self {
            id,
            inner,
            progress,
            handle: Some(handle),
        };
        // idle_loop に入るまで待つ
        thread.wait_for_search_finished();
        Ok(thread)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn progress(&self) -> &Arc<SearchProgress> {
        &self.progress
    }

    fn schedule_task(&self, task: ThreadTask) {
        let mut state = lock(&self.inner.state);
        while state.searching {
            state = self.inner.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.task = Some(task);
        state.searching = true;
        self.inner.condvar.notify_all();
    }

    fn wait_for_search_finished(&self) {
        let mut state = lock(&self.inner.state);
        while state.searching {
            state = self.inner.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// 探索していないときのワーカーに触る
    pub fn with_worker<R>(&self, f: impl FnOnce(&mut SearchWorker) -> R) -> R {
        let mut worker = lock(&self.inner.worker);
        f(&mut worker)
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        {
            let mut state = lock(&self.inner.state);
            state.exit = true;
            state.searching = true;
            self.inner.condvar.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("search thread {} panicked", self.id);
            }
        }
    }
}

fn idle_loop(inner: Arc<ThreadInner>) {
    loop {
        let task = {
            let mut state = lock(&inner.state);
            state.searching = false;
            inner.condvar.notify_all();
            while !state.searching && !state.exit {
                state = inner.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            if state.exit {
                return;
            }
            state.task.take()
        };

        let Some(task) = task else {
            continue;
        };

        let mut worker = lock(&inner.worker);
        match task {
            ThreadTask::Search(job) => {
                let HelperJob {
                    task,
                    mut pos,
                    root_moves,
                } = *job;
                worker.prepare_search(root_moves);
                worker.search(&mut pos, &task, None);
            }
            ThreadTask::ClearHistories => worker.clear(),
        }
    }
}

// =============================================================================
// ThreadPool
// =============================================================================

/// ヘルパースレッドのプール
#[derive(Default)]
pub struct ThreadPool {
    threads: Vec<Thread>,
}

impl ThreadPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 探索スレッド数（メインを含む）を設定する
    ///
    /// 数が変わったときだけヘルパーを作り直す。新しいワーカーの履歴は空。
    pub fn set_num_threads(&mut self, num_threads: usize) -> std::io::Result<()> {
        let helpers = num_threads.max(1) - 1;
        if helpers == self.threads.len() {
            return Ok(());
        }

        self.wait_for_search_finished();
        self.threads.clear();
        self.threads.reserve(helpers);
        for id in 1..=helpers {
            self.threads.push(Thread::new(id)?);
        }
        debug!("thread pool resized: {} helper threads", helpers);
        Ok(())
    }

    /// 全ヘルパーに探索を開始させる
    pub fn start_thinking(&self, task: &Arc<SearchTask>, pos: &Position, root_moves: &RootMoves) {
        for thread in &self.threads {
            thread.schedule_task(ThreadTask::Search(Box::new(HelperJob {
                task: Arc::clone(task),
                pos: pos.clone(),
                root_moves: root_moves.clone(),
            })));
        }
    }

    /// 全ヘルパーの探索終了を待つ
    pub fn wait_for_search_finished(&self) {
        for thread in &self.threads {
            thread.wait_for_search_finished();
        }
    }

    /// 全ヘルパーの履歴を消去する
    pub fn clear_histories(&self) {
        for thread in &self.threads {
            thread.schedule_task(ThreadTask::ClearHistories);
        }
        self.wait_for_search_finished();
    }

    pub fn helper_threads(&self) -> &[Thread] {
        &self.threads
    }

    /// ヘルパー数（メインを含まない）
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.wait_for_search_finished();
        self.threads.clear();
        debug!("thread pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_take_resets() {
        let p = SearchProgress::new();
        p.add_best_move_change();
        p.add_best_move_change();
        assert_eq!(p.take_best_move_changes(), 2);
        assert_eq!(p.take_best_move_changes(), 0);
    }

    #[test]
    fn test_signals_reset() {
        let s = SearchSignals::new();
        assert!(s.increase_depth());
        s.stop();
        s.set_increase_depth(false);
        s.set_stop_on_ponderhit(true);
        s.reset(true);
        assert!(!s.stopped());
        assert!(s.ponder());
        assert!(s.increase_depth());
        assert!(!s.stop_on_ponderhit());
        s.ponderhit();
        assert!(!s.ponder());
    }

    #[test]
    fn test_pool_resize_and_clear() {
        let mut pool = ThreadPool::new();
        pool.set_num_threads(3).unwrap();
        assert_eq!(pool.len(), 2);
        let ids: Vec<_> = pool.helper_threads().iter().map(Thread::id).collect();
        assert_eq!(ids, vec![1, 2]);
        pool.clear_histories();
        for t in pool.helper_threads() {
            assert_eq!(t.with_worker(|w| w.thread_id), t.id());
        }
        pool.set_num_threads(1).unwrap();
        assert!(pool.is_empty());
    }
}
