//! 探索モジュール
//!
//! Alpha-Beta探索と各種枝刈り。
//!
//! - Iterative Deepening
//! - Alpha-Beta with PVS
//! - Aspiration Windows
//! - 静止探索（Quiescence Search）
//! - 各種枝刈り（NMP, LMR, Futility, SEE, Razoring, ProbCut, Singular Extension）
//! - Lazy SMP による並列探索

mod alpha_beta;
mod engine;
pub mod history;
mod limits;
pub mod movepicker;
mod pruning;
mod qsearch;
mod search_helpers;
mod thread;
mod time_manager;
mod types;

pub use alpha_beta::{Reductions, SearchWorker};
pub use engine::{EngineOptions, Score, Search, SearchError, SearchInfo, SearchResult};
pub use history::HistoryTables;
pub use limits::{LimitsType, TimePoint};
pub use movepicker::MovePicker;
pub use thread::{SearchProgress, SearchSignals, SearchTask, ThreadPool};
pub use time_manager::{DEFAULT_MOVE_OVERHEAD, TimeManagement};
pub use types::{RootMove, RootMoves, draw_value, value_from_tt, value_to_tt};
