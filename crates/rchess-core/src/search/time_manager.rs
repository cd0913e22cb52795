//! 時間管理（TimeManagement）
//!
//! 残り時間・加算時間・手数から、今回の思考に使う最適時間と最大時間を決める。
//! 反復深化の各イテレーション後に、評価値の下落や最善手の不安定さで最適時間を伸縮させる。

use std::time::Instant;

use super::{LimitsType, TimePoint};
use crate::types::Color;

// =============================================================================
// 定数
// =============================================================================

/// 通信遅延などを見込んで差し引く時間（ミリ秒）
pub const DEFAULT_MOVE_OVERHEAD: TimePoint = 10;

/// movestogo 未指定時に想定する残り手数
const MOVE_HORIZON: i32 = 50;

/// 合法手が1つしかないときの思考時間上限（ミリ秒）
pub const SINGLE_MOVE_TIME_LIMIT: f64 = 500.0;

/// 最善手不安定性係数
const BEST_MOVE_INSTABILITY_FACTOR: f64 = 1.7;

// =============================================================================
// 公開関数
// =============================================================================

/// 最善手不安定性係数
///
/// bestMoveInstability = 1 + 1.7 * totBestMoveChanges / threads
pub fn calculate_best_move_instability(tot_best_move_changes: f64, thread_count: usize) -> f64 {
    1.0 + BEST_MOVE_INSTABILITY_FACTOR * tot_best_move_changes / thread_count.max(1) as f64
}

/// 評価値が下がっているほど時間を使う
///
/// (69 + 12 * (前回平均 - 今回) + 6 * (4イテレーション前 - 今回)) / 781.4 を [0.5, 1.5] にクランプ。
#[inline]
pub fn calculate_falling_eval(best_prev_avg: i32, iter_value: i32, best_value: i32) -> f64 {
    let eval = (69 + 12 * (best_prev_avg - best_value) + 6 * (iter_value - best_value)) as f64
        / 781.4;
    eval.clamp(0.5, 1.5)
}

/// 最善手が長く変わっていなければ時間を縮める
#[inline]
pub fn calculate_time_reduction(completed_depth: i32, last_best_move_depth: i32) -> f64 {
    if last_best_move_depth + 10 < completed_depth {
        1.63
    } else {
        0.73
    }
}

/// 複雑な局面ほど時間を使う（上限1.5倍）
#[inline]
pub fn calculate_complex_position(complexity: i64) -> f64 {
    (1.0 + (complexity - 277) as f64 / 1819.1).min(1.5)
}

// =============================================================================
// RunningAverage
// =============================================================================

/// 指数移動平均（整数演算）
#[derive(Clone, Copy, Debug, Default)]
pub struct RunningAverage {
    average: i64,
}

impl RunningAverage {
    const PERIOD: i64 = 4096;
    const RESOLUTION: i64 = 1024;

    /// 平均を p / q に設定
    pub fn set(&mut self, p: i64, q: i64) {
        self.average = p * Self::PERIOD * Self::RESOLUTION / q;
    }

    pub fn update(&mut self, v: i64) {
        self.average = Self::RESOLUTION * v + (Self::PERIOD - 1) * self.average / Self::PERIOD;
    }

    #[inline]
    pub fn value(&self) -> i64 {
        self.average / (Self::PERIOD * Self::RESOLUTION)
    }
}

// =============================================================================
// TimeManagement
// =============================================================================

/// 時間管理
///
/// 探索開始時に [`TimeManagement::init`] で決め、探索中は読み取りのみ。
#[derive(Clone, Debug)]
pub struct TimeManagement {
    /// 探索開始時刻
    start_time: Instant,

    /// 最適思考時間（ミリ秒）
    optimum_time: TimePoint,

    /// 最大思考時間（ミリ秒）
    maximum_time: TimePoint,
}

impl Default for TimeManagement {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            optimum_time: 0,
            maximum_time: 0,
        }
    }
}

impl TimeManagement {
    /// 今回の思考時間を決定する
    ///
    /// # Arguments
    /// * `limits` - 探索制限
    /// * `us` - 自分の手番
    /// * `ply` - 開始局面からの手数
    /// * `move_overhead` - 1手ごとに差し引く通信遅延（ミリ秒）
    /// * `ponder` - ponder有効なら最適時間を1.25倍する
    pub fn init(
        limits: &LimitsType,
        us: Color,
        ply: i32,
        move_overhead: TimePoint,
        ponder: bool,
    ) -> Self {
        let mut tm = Self {
            start_time: limits.start_time.unwrap_or_else(Instant::now),
            optimum_time: 0,
            maximum_time: 0,
        };

        // 時計なし（深さ・ノード数・movetime・infinite）なら制限は check_time 側で見る
        if !limits.use_time_management() {
            return tm;
        }

        let time = limits.time_left(us);
        let inc = limits.increment(us);
        let mtg = if limits.movestogo > 0 {
            limits.movestogo.min(MOVE_HORIZON)
        } else {
            MOVE_HORIZON
        };
        let mtg_t = mtg as TimePoint;

        let time_left = (time + inc * (mtg_t - 1) - move_overhead * (2 + mtg_t)).max(1);

        // 加算時間が大きいほど少し多めに使う
        let opt_extra = (1.0 + 12.0 * inc as f64 / time.max(1) as f64).clamp(1.0, 1.12);

        let (opt_scale, max_scale) = if limits.movestogo == 0 {
            (
                (0.0084 + (ply as f64 + 3.0).sqrt() * 0.0042)
                    .min(0.2 * time as f64 / time_left as f64)
                    * opt_extra,
                (4.0 + ply as f64 / 12.0).min(7.0),
            )
        } else {
            (
                ((0.88 + ply as f64 / 116.4) / mtg as f64).min(0.88 * time as f64 / time_left as f64),
                (1.5 + 0.11 * mtg as f64).min(6.3),
            )
        };

        tm.optimum_time = (opt_scale * time_left as f64) as TimePoint;
        tm.maximum_time = (0.8 * time as f64 - move_overhead as f64)
            .min(max_scale * tm.optimum_time as f64) as TimePoint;

        if ponder {
            tm.optimum_time += tm.optimum_time / 4;
        }

        tm
    }

    /// 最適思考時間
    #[inline]
    pub fn optimum(&self) -> TimePoint {
        self.optimum_time
    }

    /// 最大思考時間
    #[inline]
    pub fn maximum(&self) -> TimePoint {
        self.maximum_time
    }

    /// 探索開始からの経過時間（ミリ秒）
    #[inline]
    pub fn elapsed(&self) -> TimePoint {
        self.start_time.elapsed().as_millis() as TimePoint
    }
}

// =============================================================================
// テスト
// =============================================================================
