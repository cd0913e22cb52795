//! 探索制限（LimitsType）
//!
//! UCI `go` コマンドのパラメータを表現する。

use std::time::Instant;

use crate::types::{Color, Move};

// =============================================================================
// TimePoint
// =============================================================================

/// 時間（ミリ秒）
pub type TimePoint = i64;

// =============================================================================
// LimitsType
// =============================================================================

/// 探索制限条件
#[derive(Clone, Debug)]
pub struct LimitsType {
    /// 両者の残り時間（ミリ秒）
    pub time: [TimePoint; Color::NUM],

    /// 1手ごとの加算時間（ミリ秒）
    pub inc: [TimePoint; Color::NUM],

    /// 次の時間加算までの手数（0なら指定なし）
    pub movestogo: i32,

    /// 探索深さ固定（0以外なら有効）
    pub depth: i32,

    /// 探索ノード数制限（0以外なら有効）
    pub nodes: u64,

    /// 思考時間固定（ミリ秒、0以外なら有効）
    pub movetime: TimePoint,

    /// N手以内の詰みを見つけたら止める（0以外なら有効）
    pub mate: i32,

    /// 思考時間無制限フラグ（`stop` まで探索を続ける）
    pub infinite: bool,

    /// 探索対象の手のリスト（空なら全合法手）
    pub search_moves: Vec<Move>,

    /// 候補手をいくつ探索するか（1以上）
    pub multi_pv: usize,

    /// ponder中か（`ponderhit` まで停止しない）
    pub ponder: bool,

    /// 探索開始時刻
    pub start_time: Option<Instant>,
}

impl Default for LimitsType {
    fn default() -> Self {
        Self {
            time: [0; Color::NUM],
            inc: [0; Color::NUM],
            movestogo: 0,
            depth: 0,
            nodes: 0,
            movetime: 0,
            mate: 0,
            infinite: false,
            search_moves: Vec::new(),
            multi_pv: 1,
            ponder: false,
            start_time: None,
        }
    }
}

impl LimitsType {
    pub fn new() -> Self {
        Self::default()
    }

    /// 深さ固定の探索制限
    pub fn depth(depth: i32) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }

    /// 時間制御を行うか
    ///
    /// どちらかの残り時間が指定されている場合のみ。
    #[inline]
    pub fn use_time_management(&self) -> bool {
        self.time[Color::White.index()] != 0 || self.time[Color::Black.index()] != 0
    }

    /// 探索開始時刻を設定
    pub fn set_start_time(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// 探索開始からの経過時間（ミリ秒）
    pub fn elapsed(&self) -> TimePoint {
        self.start_time.map_or(0, |t| t.elapsed().as_millis() as TimePoint)
    }

    /// 指定した色の残り時間
    #[inline]
    pub fn time_left(&self, color: Color) -> TimePoint {
        self.time[color.index()]
    }

    /// 指定した色の加算時間
    #[inline]
    pub fn increment(&self, color: Color) -> TimePoint {
        self.inc[color.index()]
    }

    #[inline]
    pub fn has_depth_limit(&self) -> bool {
        self.depth > 0
    }

    #[inline]
    pub fn has_nodes_limit(&self) -> bool {
        self.nodes > 0
    }

    #[inline]
    pub fn has_movetime(&self) -> bool {
        self.movetime > 0
    }
}

// =============================================================================
// テスト
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default() {
        let limits = LimitsType::default();
        assert_eq!(limits.time, [0, 0]);
        assert_eq!(limits.depth, 0);
        assert_eq!(limits.multi_pv, 1);
        assert!(!limits.infinite);
        assert!(limits.search_moves.is_empty());
    }

    #[test]
    fn test_use_time_management() {
        let mut limits = LimitsType::new();
        assert!(!limits.use_time_management());

        limits.time[Color::Black.index()] = 30000;
        assert!(limits.use_time_management());

        // 深さ固定は時計の有無に関係しない
        let limits = LimitsType::depth(10);
        assert!(!limits.use_time_management());
        assert!(limits.has_depth_limit());
    }

    #[test]
    fn test_time_left_and_increment() {
        let mut limits = LimitsType::new();
        limits.time[Color::White.index()] = 60000;
        limits.inc[Color::Black.index()] = 2000;

        assert_eq!(limits.time_left(Color::White), 60000);
        assert_eq!(limits.time_left(Color::Black), 0);
        assert_eq!(limits.increment(Color::Black), 2000);
    }

    #[test]
    fn test_elapsed() {
        let mut limits = LimitsType::new();
        assert_eq!(limits.elapsed(), 0);
        limits.set_start_time();

        std::thread::sleep(std::time::Duration::from_millis(10));

        let elapsed = limits.elapsed();
        assert!(elapsed >= 10);
        assert!(elapsed < 1000);
    }

    #[test]
    fn test_has_limits() {
        let mut limits = LimitsType::new();

        assert!(!limits.has_depth_limit());
        assert!(!limits.has_nodes_limit());
        assert!(!limits.has_movetime());

        limits.nodes = 10000;
        assert!(limits.has_nodes_limit());

        limits.movetime = 1000;
        assert!(limits.has_movetime());
    }
}
