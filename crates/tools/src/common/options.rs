//! clap 用の引数定義
//!
//! エンジンオプションと探索制限を各ツールで共有する。

use clap::Args;

use rchess_core::position::Position;
use rchess_core::search::{DEFAULT_MOVE_OVERHEAD, EngineOptions, LimitsType, TimePoint};
use rchess_core::types::Color;

/// エンジンオプション
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// 探索スレッド数
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// 置換表のサイズ（MB）
    #[arg(long, default_value_t = 16)]
    pub hash: usize,

    /// 1手ごとの通信遅延の見積もり（ミリ秒）
    #[arg(long, default_value_t = DEFAULT_MOVE_OVERHEAD)]
    pub move_overhead: TimePoint,

    /// Chess960 として FEN と指し手を扱う
    #[arg(long, default_value_t = false)]
    pub chess960: bool,
}

impl EngineArgs {
    pub fn to_options(&self) -> EngineOptions {
        EngineOptions {
            threads: self.threads.max(1),
            hash_mb: self.hash.max(1),
            move_overhead_ms: self.move_overhead,
            chess960: self.chess960,
        }
    }
}

/// 探索制限（UCI `go` の引数に対応）
#[derive(Args, Debug, Clone, Default)]
pub struct LimitArgs {
    /// 探索深さ
    #[arg(long)]
    pub depth: Option<i32>,

    /// 探索ノード数
    #[arg(long)]
    pub nodes: Option<u64>,

    /// 思考時間固定（ミリ秒）
    #[arg(long)]
    pub movetime: Option<TimePoint>,

    /// 白の残り時間（ミリ秒）
    #[arg(long)]
    pub wtime: Option<TimePoint>,

    /// 黒の残り時間（ミリ秒）
    #[arg(long)]
    pub btime: Option<TimePoint>,

    #[arg(long, default_value_t = 0)]
    pub winc: TimePoint,

    #[arg(long, default_value_t = 0)]
    pub binc: TimePoint,

    #[arg(long, default_value_t = 0)]
    pub movestogo: i32,

    /// N手以内の詰みを探す
    #[arg(long)]
    pub mate: Option<i32>,

    #[arg(long, default_value_t = 1)]
    pub multipv: usize,

    /// 探索する手を限定する（UCI表記）
    #[arg(long, num_args = 1..)]
    pub searchmoves: Vec<String>,
}

impl LimitArgs {
    /// 局面に合わせて LimitsType を作る
    ///
    /// 解釈できない searchmoves は無視する。
    pub fn to_limits(&self, pos: &Position) -> LimitsType {
        let mut limits = LimitsType::new();
        limits.depth = self.depth.unwrap_or(0);
        limits.nodes = self.nodes.unwrap_or(0);
        limits.movetime = self.movetime.unwrap_or(0);
        limits.time[Color::White.index()] = self.wtime.unwrap_or(0);
        limits.time[Color::Black.index()] = self.btime.unwrap_or(0);
        limits.inc[Color::White.index()] = self.winc;
        limits.inc[Color::Black.index()] = self.binc;
        limits.movestogo = self.movestogo;
        limits.mate = self.mate.unwrap_or(0);
        limits.multi_pv = self.multipv.max(1);
        limits.search_moves = self
            .searchmoves
            .iter()
            .filter_map(|s| pos.parse_uci_move(s))
            .collect();
        limits
    }

    /// 制限が何も指定されていないか
    pub fn is_unlimited(&self) -> bool {
        self.depth.is_none()
            && self.nodes.is_none()
            && self.movetime.is_none()
            && self.wtime.is_none()
            && self.btime.is_none()
            && self.mate.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        engine: EngineArgs,
        #[command(flatten)]
        limits: LimitArgs,
    }

    #[test]
    fn test_parse_limits() {
        rchess_core::init();
        let cli = Cli::parse_from([
            "t", "--threads", "2", "--depth", "7", "--wtime", "1000", "--searchmoves", "e2e4", "zz",
        ]);
        assert_eq!(cli.engine.to_options().threads, 2);

        let pos = Position::startpos();
        let limits = cli.limits.to_limits(&pos);
        assert_eq!(limits.depth, 7);
        assert_eq!(limits.time[Color::White.index()], 1000);
        assert_eq!(limits.search_moves.len(), 1);
        assert!(!cli.limits.is_unlimited());
    }
}
