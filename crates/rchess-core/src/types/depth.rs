//! 探索深さ（Depth）と関連定数

/// 探索深さ
pub type Depth = i32;

/// 最大探索ply
pub const MAX_PLY: i32 = 246;

/// 最大合法手数
pub const MAX_MOVES: usize = 256;

/// 静止探索で王手も生成する深さ
pub const DEPTH_QS_CHECKS: Depth = 0;
/// 静止探索で王手を生成しない深さ
pub const DEPTH_QS_NO_CHECKS: Depth = -1;
/// 静止探索で取り返しのみ生成する深さ
pub const DEPTH_QS_RECAPTURES: Depth = -5;
/// 深さなし
pub const DEPTH_NONE: Depth = -6;
/// 置換表エントリのdepth8に加算するオフセット
pub const DEPTH_OFFSET: Depth = -7;
