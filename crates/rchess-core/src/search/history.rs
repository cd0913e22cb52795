//! History統計
//!
//! 探索中の手の成功/失敗を記録し、手の順序付けに利用する。
//!
//! - `StatsEntry`: 範囲制限付き履歴エントリ
//! - `ButterflyHistory`: [Color][from_to] -> score
//! - `CapturePieceToHistory`: [piece][to][captured_pt] -> score
//! - `PieceToHistory`: [piece][to] -> score
//! - `ContinuationHistory`: [prev_pc][prev_to][pc][to] -> score
//! - `CounterMoveHistory`: [piece][square] -> Move
//! - `HistoryTables`: スレッドごとに1つ持つ上記テーブルの束

use crate::types::{Color, Depth, Move, Piece, PieceType, Square};

// =============================================================================
// 定数
// =============================================================================

/// from_toインデックスのサイズ
pub const FROM_TO_SIZE: usize = Square::NUM * Square::NUM;

/// 駒種の数（添字0は駒なし）
const PIECE_TYPE_NUM: usize = PieceType::NUM + 1;

/// 駒の数（NONE含む）
const PIECE_NUM: usize = Piece::NUM;

/// ButterflyHistoryの上限
pub const BUTTERFLY_D: i32 = 7183;

/// CapturePieceToHistoryの上限
pub const CAPTURE_D: i32 = 10692;

/// PieceToHistory / ContinuationHistoryの上限
pub const PIECE_TO_D: i32 = 29952;

/// continuation history がこれ未満の静かな手は qsearch で枝刈りする
pub const COUNTER_MOVE_PRUNE_THRESHOLD: i32 = 0;

/// クリア時の continuation history の初期値
const CONTINUATION_INIT: i16 = -71;

/// 探索深さに応じた履歴ボーナス
#[inline]
pub fn stat_bonus(depth: Depth) -> i32 {
    ((8 * depth + 240) * depth - 276).min(1907)
}

// =============================================================================
// StatsEntry
// =============================================================================

/// 履歴統計の1エントリ
///
/// 値の範囲を [-D, D] に制限しながら更新できる。
#[derive(Clone, Copy)]
pub struct StatsEntry<const D: i32> {
    value: i16,
}

impl<const D: i32> Default for StatsEntry<D> {
    fn default() -> Self {
        Self { value: 0 }
    }
}

impl<const D: i32> StatsEntry<D> {
    /// 値を取得
    #[inline]
    pub fn get(&self) -> i16 {
        self.value
    }

    /// 値を設定
    #[inline]
    pub fn set(&mut self, v: i16) {
        self.value = v;
    }

    /// ボーナス値を加算（範囲制限付き）
    ///
    /// 更新式: entry += clamp(bonus, -D, D) - entry * |clamp(bonus, -D, D)| / D
    ///
    /// bonus が D のとき entry は D に収束し、小さいボーナスはほぼそのまま加算される。
    #[inline]
    pub fn update(&mut self, bonus: i32) {
        let clamped = bonus.clamp(-D, D);
        let delta = clamped - (self.value as i32) * clamped.abs() / D;
        self.value = (self.value as i32 + delta) as i16;
        debug_assert!(
            (self.value as i32).abs() <= D,
            "StatsEntry out of range: {} (D={})",
            self.value,
            D
        );
    }
}

// =============================================================================
// ButterflyHistory
// =============================================================================

/// ButterflyHistory: [Color][from_to] -> score
///
/// 静かな手の成功/失敗を手番と移動元・移動先で記録する。
pub struct ButterflyHistory {
    table: [[StatsEntry<BUTTERFLY_D>; FROM_TO_SIZE]; Color::NUM],
}

impl ButterflyHistory {
    /// 値を取得
    #[inline]
    pub fn get(&self, color: Color, mv: Move) -> i16 {
        self.table[color.index()][mv.from_to()].get()
    }

    /// 値を更新
    #[inline]
    pub fn update(&mut self, color: Color, mv: Move, bonus: i32) {
        self.table[color.index()][mv.from_to()].update(bonus);
    }

    /// クリア
    pub fn clear(&mut self) {
        for color_table in &mut self.table {
            for entry in color_table.iter_mut() {
                entry.set(0);
            }
        }
    }
}

// =============================================================================
// CapturePieceToHistory
// =============================================================================

/// CapturePieceToHistory: [piece][to][captured_piece_type] -> score
pub struct CapturePieceToHistory {
    table: [[[StatsEntry<CAPTURE_D>; PIECE_TYPE_NUM]; Square::NUM]; PIECE_NUM],
}

impl CapturePieceToHistory {
    /// 値を取得
    ///
    /// アンパッサンのように移動先が空なら captured は `Piece::NONE`（添字0）。
    #[inline]
    pub fn get(&self, pc: Piece, to: Square, captured: Piece) -> i16 {
        self.table[pc.index()][to.index()][captured_index(captured)].get()
    }

    /// 値を更新
    #[inline]
    pub fn update(&mut self, pc: Piece, to: Square, captured: Piece, bonus: i32) {
        self.table[pc.index()][to.index()][captured_index(captured)].update(bonus);
    }

    /// クリア
    pub fn clear(&mut self) {
        for pc_table in self.table.iter_mut() {
            for sq_table in pc_table.iter_mut() {
                for entry in sq_table.iter_mut() {
                    entry.set(0);
                }
            }
        }
    }
}

#[inline]
fn captured_index(captured: Piece) -> usize {
    captured.piece_type_opt().map_or(0, PieceType::index)
}

// =============================================================================
// PieceToHistory
// =============================================================================

/// PieceToHistory: [piece][to] -> score
#[derive(Clone)]
pub struct PieceToHistory {
    table: [[StatsEntry<PIECE_TO_D>; Square::NUM]; PIECE_NUM],
}

impl PieceToHistory {
    /// 値を取得
    #[inline]
    pub fn get(&self, pc: Piece, to: Square) -> i16 {
        self.table[pc.index()][to.index()].get()
    }

    /// 値を更新
    #[inline]
    pub fn update(&mut self, pc: Piece, to: Square, bonus: i32) {
        self.table[pc.index()][to.index()].update(bonus);
    }

    /// 全エントリを同じ値で埋める
    pub fn fill(&mut self, v: i16) {
        for pc_table in &mut self.table {
            for entry in pc_table.iter_mut() {
                entry.set(v);
            }
        }
    }
}

// =============================================================================
// ContinuationHistory
// =============================================================================

/// ContinuationHistory: [prev_piece][prev_to][piece][to] -> score
///
/// 連続する2手の組み合わせ履歴。
/// HistoryTablesでは [王手中か][取る手か] の4面を持つ。
pub struct ContinuationHistory {
    table: [[PieceToHistory; Square::NUM]; PIECE_NUM],
}

impl ContinuationHistory {
    #[inline]
    pub fn get_table(&self, prev_pc: Piece, prev_to: Square) -> &PieceToHistory {
        &self.table[prev_pc.index()][prev_to.index()]
    }

    /// 内部テーブルへの可変参照を取得
    #[inline]
    pub fn get_table_mut(&mut self, prev_pc: Piece, prev_to: Square) -> &mut PieceToHistory {
        &mut self.table[prev_pc.index()][prev_to.index()]
    }

    /// 全エントリを同じ値で埋める
    pub fn fill(&mut self, v: i16) {
        for row in self.table.iter_mut() {
            for entry in row.iter_mut() {
                entry.fill(v);
            }
        }
    }
}

/// 探索スタックの各plyが参照する continuation history の位置
///
/// ルートより前や null move の後は `SENTINEL` を指す。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContHistKey {
    pub in_check: bool,
    pub capture: bool,
    pub piece: Piece,
    pub to: Square,
}

impl ContHistKey {
    /// 番兵（[false][false][NONE][A1]）
    pub const SENTINEL: ContHistKey = ContHistKey {
        in_check: false,
        capture: false,
        piece: Piece::NONE,
        to: Square::A1,
    };

    #[inline]
    pub const fn new(in_check: bool, capture: bool, piece: Piece, to: Square) -> Self {
        Self {
            in_check,
            capture,
            piece,
            to,
        }
    }
}

impl Default for ContHistKey {
    fn default() -> Self {
        Self::SENTINEL
    }
}

// =============================================================================
// CounterMoveHistory
// =============================================================================

/// CounterMoveHistory: [piece][square] -> Move
///
/// 直前の相手の手に対するカウンター手。
pub struct CounterMoveHistory {
    table: [[Move; Square::NUM]; PIECE_NUM],
}

impl CounterMoveHistory {
    /// 値を取得
    #[inline]
    pub fn get(&self, pc: Piece, sq: Square) -> Move {
        self.table[pc.index()][sq.index()]
    }

    /// 値を設定
    #[inline]
    pub fn set(&mut self, pc: Piece, sq: Square, mv: Move) {
        self.table[pc.index()][sq.index()] = mv;
    }

    /// クリア
    pub fn clear(&mut self) {
        for pc_table in &mut self.table {
            pc_table.fill(Move::NONE);
        }
    }
}

// =============================================================================
// HistoryTables
// =============================================================================

/// 探索スレッドごとの履歴テーブル一式
///
/// PERF: continuation history だけで約8MBあるため、必ずヒープに確保する。
pub struct HistoryTables {
    pub main_history: ButterflyHistory,
    pub capture_history: CapturePieceToHistory,
    pub continuation_history: [[ContinuationHistory; 2]; 2],
    pub counter_moves: CounterMoveHistory,
}

impl HistoryTables {
    /// 新しいHistoryTablesを作成（ヒープ確保）
    pub fn new_boxed() -> Box<Self> {
        // SAFETY: 各テーブルはi16とMove(u16)のみで構成され、ゼロ初期化は常に有効。
        let mut history = unsafe { Box::<Self>::new_zeroed().assume_init() };
        history.clear();
        history
    }

    /// すべての履歴テーブルを初期状態に戻す
    pub fn clear(&mut self) {
        self.main_history.clear();
        self.capture_history.clear();
        self.counter_moves.clear();
        for row in &mut self.continuation_history {
            for ch in row {
                ch.fill(CONTINUATION_INIT);
                // 番兵は常に枝刈り閾値を下回る
                ch.get_table_mut(Piece::NONE, Square::A1)
                    .fill((COUNTER_MOVE_PRUNE_THRESHOLD - 1) as i16);
            }
        }
    }

    /// キーが指す PieceToHistory
    #[inline]
    pub fn continuation(&self, key: ContHistKey) -> &PieceToHistory {
        self.continuation_history[key.in_check as usize][key.capture as usize]
            .get_table(key.piece, key.to)
    }

    /// キーが指す PieceToHistory（可変）
    #[inline]
    pub fn continuation_mut(&mut self, key: ContHistKey) -> &mut PieceToHistory {
        self.continuation_history[key.in_check as usize][key.capture as usize]
            .get_table_mut(key.piece, key.to)
    }
}
