//! 局面状態（StateInfo）と状態スタック
//!
//! Zobrist ハッシュや王手情報に加えて、評価関数の差分更新用 Accumulator/DirtyPiece を保持する。
//! StateInfo は [`StateStack`] 上にplyごとに並び、一つ前の状態はインデックスで参照する。

use crate::bitboard::Bitboard;
use crate::eval::Accumulator;
use crate::types::{CastlingRights, Color, MAX_PLY, Piece, PieceType, Square};

/// 局面状態
///
/// do_move時に新しい要素をスタックに書き込み、undo_move時はカーソルを戻すだけで復元する。
#[derive(Clone, Copy)]
pub struct StateInfo {
    // === do_move時にコピーされる部分 ===
    /// ポーンのハッシュ
    pub pawn_key: u64,
    /// ポーン以外の駒の価値の合計 [Color]
    pub non_pawn_material: [i32; Color::NUM],
    /// キャスリング権
    pub castling_rights: CastlingRights,
    /// 50手ルール用カウンタ（半手）
    pub rule50: i32,
    /// null moveからの手数
    pub plies_from_null: i32,
    /// アンパッサンで取れる升
    pub ep_square: Option<Square>,

    // === 再計算される部分 ===
    /// 局面のハッシュ（手番込み）
    pub key: u64,
    /// 王手している駒
    pub checkers: Bitboard,
    /// 自キングへのpinを作っている駒 [Color]（両陣営の駒を含む）
    pub blockers_for_king: [Bitboard; Color::NUM],
    /// pinしている駒 [Color]（相手キングをpinしている側の色で添字）
    pub pinners: [Bitboard; Color::NUM],
    /// 王手となる升 [PieceType]
    pub check_squares: [Bitboard; PieceType::NUM + 1],
    /// 捕獲した駒
    pub captured_piece: Piece,
    /// 同一局面までの距離（負なら3回目の出現）
    pub repetition: i32,
    /// 評価関数の差分更新用キャッシュ
    pub accumulator: Accumulator,
    /// 差分更新用の駒移動情報
    pub dirty_piece: DirtyPiece,
}

impl StateInfo {
    /// 空の状態
    pub const EMPTY: StateInfo = StateInfo {
        pawn_key: 0,
        non_pawn_material: [0; Color::NUM],
        castling_rights: CastlingRights::NONE,
        rule50: 0,
        plies_from_null: 0,
        ep_square: None,
        key: 0,
        checkers: Bitboard::EMPTY,
        blockers_for_king: [Bitboard::EMPTY; Color::NUM],
        pinners: [Bitboard::EMPTY; Color::NUM],
        check_squares: [Bitboard::EMPTY; PieceType::NUM + 1],
        captured_piece: Piece::NONE,
        repetition: 0,
        accumulator: Accumulator::EMPTY,
        dirty_piece: DirtyPiece::new(),
    };

    /// do_move用に引き継ぐ部分だけを残した状態を作る
    #[inline]
    pub fn partial_clone(&self) -> StateInfo {
        StateInfo {
            pawn_key: self.pawn_key,
            non_pawn_material: self.non_pawn_material,
            castling_rights: self.castling_rights,
            rule50: self.rule50,
            plies_from_null: self.plies_from_null,
            ep_square: self.ep_square,
            key: self.key,
            accumulator: self.accumulator,
            ..StateInfo::EMPTY
        }
    }
}

impl Default for StateInfo {
    fn default() -> Self {
        StateInfo::EMPTY
    }
}

/// 差分更新での1駒分の変化
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangedPiece {
    pub piece: Piece,
    /// 移動元（盤上に新しく現れる場合はNone）
    pub from: Option<Square>,
    /// 移動先（盤上から消える場合はNone）
    pub to: Option<Square>,
}

impl ChangedPiece {
    pub const EMPTY: ChangedPiece = ChangedPiece {
        piece: Piece::NONE,
        from: None,
        to: None,
    };
}

/// 差分更新用の駒移動情報（固定長バッファでヒープ確保を回避）
#[derive(Clone, Copy, Debug)]
pub struct DirtyPiece {
    /// 変化した駒（最大3つ: 動いた駒 + 取られた駒 or キャスリングのルーク or 成り）
    pieces: [ChangedPiece; Self::MAX_PIECES],
    /// 有効な pieces 要素数
    pieces_len: u8,
}

impl DirtyPiece {
    /// pieces の最大要素数
    pub const MAX_PIECES: usize = 3;

    /// 新しい DirtyPiece を作成
    #[inline]
    pub const fn new() -> Self {
        Self {
            pieces: [ChangedPiece::EMPTY; Self::MAX_PIECES],
            pieces_len: 0,
        }
    }

    /// 情報をクリア
    #[inline]
    pub fn clear(&mut self) {
        self.pieces_len = 0;
    }

    /// 駒変化を追加
    #[inline]
    pub fn push(&mut self, piece: ChangedPiece) {
        debug_assert!((self.pieces_len as usize) < Self::MAX_PIECES);
        self.pieces[self.pieces_len as usize] = piece;
        self.pieces_len += 1;
    }

    /// idx番目の駒変化の移動先を書き換える（成りでポーンが消える場合）
    #[inline]
    pub fn set_to(&mut self, idx: usize, to: Option<Square>) {
        debug_assert!(idx < self.pieces_len as usize);
        self.pieces[idx].to = to;
    }

    /// 駒変化のスライスを取得
    #[inline]
    pub fn pieces(&self) -> &[ChangedPiece] {
        &self.pieces[..self.pieces_len as usize]
    }
}

impl Default for DirtyPiece {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// StateStack
// =============================================================================

/// StateInfo のアリーナ
///
/// 呼び出し側が確保して [`Position`](super::Position) に渡す。
/// 探索中は読み筋の深さ分だけ要素を使い回し、容量を超えたときだけ伸長する。
#[derive(Clone)]
pub struct StateStack {
    states: Vec<StateInfo>,
}

impl StateStack {
    /// 探索に十分な容量で作成
    pub fn new() -> Self {
        Self::with_capacity(MAX_PLY as usize + 64)
    }

    /// 容量を指定して作成（ルート状態1つを含む）
    pub fn with_capacity(capacity: usize) -> Self {
        let mut states = Vec::with_capacity(capacity.max(1));
        states.push(StateInfo::EMPTY);
        StateStack { states }
    }

    /// 確保済みの要素数
    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// 常にルート状態を持つので空にはならない
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// 先頭1要素だけを残して初期化する（容量は維持）
    pub(super) fn reset(&mut self) {
        self.states.truncate(1);
        self.states[0] = StateInfo::EMPTY;
    }

    /// idx の要素に書き込む（idx == len のときは末尾に追加）
    #[inline]
    pub(super) fn store(&mut self, idx: usize, st: StateInfo) {
        debug_assert!(idx <= self.states.len());
        if idx == self.states.len() {
            self.states.push(st);
        } else {
            self.states[idx] = st;
        }
    }

    /// 先頭から idx までを残して切り詰める
    ///
    /// ルートより前の履歴を持ったまま探索用に使い回すときに呼ぶ。
    pub(super) fn truncate_after(&mut self, idx: usize) {
        self.states.truncate(idx + 1);
    }

    #[inline]
    pub(super) fn get(&self, idx: usize) -> &StateInfo {
        &self.states[idx]
    }

    #[inline]
    pub(super) fn get_mut(&mut self, idx: usize) -> &mut StateInfo {
        &mut self.states[idx]
    }
}

impl Default for StateStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_clone_keeps_copied_fields() {
        let mut st = StateInfo::EMPTY;
        st.rule50 = 12;
        st.key = 0x1234;
        st.castling_rights = CastlingRights::WHITE;
        st.checkers = Bitboard::from_square(Square::E1);
        st.captured_piece = Piece::B_KNIGHT;
        st.repetition = 4;

        let next = st.partial_clone();
        assert_eq!(next.rule50, 12);
        assert_eq!(next.key, 0x1234);
        assert_eq!(next.castling_rights, CastlingRights::WHITE);
        // 再計算部分は引き継がない
        assert!(next.checkers.is_empty());
        assert_eq!(next.captured_piece, Piece::NONE);
        assert_eq!(next.repetition, 0);
    }

    #[test]
    fn test_dirty_piece_push() {
        let mut dp = DirtyPiece::new();
        dp.push(ChangedPiece {
            piece: Piece::W_PAWN,
            from: Some(Square::E2),
            to: Some(Square::E4),
        });
        assert_eq!(dp.pieces().len(), 1);
        dp.clear();
        assert!(dp.pieces().is_empty());
    }

    #[test]
    fn test_state_stack_store_and_reset() {
        let mut stack = StateStack::with_capacity(4);
        assert_eq!(stack.len(), 1);

        let mut st = StateInfo::EMPTY;
        st.rule50 = 3;
        stack.store(1, st);
        stack.store(2, st);
        assert_eq!(stack.len(), 3);

        // 既存要素は上書き
        st.rule50 = 7;
        stack.store(1, st);
        assert_eq!(stack.get(1).rule50, 7);
        assert_eq!(stack.len(), 3);

        stack.reset();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.get(0).rule50, 0);
    }
}
