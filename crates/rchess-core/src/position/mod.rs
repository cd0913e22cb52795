//! 局面表現モジュール
//!
//! チェスの局面を表現し、手の実行・巻き戻しを行う。
//!
//! - `Position`: 局面本体（盤面配列・Bitboard・駒数・キャスリング情報・手番・手数）
//! - `StateInfo`: 局面状態（Zobristハッシュ、王手情報、pin情報、繰り返し距離など）
//! - `StateStack`: `StateInfo` のアリーナ。局面はカーソルだけを持つ
//! - `do_move` / `undo_move` / `do_null_move`: 手の実行と巻き戻し
//! - FEN形式の解析・出力
//!
//! 盤面配列・Bitboard・Zobristキーは `Position` のメソッド（`put_piece` / `do_move` 系）を
//! 通じて更新されることを前提とし、常に互いに整合しているように保つ。

mod cuckoo;
mod fen;
mod movepicker_support;
mod pos;
mod state;
mod zobrist;

pub use cuckoo::init_cuckoo;
pub use fen::{FenError, START_FEN};
pub use pos::Position;
pub use state::{ChangedPiece, DirtyPiece, StateInfo, StateStack};
pub use zobrist::{
    ZOBRIST, zobrist_castling, zobrist_enpassant, zobrist_no_pawns, zobrist_psq, zobrist_side,
};
