//! # rchess-core
//!
//! ビットボードによるチェスエンジンコアライブラリ。
//!
//! ## モジュール構成
//!
//! - `types`: 基本型（Color, Square, Piece, Move, Value, etc.）
//! - `bitboard`: ビットボード演算と利きテーブル
//! - `position`: 局面表現とdo_move/undo_move
//! - `movegen`: 指し手生成
//! - `eval`: 評価関数
//! - `tt`: 置換表（Transposition Table）
//! - `search`: 探索アルゴリズム、手の順序付け、時間管理、並列探索
//!
//! 利用前に [`init`] を一度呼ぶこと。

pub mod types;

pub mod bitboard;
pub mod position;

pub mod movegen;

pub mod eval;

pub mod tt;

pub mod search;

/// グローバルテーブル（スライダーの利き、cuckoo）を初期化する
///
/// 何度呼んでもよい。
pub fn init() {
    bitboard::init_attack_tables();
    position::init_cuckoo();
}
