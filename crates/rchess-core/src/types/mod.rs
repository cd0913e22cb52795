//! 基本型モジュール
//!
//! チェスエンジンで使用する基本的な型を定義する。
//!
//! # 型の依存関係
//!
//! ```text
//! Color
//!   ↓
//! File, Rank
//!   ↓
//! Square
//!   ↓
//! PieceType
//!   ↓
//! Piece ← Move
//!
//! Value, Depth, Bound, CastlingRights は独立
//! ```

mod bound;
mod castling;
mod color;
mod depth;
mod moves;
mod piece;
mod square;
mod value;

pub use bound::Bound;
pub use castling::CastlingRights;
pub use color::Color;
pub use depth::*;
pub use moves::{Move, MoveType};
pub use piece::{Piece, PieceType};
pub use square::{File, Rank, Square};
pub use value::*;
