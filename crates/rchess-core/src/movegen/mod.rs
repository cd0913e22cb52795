//! 指し手生成
//!
//! - `generate_with_type`: 種類別の疑似合法手（Legal のみ合法手）
//! - `generate_legal`: 合法手を `MoveList` に列挙
//! - `perft` / `divide`: 生成器の検証用

mod generator;
mod movelist;
mod perft;
mod types;

pub use generator::{generate_legal, generate_with_type, has_legal_moves};
pub use movelist::MoveList;
pub use perft::{divide, perft};
pub use types::{ExtMove, ExtMoveBuffer, GenType};
