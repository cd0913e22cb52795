//! 評価関数
//!
//! 探索からは [`Evaluator`] トレイトを通じて呼ばれる。評価値は手番側から見た値。

pub mod material;
mod psqt;

pub use material::{EvalError, EvalParams, MaterialEvaluator, load_evaluator};
pub use psqt::{Accumulator, PSQT, PsqTable};

use crate::position::Position;
use crate::types::Value;

/// 評価結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalResult {
    /// 手番側から見た評価値
    pub value: Value,
    /// 評価の不確かさ（大きいほど枝刈りを控える）
    pub complexity: i32,
}

/// 静的評価関数
///
/// 局面（と StateInfo の Accumulator）だけに依存する副作用のない関数であること。
/// 探索スレッド間で共有されるため `Send + Sync` を要求する。
pub trait Evaluator: Send + Sync {
    /// 手番側から見た評価値
    fn evaluate(&self, pos: &Position) -> Value;

    /// 評価値と不確かさ
    fn evaluate_full(&self, pos: &Position) -> EvalResult {
        EvalResult {
            value: self.evaluate(pos),
            complexity: 0,
        }
    }
}

impl<T: Evaluator + ?Sized> Evaluator for std::sync::Arc<T> {
    fn evaluate(&self, pos: &Position) -> Value {
        (**self).evaluate(pos)
    }

    fn evaluate_full(&self, pos: &Position) -> EvalResult {
        (**self).evaluate_full(pos)
    }
}
