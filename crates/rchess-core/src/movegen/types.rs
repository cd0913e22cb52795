//! 指し手生成で使う型

use std::cmp::Ordering;
use std::ops::{Index, IndexMut};

use crate::types::{MAX_MOVES, Move};

/// 生成する指し手の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenType {
    /// 駒を取る手とクイーンへの成り
    Captures,
    /// 駒を取らない手（クイーン以外への成りを含む）
    Quiets,
    /// 駒を取らない王手
    QuietChecks,
    /// 王手回避手（王手されている局面専用）
    Evasions,
    /// 王手されていない局面での全ての疑似合法手
    NonEvasions,
    /// 合法手
    Legal,
}

/// 順序付け用の値を持つ指し手
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtMove {
    pub mv: Move,
    pub value: i32,
}

impl ExtMove {
    #[inline]
    pub const fn new(mv: Move, value: i32) -> Self {
        Self { mv, value }
    }
}

impl PartialOrd for ExtMove {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExtMove {
    /// 値で比較し、同値なら指し手の数値で順序を決める
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.mv.to_u16().cmp(&other.mv.to_u16()))
    }
}

/// 固定長の指し手バッファ
///
/// 1局面の指し手数は `MAX_MOVES` を超えない。
#[derive(Clone)]
pub struct ExtMoveBuffer {
    moves: [ExtMove; MAX_MOVES],
    len: usize,
}

impl ExtMoveBuffer {
    #[inline]
    pub fn new() -> Self {
        Self {
            moves: [ExtMove::default(); MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// 指し手を値0で追加
    #[inline]
    pub fn push_move(&mut self, mv: Move) {
        self.push(ExtMove::new(mv, 0));
    }

    #[inline]
    pub fn push(&mut self, ext: ExtMove) {
        debug_assert!(self.len < MAX_MOVES);
        self.moves[self.len] = ext;
        self.len += 1;
    }

    /// 末尾を切り詰める
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// i番目の要素を末尾の要素で置き換えて長さを1減らす
    #[inline]
    pub fn swap_remove(&mut self, i: usize) -> ExtMove {
        debug_assert!(i < self.len);
        let ext = self.moves[i];
        self.len -= 1;
        self.moves[i] = self.moves[self.len];
        ext
    }

    #[inline]
    pub fn as_slice(&self) -> &[ExtMove] {
        &self.moves[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [ExtMove] {
        &mut self.moves[..self.len]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ExtMove> {
        self.as_slice().iter()
    }

    /// 指し手を含むか
    pub fn contains(&self, mv: Move) -> bool {
        self.iter().any(|ext| ext.mv == mv)
    }
}

impl Default for ExtMoveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for ExtMoveBuffer {
    type Output = ExtMove;

    #[inline]
    fn index(&self, i: usize) -> &ExtMove {
        &self.as_slice()[i]
    }
}

impl IndexMut<usize> for ExtMoveBuffer {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut ExtMove {
        &mut self.as_mut_slice()[i]
    }
}
