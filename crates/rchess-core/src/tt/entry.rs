//! 置換表エントリ

use std::sync::atomic::{AtomicI16, AtomicU8, AtomicU16, Ordering};

use super::{GENERATION_CYCLE, GENERATION_DELTA, GENERATION_MASK};
use crate::types::{Bound, DEPTH_OFFSET, Depth, Move, Value};

/// 読み出したエントリの内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TTData {
    pub mv: Move,
    pub value: Value,
    pub eval: Value,
    pub depth: Depth,
    pub bound: Bound,
    pub is_pv: bool,
}

impl TTData {
    pub const EMPTY: TTData = TTData {
        mv: Move::NONE,
        value: Value::NONE,
        eval: Value::NONE,
        depth: DEPTH_OFFSET,
        bound: Bound::None,
        is_pv: false,
    };
}

/// 置換表エントリ（10バイト）
///
/// - key16:      キーの下位16bit
/// - depth8:     深さ − DEPTH_OFFSET（0 は空きエントリ）
/// - gen_bound8: 世代(5bit) | PV(1bit) | Bound(2bit)
/// - move16, value16, eval16
#[repr(C)]
pub struct TTEntry {
    key16: AtomicU16,
    depth8: AtomicU8,
    gen_bound8: AtomicU8,
    move16: AtomicU16,
    value16: AtomicI16,
    eval16: AtomicI16,
}

const _: () = assert!(std::mem::size_of::<TTEntry>() == 10);

impl TTEntry {
    pub const fn new() -> Self {
        Self {
            key16: AtomicU16::new(0),
            depth8: AtomicU8::new(0),
            gen_bound8: AtomicU8::new(0),
            move16: AtomicU16::new(0),
            value16: AtomicI16::new(0),
            eval16: AtomicI16::new(0),
        }
    }

    #[inline]
    pub fn key16(&self) -> u16 {
        self.key16.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn depth8(&self) -> u8 {
        self.depth8.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn gen_bound8(&self) -> u8 {
        self.gen_bound8.load(Ordering::Relaxed)
    }

    /// 使用中か
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.depth8() != 0
    }

    /// 現在の世代から見た古さ（GENERATION_DELTA 単位）
    #[inline]
    pub fn relative_age(&self, generation8: u8) -> u8 {
        // 世代カウンタの一周を跨いでも正しく差を取る
        ((GENERATION_CYCLE + generation8 as u16 - self.gen_bound8() as u16) & GENERATION_MASK)
            as u8
    }

    /// 世代を現在のものに更新（PVフラグとBoundは保持）
    #[inline]
    pub(super) fn refresh(&self, generation8: u8) {
        let low = self.gen_bound8() & (GENERATION_DELTA - 1);
        self.gen_bound8.store(generation8 | low, Ordering::Relaxed);
    }

    /// 内容を読み出す
    pub fn read(&self) -> TTData {
        let gen_bound8 = self.gen_bound8();
        TTData {
            mv: Move::from_u16(self.move16.load(Ordering::Relaxed)),
            value: Value::new(self.value16.load(Ordering::Relaxed) as i32),
            eval: Value::new(self.eval16.load(Ordering::Relaxed) as i32),
            depth: self.depth8() as Depth + DEPTH_OFFSET,
            bound: Bound::from_u8(gen_bound8 & 0x3),
            is_pv: gen_bound8 & 0x4 != 0,
        }
    }

    /// 書き込む
    ///
    /// 同じ局面で指し手が与えられなければ既存の指し手を残す。
    /// 上書きするのは、Exact、別の局面、十分な深さ、古い世代のいずれかの場合。
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key: u64,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        let key16 = key as u16;
        let same_key = key16 == self.key16();

        if mv.is_some() || !same_key {
            self.move16.store(mv.to_u16(), Ordering::Relaxed);
        }

        if bound == Bound::Exact
            || !same_key
            || depth - DEPTH_OFFSET + 2 * is_pv as i32 > self.depth8() as i32 - 4
            || self.relative_age(generation8) != 0
        {
            debug_assert!(depth > DEPTH_OFFSET);
            debug_assert!(depth < 256 + DEPTH_OFFSET);

            self.key16.store(key16, Ordering::Relaxed);
            self.depth8.store((depth - DEPTH_OFFSET) as u8, Ordering::Relaxed);
            self.gen_bound8
                .store(generation8 | ((is_pv as u8) << 2) | bound as u8, Ordering::Relaxed);
            self.value16.store(value.raw() as i16, Ordering::Relaxed);
            self.eval16.store(eval.raw() as i16, Ordering::Relaxed);
        }
    }

    /// 空にする
    #[inline]
    pub(super) fn clear(&self) {
        self.key16.store(0, Ordering::Relaxed);
        self.depth8.store(0, Ordering::Relaxed);
        self.gen_bound8.store(0, Ordering::Relaxed);
        self.move16.store(0, Ordering::Relaxed);
        self.value16.store(0, Ordering::Relaxed);
        self.eval16.store(0, Ordering::Relaxed);
    }
}

impl Default for TTEntry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    #[test]
    fn test_entry_save_and_read() {
        let e = TTEntry::new();
        assert!(!e.is_occupied());

        let mv = Move::new(Square::E2, Square::E4);
        e.save(0x1234_5678, Value::new(37), true, Bound::Lower, 9, mv, Value::new(12), 8);

        let d = e.read();
        assert!(e.is_occupied());
        assert_eq!(e.key16(), 0x5678);
        assert_eq!(d.mv, mv);
        assert_eq!(d.value, Value::new(37));
        assert_eq!(d.eval, Value::new(12));
        assert_eq!(d.depth, 9);
        assert_eq!(d.bound, Bound::Lower);
        assert!(d.is_pv);
    }

    #[test]
    fn test_entry_keeps_move_without_new_move() {
        let e = TTEntry::new();
        let mv = Move::new(Square::G1, Square::F3);
        e.save(42, Value::new(10), false, Bound::Lower, 10, mv, Value::ZERO, 0);
        e.save(42, Value::new(20), false, Bound::Exact, 3, Move::NONE, Value::ZERO, 0);
        let d = e.read();
        assert_eq!(d.mv, mv);
        assert_eq!(d.value, Value::new(20));
    }

    #[test]
    fn test_entry_shallow_non_exact_does_not_overwrite() {
        let e = TTEntry::new();
        e.save(42, Value::new(10), false, Bound::Lower, 20, Move::NONE, Value::ZERO, 0);
        // 同じ世代・同じキーで浅い Upper は上書きしない
        e.save(42, Value::new(-50), false, Bound::Upper, 5, Move::NONE, Value::ZERO, 0);
        let d = e.read();
        assert_eq!(d.depth, 20);
        assert_eq!(d.value, Value::new(10));

        // 世代が進めば上書きする
        e.save(42, Value::new(-50), false, Bound::Upper, 5, Move::NONE, Value::ZERO, 8);
        assert_eq!(e.read().depth, 5);
    }

    #[test]
    fn test_relative_age_wraps() {
        let e = TTEntry::new();
        e.save(1, Value::ZERO, false, Bound::Exact, 1, Move::NONE, Value::ZERO, 248);
        assert_eq!(e.relative_age(248), 0);
        // 248 → 0 は1世代進んだだけ
        assert_eq!(e.relative_age(0), GENERATION_DELTA);
    }
}
