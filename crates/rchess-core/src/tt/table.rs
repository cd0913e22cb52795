//! TranspositionTable本体
//!
//! - Cluster: エントリのグループ
//! - TranspositionTable: テーブル本体
//! - probe/write操作

use std::sync::atomic::{AtomicU8, Ordering};

use log::{debug, warn};

use super::entry::{TTData, TTEntry};
use super::{CLUSTER_SIZE, GENERATION_DELTA, GENERATION_MASK};
use crate::types::{Bound, Depth, Move, Value};

/// クラスター構造
/// 同じハッシュインデックスに対して複数のエントリを持つ
#[repr(C, align(32))]
pub struct Cluster {
    entries: [TTEntry; CLUSTER_SIZE],
    _padding: [u8; 2], // 10 * 3 + 2 = 32 bytes
}

impl Cluster {
    /// 新しいクラスターを作成
    const fn new() -> Self {
        Self {
            entries: [TTEntry::new(), TTEntry::new(), TTEntry::new()],
            _padding: [0; 2],
        }
    }

    fn clear(&self) {
        for entry in &self.entries {
            entry.clear();
        }
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

// クラスターは32バイト（キャッシュラインに2つ入る）
const _: () = assert!(std::mem::size_of::<Cluster>() == 32);

/// クラスター配列を確保する。足りなければ半分ずつ減らして再試行する
fn allocate_clusters(mut count: usize) -> Vec<Cluster> {
    loop {
        let mut v: Vec<Cluster> = Vec::new();
        if v.try_reserve_exact(count).is_ok() {
            v.resize_with(count, Cluster::new);
            return v;
        }
        if count <= 2 {
            // これ以上は減らせない。通常の確保に任せる
            v.resize_with(2, Cluster::new);
            return v;
        }
        warn!(
            "置換表の確保に失敗しました ({} MB)。サイズを半分にして再試行します",
            count * std::mem::size_of::<Cluster>() / (1024 * 1024)
        );
        count /= 2;
    }
}

/// 置換表
pub struct TranspositionTable {
    /// クラスターの配列
    table: Vec<Cluster>,
    /// 世代カウンター（下位3bitは使用しない）
    generation8: AtomicU8,
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位）
    pub fn new(mb_size: usize) -> Self {
        let cluster_count = Self::cluster_count_for(mb_size);
        let table = allocate_clusters(cluster_count);
        debug!("置換表を確保しました: {} clusters", table.len());

        Self {
            table,
            generation8: AtomicU8::new(0),
        }
    }

    fn cluster_count_for(mb_size: usize) -> usize {
        (mb_size * 1024 * 1024 / std::mem::size_of::<Cluster>()).max(2)
    }

    /// クラスター数
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.table.len()
    }

    /// サイズを変更（内容は失われる）
    pub fn resize(&mut self, mb_size: usize) {
        let new_count = Self::cluster_count_for(mb_size);

        if new_count != self.table.len() {
            // 古いテーブルを先に解放してから確保する
            self.table = Vec::new();
            self.table = allocate_clusters(new_count);
            debug!("置換表のサイズを変更しました: {} MB", mb_size);
        }
        self.generation8.store(0, Ordering::Relaxed);
    }

    /// クリア
    ///
    /// テーブルが大きい場合は複数スレッドでゼロクリアする。
    pub fn clear(&self, threads: usize) {
        self.generation8.store(0, Ordering::Relaxed);
        let len = self.table.len();
        let threads = threads.max(1);

        // サイズが小さい場合やスレッド数が1の場合は逐次クリア
        if threads <= 1 || len < threads * 1024 {
            for cluster in self.table.iter() {
                cluster.clear();
            }
            return;
        }

        let chunk = len.div_ceil(threads);
        std::thread::scope(|scope| {
            for part in self.table.chunks(chunk) {
                scope.spawn(move || {
                    for cluster in part {
                        cluster.clear();
                    }
                });
            }
        });
    }

    /// 新しい探索を開始（世代を進める）
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// 置換表を検索
    ///
    /// キーの下位16bitが一致するか空きのエントリがあればその世代を更新して返す。
    /// 見つからなければ置換価値（depth8 − relative_age）が最小のエントリを
    /// 書き込み先として返す。
    pub fn probe(&self, key: u64) -> ProbeResult<'_> {
        let cluster = self.first_entry(key);
        let key16 = key as u16;
        let gen8 = self.generation();

        for entry in &cluster.entries {
            if entry.key16() == key16 || !entry.is_occupied() {
                entry.refresh(gen8);
                let found = entry.is_occupied();
                return ProbeResult {
                    found,
                    data: if found { entry.read() } else { TTData::EMPTY },
                    writer: TTWriter {
                        entry,
                        generation8: gen8,
                    },
                };
            }
        }

        // 置換するエントリを選択（価値が最小のもの）
        let mut replace = &cluster.entries[0];
        for entry in &cluster.entries[1..] {
            let worth = |e: &TTEntry| e.depth8() as i32 - e.relative_age(gen8) as i32;
            if worth(replace) > worth(entry) {
                replace = entry;
            }
        }

        ProbeResult {
            found: false,
            data: TTData::EMPTY,
            writer: TTWriter {
                entry: replace,
                generation8: gen8,
            },
        }
    }

    /// 置換表の使用率を1000分率で返す
    ///
    /// 先頭1000クラスターのうち現在の世代のエントリの割合。
    pub fn hashfull(&self) -> i32 {
        let gen8 = self.generation();
        let mut count = 0;

        for cluster in self.table.iter().take(1000) {
            for entry in &cluster.entries {
                if entry.is_occupied() && (entry.gen_bound8() as u16 & GENERATION_MASK) == gen8 as u16
                {
                    count += 1;
                }
            }
        }

        count * 1000 / (self.table.len().min(1000) * CLUSTER_SIZE) as i32
    }

    /// クラスターインデックスを計算
    #[inline]
    fn cluster_index(&self, key: u64) -> usize {
        // key * cluster_count / 2^64 でインデックスを計算
        ((key as u128 * self.table.len() as u128) >> 64) as usize
    }

    /// クラスターの参照を取得
    #[inline]
    fn first_entry(&self, key: u64) -> &Cluster {
        &self.table[self.cluster_index(key)]
    }

    /// 指定キーのクラスターをプリフェッチ
    #[inline]
    pub fn prefetch(&self, key: u64) {
        let cluster = self.first_entry(key);

        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};
            _mm_prefetch::<_MM_HINT_T0>(cluster as *const _ as *const i8);
        }

        #[cfg(not(target_arch = "x86_64"))]
        let _ = cluster; // 何もしない
    }
}

/// probe結果
pub struct ProbeResult<'a> {
    /// ヒットしたか
    pub found: bool,
    /// 読み取ったデータ
    pub data: TTData,
    /// 書き込み用エントリ
    pub writer: TTWriter<'a>,
}

/// 書き込み先エントリ
#[derive(Clone, Copy)]
pub struct TTWriter<'a> {
    entry: &'a TTEntry,
    generation8: u8,
}

impl TTWriter<'_> {
    /// エントリに書き込む
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &self,
        key: u64,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
    ) {
        self.entry.save(key, value, is_pv, bound, depth, mv, eval, self.generation8);
    }
}
