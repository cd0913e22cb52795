//! 置換表モジュール
//!
//! 探索結果をキャッシュする置換表（Transposition Table）。
//!
//! - `TTEntry`: エントリ（10バイト、16bitキー）
//! - `Cluster`: エントリのグループ（32バイト）
//! - `TranspositionTable`: テーブル本体
//! - 世代管理
//! - prefetch
//!
//! クラスターインデックスは64bitキーとクラスター数の積の上位64bitで決定し、
//! クラスター内マッチングに下位16bitを使用する。
//! 10バイトエントリ × 3 + 2パディング = 32バイト/クラスター。
//!
//! 全スレッドからロックなしで読み書きする。各フィールドは Relaxed の
//! アトミック変数なので、読み出したデータはフィールド単位で別々の書き込みに
//! 由来しうる。探索側はヒント以上の信頼をしないこと。

mod entry;
mod table;

pub use entry::{TTData, TTEntry};
pub use table::{ProbeResult, TTWriter, TranspositionTable};

/// クラスターサイズ（エントリ数）
pub const CLUSTER_SIZE: usize = 3;

/// Generation関連の定数
///
/// genBound8 の下位3bitは PV フラグ(1bit)と Bound(2bit)、上位5bitが世代。
pub const GENERATION_BITS: u32 = 3;
pub const GENERATION_DELTA: u8 = 1 << GENERATION_BITS; // 8
pub const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16;
pub const GENERATION_MASK: u16 = 0xF8; // (0xFF << GENERATION_BITS) as u8
