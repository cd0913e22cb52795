//! perft ツール
//!
//! 指定局面の葉ノード数を数え、指し手生成の検証と速度計測に使う。

use std::time::Instant;

use anyhow::{Result, ensure};
use clap::Parser;
use serde::Serialize;

use rchess_core::movegen::{divide, perft};
use tools::common::{init_logger, setup_position};

#[derive(Parser, Debug)]
#[command(name = "perft")]
#[command(about = "Count leaf nodes of the legal move tree")]
struct Cli {
    /// 局面（省略時は初期局面）
    #[arg(long)]
    fen: Option<String>,

    /// 局面から指す手（UCI表記）
    #[arg(long, num_args = 1..)]
    moves: Vec<String>,

    /// 深さ
    #[arg(short, long, default_value_t = 5)]
    depth: u32,

    /// ルートの指し手ごとに内訳を出す
    #[arg(long, default_value_t = false)]
    divide: bool,

    #[arg(long, default_value_t = false)]
    chess960: bool,

    /// 結果をJSONで出力する
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct PerftReport {
    fen: String,
    depth: u32,
    nodes: u64,
    time_ms: u128,
    nps: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    divide: Vec<(String, u64)>,
}

fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    ensure!(cli.depth >= 1, "--depth must be >= 1");

    rchess_core::init();
    let mut pos = setup_position(cli.fen.as_deref(), &cli.moves, cli.chess960)?;
    let fen = pos.fen();

    let start = Instant::now();
    let (nodes, split) = if cli.divide {
        let split: Vec<_> = divide(&mut pos, cli.depth)
            .into_iter()
            .map(|(m, n)| (m.to_uci(cli.chess960), n))
            .collect();
        (split.iter().map(|(_, n)| n).sum(), split)
    } else {
        (perft(&mut pos, cli.depth), Vec::new())
    };
    let elapsed = start.elapsed();
    let nps = (nodes as f64 / elapsed.as_secs_f64().max(1e-6)) as u64;

    let report = PerftReport {
        fen,
        depth: cli.depth,
        nodes,
        time_ms: elapsed.as_millis(),
        nps,
        divide: split,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (m, n) in &report.divide {
        println!("{m}: {n}");
    }
    if !report.divide.is_empty() {
        println!();
    }
    println!("Nodes searched: {}", report.nodes);
    println!("Time: {} ms ({} nps)", report.time_ms, report.nps);
    Ok(())
}
