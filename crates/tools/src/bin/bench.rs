//! ベンチマークツール
//!
//! 固定の局面集を固定深さで探索し、総ノード数と NPS を出す。
//! 探索の変更で総ノード数が変わるかどうかの確認にも使う。

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

use rchess_core::position::Position;
use rchess_core::search::{LimitsType, Search, SearchResult};
use tools::common::{EngineArgs, init_logger};

const BENCH_FENS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 10",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 11",
    "4rrk1/pp1n3p/3q2pQ/2p1pb2/2PP4/2P3N1/P2B2PP/4RRK1 b - - 7 19",
    "rq3rk1/ppp2ppp/1bnpb3/3N2B1/3NP3/7P/PPPQ1PP1/2KR3R w - - 7 14",
    "r1bq1r1k/1pp1n1pp/1p1p4/4p2Q/4Pp2/1BNP4/PPP2PPP/3R1RK1 w - - 2 14",
    "r3r1k1/2p2ppp/p1p1bn2/8/1q2P3/2NPQN2/PPP3PP/R4RK1 b - - 2 15",
    "r1bbk1nr/pp3p1p/2n5/1N4p1/2Np1B2/8/PPP2PPP/2KR1B1R w kq - 0 13",
    "r1bq1rk1/ppp1nppp/4n3/3p3Q/3P4/1BP1B3/PP1N2PP/R4RK1 w - - 1 16",
    "4r1k1/r1q2ppp/ppp2n2/4P3/5Rb1/1N1BQ3/PPP3PP/R5K1 w - - 1 17",
    "2rqkb1r/ppp2p2/2npb1p1/1N1Nn2p/2P1PP2/8/PP2B1PP/R1BQK2R b KQ - 0 11",
    "r1bq1r1k/b1p1npp1/p2p3p/1p6/3PP3/1B2NN2/PP3PPP/R2Q1RK1 w - - 1 16",
    "3r1rk1/p5pp/bpp1pp2/8/q1PP1P2/b3P3/P2NQRPP/1R2B1K1 b - - 6 22",
    "r1q2rk1/2p1bppp/2Pp4/p6b/Q1PNp3/4B3/PP1R1PPP/2K4R w - - 2 18",
    "4k2r/1pb2ppp/1p2p3/1R1p4/3P4/2r1PN2/P4PPP/1R4K1 b - - 3 22",
    "3q2k1/pb3p1p/4pbp1/2r5/PpN2N2/1P2P2P/5PP1/Q2R2K1 b - - 4 26",
    "6k1/6p1/6Pp/ppp5/3pn2P/1P3K2/1PP2P2/8 b - - 0 1",
    "8/8/8/8/5kp1/P7/8/1K1N4 w - - 0 1",
    "8/3k4/8/8/8/4B3/4KB2/2B5 w - - 0 1",
    "7k/7P/6K1/8/3B4/8/8/8 b - - 0 1",
];

#[derive(Parser, Debug)]
#[command(name = "bench")]
#[command(about = "Fixed-depth search benchmark over a built-in position set")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    /// 探索深さ
    #[arg(short, long, default_value_t = 10)]
    depth: i32,

    /// 先頭N局面だけ使う
    #[arg(long)]
    positions: Option<usize>,

    /// 結果をJSONで出力する
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct PositionReport {
    fen: &'static str,
    time_ms: u128,
    #[serde(flatten)]
    result: SearchResult,
}

#[derive(Serialize)]
struct BenchReport {
    depth: i32,
    threads: usize,
    hash_mb: usize,
    positions: Vec<PositionReport>,
    total_nodes: u64,
    total_time_ms: u128,
    nps: u64,
}

fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    rchess_core::init();

    let options = cli.engine.to_options();
    let mut search = Search::new(options.clone()).context("failed to start search threads")?;
    let fens = &BENCH_FENS[..cli.positions.unwrap_or(BENCH_FENS.len()).min(BENCH_FENS.len())];

    let mut reports = Vec::with_capacity(fens.len());
    let total_start = Instant::now();
    for (i, &fen) in fens.iter().enumerate() {
        let pos = Position::from_fen(fen, false).with_context(|| format!("bench position {}", i + 1))?;
        let limits = LimitsType {
            depth: cli.depth,
            ..LimitsType::default()
        };

        let start = Instant::now();
        let result = search.go(&pos, limits, |_| {})?;
        let time_ms = start.elapsed().as_millis();
        info!("position {}/{}: {} nodes", i + 1, fens.len(), result.nodes);

        if !cli.json {
            eprintln!(
                "Position {:>2}/{}: bestmove {} nodes {} time {} ms",
                i + 1,
                fens.len(),
                result.best_move.to_uci(false),
                result.nodes,
                time_ms
            );
        }
        reports.push(PositionReport {
            fen,
            time_ms,
            result,
        });
    }

    let total_time_ms = total_start.elapsed().as_millis();
    let total_nodes: u64 = reports.iter().map(|r| r.result.nodes).sum();
    let nps = (total_nodes as u128 * 1000 / total_time_ms.max(1)) as u64;

    if cli.json {
        let report = BenchReport {
            depth: cli.depth,
            threads: options.threads,
            hash_mb: options.hash_mb,
            positions: reports,
            total_nodes,
            total_time_ms,
            nps,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        eprintln!();
        eprintln!("===========================");
        eprintln!("Total time (ms) : {total_time_ms}");
        eprintln!("Nodes searched  : {total_nodes}");
        eprintln!("Nodes/second    : {nps}");
    }
    Ok(())
}
