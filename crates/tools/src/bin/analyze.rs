//! 局面解析ツール
//!
//! 1局面を探索して UCI 形式の info 行と bestmove を出す。`--json` なら1行1オブジェクト。

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use rchess_core::search::{Search, SearchInfo, SearchResult};
use tools::common::{EngineArgs, LimitArgs, init_logger, setup_position};

#[derive(Parser, Debug)]
#[command(name = "analyze")]
#[command(about = "Search a single position and print UCI info lines")]
struct Cli {
    /// 局面（省略時は初期局面）
    #[arg(long)]
    fen: Option<String>,

    /// 局面から指す手（UCI表記）
    #[arg(long, num_args = 1..)]
    moves: Vec<String>,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(flatten)]
    limits: LimitArgs,

    /// 評価関数パラメータファイル
    #[arg(long)]
    eval_params: Option<std::path::PathBuf>,

    /// JSON Lines で出力する
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Output<'a> {
    Info(&'a SearchInfo),
    Result(&'a SearchResult),
}

fn main() -> Result<()> {
    init_logger();
    let mut cli = Cli::parse();
    if cli.limits.is_unlimited() {
        // 無制限だと止める手段がないので深さで打ち切る
        log::warn!("no search limit given; defaulting to depth 12");
        cli.limits.depth = Some(12);
    }

    rchess_core::init();
    let pos = setup_position(cli.fen.as_deref(), &cli.moves, cli.engine.chess960)?;
    let limits = cli.limits.to_limits(&pos);

    let mut search = Search::new(cli.engine.to_options()).context("failed to start search threads")?;
    if let Some(path) = &cli.eval_params {
        search.load_evaluator(path)?;
    }

    let stdout = std::io::stdout();
    let json = cli.json;
    let chess960 = cli.engine.chess960;
    let mut write_err = None;
    let result = search.go(&pos, limits, |info| {
        let mut out = stdout.lock();
        let r = if json {
            serde_json::to_string(&Output::Info(info))
                .map_err(anyhow::Error::from)
                .and_then(|s| writeln!(out, "{s}").map_err(anyhow::Error::from))
        } else {
            writeln!(out, "{}", info.to_uci_string()).map_err(anyhow::Error::from)
        };
        if let Err(e) = r {
            write_err.get_or_insert(e);
        }
    })?;
    if let Some(e) = write_err {
        return Err(e.context("failed to write search output"));
    }

    if json {
        println!("{}", serde_json::to_string(&Output::Result(&result))?);
    } else if result.ponder_move.is_some() {
        println!(
            "bestmove {} ponder {}",
            result.best_move.to_uci(chess960),
            result.ponder_move.to_uci(chess960)
        );
    } else {
        println!("bestmove {}", result.best_move.to_uci(chess960));
    }
    Ok(())
}
