//! Search 全体の動作確認
//!
//! 詰み・ステイルメイト・合法手1つ・繰り返し・並列探索・停止・MultiPV。

use std::sync::Arc;
use std::time::{Duration, Instant};

use rchess_core::movegen::{MoveList, generate_legal};
use rchess_core::position::Position;
use rchess_core::search::{
    EngineOptions, LimitsType, Score, Search, SearchError, SearchInfo, SearchResult,
};
use rchess_core::types::{Move, Value};

fn engine(threads: usize) -> Search {
    rchess_core::init();
    Search::new(EngineOptions {
        threads,
        hash_mb: 8,
        ..EngineOptions::default()
    })
    .unwrap()
}

fn depth_limits(depth: i32) -> LimitsType {
    LimitsType {
        depth,
        ..LimitsType::default()
    }
}

fn go(search: &mut Search, fen: &str, limits: LimitsType) -> (SearchResult, Vec<SearchInfo>) {
    let pos = Position::from_fen(fen, false).unwrap();
    let mut infos = Vec::new();
    let result = search.go(&pos, limits, |info| infos.push(info.clone())).unwrap();
    (result, infos)
}

fn is_legal(fen: &str, m: Move) -> bool {
    let pos = Position::from_fen(fen, false).unwrap();
    let mut list = MoveList::new();
    generate_legal(&pos, &mut list);
    list.contains(m)
}

#[test]
fn test_finds_back_rank_mate() {
    let mut search = engine(1);
    let fen = "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1";
    let (result, infos) = go(&mut search, fen, depth_limits(6));

    assert_eq!(result.best_move.to_uci(false), "d1d8");
    assert_eq!(result.score, Value::mate_in(1));
    assert_eq!(infos.last().map(|i| i.score), Some(Score::Mate(1)));
}

#[test]
fn test_checkmated_root_has_no_move() {
    let mut search = engine(1);
    let (result, infos) = go(&mut search, "R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1", depth_limits(4));

    assert_eq!(result.best_move, Move::NONE);
    assert_eq!(result.score, -Value::MATE);
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].depth, 0);
    assert_eq!(infos[0].score, Score::Mate(0));
    assert_eq!(result.best_move.to_uci(false), "(none)");
}

#[test]
fn test_stalemate_root_is_draw() {
    let mut search = engine(1);
    let (result, _) = go(&mut search, "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", depth_limits(4));

    assert_eq!(result.best_move, Move::NONE);
    assert_eq!(result.score, Value::DRAW);
}

#[test]
fn test_single_legal_move_returns_quickly() {
    let mut search = engine(1);
    let fen = "k7/8/1K6/8/8/8/8/7R b - - 0 1";
    let pos = Position::from_fen(fen, false).unwrap();
    let mut list = MoveList::new();
    generate_legal(&pos, &mut list);
    assert_eq!(list.len(), 1);

    let limits = LimitsType {
        time: [60_000, 60_000],
        ..LimitsType::default()
    };
    let start = Instant::now();
    let (result, _) = go(&mut search, fen, limits);

    assert_eq!(result.best_move.to_uci(false), "a8b8");
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_threefold_repetition_is_draw() {
    rchess_core::init();
    let mut pos = Position::startpos();
    let cycle = ["g1f3", "g8f6", "f3g1", "f6g8"];
    for (i, s) in cycle.iter().chain(cycle.iter()).enumerate() {
        let m = pos.parse_uci_move(s).unwrap();
        let gives_check = pos.gives_check(m);
        pos.do_move(m, gives_check);
        // 2回目の出現は探索木の中でのみ引き分け
        if i == 3 {
            assert!(!pos.is_draw(0));
            assert!(pos.is_draw(10));
        }
    }
    // 3回目はルートでも引き分け
    assert!(pos.is_draw(0));
}

#[test]
fn test_upcoming_repetition_detected() {
    rchess_core::init();
    let mut pos = Position::startpos();
    for s in ["g1f3", "g8f6", "f3g1"] {
        let m = pos.parse_uci_move(s).unwrap();
        let gives_check = pos.gives_check(m);
        pos.do_move(m, gives_check);
    }
    // 黒は f6g8 で同一局面に戻れる
    assert!(pos.has_game_cycle(10));
}

#[test]
fn test_multi_pv_reports_each_line() {
    let mut search = engine(1);
    let limits = LimitsType {
        multi_pv: 3,
        ..depth_limits(5)
    };
    let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    let (result, infos) = go(&mut search, fen, limits);

    let last: Vec<_> = infos.iter().filter(|i| i.depth == 5).collect();
    assert!(last.len() >= 3);
    let mut first_moves: Vec<_> = last.iter().rev().take(3).map(|i| i.pv[0].clone()).collect();
    first_moves.sort();
    first_moves.dedup();
    assert_eq!(first_moves.len(), 3);
    assert!(is_legal(fen, result.best_move));
}

#[test]
fn test_node_limit_stops_search() {
    let mut search = engine(1);
    let limits = LimitsType {
        nodes: 20_000,
        ..LimitsType::default()
    };
    let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    let (result, _) = go(&mut search, fen, limits);

    assert!(is_legal(fen, result.best_move));
    // 時間チェックの間隔分だけ超えることがある
    assert!(result.nodes < 40_000, "nodes {}", result.nodes);
}

#[test]
fn test_parallel_search_returns_legal_move() {
    let mut search = engine(4);
    let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    let limits = LimitsType {
        movetime: 300,
        ..LimitsType::default()
    };
    let (result, infos) = go(&mut search, fen, limits);

    assert!(is_legal(fen, result.best_move));
    assert!(result.depth > 0);
    assert!(result.nodes > 0);
    assert!(!infos.is_empty());

    // スレッド数を変えても続けて探索できる
    search.set_num_threads(2).unwrap();
    let (result, _) = go(&mut search, fen, depth_limits(6));
    assert!(is_legal(fen, result.best_move));
    assert_eq!(result.depth, 6);
}

#[test]
fn test_stop_ends_infinite_search() {
    let mut search = engine(2);
    let signals = search.signals();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        signals.stop();
    });

    let limits = LimitsType {
        infinite: true,
        ..LimitsType::default()
    };
    let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    let (result, _) = go(&mut search, fen, limits);
    stopper.join().unwrap();

    assert!(is_legal(fen, result.best_move));
}

#[test]
fn test_ponderhit_switches_to_normal_search() {
    let mut search = engine(1);
    let signals = search.signals();
    let hitter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        signals.ponderhit();
    });

    let limits = LimitsType {
        ponder: true,
        time: [200, 200],
        ..LimitsType::default()
    };
    let start = Instant::now();
    let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    let (result, _) = go(&mut search, fen, limits);
    hitter.join().unwrap();

    assert!(is_legal(fen, result.best_move));
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_clear_and_resize_keep_engine_usable() {
    let mut search = engine(1);
    let fen = "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1";
    go(&mut search, fen, depth_limits(4));

    search.clear();
    search.resize_tt(4);
    assert_eq!(search.options().hash_mb, 4);

    let (result, _) = go(&mut search, fen, depth_limits(4));
    assert_eq!(result.best_move.to_uci(false), "d1d8");
}

#[test]
fn test_missing_evaluator_refuses_search() {
    let mut search = engine(1);
    assert!(search.load_evaluator("/nonexistent/rchess-eval.txt").is_err());

    let pos = Position::startpos();
    let err = search.go(&pos, depth_limits(2), |_| {}).unwrap_err();
    assert!(matches!(err, SearchError::EvaluatorUnavailable));

    search.set_evaluator(Arc::new(rchess_core::eval::MaterialEvaluator::new()));
    assert!(search.go(&pos, depth_limits(2), |_| {}).is_ok());
}

#[test]
fn test_result_serializes_to_json_fields() {
    let mut search = engine(1);
    let (result, infos) = go(&mut search, "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1", depth_limits(3));
    assert!(infos.iter().all(|i| i.to_uci_string().starts_with("info depth ")));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["best_move"], "d1d8");
    assert_eq!(json["depth"], 3);
    assert_eq!(json["score"]["kind"], "mate");
    assert_eq!(json["score"]["value"], 1);

    let info = serde_json::to_value(infos.last().unwrap()).unwrap();
    assert_eq!(info["pv"][0], "d1d8");
    assert_eq!(info["multi_pv"], 1);
}
