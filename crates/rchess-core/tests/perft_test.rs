//! perft による指し手生成の検証
//!
//! 既知の局面のノード数と一致することを確かめる。深い値は `--ignored` で回す。

use rchess_core::movegen::{divide, perft};
use rchess_core::position::Position;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const ENDGAME_EP: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const PROMOTIONS: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
const TALKCHESS: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

fn position(fen: &str) -> Position {
    rchess_core::init();
    Position::from_fen(fen, false).unwrap()
}

fn check(fen: &str, expected: &[u64]) {
    let mut pos = position(fen);
    let before = pos.fen();
    for (i, &nodes) in expected.iter().enumerate() {
        let depth = i as u32 + 1;
        assert_eq!(perft(&mut pos, depth), nodes, "{fen} depth {depth}");
    }
    assert_eq!(pos.fen(), before);
}

#[test]
fn test_perft_startpos() {
    rchess_core::init();
    let mut pos = Position::startpos();
    assert_eq!(perft(&mut pos, 1), 20);
    assert_eq!(perft(&mut pos, 2), 400);
    assert_eq!(perft(&mut pos, 3), 8902);
    assert_eq!(perft(&mut pos, 4), 197_281);
}

#[test]
fn test_perft_kiwipete() {
    check(KIWIPETE, &[48, 2039, 97_862]);
}

#[test]
fn test_perft_endgame_en_passant() {
    check(ENDGAME_EP, &[14, 191, 2812, 43_238]);
}

#[test]
fn test_perft_promotions() {
    check(PROMOTIONS, &[6, 264, 9467]);
}

#[test]
fn test_perft_talkchess() {
    check(TALKCHESS, &[44, 1486, 62_379]);
}

#[test]
fn test_perft_chess960_castling() {
    rchess_core::init();
    // 両ルークが隣接する配置でのキャスリング
    let mut pos =
        Position::from_fen("bqnb1rkr/pp3ppp/3ppn2/2p5/5P2/P2P4/NPP1P1PP/BQ1BNRKR w HFhf - 2 9", true)
            .unwrap();
    assert_eq!(perft(&mut pos, 1), 21);
    assert_eq!(perft(&mut pos, 2), 528);
    assert_eq!(perft(&mut pos, 3), 12_189);
}

#[test]
fn test_divide_sums_to_perft() {
    let mut pos = position(KIWIPETE);
    let total: u64 = divide(&mut pos, 2).iter().map(|(_, n)| n).sum();
    assert_eq!(total, 2039);
}

#[test]
#[ignore]
fn test_perft_deep() {
    rchess_core::init();
    let mut pos = Position::startpos();
    assert_eq!(perft(&mut pos, 5), 4_865_609);
    check(KIWIPETE, &[48, 2039, 97_862, 4_085_603]);
}
