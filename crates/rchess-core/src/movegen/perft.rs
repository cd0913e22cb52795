//! perft（指し手生成の検証用ノード数計測）

use crate::position::Position;
use crate::types::Move;

use super::generator::generate_legal;
use super::movelist::MoveList;

/// 深さ`depth`までの葉の数を数える
///
/// 深さ1では合法手の数をそのまま返す（bulk counting）。
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let mut list = MoveList::new();
    generate_legal(pos, &mut list);

    if depth == 1 {
        return list.len() as u64;
    }

    let mut nodes = 0;
    for &m in list.iter() {
        let gives_check = pos.gives_check(m);
        pos.do_move(m, gives_check);
        nodes += perft(pos, depth - 1);
        pos.undo_move(m);
    }
    nodes
}

/// ルートの指し手ごとのperft
pub fn divide(pos: &mut Position, depth: u32) -> Vec<(Move, u64)> {
    let mut list = MoveList::new();
    generate_legal(pos, &mut list);

    list.iter()
        .map(|&m| {
            let gives_check = pos.gives_check(m);
            pos.do_move(m, gives_check);
            let n = if depth <= 1 { 1 } else { perft(pos, depth - 1) };
            pos.undo_move(m);
            (m, n)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perft_startpos_shallow() {
        let mut pos = Position::startpos();
        assert_eq!(perft(&mut pos, 0), 1);
        assert_eq!(perft(&mut pos, 1), 20);
        assert_eq!(perft(&mut pos, 2), 400);
        assert_eq!(perft(&mut pos, 3), 8902);
    }

    #[test]
    fn test_divide_sums_to_perft() {
        let mut pos = Position::startpos();
        let div = divide(&mut pos, 2);
        assert_eq!(div.len(), 20);
        assert!(div.iter().all(|&(_, n)| n == 20));
        assert_eq!(div.iter().map(|&(_, n)| n).sum::<u64>(), 400);
    }
}
