//! 指し手生成器

use crate::bitboard::{
    Bitboard, Direction, attacks_bb, between_bb, file_bb_of, king_attacks, pawn_attacks,
    pseudo_attacks, rank_bb,
};
use crate::position::Position;
use crate::types::{CastlingRights, Color, Move, MoveType, PieceType, Rank, Square};

use super::movelist::MoveList;
use super::types::{ExtMoveBuffer, GenType};

/// 手番から見たポーンの前進・斜め前の方向と升のずれ
struct PawnDirs {
    up: Direction,
    up_right: Direction,
    up_left: Direction,
    up_delta: i8,
    up_right_delta: i8,
    up_left_delta: i8,
}

const fn pawn_dirs(us: Color) -> PawnDirs {
    match us {
        Color::White => PawnDirs {
            up: Direction::North,
            up_right: Direction::NorthEast,
            up_left: Direction::NorthWest,
            up_delta: 8,
            up_right_delta: 9,
            up_left_delta: 7,
        },
        Color::Black => PawnDirs {
            up: Direction::South,
            up_right: Direction::SouthWest,
            up_left: Direction::SouthEast,
            up_delta: -8,
            up_right_delta: -9,
            up_left_delta: -7,
        },
    }
}

/// 指し手を追加
#[inline]
fn add_move(buffer: &mut ExtMoveBuffer, mv: Move) {
    buffer.push_move(mv);
}

/// 成りの指し手を追加
///
/// クイーン成りは Captures 側、それ以外の成りは駒を取るなら Captures 側・
/// 取らないなら Quiets 側で生成する。
fn make_promotions(
    buffer: &mut ExtMoveBuffer,
    gen_type: GenType,
    from: Square,
    to: Square,
    enemy: bool,
) {
    let all = matches!(gen_type, GenType::Evasions | GenType::NonEvasions);

    if gen_type == GenType::Captures || all {
        add_move(buffer, Move::new_promotion(from, to, PieceType::Queen));
    }

    if (gen_type == GenType::Captures && enemy) || (gen_type == GenType::Quiets && !enemy) || all
    {
        for pt in [PieceType::Rook, PieceType::Bishop, PieceType::Knight] {
            add_move(buffer, Move::new_promotion(from, to, pt));
        }
    }
}

// ============================================================================
// 駒種別の移動生成
// ============================================================================

/// ポーンの指し手を生成
fn generate_pawn_moves(
    pos: &Position,
    target: Bitboard,
    buffer: &mut ExtMoveBuffer,
    gen_type: GenType,
) {
    let us = pos.side_to_move();
    let them = !us;
    let dirs = pawn_dirs(us);

    let rank7 = rank_bb(Rank::Rank7.relative(us));
    let rank3 = rank_bb(Rank::Rank3.relative(us));

    let pawns = pos.pieces(us, PieceType::Pawn);
    let pawns_on7 = pawns & rank7;
    let pawns_not_on7 = pawns & !rank7;

    let enemies = match gen_type {
        GenType::Evasions => pos.checkers(),
        _ => pos.pieces_c(them),
    };
    let empty = !pos.occupied();

    // 前進と2升前進
    if gen_type != GenType::Captures {
        let mut b1 = pawns_not_on7.shift(dirs.up) & empty;
        let mut b2 = (b1 & rank3).shift(dirs.up) & empty;

        if gen_type == GenType::Evasions {
            b1 &= target;
            b2 &= target;
        }

        if gen_type == GenType::QuietChecks {
            // 直接王手になる前進か、相手キングと別の筋にある開き王手候補の前進
            let ksq = pos.king_square(them);
            let dc_candidates = pos.blockers_for_king(them) & !file_bb_of(ksq);
            b1 &= pawn_attacks(them, ksq) | dc_candidates.shift(dirs.up);
            b2 &= pawn_attacks(them, ksq) | dc_candidates.shift(dirs.up).shift(dirs.up);
        }

        for to in b1 {
            add_move(buffer, Move::new(to.offset(-dirs.up_delta), to));
        }
        for to in b2 {
            add_move(buffer, Move::new(to.offset(-2 * dirs.up_delta), to));
        }
    }

    // 成り
    if pawns_on7.is_not_empty() {
        let b1 = pawns_on7.shift(dirs.up_right) & enemies;
        let b2 = pawns_on7.shift(dirs.up_left) & enemies;
        let mut b3 = pawns_on7.shift(dirs.up) & empty;

        if gen_type == GenType::Evasions {
            b3 &= target;
        }

        for to in b1 {
            make_promotions(buffer, gen_type, to.offset(-dirs.up_right_delta), to, true);
        }
        for to in b2 {
            make_promotions(buffer, gen_type, to.offset(-dirs.up_left_delta), to, true);
        }
        for to in b3 {
            make_promotions(buffer, gen_type, to.offset(-dirs.up_delta), to, false);
        }
    }

    // 成らない駒取りとアンパッサン
    if matches!(gen_type, GenType::Captures | GenType::Evasions | GenType::NonEvasions) {
        let b1 = pawns_not_on7.shift(dirs.up_right) & enemies;
        let b2 = pawns_not_on7.shift(dirs.up_left) & enemies;

        for to in b1 {
            add_move(buffer, Move::new(to.offset(-dirs.up_right_delta), to));
        }
        for to in b2 {
            add_move(buffer, Move::new(to.offset(-dirs.up_left_delta), to));
        }

        if let Some(ep) = pos.ep_square() {
            debug_assert!(ep.relative_rank(us) == Rank::Rank6);

            // アンパッサンでは開き王手を解消できない
            if gen_type == GenType::Evasions && target.contains(ep.offset(dirs.up_delta)) {
                return;
            }

            for from in pawns_not_on7 & pawn_attacks(them, ep) {
                add_move(buffer, Move::new_special(MoveType::EnPassant, from, ep, PieceType::Knight));
            }
        }
    }
}

/// ポーンとキング以外の駒の指し手を生成
fn generate_piece_moves(
    pos: &Position,
    pt: PieceType,
    target: Bitboard,
    buffer: &mut ExtMoveBuffer,
    checks: bool,
) {
    let us = pos.side_to_move();
    let occupied = pos.occupied();

    for from in pos.pieces(us, pt) {
        let mut b = attacks_bb(pt, from, occupied) & target;

        // 開き王手候補はどこへ動いても王手になりうるので絞らない
        if checks && (pt == PieceType::Queen || !pos.blockers_for_king(!us).contains(from)) {
            b &= pos.check_squares(pt);
        }

        for to in b {
            add_move(buffer, Move::new(from, to));
        }
    }
}

/// キャスリングの指し手を生成
fn generate_castling(pos: &Position, buffer: &mut ExtMoveBuffer) {
    let us = pos.side_to_move();
    let ksq = pos.king_square(us);

    for king_side in [true, false] {
        let cr = CastlingRights::single(us, king_side);
        if pos.can_castle(cr) && !pos.castling_impeded(cr) {
            add_move(
                buffer,
                Move::new_special(
                    MoveType::Castling,
                    ksq,
                    pos.castling_rook_square(cr),
                    PieceType::Knight,
                ),
            );
        }
    }
}

/// 指定種類の疑似合法手をすべて生成
fn generate_all(pos: &Position, gen_type: GenType, buffer: &mut ExtMoveBuffer) {
    debug_assert!(gen_type != GenType::Legal);

    let us = pos.side_to_move();
    let ksq = pos.king_square(us);
    let checks = gen_type == GenType::QuietChecks;

    // 両王手ではキングしか動けない
    if gen_type != GenType::Evasions || !pos.checkers().more_than_one() {
        let target = match gen_type {
            GenType::Evasions => between_bb(ksq, pos.checkers().lsb()),
            GenType::NonEvasions => !pos.pieces_c(us),
            GenType::Captures => pos.pieces_c(!us),
            _ => !pos.occupied(),
        };

        generate_pawn_moves(pos, target, buffer, gen_type);
        for pt in [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen] {
            generate_piece_moves(pos, pt, target, buffer, checks);
        }
    }

    if !checks || pos.blockers_for_king(!us).contains(ksq) {
        let target = match gen_type {
            GenType::Evasions => !pos.pieces_c(us),
            GenType::NonEvasions => !pos.pieces_c(us),
            GenType::Captures => pos.pieces_c(!us),
            _ => !pos.occupied(),
        };
        let mut b = king_attacks(ksq) & target;
        if checks {
            b &= !pseudo_attacks(PieceType::Queen, pos.king_square(!us));
        }

        for to in b {
            add_move(buffer, Move::new(ksq, to));
        }

        if matches!(gen_type, GenType::Quiets | GenType::NonEvasions)
            && pos.can_castle(CastlingRights::of_color(us))
        {
            generate_castling(pos, buffer);
        }
    }
}

/// 指し手を生成してバッファの末尾に追加する
///
/// Evasions は王手されている局面、Captures/Quiets/QuietChecks/NonEvasions は
/// 王手されていない局面でのみ使う。Legal は局面を問わず合法手だけを返す。
/// 戻り値は生成後のバッファの長さ。
pub fn generate_with_type(pos: &Position, gen_type: GenType, buffer: &mut ExtMoveBuffer) -> usize {
    match gen_type {
        GenType::Legal => {
            let start = buffer.len();
            let kind = if pos.in_check() {
                GenType::Evasions
            } else {
                GenType::NonEvasions
            };
            generate_all(pos, kind, buffer);

            // pinされた駒・キング・アンパッサンの手だけ合法性を調べればよい
            let us = pos.side_to_move();
            let pinned = pos.blockers_for_king(us) & pos.pieces_c(us);
            let ksq = pos.king_square(us);

            let mut i = start;
            while i < buffer.len() {
                let m = buffer[i].mv;
                let needs_check = pinned.contains(m.from())
                    || m.from() == ksq
                    || m.move_type() == MoveType::EnPassant;
                if needs_check && !pos.legal(m) {
                    buffer.swap_remove(i);
                } else {
                    i += 1;
                }
            }
        }
        GenType::Evasions => {
            debug_assert!(pos.in_check());
            generate_all(pos, gen_type, buffer);
        }
        _ => {
            debug_assert!(!pos.in_check());
            generate_all(pos, gen_type, buffer);
        }
    }
    buffer.len()
}

/// 合法手を生成
pub fn generate_legal(pos: &Position, list: &mut MoveList) {
    let mut buffer = ExtMoveBuffer::new();
    generate_with_type(pos, GenType::Legal, &mut buffer);

    for ext in buffer.iter() {
        list.push(ext.mv);
    }
}

/// 合法手が1つでもあるか
pub fn has_legal_moves(pos: &Position) -> bool {
    let mut buffer = ExtMoveBuffer::new();
    let gen_type = if pos.in_check() {
        GenType::Evasions
    } else {
        GenType::NonEvasions
    };
    generate_with_type(pos, gen_type, &mut buffer);
    buffer.iter().any(|ext| pos.legal(ext.mv))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legal_moves(fen: &str) -> MoveList {
        let pos = Position::from_fen(fen, false).unwrap();
        let mut list = MoveList::new();
        generate_legal(&pos, &mut list);
        list
    }

    fn uci_moves(list: &MoveList) -> Vec<String> {
        let mut v: Vec<String> = list.iter().map(|m| m.to_uci(false)).collect();
        v.sort();
        v
    }

    #[test]
    fn test_generate_legal_startpos() {
        let pos = Position::startpos();
        let mut list = MoveList::new();
        generate_legal(&pos, &mut list);

        // 初期局面の合法手は20手
        assert_eq!(list.len(), 20, "Generated {} legal moves", list.len());
        assert!(list.contains(Move::new(Square::G1, Square::F3)));
        assert!(list.contains(Move::new(Square::E2, Square::E4)));
    }

    #[test]
    fn test_captures_and_quiets_partition_non_evasions() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            false,
        )
        .unwrap();

        let mut all = ExtMoveBuffer::new();
        generate_with_type(&pos, GenType::NonEvasions, &mut all);

        let mut captures = ExtMoveBuffer::new();
        generate_with_type(&pos, GenType::Captures, &mut captures);
        let mut quiets = ExtMoveBuffer::new();
        generate_with_type(&pos, GenType::Quiets, &mut quiets);

        assert_eq!(all.len(), captures.len() + quiets.len());
        for ext in captures.iter() {
            assert!(pos.capture_stage(ext.mv), "{}", ext.mv);
            assert!(!quiets.contains(ext.mv));
        }
        for ext in quiets.iter() {
            assert!(!pos.capture_stage(ext.mv), "{}", ext.mv);
        }
    }

    #[test]
    fn test_promotion_split() {
        // b7のポーンは b8 への成りと a8 の駒取り成りができる
        let pos = Position::from_fen("r3k3/1P6/8/8/8/8/8/4K3 w - - 0 1", false).unwrap();

        let mut captures = ExtMoveBuffer::new();
        generate_with_type(&pos, GenType::Captures, &mut captures);
        let mut quiets = ExtMoveBuffer::new();
        generate_with_type(&pos, GenType::Quiets, &mut quiets);

        // 駒取り成り4種 + クイーンへの不取り成り
        let caps: Vec<_> = captures.iter().map(|e| e.mv.to_uci(false)).collect();
        assert_eq!(caps.len(), 5);
        assert!(caps.contains(&"b7b8q".to_string()));
        assert!(caps.contains(&"b7a8n".to_string()));

        assert!(quiets.contains(Move::new_promotion(Square::B7, Square::B8, PieceType::Rook)));
        assert!(!quiets.contains(Move::new_promotion(Square::B7, Square::B8, PieceType::Queen)));
    }

    #[test]
    fn test_evasions_double_check_only_king() {
        // ナイトとルークによる両王手
        let list = legal_moves("4k3/8/3N4/8/8/8/8/4RK2 b - - 0 1");
        for m in list.iter() {
            assert_eq!(m.from(), Square::E8);
        }
        // f7 はナイト、e7 はルークの利きがある
        assert_eq!(uci_moves(&list), vec!["e8d7", "e8d8", "e8f8"]);
    }

    #[test]
    fn test_evasions_block_and_capture() {
        // a1 のルークによる王手。ビショップの合い駒かキングが逃げる
        let list = legal_moves("4k3/8/8/8/8/8/3B4/r3K3 w - - 0 1");
        assert_eq!(uci_moves(&list), vec!["d2c1", "e1e2", "e1f2"]);

        // ナイトによる王手は合い駒できない
        let list = legal_moves("r3k3/8/8/8/8/8/2n5/4K2B w - - 0 1");
        assert!(!list.is_empty());
        assert!(list.iter().all(|m| m.from() == Square::E1));
    }

    #[test]
    fn test_en_passant_legality() {
        // e5xd6 はアンパッサン。横の遠方駒の利きでpinされていない
        let list = legal_moves("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1");
        assert!(list.contains(Move::new_special(
            MoveType::EnPassant,
            Square::E5,
            Square::D6,
            PieceType::Knight
        )));

        // 2枚のポーンが消えるとキングが横から取られる
        let list = legal_moves("8/8/8/K2pP2r/8/8/8/4k3 w - d6 0 1");
        assert!(!list.iter().any(|m| m.move_type() == MoveType::EnPassant));
    }

    #[test]
    fn test_castling_generation() {
        let list = legal_moves("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let castles: Vec<_> = list
            .iter()
            .filter(|m| m.move_type() == MoveType::Castling)
            .map(|m| m.to_uci(false))
            .collect();
        assert_eq!(castles.len(), 2);
        assert!(castles.contains(&"e1g1".to_string()));
        assert!(castles.contains(&"e1c1".to_string()));

        // f1 に利きがあるとキングサイドは不可
        let list = legal_moves("r3kr2/8/8/8/8/8/8/R3K2R w KQq - 0 1");
        assert!(
            !list
                .iter()
                .any(|m| m.move_type() == MoveType::Castling && m.to() == Square::H1)
        );
    }

    #[test]
    fn test_quiet_checks() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K1N1 w - - 0 1", false).unwrap();
        let mut buffer = ExtMoveBuffer::new();
        generate_with_type(&pos, GenType::QuietChecks, &mut buffer);

        assert!(!buffer.is_empty());
        for ext in buffer.iter() {
            assert!(pos.gives_check(ext.mv), "{}", ext.mv);
            assert!(!pos.is_capture(ext.mv));
        }
        assert!(buffer.contains(Move::new(Square::A1, Square::A8)));
    }

    #[test]
    fn test_has_legal_moves() {
        assert!(has_legal_moves(&Position::startpos()));
        // ステイルメイト
        let pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", false).unwrap();
        assert!(!has_legal_moves(&pos));
        // チェックメイト
        let pos = Position::from_fen("6rk/5Npp/8/8/8/8/8/6K1 b - - 0 1", false).unwrap();
        assert!(pos.in_check());
        assert!(!has_legal_moves(&pos));
    }
}
