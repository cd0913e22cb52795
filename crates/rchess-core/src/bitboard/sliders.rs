//! 遠方駒（ビショップ・ルーク・クイーン）の利きをマジックビットボードで計算する
//!
//! 升ごとに「関係する占有マスク」（盤端を除いた利きの筋）を求め、
//! その部分集合をすべて列挙して衝突のない乗数（magic）を探す。
//! 乱数は段ごとの固定シードで初期化するため、生成結果は常に同じになる。

use std::sync::OnceLock;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::types::{File, PieceType, Rank, Square};

use super::{file_bb, file_bb_of, king_attacks, knight_attacks, rank_bb, rank_bb_of, Bitboard};

/// ルークの利きテーブルのエントリ数
const ROOK_TABLE_SIZE: usize = 0x19000;
/// ビショップの利きテーブルのエントリ数
const BISHOP_TABLE_SIZE: usize = 0x1480;

/// 段ごとのマジック探索シード
const MAGIC_SEEDS: [u64; Rank::NUM] = [728, 10316, 55013, 32803, 12281, 15100, 16645, 255];

const ROOK_DIRECTIONS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const BISHOP_DIRECTIONS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// 1升ぶんのマジック
#[derive(Clone, Copy, Default)]
struct Magic {
    mask: u64,
    magic: u64,
    shift: u32,
    offset: usize,
}

impl Magic {
    #[inline]
    fn index(&self, occupied: Bitboard) -> usize {
        ((occupied.raw() & self.mask).wrapping_mul(self.magic) >> self.shift) as usize + self.offset
    }
}

struct SliderTables {
    rook_magics: [Magic; Square::NUM],
    bishop_magics: [Magic; Square::NUM],
    rook_table: Vec<Bitboard>,
    bishop_table: Vec<Bitboard>,
    /// 空盤面での利き [PieceType][Square]
    pseudo_attacks: [[Bitboard; Square::NUM]; PieceType::NUM + 1],
    between: Box<[[Bitboard; Square::NUM]; Square::NUM]>,
    line: Box<[[Bitboard; Square::NUM]; Square::NUM]>,
}

static SLIDER_TABLES: OnceLock<SliderTables> = OnceLock::new();

#[inline]
fn tables() -> &'static SliderTables {
    SLIDER_TABLES.get_or_init(SliderTables::new)
}

/// 利きテーブルを初期化する（何度呼んでもよい）
pub fn init_attack_tables() {
    let _ = tables();
}

impl SliderTables {
    fn new() -> Self {
        let mut rook_table = vec![Bitboard::EMPTY; ROOK_TABLE_SIZE];
        let mut bishop_table = vec![Bitboard::EMPTY; BISHOP_TABLE_SIZE];
        let rook_magics = init_magics(&ROOK_DIRECTIONS, &mut rook_table);
        let bishop_magics = init_magics(&BISHOP_DIRECTIONS, &mut bishop_table);

        let mut pseudo_attacks = [[Bitboard::EMPTY; Square::NUM]; PieceType::NUM + 1];
        for sq in Square::all() {
            let rook = sliding_attack(&ROOK_DIRECTIONS, sq, Bitboard::EMPTY);
            let bishop = sliding_attack(&BISHOP_DIRECTIONS, sq, Bitboard::EMPTY);
            pseudo_attacks[PieceType::Knight.index()][sq.index()] = knight_attacks(sq);
            pseudo_attacks[PieceType::Bishop.index()][sq.index()] = bishop;
            pseudo_attacks[PieceType::Rook.index()][sq.index()] = rook;
            pseudo_attacks[PieceType::Queen.index()][sq.index()] = rook | bishop;
            pseudo_attacks[PieceType::King.index()][sq.index()] = king_attacks(sq);
        }

        let mut between = Box::new([[Bitboard::EMPTY; Square::NUM]; Square::NUM]);
        let mut line = Box::new([[Bitboard::EMPTY; Square::NUM]; Square::NUM]);
        for s1 in Square::all() {
            for (pt, dirs) in
                [(PieceType::Bishop, &BISHOP_DIRECTIONS), (PieceType::Rook, &ROOK_DIRECTIONS)]
            {
                let empty_attacks = pseudo_attacks[pt.index()][s1.index()];
                for s2 in empty_attacks {
                    let s1_bb = Bitboard::from_square(s1);
                    let s2_bb = Bitboard::from_square(s2);
                    line[s1.index()][s2.index()] = (empty_attacks
                        & sliding_attack(dirs, s2, Bitboard::EMPTY))
                        | s1_bb
                        | s2_bb;
                    between[s1.index()][s2.index()] =
                        sliding_attack(dirs, s1, s2_bb) & sliding_attack(dirs, s2, s1_bb);
                }
            }
            // 移動先自身は常に含める（一直線上にない場合も含む）
            for s2 in Square::all() {
                between[s1.index()][s2.index()] |= s2;
            }
        }

        SliderTables {
            rook_magics,
            bishop_magics,
            rook_table,
            bishop_table,
            pseudo_attacks,
            between,
            line,
        }
    }
}

/// 占有を考慮した素朴な遠方利き（テーブル構築用）
fn sliding_attack(directions: &[(i32, i32); 4], sq: Square, occupied: Bitboard) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for &(df, dr) in directions {
        let mut f = sq.file().index() as i32 + df;
        let mut r = sq.rank().index() as i32 + dr;
        while (0..8).contains(&f) && (0..8).contains(&r) {
            let to = Square::from_u8_masked((r * 8 + f) as u8);
            attacks.set(to);
            if occupied.contains(to) {
                break;
            }
            f += df;
            r += dr;
        }
    }
    attacks
}

/// ビットの少ない乱数（magic候補）
#[inline]
fn sparse_rand(rng: &mut Xoshiro256PlusPlus) -> u64 {
    rng.random::<u64>() & rng.random::<u64>() & rng.random::<u64>()
}

/// 全升のマジックを探索し、テーブルを埋める
fn init_magics(directions: &[(i32, i32); 4], table: &mut [Bitboard]) -> [Magic; Square::NUM] {
    let mut magics = [Magic::default(); Square::NUM];
    let mut occupancy = vec![Bitboard::EMPTY; 4096];
    let mut reference = vec![Bitboard::EMPTY; 4096];
    // 試行ごとにテーブルをクリアしないためのエポック
    let mut epoch = vec![0u32; 4096];
    let mut cnt = 0u32;
    let mut next_offset = 0usize;

    for sq in Square::all() {
        // 盤端は占有に関係しない（ただし自分の筋・段の端は除外しない）
        let edges = ((rank_bb(Rank::Rank1) | rank_bb(Rank::Rank8)) - rank_bb_of(sq))
            | ((file_bb(File::FileA) | file_bb(File::FileH)) - file_bb_of(sq));

        let m = &mut magics[sq.index()];
        m.mask = (sliding_attack(directions, sq, Bitboard::EMPTY) - edges).raw();
        m.shift = 64 - m.mask.count_ones();
        m.offset = next_offset;

        // carry-rippler で部分集合を全列挙
        let mut b = 0u64;
        let mut size = 0usize;
        loop {
            occupancy[size] = Bitboard::new(b);
            reference[size] = sliding_attack(directions, sq, Bitboard::new(b));
            size += 1;
            b = b.wrapping_sub(m.mask) & m.mask;
            if b == 0 {
                break;
            }
        }
        next_offset += size;
        debug_assert!(next_offset <= table.len());

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(MAGIC_SEEDS[sq.rank().index()]);
        let mut i = 0;
        while i < size {
            m.magic = 0;
            while (m.magic.wrapping_mul(m.mask) >> 56).count_ones() < 6 {
                m.magic = sparse_rand(&mut rng);
            }

            // 衝突するが利きが同じなら問題ない（建設的衝突）
            cnt += 1;
            i = 0;
            while i < size {
                let idx = m.index(occupancy[i]);
                let local = idx - m.offset;
                if epoch[local] < cnt {
                    epoch[local] = cnt;
                    table[idx] = reference[i];
                } else if table[idx] != reference[i] {
                    break;
                }
                i += 1;
            }
        }
    }

    magics
}

// =============================================================================
// 公開API
// =============================================================================

/// ビショップの利き
#[inline]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    let t = tables();
    t.bishop_table[t.bishop_magics[sq.index()].index(occupied)]
}

/// ルークの利き
#[inline]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    let t = tables();
    t.rook_table[t.rook_magics[sq.index()].index(occupied)]
}

/// クイーンの利き
#[inline]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    bishop_attacks(sq, occupied) | rook_attacks(sq, occupied)
}

/// 駒種ごとの利き（ポーン以外）
#[inline]
pub fn attacks_bb(pt: PieceType, sq: Square, occupied: Bitboard) -> Bitboard {
    match pt {
        PieceType::Bishop => bishop_attacks(sq, occupied),
        PieceType::Rook => rook_attacks(sq, occupied),
        PieceType::Queen => queen_attacks(sq, occupied),
        PieceType::Knight => knight_attacks(sq),
        PieceType::King => king_attacks(sq),
        PieceType::Pawn => {
            debug_assert!(false, "attacks_bb() does not handle pawns");
            Bitboard::EMPTY
        }
    }
}

/// 空盤面での利き（ポーン以外）
#[inline]
pub fn pseudo_attacks(pt: PieceType, sq: Square) -> Bitboard {
    tables().pseudo_attacks[pt.index()][sq.index()]
}

/// sq1とsq2の間の升（sq1を含まず、sq2を含む）
///
/// 一直線上にない場合はsq2のみ。
#[inline]
pub fn between_bb(sq1: Square, sq2: Square) -> Bitboard {
    tables().between[sq1.index()][sq2.index()]
}

/// sq1とsq2を通る直線全体（盤端から盤端まで）
///
/// 一直線上にない場合は空。
#[inline]
pub fn line_bb(sq1: Square, sq2: Square) -> Bitboard {
    tables().line[sq1.index()][sq2.index()]
}

/// 3升が一直線上にあるか
#[inline]
pub fn aligned(sq1: Square, sq2: Square, sq3: Square) -> bool {
    line_bb(sq1, sq2).contains(sq3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256StarStar;

    fn random_bitboard(rng: &mut Xoshiro256StarStar) -> Bitboard {
        // 疎な占有と密な占有の両方を試す
        if rng.random::<bool>() {
            Bitboard::new(rng.random::<u64>() & rng.random::<u64>())
        } else {
            Bitboard::new(rng.random::<u64>())
        }
    }

    #[test]
    fn test_rook_attacks_random_matches_naive() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(0x1234_5678);
        for _ in 0..32 {
            let occ = random_bitboard(&mut rng);
            for sq in Square::all() {
                let expected = sliding_attack(&ROOK_DIRECTIONS, sq, occ);
                assert_eq!(rook_attacks(sq, occ), expected, "sq={sq:?}");
            }
        }
    }

    #[test]
    fn test_bishop_attacks_random_matches_naive() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(0x0F1E_2D3C);
        for _ in 0..32 {
            let occ = random_bitboard(&mut rng);
            for sq in Square::all() {
                let expected = sliding_attack(&BISHOP_DIRECTIONS, sq, occ);
                assert_eq!(bishop_attacks(sq, occ), expected, "sq={sq:?}");
            }
        }
    }

    #[test]
    fn test_rook_attacks_corner() {
        let bb = rook_attacks(Square::A1, Bitboard::EMPTY);
        assert_eq!(bb.count(), 14);
        let blocked = rook_attacks(Square::A1, Bitboard::from_square(Square::A3));
        assert!(blocked.contains(Square::A3));
        assert!(!blocked.contains(Square::A4));
    }

    #[test]
    fn test_magics_are_deterministic() {
        // 同じシードからは同じマジックが得られる
        let mut t1 = vec![Bitboard::EMPTY; BISHOP_TABLE_SIZE];
        let mut t2 = vec![Bitboard::EMPTY; BISHOP_TABLE_SIZE];
        let m1 = init_magics(&BISHOP_DIRECTIONS, &mut t1);
        let m2 = init_magics(&BISHOP_DIRECTIONS, &mut t2);
        for sq in Square::all() {
            assert_eq!(m1[sq.index()].magic, m2[sq.index()].magic);
        }
        assert!(t1 == t2);
    }

    #[test]
    fn test_table_sizes_fit() {
        let t = tables();
        let last = &t.rook_magics[63];
        assert_eq!(last.offset + (1usize << (64 - last.shift)), ROOK_TABLE_SIZE);
        let last = &t.bishop_magics[63];
        assert_eq!(last.offset + (1usize << (64 - last.shift)), BISHOP_TABLE_SIZE);
    }

    #[test]
    fn test_between_bb() {
        let bb = between_bb(Square::A1, Square::D4);
        assert_eq!(bb, Bitboard::from_square(Square::B2) | Square::C3 | Square::D4);
        // 一直線上にない場合は移動先のみ
        assert_eq!(between_bb(Square::A1, Square::B3), Bitboard::from_square(Square::B3));
        assert_eq!(between_bb(Square::E1, Square::E2), Bitboard::from_square(Square::E2));
    }

    #[test]
    fn test_line_bb() {
        let bb = line_bb(Square::C3, Square::E5);
        assert_eq!(bb.count(), 8);
        assert!(bb.contains(Square::A1) && bb.contains(Square::H8));
        assert!(line_bb(Square::A1, Square::B3).is_empty());
        assert!(aligned(Square::A1, Square::H1, Square::D1));
        assert!(!aligned(Square::A1, Square::H1, Square::D2));
    }

    #[test]
    fn test_attacks_bb_dispatch() {
        let occ = Bitboard::from_square(Square::D6);
        assert_eq!(attacks_bb(PieceType::Queen, Square::D4, occ), queen_attacks(Square::D4, occ));
        assert_eq!(attacks_bb(PieceType::Knight, Square::D4, occ), knight_attacks(Square::D4));
        assert_eq!(pseudo_attacks(PieceType::Rook, Square::D4).count(), 14);
    }
}
