//! 局面（Position）

use crate::bitboard::{
    Bitboard, aligned, attacks_bb, between_bb, bishop_attacks, king_attacks, knight_attacks,
    pawn_attacks, rook_attacks,
};
use crate::eval::Accumulator;
use crate::types::{
    CastlingRights, Color, Move, MoveType, Piece, PieceType, Rank, Square, piece_value_mg,
};

use super::state::{ChangedPiece, StateInfo, StateStack};
use super::zobrist::{zobrist_castling, zobrist_enpassant, zobrist_no_pawns, zobrist_psq, zobrist_side};

/// チェスの局面
///
/// StateInfo は [`StateStack`] 上に置かれ、局面は現在の要素を指すカーソルだけを持つ。
#[derive(Clone)]
pub struct Position {
    // === 盤面 ===
    /// 各升の駒 [Square]
    pub(super) board: [Piece; Square::NUM],
    /// 駒種別Bitboard [PieceType]（添字0は全駒）
    pub(super) by_type: [Bitboard; PieceType::NUM + 1],
    /// 色別Bitboard
    pub(super) by_color: [Bitboard; Color::NUM],
    /// 駒の枚数 [Piece]
    pub(super) piece_count: [u8; Piece::NUM],

    // === キャスリング ===
    /// その升の駒が動く（取られる）と失われるキャスリング権 [Square]
    pub(super) castling_rights_mask: [CastlingRights; Square::NUM],
    /// キャスリングに使うルークの升 [CastlingRights.single_index()]
    pub(super) castling_rook_square: [Square; 4],
    /// キャスリングで空いていなければならない升 [CastlingRights.single_index()]
    pub(super) castling_path: [Bitboard; 4],

    // === 状態 ===
    /// StateInfoのアリーナ
    pub(super) states: StateStack,
    /// 現在のStateInfoのインデックス
    pub(super) st: usize,
    /// 初期局面からの手数（半手）
    pub(super) game_ply: i32,
    /// 手番
    pub(super) side_to_move: Color,
    /// チェス960か
    pub(super) chess960: bool,
}

impl Position {
    // ========== 局面設定 ==========

    /// 空の局面を生成
    pub fn new() -> Self {
        Self::with_state_stack(StateStack::new())
    }

    /// 呼び出し側が確保した状態スタックを使う空の局面を生成
    pub fn with_state_stack(mut states: StateStack) -> Self {
        states.reset();
        Position {
            board: [Piece::NONE; Square::NUM],
            by_type: [Bitboard::EMPTY; PieceType::NUM + 1],
            by_color: [Bitboard::EMPTY; Color::NUM],
            piece_count: [0; Piece::NUM],
            castling_rights_mask: [CastlingRights::NONE; Square::NUM],
            castling_rook_square: [Square::A1; 4],
            castling_path: [Bitboard::EMPTY; 4],
            states,
            st: 0,
            game_ply: 0,
            side_to_move: Color::White,
            chess960: false,
        }
    }

    /// 状態スタックを取り出す
    pub fn into_state_stack(self) -> StateStack {
        self.states
    }

    /// 盤面だけを空にする（状態スタックの容量は維持）
    pub(super) fn clear(&mut self) {
        let states = std::mem::take(&mut self.states);
        *self = Position::with_state_stack(states);
    }

    /// 現在の局面をルートとし、それより後ろのStateInfoを切り捨てる
    ///
    /// 探索開始時に呼ぶ。繰り返し判定のため過去の履歴は残る。
    pub fn truncate_states(&mut self) {
        self.states.truncate_after(self.st);
    }

    // ========== 盤面アクセス ==========

    /// 指定升の駒を取得
    #[inline]
    pub fn piece_on(&self, sq: Square) -> Piece {
        self.board[sq.index()]
    }

    /// 指定升が空か
    #[inline]
    pub fn empty(&self, sq: Square) -> bool {
        self.piece_on(sq).is_none()
    }

    /// 全駒のBitboard（占有）
    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.by_type[0]
    }

    /// 指定駒種のBitboard
    #[inline]
    pub fn pieces_pt(&self, pt: PieceType) -> Bitboard {
        self.by_type[pt.index()]
    }

    /// 2駒種のBitboard
    #[inline]
    pub fn pieces_pt2(&self, pt1: PieceType, pt2: PieceType) -> Bitboard {
        self.by_type[pt1.index()] | self.by_type[pt2.index()]
    }

    /// 指定手番の駒のBitboard
    #[inline]
    pub fn pieces_c(&self, c: Color) -> Bitboard {
        self.by_color[c.index()]
    }

    /// 指定手番・駒種のBitboard
    #[inline]
    pub fn pieces(&self, c: Color, pt: PieceType) -> Bitboard {
        self.by_color[c.index()] & self.by_type[pt.index()]
    }

    /// 指定手番・2駒種のBitboard
    #[inline]
    pub fn pieces_c_pt2(&self, c: Color, pt1: PieceType, pt2: PieceType) -> Bitboard {
        self.by_color[c.index()] & self.pieces_pt2(pt1, pt2)
    }

    /// 駒の枚数
    #[inline]
    pub fn count(&self, pc: Piece) -> i32 {
        self.piece_count[pc.index()] as i32
    }

    /// キングの位置を取得
    #[inline]
    pub fn king_square(&self, c: Color) -> Square {
        self.pieces(c, PieceType::King).lsb()
    }

    /// 手番を取得
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// 手数を取得
    #[inline]
    pub fn game_ply(&self) -> i32 {
        self.game_ply
    }

    /// チェス960か
    #[inline]
    pub fn is_chess960(&self) -> bool {
        self.chess960
    }

    /// 指し手で動く駒
    #[inline]
    pub fn moved_piece(&self, m: Move) -> Piece {
        self.piece_on(m.from())
    }

    // ========== 状態アクセス ==========

    /// 現在の状態を取得
    #[inline]
    pub fn state(&self) -> &StateInfo {
        self.states.get(self.st)
    }

    /// 現在の状態を可変で取得（局面設定用）
    #[inline]
    pub(super) fn state_mut(&mut self) -> &mut StateInfo {
        self.states.get_mut(self.st)
    }

    /// n手前の状態を取得（存在しない場合はNone）
    #[inline]
    pub fn state_back(&self, n: usize) -> Option<&StateInfo> {
        self.st.checked_sub(n).map(|idx| self.states.get(idx))
    }

    /// 局面のハッシュキー
    #[inline]
    pub fn key(&self) -> u64 {
        self.state().key
    }

    /// ポーンのハッシュキー
    #[inline]
    pub fn pawn_key(&self) -> u64 {
        self.state().pawn_key
    }

    /// 50手ルール用カウンタ
    #[inline]
    pub fn rule50_count(&self) -> i32 {
        self.state().rule50
    }

    /// アンパッサンで取れる升
    #[inline]
    pub fn ep_square(&self) -> Option<Square> {
        self.state().ep_square
    }

    /// キャスリング権
    #[inline]
    pub fn castling_rights(&self) -> CastlingRights {
        self.state().castling_rights
    }

    /// 指定のキャスリング権があるか
    #[inline]
    pub fn can_castle(&self, cr: CastlingRights) -> bool {
        self.state().castling_rights.contains(cr)
    }

    /// キャスリング経路に駒があるか
    #[inline]
    pub fn castling_impeded(&self, cr: CastlingRights) -> bool {
        (self.occupied() & self.castling_path[cr.single_index()]).is_not_empty()
    }

    /// キャスリングに使うルークの升
    #[inline]
    pub fn castling_rook_square(&self, cr: CastlingRights) -> Square {
        self.castling_rook_square[cr.single_index()]
    }

    /// 王手している駒
    #[inline]
    pub fn checkers(&self) -> Bitboard {
        self.state().checkers
    }

    /// 王手されているか
    #[inline]
    pub fn in_check(&self) -> bool {
        self.state().checkers.is_not_empty()
    }

    /// 指定手番のキングへのpinを作っている駒
    #[inline]
    pub fn blockers_for_king(&self, c: Color) -> Bitboard {
        self.state().blockers_for_king[c.index()]
    }

    /// 指定手番の駒のうち相手キングをpinしている駒
    #[inline]
    pub fn pinners(&self, c: Color) -> Bitboard {
        self.state().pinners[c.index()]
    }

    /// 指定駒種で王手となる升
    #[inline]
    pub fn check_squares(&self, pt: PieceType) -> Bitboard {
        self.state().check_squares[pt.index()]
    }

    /// 直前の指し手で取られた駒
    #[inline]
    pub fn captured_piece(&self) -> Piece {
        self.state().captured_piece
    }

    /// ポーン以外の駒の価値の合計
    #[inline]
    pub fn non_pawn_material(&self, c: Color) -> i32 {
        self.state().non_pawn_material[c.index()]
    }

    /// 両陣営のポーン以外の駒の価値の合計
    #[inline]
    pub fn non_pawn_material_total(&self) -> i32 {
        self.non_pawn_material(Color::White) + self.non_pawn_material(Color::Black)
    }

    /// 評価関数用の差分キャッシュ
    #[inline]
    pub fn accumulator(&self) -> &Accumulator {
        &self.state().accumulator
    }

    // ========== 利き計算 ==========

    /// 指定升に利いている駒（全手番）
    #[inline]
    pub fn attackers_to(&self, sq: Square) -> Bitboard {
        self.attackers_to_occ(sq, self.occupied())
    }

    /// 指定升に利いている駒（占有指定）
    pub fn attackers_to_occ(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        (pawn_attacks(Color::Black, sq) & self.pieces(Color::White, PieceType::Pawn))
            | (pawn_attacks(Color::White, sq) & self.pieces(Color::Black, PieceType::Pawn))
            | (knight_attacks(sq) & self.pieces_pt(PieceType::Knight))
            | (rook_attacks(sq, occupied) & self.pieces_pt2(PieceType::Rook, PieceType::Queen))
            | (bishop_attacks(sq, occupied)
                & self.pieces_pt2(PieceType::Bishop, PieceType::Queen))
            | (king_attacks(sq) & self.pieces_pt(PieceType::King))
    }

    /// sliders のうち sq（king_color のキング）への直線上にいる駒と、その間に1枚だけある駒を求める
    ///
    /// 戻り値は (blockers, pinners)。pinners は blocker が king_color の駒であるものに限る。
    pub(super) fn slider_blockers(
        &self,
        sliders: Bitboard,
        sq: Square,
        king_color: Color,
    ) -> (Bitboard, Bitboard) {
        let mut blockers = Bitboard::EMPTY;
        let mut pinners = Bitboard::EMPTY;

        // キングから見て遮るものが無ければ利く位置にいる遠方駒
        let snipers = ((attacks_bb(PieceType::Rook, sq, Bitboard::EMPTY)
            & self.pieces_pt2(PieceType::Queen, PieceType::Rook))
            | (attacks_bb(PieceType::Bishop, sq, Bitboard::EMPTY)
                & self.pieces_pt2(PieceType::Queen, PieceType::Bishop)))
            & sliders;
        let occupancy = self.occupied() ^ snipers;

        for sniper in snipers {
            let b = between_bb(sq, sniper) & occupancy;
            if b.is_not_empty() && !b.more_than_one() {
                blockers |= b;
                if (b & self.pieces_c(king_color)).is_not_empty() {
                    pinners |= sniper;
                }
            }
        }
        (blockers, pinners)
    }

    /// pin情報と王手升を計算して st に書き込む
    pub(super) fn set_check_info(&self, st: &mut StateInfo) {
        for c in Color::ALL {
            let (blockers, pinners) =
                self.slider_blockers(self.pieces_c(!c), self.king_square(c), c);
            st.blockers_for_king[c.index()] = blockers;
            st.pinners[(!c).index()] = pinners;
        }

        let ksq = self.king_square(!self.side_to_move);
        let occ = self.occupied();
        st.check_squares[PieceType::Pawn.index()] = pawn_attacks(!self.side_to_move, ksq);
        st.check_squares[PieceType::Knight.index()] = knight_attacks(ksq);
        st.check_squares[PieceType::Bishop.index()] = bishop_attacks(ksq, occ);
        st.check_squares[PieceType::Rook.index()] = rook_attacks(ksq, occ);
        st.check_squares[PieceType::Queen.index()] = st.check_squares
            [PieceType::Bishop.index()]
            | st.check_squares[PieceType::Rook.index()];
        st.check_squares[PieceType::King.index()] = Bitboard::EMPTY;
    }

    /// 盤面からハッシュキーを計算し直す
    pub fn compute_key(&self) -> u64 {
        let mut key = 0;
        for sq in self.occupied() {
            key ^= zobrist_psq(self.piece_on(sq), sq);
        }
        if let Some(ep) = self.state().ep_square {
            key ^= zobrist_enpassant(ep.file());
        }
        if self.side_to_move == Color::Black {
            key ^= zobrist_side();
        }
        key ^ zobrist_castling(self.state().castling_rights)
    }

    /// 盤面からポーンのハッシュキーを計算し直す
    pub fn compute_pawn_key(&self) -> u64 {
        let mut key = zobrist_no_pawns();
        for sq in self.pieces_pt(PieceType::Pawn) {
            key ^= zobrist_psq(self.piece_on(sq), sq);
        }
        key
    }

    /// 盤面から現在のStateInfoを初期化する
    pub(super) fn set_state(&mut self) {
        let mut st = *self.state();
        st.key = self.compute_key();
        st.pawn_key = self.compute_pawn_key();
        st.non_pawn_material = [0; Color::NUM];
        for sq in self.occupied() {
            let pc = self.piece_on(sq);
            if !matches!(pc.piece_type(), PieceType::Pawn | PieceType::King) {
                st.non_pawn_material[pc.color().index()] += piece_value_mg(pc.piece_type());
            }
        }
        st.checkers = self.attackers_to(self.king_square(self.side_to_move))
            & self.pieces_c(!self.side_to_move);
        self.set_check_info(&mut st);
        st.accumulator = Accumulator::refresh(self);
        *self.states.get_mut(self.st) = st;
    }

    // ========== 駒の配置 ==========

    /// 駒を置く
    #[inline]
    pub(super) fn put_piece(&mut self, pc: Piece, sq: Square) {
        self.board[sq.index()] = pc;
        self.by_type[0] |= sq;
        self.by_type[pc.piece_type().index()] |= sq;
        self.by_color[pc.color().index()] |= sq;
        self.piece_count[pc.index()] += 1;
    }

    /// 駒を取り除く
    #[inline]
    fn remove_piece(&mut self, sq: Square) {
        let pc = self.board[sq.index()];
        debug_assert!(pc.is_some());
        self.by_type[0] ^= sq;
        self.by_type[pc.piece_type().index()] ^= sq;
        self.by_color[pc.color().index()] ^= sq;
        self.board[sq.index()] = Piece::NONE;
        self.piece_count[pc.index()] -= 1;
    }

    /// 駒を動かす
    #[inline]
    fn move_piece(&mut self, from: Square, to: Square) {
        let pc = self.board[from.index()];
        let from_to = Bitboard::from_square(from) | to;
        self.by_type[0] ^= from_to;
        self.by_type[pc.piece_type().index()] ^= from_to;
        self.by_color[pc.color().index()] ^= from_to;
        self.board[from.index()] = Piece::NONE;
        self.board[to.index()] = pc;
    }

    /// キャスリングのキングとルークの移動（do_move/undo_move共用）
    ///
    /// 指し手は「キングで自分のルークを取る」形で表現されているので、実際の移動先を返す。
    /// 戻り値は (キングの移動先, ルークの移動元, ルークの移動先)。
    fn do_castling(
        &mut self,
        us: Color,
        from: Square,
        to: Square,
        apply: bool,
        st: Option<&mut StateInfo>,
    ) -> (Square, Square, Square) {
        let king_side = to > from;
        let rfrom = to;
        let rto = (if king_side { Square::F1 } else { Square::D1 }).relative(us);
        let kto = (if king_side { Square::G1 } else { Square::C1 }).relative(us);

        if let Some(st) = st {
            st.dirty_piece.push(ChangedPiece {
                piece: Piece::new(us, PieceType::King),
                from: Some(from),
                to: Some(kto),
            });
            st.dirty_piece.push(ChangedPiece {
                piece: Piece::new(us, PieceType::Rook),
                from: Some(rfrom),
                to: Some(rto),
            });
        }

        // チェス960では移動元と移動先が重なることがあるので一度両方取り除く
        let (k_remove, r_remove, k_put, r_put) = if apply {
            (from, rfrom, kto, rto)
        } else {
            (kto, rto, from, rfrom)
        };
        self.remove_piece(k_remove);
        self.remove_piece(r_remove);
        self.put_piece(Piece::new(us, PieceType::King), k_put);
        self.put_piece(Piece::new(us, PieceType::Rook), r_put);

        (kto, rfrom, rto)
    }

    // ========== 指し手実行 ==========

    /// 指し手を実行
    ///
    /// gives_check には [`Position::gives_check`] の結果を渡す。
    pub fn do_move(&mut self, m: Move, gives_check: bool) {
        debug_assert!(m.is_ok());

        let mut st = self.state().partial_clone();
        let mut k = st.key ^ zobrist_side();

        self.game_ply += 1;
        st.rule50 += 1;
        st.plies_from_null += 1;

        let us = self.side_to_move;
        let them = !us;
        let from = m.from();
        let mut to = m.to();
        let pc = self.piece_on(from);
        let mut captured = if m.move_type() == MoveType::EnPassant {
            Piece::new(them, PieceType::Pawn)
        } else {
            self.piece_on(to)
        };

        debug_assert!(pc.is_some() && pc.color() == us);

        if m.move_type() == MoveType::Castling {
            debug_assert!(pc.piece_type() == PieceType::King);
            debug_assert!(captured == Piece::new(us, PieceType::Rook));

            let (kto, rfrom, rto) = self.do_castling(us, from, to, true, Some(&mut st));
            to = kto;
            k ^= zobrist_psq(captured, rfrom) ^ zobrist_psq(captured, rto);
            captured = Piece::NONE;
        }

        if captured.is_some() {
            let mut capsq = to;
            if captured.piece_type() == PieceType::Pawn {
                if m.move_type() == MoveType::EnPassant {
                    capsq = to.offset(-us.pawn_push());
                    debug_assert!(self.piece_on(capsq) == captured);
                }
                st.pawn_key ^= zobrist_psq(captured, capsq);
            } else {
                st.non_pawn_material[them.index()] -= piece_value_mg(captured.piece_type());
            }

            st.dirty_piece.push(ChangedPiece {
                piece: captured,
                from: Some(capsq),
                to: None,
            });

            self.remove_piece(capsq);
            k ^= zobrist_psq(captured, capsq);
            st.rule50 = 0;
        }

        k ^= zobrist_psq(pc, from) ^ zobrist_psq(pc, to);

        if let Some(ep) = st.ep_square.take() {
            k ^= zobrist_enpassant(ep.file());
        }

        // キャスリング権の更新
        let lost = self.castling_rights_mask[from.index()] | self.castling_rights_mask[to.index()];
        if !st.castling_rights.is_empty() && !lost.is_empty() {
            k ^= zobrist_castling(st.castling_rights);
            st.castling_rights &= !lost;
            k ^= zobrist_castling(st.castling_rights);
        }

        if m.move_type() != MoveType::Castling {
            st.dirty_piece.push(ChangedPiece {
                piece: pc,
                from: Some(from),
                to: Some(to),
            });
            self.move_piece(from, to);
        }

        if pc.piece_type() == PieceType::Pawn {
            let push = us.pawn_push();
            if (to.raw() ^ from.raw()) == 16 {
                // 相手のポーンが実際に取れる場合だけアンパッサン升を立てる
                let ep = to.offset(-push);
                if (pawn_attacks(us, ep) & self.pieces(them, PieceType::Pawn)).is_not_empty() {
                    st.ep_square = Some(ep);
                    k ^= zobrist_enpassant(ep.file());
                }
            } else if m.move_type() == MoveType::Promotion {
                let promotion = Piece::new(us, m.promotion_type());
                debug_assert!(to.relative_rank(us) == Rank::Rank8);

                self.remove_piece(to);
                self.put_piece(promotion, to);

                // 動いたポーンは盤上から消え、成った駒が現れる
                let moved = st.dirty_piece.pieces().len() - 1;
                st.dirty_piece.set_to(moved, None);
                st.dirty_piece.push(ChangedPiece {
                    piece: promotion,
                    from: None,
                    to: Some(to),
                });

                k ^= zobrist_psq(pc, to) ^ zobrist_psq(promotion, to);
                st.pawn_key ^= zobrist_psq(pc, to);
                st.non_pawn_material[us.index()] += piece_value_mg(promotion.piece_type());
            }

            st.pawn_key ^= zobrist_psq(pc, from) ^ zobrist_psq(pc, to);
            st.rule50 = 0;
        }

        st.captured_piece = captured;
        st.key = k;
        st.accumulator.apply(&st.dirty_piece);

        st.checkers = if gives_check {
            self.attackers_to(self.king_square(them)) & self.pieces_c(us)
        } else {
            Bitboard::EMPTY
        };

        self.side_to_move = them;
        self.set_check_info(&mut st);

        // 同一局面の検出（4手前から2手おきに遡る）
        st.repetition = 0;
        let end = st.rule50.min(st.plies_from_null);
        let mut i = 4;
        while i <= end {
            let prev = self.states.get(self.st + 1 - i as usize);
            if prev.key == st.key {
                st.repetition = if prev.repetition != 0 { -i } else { i };
                break;
            }
            i += 2;
        }

        self.st += 1;
        self.states.store(self.st, st);

        debug_assert!(self.is_ok());
    }

    /// 指し手を戻す
    pub fn undo_move(&mut self, m: Move) {
        debug_assert!(m.is_ok());

        self.side_to_move = !self.side_to_move;
        let us = self.side_to_move;
        let from = m.from();
        let to = m.to();

        if m.move_type() == MoveType::Promotion {
            debug_assert!(self.piece_on(to).piece_type() == m.promotion_type());
            self.remove_piece(to);
            self.put_piece(Piece::new(us, PieceType::Pawn), to);
        }

        if m.move_type() == MoveType::Castling {
            self.do_castling(us, from, to, false, None);
        } else {
            self.move_piece(to, from);

            let captured = self.state().captured_piece;
            if captured.is_some() {
                let capsq = if m.move_type() == MoveType::EnPassant {
                    to.offset(-us.pawn_push())
                } else {
                    to
                };
                self.put_piece(captured, capsq);
            }
        }

        self.st -= 1;
        self.game_ply -= 1;

        debug_assert!(self.is_ok());
    }

    /// null moveを実行
    pub fn do_null_move(&mut self) {
        debug_assert!(!self.in_check());

        let mut st = *self.state();
        st.dirty_piece.clear();

        if let Some(ep) = st.ep_square.take() {
            st.key ^= zobrist_enpassant(ep.file());
        }
        st.key ^= zobrist_side();
        st.rule50 += 1;
        st.plies_from_null = 0;
        st.captured_piece = Piece::NONE;
        st.checkers = Bitboard::EMPTY;

        self.side_to_move = !self.side_to_move;
        self.set_check_info(&mut st);
        st.repetition = 0;

        self.st += 1;
        self.states.store(self.st, st);
    }

    /// null moveを戻す
    pub fn undo_null_move(&mut self) {
        debug_assert!(!self.in_check());
        self.st -= 1;
        self.side_to_move = !self.side_to_move;
    }

    /// 指し手後のハッシュキー（TTのプリフェッチ用の近似値）
    ///
    /// アンパッサン・キャスリング・成り・キャスリング権の変化は考慮しない。
    pub fn key_after(&self, m: Move) -> u64 {
        let from = m.from();
        let to = m.to();
        let pc = self.piece_on(from);
        let captured = self.piece_on(to);
        let mut k = self.state().key ^ zobrist_side();

        if captured.is_some() {
            k ^= zobrist_psq(captured, to);
        }
        k ^ zobrist_psq(pc, to) ^ zobrist_psq(pc, from)
    }

    // ========== 指し手の判定 ==========

    /// 駒を取る手か（アンパッサンを含み、キャスリングは含まない）
    #[inline]
    pub fn is_capture(&self, m: Move) -> bool {
        (!self.empty(m.to()) && m.move_type() != MoveType::Castling)
            || m.move_type() == MoveType::EnPassant
    }

    /// 捕獲系として扱う手か（駒取りまたはクイーンへの成り）
    #[inline]
    pub fn capture_stage(&self, m: Move) -> bool {
        self.is_capture(m)
            || (m.move_type() == MoveType::Promotion && m.promotion_type() == PieceType::Queen)
    }

    /// 疑似合法手が自キングを王手に晒さないか
    pub fn legal(&self, m: Move) -> bool {
        debug_assert!(m.is_ok());

        let us = self.side_to_move;
        let from = m.from();
        let mut to = m.to();

        debug_assert!(self.moved_piece(m).color() == us);

        // アンパッサンは2枚のポーンが同時に消えるので、取った後の占有で遠方駒の利きを調べる
        if m.move_type() == MoveType::EnPassant {
            let ksq = self.king_square(us);
            let capsq = to.offset(-us.pawn_push());
            let occupied = (self.occupied() ^ from ^ capsq) | to;

            return (rook_attacks(ksq, occupied)
                & self.pieces_c_pt2(!us, PieceType::Queen, PieceType::Rook))
            .is_empty()
                && (bishop_attacks(ksq, occupied)
                    & self.pieces_c_pt2(!us, PieceType::Queen, PieceType::Bishop))
                .is_empty();
        }

        // キャスリングはキングの通過升に利きがないこと
        if m.move_type() == MoveType::Castling {
            let king_side = to > from;
            to = (if king_side { Square::G1 } else { Square::C1 }).relative(us);
            let step: i8 = if king_side { -1 } else { 1 };

            let mut s = to;
            while s != from {
                if (self.attackers_to(s) & self.pieces_c(!us)).is_not_empty() {
                    return false;
                }
                s = s.offset(step);
            }

            // チェス960ではルークが動くことで遠方駒の利きが通ることがある
            return !self.chess960 || !self.blockers_for_king(us).contains(m.to());
        }

        // キングの移動は移動先に利きがないこと
        if self.piece_on(from).piece_type() == PieceType::King {
            return (self.attackers_to_occ(to, self.occupied() ^ from) & self.pieces_c(!us))
                .is_empty();
        }

        // pinされている駒はpinの直線上でのみ動ける
        !self.blockers_for_king(us).contains(from) || aligned(from, to, self.king_square(us))
    }

    /// 疑似合法手が王手になるか
    pub fn gives_check(&self, m: Move) -> bool {
        debug_assert!(m.is_ok());

        let us = self.side_to_move;
        let from = m.from();
        let to = m.to();
        let ksq = self.king_square(!us);

        // 直接王手
        if self.check_squares(self.piece_on(from).piece_type()).contains(to) {
            return true;
        }

        // 開き王手
        if self.blockers_for_king(!us).contains(from) {
            return !aligned(from, to, ksq) || m.move_type() == MoveType::Castling;
        }

        match m.move_type() {
            MoveType::Normal => false,
            MoveType::Promotion => {
                attacks_bb(m.promotion_type(), to, self.occupied() ^ from).contains(ksq)
            }
            // 取ったポーンによって開く開き王手
            MoveType::EnPassant => {
                let capsq = Square::new(to.file(), from.rank());
                let b = (self.occupied() ^ from ^ capsq) | to;
                (rook_attacks(ksq, b) & self.pieces_c_pt2(us, PieceType::Queen, PieceType::Rook))
                    .is_not_empty()
                    || (bishop_attacks(ksq, b)
                        & self.pieces_c_pt2(us, PieceType::Queen, PieceType::Bishop))
                    .is_not_empty()
            }
            MoveType::Castling => {
                let rto = (if to > from { Square::F1 } else { Square::D1 }).relative(us);
                self.check_squares(PieceType::Rook).contains(rto)
            }
        }
    }

    // ========== 引き分け判定 ==========

    /// 探索中の引き分け判定
    ///
    /// 50手ルール（詰みは除く）と、探索木の中での2回目・ルートより前での3回目の同一局面。
    pub fn is_draw(&self, ply: i32) -> bool {
        if self.state().rule50 > 99
            && (!self.in_check() || crate::movegen::has_legal_moves(self))
        {
            return true;
        }

        let repetition = self.state().repetition;
        repetition != 0 && repetition < ply
    }

    /// 最後の不可逆な手以降に同一局面が現れたか
    pub fn has_repeated(&self) -> bool {
        let mut idx = self.st;
        let mut end = self.state().rule50.min(self.state().plies_from_null);
        while end >= 4 {
            if self.states.get(idx).repetition != 0 {
                return true;
            }
            if idx == 0 {
                break;
            }
            idx -= 1;
            end -= 1;
        }
        false
    }

    /// 内部整合性の検査（debug_assert用）
    pub fn is_ok(&self) -> bool {
        if self.pieces(Color::White, PieceType::King).count() != 1
            || self.pieces(Color::Black, PieceType::King).count() != 1
        {
            return false;
        }
        if (self.pieces_c(Color::White) & self.pieces_c(Color::Black)).is_not_empty() {
            return false;
        }
        if cfg!(feature = "debug") {
            if self.compute_key() != self.state().key {
                return false;
            }
            if self.compute_pawn_key() != self.state().pawn_key {
                return false;
            }
            for sq in Square::all() {
                let pc = self.piece_on(sq);
                if pc.is_some() != self.occupied().contains(sq) {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, " +---+---+---+---+---+---+---+---+")?;
        for r in (0..8u8).rev() {
            for file in 0..8u8 {
                let sq = Square::from_u8_masked(r * 8 + file);
                let pc = self.piece_on(sq);
                let c = if pc.is_some() { pc.to_char() } else { ' ' };
                write!(f, " | {c}")?;
            }
            writeln!(f, " | {}", r + 1)?;
            writeln!(f, " +---+---+---+---+---+---+---+---+")?;
        }
        writeln!(f, "   a   b   c   d   e   f   g   h")?;
        writeln!(f)?;
        writeln!(f, "Fen: {}", self.fen())?;
        write!(f, "Key: {:016X}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::START_FEN;

    fn pos_from(fen: &str) -> Position {
        let mut pos = Position::new();
        pos.set_fen(fen, false).unwrap();
        pos
    }

    #[test]
    fn test_position_new() {
        let pos = Position::new();
        assert!(pos.occupied().is_empty());
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.game_ply(), 0);
    }

    #[test]
    fn test_startpos_accessors() {
        let pos = pos_from(START_FEN);
        assert_eq!(pos.occupied().count(), 32);
        assert_eq!(pos.king_square(Color::White), Square::E1);
        assert_eq!(pos.king_square(Color::Black), Square::E8);
        assert_eq!(pos.count(Piece::W_PAWN), 8);
        assert!(pos.can_castle(CastlingRights::ALL));
        assert!(!pos.in_check());
        assert_eq!(pos.non_pawn_material(Color::White), pos.non_pawn_material(Color::Black));
    }

    #[test]
    fn test_attackers_to() {
        let pos = pos_from(START_FEN);
        // f3には白のg1ナイトとe2,g2のポーンが利いている
        let attackers = pos.attackers_to(Square::F3) & pos.pieces_c(Color::White);
        assert!(attackers.contains(Square::G1));
        assert!(attackers.contains(Square::E2));
        assert!(attackers.contains(Square::G2));
        assert_eq!(attackers.count(), 3);
    }

    #[test]
    fn test_do_undo_normal() {
        let mut pos = pos_from(START_FEN);
        let key = pos.key();
        let m = Move::new(Square::G1, Square::F3);

        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.piece_on(Square::F3), Piece::W_KNIGHT);
        assert!(pos.empty(Square::G1));
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_eq!(pos.rule50_count(), 1);
        assert_eq!(pos.key(), pos.compute_key());

        pos.undo_move(m);
        assert_eq!(pos.key(), key);
        assert_eq!(pos.piece_on(Square::G1), Piece::W_KNIGHT);
    }

    #[test]
    fn test_double_push_sets_ep_only_when_capturable() {
        // 取れる相手のポーンがいなければアンパッサン升は立たない
        let mut pos = pos_from(START_FEN);
        let m = Move::new(Square::E2, Square::E4);
        pos.do_move(m, false);
        assert_eq!(pos.ep_square(), None);
        pos.undo_move(m);

        let mut pos = pos_from("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1");
        pos.do_move(m, false);
        assert_eq!(pos.ep_square(), Some(Square::E3));
        assert_eq!(pos.key(), pos.compute_key());
    }

    #[test]
    fn test_en_passant_capture() {
        let mut pos = pos_from("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2");
        let m = Move::new_special(MoveType::EnPassant, Square::E5, Square::D6, PieceType::Knight);
        assert!(pos.is_capture(m));
        assert!(pos.legal(m));

        pos.do_move(m, pos.gives_check(m));
        assert!(pos.empty(Square::D5));
        assert_eq!(pos.piece_on(Square::D6), Piece::W_PAWN);
        assert_eq!(pos.captured_piece(), Piece::B_PAWN);
        assert_eq!(pos.key(), pos.compute_key());
        assert_eq!(pos.pawn_key(), pos.compute_pawn_key());

        pos.undo_move(m);
        assert_eq!(pos.piece_on(Square::D5), Piece::B_PAWN);
        assert_eq!(pos.piece_on(Square::E5), Piece::W_PAWN);
    }

    #[test]
    fn test_castling_do_undo() {
        let mut pos = pos_from("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let m = Move::new_special(MoveType::Castling, Square::E1, Square::H1, PieceType::Knight);
        assert!(pos.legal(m));

        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.piece_on(Square::G1), Piece::W_KING);
        assert_eq!(pos.piece_on(Square::F1), Piece::W_ROOK);
        assert!(pos.empty(Square::E1));
        assert!(pos.empty(Square::H1));
        assert!(!pos.can_castle(CastlingRights::WHITE_OO));
        assert!(!pos.can_castle(CastlingRights::WHITE_OOO));
        assert!(pos.can_castle(CastlingRights::BLACK));
        assert_eq!(pos.key(), pos.compute_key());

        pos.undo_move(m);
        assert_eq!(pos.piece_on(Square::E1), Piece::W_KING);
        assert_eq!(pos.piece_on(Square::H1), Piece::W_ROOK);
        assert!(pos.can_castle(CastlingRights::WHITE));
    }

    #[test]
    fn test_promotion_do_undo() {
        let mut pos = pos_from("8/4P3/8/8/8/8/k7/4K3 w - - 0 1");
        let npm = pos.non_pawn_material(Color::White);
        let m = Move::new_promotion(Square::E7, Square::E8, PieceType::Queen);

        pos.do_move(m, pos.gives_check(m));
        assert_eq!(pos.piece_on(Square::E8), Piece::W_QUEEN);
        assert_eq!(pos.count(Piece::W_PAWN), 0);
        assert_eq!(pos.non_pawn_material(Color::White), npm + piece_value_mg(PieceType::Queen));
        assert_eq!(pos.pawn_key(), pos.compute_pawn_key());

        pos.undo_move(m);
        assert_eq!(pos.piece_on(Square::E7), Piece::W_PAWN);
        assert_eq!(pos.non_pawn_material(Color::White), npm);
    }

    #[test]
    fn test_pinned_piece_legality() {
        // e2のナイトはe8のルークでpinされている
        let pos = pos_from("4r2k/8/8/8/8/8/4N3/4K3 w - - 0 1");
        assert!(pos.blockers_for_king(Color::White).contains(Square::E2));
        assert!(pos.pinners(Color::Black).contains(Square::E8));
        assert!(!pos.legal(Move::new(Square::E2, Square::C3)));
        assert!(pos.legal(Move::new(Square::E1, Square::D1)));
    }

    #[test]
    fn test_gives_check_variants() {
        let pos = pos_from("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        // 直接王手
        assert!(pos.gives_check(Move::new(Square::A1, Square::A8)));
        assert!(!pos.gives_check(Move::new(Square::A1, Square::A2)));
        // キャスリング後のf1のルークがf筋を通すが、e8には届かない
        let oo = Move::new_special(MoveType::Castling, Square::E1, Square::H1, PieceType::Knight);
        assert!(!pos.gives_check(oo));

        // 開き王手
        let pos = pos_from("4k3/8/8/8/8/8/4B3/4R1K1 w - - 0 1");
        assert!(pos.gives_check(Move::new(Square::E2, Square::D3)));
    }

    #[test]
    fn test_null_move() {
        let mut pos = pos_from("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1");
        let m = Move::new(Square::E2, Square::E4);
        pos.do_move(m, false);
        let key = pos.key();
        assert!(pos.ep_square().is_some());

        pos.do_null_move();
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.ep_square(), None);
        assert_eq!(pos.key(), pos.compute_key());

        pos.undo_null_move();
        assert_eq!(pos.key(), key);
        assert_eq!(pos.side_to_move(), Color::Black);
    }

    #[test]
    fn test_repetition_detection() {
        let mut pos = pos_from(START_FEN);
        let moves = [
            Move::new(Square::G1, Square::F3),
            Move::new(Square::G8, Square::F6),
            Move::new(Square::F3, Square::G1),
            Move::new(Square::F6, Square::G8),
        ];
        for m in moves {
            pos.do_move(m, false);
        }
        // 4手で元の局面に戻る
        assert_eq!(pos.state().repetition, 4);
        assert!(pos.has_repeated());
        assert!(pos.is_draw(5));
        assert!(!pos.is_draw(4));

        for m in moves {
            pos.do_move(m, false);
        }
        // 3回目の出現は負の距離になる
        assert_eq!(pos.state().repetition, -4);
        assert!(pos.is_draw(1));
    }

    #[test]
    fn test_fifty_move_draw() {
        let pos = pos_from("4k3/8/8/8/8/8/8/4K2R w - - 100 80");
        assert!(pos.is_draw(1));
        let pos = pos_from("4k3/8/8/8/8/8/8/4K2R w - - 99 80");
        assert!(!pos.is_draw(1));
    }

    #[test]
    fn test_key_after_matches_quiet_move() {
        let mut pos = pos_from(START_FEN);
        let m = Move::new(Square::B1, Square::C3);
        let predicted = pos.key_after(m);
        pos.do_move(m, false);
        assert_eq!(pos.key(), predicted);
    }
}
