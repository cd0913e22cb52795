//! FEN形式の解析・出力とUCI形式の指し手変換

use log::warn;
use thiserror::Error;

use crate::bitboard::{Bitboard, between_bb, pawn_attacks, rank_bb};
use crate::movegen::{MoveList, generate_legal};
use crate::types::{CastlingRights, Color, File, Move, Piece, PieceType, Rank, Square};

use super::pos::Position;

/// 初期局面のFEN
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FENパースエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    /// 空文字列
    #[error("empty FEN")]
    Empty,
    /// 盤面の形式が不正
    #[error("invalid board: {0}")]
    Board(String),
    /// 駒を表さない文字
    #[error("invalid piece character '{0}'")]
    Piece(char),
    /// 手番の形式が不正
    #[error("invalid side to move: {0}")]
    SideToMove(String),
    /// キャスリング権が不正
    #[error("invalid castling rights: {0}")]
    Castling(String),
    /// アンパッサン升が不正
    #[error("invalid en passant square: {0}")]
    EnPassant(String),
    /// 手数カウンタが不正
    #[error("invalid move counter: {0}")]
    Counter(String),
    /// キングがちょうど1枚でない
    #[error("{0:?} must have exactly one king")]
    KingCount(Color),
    /// 駒の枚数が多すぎる
    #[error("too many pieces for {0:?}")]
    PieceCount(Color),
    /// 1段目・8段目にポーンがある
    #[error("pawn on the first or last rank")]
    PawnOnBackRank,
    /// 手番でない側が王手されている
    #[error("side not to move is in check")]
    OpponentInCheck,
}

impl Position {
    /// 初期局面を生成
    pub fn startpos() -> Position {
        let mut pos = Position::new();
        pos.set_fen(START_FEN, false).expect("開始局面のFENは常に有効");
        pos
    }

    /// FEN文字列から局面を生成
    pub fn from_fen(fen: &str, chess960: bool) -> Result<Position, FenError> {
        let mut pos = Position::new();
        pos.set_fen(fen, chess960)?;
        Ok(pos)
    }

    /// FEN文字列から局面を設定（厳密）
    ///
    /// 形式の誤りや実現不可能な局面はエラーにする。状態スタックは先頭から使い直す。
    pub fn set_fen(&mut self, fen: &str, chess960: bool) -> Result<(), FenError> {
        self.parse_fen(fen, chess960, true)
    }

    /// FEN文字列から局面を設定（寛容）
    ///
    /// 解釈できないトークンは無視し、取れないアンパッサン升は捨てる。
    /// キングがちょうど1枚ずつ無い局面だけはエラーにする。
    pub fn set_fen_lenient(&mut self, fen: &str, chess960: bool) -> Result<(), FenError> {
        self.parse_fen(fen, chess960, false)
    }

    fn parse_fen(&mut self, fen: &str, chess960: bool, strict: bool) -> Result<(), FenError> {
        self.clear();
        self.chess960 = chess960;

        let mut fields = fen.split_whitespace();

        // 1. 盤面
        let board = fields.next().ok_or(FenError::Empty)?;
        self.parse_board(board, strict)?;

        // 2. 手番
        self.side_to_move = match fields.next() {
            Some("w") => Color::White,
            Some("b") => Color::Black,
            Some(s) if strict => return Err(FenError::SideToMove(s.to_string())),
            None if strict => return Err(FenError::SideToMove("missing".to_string())),
            other => {
                warn!("FEN: side to move {other:?} を白番として扱います");
                Color::White
            }
        };

        for c in Color::ALL {
            if self.pieces(c, PieceType::King).count() != 1 {
                return Err(FenError::KingCount(c));
            }
        }
        if strict {
            self.validate_material()?;
        }

        // 3. キャスリング権
        if let Some(token) = fields.next() {
            self.parse_castling(token, strict)?;
        }

        // 4. アンパッサン
        if let Some(token) = fields.next() {
            self.parse_en_passant(token, strict)?;
        }

        // 5. 50手ルールカウンタと手数
        let rule50 = parse_counter(fields.next(), 0, strict)?;
        let fullmove = parse_counter(fields.next(), 1, strict)?;
        self.state_mut().rule50 = rule50;
        self.game_ply =
            (2 * (fullmove - 1)).max(0) + i32::from(self.side_to_move == Color::Black);

        if strict {
            let them = !self.side_to_move;
            let attackers = self.attackers_to(self.king_square(them)) & self.pieces_c(!them);
            if attackers.is_not_empty() {
                return Err(FenError::OpponentInCheck);
            }
        }

        self.set_state();
        Ok(())
    }

    /// 盤面部分をパース
    fn parse_board(&mut self, board: &str, strict: bool) -> Result<(), FenError> {
        let mut file = 0usize;
        let mut rank = 7i32;

        for c in board.chars() {
            if let Some(d) = c.to_digit(10) {
                if strict && !(1..=8).contains(&d) {
                    return Err(FenError::Board(format!("bad skip count '{c}'")));
                }
                file += d as usize;
            } else if c == '/' {
                if strict && file != 8 {
                    return Err(FenError::Board(format!(
                        "rank {} has {file} squares",
                        rank + 1
                    )));
                }
                rank -= 1;
                file = 0;
                if strict && rank < 0 {
                    return Err(FenError::Board("too many ranks".to_string()));
                }
            } else if let Some(pc) = Piece::from_char(c) {
                if file > 7 || rank < 0 {
                    if strict {
                        return Err(FenError::Board(format!(
                            "rank {} has too many squares",
                            rank + 1
                        )));
                    }
                    continue;
                }
                let sq = Square::new(File::ALL[file], Rank::ALL[rank as usize]);
                if self.empty(sq) {
                    self.put_piece(pc, sq);
                }
                file += 1;
            } else if strict {
                return Err(FenError::Piece(c));
            }
        }

        if strict && (rank != 0 || file != 8) {
            return Err(FenError::Board("expected 8 ranks of 8 squares".to_string()));
        }
        Ok(())
    }

    /// 駒の枚数とポーンの位置の検査
    fn validate_material(&self) -> Result<(), FenError> {
        for c in Color::ALL {
            if self.pieces_c(c).count() > 16 || self.pieces(c, PieceType::Pawn).count() > 8 {
                return Err(FenError::PieceCount(c));
            }
        }
        let back_ranks = rank_bb(Rank::Rank1) | rank_bb(Rank::Rank8);
        if (self.pieces_pt(PieceType::Pawn) & back_ranks).is_not_empty() {
            return Err(FenError::PawnOnBackRank);
        }
        Ok(())
    }

    /// キャスリング権をパース（KQkq / X-FEN / Shredder-FEN）
    fn parse_castling(&mut self, token: &str, strict: bool) -> Result<(), FenError> {
        if token == "-" {
            return Ok(());
        }

        for c in token.chars() {
            let color = if c.is_ascii_lowercase() {
                Color::Black
            } else {
                Color::White
            };
            let rook = Piece::new(color, PieceType::Rook);
            let ksq = self.king_square(color);
            let back_rank = Rank::Rank1.relative(color);
            let on_back_rank = |f: usize| Square::new(File::ALL[f], back_rank);

            let rsq = if ksq.rank() != back_rank {
                None
            } else {
                match c.to_ascii_uppercase() {
                    // キングより外側の一番端のルーク
                    'K' => (ksq.file().index() + 1..8)
                        .rev()
                        .map(on_back_rank)
                        .find(|&s| self.piece_on(s) == rook),
                    'Q' => (0..ksq.file().index())
                        .map(on_back_rank)
                        .find(|&s| self.piece_on(s) == rook),
                    f @ 'A'..='H' => File::from_char(f.to_ascii_lowercase())
                        .map(|f| Square::new(f, back_rank))
                        .filter(|&s| self.piece_on(s) == rook && s != ksq),
                    _ => None,
                }
            };

            match rsq {
                Some(rsq) => self.set_castling_right(color, rsq),
                None if strict => return Err(FenError::Castling(token.to_string())),
                None => warn!("FEN: キャスリング権 '{c}' を無視します"),
            }
        }
        Ok(())
    }

    /// キャスリング権と関連テーブルを設定
    fn set_castling_right(&mut self, c: Color, rfrom: Square) {
        let kfrom = self.king_square(c);
        let king_side = kfrom < rfrom;
        let cr = CastlingRights::single(c, king_side);

        self.state_mut().castling_rights |= cr;
        self.castling_rights_mask[kfrom.index()] |= cr;
        self.castling_rights_mask[rfrom.index()] |= cr;
        self.castling_rook_square[cr.single_index()] = rfrom;

        let kto = (if king_side { Square::G1 } else { Square::C1 }).relative(c);
        let rto = (if king_side { Square::F1 } else { Square::D1 }).relative(c);

        self.castling_path[cr.single_index()] = (between_bb(rfrom, rto) | between_bb(kfrom, kto))
            & !(Bitboard::from_square(kfrom) | rfrom);
    }

    /// アンパッサン升をパース
    ///
    /// 手番側のポーンが実際に取れる場合だけ採用する。
    fn parse_en_passant(&mut self, token: &str, strict: bool) -> Result<(), FenError> {
        if token == "-" {
            return Ok(());
        }

        let us = self.side_to_move;
        let them = !us;
        let expected_rank = Rank::Rank6.relative(us);

        let ep = token.parse::<Square>().ok().filter(|s| s.rank() == expected_rank);
        let plausible = ep.is_some_and(|ep| {
            self.pieces(them, PieceType::Pawn).contains(ep.offset(them.pawn_push()))
                && self.empty(ep)
                && self.empty(ep.offset(us.pawn_push()))
        });

        let Some(ep) = ep.filter(|_| plausible) else {
            if strict {
                return Err(FenError::EnPassant(token.to_string()));
            }
            warn!("FEN: アンパッサン升 '{token}' を無視します");
            return Ok(());
        };

        if (pawn_attacks(them, ep) & self.pieces(us, PieceType::Pawn)).is_not_empty() {
            self.state_mut().ep_square = Some(ep);
        }
        Ok(())
    }

    /// 現局面のFEN文字列を取得
    pub fn fen(&self) -> String {
        let mut result = String::new();

        // 1. 盤面
        for r in (0..8).rev() {
            let mut empty_count = 0;
            for f in 0..8 {
                let pc = self.piece_on(Square::new(File::ALL[f], Rank::ALL[r]));
                if pc.is_none() {
                    empty_count += 1;
                } else {
                    if empty_count > 0 {
                        result.push_str(&empty_count.to_string());
                        empty_count = 0;
                    }
                    result.push(pc.to_char());
                }
            }
            if empty_count > 0 {
                result.push_str(&empty_count.to_string());
            }
            if r > 0 {
                result.push('/');
            }
        }

        // 2. 手番
        result.push(' ');
        result.push(self.side_to_move.to_char());

        // 3. キャスリング権
        result.push(' ');
        let mut any = false;
        for (cr, c) in [
            (CastlingRights::WHITE_OO, 'K'),
            (CastlingRights::WHITE_OOO, 'Q'),
            (CastlingRights::BLACK_OO, 'k'),
            (CastlingRights::BLACK_OOO, 'q'),
        ] {
            if !self.can_castle(cr) {
                continue;
            }
            any = true;
            if self.chess960 {
                let f = self.castling_rook_square(cr).file().to_char();
                result.push(if c.is_ascii_uppercase() {
                    f.to_ascii_uppercase()
                } else {
                    f
                });
            } else {
                result.push(c);
            }
        }
        if !any {
            result.push('-');
        }

        // 4. アンパッサン
        result.push(' ');
        match self.ep_square() {
            Some(ep) => result.push_str(&ep.to_string()),
            None => result.push('-'),
        }

        // 5. 手数
        let fullmove = 1 + (self.game_ply - i32::from(self.side_to_move == Color::Black)) / 2;
        result.push_str(&format!(" {} {fullmove}", self.rule50_count()));

        result
    }

    // ========== UCI形式の指し手 ==========

    /// UCI形式の文字列を合法手に変換する
    ///
    /// 合法手に一致しなければ None を返す。
    pub fn parse_uci_move(&self, s: &str) -> Option<Move> {
        let s = s.trim().to_ascii_lowercase();
        let mut list = MoveList::new();
        generate_legal(self, &mut list);
        list.iter().copied().find(|m| m.to_uci(self.chess960) == s)
    }
}

/// 手数カウンタをパース
fn parse_counter(token: Option<&str>, default: i32, strict: bool) -> Result<i32, FenError> {
    match token {
        None => Ok(default),
        Some(t) => match t.parse::<i32>() {
            Ok(v) if v >= 0 => Ok(v),
            _ if strict => Err(FenError::Counter(t.to_string())),
            _ => Ok(default),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_roundtrip() {
        let pos = Position::startpos();
        assert_eq!(pos.fen(), START_FEN);
        assert_eq!(pos.game_ply(), 0);
    }

    #[test]
    fn test_fen_roundtrip_various() {
        for fen in [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2",
        ] {
            let pos = Position::from_fen(fen, false).unwrap();
            assert_eq!(pos.fen(), fen);
        }
    }

    #[test]
    fn test_game_ply_from_fullmove() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 b - - 3 10", false).unwrap();
        assert_eq!(pos.game_ply(), 19);
        assert_eq!(pos.rule50_count(), 3);
    }

    #[test]
    fn test_strict_errors() {
        assert_eq!(Position::from_fen("", false).err(), Some(FenError::Empty));
        assert!(matches!(
            Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1", false),
            Err(FenError::Board(_))
        ));
        assert_eq!(
            Position::from_fen("4k3/8/8/8/8/8/8/4X3 w - - 0 1", false).err(),
            Some(FenError::Piece('X'))
        );
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1", false),
            Err(FenError::SideToMove(_))
        ));
        assert_eq!(
            Position::from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1", false).err(),
            Some(FenError::KingCount(Color::Black))
        );
        assert_eq!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 w K - 0 1", false).err(),
            Some(FenError::Castling("K".to_string()))
        );
        assert_eq!(
            Position::from_fen("4k3/8/8/8/8/8/8/P3K3 w - - 0 1", false).err(),
            Some(FenError::PawnOnBackRank)
        );
        // 手番でない黒が王手されている
        assert_eq!(
            Position::from_fen("4k3/8/8/8/8/8/8/4RK2 w - - 0 1", false).err(),
            Some(FenError::OpponentInCheck)
        );
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - e6 0 1", false),
            Err(FenError::EnPassant(_))
        ));
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - x 1", false),
            Err(FenError::Counter(_))
        ));
    }

    #[test]
    fn test_lenient_fixups() {
        let mut pos = Position::new();
        // 取れないアンパッサン升と存在しないルークのキャスリング権は捨てられる
        pos.set_fen_lenient("4k3/8/8/8/8/8/8/4K3 w KQ e6", false).unwrap();
        assert_eq!(pos.ep_square(), None);
        assert!(pos.castling_rights().is_empty());
        assert_eq!(pos.rule50_count(), 0);

        // キングが無い局面は寛容モードでも拒否する
        assert!(pos.set_fen_lenient("8/8/8/8/8/8/8/8 w - - 0 1", false).is_err());
    }

    #[test]
    fn test_ep_dropped_when_not_capturable() {
        // e3は妥当だが黒に取れるポーンがない
        let pos = Position::from_fen("4k3/8/8/8/4P3/8/8/4K3 b - e3 0 1", false).unwrap();
        assert_eq!(pos.ep_square(), None);
    }

    #[test]
    fn test_chess960_castling_fen() {
        let fen = "bqnbrkrn/pppppppp/8/8/8/8/PPPPPPPP/BQNBRKRN w GEge - 0 1";
        let pos = Position::from_fen(fen, true).unwrap();
        assert!(pos.can_castle(CastlingRights::ALL));
        assert_eq!(pos.castling_rook_square(CastlingRights::WHITE_OO), Square::G1);
        assert_eq!(pos.castling_rook_square(CastlingRights::WHITE_OOO), Square::E1);
        assert_eq!(pos.castling_rook_square(CastlingRights::BLACK_OO), Square::G8);
        assert_eq!(pos.fen(), fen);
    }

    #[test]
    fn test_parse_uci_move() {
        let pos = Position::startpos();
        assert_eq!(pos.parse_uci_move("e2e4"), Some(Move::new(Square::E2, Square::E4)));
        assert_eq!(pos.parse_uci_move("e2e5"), None);
        assert_eq!(pos.parse_uci_move("garbage"), None);

        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1", false).unwrap();
        let oo = pos.parse_uci_move("e1g1").unwrap();
        assert_eq!(oo.move_type(), crate::types::MoveType::Castling);
        assert_eq!(oo.to(), Square::H1);

        let pos = Position::from_fen("8/4P3/8/8/8/8/k7/4K3 w - - 0 1", false).unwrap();
        assert_eq!(
            pos.parse_uci_move("e7e8N"),
            Some(Move::new_promotion(Square::E7, Square::E8, PieceType::Knight))
        );
    }
}
