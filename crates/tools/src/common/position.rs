//! FEN と指し手列から局面を作る

use anyhow::{Context, Result, bail};

use rchess_core::position::Position;

/// `fen`（省略時は初期局面）から `moves` を順に指した局面
pub fn setup_position(fen: Option<&str>, moves: &[String], chess960: bool) -> Result<Position> {
    let mut pos = match fen {
        Some(fen) => Position::from_fen(fen, chess960).with_context(|| format!("invalid FEN: {fen}"))?,
        None => Position::startpos(),
    };

    for (i, s) in moves.iter().enumerate() {
        let Some(m) = pos.parse_uci_move(s) else {
            bail!("illegal move #{} '{}' in position {}", i + 1, s, pos.fen());
        };
        let gives_check = pos.gives_check(m);
        pos.do_move(m, gives_check);
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_position() {
        rchess_core::init();
        let pos = setup_position(None, &["e2e4".into(), "e7e5".into()], false).unwrap();
        assert_eq!(pos.fen(), "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2");
        assert!(setup_position(None, &["e2e5".into()], false).is_err());
        assert!(setup_position(Some("not a fen"), &[], false).is_err());
    }
}
