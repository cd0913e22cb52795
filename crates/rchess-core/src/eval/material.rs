//! 駒割・駒位置・機動力による評価関数
//!
//! 駒割と駒位置は StateInfo の [`Accumulator`](super::Accumulator) を読み、
//! ビショップペアと機動力はその場で計算する。スカラーの重みは
//! テキストのパラメータファイルから読み込める（[`load_evaluator`]）。

use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;
use serde::Serialize;
use thiserror::Error;

use super::psqt::{EG, MG};
use super::{EvalResult, Evaluator};
use crate::bitboard::{Bitboard, attacks_bb, pawn_attacks_bb};
use crate::position::Position;
use crate::types::{Color, PieceType, Value};

/// 中盤とみなす非ポーン駒の総量
const MIDGAME_LIMIT: i32 = 15258;
/// 終盤とみなす非ポーン駒の総量
const ENDGAME_LIMIT: i32 = 3915;
/// フェーズの最大値（中盤）
const PHASE_MIDGAME: i32 = 128;

/// 機動力を評価する駒種
const MOBILITY_PIECES: [PieceType; 4] =
    [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen];

/// 平均的な利き升数（これより多ければプラス）
const MOBILITY_BASE: [i32; 4] = [4, 6, 7, 13];

/// 評価パラメータ読み込みエラー
#[derive(Debug, Error)]
pub enum EvalError {
    /// ファイルが読めない
    #[error("failed to read evaluator parameters from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 行の形式が不正
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    /// 値が範囲外
    #[error("parameter '{name}' out of range: {value}")]
    OutOfRange { name: String, value: i32 },
}

/// 評価関数の重み
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvalParams {
    /// 手番ボーナス
    pub tempo: i32,
    /// 駒割＋駒位置の倍率（%）
    pub psq_scale: i32,
    /// ビショップペア [MG/EG]
    pub bishop_pair: [i32; 2],
    /// 1升あたりの機動力 [Knight, Bishop, Rook, Queen][MG/EG]
    pub mobility: [[i32; 2]; 4],
    /// 50手ルールカウンタによる減衰の基準値
    pub shuffle_damping: i32,
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            tempo: 28,
            psq_scale: 100,
            bishop_pair: [48, 64],
            mobility: [[6, 5], [5, 5], [3, 6], [1, 3]],
            shuffle_damping: 200,
        }
    }
}

impl EvalParams {
    /// 名前で重みへの可変参照を得る
    fn slot(&mut self, name: &str) -> Option<&mut i32> {
        let phase = |s: &str| match s {
            "mg" => Some(MG),
            "eg" => Some(EG),
            _ => None,
        };
        match name {
            "tempo" => Some(&mut self.tempo),
            "psq_scale" => Some(&mut self.psq_scale),
            "shuffle_damping" => Some(&mut self.shuffle_damping),
            _ => {
                let (base, p) = name.rsplit_once('_')?;
                let p = phase(p)?;
                match base {
                    "bishop_pair" => Some(&mut self.bishop_pair[p]),
                    "mobility_knight" => Some(&mut self.mobility[0][p]),
                    "mobility_bishop" => Some(&mut self.mobility[1][p]),
                    "mobility_rook" => Some(&mut self.mobility[2][p]),
                    "mobility_queen" => Some(&mut self.mobility[3][p]),
                    _ => None,
                }
            }
        }
    }

    /// 値の範囲を検査
    fn validate(&self) -> Result<(), EvalError> {
        let check = |name: &str, value: i32, lo: i32, hi: i32| {
            if (lo..=hi).contains(&value) {
                Ok(())
            } else {
                Err(EvalError::OutOfRange {
                    name: name.to_string(),
                    value,
                })
            }
        };
        check("tempo", self.tempo, -200, 200)?;
        check("psq_scale", self.psq_scale, 1, 400)?;
        check("shuffle_damping", self.shuffle_damping, 101, 10000)?;
        Ok(())
    }
}

impl FromStr for EvalParams {
    type Err = EvalError;

    /// `name = value` 形式のテキストをパースする（`#` 以降はコメント）
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut params = EvalParams::default();

        for (i, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let parse_err = |message: String| EvalError::Parse {
                line: i + 1,
                message,
            };

            let (name, value) = line
                .split_once('=')
                .ok_or_else(|| parse_err(format!("expected 'name = value', got '{line}'")))?;
            let name = name.trim();
            let value: i32 = value
                .trim()
                .parse()
                .map_err(|_| parse_err(format!("invalid integer '{}'", value.trim())))?;

            let slot = params
                .slot(name)
                .ok_or_else(|| parse_err(format!("unknown parameter '{name}'")))?;
            *slot = value;
        }

        params.validate()?;
        Ok(params)
    }
}

/// 駒割・駒位置・機動力による評価関数
#[derive(Debug, Clone, Default)]
pub struct MaterialEvaluator {
    params: EvalParams,
}

impl MaterialEvaluator {
    /// 既定の重みで生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 重みを指定して生成
    pub fn with_params(params: EvalParams) -> Self {
        Self { params }
    }

    /// 重みを取得
    pub fn params(&self) -> &EvalParams {
        &self.params
    }

    /// 局面のフェーズ（0 = 終盤, 128 = 中盤）
    pub fn phase(pos: &Position) -> i32 {
        let npm = pos.non_pawn_material_total().clamp(ENDGAME_LIMIT, MIDGAME_LIMIT);
        ((npm - ENDGAME_LIMIT) * PHASE_MIDGAME) / (MIDGAME_LIMIT - ENDGAME_LIMIT)
    }

    /// 白視点のビショップペアと機動力 [MG/EG]
    fn positional(&self, pos: &Position) -> [i32; 2] {
        let mut score = [0; 2];
        let occupied = pos.occupied();

        for c in Color::ALL {
            let sign = if c == Color::White { 1 } else { -1 };

            if pos.pieces(c, PieceType::Bishop).more_than_one() {
                score[MG] += sign * self.params.bishop_pair[MG];
                score[EG] += sign * self.params.bishop_pair[EG];
            }

            // 自駒のある升と相手のポーンの利きは機動力に数えない
            let area: Bitboard = !(pos.pieces_c(c)
                | pawn_attacks_bb(!c, pos.pieces(!c, PieceType::Pawn)));

            for (i, &pt) in MOBILITY_PIECES.iter().enumerate() {
                for sq in pos.pieces(c, pt) {
                    let count = (attacks_bb(pt, sq, occupied) & area).count() as i32;
                    let delta = count - MOBILITY_BASE[i];
                    score[MG] += sign * delta * self.params.mobility[i][MG];
                    score[EG] += sign * delta * self.params.mobility[i][EG];
                }
            }
        }
        score
    }
}

impl Evaluator for MaterialEvaluator {
    fn evaluate(&self, pos: &Position) -> Value {
        self.evaluate_full(pos).value
    }

    fn evaluate_full(&self, pos: &Position) -> EvalResult {
        let acc = pos.accumulator();
        let positional = self.positional(pos);

        let mg = acc.psq[MG] * self.params.psq_scale / 100 + positional[MG];
        let eg = acc.psq[EG] * self.params.psq_scale / 100 + positional[EG];

        let phase = Self::phase(pos);
        let mut v = (mg * phase + eg * (PHASE_MIDGAME - phase)) / PHASE_MIDGAME;

        if pos.side_to_move() == Color::Black {
            v = -v;
        }
        v += self.params.tempo;

        // 50手ルールカウンタが進むほど0に近づける
        let damping = self.params.shuffle_damping;
        v = v * (damping - pos.rule50_count()) / (damping + 14);

        let bound = Value::MATE_IN_MAX_PLY.raw() - 1;
        EvalResult {
            value: Value::new(v.clamp(-bound, bound)),
            complexity: (mg - eg).abs(),
        }
    }
}

/// パラメータファイルから評価関数を読み込む
pub fn load_evaluator(path: impl AsRef<Path>) -> Result<MaterialEvaluator, EvalError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| EvalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let params: EvalParams = text.parse()?;
    info!("評価関数パラメータを読み込みました: {}", path.display());
    Ok(MaterialEvaluator::with_params(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_eval_is_tempo() {
        let pos = Position::startpos();
        let eval = MaterialEvaluator::new();
        let v = eval.evaluate(&pos);
        // 対称な局面なので手番ボーナス（減衰後）だけが残る
        assert_eq!(v.raw(), 28 * 200 / 214);
    }

    #[test]
    fn test_eval_is_side_relative() {
        // 白がクイーン得
        let white = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1", false).unwrap();
        let black = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 b - - 0 1", false).unwrap();
        let eval = MaterialEvaluator::new();
        assert!(eval.evaluate(&white).raw() > 1000);
        assert!(eval.evaluate(&black).raw() < -1000);
    }

    #[test]
    fn test_phase_bounds() {
        assert_eq!(MaterialEvaluator::phase(&Position::startpos()), PHASE_MIDGAME);
        let pos = Position::from_fen("4k3/pppp4/8/8/8/8/PPPP4/4K3 w - - 0 1", false).unwrap();
        assert_eq!(MaterialEvaluator::phase(&pos), 0);
    }

    #[test]
    fn test_shuffle_damping() {
        let eval = MaterialEvaluator::new();
        let fresh = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1", false).unwrap();
        let stale = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 90 60", false).unwrap();
        assert!(eval.evaluate(&stale).raw() < eval.evaluate(&fresh).raw());
    }

    #[test]
    fn test_params_parse() {
        let text = "# 調整済み\ntempo = 20\nbishop_pair_eg = 70 # 終盤\n\nmobility_rook_mg=4\n";
        let params: EvalParams = text.parse().unwrap();
        assert_eq!(params.tempo, 20);
        assert_eq!(params.bishop_pair, [48, 70]);
        assert_eq!(params.mobility[2], [4, 6]);
    }

    #[test]
    fn test_params_errors() {
        assert!(matches!(
            "tempo 20".parse::<EvalParams>(),
            Err(EvalError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            "\nunknown = 3".parse::<EvalParams>(),
            Err(EvalError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            "tempo = abc".parse::<EvalParams>(),
            Err(EvalError::Parse { .. })
        ));
        assert!(matches!(
            "psq_scale = 0".parse::<EvalParams>(),
            Err(EvalError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_load_evaluator_missing_file() {
        let err = load_evaluator("/nonexistent/rchess-eval.txt").unwrap_err();
        assert!(matches!(err, EvalError::Io { .. }));
    }
}
