//! rchess ツール群の共通部品

pub mod common;
