//! コマンドライン引数と局面の組み立て

pub mod options;
pub mod position;

pub use options::{EngineArgs, LimitArgs};
pub use position::setup_position;

/// ログ出力を初期化する（`RUST_LOG` 未指定なら warn 以上）
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();
}
