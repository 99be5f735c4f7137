//! ロギング初期化ユーティリティ

use tracing_subscriber::EnvFilter;

/// ロギングを初期化する
///
/// `RUST_LOG` が設定されていればそれに従い、なければ `info` レベルを使う。
/// すでにグローバルサブスクライバーが設定されている場合は何もしない。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
