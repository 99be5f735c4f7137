//! reqlb — クライアントサイドロードバランサー
//!
//! 送信HTTPリクエストの宛先をエンドポイントプールへ振り分ける。
//! プロセス全体で共有する単一のBalancerインスタンスを管理し、環境変数
//! `REQLB_AUTO_INIT_ENABLED` による自動初期化（[`initialize_if_configured`]）
//! と明示的な手動初期化（[`setup`]）の2つの起動経路を提供する。
//!
//! 自動初期化はデフォルトトランスポートの宛先書き換えまで有効化するが、
//! 手動初期化ではトランスポートの有効化は利用側の責務として残している。

#![warn(missing_docs)]

/// ロードバランサー（エンドポイントプールとラウンドロビン振り分け）
pub mod balancer;

/// 初期化オーケストレーション（自動・手動）
pub mod bootstrap;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// エラー型定義
pub mod error;

/// ヘルスチェック監視
pub mod health;

/// ロギング初期化ユーティリティ
pub mod logging;

/// 送信トランスポート（宛先書き換え）
pub mod transport;

mod current;

pub use balancer::Balancer;
pub use bootstrap::{initialize_if_configured, setup};
pub use error::{LbError, LbResult};
pub use transport::{default_transport, Transport};
