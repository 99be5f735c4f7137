//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! 初期化とインスタンス管理の操作はエラーを返さない。エラーになり得るのは
//! トランスポート経由の送信とヘルスチェックのみ。

use thiserror::Error;
use uuid::Uuid;

/// load balancer error type
#[derive(Debug, Error)]
pub enum LbError {
    /// No available endpoints
    #[error("No available endpoints")]
    NoEndpointsAvailable,

    /// Endpoint not found
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(Uuid),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// reqlb共通の結果型
pub type LbResult<T> = Result<T, LbError>;
