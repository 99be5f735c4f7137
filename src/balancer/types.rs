//! エンドポイント型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// エンドポイントの状態
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    /// 初期状態（未確認）
    #[default]
    Pending,
    /// 稼働中
    Online,
    /// 停止中
    Offline,
}

impl EndpointStatus {
    /// EndpointStatusを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for EndpointStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "online" => Self::Online,
            "offline" => Self::Offline,
            _ => Self::Pending,
        })
    }
}

impl std::fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 振り分け対象のエンドポイント
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// エンドポイントID
    pub id: Uuid,
    /// ベースURL（例: "http://10.0.0.5:8080"）
    pub base_url: String,
    /// 現在の状態
    pub status: EndpointStatus,
    /// 連続失敗回数
    pub consecutive_failures: u32,
    /// 最終ヘルスチェック日時
    pub last_checked: Option<DateTime<Utc>>,
    /// この日時までリクエストの振り分けから除外する
    pub blackout_until: Option<DateTime<Utc>>,
}

impl Endpoint {
    /// 新しいエンドポイントを作成
    ///
    /// 末尾のスラッシュはパス結合時の二重スラッシュを避けるため取り除く。
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            id: Uuid::new_v4(),
            base_url: base_url.trim_end_matches('/').to_string(),
            status: EndpointStatus::default(),
            consecutive_failures: 0,
            last_checked: None,
            blackout_until: None,
        }
    }

    /// ブラックアウト期間中かどうか
    pub fn in_blackout(&self, now: DateTime<Utc>) -> bool {
        self.blackout_until.map_or(false, |until| now < until)
    }
}
