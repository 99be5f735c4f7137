//! エンドポイントヘルスチェッカー
//!
//! プル型ヘルスチェックでエンドポイントの稼働状況を監視する。
//! ワーカーはプールへの弱参照しか持たないため、監視対象のBalancerが
//! 破棄されるとループも止まる。

use crate::balancer::{apply_failure, apply_success, Balancer, Endpoint};
use crate::config::BalancerConfig;
use crate::error::LbResult;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::blocking::Client;
use std::sync::{PoisonError, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// デフォルトのチェック間隔（秒）
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;

/// エンドポイントヘルスチェッカー
///
/// 定期的に各エンドポイントへ `GET {base_url}{health_check_path}` を送信し、
/// 結果に応じて状態とブラックアウトを更新する。
pub struct HealthChecker {
    endpoints: Weak<RwLock<Vec<Endpoint>>>,
    config: BalancerConfig,
    client: Client,
    check_interval_secs: u64,
}

impl HealthChecker {
    /// 指定したBalancerのプールを監視するチェッカーを作成
    pub fn new(balancer: &Balancer) -> Self {
        let config = balancer.config().clone();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.health_check_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoints: balancer.endpoints_weak(),
            config,
            client,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
        }
    }

    /// チェック間隔を設定
    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.check_interval_secs = interval_secs;
        self
    }

    /// バックグラウンドで監視を開始
    pub fn start(self) {
        std::thread::Builder::new()
            .name("reqlb-health".to_string())
            .spawn(move || self.monitor_loop())
            .expect("Failed to spawn health checker thread");
    }

    /// 監視ループ
    fn monitor_loop(&self) {
        info!(
            interval_secs = self.check_interval_secs,
            "Endpoint health checker started"
        );

        loop {
            std::thread::sleep(Duration::from_secs(self.check_interval_secs));
            if self.endpoints.upgrade().is_none() {
                break;
            }
            self.check_all_endpoints();
        }

        debug!("Balancer dropped; health checker stopping");
    }

    /// 全エンドポイントのヘルスチェック
    pub fn check_all_endpoints(&self) {
        let Some(pool) = self.endpoints.upgrade() else {
            return;
        };

        let snapshot: Vec<(Uuid, String)> = pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| (e.id, e.base_url.clone()))
            .collect();

        for (id, base_url) in snapshot {
            let healthy = match self.probe(&base_url) {
                Ok(()) => true,
                Err(err) => {
                    debug!(endpoint_id = %id, base_url = %base_url, error = %err, "Health check failed");
                    false
                }
            };

            let now = Utc::now();
            let blackout = ChronoDuration::seconds(self.config.blackout_secs as i64);
            let mut endpoints = pool.write().unwrap_or_else(PoisonError::into_inner);
            // チェック中にプールから外された可能性がある
            if let Some(endpoint) = endpoints.iter_mut().find(|e| e.id == id) {
                endpoint.last_checked = Some(now);
                if healthy {
                    apply_success(endpoint);
                } else if apply_failure(endpoint, blackout, now) {
                    warn!(
                        endpoint_id = %id,
                        base_url = %base_url,
                        failures = endpoint.consecutive_failures,
                        "Endpoint marked offline by health checker"
                    );
                }
            }
        }
    }

    /// 単一エンドポイントへのプローブ
    fn probe(&self, base_url: &str) -> LbResult<()> {
        let url = format!("{}{}", base_url, self.config.health_check_path);
        self.client.get(url).send()?.error_for_status()?;
        Ok(())
    }
}
