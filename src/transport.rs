//! 送信トランスポート
//!
//! reqwestクライアントをラップし、書き換えが有効な場合は送信リクエストの
//! 宛先を現在のBalancerが選択したエンドポイントへ差し替える。
//! どのBalancerを使うかはリクエストごとに解決されるため、インスタンスが
//! 置き換えられても次のリクエストから自動的に反映される。

use crate::balancer::Balancer;
use crate::current;
use crate::error::{LbError, LbResult};
use once_cell::sync::Lazy;
use reqwest::blocking::{Client, Request, Response};
use reqwest::{Method, Url};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// 接続プールのアイドル維持時間（秒）
const POOL_IDLE_TIMEOUT_SECS: u64 = 60;
/// TCPキープアライブ間隔（秒）
const TCP_KEEPALIVE_SECS: u64 = 30;

static DEFAULT_TRANSPORT: Lazy<Transport> = Lazy::new(Transport::new);

/// プロセス共通のデフォルト送信トランスポートを取得する
pub fn default_transport() -> &'static Transport {
    &DEFAULT_TRANSPORT
}

/// ロードバランス対応の送信トランスポート
pub struct Transport {
    client: Client,
    enabled: AtomicBool,
}

impl Transport {
    /// 新しいトランスポートを作成
    ///
    /// 書き換えは無効の状態で作られる。
    pub fn new() -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            enabled: AtomicBool::new(false),
        }
    }

    /// ロードバランスによる宛先書き換えを有効化する
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        info!("Load balancing enabled on transport");
    }

    /// 宛先書き換えを無効化する
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// 宛先書き換えが有効かどうか
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// GETリクエストを送信する
    pub fn get(&self, url: &str) -> LbResult<Response> {
        let url = Url::parse(url).map_err(|e| LbError::InvalidUrl(format!("{url}: {e}")))?;
        self.execute(Request::new(Method::GET, url))
    }

    /// リクエストを送信する
    ///
    /// 書き換えが有効で、現在のBalancerが振り分け先を返した場合は宛先を
    /// 差し替えたうえで送信し、結果をBalancerへ報告する。書き換えが無効、
    /// Balancer未登録、またはプールが空の場合はそのまま送信する。
    pub fn execute(&self, mut request: Request) -> LbResult<Response> {
        let balancer = if self.is_enabled() {
            current::current()
        } else {
            None
        };
        let Some(balancer) = balancer else {
            return Ok(self.client.execute(request)?);
        };

        match balancer.select_endpoint()? {
            None => Ok(self.client.execute(request)?),
            Some(endpoint) => {
                let rewritten = rewrite_url(request.url(), &endpoint.base_url)?;
                debug!(
                    endpoint_id = %endpoint.id,
                    url = %rewritten,
                    "Routing request to endpoint"
                );
                *request.url_mut() = rewritten;

                match self.client.execute(request) {
                    Ok(response) => {
                        report_outcome(
                            &balancer,
                            endpoint.id,
                            !response.status().is_server_error(),
                        );
                        Ok(response)
                    }
                    Err(err) => {
                        report_outcome(&balancer, endpoint.id, false);
                        Err(err.into())
                    }
                }
            }
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

/// リクエストURLのスキームとオーソリティをエンドポイントのものへ差し替える
fn rewrite_url(original: &Url, base_url: &str) -> LbResult<Url> {
    let base = Url::parse(base_url).map_err(|e| LbError::InvalidUrl(format!("{base_url}: {e}")))?;

    let mut rewritten = original.clone();
    rewritten
        .set_scheme(base.scheme())
        .map_err(|()| LbError::InvalidUrl(base_url.to_string()))?;
    rewritten
        .set_host(base.host_str())
        .map_err(|e| LbError::InvalidUrl(format!("{base_url}: {e}")))?;
    rewritten
        .set_port(base.port())
        .map_err(|()| LbError::InvalidUrl(base_url.to_string()))?;

    Ok(rewritten)
}

/// 送信結果をBalancerへ報告する
///
/// エンドポイントが既にプールから外れていても送信自体は成立しているため、
/// 報告の失敗はログに残すだけにする。
fn report_outcome(balancer: &Balancer, endpoint_id: Uuid, success: bool) {
    let result = if success {
        balancer.report_success(endpoint_id)
    } else {
        balancer.report_failure(endpoint_id)
    };
    if let Err(err) = result {
        debug!(endpoint_id = %endpoint_id, error = %err, "Failed to record request outcome");
    }
}
