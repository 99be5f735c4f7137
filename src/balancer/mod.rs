//! ロードバランサーモジュール
//!
//! エンドポイントプールの管理とラウンドロビンによる振り分け先選択を提供する。
//! ヘルスチェックと送信結果のフィードバックに基づき、失敗が続いた
//! エンドポイントを一定時間ブラックアウトして振り分けから除外する。

pub mod types;

pub use types::{Endpoint, EndpointStatus};

use crate::config::BalancerConfig;
use crate::error::{LbError, LbResult};
use crate::health::HealthChecker;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, PoisonError, RwLock, Weak,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// BalancerインスタンスIDの採番カウンタ
static NEXT_BALANCER_ID: AtomicU64 = AtomicU64::new(1);

/// オフライン判定までの連続失敗回数
pub(crate) const CONSECUTIVE_FAILURES_FOR_OFFLINE: u32 = 2;

/// クライアントサイドロードバランサー
///
/// クローンはすべて同じ内部状態を共有する。プロセス全体で「現在の」
/// インスタンスとして共有する方法は [`crate::bootstrap`] を参照。
#[derive(Clone)]
pub struct Balancer {
    instance_id: u64,
    config: BalancerConfig,
    endpoints: Arc<RwLock<Vec<Endpoint>>>,
    rotation: Arc<AtomicUsize>,
    started: Arc<AtomicBool>,
}

impl Balancer {
    /// 環境変数から構成した新しいBalancerを作成
    ///
    /// エンドポイントプールは `REQLB_ENDPOINTS`（ベースURLのカンマ区切り）
    /// から初期化される。
    pub fn new() -> Self {
        let balancer = Self::with_config(BalancerConfig::from_env());
        if let Some(list) = crate::config::env_var("ENDPOINTS") {
            for url in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                balancer.add_endpoint(url);
            }
        }
        balancer
    }

    /// 指定した設定で新しいBalancerを作成
    pub fn with_config(config: BalancerConfig) -> Self {
        Self {
            instance_id: NEXT_BALANCER_ID.fetch_add(1, Ordering::SeqCst),
            config,
            endpoints: Arc::new(RwLock::new(Vec::new())),
            rotation: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// プロセス内で一意なインスタンスID
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// このBalancerの設定
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// エンドポイントをプールに追加
    pub fn add_endpoint(&self, base_url: impl Into<String>) -> Uuid {
        let endpoint = Endpoint::new(base_url);
        let id = endpoint.id;
        debug!(endpoint_id = %id, base_url = %endpoint.base_url, "Endpoint added to pool");
        self.write_endpoints().push(endpoint);
        id
    }

    /// 現在のエンドポイント一覧のスナップショット
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.read_endpoints().clone()
    }

    /// プール内のエンドポイント数
    pub fn endpoint_count(&self) -> usize {
        self.read_endpoints().len()
    }

    /// 振り分け先エンドポイントを選択する
    ///
    /// ブラックアウト中でないエンドポイントをラウンドロビンで返す。
    /// プールが空の場合は `Ok(None)`（呼び出し側は素通しできる）。
    /// プールに登録があるのに全てブラックアウト中の場合は
    /// [`LbError::NoEndpointsAvailable`]。
    pub fn select_endpoint(&self) -> LbResult<Option<Endpoint>> {
        let now = Utc::now();
        let endpoints = self.read_endpoints();
        if endpoints.is_empty() {
            return Ok(None);
        }

        let eligible: Vec<&Endpoint> = endpoints.iter().filter(|e| !e.in_blackout(now)).collect();
        if eligible.is_empty() {
            return Err(LbError::NoEndpointsAvailable);
        }

        let index = self.rotation.fetch_add(1, Ordering::SeqCst) % eligible.len();
        Ok(Some(eligible[index].clone()))
    }

    /// エンドポイントへの送信成功を記録する
    ///
    /// 連続失敗回数をリセットし、ブラックアウトを解除する。
    pub fn report_success(&self, id: Uuid) -> LbResult<()> {
        let mut endpoints = self.write_endpoints();
        let endpoint = endpoints
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LbError::EndpointNotFound(id))?;
        apply_success(endpoint);
        Ok(())
    }

    /// エンドポイントへの送信失敗を記録する
    ///
    /// 連続失敗回数が閾値に達した場合はオフラインにし、設定された時間だけ
    /// ブラックアウトする。
    pub fn report_failure(&self, id: Uuid) -> LbResult<()> {
        let now = Utc::now();
        let blackout = ChronoDuration::seconds(self.config.blackout_secs as i64);
        let mut endpoints = self.write_endpoints();
        let endpoint = endpoints
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LbError::EndpointNotFound(id))?;
        if apply_failure(endpoint, blackout, now) {
            warn!(
                endpoint_id = %id,
                base_url = %endpoint.base_url,
                failures = endpoint.consecutive_failures,
                blackout_secs = self.config.blackout_secs,
                "Endpoint blacked out after consecutive failures"
            );
        }
        Ok(())
    }

    /// バックグラウンドのヘルスチェックを開始する
    ///
    /// インスタンスごとに一度だけ有効。二回目以降の呼び出しは無視される。
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(
                instance_id = self.instance_id,
                "Balancer already started; ignoring"
            );
            return;
        }

        HealthChecker::new(self)
            .with_interval(self.config.health_check_interval_secs)
            .start();

        info!(
            instance_id = self.instance_id,
            endpoints = self.endpoint_count(),
            "Balancer started"
        );
    }

    /// [`Balancer::start`] 済みかどうか
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// ヘルスチェッカーがBalancerの生存を追跡するための弱参照
    pub(crate) fn endpoints_weak(&self) -> Weak<RwLock<Vec<Endpoint>>> {
        Arc::downgrade(&self.endpoints)
    }

    fn read_endpoints(&self) -> std::sync::RwLockReadGuard<'_, Vec<Endpoint>> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_endpoints(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Endpoint>> {
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Balancer {
    fn default() -> Self {
        Self::new()
    }
}

/// 成功を記録してエンドポイントを稼働中に戻す
pub(crate) fn apply_success(endpoint: &mut Endpoint) {
    endpoint.consecutive_failures = 0;
    endpoint.status = EndpointStatus::Online;
    endpoint.blackout_until = None;
}

/// 失敗を記録する
///
/// 連続失敗回数が閾値に達したらオフラインにしてブラックアウト期限を設定し、
/// `true` を返す。
pub(crate) fn apply_failure(
    endpoint: &mut Endpoint,
    blackout: ChronoDuration,
    now: DateTime<Utc>,
) -> bool {
    endpoint.consecutive_failures += 1;
    if endpoint.consecutive_failures >= CONSECUTIVE_FAILURES_FOR_OFFLINE {
        endpoint.status = EndpointStatus::Offline;
        endpoint.blackout_until = Some(now + blackout);
        true
    } else {
        false
    }
}
