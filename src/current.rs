//! プロセス全体で共有する「現在の」Balancerインスタンス
//!
//! 共有インスタンスの参照と置き換えは必ずこのモジュールのアクセサを経由する。
//! テストが既知の初期状態から実行できるよう、インスタンスは何度でも
//! 置き換えられる（最後に書き込んだ側が勝つ）。

use crate::balancer::Balancer;
use once_cell::sync::Lazy;
use std::sync::{PoisonError, RwLock};

static CURRENT: Lazy<RwLock<Option<Balancer>>> = Lazy::new(|| RwLock::new(None));

/// 新しいインスタンスを「現在の」インスタンスとして登録する
///
/// 既存のインスタンスは無条件で置き換えられる。チェーンできるよう
/// 登録したインスタンスをそのまま返す。
pub(crate) fn install(balancer: Balancer) -> Balancer {
    let mut current = CURRENT.write().unwrap_or_else(PoisonError::into_inner);
    *current = Some(balancer.clone());
    balancer
}

/// 現在のインスタンスを取得する
///
/// 一度も登録されていない場合は `None`。
pub(crate) fn current() -> Option<Balancer> {
    CURRENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// テスト用: 登録済みインスタンスを破棄して初期状態に戻す
#[cfg(test)]
pub(crate) fn reset() {
    let mut current = CURRENT.write().unwrap_or_else(PoisonError::into_inner);
    *current = None;
}
