//! 初期化オーケストレーション
//!
//! 環境変数による自動初期化と、明示的な手動初期化（[`setup`]）の2つの
//! 入口を提供する。どちらも新しい [`Balancer`] を構築してプロセス共通の
//! 現在インスタンスとして登録し、起動する。同じ初期化判断に対して
//! 2つのインスタンスが並行して登録・起動されることはない。

use crate::balancer::Balancer;
use crate::transport::default_transport;
use crate::{config, current};
use tracing::{debug, info};

/// 環境変数で構成されている場合に自動初期化を実行する
///
/// アプリケーションは自身の起動処理の先頭でこの関数を一度呼び出す。
/// `REQLB_AUTO_INIT_ENABLED` が偽（未設定・解釈不能を含む）の場合は
/// 何もせず `None` を返す。真の場合は新しい [`Balancer`] を構築して
/// 現在のインスタンスとして登録し、デフォルトトランスポートの宛先
/// 書き換えを有効化してからインスタンスを起動し、それを返す。
///
/// 登録は有効化・起動より先に行われる。そのため並行して現在の
/// インスタンスを参照した場合、まだ起動していないインスタンスが
/// 見えることがある。「登録済み」は「起動済み」を意味しない。
pub fn initialize_if_configured() -> Option<Balancer> {
    if !config::is_auto_init_enabled() {
        debug!("Auto-init disabled; skipping balancer bootstrap");
        return None;
    }
    Some(bootstrap_default())
}

/// 自動初期化の本体
///
/// テストが既知の初期状態を作り直せるよう分離されており、繰り返し
/// 呼ばれるたびに前のインスタンスを完全に置き換える。
fn bootstrap_default() -> Balancer {
    let balancer = current::install(Balancer::new());
    default_transport().enable();
    balancer.start();

    info!(
        instance_id = balancer.instance_id(),
        "Balancer auto-initialized"
    );
    balancer
}

/// 手動で初期化する
///
/// 自動初期化が構成されている場合は（まだ実行されていなくても）二重
/// 登録を防ぐため何もしない。それ以外の場合は新しい [`Balancer`] を
/// 構築・登録・起動する。呼び出すたびに前のインスタンスは置き換え
/// られる。
///
/// 自動初期化と異なり、トランスポートの宛先書き換えは有効化しない。
/// [`crate::transport::Transport::enable`] を呼ぶのは利用側の責務となる。
pub fn setup() {
    if config::is_auto_init_enabled() {
        debug!("Auto-init enabled; manual setup skipped");
        return;
    }

    let balancer = current::install(Balancer::new());
    balancer.start();

    info!(
        instance_id = balancer.instance_id(),
        "Balancer initialized via manual setup"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var("REQLB_AUTO_INIT_ENABLED");
        std::env::remove_var("REQLB_ENDPOINTS");
    }

    fn reset_globals() {
        current::reset();
        default_transport().disable();
    }

    #[test]
    #[serial]
    fn auto_init_installs_enables_and_starts_when_flag_is_true() {
        clear_env();
        reset_globals();
        std::env::set_var("REQLB_AUTO_INIT_ENABLED", "true");

        let balancer = initialize_if_configured().expect("auto-init should run");

        let installed = current::current().expect("an instance was installed");
        assert_eq!(installed.instance_id(), balancer.instance_id());
        assert!(balancer.is_started());
        assert!(default_transport().is_enabled());

        clear_env();
        reset_globals();
    }

    #[test]
    #[serial]
    fn auto_init_does_nothing_when_flag_is_unset() {
        clear_env();
        reset_globals();

        assert!(initialize_if_configured().is_none());
        assert!(current::current().is_none());
        assert!(!default_transport().is_enabled());
    }

    #[test]
    #[serial]
    fn auto_init_treats_malformed_flag_as_disabled() {
        clear_env();
        reset_globals();
        std::env::set_var("REQLB_AUTO_INIT_ENABLED", "definitely");

        assert!(initialize_if_configured().is_none());
        assert!(current::current().is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn repeated_auto_init_replaces_the_previous_instance() {
        clear_env();
        reset_globals();
        std::env::set_var("REQLB_AUTO_INIT_ENABLED", "true");

        let first = initialize_if_configured().expect("first auto-init");
        let second = initialize_if_configured().expect("second auto-init");

        assert_ne!(first.instance_id(), second.instance_id());
        let installed = current::current().expect("an instance was installed");
        assert_eq!(installed.instance_id(), second.instance_id());

        clear_env();
        reset_globals();
    }

    #[test]
    #[serial]
    fn setup_is_a_no_op_while_auto_init_is_configured() {
        clear_env();
        reset_globals();
        std::env::set_var("REQLB_AUTO_INIT_ENABLED", "true");

        let auto = initialize_if_configured().expect("auto-init should run");
        default_transport().disable();

        setup();

        // ストアは変わらず、enableも呼び直されない
        let installed = current::current().expect("an instance was installed");
        assert_eq!(installed.instance_id(), auto.instance_id());
        assert!(!default_transport().is_enabled());

        clear_env();
        reset_globals();
    }

    #[test]
    #[serial]
    fn setup_guard_trips_even_before_auto_init_has_run() {
        clear_env();
        reset_globals();
        std::env::set_var("REQLB_AUTO_INIT_ENABLED", "true");

        setup();

        assert!(current::current().is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn setup_installs_and_starts_without_touching_the_transport() {
        clear_env();
        reset_globals();

        setup();

        let installed = current::current().expect("setup installs an instance");
        assert!(installed.is_started());
        assert!(!default_transport().is_enabled());

        reset_globals();
    }

    #[test]
    #[serial]
    fn setup_twice_installs_two_distinct_instances() {
        clear_env();
        reset_globals();

        setup();
        let first = current::current().expect("first setup installed");
        setup();
        let second = current::current().expect("second setup installed");

        assert_ne!(first.instance_id(), second.instance_id());
        assert!(first.is_started());
        assert!(second.is_started());

        reset_globals();
    }

    #[test]
    #[serial]
    fn setup_runs_when_flag_is_explicitly_false() {
        clear_env();
        reset_globals();
        std::env::set_var("REQLB_AUTO_INIT_ENABLED", "false");

        setup();

        assert!(current::current().is_some());

        clear_env();
        reset_globals();
    }

    #[test]
    #[serial]
    fn auto_init_seeds_endpoints_from_env() {
        clear_env();
        reset_globals();
        std::env::set_var("REQLB_AUTO_INIT_ENABLED", "on");
        std::env::set_var(
            "REQLB_ENDPOINTS",
            "http://10.0.0.1:8080,http://10.0.0.2:8080",
        );

        let balancer = initialize_if_configured().expect("auto-init should run");
        assert_eq!(balancer.endpoint_count(), 2);

        clear_env();
        reset_globals();
    }
}
