//! Configuration management via environment variables
//!
//! All reqlb settings come from `REQLB_`-prefixed environment variables.
//! Provides the prefix-concatenation helpers, the auto-init flag reader and
//! the balancer configuration struct.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Prefix shared by every reqlb environment variable.
pub const ENV_PREFIX: &str = "REQLB_";

/// Read a reqlb environment variable by suffix.
///
/// The full variable name is [`ENV_PREFIX`] concatenated with `suffix`.
///
/// # Returns
/// * `Some(value)` - The environment variable value
/// * `None` - The variable is not set
pub fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

/// Read a reqlb environment variable, parsing to a specific type.
///
/// Returns `default` if the variable is unset or fails to parse.
pub fn env_parse<T: std::str::FromStr>(suffix: &str, default: T) -> T {
    env_var(suffix)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// 自動初期化フラグを取得
///
/// 環境変数 `REQLB_AUTO_INIT_ENABLED` が真偽値として解釈できる場合はその値を返す。
/// 未設定の場合は `false`。設定されているが解釈できない値の場合は警告ログを
/// 出して `false` を返す（無効側に倒す）。
///
/// 値は呼び出しのたびに環境変数から読み直され、キャッシュされない。
pub fn is_auto_init_enabled() -> bool {
    match env_var("AUTO_INIT_ENABLED") {
        None => false,
        Some(raw) => match parse_bool(&raw) {
            Some(flag) => flag,
            None => {
                warn!(
                    value = %raw,
                    "Failed to parse REQLB_AUTO_INIT_ENABLED as a boolean; auto-init stays disabled"
                );
                false
            }
        },
    }
}

/// Parse common textual boolean representations.
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Balancer設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// ヘルスチェック間隔（秒）(デフォルト: 30)
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// ヘルスチェックのタイムアウト（秒）(デフォルト: 5)
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_secs: u64,

    /// ヘルスチェックのリクエストパス (デフォルト: "/health")
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,

    /// 失敗が続いたエンドポイントを振り分けから除外する時間（秒）(デフォルト: 60)
    #[serde(default = "default_blackout")]
    pub blackout_secs: u64,
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_health_check_timeout() -> u64 {
    5
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_blackout() -> u64 {
    60
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: default_health_check_interval(),
            health_check_timeout_secs: default_health_check_timeout(),
            health_check_path: default_health_check_path(),
            blackout_secs: default_blackout(),
        }
    }
}

impl BalancerConfig {
    /// Load balancer configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            health_check_interval_secs: env_parse(
                "HEALTH_CHECK_INTERVAL_SECS",
                default_health_check_interval(),
            ),
            health_check_timeout_secs: env_parse(
                "HEALTH_CHECK_TIMEOUT_SECS",
                default_health_check_timeout(),
            ),
            health_check_path: env_var("HEALTH_CHECK_PATH")
                .unwrap_or_else(default_health_check_path),
            blackout_secs: env_parse("BLACKOUT_SECS", default_blackout()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_var_concatenates_prefix() {
        std::env::set_var("REQLB_TEST_SUFFIX", "value");

        assert_eq!(env_var("TEST_SUFFIX"), Some("value".to_string()));

        std::env::remove_var("REQLB_TEST_SUFFIX");
        assert_eq!(env_var("TEST_SUFFIX"), None);
    }

    #[test]
    #[serial]
    fn env_parse_returns_default_on_unset_or_garbage() {
        std::env::remove_var("REQLB_TEST_PARSE");
        assert_eq!(env_parse("TEST_PARSE", 7u64), 7);

        std::env::set_var("REQLB_TEST_PARSE", "not-a-number");
        assert_eq!(env_parse("TEST_PARSE", 7u64), 7);

        std::env::set_var("REQLB_TEST_PARSE", "42");
        assert_eq!(env_parse("TEST_PARSE", 7u64), 42);

        std::env::remove_var("REQLB_TEST_PARSE");
    }

    #[test]
    #[serial]
    fn auto_init_defaults_to_disabled_when_unset() {
        std::env::remove_var("REQLB_AUTO_INIT_ENABLED");
        assert!(!is_auto_init_enabled());
    }

    #[test]
    #[serial]
    fn auto_init_parses_true_values() {
        for value in ["true", "TRUE", "True", "1", "t", "yes", "on"] {
            std::env::set_var("REQLB_AUTO_INIT_ENABLED", value);
            assert!(is_auto_init_enabled(), "{value} should enable auto-init");
        }
        std::env::remove_var("REQLB_AUTO_INIT_ENABLED");
    }

    #[test]
    #[serial]
    fn auto_init_parses_false_values() {
        for value in ["false", "FALSE", "0", "f", "no", "off"] {
            std::env::set_var("REQLB_AUTO_INIT_ENABLED", value);
            assert!(!is_auto_init_enabled(), "{value} should disable auto-init");
        }
        std::env::remove_var("REQLB_AUTO_INIT_ENABLED");
    }

    #[test]
    #[serial]
    fn auto_init_treats_garbage_as_disabled() {
        std::env::set_var("REQLB_AUTO_INIT_ENABLED", "banana");
        assert!(!is_auto_init_enabled());
        std::env::remove_var("REQLB_AUTO_INIT_ENABLED");
    }

    #[test]
    fn parse_bool_rejects_unknown_values() {
        assert_eq!(parse_bool("enabled"), None);
        assert_eq!(parse_bool(""), None);
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    #[serial]
    fn balancer_config_defaults() {
        std::env::remove_var("REQLB_HEALTH_CHECK_INTERVAL_SECS");
        std::env::remove_var("REQLB_HEALTH_CHECK_TIMEOUT_SECS");
        std::env::remove_var("REQLB_HEALTH_CHECK_PATH");
        std::env::remove_var("REQLB_BLACKOUT_SECS");

        let config = BalancerConfig::from_env();

        assert_eq!(config.health_check_interval_secs, 30);
        assert_eq!(config.health_check_timeout_secs, 5);
        assert_eq!(config.health_check_path, "/health");
        assert_eq!(config.blackout_secs, 60);
    }

    #[test]
    #[serial]
    fn balancer_config_reads_overrides_from_env() {
        std::env::set_var("REQLB_HEALTH_CHECK_INTERVAL_SECS", "5");
        std::env::set_var("REQLB_HEALTH_CHECK_PATH", "/v1/models");
        std::env::set_var("REQLB_BLACKOUT_SECS", "120");

        let config = BalancerConfig::from_env();

        assert_eq!(config.health_check_interval_secs, 5);
        assert_eq!(config.health_check_path, "/v1/models");
        assert_eq!(config.blackout_secs, 120);

        std::env::remove_var("REQLB_HEALTH_CHECK_INTERVAL_SECS");
        std::env::remove_var("REQLB_HEALTH_CHECK_PATH");
        std::env::remove_var("REQLB_BLACKOUT_SECS");
    }
}
