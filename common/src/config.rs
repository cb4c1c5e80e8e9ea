//! 設定管理
//!
//! YAML設定ファイルの読み込み・環境変数による上書き・検証

use crate::cadence::Cadence;
use crate::error::ConfigError;
use crate::types::{EndpointTarget, SslTarget};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Webhook URLを上書きする環境変数
pub const ENV_WEBHOOK_URL: &str = "APIHEALTH_WEBHOOK_URL";

/// 障害通知フラグを上書きする環境変数
pub const ENV_NOTIFY_ON_FAILURE: &str = "APIHEALTH_NOTIFY_ON_FAILURE";

/// タイムアウト系設定の上限（秒）
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// 監視エージェント全体の設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 実行間隔・タイムアウト
    #[serde(default)]
    pub settings: Settings,

    /// 通知先（Feishu互換Webhook）
    #[serde(default)]
    pub feishu: FeishuConfig,

    /// ホスト → エンドポイント一覧
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,

    /// 証明書検査対象
    #[serde(default)]
    pub ssl: SslConfig,
}

/// 実行間隔・タイムアウト設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// APIヘルスチェック間隔（秒）(デフォルト: 60)
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// リクエストタイムアウト（秒）(デフォルト: 10)
    #[serde(default = "default_curl_timeout")]
    pub curl_timeout: u64,

    /// 接続確立タイムアウト（秒）(デフォルト: 5)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// 証明書検査の実行スケジュール (デフォルト: 毎日 9:20)
    #[serde(default = "default_inspection_interval")]
    pub inspection_interval: String,

    /// APIラウンド全体の期限（秒）。未指定なら `curl_timeout`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_timeout: Option<u64>,

    /// 同時実行数上限。0ならホストの並列度
    #[serde(default)]
    pub max_concurrency: usize,

    /// エンドポイントURLのスキーム (デフォルト: "https")
    #[serde(default = "default_endpoint_scheme")]
    pub endpoint_scheme: String,
}

fn default_check_interval() -> u64 {
    60
}

fn default_curl_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_inspection_interval() -> String {
    "0 20 9 * * *".to_string()
}

fn default_endpoint_scheme() -> String {
    "https".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            curl_timeout: default_curl_timeout(),
            connect_timeout: default_connect_timeout(),
            inspection_interval: default_inspection_interval(),
            round_timeout: None,
            max_concurrency: 0,
            endpoint_scheme: default_endpoint_scheme(),
        }
    }
}

impl Settings {
    /// APIヘルスチェック間隔
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    /// リクエストタイムアウト
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.curl_timeout)
    }

    /// 接続確立タイムアウト
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// APIラウンドの期限
    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout.unwrap_or(self.curl_timeout))
    }

    /// 同時実行数上限（0指定時はホストの並列度）
    pub fn concurrency_limit(&self) -> usize {
        if self.max_concurrency > 0 {
            return self.max_concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// 通知設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeishuConfig {
    /// Webhook URL（空なら通知はログ出力のみ）
    #[serde(default)]
    pub webhook_url: String,

    /// 障害時に通知するか (デフォルト: false)
    #[serde(default)]
    pub notify_on_failure: bool,
}

/// サービス設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// エンドポイント一覧
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// エンドポイント設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// パス
    pub path: String,
    /// APIキー
    #[serde(default)]
    pub apikey: String,
}

/// 証明書検査設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SslConfig {
    /// 警告閾値（日）(デフォルト: 30)
    #[serde(default = "default_warning_days")]
    pub warning_days: u32,

    /// 検査対象ドメイン
    #[serde(default)]
    pub domains: Vec<SslDomainConfig>,
}

fn default_warning_days() -> u32 {
    30
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            warning_days: default_warning_days(),
            domains: Vec::new(),
        }
    }
}

/// 証明書検査対象ドメイン
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SslDomainConfig {
    /// ドメイン
    pub url: String,
    /// ポート番号 (デフォルト: 443)
    #[serde(default = "default_ssl_port")]
    pub port: u16,
}

fn default_ssl_port() -> u16 {
    443
}

/// 1ラウンド分の実行パラメータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundConfig {
    /// 同時実行数上限
    pub concurrency: usize,
    /// ラウンド期限
    pub deadline: Duration,
    /// 期限後に実行中プローブを待つ猶予
    pub drain_grace: Duration,
    /// 障害時に通知するか
    pub notify_on_failure: bool,
    /// 証明書警告閾値（日）
    pub cert_warning_days: u32,
}

impl MonitorConfig {
    /// 設定ファイルを読み込む
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// YAML文字列から読み込む
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: MonitorConfig = serde_yaml::from_str(raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 環境変数による上書き
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
            tracing::debug!("Webhook URL overridden by {}", ENV_WEBHOOK_URL);
            self.feishu.webhook_url = url;
        }
        if let Ok(value) = std::env::var(ENV_NOTIFY_ON_FAILURE) {
            self.feishu.notify_on_failure = matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// 設定値を検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.settings;
        for (name, value) in [
            ("check_interval", settings.check_interval),
            ("curl_timeout", settings.curl_timeout),
            ("connect_timeout", settings.connect_timeout),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "settings.{} must be greater than 0",
                    name
                )));
            }
        }
        if settings.round_timeout == Some(0) {
            return Err(ConfigError::Validation(
                "settings.round_timeout must be greater than 0".into(),
            ));
        }
        for (name, value) in [
            ("curl_timeout", Some(settings.curl_timeout)),
            ("connect_timeout", Some(settings.connect_timeout)),
            ("round_timeout", settings.round_timeout),
        ] {
            if value.is_some_and(|secs| secs > MAX_TIMEOUT_SECS) {
                return Err(ConfigError::Validation(format!(
                    "settings.{} must not exceed {} seconds",
                    name, MAX_TIMEOUT_SECS
                )));
            }
        }
        if !matches!(settings.endpoint_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "settings.endpoint_scheme must be http or https, got '{}'",
                settings.endpoint_scheme
            )));
        }
        Cadence::parse(&settings.inspection_interval)?;

        let webhook = self.feishu.webhook_url.trim();
        if !webhook.is_empty()
            && !(webhook.starts_with("https://") || webhook.starts_with("http://"))
        {
            return Err(ConfigError::Validation(format!(
                "feishu.webhook_url must be an http(s) URL, got '{}'",
                webhook
            )));
        }

        for (host, service) in &self.services {
            if host.trim().is_empty() {
                return Err(ConfigError::Validation("service host must not be empty".into()));
            }
            for endpoint in &service.endpoints {
                if !endpoint.path.starts_with('/') {
                    return Err(ConfigError::Validation(format!(
                        "endpoint path '{}' for {} must start with '/'",
                        endpoint.path, host
                    )));
                }
            }
        }

        if self.ssl.warning_days == 0 {
            return Err(ConfigError::Validation(
                "ssl.warning_days must be greater than 0".into(),
            ));
        }
        for domain in &self.ssl.domains {
            if domain.url.trim().is_empty() || domain.port == 0 {
                return Err(ConfigError::Validation(format!(
                    "invalid ssl target '{}:{}'",
                    domain.url, domain.port
                )));
            }
        }
        Ok(())
    }

    /// 全HTTPプローブ対象（ホスト名順）
    pub fn endpoint_targets(&self) -> Vec<EndpointTarget> {
        self.services
            .iter()
            .flat_map(|(host, service)| {
                service
                    .endpoints
                    .iter()
                    .map(move |ep| EndpointTarget::new(host.clone(), ep.path.clone(), ep.apikey.clone()))
            })
            .collect()
    }

    /// 全証明書検査対象
    pub fn ssl_targets(&self) -> Vec<SslTarget> {
        self.ssl
            .domains
            .iter()
            .map(|d| SslTarget::new(d.url.clone(), d.port))
            .collect()
    }

    /// 証明書検査のスケジュール
    pub fn inspection_cadence(&self) -> Result<Cadence, ConfigError> {
        Cadence::parse(&self.settings.inspection_interval)
    }

    /// ラウンド実行パラメータ
    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            concurrency: self.settings.concurrency_limit(),
            deadline: self.settings.round_timeout(),
            drain_grace: self.settings.request_timeout(),
            notify_on_failure: self.feishu.notify_on_failure,
            cert_warning_days: self.ssl.warning_days,
        }
    }
}
