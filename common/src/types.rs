//! 共通型定義
//!
//! 監視対象・プローブ結果・アラートメッセージのコアデータ型

use crate::error::ProbeError;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// アラートメッセージのタイムスタンプ書式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SECONDS_PER_DAY: f64 = 86_400.0;

/// HTTPヘルスチェック対象
///
/// 設定読み込み時に一度だけ生成され、ラウンド中は読み取り専用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTarget {
    /// ホスト（ドメイン、`host:port` 可）
    pub host: String,
    /// パス（`/` 始まり）
    pub path: String,
    /// `apikey` ヘッダーに載せるAPIキー
    pub api_key: String,
}

impl EndpointTarget {
    /// 新しい対象を作成
    pub fn new(host: impl Into<String>, path: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            api_key: api_key.into(),
        }
    }

    /// プローブ先URLを組み立てる
    pub fn url(&self, scheme: &str) -> String {
        format!("{}://{}{}", scheme, self.host, self.path)
    }
}

/// TLS証明書検査対象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslTarget {
    /// ドメイン
    pub domain: String,
    /// ポート番号
    pub port: u16,
}

impl SslTarget {
    /// 新しい対象を作成
    pub fn new(domain: impl Into<String>, port: u16) -> Self {
        Self {
            domain: domain.into(),
            port,
        }
    }

    /// 接続先アドレス（`domain:port`）
    pub fn address(&self) -> String {
        format!("{}:{}", self.domain, self.port)
    }
}

/// リーフ証明書のメタデータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertInfo {
    /// 発行先（Subject CN）
    pub common_name: String,
    /// 発行者（Issuer CN）
    pub issuer: String,
    /// 有効期限（NotAfter）
    pub expires_at: DateTime<Utc>,
    /// 残り日数（期限切れなら負）
    pub days_remaining: f64,
}

impl CertInfo {
    /// `now` 時点での残り日数を計算して作成
    pub fn from_expiry(
        common_name: impl Into<String>,
        issuer: impl Into<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let days_remaining = (expires_at - now).num_seconds() as f64 / SECONDS_PER_DAY;
        Self {
            common_name: common_name.into(),
            issuer: issuer.into(),
            expires_at,
            days_remaining,
        }
    }

    /// 残り日数が閾値未満か
    pub fn is_expiring(&self, threshold_days: u32) -> bool {
        self.days_remaining < f64::from(threshold_days)
    }

    /// 有効期限をローカル時刻で整形
    pub fn expiry_display(&self) -> String {
        self.expires_at
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

/// HTTPプローブの失敗内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HttpFailure {
    /// 200以外のステータス
    Status(u16),
    /// 送信・タイムアウト・キャンセル
    Error(#[serde(serialize_with = "serialize_display")] ProbeError),
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Error(err) => write!(f, "{}", err),
        }
    }
}

/// プローブ結果
///
/// 1プローブにつき1つだけ生成され、生成後は変更されない。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// HTTP 200
    HealthyHttp {
        /// プローブ先URL
        url: String,
        /// ステータスコード
        status: u16,
    },
    /// 200以外 or 送信エラー
    UnhealthyHttp {
        /// プローブ先URL
        url: String,
        /// 失敗内容
        failure: HttpFailure,
    },
    /// 証明書の残り日数が閾値以上
    CertOk {
        /// ドメイン
        domain: String,
        /// 証明書情報
        cert: CertInfo,
    },
    /// 証明書の残り日数が閾値未満
    CertWarning {
        /// ドメイン
        domain: String,
        /// 証明書情報
        cert: CertInfo,
        /// 判定に使った閾値（日）
        threshold_days: u32,
    },
    /// TLS接続・証明書読み取り失敗
    CertError {
        /// ドメイン
        domain: String,
        /// エラー内容
        #[serde(serialize_with = "serialize_display")]
        error: ProbeError,
    },
}

fn serialize_display<S: serde::Serializer>(err: &ProbeError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

impl ProbeOutcome {
    /// 証明書情報から閾値判定して結果を作る
    pub fn from_certificate(domain: impl Into<String>, cert: CertInfo, threshold_days: u32) -> Self {
        let domain = domain.into();
        if cert.is_expiring(threshold_days) {
            Self::CertWarning {
                domain,
                cert,
                threshold_days,
            }
        } else {
            Self::CertOk { domain, cert }
        }
    }

    /// 正常（HealthyHttp / CertOk）か
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::HealthyHttp { .. } | Self::CertOk { .. })
    }

    /// 対象の表示名（URL or ドメイン）
    pub fn target(&self) -> &str {
        match self {
            Self::HealthyHttp { url, .. } | Self::UnhealthyHttp { url, .. } => url,
            Self::CertOk { domain, .. }
            | Self::CertWarning { domain, .. }
            | Self::CertError { domain, .. } => domain,
        }
    }

    /// 証明書の残り日数（証明書を読めた場合のみ）
    pub fn days_remaining(&self) -> Option<f64> {
        match self {
            Self::CertOk { cert, .. } | Self::CertWarning { cert, .. } => Some(cert.days_remaining),
            _ => None,
        }
    }
}

/// アラートの重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// 障害（HTTP異常・TLS接続失敗）
    Failure,
    /// 予防的警告（証明書期限切れ間近）
    Warning,
}

impl AlertSeverity {
    /// メッセージ先頭に付けるアイコン
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Failure => "❌",
            Self::Warning => "⚠️",
        }
    }
}

/// アラートメッセージ
///
/// ポリシーが生成し、Notifierが一度だけ消費する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    /// 整形済みタイムスタンプ
    pub timestamp: String,
    /// 重要度
    pub severity: AlertSeverity,
    /// 本文
    pub body: String,
}

impl AlertMessage {
    /// 現在時刻で作成
    pub fn new(severity: AlertSeverity, body: impl Into<String>) -> Self {
        Self::at(Local::now(), severity, body)
    }

    /// 指定時刻で作成
    pub fn at(timestamp: DateTime<Local>, severity: AlertSeverity, body: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            severity,
            body: body.into(),
        }
    }

    /// 送信用テキスト（`<icon> <timestamp> : <body>`）
    pub fn text(&self) -> String {
        format!("{} {} : {}", self.severity.icon(), self.timestamp, self.body)
    }
}
