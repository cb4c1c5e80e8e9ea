//! アラートポリシー
//!
//! プローブ結果からアラートを出すかどうかを判定し、本文を組み立てる。

use api_health_common::types::{AlertMessage, AlertSeverity, HttpFailure, ProbeOutcome};

/// アラート判定ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// 障害（HTTP異常・TLS接続失敗）を通知するか
    pub notify_on_failure: bool,
}

impl AlertPolicy {
    /// 新しいポリシーを作成
    pub fn new(notify_on_failure: bool) -> Self {
        Self { notify_on_failure }
    }

    /// アラートが必要ならメッセージを返す
    ///
    /// - 正常系 → なし
    /// - HTTP異常 / 証明書取得失敗 → `notify_on_failure` が有効なときのみ
    /// - 証明書期限切れ間近 → 常に（予防的な警告のためフラグに依存しない）
    pub fn decide(&self, outcome: &ProbeOutcome) -> Option<AlertMessage> {
        match outcome {
            ProbeOutcome::HealthyHttp { .. } | ProbeOutcome::CertOk { .. } => None,
            ProbeOutcome::UnhealthyHttp { url, failure } => self
                .notify_on_failure
                .then(|| AlertMessage::new(AlertSeverity::Failure, unhealthy_body(url, failure))),
            ProbeOutcome::CertError { domain, error } => self.notify_on_failure.then(|| {
                AlertMessage::new(
                    AlertSeverity::Failure,
                    format!("SSL certificate check failed for {}: {}", domain, error),
                )
            }),
            ProbeOutcome::CertWarning {
                domain,
                cert,
                threshold_days,
            } => Some(AlertMessage::new(
                AlertSeverity::Warning,
                format!(
                    "Warning: SSL certificate for {} expires in {:.0} days (threshold {} days)!\n\
                     Certificate:\n\
                     - Issued to: {}\n\
                     - Issuer: {}\n\
                     - Expires at: {}",
                    domain,
                    cert.days_remaining,
                    threshold_days,
                    cert.common_name,
                    cert.issuer,
                    cert.expiry_display(),
                ),
            )),
        }
    }
}

fn unhealthy_body(url: &str, failure: &HttpFailure) -> String {
    format!("{} is unhealthy ({})", url, failure)
}
