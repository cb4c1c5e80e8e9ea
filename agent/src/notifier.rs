//! 通知ポート
//!
//! アラートメッセージのベストエフォート配送。配送失敗は呼び出し側でログに残すだけで、
//! ラウンドの完了や他のアラートには影響させない。

use api_health_common::error::NotifyError;
use api_health_common::types::AlertMessage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// アラートの送信先
#[async_trait]
pub trait Notifier: Send + Sync {
    /// メッセージを1件送信する
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotifyError>;
}

/// Feishu互換Webhook通知
///
/// `{"msg_type":"text","content":{"text": "<icon> <timestamp> : <body>"}}` をPOSTする。
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

/// Webhookレスポンス（200でも本文にエラーが入る場合がある）
#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

impl WebhookNotifier {
    /// 送信タイムアウトを指定して作成
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, webhook_url))
    }

    /// 既存のクライアントを使って作成
    pub fn with_client(client: Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    /// 送信ペイロード
    pub fn payload(message: &AlertMessage) -> serde_json::Value {
        json!({
            "msg_type": "text",
            "content": {
                "text": message.text(),
            }
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(message))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(NotifyError::Status(status.as_u16()));
        }

        // 本文が読めない・JSONでない場合は成功扱い
        if let Ok(body) = response.json::<WebhookResponse>().await {
            if body.code != 0 {
                return Err(NotifyError::Rejected {
                    code: body.code,
                    msg: body.msg,
                });
            }
        }

        debug!(severity = ?message.severity, "Alert delivered");
        Ok(())
    }
}

/// ログ出力のみの通知（Webhook未設定時）
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        warn!(severity = ?message.severity, "{}", message.text());
        Ok(())
    }
}
