//! HTTPヘルスプローブ
//!
//! `GET {scheme}://{host}{path}` に `apikey` ヘッダーを付けて送信し、
//! 200 なら正常、それ以外は異常とみなす。

use api_health_common::config::Settings;
use api_health_common::error::{AgentError, AgentResult, ProbeError};
use api_health_common::types::{EndpointTarget, HttpFailure, ProbeOutcome};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// APIキーを載せるヘッダー名
pub const API_KEY_HEADER: &str = "apikey";

/// HTTPプローブ
///
/// 接続プール付きのクライアントを全プローブで共有する（読み取り専用）。
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
    scheme: String,
    request_timeout: Duration,
}

impl HttpProber {
    /// 設定からプローブを作成
    pub fn new(settings: &Settings) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(settings.connect_timeout())
            .build()
            .map_err(|e| AgentError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            scheme: settings.endpoint_scheme.clone(),
            request_timeout: settings.request_timeout(),
        })
    }

    /// 対象のURL
    pub fn endpoint_url(&self, target: &EndpointTarget) -> String {
        target.url(&self.scheme)
    }

    /// 単一エンドポイントのヘルスチェック
    ///
    /// 送信中に `cancel` が発火した場合は `ProbeError::Cancelled` として異常扱いにする。
    pub async fn check_endpoint(
        &self,
        cancel: &CancellationToken,
        target: &EndpointTarget,
    ) -> ProbeOutcome {
        let url = self.endpoint_url(target);
        debug!(url = %url, "Probing endpoint");

        if cancel.is_cancelled() {
            return unhealthy(url, HttpFailure::Error(ProbeError::Cancelled));
        }

        let request = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &target.api_key)
            .send();

        let result = tokio::select! {
            result = request => result,
            _ = cancel.cancelled() => {
                return unhealthy(url, HttpFailure::Error(ProbeError::Cancelled));
            }
        };

        match result {
            Ok(response) if response.status() == StatusCode::OK => {
                let status = response.status().as_u16();
                info!(url = %url, status, "Endpoint healthy");
                ProbeOutcome::HealthyHttp { url, status }
            }
            Ok(response) => unhealthy(url, HttpFailure::Status(response.status().as_u16())),
            Err(e) if e.is_timeout() => unhealthy(
                url,
                HttpFailure::Error(ProbeError::Timeout(format!(
                    "no response within {:?}",
                    self.request_timeout
                ))),
            ),
            Err(e) => unhealthy(url, HttpFailure::Error(ProbeError::Transport(e.to_string()))),
        }
    }
}

fn unhealthy(url: String, failure: HttpFailure) -> ProbeOutcome {
    warn!(url = %url, failure = %failure, "Endpoint unhealthy");
    ProbeOutcome::UnhealthyHttp { url, failure }
}
