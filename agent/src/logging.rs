//! ロギング初期化ユーティリティ

use api_health_common::error::{AgentError, AgentResult};
use tracing_subscriber::EnvFilter;

/// ログレベルを指定する環境変数
pub const ENV_LOG_LEVEL: &str = "APIHEALTH_LOG_LEVEL";

const DEFAULT_LOG_LEVEL: &str = "info";

/// tracingサブスクライバーを初期化
///
/// `APIHEALTH_LOG_LEVEL` → `RUST_LOG` → `info` の順にフィルタを決める。
pub fn init() -> AgentResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(resolve_filter())
        .with_target(false)
        .try_init()
        .map_err(|e| AgentError::Logging(e.to_string()))
}

fn resolve_filter() -> EnvFilter {
    std::env::var(ENV_LOG_LEVEL)
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}
