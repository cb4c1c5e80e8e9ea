//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! 起動時の設定エラーのみが致命的で、プローブ・通知のエラーは
//! ラウンド内で回収されて結果やログに変換される。

use thiserror::Error;

/// Configuration error (fatal at startup)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// 設定ファイルパス
        path: String,
        /// 元のI/Oエラー
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration document
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Semantically invalid configuration
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Probe error
///
/// 個々のプローブ失敗。`ProbeOutcome` に取り込まれ、ラウンド外へは伝播しない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Connection / request transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Request or handshake exceeded its timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Round deadline or shutdown fired while the probe was in flight
    #[error("cancelled by round deadline")]
    Cancelled,

    /// TLS handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Peer certificate missing or unparsable
    #[error("certificate error: {0}")]
    Certificate(String),
}

/// Notification delivery error
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Webhook request could not be sent
    #[error("error sending request: {0}")]
    Transport(String),

    /// Webhook answered with a non-200 status
    #[error("unexpected status code: {0}")]
    Status(u16),

    /// Webhook answered 200 but reported an error in the body
    #[error("webhook rejected message (code {code}): {msg}")]
    Rejected {
        /// レスポンスの `code`
        code: i64,
        /// レスポンスの `msg`
        msg: String,
    },
}

/// Agent error type
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Logging initialization error
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Agent result type
pub type AgentResult<T> = Result<T, AgentError>;
