//! API Health Monitor Agent
//!
//! HTTPエンドポイントの死活監視とTLS証明書の期限検査を定期実行するエージェント

#![warn(missing_docs)]

/// コマンドライン引数
pub mod cli;

/// ロギング初期化
pub mod logging;

/// ラウンドの組み立てと実行
pub mod monitor;

/// アラート通知（Webhook / ログ）
pub mod notifier;

/// アラート判定
pub mod policy;

/// HTTP・TLSプローブ
pub mod probe;

/// 同時実行数制限付きラウンドランナー
pub mod runner;

/// ラウンドスケジューラ
pub mod scheduler;

pub use monitor::{Monitor, RoundSummary};
pub use scheduler::{RoundKind, Scheduler};
