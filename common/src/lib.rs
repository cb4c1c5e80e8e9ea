//! API Health Monitor Common
//!
//! エージェントで共有する設定・エラー・データ型

#![warn(missing_docs)]

/// 実行間隔（固定間隔・cron式）
pub mod cadence;

/// 設定管理
pub mod config;

/// エラー型
pub mod error;

/// 監視対象・プローブ結果・アラートの型定義
pub mod types;
