//! check サブコマンド
//!
//! ラウンドを1回だけ実行して終了します。

use crate::scheduler::RoundKind;
use clap::{Args, ValueEnum};

/// check サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Which round to run
    #[arg(value_enum, default_value_t = CheckTarget::All)]
    pub target: CheckTarget,
}

/// 実行対象
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTarget {
    /// HTTP endpoint health checks
    Api,
    /// TLS certificate inspection
    Ssl,
    /// Both rounds
    All,
}

impl CheckTarget {
    /// 実行するラウンド種別
    pub fn rounds(&self) -> &'static [RoundKind] {
        match self {
            Self::Api => &[RoundKind::ApiHealth],
            Self::Ssl => &[RoundKind::SslInspection],
            Self::All => &[RoundKind::ApiHealth, RoundKind::SslInspection],
        }
    }
}
