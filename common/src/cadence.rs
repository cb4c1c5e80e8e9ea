//! ラウンドの実行間隔
//!
//! `@every 30s` 形式の固定間隔と、秒フィールド付きcron式（`0 20 9 * * *`）を扱う。

use crate::error::ConfigError;
use chrono::{DateTime, TimeZone};
use std::str::FromStr;
use std::time::Duration;

/// 実行間隔
#[derive(Debug, Clone)]
pub enum Cadence {
    /// 固定間隔
    Every(Duration),
    /// cron式（秒フィールド付き）
    Cron(Box<cron::Schedule>),
}

impl Cadence {
    /// 設定文字列を解釈する
    ///
    /// - `@every 1h30m` / `30s` → 固定間隔
    /// - `0 20 9 * * *` / `@daily` → cron
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(ConfigError::Validation("schedule must not be empty".into()));
        }

        if let Some(rest) = expr.strip_prefix("@every") {
            return parse_duration(rest.trim()).map(Self::Every);
        }

        if expr.starts_with(|c: char| c.is_ascii_digit()) && !expr.contains(' ') {
            return parse_duration(expr).map(Self::Every);
        }

        cron::Schedule::from_str(expr)
            .map(|schedule| Self::Cron(Box::new(schedule)))
            .map_err(|e| ConfigError::Validation(format!("invalid schedule '{}': {}", expr, e)))
    }

    /// `now` から次回実行までの待ち時間
    ///
    /// cron式に次回が存在しない場合は `None`。
    pub fn next_delay<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<Duration> {
        match self {
            Self::Every(period) => Some(*period),
            Self::Cron(schedule) => schedule
                .after(now)
                .next()
                .map(|next| (next - now.clone()).to_std().unwrap_or(Duration::ZERO)),
        }
    }
}

/// `1h30m` / `45s` / `2d` 形式の期間を解釈する
///
/// 単位なしの数値は秒として扱う。
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let input = input.trim();
    let parsed = if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        input
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| e.to_string())
    } else {
        humantime::parse_duration(input).map_err(|e| e.to_string())
    };
    let duration = parsed
        .map_err(|e| ConfigError::Validation(format!("invalid duration '{}': {}", input, e)))?;

    if duration.is_zero() {
        return Err(ConfigError::Validation(format!(
            "duration '{}' must be greater than zero",
            input
        )));
    }
    Ok(duration)
}
