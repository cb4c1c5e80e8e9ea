//! ラウンドスケジューラ
//!
//! 種別ごとにティッカータスクを起動し、実行時刻になったら [`RoundKind`] を
//! チャネルへ送る。ラウンドの実行自体は受信側（[`crate::monitor::Monitor::run`]）が担う。

pub use api_health_common::cadence::Cadence;

use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// ラウンド種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundKind {
    /// APIヘルスチェック
    ApiHealth,
    /// SSL証明書検査
    SslInspection,
}

impl RoundKind {
    /// ログ用の名前
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiHealth => "api_health",
            Self::SslInspection => "ssl_inspection",
        }
    }
}

impl fmt::Display for RoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 種別ごとの実行間隔を保持するスケジューラ
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<(RoundKind, Cadence)>,
}

impl Scheduler {
    /// 空のスケジューラ
    pub fn new() -> Self {
        Self::default()
    }

    /// 種別と実行間隔を登録
    pub fn every(mut self, kind: RoundKind, cadence: Cadence) -> Self {
        self.entries.push((kind, cadence));
        self
    }

    /// ティッカータスクを起動する
    ///
    /// `shutdown` がキャンセルされるか受信側が閉じると各タスクは終了する。
    pub fn spawn(
        self,
        tx: mpsc::Sender<RoundKind>,
        shutdown: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        self.entries
            .into_iter()
            .map(|(kind, cadence)| {
                let tx = tx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { tick_loop(kind, cadence, tx, shutdown).await })
            })
            .collect()
    }
}

async fn tick_loop(
    kind: RoundKind,
    cadence: Cadence,
    tx: mpsc::Sender<RoundKind>,
    shutdown: CancellationToken,
) {
    info!(round = %kind, cadence = ?cadence, "Scheduler started");

    // cron は直前の発火時刻より後を基準にして同じ時刻の二重発火を防ぐ
    let mut last_fire: Option<DateTime<Local>> = None;

    loop {
        let Some(wait) = next_wait(&cadence, Local::now(), last_fire) else {
            warn!(round = %kind, "Schedule has no upcoming run, ticker stopped");
            return;
        };
        if let Cadence::Cron(_) = cadence {
            last_fire = chrono::Duration::from_std(wait)
                .ok()
                .map(|d| Local::now() + d);
        }
        debug!(round = %kind, wait_ms = wait.as_millis() as u64, "Next round scheduled");

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            sent = tx.send(kind) => {
                if sent.is_err() {
                    debug!(round = %kind, "Round receiver closed");
                    break;
                }
            }
        }
    }

    info!(round = %kind, "Scheduler stopped");
}

fn next_wait(
    cadence: &Cadence,
    now: DateTime<Local>,
    last_fire: Option<DateTime<Local>>,
) -> Option<Duration> {
    match last_fire {
        Some(last) if last >= now => {
            let delay = cadence.next_delay(&last)?;
            let ahead = (last - now).to_std().unwrap_or(Duration::ZERO);
            Some(ahead + delay)
        }
        _ => cadence.next_delay(&now),
    }
}
