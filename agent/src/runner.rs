//! 同時実行数制限付きラウンドランナー
//!
//! 複数の独立したプローブを、セマフォ（アドミッションゲート）で同時実行数を
//! 制限しながら実行し、結果を集約する。
//!
//! - ラウンド期限またはシャットダウンで子トークンがキャンセルされる
//! - キャンセル後は新しいプローブを投入しない（`skipped`）
//! - 実行中のプローブは自然終了を待つが、`deadline + drain_grace` を過ぎたら中断する（`abandoned`）
//! - 結果の順序は保証しない

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// 期限が `Instant` の表現範囲を超える場合の代替（約30年）
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// ラウンドの制限値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundLimits {
    /// 同時実行数上限（0は1として扱う）
    pub concurrency: usize,
    /// ラウンド期限
    pub deadline: Duration,
    /// 期限後に実行中プローブを待つ猶予
    pub drain_grace: Duration,
}

impl From<&api_health_common::config::RoundConfig> for RoundLimits {
    fn from(config: &api_health_common::config::RoundConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            deadline: config.deadline,
            drain_grace: config.drain_grace,
        }
    }
}

/// ラウンドの実行結果
#[derive(Debug)]
pub struct RoundReport<T> {
    /// 完了したプローブの結果（順不同）
    pub outcomes: Vec<T>,
    /// 投入したプローブ数
    pub admitted: usize,
    /// キャンセルにより投入しなかったプローブ数
    pub skipped: usize,
    /// 投入したが結果を得られなかったプローブ数（猶予切れ・panic）
    pub abandoned: usize,
    /// 所要時間
    pub elapsed: Duration,
}

impl<T> RoundReport<T> {
    /// 全プローブが結果を返したか
    pub fn is_complete(&self) -> bool {
        self.skipped == 0 && self.abandoned == 0
    }
}

/// プローブ群を同時実行数制限付きで実行する
///
/// `probe` には各アイテムとラウンドのキャンセルトークンが渡される。
/// プローブ側はトークンを監視して早期に結果を返してよい。
pub async fn run_round<I, T, F, Fut>(
    items: Vec<I>,
    limits: &RoundLimits,
    shutdown: &CancellationToken,
    probe: F,
) -> RoundReport<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I, CancellationToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let started = Instant::now();
    let deadline = deadline_after(started, limits.deadline);
    let total = items.len();

    let cancel = shutdown.child_token();
    let timer = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            sleep_until(deadline).await;
            cancel.cancel();
        }
    });

    let gate = Arc::new(Semaphore::new(limits.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut admitted = 0usize;

    for item in items {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = gate.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        admitted += 1;
        let unit = probe(item, cancel.clone());
        tasks.spawn(async move {
            let output = unit.await;
            drop(permit);
            output
        });
    }

    let skipped = total - admitted;
    if skipped > 0 {
        warn!(skipped, admitted, "Round cancelled before all probes were admitted");
    }

    let mut outcomes = Vec::with_capacity(admitted);
    let mut abandoned = 0usize;
    let drain_deadline = deadline_after(deadline, limits.drain_grace);

    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(Ok(output)) => outcomes.push(output),
                Some(Err(e)) => {
                    error!("Probe task join error: {}", e);
                    abandoned += 1;
                }
                None => break,
            },
            _ = sleep_until(drain_deadline) => {
                let remaining = tasks.len();
                warn!(remaining, "Drain grace exceeded, aborting in-flight probes");
                abandoned += remaining;
                tasks.abort_all();
                break;
            }
        }
    }

    timer.abort();

    let elapsed = started.elapsed();
    debug!(
        total,
        completed = outcomes.len(),
        skipped,
        abandoned,
        elapsed_ms = elapsed.as_millis() as u64,
        "Round finished"
    );

    RoundReport {
        outcomes,
        admitted,
        skipped,
        abandoned,
        elapsed,
    }
}

fn deadline_after(base: Instant, offset: Duration) -> Instant {
    base.checked_add(offset)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}
