//! ラウンドの組み立てと実行
//!
//! 設定からプローブ・ポリシー・通知先を組み立て、APIヘルスチェックと
//! SSL証明書検査の各ラウンドを実行する。

use crate::notifier::{LogNotifier, Notifier, WebhookNotifier};
use crate::policy::AlertPolicy;
use crate::probe::{HttpProber, TlsInspector};
use crate::runner::{run_round, RoundLimits};
use crate::scheduler::RoundKind;
use api_health_common::config::{MonitorConfig, RoundConfig};
use api_health_common::error::{AgentError, AgentResult};
use api_health_common::types::{AlertMessage, ProbeOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// アラート配送結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDelivery {
    /// アラート不要
    None,
    /// 送信成功
    Sent,
    /// 送信失敗（ログ済み）
    Failed,
}

/// 1ラウンドの集計
#[derive(Debug)]
pub struct RoundSummary {
    /// ラウンド種別
    pub kind: RoundKind,
    /// 得られた結果（順不同）
    pub outcomes: Vec<ProbeOutcome>,
    /// 送信できたアラート数
    pub alerts_sent: usize,
    /// 送信に失敗したアラート数
    pub alerts_failed: usize,
    /// 投入されなかったプローブ数
    pub skipped: usize,
    /// 結果を得られなかったプローブ数
    pub abandoned: usize,
    /// 所要時間
    pub elapsed: Duration,
}

impl RoundSummary {
    /// 正常だった結果の数
    pub fn healthy(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_healthy()).count()
    }

    /// 異常・警告の数
    pub fn unhealthy(&self) -> usize {
        self.outcomes.len() - self.healthy()
    }

    /// 異常・警告があるか、全対象を確認できなかったか
    pub fn has_failures(&self) -> bool {
        self.unhealthy() > 0 || self.skipped > 0 || self.abandoned > 0
    }

    fn record(&mut self, outcome: ProbeOutcome, delivery: AlertDelivery) {
        match delivery {
            AlertDelivery::None => {}
            AlertDelivery::Sent => self.alerts_sent += 1,
            AlertDelivery::Failed => self.alerts_failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// 監視エージェント本体
pub struct Monitor {
    config: Arc<MonitorConfig>,
    http: HttpProber,
    tls: TlsInspector,
    notifier: Arc<dyn Notifier>,
    policy: AlertPolicy,
    round: RoundConfig,
    api_running: AtomicBool,
    ssl_running: AtomicBool,
}

impl Monitor {
    /// 通知先を指定して作成
    pub fn new(config: MonitorConfig, notifier: Arc<dyn Notifier>) -> AgentResult<Self> {
        let http = HttpProber::new(&config.settings)?;
        let tls = TlsInspector::new(config.settings.connect_timeout())?;
        let round = config.round_config();

        Ok(Self {
            policy: AlertPolicy::new(round.notify_on_failure),
            config: Arc::new(config),
            http,
            tls,
            notifier,
            round,
            api_running: AtomicBool::new(false),
            ssl_running: AtomicBool::new(false),
        })
    }

    /// 設定から通知先を選んで作成
    ///
    /// Webhook URLが空ならログ出力のみ。
    pub fn from_config(config: MonitorConfig) -> AgentResult<Self> {
        let webhook_url = config.feishu.webhook_url.trim().to_string();
        let notifier: Arc<dyn Notifier> = if webhook_url.is_empty() {
            warn!("feishu.webhook_url is empty, alerts will only be logged");
            Arc::new(LogNotifier)
        } else {
            let notifier =
                WebhookNotifier::new(webhook_url, config.settings.request_timeout())
                    .map_err(|e| AgentError::HttpClient(e.to_string()))?;
            Arc::new(notifier)
        };
        Self::new(config, notifier)
    }

    /// 読み込まれた設定
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// ラウンド実行パラメータ
    pub fn round_config(&self) -> &RoundConfig {
        &self.round
    }

    /// 指定種別のラウンドを実行
    pub async fn run_round(&self, kind: RoundKind, shutdown: &CancellationToken) -> RoundSummary {
        match kind {
            RoundKind::ApiHealth => self.run_api_health_round(shutdown).await,
            RoundKind::SslInspection => self.run_ssl_inspection_round(shutdown).await,
        }
    }

    /// APIヘルスチェックラウンド
    ///
    /// 全エンドポイントを同時実行数制限付きで並列に検査する。各プローブは
    /// 検査 → 判定 → 通知 を順に行うため、1プローブにつきアラートは高々1件。
    pub async fn run_api_health_round(&self, shutdown: &CancellationToken) -> RoundSummary {
        let round_id = Uuid::new_v4();
        let span = info_span!("round", kind = %RoundKind::ApiHealth, round_id = %round_id);

        async {
            let targets = self.config.endpoint_targets();
            info!(
                endpoints = targets.len(),
                concurrency = self.round.concurrency,
                deadline_secs = self.round.deadline.as_secs(),
                "API health round started"
            );

            let limits = RoundLimits::from(&self.round);
            let report = run_round(targets, &limits, shutdown, |target, cancel| {
                let http = self.http.clone();
                let notifier = Arc::clone(&self.notifier);
                let policy = self.policy;
                async move {
                    let outcome = http.check_endpoint(&cancel, &target).await;
                    let delivery = deliver(notifier.as_ref(), policy.decide(&outcome)).await;
                    (outcome, delivery)
                }
                .in_current_span()
            })
            .await;

            let mut summary = RoundSummary {
                kind: RoundKind::ApiHealth,
                outcomes: Vec::with_capacity(report.outcomes.len()),
                alerts_sent: 0,
                alerts_failed: 0,
                skipped: report.skipped,
                abandoned: report.abandoned,
                elapsed: report.elapsed,
            };
            for (outcome, delivery) in report.outcomes {
                summary.record(outcome, delivery);
            }

            info!(
                healthy = summary.healthy(),
                unhealthy = summary.unhealthy(),
                skipped = summary.skipped,
                abandoned = summary.abandoned,
                alerts_sent = summary.alerts_sent,
                alerts_failed = summary.alerts_failed,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                next_check_secs = self.config.settings.check_interval,
                "API health round finished"
            );
            summary
        }
        .instrument(span)
        .await
    }

    /// SSL証明書検査ラウンド
    ///
    /// 対象を1件ずつ順に検査する。シャットダウン時は残りを打ち切る。
    pub async fn run_ssl_inspection_round(&self, shutdown: &CancellationToken) -> RoundSummary {
        let round_id = Uuid::new_v4();
        let span = info_span!("round", kind = %RoundKind::SslInspection, round_id = %round_id);

        async {
            let started = Instant::now();
            let targets = self.config.ssl_targets();
            let threshold = self.round.cert_warning_days;
            info!(
                domains = targets.len(),
                warning_days = threshold,
                "SSL inspection round started"
            );

            let mut summary = RoundSummary {
                kind: RoundKind::SslInspection,
                outcomes: Vec::with_capacity(targets.len()),
                alerts_sent: 0,
                alerts_failed: 0,
                skipped: 0,
                abandoned: 0,
                elapsed: Duration::ZERO,
            };

            let total = targets.len();
            for (index, target) in targets.iter().enumerate() {
                if shutdown.is_cancelled() {
                    summary.skipped = total - index;
                    break;
                }

                let outcome = tokio::select! {
                    outcome = self.tls.check_certificate(target, threshold) => outcome,
                    _ = shutdown.cancelled() => {
                        summary.abandoned = 1;
                        summary.skipped = total - index - 1;
                        break;
                    }
                };
                let delivery = deliver(self.notifier.as_ref(), self.policy.decide(&outcome)).await;
                summary.record(outcome, delivery);
            }

            summary.elapsed = started.elapsed();
            info!(
                ok = summary.healthy(),
                warnings_or_errors = summary.unhealthy(),
                skipped = summary.skipped,
                alerts_sent = summary.alerts_sent,
                alerts_failed = summary.alerts_failed,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "SSL inspection round finished"
            );
            summary
        }
        .instrument(span)
        .await
    }

    /// スケジューラからのコマンドを受けてラウンドを実行するループ
    ///
    /// 各ラウンドは独立したタスクで実行されるため、種別の異なるラウンドは重なり得る。
    /// 同じ種別のラウンドが実行中ならそのコマンドは読み捨てる。
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<RoundKind>, shutdown: CancellationToken) {
        let mut rounds = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(joined) = rounds.join_next(), if !rounds.is_empty() => {
                    if let Err(e) = joined {
                        error!("Round task join error: {}", e);
                    }
                }
                command = rx.recv() => {
                    let Some(kind) = command else { break };
                    let Some(guard) = self.try_begin(kind) else {
                        warn!(round = %kind, "Previous round still running, skipping this tick");
                        continue;
                    };
                    let monitor = Arc::clone(&self);
                    let shutdown = shutdown.clone();
                    rounds.spawn(async move {
                        let _guard = guard;
                        monitor.run_round(kind, &shutdown).await;
                    });
                }
            }
        }

        // 実行中のラウンドはシャットダウンを検知して早期に終わる
        while let Some(joined) = rounds.join_next().await {
            if let Err(e) = joined {
                error!("Round task join error: {}", e);
            }
        }
        info!("Monitor stopped");
    }

    fn running_flag(&self, kind: RoundKind) -> &AtomicBool {
        match kind {
            RoundKind::ApiHealth => &self.api_running,
            RoundKind::SslInspection => &self.ssl_running,
        }
    }

    fn try_begin(self: &Arc<Self>, kind: RoundKind) -> Option<RunningGuard> {
        self.running_flag(kind)
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard {
                monitor: Arc::clone(self),
                kind,
            })
    }

    /// 指定種別のラウンドが実行中か
    pub fn is_running(&self, kind: RoundKind) -> bool {
        self.running_flag(kind).load(Ordering::SeqCst)
    }
}

struct RunningGuard {
    monitor: Arc<Monitor>,
    kind: RoundKind,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.monitor
            .running_flag(self.kind)
            .store(false, Ordering::SeqCst);
    }
}

async fn deliver(notifier: &dyn Notifier, alert: Option<AlertMessage>) -> AlertDelivery {
    let Some(alert) = alert else {
        return AlertDelivery::None;
    };
    match notifier.notify(&alert).await {
        Ok(()) => AlertDelivery::Sent,
        Err(e) => {
            warn!(error = %e, severity = ?alert.severity, "Failed to deliver alert");
            AlertDelivery::Failed
        }
    }
}
