//! SSL証明書検査ラウンドの結合テスト

use crate::support::{closed_port, spawn_tls_server, RecordingNotifier};
use api_health_agent::monitor::Monitor;
use api_health_common::config::MonitorConfig;
use api_health_common::error::ProbeError;
use api_health_common::types::{AlertSeverity, ProbeOutcome};
use tokio_util::sync::CancellationToken;

fn config(ports: &[u16], warning_days: u32, notify_on_failure: bool) -> MonitorConfig {
    let domains: String = ports
        .iter()
        .map(|port| format!("    - url: 127.0.0.1\n      port: {}\n", port))
        .collect();
    let yaml = format!(
        r#"
settings:
  connect_timeout: 2
feishu:
  notify_on_failure: {notify}
ssl:
  warning_days: {days}
  domains:
{domains}"#,
        notify = notify_on_failure,
        days = warning_days,
        domains = domains,
    );
    MonitorConfig::from_yaml_str(&yaml).unwrap()
}

#[tokio::test]
async fn expiring_certificate_warns_regardless_of_flag() {
    let addr = spawn_tls_server(5).await;

    for notify in [true, false] {
        let recorder = RecordingNotifier::new();
        let monitor = Monitor::new(config(&[addr.port()], 10, notify), recorder.clone()).unwrap();
        let summary = monitor
            .run_ssl_inspection_round(&CancellationToken::new())
            .await;

        assert_eq!(summary.outcomes.len(), 1);
        match &summary.outcomes[0] {
            ProbeOutcome::CertWarning {
                cert,
                threshold_days,
                ..
            } => {
                assert_eq!(*threshold_days, 10);
                assert!(cert.days_remaining > 4.0 && cert.days_remaining < 5.1);
            }
            other => panic!("expected CertWarning, got {:?}", other),
        }

        let messages = recorder.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, AlertSeverity::Warning);
        assert!(messages[0].body.contains("127.0.0.1"));
    }
}

#[tokio::test]
async fn healthy_certificate_is_silent() {
    let addr = spawn_tls_server(90).await;
    let recorder = RecordingNotifier::new();
    let monitor = Monitor::new(config(&[addr.port()], 30, true), recorder.clone()).unwrap();

    let summary = monitor
        .run_ssl_inspection_round(&CancellationToken::new())
        .await;

    assert!(matches!(summary.outcomes[0], ProbeOutcome::CertOk { .. }));
    assert!(summary.outcomes[0].days_remaining().unwrap() > 89.0);
    assert!(!summary.has_failures());
    assert!(recorder.messages().is_empty());
}

#[tokio::test]
async fn dial_failure_without_notify_is_silent() {
    let port = closed_port().await;
    let recorder = RecordingNotifier::new();
    let monitor = Monitor::new(config(&[port], 10, false), recorder.clone()).unwrap();

    let summary = monitor
        .run_ssl_inspection_round(&CancellationToken::new())
        .await;

    assert_eq!(summary.outcomes.len(), 1);
    assert!(matches!(
        summary.outcomes[0],
        ProbeOutcome::CertError {
            error: ProbeError::Transport(_),
            ..
        }
    ));
    assert!(recorder.messages().is_empty());
}

#[tokio::test]
async fn dial_failure_with_notify_alerts() {
    let port = closed_port().await;
    let recorder = RecordingNotifier::new();
    let monitor = Monitor::new(config(&[port], 10, true), recorder.clone()).unwrap();

    monitor
        .run_ssl_inspection_round(&CancellationToken::new())
        .await;

    let messages = recorder.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, AlertSeverity::Failure);
}

#[tokio::test]
async fn one_failing_domain_does_not_stop_the_round() {
    let good = spawn_tls_server(90).await;
    let bad = closed_port().await;
    let monitor = Monitor::new(
        config(&[bad, good.port()], 30, false),
        RecordingNotifier::new(),
    )
    .unwrap();

    let summary = monitor
        .run_ssl_inspection_round(&CancellationToken::new())
        .await;

    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.healthy(), 1);
    assert_eq!(summary.unhealthy(), 1);
}
