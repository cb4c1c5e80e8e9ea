//! スケジューラ → ディスパッチループの結合テスト

use crate::support::RecordingNotifier;
use api_health_agent::monitor::Monitor;
use api_health_agent::scheduler::{Cadence, RoundKind, Scheduler};
use api_health_common::config::MonitorConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn failing_api_monitor(recorder: Arc<RecordingNotifier>) -> (MockServer, Arc<Monitor>) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let yaml = format!(
        r#"
settings:
  endpoint_scheme: http
  curl_timeout: 2
feishu:
  notify_on_failure: true
services:
  "{}":
    endpoints:
      - path: /health
        apikey: k
"#,
        server.address()
    );
    let config = MonitorConfig::from_yaml_str(&yaml).unwrap();
    let monitor = Arc::new(Monitor::new(config, recorder).unwrap());
    (server, monitor)
}

#[tokio::test]
async fn commands_sent_on_the_channel_trigger_rounds() {
    let recorder = RecordingNotifier::new();
    let (_server, monitor) = failing_api_monitor(recorder.clone()).await;

    let (tx, rx) = mpsc::channel(4);
    tx.send(RoundKind::ApiHealth).await.unwrap();
    drop(tx);

    tokio::time::timeout(
        Duration::from_secs(10),
        monitor.clone().run(rx, CancellationToken::new()),
    )
    .await
    .unwrap();

    assert_eq!(recorder.messages().len(), 1);
    assert!(!monitor.is_running(RoundKind::ApiHealth));
}

#[tokio::test]
async fn scheduler_drives_the_monitor_until_shutdown() {
    let recorder = RecordingNotifier::new();
    let (_server, monitor) = failing_api_monitor(recorder.clone()).await;

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(4);
    let tickers = Scheduler::new()
        .every(RoundKind::ApiHealth, Cadence::Every(Duration::from_millis(200)))
        .spawn(tx, shutdown.clone());
    let dispatcher = tokio::spawn(monitor.clone().run(rx, shutdown.clone()));

    tokio::time::timeout(Duration::from_secs(10), async {
        while recorder.messages().len() < 2 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("two rounds should have alerted");

    shutdown.cancel();
    for ticker in tickers {
        ticker.await.unwrap();
    }
    tokio::time::timeout(Duration::from_secs(5), dispatcher)
        .await
        .unwrap()
        .unwrap();
}
