//! TLS証明書インスペクターの結合テスト（自己署名証明書のTLSサーバー相手）

use crate::support::spawn_tls_server;
use api_health_agent::probe::TlsInspector;
use api_health_common::types::{ProbeOutcome, SslTarget};
use std::net::SocketAddr;
use std::time::Duration;

fn target(addr: SocketAddr) -> SslTarget {
    SslTarget::new("127.0.0.1", addr.port())
}

#[tokio::test]
async fn reads_self_signed_certificate_metadata() {
    let addr = spawn_tls_server(90).await;
    let inspector = TlsInspector::new(Duration::from_secs(5)).unwrap();

    let cert = inspector.inspect(&target(addr)).await.unwrap();
    assert_eq!(cert.common_name, "localhost");
    assert_eq!(cert.issuer, "localhost");
    assert!(cert.days_remaining > 89.0 && cert.days_remaining <= 90.0);
}

#[tokio::test]
async fn certificate_expiring_within_threshold_is_warning() {
    let addr = spawn_tls_server(5).await;
    let inspector = TlsInspector::new(Duration::from_secs(5)).unwrap();

    match inspector.check_certificate(&target(addr), 10).await {
        ProbeOutcome::CertWarning {
            cert,
            threshold_days,
            ..
        } => {
            assert_eq!(threshold_days, 10);
            assert!(cert.days_remaining < 5.01);
        }
        other => panic!("expected CertWarning, got {:?}", other),
    }
}

#[tokio::test]
async fn certificate_beyond_threshold_is_ok() {
    let addr = spawn_tls_server(60).await;
    let inspector = TlsInspector::new(Duration::from_secs(5)).unwrap();

    let outcome = inspector.check_certificate(&target(addr), 30).await;
    assert!(matches!(outcome, ProbeOutcome::CertOk { .. }));
    assert!(outcome.days_remaining().unwrap() > 59.0);
}
