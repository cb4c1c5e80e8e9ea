//! TLS証明書プローブ
//!
//! `domain:port` にTLS接続し、リーフ証明書の発行先・発行者・有効期限を読み取る。
//!
//! # 注意: 証明書検証は無効
//!
//! このプローブは証明書の **メタデータを読む** ためのもので、信頼性の検証は行わない。
//! 自己署名・期限切れ・ホスト名不一致の証明書でも接続は成功する。
//! 接続できたことを「証明書が信頼できる」ことの根拠にしてはならない。

use api_health_common::error::{AgentError, AgentResult, ProbeError};
use api_health_common::types::{CertInfo, ProbeOutcome, SslTarget};
use chrono::{DateTime, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};
use x509_parser::x509::X509Name;

/// 任意のサーバー証明書を受け入れるベリファイア
///
/// 署名検証だけはハンドシェイク成立のために行う。チェーン・有効期限・ホスト名は検証しない。
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// TLS証明書インスペクター
#[derive(Clone)]
pub struct TlsInspector {
    connector: TlsConnector,
    connect_timeout: Duration,
}

impl TlsInspector {
    /// 接続タイムアウトを指定して作成
    ///
    /// 証明書検証を無効にしたクライアント設定を使う（モジュールドキュメント参照）。
    pub fn new(connect_timeout: Duration) -> AgentResult<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| AgentError::HttpClient(format!("TLS client config: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            connect_timeout,
        })
    }

    /// 証明書を読み取り、閾値判定した結果を返す
    pub async fn check_certificate(&self, target: &SslTarget, threshold_days: u32) -> ProbeOutcome {
        match self.inspect(target).await {
            Ok(cert) => {
                let outcome = ProbeOutcome::from_certificate(&target.domain, cert, threshold_days);
                match &outcome {
                    ProbeOutcome::CertWarning { cert, .. } => warn!(
                        domain = %target.domain,
                        days_remaining = cert.days_remaining,
                        threshold_days,
                        expires_at = %cert.expiry_display(),
                        "Certificate expiring soon"
                    ),
                    _ => info!(
                        domain = %target.domain,
                        days_remaining = outcome.days_remaining().unwrap_or_default(),
                        "Certificate OK"
                    ),
                }
                outcome
            }
            Err(error) => {
                warn!(domain = %target.domain, port = target.port, error = %error, "Certificate check failed");
                ProbeOutcome::CertError {
                    domain: target.domain.clone(),
                    error,
                }
            }
        }
    }

    /// TLSハンドシェイクしてリーフ証明書のメタデータを取得
    ///
    /// 成否にかかわらず接続は返却前に閉じる。
    pub async fn inspect(&self, target: &SslTarget) -> Result<CertInfo, ProbeError> {
        let address = target.address();
        let server_name = ServerName::try_from(target.domain.clone()).map_err(|e| {
            ProbeError::Tls(format!("invalid server name '{}': {}", target.domain, e))
        })?;

        debug!(address = %address, "Opening TLS connection");
        let handshake = async {
            let tcp = TcpStream::connect(&address)
                .await
                .map_err(|e| ProbeError::Transport(format!("connect {}: {}", address, e)))?;
            self.connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| ProbeError::Tls(e.to_string()))
        };

        let mut stream = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                ProbeError::Timeout(format!(
                    "TLS handshake with {} exceeded {:?}",
                    address, self.connect_timeout
                ))
            })??;

        let result = leaf_certificate(&stream).and_then(|der| parse_certificate(der, Utc::now()));
        close(&mut stream).await;
        result
    }
}

fn leaf_certificate(stream: &TlsStream<TcpStream>) -> Result<&[u8], ProbeError> {
    let (_, connection) = stream.get_ref();
    connection
        .peer_certificates()
        .and_then(|certs| certs.first())
        .map(|cert| cert.as_ref())
        .ok_or_else(|| ProbeError::Certificate("server presented no certificate".into()))
}

async fn close(stream: &mut TlsStream<TcpStream>) {
    // close_notifyの送信が詰まってもプローブを止めない
    let _ = tokio::time::timeout(Duration::from_secs(1), stream.shutdown()).await;
}

/// DER形式の証明書から `CertInfo` を作る
pub fn parse_certificate(der: &[u8], now: DateTime<Utc>) -> Result<CertInfo, ProbeError> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| ProbeError::Certificate(format!("invalid X.509: {}", e)))?;

    let not_after = cert.validity().not_after.timestamp();
    let expires_at = DateTime::<Utc>::from_timestamp(not_after, 0)
        .ok_or_else(|| ProbeError::Certificate(format!("NotAfter out of range: {}", not_after)))?;

    Ok(CertInfo::from_expiry(
        common_name(cert.subject()),
        common_name(cert.issuer()),
        expires_at,
        now,
    ))
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}
