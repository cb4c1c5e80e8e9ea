//! プローブ実行
//!
//! 1対象につき1回のネットワークチェックを行い、`ProbeOutcome` を返す。
//! アラート送信はここでは行わない（`policy` の責務）。

pub mod http;
pub mod tls;

pub use http::HttpProber;
pub use tls::TlsInspector;
