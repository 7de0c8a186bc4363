//! カタログクライアント
//!
//! Consulカタログへの GET と JSON 応答の取得

use async_trait::async_trait;
use consul_hosts_common::config::{CatalogEndpoint, HostsConfig};
use consul_hosts_common::error::{HostsError, HostsResult};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// サービス一覧のパス
pub const SERVICES_PATH: &str = "/v1/catalog/services";

/// 1回のカタログ取得の宛先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// ホスト名
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// TLSを使用するか
    pub tls: bool,
    /// リクエストパス
    pub path: String,
}

impl FetchOptions {
    /// サービスのノード一覧（`/v1/catalog/service/:name`）
    pub fn for_service(catalog: &CatalogEndpoint, name: &str) -> Self {
        Self::with_path(catalog, format!("/v1/catalog/service/{}", name))
    }

    /// 全サービス一覧（`/v1/catalog/services`）
    pub fn for_directory(catalog: &CatalogEndpoint) -> Self {
        Self::with_path(catalog, SERVICES_PATH.to_string())
    }

    fn with_path(catalog: &CatalogEndpoint, path: String) -> Self {
        Self {
            host: catalog.host.clone(),
            port: catalog.port,
            tls: catalog.tls,
            path,
        }
    }

    /// リクエストURL
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

/// カタログへのGETを行うクライアント
///
/// 応答本文はJSONとして解釈して返す。解釈できない本文は文字列値として返し、
/// 形式の検証は呼び出し側に任せる。
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// `options` の宛先へGETする
    async fn fetch(&self, options: &FetchOptions) -> HostsResult<Value>;
}

/// reqwestによるカタログクライアント
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: Client,
}

impl HttpCatalogClient {
    /// 設定からクライアントを作成
    pub fn new(config: &HostsConfig) -> HostsResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(client_build_failure)?;

        Ok(Self { client })
    }
}

/// クライアントを作れない場合は起動できない
fn client_build_failure(e: impl std::fmt::Display) -> HostsError {
    HostsError::Internal(format!("Failed to create HTTP client: {}", e))
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch(&self, options: &FetchOptions) -> HostsResult<Value> {
        let url = options.url();
        debug!(url = %url, "Requesting catalog");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HostsError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HostsError::Http(format!("{} returned {}", options.path, status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| HostsError::Http(e.to_string()))?;

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
