//! 設定管理
//!
//! HostsConfig, ServiceSelection等の設定構造体と設定ファイル読み込み

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 環境変数による上書きのプレフィックス（例: `CONSUL_HOSTS_PORT`）
pub const ENV_PREFIX: &str = "CONSUL_HOSTS";

/// 全サービスをカタログから検出するキーワード
pub const DISCOVER_ALL: &str = "all";

/// 監視対象サービスの指定
///
/// 設定ファイルではサービス名の配列、またはキーワード文字列（`"all"`）で指定する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceSelection {
    /// 明示的なサービス名リスト
    Named(Vec<String>),
    /// キーワード指定（`"all"`のみ有効）
    Keyword(String),
}

impl Default for ServiceSelection {
    fn default() -> Self {
        ServiceSelection::Named(Vec::new())
    }
}

/// カタログ（Consul）の接続先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEndpoint {
    /// ホスト名
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// TLSを使用するか
    pub tls: bool,
}

/// consul-hosts設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// 待ち受けポート (デフォルト: 18500)
    #[serde(default = "default_port")]
    pub port: u16,

    /// カタログのホスト (デフォルト: "127.0.0.1")
    #[serde(default = "default_catalog_host", alias = "chost")]
    pub catalog_host: String,

    /// カタログのポート (デフォルト: 8500)
    #[serde(default = "default_catalog_port", alias = "cport")]
    pub catalog_port: u16,

    /// カタログへTLSで接続するか (デフォルト: false)
    #[serde(default, alias = "cssl")]
    pub catalog_tls: bool,

    /// 自己署名証明書を許可するか (デフォルト: true)
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,

    /// ポーリング間隔（ミリ秒）(デフォルト: 30000)
    #[serde(default = "default_interval_ms", alias = "interval")]
    pub interval_ms: u64,

    /// 初回取得をばらつかせる幅（ミリ秒）(デフォルト: 2000)
    #[serde(default = "default_spread_ms", alias = "spread")]
    pub spread_ms: u64,

    /// カタログへのリクエストタイムアウト（ミリ秒）(デフォルト: 10000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// 監視対象サービス (デフォルト: 空リスト)
    #[serde(default)]
    pub services: ServiceSelection,
}

fn default_port() -> u16 {
    18500
}

fn default_catalog_host() -> String {
    "127.0.0.1".to_string()
}

fn default_catalog_port() -> u16 {
    8500
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_spread_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            catalog_host: default_catalog_host(),
            catalog_port: default_catalog_port(),
            catalog_tls: false,
            accept_invalid_certs: default_accept_invalid_certs(),
            interval_ms: default_interval_ms(),
            spread_ms: default_spread_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            services: ServiceSelection::default(),
        }
    }
}

impl HostsConfig {
    /// JSON設定ファイルを読み込み、`CONSUL_HOSTS_*` 環境変数で上書きする
    ///
    /// ファイルが読めない・解釈できない場合は起動できないため `CommonError::Config`。
    pub fn load(path: &str) -> Result<Self, CommonError> {
        let settings = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Json))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| CommonError::Config(format!("Could not read file {}: {}", path, e)))?;

        let config: HostsConfig = settings
            .try_deserialize()
            .map_err(|e| CommonError::Config(format!("Invalid config file {}: {}", path, e)))?;

        config.validate()?;
        Ok(config)
    }

    /// 値の妥当性を検証
    pub fn validate(&self) -> Result<(), CommonError> {
        if self.interval_ms == 0 {
            return Err(CommonError::Validation(
                "interval must be greater than zero".to_string(),
            ));
        }
        if self.catalog_host.trim().is_empty() {
            return Err(CommonError::Validation(
                "catalog host must not be empty".to_string(),
            ));
        }
        if self.catalog_port == 0 {
            return Err(CommonError::Validation(
                "catalog port must not be zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` 形式でカタログの接続先を上書きする
    pub fn apply_catalog_source(&mut self, source: &str) -> Result<(), CommonError> {
        let (host, port) = source
            .split_once(':')
            .ok_or_else(|| CommonError::Config(format!("Invalid consul source option: {}", source)))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| CommonError::Config(format!("Invalid consul source option: {}", source)))?;

        self.catalog_host = host.to_string();
        self.catalog_port = port;
        self.validate()
    }

    /// カタログの接続先
    pub fn catalog(&self) -> CatalogEndpoint {
        CatalogEndpoint {
            host: self.catalog_host.clone(),
            port: self.catalog_port,
            tls: self.catalog_tls,
        }
    }

    /// ポーリング間隔
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// 初回取得のばらつき幅
    pub fn spread(&self) -> Duration {
        Duration::from_millis(self.spread_ms)
    }

    /// カタログへのリクエストタイムアウト
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 待ち受けアドレス
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
