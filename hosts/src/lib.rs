//! consul-hosts
//!
//! Consulカタログのサービスエンドポイントを定期取得し、
//! 最新の結果をプレーンテキストで配信するサーバー

#![warn(missing_docs)]

/// REST APIハンドラー
pub mod api;

/// 取得結果キャッシュ
pub mod cache;

/// カタログクライアント
pub mod catalog;

/// CLIインターフェース
pub mod cli;

/// ロギング初期化ユーティリティ
pub mod logging;

/// カタログポーリング
pub mod poll;

/// 監視対象サービスのレジストリ
pub mod registry;

/// シャットダウン制御
pub mod shutdown;

/// アプリケーション状態
#[derive(Clone, Default)]
pub struct AppState {
    /// 取得結果キャッシュ
    pub cache: cache::ResultCache,
}

impl AppState {
    /// キャッシュからアプリケーション状態を作成
    pub fn new(cache: cache::ResultCache) -> Self {
        Self { cache }
    }
}
