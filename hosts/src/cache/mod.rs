//! 取得結果キャッシュ
//!
//! サービスごとの最新の正常なスナップショットをメモリ内で管理する。
//! 検証に失敗した取得結果ではスナップショットを変更しない。

use crate::catalog::FetchOptions;
use chrono::{DateTime, Utc};
use consul_hosts_common::error::{HostsError, HostsResult};
use consul_hosts_common::types::{parse_service_nodes, render_snapshot};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// 監視中サービス1件分の状態
#[derive(Debug, Clone)]
pub struct ServiceWatch {
    /// サービス名
    pub name: String,
    /// 取得先
    pub options: FetchOptions,
    /// 配信用のエンドポイント一覧（初回取得成功までは空）
    pub snapshot: String,
    /// 前回観測したエンドポイント数（件数変化のログ用）
    pub previous_count: usize,
    /// 最後に取得を試みた時刻
    pub last_fetch: Option<DateTime<Utc>>,
}

impl ServiceWatch {
    /// 新しい監視状態を作成
    pub fn new(name: impl Into<String>, options: FetchOptions) -> Self {
        Self {
            name: name.into(),
            options,
            snapshot: String::new(),
            previous_count: 0,
            last_fetch: None,
        }
    }
}

/// 取得結果の反映結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    /// エンドポイント数
    pub endpoints: usize,
    /// 前回から件数が変化したか
    pub count_changed: bool,
}

/// サービス名→監視状態のテーブル
///
/// ポーラーが書き込み、ゲートウェイが読み出す。
#[derive(Clone, Default)]
pub struct ResultCache {
    watches: Arc<RwLock<HashMap<String, ServiceWatch>>>,
}

impl ResultCache {
    /// 空のキャッシュを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 監視状態を登録する
    ///
    /// 同名のサービスが既にあれば既存の状態を維持して `false` を返す。
    pub async fn insert(&self, watch: ServiceWatch) -> bool {
        let mut watches = self.watches.write().await;
        if watches.contains_key(&watch.name) {
            return false;
        }
        watches.insert(watch.name.clone(), watch);
        true
    }

    /// 監視中のサービスか
    pub async fn contains(&self, name: &str) -> bool {
        self.watches.read().await.contains_key(name)
    }

    /// 現在のスナップショット（未監視なら `None`）
    pub async fn snapshot(&self, name: &str) -> Option<String> {
        self.watches
            .read()
            .await
            .get(name)
            .map(|w| w.snapshot.clone())
    }

    /// 監視状態を取得
    pub async fn get(&self, name: &str) -> Option<ServiceWatch> {
        self.watches.read().await.get(name).cloned()
    }

    /// 監視中のサービス名（名前順）
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.watches.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// 取得を試みた時刻を記録
    pub async fn mark_attempt(&self, name: &str) -> HostsResult<()> {
        let mut watches = self.watches.write().await;
        let watch = watches
            .get_mut(name)
            .ok_or_else(|| HostsError::UnknownService(name.to_string()))?;
        watch.last_fetch = Some(Utc::now());
        Ok(())
    }

    /// カタログ応答を検証してスナップショットへ反映する
    ///
    /// 検証に失敗した場合はエラーを返し、状態は一切変更しない。
    pub async fn apply(&self, name: &str, body: &Value) -> HostsResult<FetchOutcome> {
        // 検証と整形はロックの外で行う
        let entries = parse_service_nodes(body)?;
        let snapshot = render_snapshot(&entries);

        let mut watches = self.watches.write().await;
        let watch = watches
            .get_mut(name)
            .ok_or_else(|| HostsError::UnknownService(name.to_string()))?;

        let count_changed = watch.previous_count != entries.len();
        if count_changed {
            info!(service = %name, count = entries.len(), "Saw {} nodes", entries.len());
            watch.previous_count = entries.len();
        }
        watch.snapshot = snapshot;

        Ok(FetchOutcome {
            endpoints: entries.len(),
            count_changed,
        })
    }
}
