//! ポーリングスケジューラー
//!
//! 1サービスにつき1タスク。各タスクは次の2段階を持つ:
//!
//! - `PendingInitial`: `[0, stagger)` の乱数だけ待ってから初回取得し、完了を待つ
//! - `SteadyState`: 固定間隔で取得を発行する（完了は待たない）
//!
//! 同一サービスの取得が前後して完了した場合は、最後に完了したものが
//! スナップショットを書き込む。

use crate::cache::{FetchOutcome, ResultCache, ServiceWatch};
use crate::catalog::{CatalogClient, FetchOptions};
use crate::shutdown::ShutdownController;
use consul_hosts_common::config::CatalogEndpoint;
use consul_hosts_common::error::{HostsError, HostsResult};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// デフォルトのポーリング間隔（秒）
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// デフォルトの初回取得ばらつき幅（ミリ秒）
const DEFAULT_STAGGER_MILLIS: u64 = 2000;

/// サービスごとのタイマーの段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// 初回取得待ち
    PendingInitial,
    /// 定期取得中
    SteadyState,
    /// シャットダウンにより停止
    Stopped,
}

/// サービスごとのタイマーハンドル
#[derive(Debug)]
pub struct WatchHandle {
    name: String,
    phase: watch::Receiver<WatchPhase>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// サービス名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 現在の段階
    pub fn phase(&self) -> WatchPhase {
        *self.phase.borrow()
    }

    /// タイマーを止める（発行済みの取得はそのまま完了する）
    pub fn abort(&self) {
        self.task.abort();
    }

    /// タイマータスクが終了したか
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// ポーリングスケジューラー
#[derive(Clone)]
pub struct PollScheduler {
    /// カタログクライアント
    client: Arc<dyn CatalogClient>,
    /// 取得結果キャッシュ
    cache: ResultCache,
    /// 定期取得の間隔
    interval: Duration,
    /// 初回取得のばらつき幅
    stagger: Duration,
    /// シャットダウン通知
    shutdown: ShutdownController,
}

impl PollScheduler {
    /// 新しいスケジューラーを作成
    pub fn new(client: Arc<dyn CatalogClient>, cache: ResultCache) -> Self {
        Self {
            client,
            cache,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            stagger: Duration::from_millis(DEFAULT_STAGGER_MILLIS),
            shutdown: ShutdownController::default(),
        }
    }

    /// ポーリング間隔を設定
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 初回取得のばらつき幅を設定
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// シャットダウン通知を設定
    pub fn with_shutdown(mut self, shutdown: ShutdownController) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// ポーリング間隔
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 初回取得のばらつき幅
    pub fn stagger(&self) -> Duration {
        self.stagger
    }

    /// サービスの監視を開始
    ///
    /// キャッシュへ監視状態を登録し、タイマータスクを起動する。
    pub async fn watch(&self, name: &str, options: FetchOptions) -> WatchHandle {
        if !self
            .cache
            .insert(ServiceWatch::new(name, options.clone()))
            .await
        {
            warn!(service = %name, "Service already registered, keeping cached state");
        }

        let (phase_tx, phase_rx) = watch::channel(WatchPhase::PendingInitial);
        let delay = initial_delay(self.stagger);
        let span = info_span!("service", name = %name);
        let task = tokio::spawn(
            self.clone()
                .run(name.to_string(), options, delay, phase_tx)
                .instrument(span),
        );

        WatchHandle {
            name: name.to_string(),
            phase: phase_rx,
            task,
        }
    }

    /// 複数サービスの監視を開始
    pub async fn watch_all(&self, names: &[String], catalog: &CatalogEndpoint) -> Vec<WatchHandle> {
        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            handles.push(
                self.watch(name, FetchOptions::for_service(catalog, name))
                    .await,
            );
        }

        info!(
            count = handles.len(),
            interval_ms = self.interval.as_millis() as u64,
            stagger_ms = self.stagger.as_millis() as u64,
            "Scheduled service watches"
        );
        handles
    }

    /// タイマータスク本体
    async fn run(
        self,
        name: String,
        options: FetchOptions,
        delay: Duration,
        phase: watch::Sender<WatchPhase>,
    ) {
        tokio::select! {
            _ = sleep(delay) => {}
            _ = self.shutdown.wait() => {
                phase.send_replace(WatchPhase::Stopped);
                return;
            }
        }

        info!("Started watching.");
        let _ = poll_once(self.client.as_ref(), &self.cache, &name, &options).await;
        phase.send_replace(WatchPhase::SteadyState);

        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let client = self.client.clone();
                    let cache = self.cache.clone();
                    let name = name.clone();
                    let options = options.clone();
                    // 前回の取得の完了は待たない
                    tokio::spawn(
                        async move {
                            let _ = poll_once(client.as_ref(), &cache, &name, &options).await;
                        }
                        .in_current_span(),
                    );
                }
                _ = self.shutdown.wait() => break,
            }
        }

        debug!("Stopped watching");
        phase.send_replace(WatchPhase::Stopped);
    }
}

/// 初回取得までの待ち時間を `[0, stagger)` から一様に選ぶ
pub fn initial_delay(stagger: Duration) -> Duration {
    if stagger.is_zero() {
        return Duration::ZERO;
    }
    let nanos = stagger.as_nanos().min(u64::MAX as u128) as u64;
    Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
}

/// 1回分の取得とキャッシュ反映
///
/// 失敗はここでログに記録し、スナップショットは前回の値のまま残る。
pub async fn poll_once(
    client: &dyn CatalogClient,
    cache: &ResultCache,
    name: &str,
    options: &FetchOptions,
) -> HostsResult<FetchOutcome> {
    debug!("Fetching nodes.");
    cache.mark_attempt(name).await?;

    let result = match client.fetch(options).await {
        Ok(body) => cache.apply(name, &body).await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(_) => {}
        Err(HostsError::Http(e)) => {
            warn!(service = %name, error = %e, "Failed to fetch nodes from consul");
        }
        Err(HostsError::Shape(e)) => {
            error!(service = %name, error = %e, "Response from consul looks invalid");
        }
        Err(e) => {
            error!(service = %name, error = %e, "Failed to update service");
        }
    }

    result
}
