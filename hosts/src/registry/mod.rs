//! 監視対象サービスのレジストリ
//!
//! 設定の明示リスト、またはカタログからの全サービス検出（`"all"`）で
//! 監視対象を確定する。検出は一度だけ行い、未確定状態には戻らない。

use crate::catalog::{CatalogClient, FetchOptions};
use consul_hosts_common::config::{CatalogEndpoint, ServiceSelection, DISCOVER_ALL};
use consul_hosts_common::error::{CommonError, HostsError, HostsResult};
use consul_hosts_common::types::parse_service_directory;
use std::time::Duration;
use tracing::{info, warn};

/// サービス数がこれを超えるとばらつき幅を広げる
const WIDEN_THRESHOLD: f64 = 2.0;

/// ばらつき幅の増分
const WIDEN_STEP: Duration = Duration::from_millis(1000);

/// 監視対象サービスの集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRegistry {
    /// 設定で明示されたサービス
    Static(Vec<String>),
    /// カタログからの検出待ち
    Unresolved,
    /// カタログから検出したサービス
    Discovered(Vec<String>),
}

impl ServiceRegistry {
    /// 設定のサービス指定からレジストリを作成
    ///
    /// `"all"` 以外のキーワードは設定エラー。
    pub fn from_selection(selection: &ServiceSelection) -> HostsResult<Self> {
        match selection {
            ServiceSelection::Named(names) => {
                let mut unique: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    if unique.contains(name) {
                        warn!(service = %name, "Duplicate service in config, ignoring");
                        continue;
                    }
                    unique.push(name.clone());
                }
                Ok(ServiceRegistry::Static(unique))
            }
            ServiceSelection::Keyword(keyword) if keyword == DISCOVER_ALL => {
                Ok(ServiceRegistry::Unresolved)
            }
            ServiceSelection::Keyword(keyword) => Err(CommonError::Config(format!(
                "Cannot deal with services \"{}\".",
                keyword
            ))
            .into()),
        }
    }

    /// 監視対象を確定して返す
    ///
    /// 検出待ちの場合はカタログのサービス一覧を一度だけ取得する。
    /// 取得失敗や一覧がオブジェクトでない場合は起動を継続できない。
    pub async fn resolve(
        &mut self,
        client: &dyn CatalogClient,
        catalog: &CatalogEndpoint,
    ) -> HostsResult<&[String]> {
        if let ServiceRegistry::Unresolved = self {
            let options = FetchOptions::for_directory(catalog);
            let body = client
                .fetch(&options)
                .await
                .map_err(|e| HostsError::Discovery(e.to_string()))?;
            let names = parse_service_directory(&body).ok_or_else(|| {
                HostsError::Discovery("service listing was not an object".to_string())
            })?;

            if names.is_empty() {
                warn!("Catalog reported no services");
            }
            info!(count = names.len(), "Discovered services from catalog");
            *self = ServiceRegistry::Discovered(names);
        }

        Ok(self.names())
    }

    /// 確定済みのサービス名（検出待ちの間は空）
    pub fn names(&self) -> &[String] {
        match self {
            ServiceRegistry::Static(names) | ServiceRegistry::Discovered(names) => names,
            ServiceRegistry::Unresolved => &[],
        }
    }

    /// スケジューラーが使うばらつき幅
    ///
    /// 検出したサービスについてのみ件数に応じて広げる。
    pub fn stagger_window(&self, base: Duration) -> Duration {
        match self {
            ServiceRegistry::Discovered(names) => widen_stagger(base, names.len()),
            _ => base,
        }
    }
}

/// サービス数に応じてばらつき幅を広げる
///
/// 件数を半分にしながら、2を超えている間だけ増分を加える。上限はない。
pub fn widen_stagger(base: Duration, count: usize) -> Duration {
    let mut window = base;
    let mut k = count as f64;
    while k > WIDEN_THRESHOLD {
        window += WIDEN_STEP;
        k /= 2.0;
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct DirectoryCatalog {
        response: HostsResult<Value>,
        requested: Mutex<Vec<String>>,
    }

    impl DirectoryCatalog {
        fn new(response: HostsResult<Value>) -> Self {
            Self {
                response,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogClient for DirectoryCatalog {
        async fn fetch(&self, options: &FetchOptions) -> HostsResult<Value> {
            self.requested.lock().unwrap().push(options.path.clone());
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err(e) => Err(HostsError::Http(e.to_string())),
            }
        }
    }

    fn catalog() -> CatalogEndpoint {
        CatalogEndpoint {
            host: "127.0.0.1".to_string(),
            port: 8500,
            tls: false,
        }
    }

    fn named(names: &[&str]) -> ServiceSelection {
        ServiceSelection::Named(names.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_static_list_is_returned_unchanged() {
        let client = DirectoryCatalog::new(Ok(json!({})));
        let mut registry = ServiceRegistry::from_selection(&named(&["web", "db"])).unwrap();

        let names = registry.resolve(&client, &catalog()).await.unwrap().to_vec();

        assert_eq!(names, vec!["web", "db"]);
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_static_list_drops_duplicates() {
        let registry = ServiceRegistry::from_selection(&named(&["web", "db", "web"])).unwrap();
        assert_eq!(registry.names(), ["web", "db"]);
    }

    #[test]
    fn test_unknown_keyword_is_config_error() {
        let result = ServiceRegistry::from_selection(&ServiceSelection::Keyword("some".into()));

        let err = result.unwrap_err();
        assert!(matches!(err, HostsError::Common(CommonError::Config(_))));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_discovery_resolves_once() {
        let client = DirectoryCatalog::new(Ok(json!({
            "web": ["primary"],
            "db": [],
            "consul": []
        })));
        let mut registry =
            ServiceRegistry::from_selection(&ServiceSelection::Keyword("all".into())).unwrap();
        assert_eq!(registry, ServiceRegistry::Unresolved);

        let names = registry.resolve(&client, &catalog()).await.unwrap().to_vec();
        assert_eq!(names, vec!["consul", "db", "web"]);

        // 二回目はカタログへ問い合わせない
        registry.resolve(&client, &catalog()).await.unwrap();
        assert_eq!(client.requests(), vec!["/v1/catalog/services"]);
        assert!(matches!(registry, ServiceRegistry::Discovered(_)));
    }

    #[tokio::test]
    async fn test_discovery_transport_failure_is_fatal() {
        let client = DirectoryCatalog::new(Err(HostsError::Http("connection refused".into())));
        let mut registry = ServiceRegistry::Unresolved;

        let err = registry.resolve(&client, &catalog()).await.unwrap_err();

        assert!(matches!(err, HostsError::Discovery(_)));
        assert!(err.is_fatal());
        assert_eq!(registry, ServiceRegistry::Unresolved);
    }

    #[tokio::test]
    async fn test_discovery_rejects_non_object_listing() {
        let client = DirectoryCatalog::new(Ok(json!(["web", "db"])));
        let mut registry = ServiceRegistry::Unresolved;

        let err = registry.resolve(&client, &catalog()).await.unwrap_err();
        assert!(matches!(err, HostsError::Discovery(_)));
    }

    #[test]
    fn test_widen_stagger_small_sets_unchanged() {
        let base = Duration::from_millis(2000);
        assert_eq!(widen_stagger(base, 0), base);
        assert_eq!(widen_stagger(base, 1), base);
        assert_eq!(widen_stagger(base, 2), base);
    }

    #[test]
    fn test_widen_stagger_steps() {
        let base = Duration::from_millis(2000);
        assert_eq!(widen_stagger(base, 3), Duration::from_millis(3000));
        assert_eq!(widen_stagger(base, 4), Duration::from_millis(3000));
        assert_eq!(widen_stagger(base, 5), Duration::from_millis(4000));
        assert_eq!(widen_stagger(base, 100), Duration::from_millis(8000));
    }

    #[test]
    fn test_widen_stagger_grows_with_count() {
        let base = Duration::from_millis(500);
        let mut previous = widen_stagger(base, 3);
        assert!(previous > base);

        for count in 4..2048 {
            let window = widen_stagger(base, count);
            assert!(window > base, "count {} did not widen", count);
            assert!(window >= previous, "count {} shrank the window", count);
            previous = window;
        }
    }

    #[test]
    fn test_stagger_window_only_widens_discovered_sets() {
        let base = Duration::from_millis(2000);
        let names: Vec<String> = (0..10).map(|i| format!("svc-{}", i)).collect();

        assert_eq!(ServiceRegistry::Static(names.clone()).stagger_window(base), base);
        assert!(ServiceRegistry::Discovered(names).stagger_window(base) > base);
    }
}
