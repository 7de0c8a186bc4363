//! Contract Test: GET / と GET /:name

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use consul_hosts::cache::{ResultCache, ServiceWatch};
use consul_hosts::catalog::FetchOptions;
use consul_hosts::{api, AppState};
use consul_hosts_common::config::CatalogEndpoint;
use serde_json::json;
use tower::ServiceExt;

async fn build_app(services: &[&str]) -> (Router, ResultCache) {
    let catalog = CatalogEndpoint {
        host: "127.0.0.1".to_string(),
        port: 8500,
        tls: false,
    };
    let cache = ResultCache::new();
    for name in services {
        cache
            .insert(ServiceWatch::new(
                *name,
                FetchOptions::for_service(&catalog, name),
            ))
            .await;
    }
    (api::create_router(AppState::new(cache.clone())), cache)
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn root_returns_usage() {
    let (app, _cache) = build_app(&[]).await;

    let (status, headers, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert!(body.starts_with("/            Print this help\r\n"));
    assert!(body.contains("/:name"));
}

#[tokio::test]
async fn root_ignores_cache_state() {
    let (app, cache) = build_app(&["web"]).await;
    cache
        .apply("web", &json!([{"Node": "n1", "Address": "10.0.0.1", "ServicePort": 8080}]))
        .await
        .unwrap();

    let (status, _, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("10.0.0.1"));
}

#[tokio::test]
async fn unknown_service_is_404_with_empty_body() {
    let (app, _cache) = build_app(&["web"]).await;

    let (status, headers, body) = get(app, "/unknown-service").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
    assert_eq!(headers[header::SERVER], "Consul-Check");
}

#[tokio::test]
async fn known_service_before_first_fetch_is_empty_200() {
    let (app, _cache) = build_app(&["web"]).await;

    let (status, _, body) = get(app, "/web").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn known_service_after_fetch_serves_snapshot() {
    let (app, cache) = build_app(&["web"]).await;
    cache
        .apply("web", &json!([{"Node": "n1", "Address": "10.0.0.1", "ServicePort": 8080}]))
        .await
        .unwrap();

    let (status, headers, body) = get(app, "/web").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "n1:10.0.0.1:8080\n");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
}

#[tokio::test]
async fn failed_fetch_keeps_serving_stale_snapshot() {
    let (app, cache) = build_app(&["web"]).await;
    cache
        .apply("web", &json!([{"Node": "n1", "Address": "10.0.0.1", "ServicePort": 8080}]))
        .await
        .unwrap();
    assert!(cache
        .apply("web", &json!([{"Node": "n2", "Address": "10.0.0.2"}]))
        .await
        .is_err());

    let (status, _, body) = get(app, "/web").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "n1:10.0.0.1:8080\n");
}

#[tokio::test]
async fn malformed_paths_are_404_not_500() {
    for uri in ["/web/extra", "/web/", "/%FF", "/%E3%81"] {
        let (app, _cache) = build_app(&["web"]).await;

        let (status, _, body) = get(app, uri).await;

        assert_eq!(status, StatusCode::NOT_FOUND, "uri {}", uri);
        assert!(body.is_empty(), "uri {}", uri);
    }
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn method_is_ignored_for_unknown_service() {
    for method in ["POST", "PUT", "DELETE", "PATCH"] {
        let (app, _cache) = build_app(&["web"]).await;

        let (status, body) = send(app, method, "/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND, "method {}", method);
        assert!(body.is_empty(), "method {}", method);
    }
}

#[tokio::test]
async fn method_is_ignored_for_known_service_and_root() {
    let (app, cache) = build_app(&["web"]).await;
    cache
        .apply("web", &json!([{"Node": "n1", "Address": "10.0.0.1", "ServicePort": 8080}]))
        .await
        .unwrap();

    let (status, body) = send(app.clone(), "PUT", "/web").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "n1:10.0.0.1:8080\n");

    let (status, _) = send(app.clone(), "POST", "/").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app, "DELETE", "/web/extra").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}
