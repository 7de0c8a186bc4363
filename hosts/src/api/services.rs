//! サービス一覧APIハンドラー
//!
//! キャッシュの状態に関わらず 200 か 404 のみを返す。

use crate::AppState;
use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;

/// `GET /` の説明文
pub const USAGE: &str = concat!(
    "/            Print this help\r\n",
    "/:name       Get results for consul service :name\r\n",
);

/// Serverヘッダー
const SERVER_NAME: &str = "Consul-Check";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// GET / - 使い方
pub async fn usage() -> Response {
    send_response(StatusCode::OK, USAGE.to_string())
}

/// GET /:name - サービスのエンドポイント一覧
///
/// 未監視のサービスやデコードできないパスは 404（空本文）。
/// 初回取得前のサービスは 200（空本文）。
pub async fn get_service(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
) -> Response {
    let Ok(Path(name)) = name else {
        return send_response(StatusCode::NOT_FOUND, String::new());
    };

    match state.cache.snapshot(&name).await {
        Some(snapshot) => send_response(StatusCode::OK, snapshot),
        None => send_response(StatusCode::NOT_FOUND, String::new()),
    }
}

/// その他のパス
pub async fn not_found() -> Response {
    send_response(StatusCode::NOT_FOUND, String::new())
}

fn send_response(status: StatusCode, body: String) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));

    if !body.is_empty() {
        let now = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(expires) = HeaderValue::from_str(&now) {
            headers.insert(header::EXPIRES, expires);
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    }

    (status, headers, Body::from(body)).into_response()
}
