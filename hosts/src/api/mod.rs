//! REST APIハンドラー
//!
//! キャッシュ済みエンドポイント一覧の読み出し専用API

pub mod services;

use crate::AppState;
use axum::{routing::any, Router};
use tower_http::trace::TraceLayer;

/// APIルーターを作成
///
/// メソッドは区別しない（未知のサービスは常に 404）。
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(services::usage))
        .route("/:name", any(services::get_service))
        .fallback(services::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
