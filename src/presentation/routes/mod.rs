// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::infrastructure::search::{BatchRunner, Dispatcher};
use crate::presentation::handlers::search_handler;
use crate::presentation::middleware::auth_middleware::{auth_middleware, AuthState};

/// 处理器共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub batch: Arc<BatchRunner>,
    /// 服务关闭时触发，每个请求派生自己的子令牌
    pub shutdown: CancellationToken,
}

/// 创建应用路由
///
/// `/health` 与 `/version` 无需认证，其余接口都经过令牌认证中间件。
pub fn routes(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/version", get(version));

    let protected_routes = Router::new()
        .route("/api/search", post(search_handler::search))
        .route("/api/search/batch", post(search_handler::batch_search))
        .route("/api/providers", get(search_handler::list_providers))
        .route("/api/cache/stats", get(search_handler::cache_stats))
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 健康检查端点
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
