// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use crate::application::dto::batch_request::{BatchSearchRequestDto, BatchSearchResponseDto};
use crate::application::dto::search_request::SearchRequestDto;
use crate::domain::models::aggregation::AggregationResult;
use crate::domain::models::query::Query;
use crate::presentation::errors::ApiError;
use crate::presentation::middleware::auth_middleware::AuthenticatedUser;
use crate::presentation::routes::AppState;

/// 聚合搜索
///
/// 客户端断开时处理器 future 被丢弃，取消令牌随之触发，进行中的数据源任务会被终止。
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<SearchRequestDto>,
) -> Result<Json<AggregationResult>, ApiError> {
    payload.validate()?;
    info!("Search request from user {}", user.0);

    let query = Query::new(payload.query.clone(), payload.sources.clone())
        .with_user_context(payload.user_context(&user.0));
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let result = state
        .dispatcher
        .dispatch(query, payload.search_options(), cancel)
        .await?;
    Ok(Json(result))
}

/// 批量聚合搜索，条目顺序与请求中的查询顺序一致
pub async fn batch_search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<BatchSearchRequestDto>,
) -> Result<Json<BatchSearchResponseDto>, ApiError> {
    payload.validate()?;
    info!(
        "Batch request from user {}: {} queries",
        user.0,
        payload.queries.len()
    );

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();
    let report = state.batch.run(payload.into_queries(), cancel).await;
    Ok(Json(report.into()))
}

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub enabled: bool,
    pub required: bool,
    pub timeout_ms: u64,
    pub base_confidence: f64,
}

/// 已注册的数据源，按名称排序
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    let registry = state.dispatcher.registry();
    let providers = registry
        .names()
        .into_iter()
        .filter_map(|name| registry.get(name))
        .map(|spec| ProviderInfo {
            name: spec.name.clone(),
            enabled: spec.enabled,
            required: spec.required,
            timeout_ms: spec.timeout.as_millis() as u64,
            base_confidence: spec.base_confidence,
        })
        .collect();
    Json(providers)
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    let cache = state.dispatcher.cache();
    Json(json!({
        "stats": cache.stats(),
        "hit_rate": cache.hit_rate(),
        "ttl_secs": cache.ttl().as_secs(),
    }))
}
