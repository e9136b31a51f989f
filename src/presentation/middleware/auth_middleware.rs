// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::infrastructure::auth::ApiTokenStore;
use crate::presentation::errors::ApiError;

/// 携带令牌的请求头
pub const API_TOKEN_HEADER: &str = "x-api-token";
/// 没有请求体的请求（如 GET）通过该请求头提供用户标识
pub const USER_ID_HEADER: &str = "x-user-id";

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 认证状态
#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn ApiTokenStore>,
}

/// 认证通过后放入请求扩展的用户标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// 认证中间件
///
/// 用户标识优先取 `X-User-Id` 请求头，否则读取 JSON 请求体中的 `user_id`，
/// 读取后请求体原样交给后续处理器。令牌通过 [`ApiTokenStore`] 校验。
///
/// # 返回值
///
/// * `Ok(Response)` - 认证成功后下游的响应
/// * `Err(ApiError)` - 缺少凭据或凭据不匹配时为 401，请求体不是合法 JSON 时为 400
pub async fn auth_middleware(
    State(state): State<AuthState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    debug!("AuthMiddleware processing path: {}", req.uri().path());

    let token = req
        .headers()
        .get(API_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or(ApiError::Unauthorized)?;

    let header_user = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let (user_id, mut req) = match header_user {
        Some(user_id) => (user_id, req),
        None => {
            let (parts, body) = req.into_parts();
            let bytes = to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| ApiError::Validation(format!("unreadable request body: {}", e)))?;
            if bytes.is_empty() {
                return Err(ApiError::Unauthorized);
            }
            let payload: Value = serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::Validation(format!("invalid JSON body: {}", e)))?;
            let user_id = user_id_of(&payload).ok_or(ApiError::Unauthorized)?;
            (user_id, Request::from_parts(parts, Body::from(bytes)))
        }
    };

    if !state.tokens.verify(&user_id, &token) {
        warn!("Rejected API token for user {}", user_id);
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(req).await)
}

fn user_id_of(payload: &Value) -> Option<String> {
    match payload.get("user_id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
